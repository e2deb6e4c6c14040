//! Compression telemetry
//!
//! Counters over compression calls, shared through `Arc` between managers.
//! Repeated over-budget results usually mean an agent's percentage is
//! misconfigured, so a run of them is logged as a warning.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::manager::CompressionResult;
use crate::context::strategy::CompressionStrategy;
use crate::llm::ModelId;

/// Consecutive over-budget calls that trigger a warning
pub const DEFAULT_OVER_BUDGET_THRESHOLD: u64 = 5;

const DEFAULT_EVENT_CAPACITY: usize = 100;

/// One compression call, as recorded by [`CompressionStats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionEvent {
    pub timestamp: DateTime<Utc>,
    pub agent: Option<String>,
    pub model: ModelId,
    pub strategy: CompressionStrategy,
    pub requested_strategy: CompressionStrategy,
    pub original_tokens: usize,
    pub final_tokens: usize,
    pub token_limit: usize,
    pub within_limit: bool,
    pub attempts: u32,
    pub was_compressed: bool,
    pub summarized: bool,
}

impl CompressionEvent {
    pub fn from_result(result: &CompressionResult, agent: Option<&str>, model: &ModelId) -> Self {
        Self {
            timestamp: Utc::now(),
            agent: agent.map(str::to_string),
            model: model.clone(),
            strategy: result.strategy,
            requested_strategy: result.requested_strategy,
            original_tokens: result.original_tokens,
            final_tokens: result.final_tokens,
            token_limit: result.token_limit,
            within_limit: result.within_limit,
            attempts: result.attempts,
            was_compressed: result.was_compressed,
            summarized: result.summarized,
        }
    }

    pub fn tokens_saved(&self) -> usize {
        self.original_tokens.saturating_sub(self.final_tokens)
    }
}

/// Point-in-time copy of [`CompressionStats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionStatsSnapshot {
    pub calls: u64,
    pub compressions: u64,
    pub escalations: u64,
    pub summaries: u64,
    pub over_budget: u64,
    pub consecutive_over_budget: u64,
    pub tokens_saved: u64,
}

impl CompressionStatsSnapshot {
    /// Share of calls that needed compression
    pub fn compression_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.compressions as f64 / self.calls as f64
        }
    }
}

/// Thread-safe compression counters
#[derive(Debug)]
pub struct CompressionStats {
    calls: AtomicU64,
    compressions: AtomicU64,
    escalations: AtomicU64,
    summaries: AtomicU64,
    over_budget: AtomicU64,
    consecutive_over_budget: AtomicU64,
    tokens_saved: AtomicU64,
    over_budget_threshold: u64,
    recent: Mutex<VecDeque<CompressionEvent>>,
    capacity: usize,
}

impl Default for CompressionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionStats {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_OVER_BUDGET_THRESHOLD)
    }

    /// Warn after `threshold` consecutive over-budget calls
    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            calls: AtomicU64::new(0),
            compressions: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            summaries: AtomicU64::new(0),
            over_budget: AtomicU64::new(0),
            consecutive_over_budget: AtomicU64::new(0),
            tokens_saved: AtomicU64::new(0),
            over_budget_threshold: threshold.max(1),
            recent: Mutex::new(VecDeque::with_capacity(DEFAULT_EVENT_CAPACITY)),
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Record one compression call
    pub fn record(&self, result: &CompressionResult, agent: Option<&str>, model: &ModelId) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if result.was_compressed {
            self.compressions.fetch_add(1, Ordering::Relaxed);
        }
        if result.escalated() {
            self.escalations.fetch_add(1, Ordering::Relaxed);
        }
        if result.summarized {
            self.summaries.fetch_add(1, Ordering::Relaxed);
        }
        self.tokens_saved
            .fetch_add(result.tokens_saved() as u64, Ordering::Relaxed);

        if result.within_limit {
            self.consecutive_over_budget.store(0, Ordering::Relaxed);
        } else {
            self.over_budget.fetch_add(1, Ordering::Relaxed);
            let streak = self.consecutive_over_budget.fetch_add(1, Ordering::Relaxed) + 1;
            if streak == self.over_budget_threshold {
                tracing::warn!(
                    agent = agent.unwrap_or("-"),
                    consecutive = streak,
                    limit = result.token_limit,
                    "Repeated over-budget compression; check the agent's budget percentage"
                );
            }
        }

        let mut recent = self.recent.lock();
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(CompressionEvent::from_result(result, agent, model));
    }

    pub fn snapshot(&self) -> CompressionStatsSnapshot {
        CompressionStatsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            compressions: self.compressions.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            summaries: self.summaries.load(Ordering::Relaxed),
            over_budget: self.over_budget.load(Ordering::Relaxed),
            consecutive_over_budget: self.consecutive_over_budget.load(Ordering::Relaxed),
            tokens_saved: self.tokens_saved.load(Ordering::Relaxed),
        }
    }

    /// Most recent events, oldest first
    pub fn recent_events(&self) -> Vec<CompressionEvent> {
        self.recent.lock().iter().cloned().collect()
    }
}
