//! Core ContextManager struct and constructors

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::types::ContextUsage;
use crate::context::classifier::MessageClassifier;
use crate::context::estimator::TokenCounter;
use crate::context::strategy::{
    CompressionStrategy, ContextCompressor, HierarchicalCompressor, ImportanceCompressor,
    SimpleCompressor,
};
use crate::error::{PmctxError, PmctxResult};
use crate::llm::{Message, ModelId, SummaryClient};
use crate::telemetry::CompressionStats;

/// Model used for summaries unless configured otherwise
pub const DEFAULT_SUMMARY_MODEL: &str = "gpt-4o-mini";
/// Fallback attempts after the configured strategy
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Limit multiplier applied on each further fallback attempt
pub const DEFAULT_RETRY_SHRINK: f64 = 0.8;

const DEFAULT_MAX_SUMMARY_TOKENS: usize = 1_000;
const APPROACHING_LIMIT_RATIO: f64 = 0.8;

/// Compresses conversations to a fixed token limit
///
/// Configured once and then read-only, so a single instance can serve many
/// concurrent `compress_messages` calls. Budgets change per invocation, so
/// callers normally build a fresh manager through the adaptive budget
/// calculator for every agent call.
#[derive(Clone)]
pub struct ContextManager {
    pub(super) token_limit: usize,
    pub(super) strategy: CompressionStrategy,
    pub(super) summary_model: ModelId,
    pub(super) max_retries: u32,
    pub(super) retry_shrink: f64,
    pub(super) max_summary_tokens: usize,
    pub(super) summary_timeout: Option<Duration>,
    pub(super) agent: Option<String>,
    pub(super) counter: TokenCounter,
    pub(super) classifier: MessageClassifier,
    pub(super) summary_client: Option<Arc<dyn SummaryClient>>,
    pub(super) stats: Option<Arc<CompressionStats>>,
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("token_limit", &self.token_limit)
            .field("strategy", &self.strategy)
            .field("summary_model", &self.summary_model)
            .field("max_retries", &self.max_retries)
            .field("retry_shrink", &self.retry_shrink)
            .field("agent", &self.agent)
            .field("has_summary_client", &self.summary_client.is_some())
            .finish_non_exhaustive()
    }
}

impl ContextManager {
    /// Create a manager for `token_limit` tokens using `strategy`
    ///
    /// A zero limit is a programmer error and is rejected.
    pub fn new(token_limit: usize, strategy: CompressionStrategy) -> PmctxResult<Self> {
        if token_limit == 0 {
            return Err(PmctxError::invalid_field(
                "token_limit",
                "token limit must be a positive number of tokens",
            ));
        }

        Ok(Self {
            token_limit,
            strategy,
            summary_model: ModelId::from(DEFAULT_SUMMARY_MODEL),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_shrink: DEFAULT_RETRY_SHRINK,
            max_summary_tokens: DEFAULT_MAX_SUMMARY_TOKENS,
            summary_timeout: None,
            agent: None,
            counter: TokenCounter::new(),
            classifier: MessageClassifier::default(),
            summary_client: None,
            stats: None,
        })
    }

    /// Client used by the importance strategy to summarize messages
    pub fn with_summary_client(mut self, client: Arc<dyn SummaryClient>) -> Self {
        self.summary_client = Some(client);
        self
    }

    pub fn with_summary_model(mut self, model: impl Into<ModelId>) -> Self {
        self.summary_model = model.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Factor in `(0, 1)` applied to the limit on each further retry
    ///
    /// Values outside that range would stop retries from getting more
    /// aggressive and are ignored with a warning.
    pub fn with_retry_shrink(mut self, factor: f64) -> Self {
        if factor > 0.0 && factor < 1.0 {
            self.retry_shrink = factor;
        } else {
            tracing::warn!(factor, "Ignoring retry shrink factor outside (0, 1)");
        }
        self
    }

    pub fn with_max_summary_tokens(mut self, tokens: usize) -> Self {
        self.max_summary_tokens = tokens;
        self
    }

    /// Deadline for summarization calls, enforced only inside a tokio runtime
    pub fn with_summary_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.summary_timeout = timeout;
        self
    }

    /// Agent label attached to logs and telemetry
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_classifier(mut self, classifier: MessageClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Record every call in shared statistics
    pub fn with_stats(mut self, stats: Arc<CompressionStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn strategy(&self) -> CompressionStrategy {
        self.strategy
    }

    pub fn summary_model(&self) -> &ModelId {
        &self.summary_model
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_shrink(&self) -> f64 {
        self.retry_shrink
    }

    pub fn agent(&self) -> Option<&str> {
        self.agent.as_deref()
    }

    /// Get the token counter
    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Count tokens with the counter used for budget checks
    pub fn count_tokens(&self, messages: &[Message], model: &ModelId) -> usize {
        self.counter.count_tokens(messages, model)
    }

    /// Get context usage statistics
    pub fn usage(&self, messages: &[Message], model: &ModelId) -> ContextUsage {
        let current_tokens = self.counter.count_tokens(messages, model);
        let limit = self.token_limit as f64;

        ContextUsage {
            current_tokens,
            token_limit: self.token_limit,
            usage_percentage: (current_tokens as f64 / limit * 100.0) as f32,
            messages_count: messages.len(),
            is_approaching_limit: current_tokens as f64 >= limit * APPROACHING_LIMIT_RATIO,
            is_over_limit: current_tokens > self.token_limit,
        }
    }

    /// Build the compressor for `strategy` from this manager's settings
    pub(super) fn compressor(&self, strategy: CompressionStrategy) -> Box<dyn ContextCompressor> {
        match strategy {
            CompressionStrategy::Simple => Box::new(SimpleCompressor::new(self.counter.clone())),
            CompressionStrategy::Hierarchical => {
                Box::new(HierarchicalCompressor::new(self.counter.clone()))
            }
            CompressionStrategy::ImportanceBased => {
                let mut compressor = ImportanceCompressor::new(
                    self.counter.clone(),
                    self.classifier.clone(),
                    self.summary_model.clone(),
                )
                .with_max_summary_tokens(self.max_summary_tokens)
                .with_timeout(self.summary_timeout);
                if let Some(client) = &self.summary_client {
                    compressor = compressor.with_summary_client(Arc::clone(client));
                }
                Box::new(compressor)
            }
        }
    }
}
