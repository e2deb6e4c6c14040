//! Importance-based compression
//!
//! Non-system messages are ranked by [`MessageClassifier`] score and split
//! into thirds: the top third is kept verbatim, the middle third is replaced
//! by a single summary message, the bottom third is dropped. Summarization is
//! best effort; if it is unavailable or fails, the middle third is dropped too.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::partition::{ToolPairing, reassemble, split_system};
use super::{CompressionStrategy, ContextCompressor};
use crate::context::classifier::{MessageClassifier, ScoredMessage};
use crate::context::estimator::TokenCounter;
use crate::error::{PmctxError, PmctxResult};
use crate::llm::{Message, MessageRole, ModelId, SummaryClient, SummaryRequest};

/// `name` given to summary messages
pub const SUMMARY_NAME: &str = "context_summary";

const DEFAULT_MAX_SUMMARY_TOKENS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    High,
    Medium,
    Low,
}

#[derive(Clone)]
pub struct ImportanceCompressor {
    counter: TokenCounter,
    classifier: MessageClassifier,
    client: Option<Arc<dyn SummaryClient>>,
    summary_model: ModelId,
    max_summary_tokens: usize,
    timeout: Option<Duration>,
}

impl fmt::Debug for ImportanceCompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportanceCompressor")
            .field("classifier", &self.classifier)
            .field("has_client", &self.client.is_some())
            .field("summary_model", &self.summary_model)
            .field("max_summary_tokens", &self.max_summary_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ImportanceCompressor {
    pub fn new(counter: TokenCounter, classifier: MessageClassifier, summary_model: ModelId) -> Self {
        Self {
            counter,
            classifier,
            client: None,
            summary_model,
            max_summary_tokens: DEFAULT_MAX_SUMMARY_TOKENS,
            timeout: None,
        }
    }

    pub fn with_summary_client(mut self, client: Arc<dyn SummaryClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_max_summary_tokens(mut self, tokens: usize) -> Self {
        self.max_summary_tokens = tokens;
        self
    }

    /// Deadline for the summarization call
    ///
    /// Only enforced inside a tokio runtime; elsewhere the call runs without one.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Condense `medium` into one message, or `None` to drop it
    async fn summarize(&self, medium: Vec<Message>, room: usize, model: &ModelId) -> Option<Message> {
        let count = medium.len();
        let Some(client) = &self.client else {
            debug!(count, "No summary client configured, dropping medium-importance messages");
            return None;
        };

        let max_tokens = self.max_summary_tokens.min(room);
        if max_tokens == 0 {
            debug!(count, "No room left for a summary, dropping medium-importance messages");
            return None;
        }

        let replaced_tokens = self.counter.count_tokens(&medium, model);
        let first_index = medium
            .iter()
            .map(|m| m.sequence_index)
            .min()
            .unwrap_or_default();

        let request = SummaryRequest::new(medium, self.summary_model.clone(), max_tokens);
        let summary = match self.call_client(client.as_ref(), request).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    error = %e,
                    count,
                    summary_model = %self.summary_model,
                    "Summarization failed, dropping medium-importance messages"
                );
                return None;
            }
        };

        let summary = Message {
            role: MessageRole::Assistant,
            tool_calls: None,
            tool_call_id: None,
            name: Some(SUMMARY_NAME.to_string()),
            sequence_index: first_index,
            agent: None,
            ..summary
        }
        .with_metadata("summary_of", count);

        let summary_tokens = self.counter.count_message(&summary, model);
        if summary_tokens >= replaced_tokens || summary_tokens > room {
            warn!(
                summary_tokens,
                replaced_tokens,
                room,
                "Summary does not save space, dropping medium-importance messages"
            );
            return None;
        }

        debug!(count, replaced_tokens, summary_tokens, "Summarized medium-importance messages");
        Some(summary)
    }

    async fn call_client(
        &self,
        client: &dyn SummaryClient,
        request: SummaryRequest,
    ) -> PmctxResult<Message> {
        let call = client.summarize(request);
        match self.timeout {
            // tokio timers panic outside a tokio runtime
            Some(limit) if tokio::runtime::Handle::try_current().is_ok() => {
                tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| Err(PmctxError::Timeout {
                        seconds: limit.as_secs(),
                    }))
            }
            Some(limit) => {
                warn!(
                    timeout = ?limit,
                    "No tokio runtime, summarizing without a deadline"
                );
                call.await
            }
            None => call.await,
        }
    }
}

/// Rank scored messages and split them into thirds
///
/// Ties go to the more recent message.
fn assign_tiers(scored: &[ScoredMessage]) -> Vec<Tier> {
    let n = scored.len();
    let mut ranked: Vec<&ScoredMessage> = scored.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(b.index.cmp(&a.index)));

    let high = n.div_ceil(3);
    let low_start = n - n / 3;
    let mut tiers = vec![Tier::Medium; n];
    for (rank, entry) in ranked.iter().enumerate() {
        tiers[entry.index] = if rank < high {
            Tier::High
        } else if rank >= low_start {
            Tier::Low
        } else {
            Tier::Medium
        };
    }
    tiers
}

#[async_trait]
impl ContextCompressor for ImportanceCompressor {
    async fn compress(
        &self,
        messages: Vec<Message>,
        token_limit: usize,
        model: &ModelId,
    ) -> Vec<Message> {
        let pairing = ToolPairing::of(&messages);
        let parts = split_system(messages, &self.counter, model);
        let available = parts.available(token_limit);
        if parts.rest.is_empty() {
            return parts.system;
        }

        let scored = self.classifier.classify(&parts.rest);
        let tiers = assign_tiers(&scored);

        let mut high = Vec::new();
        let mut medium = Vec::new();
        let mut dropped = 0usize;
        for ((message, tier), score) in parts.rest.into_iter().zip(tiers).zip(&scored) {
            match tier {
                // Oversized messages are summarized rather than kept verbatim
                Tier::High if score.oversized => medium.push(message),
                Tier::High => high.push(message),
                Tier::Medium => medium.push(message),
                Tier::Low => dropped += 1,
            }
        }

        debug!(
            high = high.len(),
            medium = medium.len(),
            low = dropped,
            "Ranked messages by importance"
        );

        let room = available.saturating_sub(self.counter.count_tokens(&high, model));
        let mut kept = high;
        if !medium.is_empty() {
            if let Some(summary) = self.summarize(medium, room, model).await {
                kept.push(summary);
                kept.sort_by_key(|m| m.sequence_index);
            }
        }

        let kept = pairing.repair(kept);
        reassemble(parts.system, kept)
    }

    fn kind(&self) -> CompressionStrategy {
        CompressionStrategy::ImportanceBased
    }
}
