//! Per-message cap compression
//!
//! Every non-system message gets an equal share of 80% of the available
//! budget. Messages over their share are truncated in place, so the shape of
//! the conversation survives even when individual tool outputs are huge.

use async_trait::async_trait;
use tracing::debug;

use super::partition::{ToolPairing, floor_char_boundary, keep_newest, reassemble, split_system};
use super::{CompressionStrategy, ContextCompressor};
use crate::context::estimator::TokenCounter;
use crate::llm::{Message, ModelId};

/// Appended to every truncated message
pub const TRUNCATION_MARKER: &str = " [...truncated]";

/// Share of the available budget divided among messages
const HEADROOM: f64 = 0.8;

#[derive(Debug, Clone, Default)]
pub struct HierarchicalCompressor {
    counter: TokenCounter,
}

impl HierarchicalCompressor {
    pub fn new(counter: TokenCounter) -> Self {
        Self { counter }
    }

    /// Per-message cap for `count` messages sharing `available` tokens
    pub fn message_cap(available: usize, count: usize) -> usize {
        (HEADROOM * available as f64 / count.max(1) as f64).floor() as usize
    }

    pub fn compress_sync(
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

        let cap = Self::message_cap(available, parts.rest.len());
        let mut truncated = 0usize;
        let capped: Vec<Message> = parts
            .rest
            .into_iter()
            .map(|message| {
                let (message, changed) = self.truncate_to_cap(message, cap, model);
                truncated += usize::from(changed);
                message
            })
            .collect();

        let total = self.counter.count_tokens(&capped, model);
        let kept = if total <= available {
            capped
        } else {
            // Fixed costs alone exceed the cap; fall back to dropping the oldest
            debug!(
                cap,
                total, available, "Per-message cap unreachable, dropping oldest messages"
            );
            keep_newest(capped, available, &self.counter, model)
        };
        let kept = pairing.repair(kept);

        if truncated > 0 {
            debug!(truncated, cap, "Truncated messages to per-message cap");
        }

        reassemble(parts.system, kept)
    }

    /// Shorten `message` so it counts at most `cap` tokens
    ///
    /// Returns the message unchanged when it already fits. When even empty
    /// content would exceed the cap, the content is cleared.
    fn truncate_to_cap(&self, message: Message, cap: usize, model: &ModelId) -> (Message, bool) {
        let tokens = self.counter.count_message(&message, model);
        if tokens <= cap {
            return (message, false);
        }

        let budget = self
            .counter
            .content_budget(&message, cap, model)
            .unwrap_or(0);
        let content = if budget >= TRUNCATION_MARKER.len() {
            let end = floor_char_boundary(&message.content, budget - TRUNCATION_MARKER.len());
            format!("{}{}", &message.content[..end], TRUNCATION_MARKER)
        } else {
            String::new()
        };

        let shortened = Message { content, ..message }.with_metadata("truncated_from_tokens", tokens);
        (shortened, true)
    }
}

#[async_trait]
impl ContextCompressor for HierarchicalCompressor {
    async fn compress(
        &self,
        messages: Vec<Message>,
        token_limit: usize,
        model: &ModelId,
    ) -> Vec<Message> {
        self.compress_sync(messages, token_limit, model)
    }

    fn kind(&self) -> CompressionStrategy {
        CompressionStrategy::Hierarchical
    }
}
