//! Compression entry point and fallback ladder

use tracing::{debug, error, info, warn};

use super::core::ContextManager;
use super::types::CompressionResult;
use crate::context::strategy::{CompressionStrategy, SUMMARY_NAME, SimpleCompressor};
use crate::llm::{Message, ModelId};

impl ContextManager {
    /// Compress `messages` to this manager's token limit
    ///
    /// This method:
    /// 1. Counts the input; if it fits, returns it unchanged
    /// 2. Runs the configured strategy and recounts with the same counter
    /// 3. While still over budget, retries with the simple strategy at a
    ///    shrinking limit, at most `max_retries` times
    ///
    /// Never fails. If the budget cannot be met the smallest output reached is
    /// returned with `within_limit == false`.
    pub async fn compress_messages(
        &self,
        messages: Vec<Message>,
        model: &ModelId,
    ) -> CompressionResult {
        let original_tokens = self.counter.count_tokens(&messages, model);
        let agent = self.agent.as_deref().unwrap_or("-");

        if original_tokens <= self.token_limit {
            debug!(
                agent,
                tokens = original_tokens,
                limit = self.token_limit,
                "Context within budget, no compression needed"
            );
            let result = CompressionResult::unchanged(
                messages,
                original_tokens,
                self.token_limit,
                self.strategy,
            );
            self.record(&result, model);
            return result;
        }

        let original_count = messages.len();
        let summaries_before = count_summaries(&messages);

        let mut output = self
            .compressor(self.strategy)
            .compress(messages, self.token_limit, model)
            .await;
        let mut final_tokens = self.counter.count_tokens(&output, model);
        let mut strategy = self.strategy;
        let mut attempts = 0u32;

        let simple = SimpleCompressor::new(self.counter.clone());
        while final_tokens > self.token_limit && attempts < self.max_retries {
            attempts += 1;
            // Re-running simple at the same limit would change nothing
            let exponent = if self.strategy == CompressionStrategy::Simple {
                attempts
            } else {
                attempts - 1
            };
            let effective_limit = self.shrunk_limit(exponent);
            warn!(
                agent,
                attempt = attempts,
                tokens = final_tokens,
                limit = self.token_limit,
                effective_limit,
                "Compressed context still over budget, retrying with simple strategy"
            );

            output = simple.compress_sync(output, effective_limit, model);
            final_tokens = self.counter.count_tokens(&output, model);
            strategy = CompressionStrategy::Simple;
        }

        let within_limit = final_tokens <= self.token_limit;
        if !within_limit {
            error!(
                agent,
                original_tokens,
                final_tokens,
                limit = self.token_limit,
                attempts,
                "Context budget exhausted, returning best-effort output"
            );
        }

        let summarized = count_summaries(&output) > summaries_before;
        let removed_count = (original_count + usize::from(summarized)).saturating_sub(output.len());

        let result = CompressionResult {
            messages: output,
            original_tokens,
            final_tokens,
            token_limit: self.token_limit,
            strategy,
            requested_strategy: self.strategy,
            within_limit,
            attempts,
            was_compressed: true,
            summarized,
            removed_count,
        };

        info!(
            agent,
            original_tokens,
            final_tokens,
            limit = self.token_limit,
            strategy = %result.strategy,
            requested_strategy = %result.requested_strategy,
            within_limit,
            attempts,
            removed = removed_count,
            "Compressed context"
        );

        self.record(&result, model);
        result
    }

    /// `floor(limit * retry_shrink^exponent)`
    fn shrunk_limit(&self, exponent: u32) -> usize {
        let factor = self.retry_shrink.powi(exponent.min(i32::MAX as u32) as i32);
        (self.token_limit as f64 * factor).floor() as usize
    }

    fn record(&self, result: &CompressionResult, model: &ModelId) {
        if let Some(stats) = &self.stats {
            stats.record(result, self.agent.as_deref(), model);
        }
    }
}

fn count_summaries(messages: &[Message]) -> usize {
    messages
        .iter()
        .filter(|m| m.name.as_deref() == Some(SUMMARY_NAME))
        .count()
}
