//! Types for context manager results and usage

use serde::Serialize;

use crate::context::strategy::CompressionStrategy;
use crate::llm::Message;

/// Notice shown to the user when compression could not reach the budget
pub const DEGRADED_NOTICE: &str = "Response was shortened due to length.";

/// Outcome of a `compress_messages` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionResult {
    /// The messages to send to the model
    pub messages: Vec<Message>,
    /// Token count of the input
    pub original_tokens: usize,
    /// Token count of `messages`, from the same counter as the budget check
    pub final_tokens: usize,
    /// The limit compression aimed for
    pub token_limit: usize,
    /// Strategy that produced `messages`
    pub strategy: CompressionStrategy,
    /// Strategy the manager was configured with
    pub requested_strategy: CompressionStrategy,
    /// Whether `final_tokens <= token_limit`
    pub within_limit: bool,
    /// Fallback attempts after the configured strategy, 0 on first-pass success
    pub attempts: u32,
    /// Whether any compression ran
    pub was_compressed: bool,
    /// Whether a summary message was inserted
    pub summarized: bool,
    /// Number of input messages absent from the output
    pub removed_count: usize,
}

impl CompressionResult {
    /// Result for input that already fits
    pub(super) fn unchanged(
        messages: Vec<Message>,
        tokens: usize,
        token_limit: usize,
        strategy: CompressionStrategy,
    ) -> Self {
        Self {
            messages,
            original_tokens: tokens,
            final_tokens: tokens,
            token_limit,
            strategy,
            requested_strategy: strategy,
            within_limit: true,
            attempts: 0,
            was_compressed: false,
            summarized: false,
            removed_count: 0,
        }
    }

    /// Get the token reduction
    pub fn tokens_saved(&self) -> usize {
        self.original_tokens.saturating_sub(self.final_tokens)
    }

    /// Get the compression ratio
    pub fn compression_ratio(&self) -> f32 {
        if self.original_tokens == 0 {
            1.0
        } else {
            self.final_tokens as f32 / self.original_tokens as f32
        }
    }

    /// User-facing notice when the output still exceeds the budget
    pub fn degraded_notice(&self) -> Option<&'static str> {
        (!self.within_limit).then_some(DEGRADED_NOTICE)
    }

    /// Whether a fallback strategy replaced the configured one
    pub fn escalated(&self) -> bool {
        self.attempts > 0
    }
}

/// Context usage statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextUsage {
    /// Current token count
    pub current_tokens: usize,
    /// Budget the manager compresses to
    pub token_limit: usize,
    /// Usage as percentage of the limit
    pub usage_percentage: f32,
    /// Number of messages
    pub messages_count: usize,
    /// Whether usage has reached 80% of the limit
    pub is_approaching_limit: bool,
    /// Whether the next call would compress
    pub is_over_limit: bool,
}

impl ContextUsage {
    /// Get remaining tokens before limit
    pub fn tokens_until_limit(&self) -> usize {
        self.token_limit.saturating_sub(self.current_tokens)
    }
}
