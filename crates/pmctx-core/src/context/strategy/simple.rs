//! Recency-window compression

use async_trait::async_trait;

use super::partition::{ToolPairing, keep_newest, reassemble, split_system};
use super::{CompressionStrategy, ContextCompressor};
use crate::context::estimator::TokenCounter;
use crate::llm::{Message, ModelId};

/// Keeps system messages plus the longest run of most recent messages that
/// fits the limit
#[derive(Debug, Clone, Default)]
pub struct SimpleCompressor {
    counter: TokenCounter,
}

impl SimpleCompressor {
    pub fn new(counter: TokenCounter) -> Self {
        Self { counter }
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

        let kept = keep_newest(parts.rest, available, &self.counter, model);
        let kept = pairing.repair(kept);

        reassemble(parts.system, kept)
    }
}

#[async_trait]
impl ContextCompressor for SimpleCompressor {
    async fn compress(
        &self,
        messages: Vec<Message>,
        token_limit: usize,
        model: &ModelId,
    ) -> Vec<Message> {
        self.compress_sync(messages, token_limit, model)
    }

    fn kind(&self) -> CompressionStrategy {
        CompressionStrategy::Simple
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCall;
    use std::collections::HashMap;

    fn gpt() -> ModelId {
        ModelId::from("gpt-4o")
    }

    // 4 overhead + 25 content tokens
    fn turn(i: u64) -> Message {
        let text = format!("{:0>100}", i);
        if i % 2 == 0 {
            Message::user(text).with_sequence(i)
        } else {
            Message::assistant(text).with_sequence(i)
        }
    }

    #[test]
    fn test_keeps_system_and_most_recent() {
        let compressor = SimpleCompressor::default();
        let mut messages = vec![Message::system("x".repeat(40)).with_sequence(0)];
        messages.extend((1..=10).map(turn));

        // system costs 14, leaving 90 = three 29-token turns
        let out = compressor.compress_sync(messages, 104, &gpt());

        assert!(out[0].is_system());
        let kept: Vec<u64> = out[1..].iter().map(|m| m.sequence_index).collect();
        assert_eq!(kept, vec![8, 9, 10]);
    }

    #[test]
    fn test_stops_at_first_message_that_does_not_fit() {
        let compressor = SimpleCompressor::default();
        let messages = vec![
            Message::user("a".repeat(8)).with_sequence(0),
            Message::user("b".repeat(400)).with_sequence(1),
            Message::user("c".repeat(8)).with_sequence(2),
        ];

        // The small oldest message would fit on its own but is behind a big one
        let out = compressor.compress_sync(messages, 20, &gpt());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sequence_index, 2);
    }

    #[test]
    fn test_system_over_limit_keeps_only_system() {
        let compressor = SimpleCompressor::default();
        let messages = vec![
            Message::system("s".repeat(400)).with_sequence(0),
            Message::user("hi").with_sequence(1),
        ];
        let out = compressor.compress_sync(messages, 50, &gpt());
        assert_eq!(out.len(), 1);
        assert!(out[0].is_system());
    }

    #[test]
    fn test_drops_result_whose_call_was_cut() {
        let compressor = SimpleCompressor::default();
        let call = ToolCall::new("c1", "list_issues", HashMap::new());
        let messages = vec![
            Message::assistant_with_tools("z".repeat(400), vec![call]).with_sequence(0),
            Message::tool_result("c1", "3 issues").with_sequence(1),
            Message::assistant("Three issues are open.").with_sequence(2),
        ];

        let out = compressor.compress_sync(messages, 40, &gpt());
        let kept: Vec<u64> = out.iter().map(|m| m.sequence_index).collect();
        assert_eq!(kept, vec![2]);
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let compressor = SimpleCompressor::default();
        let messages: Vec<Message> = (0..10).map(turn).collect();
        let sync = compressor.compress_sync(messages.clone(), 100, &gpt());
        let async_out = compressor.compress(messages, 100, &gpt()).await;
        assert_eq!(sync, async_out);
        assert_eq!(compressor.kind(), CompressionStrategy::Simple);
    }
}
