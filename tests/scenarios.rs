//! End-to-end compression scenarios

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use pmctx::context::budget::{DEFAULT_REASONING_BUFFER, DEFAULT_SYSTEM_RESERVE};
use pmctx::context::{DEGRADED_NOTICE, SUMMARY_NAME, TRUNCATION_MARKER};
use pmctx::{
    AdaptiveBudget, BudgetSettings, CompressionStrategy, ContextManager, Message, ModelId,
    PmctxError, PmctxResult, SummaryClient, SummaryRequest, TokenCounter, build_context_manager,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pmctx_core=debug")
        .with_test_writer()
        .try_init();
}

fn gpt() -> ModelId {
    ModelId::from("gpt-4o")
}

/// Message of exactly `tokens` tokens under the gpt-4o profile
fn sized(seq: u64, tokens: usize) -> Message {
    let content = "w".repeat((tokens - 4) * 4);
    if seq % 2 == 0 {
        Message::user(content).with_sequence(seq)
    } else {
        Message::assistant(content).with_sequence(seq)
    }
}

struct FailingSummaryClient {
    calls: AtomicUsize,
}

#[async_trait]
impl SummaryClient for FailingSummaryClient {
    async fn summarize(&self, _request: SummaryRequest) -> PmctxResult<Message> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PmctxError::llm_with_provider("upstream 503", "openai"))
    }
}

#[tokio::test]
async fn small_conversation_is_left_alone() {
    init_tracing();
    let messages = vec![
        Message::system("s".repeat(600)).with_sequence(0),
        Message::user("u".repeat(700)).with_sequence(1),
        Message::assistant("a".repeat(660)).with_sequence(2),
    ];
    let counter = TokenCounter::new();
    assert_eq!(counter.count_tokens(&messages, &gpt()), 502);

    let manager = ContextManager::new(4_000, CompressionStrategy::Hierarchical).unwrap();
    let result = manager.compress_messages(messages.clone(), &gpt()).await;

    assert!(result.within_limit);
    assert_eq!(result.messages, messages);
    assert_eq!(result.tokens_saved(), 0);
}

#[tokio::test]
async fn simple_keeps_most_recent_run() {
    init_tracing();
    let mut messages = vec![Message::system("s".repeat(3_984)).with_sequence(0)];
    messages.extend((1..50).map(|seq| sized(seq, 1_000)));

    let counter = TokenCounter::new();
    assert_eq!(counter.count_tokens(&messages, &gpt()), 50_000);

    let manager = ContextManager::new(8_000, CompressionStrategy::Simple).unwrap();
    let result = manager.compress_messages(messages.clone(), &gpt()).await;

    // 8000 - 1000 for the system message leaves room for the newest seven
    let mut expected = vec![messages[0].clone()];
    expected.extend_from_slice(&messages[43..]);

    assert_eq!(result.messages, expected);
    assert!(result.within_limit);
    assert_eq!(result.attempts, 0);
    assert_eq!(result.final_tokens, 8_000);
    assert_eq!(result.removed_count, 42);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["strategy"], "simple");
    assert_eq!(json["within_limit"], true);
}

#[tokio::test]
async fn hierarchical_truncates_oversized_message() {
    init_tracing();
    let mut messages: Vec<Message> = (0..20).map(|seq| sized(seq, 14)).collect();
    messages[7] = Message::tool_result("call_export", "r".repeat(80_000)).with_sequence(7);

    let counter = TokenCounter::new();
    assert!(counter.count_message(&messages[7], &gpt()) > 20_000);

    let manager = ContextManager::new(5_000, CompressionStrategy::Hierarchical).unwrap();
    let result = manager.compress_messages(messages.clone(), &gpt()).await;

    assert!(result.within_limit);
    assert_eq!(result.messages.len(), 20);
    assert_eq!(result.removed_count, 0);

    // cap = 0.8 * 5000 / 20
    let truncated = &result.messages[7];
    let tokens = counter.count_message(truncated, &gpt());
    assert!((195..=200).contains(&tokens), "truncated to {}", tokens);
    assert!(truncated.content.ends_with(TRUNCATION_MARKER));
    assert_eq!(truncated.tool_call_id.as_deref(), Some("call_export"));

    for (before, after) in messages.iter().zip(&result.messages) {
        if before.sequence_index != 7 {
            assert_eq!(before, after);
        }
    }
}

#[tokio::test]
async fn oversized_system_prompt_is_reported_over_budget() {
    init_tracing();
    let mut messages = vec![Message::system("s".repeat(7_984)).with_sequence(0)];
    messages.extend((1..10).map(|seq| sized(seq, 200)));

    let counter = TokenCounter::new();
    assert_eq!(counter.count_message(&messages[0], &gpt()), 2_000);

    let manager = ContextManager::new(1_000, CompressionStrategy::Hierarchical).unwrap();
    let result = manager.compress_messages(messages.clone(), &gpt()).await;

    // System messages are never dropped, so nothing else can stay
    assert_eq!(result.messages, vec![messages[0].clone()]);
    assert_eq!(result.final_tokens, 2_000);
    assert!(!result.within_limit);
    assert_eq!(result.degraded_notice(), Some(DEGRADED_NOTICE));
    assert_eq!(result.attempts, manager.max_retries());
    assert_eq!(result.strategy, CompressionStrategy::Simple);
    assert_eq!(result.removed_count, 9);
}

#[test]
fn reporter_budget_matches_formula() {
    let percentages = HashMap::from([("reporter".to_string(), 0.85)]);
    let manager = build_context_manager("reporter", 400_000, 4_000, &percentages).unwrap();

    let base_limit = 340_000;
    let available = 400_000 - (DEFAULT_SYSTEM_RESERVE + DEFAULT_REASONING_BUFFER) - 4_000;
    assert_eq!(available, 390_000);
    assert_eq!(manager.token_limit(), base_limit.min(available));
}

#[test]
fn budget_configuration_errors() {
    let percentages = HashMap::from([("reporter".to_string(), 0.85)]);
    let err = build_context_manager("planner", 400_000, 0, &percentages).unwrap_err();
    assert!(matches!(err, PmctxError::Config { .. }));
    assert_eq!(err.error_code(), "PMCTX_CONFIG");

    let percentages = HashMap::from([("reporter".to_string(), -0.1)]);
    assert!(build_context_manager("reporter", 400_000, 0, &percentages).is_err());
}

#[tokio::test]
async fn failed_summarization_drops_medium_messages() {
    init_tracing();
    let client = Arc::new(FailingSummaryClient {
        calls: AtomicUsize::new(0),
    });
    let settings = BudgetSettings {
        strategy: CompressionStrategy::ImportanceBased,
        ..BudgetSettings::with_percentages(HashMap::from([("reporter".to_string(), 0.1)]))
    };
    let manager = AdaptiveBudget::new(settings)
        .with_summary_client(client.clone())
        .build_context_manager("reporter", 10_000, 0)
        .unwrap();
    assert_eq!(manager.token_limit(), 1_000);

    let mut messages = vec![Message::system("You are the PM reporting agent.").with_sequence(0)];
    messages.extend((1..=12).map(|seq| sized(seq, 104)));

    let result = manager.compress_messages(messages.clone(), &gpt()).await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert!(result.within_limit);
    assert!(!result.summarized);
    assert_eq!(result.attempts, 0);
    assert_eq!(result.strategy, CompressionStrategy::ImportanceBased);

    let kept: Vec<u64> = result.messages.iter().map(|m| m.sequence_index).collect();
    assert_eq!(kept, vec![0, 9, 10, 11, 12]);
    assert_eq!(result.messages[0], messages[0]);
    assert!(
        result
            .messages
            .iter()
            .all(|m| m.name.as_deref() != Some(SUMMARY_NAME))
    );
}
