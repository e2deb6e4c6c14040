//! Property tests for the compression engine

use std::collections::HashMap;

use pmctx_core::context::{
    AdaptiveBudget, BudgetSettings, CompressionStrategy, ContextCompressor, ContextManager,
    HierarchicalCompressor, ImportanceCompressor, MessageClassifier, SimpleCompressor,
    TokenCounter, build_context_manager,
};
use pmctx_core::llm::{Message, ModelId, ToolCall, renumber};
use proptest::prelude::*;

fn arb_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        1 => "[a-zA-Z ]{0,300}".prop_map(Message::system),
        4 => "[a-zA-Z0-9 ]{0,2000}".prop_map(Message::user),
        4 => ".{0,400}".prop_map(Message::assistant),
        2 => ("[a-z0-9_]{1,12}", "[a-z;: ]{0,4000}")
            .prop_map(|(id, content)| Message::tool_result(id, content)),
        1 => ("[a-z0-9_]{1,12}", "[a-z_]{1,16}").prop_map(|(id, name)| {
            Message::assistant_with_tools("", vec![ToolCall::new(id, name, HashMap::new())])
        }),
    ]
}

fn arb_transcript() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec(arb_message(), 0..40).prop_map(|mut messages| {
        renumber(&mut messages);
        messages
    })
}

fn arb_model() -> impl Strategy<Value = ModelId> {
    prop_oneof![
        Just(ModelId::from("gpt-4o")),
        Just(ModelId::from("claude-sonnet-4")),
        Just(ModelId::from("gemini-2.5-pro")),
    ]
}

fn arb_strategy() -> impl Strategy<Value = CompressionStrategy> {
    prop_oneof![
        Just(CompressionStrategy::Simple),
        Just(CompressionStrategy::Hierarchical),
        Just(CompressionStrategy::ImportanceBased),
    ]
}

fn system_messages(messages: &[Message]) -> Vec<&Message> {
    messages.iter().filter(|m| m.is_system()).collect()
}

fn strictly_increasing(messages: &[Message]) -> bool {
    messages
        .windows(2)
        .all(|pair| pair[0].sequence_index < pair[1].sequence_index)
}

fn run_strategy(
    strategy: CompressionStrategy,
    messages: Vec<Message>,
    limit: usize,
    model: &ModelId,
) -> Vec<Message> {
    let counter = TokenCounter::new();
    match strategy {
        CompressionStrategy::Simple => {
            SimpleCompressor::new(counter).compress_sync(messages, limit, model)
        }
        CompressionStrategy::Hierarchical => {
            HierarchicalCompressor::new(counter).compress_sync(messages, limit, model)
        }
        CompressionStrategy::ImportanceBased => {
            let compressor = ImportanceCompressor::new(
                counter,
                MessageClassifier::default(),
                ModelId::from("gpt-4o-mini"),
            );
            tokio_test::block_on(compressor.compress(messages, limit, model))
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Input that fits is returned unchanged
    #[test]
    fn prop_noop_when_within_limit(
        messages in arb_transcript(),
        model in arb_model(),
        strategy in arb_strategy(),
        headroom in 0usize..1_000,
    ) {
        let tokens = TokenCounter::new().count_tokens(&messages, &model);
        let manager = ContextManager::new((tokens + headroom).max(1), strategy).unwrap();

        let result = tokio_test::block_on(manager.compress_messages(messages.clone(), &model));

        prop_assert!(result.within_limit);
        prop_assert!(!result.was_compressed);
        prop_assert_eq!(result.messages, messages);
    }

    /// Simple and hierarchical output fits whenever the system messages do
    #[test]
    fn prop_bounded_strategies_fit(
        messages in arb_transcript(),
        model in arb_model(),
        hierarchical in any::<bool>(),
        limit in 1usize..20_000,
    ) {
        let counter = TokenCounter::new();
        let system_tokens: usize = messages
            .iter()
            .filter(|m| m.is_system())
            .map(|m| counter.count_message(m, &model))
            .sum();
        let strategy = if hierarchical {
            CompressionStrategy::Hierarchical
        } else {
            CompressionStrategy::Simple
        };

        let output = run_strategy(strategy, messages, limit, &model);
        let output_tokens = counter.count_tokens(&output, &model);

        if system_tokens <= limit {
            prop_assert!(output_tokens <= limit, "{} > {}", output_tokens, limit);
        } else {
            prop_assert_eq!(output_tokens, system_tokens);
        }
    }

    /// Every strategy keeps system messages untouched and in order
    #[test]
    fn prop_system_messages_preserved_and_order_kept(
        messages in arb_transcript(),
        model in arb_model(),
        strategy in arb_strategy(),
        limit in 1usize..20_000,
    ) {
        let output = run_strategy(strategy, messages.clone(), limit, &model);

        prop_assert_eq!(system_messages(&output), system_messages(&messages));
        prop_assert!(strictly_increasing(&output));
    }

    /// The manager always returns a consistent result in bounded steps
    #[test]
    fn prop_manager_terminates_with_consistent_result(
        messages in arb_transcript(),
        model in arb_model(),
        strategy in arb_strategy(),
        limit in 1usize..20_000,
        max_retries in 0u32..6,
    ) {
        let manager = ContextManager::new(limit, strategy)
            .unwrap()
            .with_max_retries(max_retries);

        let result = tokio_test::block_on(manager.compress_messages(messages.clone(), &model));

        prop_assert!(result.attempts <= max_retries);
        prop_assert_eq!(result.final_tokens, manager.count_tokens(&result.messages, &model));
        prop_assert_eq!(result.within_limit, result.final_tokens <= limit);
        prop_assert!(result.final_tokens <= result.original_tokens);
        prop_assert_eq!(system_messages(&result.messages), system_messages(&messages));
        prop_assert!(strictly_increasing(&result.messages));
    }
}

proptest! {
    /// Budgets never fall below the floor
    #[test]
    fn prop_budget_respects_floor(
        window in 1usize..2_000_000,
        history in 0usize..5_000_000,
        percentage in 0.0f64..=1.0,
        floor in 1usize..10_000,
    ) {
        let percentages = HashMap::from([("reporter".to_string(), percentage)]);

        let manager = build_context_manager("reporter", window, history, &percentages).unwrap();
        prop_assert!(manager.token_limit() >= 500);

        let settings = BudgetSettings {
            min_token_limit: floor,
            ..BudgetSettings::with_percentages(percentages)
        };
        let breakdown = AdaptiveBudget::new(settings).compute("reporter", window, history).unwrap();
        prop_assert!(breakdown.adjusted_limit >= floor);
        prop_assert!(breakdown.adjusted_limit <= breakdown.base_limit.max(floor));
    }
}
