//! Context window budgeting and compression
//!
//! This module keeps each agent's conversation inside a token budget derived
//! from the model's context window.
//!
//! # Overview
//!
//! - [`TokenCounter`] estimates token usage per model family
//! - [`MessageClassifier`] scores how much each message matters
//! - [`SimpleCompressor`], [`HierarchicalCompressor`] and
//!   [`ImportanceCompressor`] shrink transcripts in different ways
//! - [`ContextManager`] applies a strategy and falls back until the budget holds
//! - [`AdaptiveBudget`] turns per-agent percentages into a fresh manager per call
//!
//! # Example
//!
//! ```rust,ignore
//! use std::collections::HashMap;
//! use pmctx_core::context::build_context_manager;
//! use pmctx_core::llm::{Message, ModelId};
//!
//! let percentages = HashMap::from([("reporter".to_string(), 0.85)]);
//! let manager = build_context_manager("reporter", 400_000, 4_000, &percentages)?;
//!
//! let messages = vec![
//!     Message::system("You are the reporting agent").with_sequence(0),
//!     Message::user("Summarize sprint 14").with_sequence(1),
//! ];
//! let result = manager.compress_messages(messages, &ModelId::from("gpt-4o")).await;
//! if let Some(notice) = result.degraded_notice() {
//!     eprintln!("{}", notice);
//! }
//! ```

pub mod budget;
pub mod classifier;
pub mod estimator;
pub mod manager;
pub mod strategy;

pub use budget::{AdaptiveBudget, BudgetBreakdown, BudgetSettings, build_context_manager};
pub use classifier::{ClassifierWeights, MessageClassifier, ScoredMessage};
pub use estimator::TokenCounter;
pub use manager::{CompressionResult, ContextManager, ContextUsage, DEGRADED_NOTICE};
pub use strategy::{
    CompressionStrategy, ContextCompressor, HierarchicalCompressor, ImportanceCompressor,
    SUMMARY_NAME, SimpleCompressor, TRUNCATION_MARKER,
};
