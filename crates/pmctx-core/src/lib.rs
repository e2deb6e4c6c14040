//! pmctx Core Library
//!
//! Context-window budgeting and message compression for multi-agent
//! project-management assistants: token counting, importance scoring,
//! compression strategies, the context manager and adaptive budgets.

pub mod context;
pub mod error;
pub mod llm;
pub mod settings;
pub mod telemetry;

// Re-export commonly used types
pub use context::{
    AdaptiveBudget, BudgetBreakdown, BudgetSettings, CompressionResult, CompressionStrategy,
    ContextCompressor, ContextManager, MessageClassifier, TokenCounter, build_context_manager,
};
pub use error::{PmctxError, PmctxResult};
pub use llm::{Message, MessageRole, ModelId, SummaryClient, SummaryRequest, ToolCall};
pub use settings::PmctxSettings;
pub use telemetry::{CompressionEvent, CompressionStats};
