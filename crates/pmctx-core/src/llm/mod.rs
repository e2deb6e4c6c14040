//! Message, model and summarization types shared by the context engine

pub mod messages;
pub mod model;
pub mod summary;

pub use messages::{Message, MessageRole, ToolCall, renumber};
pub use model::{ModelFamily, ModelId, ModelProfile, context_window};
pub use summary::{ExtractiveSummaryClient, SUMMARY_PROMPT, SummaryClient, SummaryRequest};
