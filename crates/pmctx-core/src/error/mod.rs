//! Error types for pmctx
//!
//! Configuration mistakes are the only failures that cross the component
//! boundary as errors. Budget exhaustion, summarization failures and unknown
//! models are recovered locally and surface as flags or log records.

mod constructors;
mod types;

pub use types::{PmctxError, PmctxResult};
