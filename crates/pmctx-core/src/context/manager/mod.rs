//! Context window manager
//!
//! This module provides the ContextManager that checks a conversation against
//! its token budget, applies the configured compression strategy and falls
//! back to progressively more aggressive compression until the budget holds.

mod core;
mod operations;
mod types;

pub use self::core::{
    ContextManager, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_SHRINK, DEFAULT_SUMMARY_MODEL,
};
pub use types::{CompressionResult, ContextUsage, DEGRADED_NOTICE};
