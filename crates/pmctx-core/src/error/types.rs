//! Core error types for pmctx

use thiserror::Error;

/// Result type alias for pmctx operations
pub type PmctxResult<T> = Result<T, PmctxError>;

/// Main error type for pmctx
///
/// Only configuration and invalid-input errors are ever returned from the
/// budget calculator and context manager constructors. Compression itself
/// reports "could not fit" and summarization failures as data, never as an
/// error value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PmctxError {
    /// Invalid budget or settings configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// Programmer errors such as a zero token limit
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// Summarization model call failed
    #[error("LLM error: {message}")]
    Llm {
        message: String,
        provider: Option<String>,
    },

    /// IO errors while reading settings or transcripts
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// Malformed JSON / TOML / YAML input
    #[error("Parse error ({format}): {message}")]
    Parse { message: String, format: String },

    /// A model call exceeded its deadline
    #[error("Operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}
