//! Compression strategies
//!
//! Each strategy takes a transcript and a token limit and returns a shorter
//! transcript. Strategies never fail and never touch system messages; whether
//! the output actually fits is checked by the context manager, which escalates
//! when it does not.

mod hierarchical;
mod importance;
pub(crate) mod partition;
mod simple;

pub use hierarchical::{HierarchicalCompressor, TRUNCATION_MARKER};
pub use importance::{ImportanceCompressor, SUMMARY_NAME};
pub use simple::SimpleCompressor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PmctxError;
use crate::llm::{Message, ModelId};

/// Available compression strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Keep the most recent messages that fit
    #[default]
    Simple,
    /// Truncate every message to a per-message cap
    Hierarchical,
    /// Keep important messages, summarize the middle, drop the rest
    #[serde(alias = "importance")]
    ImportanceBased,
}

impl CompressionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionStrategy::Simple => "simple",
            CompressionStrategy::Hierarchical => "hierarchical",
            CompressionStrategy::ImportanceBased => "importance_based",
        }
    }
}

impl fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionStrategy {
    type Err = PmctxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "truncate" => Ok(CompressionStrategy::Simple),
            "hierarchical" => Ok(CompressionStrategy::Hierarchical),
            "importance" | "importance_based" | "importance-based" => {
                Ok(CompressionStrategy::ImportanceBased)
            }
            other => Err(PmctxError::invalid_field(
                "strategy",
                format!(
                    "unknown compression strategy '{}' (expected simple, hierarchical or importance)",
                    other
                ),
            )),
        }
    }
}

/// A transcript compression strategy
///
/// `compress` may return output that still exceeds `token_limit`; callers
/// verify the result with the same token counter and escalate if needed.
#[async_trait]
pub trait ContextCompressor: Send + Sync {
    async fn compress(
        &self,
        messages: Vec<Message>,
        token_limit: usize,
        model: &ModelId,
    ) -> Vec<Message>;

    fn kind(&self) -> CompressionStrategy;
}
