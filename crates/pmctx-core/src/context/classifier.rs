//! Message importance scoring
//!
//! Scores how necessary a message is for the agent to keep reasoning
//! correctly. The score combines role, recency and size; deciding what to keep,
//! summarize or drop is left to the importance strategy.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::llm::{Message, MessageRole, ModelProfile};

/// Tool output that records an outcome the agent must not forget
static DECISION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(decided|decision|approved|rejected|created|updated|deleted|assigned|moved|closed|resolved|blocked|error|failed|deadline|due|sprint|velocity|priority)\b",
    )
    .unwrap()
});

const SYSTEM_WEIGHT: f32 = 1.0;
const DECISION_TOOL_WEIGHT: f32 = 0.85;
const TOOL_WEIGHT: f32 = 0.7;
const ASSISTANT_WEIGHT: f32 = 0.6;
const USER_WEIGHT: f32 = 0.5;
const TOOL_CALL_ONLY_WEIGHT: f32 = 0.3;

/// Relative weights of the scoring components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierWeights {
    pub role: f32,
    pub recency: f32,
    pub size: f32,
    /// Messages above this many tokens count as oversized
    pub large_message_tokens: usize,
}

impl Default for ClassifierWeights {
    fn default() -> Self {
        Self {
            role: 0.5,
            recency: 0.4,
            size: 0.1,
            large_message_tokens: 2_000,
        }
    }
}

/// A message's position and score within a transcript
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredMessage {
    /// Index into the scored slice
    pub index: usize,
    /// Importance in `[0, 1]`
    pub score: f32,
    /// Candidate for summarization rather than verbatim retention
    pub oversized: bool,
}

/// Heuristic importance scorer
#[derive(Debug, Clone, Default)]
pub struct MessageClassifier {
    weights: ClassifierWeights,
}

impl MessageClassifier {
    pub fn new(weights: ClassifierWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ClassifierWeights {
        &self.weights
    }

    /// Score a message in `[0, 1]`
    ///
    /// `position_from_end` is 0 for the most recent message. For a fixed
    /// message the score never decreases as `position_from_end` decreases.
    pub fn score_importance(
        &self,
        message: &Message,
        position_from_end: usize,
        total_messages: usize,
    ) -> f32 {
        let w = &self.weights;
        let score = role_weight(message) * w.role
            + recency(position_from_end, total_messages) * w.recency
            + self.size_factor(message) * w.size;

        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Whether a message is large enough to prefer summarizing it
    pub fn is_oversized(&self, message: &Message) -> bool {
        approx_tokens(message) > self.weights.large_message_tokens
    }

    /// Score every message of a transcript
    pub fn classify(&self, messages: &[Message]) -> Vec<ScoredMessage> {
        let total = messages.len();
        messages
            .iter()
            .enumerate()
            .map(|(index, message)| ScoredMessage {
                index,
                score: self.score_importance(message, total - 1 - index, total),
                oversized: self.is_oversized(message),
            })
            .collect()
    }

    fn size_factor(&self, message: &Message) -> f32 {
        let tokens = approx_tokens(message);
        let large = self.weights.large_message_tokens.max(1);
        if tokens <= large {
            1.0
        } else {
            large as f32 / tokens as f32
        }
    }
}

fn role_weight(message: &Message) -> f32 {
    match message.role {
        MessageRole::System => SYSTEM_WEIGHT,
        MessageRole::Tool if DECISION_PATTERN.is_match(&message.content) => DECISION_TOOL_WEIGHT,
        MessageRole::Tool => TOOL_WEIGHT,
        MessageRole::Assistant if message.is_tool_call_only() => TOOL_CALL_ONLY_WEIGHT,
        MessageRole::Assistant => ASSISTANT_WEIGHT,
        MessageRole::User => USER_WEIGHT,
    }
}

fn recency(position_from_end: usize, total_messages: usize) -> f32 {
    if total_messages <= 1 {
        return 1.0;
    }
    let position = position_from_end.min(total_messages) as f32;
    1.0 - position / total_messages as f32
}

// Model-independent size estimate; the score is a heuristic.
fn approx_tokens(message: &Message) -> usize {
    (message.content.len() as f64 / ModelProfile::GENERIC.chars_per_token).ceil() as usize
}
