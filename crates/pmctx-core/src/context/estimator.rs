//! Token counting for conversation messages
//!
//! Exact tokenization varies by provider, so counts are estimates derived
//! from byte length with per-family adjustments. Counting is additive: the
//! cost of a list is the sum of its messages, each including a fixed
//! role/formatting overhead. The compression strategies rely on this.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::llm::{Message, ModelFamily, ModelId, ModelProfile, ToolCall};

/// Unknown model identifiers already reported, so each is logged once
static WARNED_MODELS: LazyLock<Mutex<HashSet<String>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Record `model` as reported; true only the first time per process
pub(crate) fn first_sighting(model: &ModelId) -> bool {
    WARNED_MODELS.lock().insert(model.to_string())
}

/// Token counter for conversation messages
///
/// Stateless apart from an optional calibrated profile that replaces the
/// per-family defaults.
#[derive(Debug, Clone, Default)]
pub struct TokenCounter {
    profile_override: Option<ModelProfile>,
}

impl TokenCounter {
    /// Create a counter using the per-family profiles
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counter that uses `profile` for every model
    pub fn with_profile(profile: ModelProfile) -> Self {
        Self {
            profile_override: Some(profile),
        }
    }

    /// Profile used to count for `model`
    ///
    /// Unknown models use the generic characters/4 estimate; a warning is
    /// logged the first time each unknown identifier is seen.
    pub fn profile_for(&self, model: &ModelId) -> ModelProfile {
        if let Some(profile) = self.profile_override {
            return profile;
        }

        let family = model.family();
        if family == ModelFamily::Generic && first_sighting(model) {
            tracing::warn!(
                model = %model,
                "Unknown model for token counting, falling back to characters/4 estimate"
            );
        }
        family.profile()
    }

    /// Estimate tokens for a string
    pub fn count_text(&self, text: &str, model: &ModelId) -> usize {
        tokens_for_len(text.len(), &self.profile_for(model))
    }

    /// Estimate tokens for a single message
    pub fn count_message(&self, message: &Message, model: &ModelId) -> usize {
        let profile = self.profile_for(model);
        message_tokens(message, &profile)
    }

    /// Estimate tokens for a list of messages
    pub fn count_tokens(&self, messages: &[Message], model: &ModelId) -> usize {
        let profile = self.profile_for(model);
        messages.iter().map(|m| message_tokens(m, &profile)).sum()
    }

    /// Tokens a message costs with empty content
    ///
    /// This is the part of a message that truncating its text cannot remove.
    pub fn fixed_cost(&self, message: &Message, model: &ModelId) -> usize {
        let profile = self.profile_for(model);
        fixed_tokens(message, &profile)
    }

    /// Largest content length in bytes that keeps the message within `cap`
    /// tokens, or `None` if the fixed cost alone exceeds `cap`
    pub fn content_budget(&self, message: &Message, cap: usize, model: &ModelId) -> Option<usize> {
        let profile = self.profile_for(model);
        let fixed = fixed_tokens(message, &profile);
        let room = cap.checked_sub(fixed)?;
        let bytes = (room as f64 * profile.chars_per_token).floor();
        if bytes.is_finite() && bytes >= 0.0 {
            Some(bytes as usize)
        } else {
            Some(0)
        }
    }
}

fn tokens_for_len(len: usize, profile: &ModelProfile) -> usize {
    if len == 0 {
        return 0;
    }
    (len as f64 / profile.chars_per_token).ceil() as usize
}

fn tool_call_tokens(call: &ToolCall, profile: &ModelProfile) -> usize {
    // Key order does not change the serialized length, so this stays deterministic
    let args_len = serde_json::to_string(&call.arguments)
        .map(|s| s.len())
        .unwrap_or(0);
    profile.tool_call_overhead
        + tokens_for_len(call.name.len(), profile)
        + tokens_for_len(call.id.len(), profile)
        + tokens_for_len(args_len, profile)
}

fn fixed_tokens(message: &Message, profile: &ModelProfile) -> usize {
    let calls: usize = message
        .tool_calls
        .iter()
        .flatten()
        .map(|c| tool_call_tokens(c, profile))
        .sum();
    let call_id = message
        .tool_call_id
        .as_ref()
        .map_or(0, |id| tokens_for_len(id.len(), profile));
    profile.message_overhead + calls + call_id
}

fn message_tokens(message: &Message, profile: &ModelProfile) -> usize {
    fixed_tokens(message, profile) + tokens_for_len(message.content.len(), profile)
}
