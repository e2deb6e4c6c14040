//! Model identifiers, tokenizer families and known context windows
//!
//! Exact tokenization differs per provider, so counting is parameterised by a
//! per-family profile. Identifiers that match no known family fall back to
//! [`ModelFamily::Generic`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Model identifier as supplied by the caller (e.g. `gpt-4o`, `openai/gpt-5`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier without a routing prefix such as `openrouter/openai/`
    pub fn base_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Tokenizer family inferred from the identifier
    pub fn family(&self) -> ModelFamily {
        ModelFamily::detect(self.base_name())
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Tokenizer family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    OpenAi,
    Anthropic,
    Google,
    /// Unknown model, counted with a plain characters/4 estimate
    Generic,
}

impl ModelFamily {
    fn detect(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.starts_with("gpt-")
            || name.starts_with("chatgpt")
            || name.starts_with("o1")
            || name.starts_with("o3")
            || name.starts_with("o4")
        {
            ModelFamily::OpenAi
        } else if name.starts_with("claude") {
            ModelFamily::Anthropic
        } else if name.starts_with("gemini") {
            ModelFamily::Google
        } else {
            ModelFamily::Generic
        }
    }

    /// Counting profile for this family
    pub fn profile(self) -> ModelProfile {
        match self {
            ModelFamily::OpenAi => ModelProfile {
                chars_per_token: 4.0,
                message_overhead: 4,
                tool_call_overhead: 10,
            },
            // Claude tends to have slightly smaller tokens
            ModelFamily::Anthropic => ModelProfile {
                chars_per_token: 3.5,
                message_overhead: 3,
                tool_call_overhead: 10,
            },
            ModelFamily::Google => ModelProfile {
                chars_per_token: 4.0,
                message_overhead: 4,
                tool_call_overhead: 10,
            },
            ModelFamily::Generic => ModelProfile::GENERIC,
        }
    }
}

/// Parameters of the character-based token estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    /// Average characters (bytes) per token
    pub chars_per_token: f64,
    /// Fixed tokens per chat turn for role and formatting
    pub message_overhead: usize,
    /// Fixed tokens per tool call for the call envelope
    pub tool_call_overhead: usize,
}

impl ModelProfile {
    /// Profile used for unrecognised models
    pub const GENERIC: ModelProfile = ModelProfile {
        chars_per_token: 4.0,
        message_overhead: 4,
        tool_call_overhead: 10,
    };
}

/// Static map of known model context windows (input + output tokens)
static CONTEXT_WINDOWS: LazyLock<HashMap<&'static str, usize>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // OpenAI
    m.insert("gpt-4", 8_192);
    m.insert("gpt-4-turbo", 128_000);
    m.insert("gpt-4o", 128_000);
    m.insert("gpt-4o-mini", 128_000);
    m.insert("gpt-4.1", 1_047_576);
    m.insert("gpt-4.1-mini", 1_047_576);
    m.insert("gpt-5", 400_000);
    m.insert("gpt-5-mini", 400_000);
    m.insert("o3", 200_000);
    m.insert("o4-mini", 200_000);

    // Anthropic
    m.insert("claude-3-5-sonnet", 200_000);
    m.insert("claude-3-7-sonnet", 200_000);
    m.insert("claude-3-haiku", 200_000);
    m.insert("claude-sonnet-4", 200_000);
    m.insert("claude-opus-4", 200_000);

    // Google
    m.insert("gemini-1.5-pro", 2_000_000);
    m.insert("gemini-1.5-flash", 1_000_000);
    m.insert("gemini-2.0-flash", 1_048_576);
    m.insert("gemini-2.5-pro", 1_048_576);
    m.insert("gemini-2.5-flash", 1_048_576);

    m
});

/// Known context window for a model
///
/// Matches the exact base name first, then the longest known prefix so dated
/// snapshots (`claude-sonnet-4-20250514`) resolve to their family entry.
pub fn context_window(model: &ModelId) -> Option<usize> {
    let name = model.base_name().to_lowercase();
    if let Some(window) = CONTEXT_WINDOWS.get(name.as_str()) {
        return Some(*window);
    }

    CONTEXT_WINDOWS
        .iter()
        .filter(|(known, _)| name.starts_with(**known))
        .max_by_key(|(known, _)| known.len())
        .map(|(_, window)| *window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_detection() {
        assert_eq!(ModelId::from("gpt-4o").family(), ModelFamily::OpenAi);
        assert_eq!(ModelId::from("o3-mini").family(), ModelFamily::OpenAi);
        assert_eq!(
            ModelId::from("claude-sonnet-4-20250514").family(),
            ModelFamily::Anthropic
        );
        assert_eq!(ModelId::from("gemini-2.5-pro").family(), ModelFamily::Google);
        assert_eq!(ModelId::from("llama-3-70b").family(), ModelFamily::Generic);
    }

    #[test]
    fn test_routing_prefix_is_ignored() {
        let model = ModelId::from("openrouter/anthropic/claude-3-5-sonnet");
        assert_eq!(model.base_name(), "claude-3-5-sonnet");
        assert_eq!(model.family(), ModelFamily::Anthropic);
    }

    #[test]
    fn test_context_window_lookup() {
        assert_eq!(context_window(&ModelId::from("gpt-5")), Some(400_000));
        assert_eq!(
            context_window(&ModelId::from("claude-sonnet-4-20250514")),
            Some(200_000)
        );
        // Longest prefix wins: gpt-4o-mini, not gpt-4
        assert_eq!(
            context_window(&ModelId::from("gpt-4o-mini-2024-07-18")),
            Some(128_000)
        );
        assert_eq!(context_window(&ModelId::from("mystery-model")), None);
    }

    #[test]
    fn test_generic_profile() {
        let profile = ModelFamily::Generic.profile();
        assert_eq!(profile.chars_per_token, 4.0);
        assert_eq!(profile, ModelProfile::GENERIC);
    }
}
