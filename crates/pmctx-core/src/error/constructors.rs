//! Constructor methods for PmctxError

use super::types::PmctxError;

impl PmctxError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error with context
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error naming the offending field
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            provider: None,
        }
    }

    /// Create an LLM error with provider
    pub fn llm_with_provider(message: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
            provider: Some(provider.into()),
        }
    }

    /// Create a new IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: None,
        }
    }

    /// Create an IO error for a specific path
    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a parse error for the given format (json, toml, yaml)
    pub fn parse(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            format: format.into(),
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Stable code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "PMCTX_CONFIG",
            Self::InvalidInput { .. } => "PMCTX_INVALID_INPUT",
            Self::Llm { .. } => "PMCTX_LLM",
            Self::Io { .. } => "PMCTX_IO",
            Self::Parse { .. } => "PMCTX_PARSE",
            Self::Timeout { .. } => "PMCTX_TIMEOUT",
            Self::Other(_) => "PMCTX_OTHER",
        }
    }

    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Llm { .. } | Self::Timeout { .. })
    }
}

impl From<std::io::Error> for PmctxError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for PmctxError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse("json", error.to_string())
    }
}
