//! Settings files in TOML, YAML or JSON

use std::fs;
use std::io;
use std::path::Path;

use super::PmctxSettings;
use crate::error::{PmctxError, PmctxResult};

/// Serialization format of a settings file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsFormat {
    Toml,
    Yaml,
    Json,
}

impl SettingsFormat {
    /// `.toml`, `.yaml`/`.yml`, anything else is read as JSON
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::Toml,
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }

    fn parse(self, content: &str) -> Result<PmctxSettings, String> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Load settings from `path`
///
/// A missing file yields the defaults, so running without a settings file
/// is the normal case.
pub fn load_from_file(path: &Path) -> PmctxResult<PmctxSettings> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(PmctxSettings::default());
        }
        Err(e) => {
            return Err(PmctxError::io_with_path(
                e.to_string(),
                path.display().to_string(),
            ));
        }
    };

    let format = SettingsFormat::of(path);
    let settings = format.parse(&content).map_err(|message| {
        PmctxError::parse(format.name(), format!("{}: {}", path.display(), message))
    })?;
    tracing::debug!(path = %path.display(), format = format.name(), "Loaded settings");
    Ok(settings)
}
