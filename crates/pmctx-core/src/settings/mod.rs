//! Settings for budgets, scoring and logging
//!
//! Loaded once at startup from a TOML, YAML or JSON file, then adjusted by
//! `PMCTX_*` environment variables.

mod file_loader;
mod logging;

pub use file_loader::load_from_file;
pub use logging::LoggingConfig;

use serde::{Deserialize, Serialize};

use crate::context::budget::BudgetSettings;
use crate::context::classifier::ClassifierWeights;
use crate::context::strategy::CompressionStrategy;
use crate::error::{PmctxError, PmctxResult};
use crate::llm::ModelId;

/// Overrides `budget.strategy`
pub const ENV_STRATEGY: &str = "PMCTX_STRATEGY";
/// Overrides `budget.summary_model`
pub const ENV_SUMMARY_MODEL: &str = "PMCTX_SUMMARY_MODEL";
/// Overrides `logging.level`
pub const ENV_LOG_LEVEL: &str = "PMCTX_LOG_LEVEL";

/// Complete pmctx settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmctxSettings {
    pub budget: BudgetSettings,
    pub classifier: ClassifierWeights,
    pub logging: LoggingConfig,
}

impl PmctxSettings {
    /// Validate budget values and scoring weights
    pub fn validate(&self) -> PmctxResult<()> {
        self.budget.validate()?;

        let w = &self.classifier;
        for (name, weight) in [("role", w.role), ("recency", w.recency), ("size", w.size)] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PmctxError::config_with_context(
                    format!("classifier weight {} must be a non-negative number", weight),
                    format!("classifier.{}", name),
                ));
            }
        }
        Ok(())
    }

    /// Apply `PMCTX_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> PmctxResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> PmctxResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_STRATEGY) {
            self.budget.strategy = value.parse::<CompressionStrategy>().map_err(|e| {
                PmctxError::config_with_context(e.to_string(), ENV_STRATEGY)
            })?;
        }
        if let Some(value) = lookup(ENV_SUMMARY_MODEL).filter(|v| !v.trim().is_empty()) {
            self.budget.summary_model = ModelId::from(value.trim());
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.merge(LoggingConfig {
                level: value,
                format: String::new(),
            });
        }
        Ok(())
    }
}
