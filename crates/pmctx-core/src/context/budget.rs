//! Adaptive token budgets
//!
//! Each agent gets a configured share of the model's context window, reduced
//! by fixed reserves and by history the caller sends outside the compressed
//! messages, and never below a floor. Budgets are computed fresh for every
//! agent call because the external history varies per request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::classifier::MessageClassifier;
use super::manager::{
    ContextManager, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_SHRINK, DEFAULT_SUMMARY_MODEL,
};
use super::strategy::CompressionStrategy;
use crate::error::{PmctxError, PmctxResult};
use crate::llm::{ModelId, SummaryClient};
use crate::telemetry::CompressionStats;

/// Tokens held back for the system prompt
pub const DEFAULT_SYSTEM_RESERVE: usize = 2_000;
/// Tokens held back for provider-side reasoning
pub const DEFAULT_REASONING_BUFFER: usize = 4_000;
/// Smallest token limit ever handed to a manager
pub const DEFAULT_MIN_TOKEN_LIMIT: usize = 500;

/// Budget configuration shared by all agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSettings {
    /// Share of the context window per agent type, in `[0, 1]`
    pub agent_percentages: HashMap<String, f64>,
    /// Share used for agent types missing from `agent_percentages`
    pub default_percentage: Option<f64>,
    pub system_reserve: usize,
    pub reasoning_buffer: usize,
    pub min_token_limit: usize,
    pub strategy: CompressionStrategy,
    pub summary_model: ModelId,
    pub max_retries: u32,
    /// Limit factor applied on each further retry, in `(0, 1)`
    pub retry_shrink: f64,
    pub max_summary_tokens: usize,
    /// Deadline for summarization calls, e.g. `"30s"`
    ///
    /// Enforced only when compression runs inside a tokio runtime.
    #[serde(with = "humantime_serde")]
    pub summary_timeout: Option<Duration>,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        let agent_percentages = [
            ("coordinator", 0.4),
            ("planner", 0.6),
            ("researcher", 0.7),
            ("pm_agent", 0.8),
            ("reporter", 0.85),
        ]
        .into_iter()
        .map(|(agent, pct)| (agent.to_string(), pct))
        .collect();

        Self {
            agent_percentages,
            default_percentage: None,
            system_reserve: DEFAULT_SYSTEM_RESERVE,
            reasoning_buffer: DEFAULT_REASONING_BUFFER,
            min_token_limit: DEFAULT_MIN_TOKEN_LIMIT,
            strategy: CompressionStrategy::default(),
            summary_model: ModelId::from(DEFAULT_SUMMARY_MODEL),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_shrink: DEFAULT_RETRY_SHRINK,
            max_summary_tokens: 1_000,
            summary_timeout: None,
        }
    }
}

impl BudgetSettings {
    /// Settings with the default reserves and the given percentages
    pub fn with_percentages(percentages: HashMap<String, f64>) -> Self {
        Self {
            agent_percentages: percentages,
            ..Self::default()
        }
    }

    /// Check every configured value
    pub fn validate(&self) -> PmctxResult<()> {
        if self.min_token_limit == 0 {
            return Err(PmctxError::config_with_context(
                "min_token_limit must be greater than zero",
                "budget.min_token_limit",
            ));
        }
        for (agent, pct) in &self.agent_percentages {
            check_percentage(*pct, &format!("budget.agent_percentages.{}", agent))?;
        }
        if let Some(pct) = self.default_percentage {
            check_percentage(pct, "budget.default_percentage")?;
        }
        if !(self.retry_shrink > 0.0 && self.retry_shrink < 1.0) {
            return Err(PmctxError::config_with_context(
                format!("retry_shrink {} must be between 0 and 1", self.retry_shrink),
                "budget.retry_shrink",
            ));
        }
        Ok(())
    }

    /// Configured share for `agent`
    pub fn percentage_for(&self, agent: &str) -> PmctxResult<f64> {
        let pct = self
            .agent_percentages
            .get(agent)
            .copied()
            .or(self.default_percentage)
            .ok_or_else(|| {
                PmctxError::config_with_context(
                    format!("unknown agent type '{}' and no default percentage", agent),
                    "budget.agent_percentages",
                )
            })?;
        check_percentage(pct, &format!("budget.agent_percentages.{}", agent))?;
        Ok(pct)
    }
}

fn check_percentage(pct: f64, key: &str) -> PmctxResult<()> {
    if pct.is_finite() && (0.0..=1.0).contains(&pct) {
        Ok(())
    } else {
        Err(PmctxError::config_with_context(
            format!("percentage {} is outside [0, 1]", pct),
            key,
        ))
    }
}

/// How a token limit was derived
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetBreakdown {
    pub agent: String,
    pub context_window: usize,
    pub history_tokens: usize,
    pub percentage: f64,
    /// `floor(context_window * percentage)`
    pub base_limit: usize,
    /// System reserve plus reasoning buffer
    pub reserved: usize,
    /// Window left after reserves and history; negative when history overflows
    pub available: i64,
    /// Limit handed to the context manager
    pub adjusted_limit: usize,
    /// Whether the floor raised the limit
    pub clamped: bool,
}

/// Builds per-call context managers from budget settings
#[derive(Clone, Default)]
pub struct AdaptiveBudget {
    settings: BudgetSettings,
    classifier: MessageClassifier,
    summary_client: Option<Arc<dyn SummaryClient>>,
    stats: Option<Arc<CompressionStats>>,
}

impl AdaptiveBudget {
    pub fn new(settings: BudgetSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn with_classifier(mut self, classifier: MessageClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_summary_client(mut self, client: Arc<dyn SummaryClient>) -> Self {
        self.summary_client = Some(client);
        self
    }

    pub fn with_stats(mut self, stats: Arc<CompressionStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn settings(&self) -> &BudgetSettings {
        &self.settings
    }

    /// Token limit for one call of `agent`
    pub fn compute(
        &self,
        agent: &str,
        context_window: usize,
        history_tokens: usize,
    ) -> PmctxResult<BudgetBreakdown> {
        if context_window == 0 {
            return Err(PmctxError::config_with_context(
                "model context window must be positive",
                "model_context_window",
            ));
        }
        if self.settings.min_token_limit == 0 {
            return Err(PmctxError::config_with_context(
                "min_token_limit must be greater than zero",
                "budget.min_token_limit",
            ));
        }

        let percentage = self.settings.percentage_for(agent)?;
        let floor = self.settings.min_token_limit;

        let base_limit = (context_window as f64 * percentage).floor() as usize;
        let reserved = self
            .settings
            .system_reserve
            .saturating_add(self.settings.reasoning_buffer);
        let available = context_window as i128 - reserved as i128 - history_tokens as i128;

        let capped = (base_limit as i128).min(available);
        let adjusted_limit = capped.max(floor as i128) as usize;

        Ok(BudgetBreakdown {
            agent: agent.to_string(),
            context_window,
            history_tokens,
            percentage,
            base_limit,
            reserved,
            available: available.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
            adjusted_limit,
            clamped: capped < floor as i128,
        })
    }

    /// Fresh context manager for one call of `agent`
    pub fn build_context_manager(
        &self,
        agent: &str,
        context_window: usize,
        history_tokens: usize,
    ) -> PmctxResult<ContextManager> {
        let budget = self.compute(agent, context_window, history_tokens)?;
        if budget.clamped {
            tracing::warn!(
                agent,
                context_window,
                history_tokens,
                floor = budget.adjusted_limit,
                "History leaves less than the minimum budget, using the floor"
            );
        }
        tracing::debug!(
            agent,
            base_limit = budget.base_limit,
            reserved = budget.reserved,
            available = budget.available,
            adjusted_limit = budget.adjusted_limit,
            "Computed token budget"
        );

        let settings = &self.settings;
        let mut manager = ContextManager::new(budget.adjusted_limit, settings.strategy)?
            .with_agent(agent)
            .with_summary_model(settings.summary_model.clone())
            .with_max_retries(settings.max_retries)
            .with_retry_shrink(settings.retry_shrink)
            .with_max_summary_tokens(settings.max_summary_tokens)
            .with_summary_timeout(settings.summary_timeout)
            .with_classifier(self.classifier.clone());
        if let Some(client) = &self.summary_client {
            manager = manager.with_summary_client(Arc::clone(client));
        }
        if let Some(stats) = &self.stats {
            manager = manager.with_stats(Arc::clone(stats));
        }
        Ok(manager)
    }
}

/// Build a context manager for one agent call using default reserves
///
/// `configured_percentages` maps agent types to their share of the window.
pub fn build_context_manager(
    agent_type: &str,
    model_context_window: usize,
    external_history_tokens: usize,
    configured_percentages: &HashMap<String, f64>,
) -> PmctxResult<ContextManager> {
    AdaptiveBudget::new(BudgetSettings::with_percentages(
        configured_percentages.clone(),
    ))
    .build_context_manager(agent_type, model_context_window, external_history_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percentages(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries
            .iter()
            .map(|(agent, pct)| (agent.to_string(), *pct))
            .collect()
    }

    #[test]
    fn test_reporter_budget() {
        let budget = AdaptiveBudget::new(BudgetSettings::with_percentages(percentages(&[(
            "reporter", 0.85,
        )])));
        let breakdown = budget.compute("reporter", 400_000, 4_000).unwrap();

        assert_eq!(breakdown.base_limit, 340_000);
        assert_eq!(breakdown.reserved, 6_000);
        assert_eq!(breakdown.available, 390_000);
        assert_eq!(breakdown.adjusted_limit, 340_000);
        assert!(!breakdown.clamped);
    }

    #[test]
    fn test_history_caps_budget() {
        let manager =
            build_context_manager("planner", 128_000, 100_000, &percentages(&[("planner", 0.6)]))
                .unwrap();
        assert_eq!(manager.token_limit(), 128_000 - 6_000 - 100_000);
        assert_eq!(manager.agent(), Some("planner"));
    }

    #[test]
    fn test_floor_when_history_exceeds_window() {
        let budget = AdaptiveBudget::new(BudgetSettings::with_percentages(percentages(&[(
            "coder", 0.7,
        )])));
        let breakdown = budget.compute("coder", 8_000, 50_000).unwrap();

        assert_eq!(breakdown.available, 8_000 - 6_000 - 50_000);
        assert_eq!(breakdown.adjusted_limit, DEFAULT_MIN_TOKEN_LIMIT);
        assert!(breakdown.clamped);
    }

    #[test]
    fn test_zero_percentage_uses_floor() {
        let manager =
            build_context_manager("muted", 100_000, 0, &percentages(&[("muted", 0.0)])).unwrap();
        assert_eq!(manager.token_limit(), DEFAULT_MIN_TOKEN_LIMIT);
    }

    #[test]
    fn test_unknown_agent() {
        let err = build_context_manager("auditor", 100_000, 0, &percentages(&[("planner", 0.5)]))
            .unwrap_err();
        assert!(matches!(err, PmctxError::Config { .. }));

        let settings = BudgetSettings {
            default_percentage: Some(0.5),
            ..BudgetSettings::default()
        };
        let breakdown = AdaptiveBudget::new(settings)
            .compute("auditor", 100_000, 0)
            .unwrap();
        assert_eq!(breakdown.base_limit, 50_000);
    }

    #[test]
    fn test_invalid_inputs() {
        let pcts = percentages(&[("planner", 0.5), ("broken", 1.5), ("nan", f64::NAN)]);
        assert!(build_context_manager("planner", 0, 0, &pcts).is_err());
        assert!(build_context_manager("broken", 100_000, 0, &pcts).is_err());
        assert!(build_context_manager("nan", 100_000, 0, &pcts).is_err());

        let settings = BudgetSettings {
            min_token_limit: 0,
            ..BudgetSettings::default()
        };
        assert!(settings.validate().is_err());
        assert!(AdaptiveBudget::new(settings).compute("planner", 100_000, 0).is_err());

        let settings = BudgetSettings {
            retry_shrink: 1.0,
            ..BudgetSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_manager_inherits_settings() {
        let settings = BudgetSettings {
            strategy: CompressionStrategy::ImportanceBased,
            summary_model: ModelId::from("claude-haiku-4"),
            max_retries: 1,
            retry_shrink: 0.5,
            ..BudgetSettings::default()
        };
        let manager = AdaptiveBudget::new(settings)
            .build_context_manager("reporter", 200_000, 0)
            .unwrap();

        assert_eq!(manager.strategy(), CompressionStrategy::ImportanceBased);
        assert_eq!(manager.summary_model().as_str(), "claude-haiku-4");
        assert_eq!(manager.max_retries(), 1);
        assert_eq!(manager.retry_shrink(), 0.5);
        assert_eq!(manager.token_limit(), 170_000);
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: BudgetSettings = toml::from_str(
            r#"
            strategy = "hierarchical"
            summary_timeout = "30s"
            min_token_limit = 1000

            [agent_percentages]
            reporter = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(settings.strategy, CompressionStrategy::Hierarchical);
        assert_eq!(settings.summary_timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.min_token_limit, 1_000);
        assert_eq!(settings.agent_percentages.get("reporter"), Some(&0.9));
        assert_eq!(settings.system_reserve, DEFAULT_SYSTEM_RESERVE);
        assert!(settings.validate().is_ok());
    }
}
