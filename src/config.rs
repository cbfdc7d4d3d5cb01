//! Pipeline configuration
//!
//! Loaded from YAML. Every field has a default so a config file only needs
//! the settings it changes. The agreement threshold and analyzer weights
//! were chosen heuristically; treat them as tuning knobs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How much of the sentence an arbitration request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    /// The full sentence
    #[default]
    Sentence,
    /// The bare word
    Word,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Escalate when lemma or POS agreement falls below this
    pub agreement_threshold: f64,
    /// Prior weight per analyzer id, used for tie-breaking (default 1.0)
    pub analyzer_weights: BTreeMap<String, f64>,
    pub analyzer_timeout_ms: u64,
    pub arbiter_timeout_ms: u64,
    pub arbitration_context: ContextScope,
    /// Let an arbiter resolve words no analyzer could read
    pub arbitrate_on_total_failure: bool,
    /// Verdicts below this confidence are applied but flagged
    pub arbiter_min_confidence: f64,
    /// Cached verdicts kept before settled entries are dropped
    pub arbitration_cache_limit: usize,
    /// Run analyzers to pick among ambiguous known paradigm cells
    pub disambiguate_known_with_ensemble: bool,
    /// Observations required before a correction is promoted
    pub promotion_min_occurrences: usize,
    pub validate_sentences: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            agreement_threshold: 0.67,
            analyzer_weights: BTreeMap::new(),
            analyzer_timeout_ms: 5_000,
            arbiter_timeout_ms: 30_000,
            arbitration_context: ContextScope::Sentence,
            arbitrate_on_total_failure: false,
            arbiter_min_confidence: 0.5,
            arbitration_cache_limit: 10_000,
            disambiguate_known_with_ensemble: true,
            promotion_min_occurrences: 3,
            validate_sentences: true,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.agreement_threshold) {
            return Err(ConfigError::Invalid(format!(
                "agreement_threshold must be within [0, 1], got {}",
                self.agreement_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.arbiter_min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "arbiter_min_confidence must be within [0, 1], got {}",
                self.arbiter_min_confidence
            )));
        }
        if let Some((id, w)) = self
            .analyzer_weights
            .iter()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "weight for analyzer '{}' must be a non-negative number, got {}",
                id, w
            )));
        }
        if self.analyzer_timeout_ms == 0 || self.arbiter_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        if self.arbitration_cache_limit == 0 {
            return Err(ConfigError::Invalid(
                "arbitration_cache_limit must be at least 1".to_string(),
            ));
        }
        if self.promotion_min_occurrences == 0 {
            return Err(ConfigError::Invalid(
                "promotion_min_occurrences must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.agreement_threshold = threshold;
        self
    }

    pub fn with_weight(mut self, analyzer_id: impl Into<String>, weight: f64) -> Self {
        self.analyzer_weights.insert(analyzer_id.into(), weight);
        self
    }

    pub fn weight_of(&self, analyzer_id: &str) -> f64 {
        self.analyzer_weights.get(analyzer_id).copied().unwrap_or(1.0)
    }

    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_millis(self.analyzer_timeout_ms)
    }

    pub fn arbiter_timeout(&self) -> Duration {
        Duration::from_millis(self.arbiter_timeout_ms)
    }
}
