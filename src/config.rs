//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Re-export component configs
pub use crate::aggregate::BatchConfig;
pub use crate::cache::CacheConfig;

use crate::error::Error;
use crate::scoring::{Mode, WeightTable};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Scoring defaults and weight overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Mode used when a request does not name one
    #[serde(default)]
    pub default_mode: Mode,

    /// Per-mode factor weights
    #[serde(default)]
    pub weights: WeightTable,
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix RACE_REC__)
            .add_source(
                config::Environment::with_prefix("RACE_REC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.scoring
            .weights
            .validate()
            .context("Invalid scoring weights")?;

        if self.batch.batch_width == 0 {
            return Err(Error::Config("batch_width must be at least 1".to_string()).into());
        }

        if self.cache.global_stats_ttl_secs == 0
            || self.cache.user_history_ttl_secs == 0
            || self.cache.score_ttl_secs == 0
        {
            return Err(Error::Config("cache TTLs must be positive".to_string()).into());
        }

        if self.cache.sweep_interval_secs == 0 {
            return Err(Error::Config("sweep_interval_secs must be positive".to_string()).into());
        }

        if self.cache.sweep_interval_secs > self.cache.global_stats_ttl_secs {
            tracing::warn!(
                sweep_interval_secs = self.cache.sweep_interval_secs,
                global_stats_ttl_secs = self.cache.global_stats_ttl_secs,
                "Sweep interval exceeds global stats TTL; expired entries linger until read"
            );
        }

        Ok(())
    }

    /// Human-readable summary of the effective configuration
    pub fn display(&self) -> String {
        format!(
            r#"Configuration:
  Cache:
    global_stats_ttl: {}s
    user_history_ttl: {}s
    score_ttl: {}s
    sweep_interval: {}s
  Batch:
    width: {}
    min_sample_races: {}
  Scoring:
    default_mode: {}
"#,
            self.cache.global_stats_ttl_secs,
            self.cache.user_history_ttl_secs,
            self.cache.score_ttl_secs,
            self.cache.sweep_interval_secs,
            self.batch.batch_width,
            self.batch.min_sample_races,
            self.scoring.default_mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.global_stats_ttl_secs, 900);
        assert_eq!(config.cache.user_history_ttl_secs, 300);
        assert_eq!(config.batch.batch_width, 10);
        assert_eq!(config.scoring.default_mode, Mode::Balanced);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.cache.score_ttl_secs, 120);
        assert_eq!(config.batch.min_sample_races, 10);
    }

    #[test]
    fn test_load_partial_file() {
        let file = toml_file(
            r#"
[cache]
score_ttl_secs = 30

[batch]
batch_width = 4

[scoring]
default_mode = "safety_recovery"
"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.cache.score_ttl_secs, 30);
        // Unset fields keep their defaults
        assert_eq!(config.cache.global_stats_ttl_secs, 900);
        assert_eq!(config.batch.batch_width, 4);
        assert_eq!(config.scoring.default_mode, Mode::SafetyRecovery);
        assert_eq!(config.scoring.weights, WeightTable::default());
    }

    #[test]
    fn test_weight_override() {
        let file = toml_file(
            r#"
[scoring.weights.balanced]
performance = 0.2
safety = 0.2
consistency = 0.1
predictability = 0.1
familiarity = 0.2
fatigue_risk = 0.1
attrition_risk = 0.05
time_volatility = 0.05
"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.scoring.weights.balanced.performance, 0.2);
        assert_eq!(config.scoring.weights.irating_push.performance, 0.30);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let file = toml_file(
            r#"
[scoring.weights.irating_push]
performance = 0.5
safety = 0.5
consistency = 0.5
predictability = 0.0
familiarity = 0.0
fatigue_risk = 0.0
attrition_risk = 0.0
time_volatility = 0.0
"#,
        );

        let err = Config::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("irating_push"));
    }

    #[test]
    fn test_zero_batch_width_rejected() {
        let mut config = Config::default();
        config.batch.batch_width = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));

        let mut config = Config::default();
        config.cache.score_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_display_mentions_mode() {
        let display = Config::default().display();
        assert!(display.contains("default_mode: balanced"));
        assert!(display.contains("width: 10"));
    }
}
