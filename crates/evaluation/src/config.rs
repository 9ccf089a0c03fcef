//! Evaluation configuration

use crate::metrics::DEFAULT_SWEEP_THRESHOLDS;
use doc_classify_common::config::DEFAULT_REVIEW_THRESHOLD;
use doc_classify_common::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Maximum documents classified concurrently
    pub max_workers: usize,

    /// Review threshold passed to the orchestrator for every entry
    pub review_threshold: f64,

    /// Confidence thresholds for the accuracy sweep
    pub sweep_thresholds: Vec<f64>,
}

impl EvaluationConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `EVAL_MAX_WORKERS`: (default: number of CPUs)
    /// - `EVAL_REVIEW_THRESHOLD`: (default: 0.8)
    #[must_use = "creates config from environment variables"]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_workers = env::var("EVAL_MAX_WORKERS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_workers);

        let review_threshold = env::var("EVAL_REVIEW_THRESHOLD")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.review_threshold);

        Self {
            max_workers,
            review_threshold,
            ..defaults
        }
    }

    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    #[must_use]
    pub fn with_review_threshold(mut self, review_threshold: f64) -> Self {
        self.review_threshold = review_threshold;
        self
    }

    /// # Errors
    ///
    /// Zero workers, or any threshold outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Zero("max_workers"));
        }
        if !(0.0..=1.0).contains(&self.review_threshold) {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "review_threshold",
                value: self.review_threshold,
            });
        }
        if let Some(&value) = self
            .sweep_thresholds
            .iter()
            .find(|t| !(0.0..=1.0).contains(*t))
        {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "sweep_thresholds",
                value,
            });
        }
        Ok(())
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
            sweep_thresholds: DEFAULT_SWEEP_THRESHOLDS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = EvaluationConfig::default();
        assert!(config.max_workers >= 1);
        assert_eq!(config.review_threshold, 0.8);
        assert_eq!(config.sweep_thresholds, vec![0.5, 0.6, 0.7, 0.8, 0.9, 0.95]);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("EVAL_MAX_WORKERS", "3");
        env::set_var("EVAL_REVIEW_THRESHOLD", "0.7");

        let config = EvaluationConfig::from_env();
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.review_threshold, 0.7);

        env::remove_var("EVAL_MAX_WORKERS");
        env::remove_var("EVAL_REVIEW_THRESHOLD");
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            EvaluationConfig::default().with_max_workers(0).validate(),
            Err(ConfigError::Zero("max_workers"))
        );

        let config = EvaluationConfig {
            sweep_thresholds: vec![0.5, 1.5],
            ..EvaluationConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
