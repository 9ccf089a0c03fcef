//! Classifier configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_REVIEW_THRESHOLD: f64 = 0.8;
pub const DEFAULT_OCR_CONFIDENCE_THRESHOLD: f64 = 0.95;
pub const DEFAULT_MIN_TEXT_CHARS: usize = 10;
pub const DEFAULT_AWS_REGION: &str = "us-east-1";
pub const DEFAULT_BEDROCK_MODEL_ID: &str = "anthropic.claude-v2";
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 4000;
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 60;

/// Configuration for the classification pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Results below this confidence are forced to `Unknown` and flagged for review
    pub review_threshold: f64,

    /// Minimum OCR block confidence (0.0-1.0) for a line or word to be kept
    pub ocr_confidence_threshold: f64,

    /// Extracted text shorter than this counts as an extraction failure
    pub min_text_chars: usize,

    pub aws_region: String,

    /// Region for the LLM endpoint, may differ from the OCR region
    pub bedrock_region: String,

    pub bedrock_model_id: String,

    /// Extracted text is truncated to this many characters in the prompt
    pub max_prompt_chars: usize,

    /// Per-attempt timeout for each extractor or classifier call
    pub stage_timeout_secs: u64,

    /// Skip the cloud implementations and use only local ones
    pub offline_only: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl ClassifierConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `CONFIDENCE_THRESHOLD`: review threshold (default: 0.8)
    /// - `TEXTRACT_CONFIDENCE_THRESHOLD`: OCR block threshold (default: 0.95)
    /// - `MIN_TEXT_CHARS`: minimum extracted text length (default: 10)
    /// - `AWS_REGION`: (default: "us-east-1")
    /// - `BEDROCK_REGION`: (default: `AWS_REGION`)
    /// - `BEDROCK_MODEL_ID`: (default: "anthropic.claude-v2")
    /// - `MAX_PROMPT_CHARS`: (default: 4000)
    /// - `STAGE_TIMEOUT_SECS`: (default: 60)
    /// - `USE_OFFLINE_ONLY`: (default: false)
    #[must_use = "creates config from environment variables"]
    pub fn from_env() -> Self {
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_AWS_REGION.to_string());
        let bedrock_region = env::var("BEDROCK_REGION").unwrap_or_else(|_| aws_region.clone());

        Self {
            review_threshold: env_or("CONFIDENCE_THRESHOLD", DEFAULT_REVIEW_THRESHOLD),
            ocr_confidence_threshold: env_or(
                "TEXTRACT_CONFIDENCE_THRESHOLD",
                DEFAULT_OCR_CONFIDENCE_THRESHOLD,
            ),
            min_text_chars: env_or("MIN_TEXT_CHARS", DEFAULT_MIN_TEXT_CHARS),
            aws_region,
            bedrock_region,
            bedrock_model_id: env::var("BEDROCK_MODEL_ID")
                .unwrap_or_else(|_| DEFAULT_BEDROCK_MODEL_ID.to_string()),
            max_prompt_chars: env_or("MAX_PROMPT_CHARS", DEFAULT_MAX_PROMPT_CHARS),
            stage_timeout_secs: env_or("STAGE_TIMEOUT_SECS", DEFAULT_STAGE_TIMEOUT_SECS),
            offline_only: env_or("USE_OFFLINE_ONLY", false),
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if a threshold is outside `[0, 1]` or the
    /// timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("review_threshold", self.review_threshold),
            ("ocr_confidence_threshold", self.ocr_confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if self.stage_timeout_secs == 0 {
            return Err(ConfigError::Zero("stage_timeout_secs"));
        }
        Ok(())
    }
}

impl Default for ClassifierConfig {
    #[inline]
    fn default() -> Self {
        Self {
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
            ocr_confidence_threshold: DEFAULT_OCR_CONFIDENCE_THRESHOLD,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            aws_region: DEFAULT_AWS_REGION.to_string(),
            bedrock_region: DEFAULT_AWS_REGION.to_string(),
            bedrock_model_id: DEFAULT_BEDROCK_MODEL_ID.to_string(),
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            stage_timeout_secs: DEFAULT_STAGE_TIMEOUT_SECS,
            offline_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 9] = [
        "CONFIDENCE_THRESHOLD",
        "TEXTRACT_CONFIDENCE_THRESHOLD",
        "MIN_TEXT_CHARS",
        "AWS_REGION",
        "BEDROCK_REGION",
        "BEDROCK_MODEL_ID",
        "MAX_PROMPT_CHARS",
        "STAGE_TIMEOUT_SECS",
        "USE_OFFLINE_ONLY",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = ClassifierConfig::default();
        assert_eq!(config.review_threshold, 0.8);
        assert_eq!(config.ocr_confidence_threshold, 0.95);
        assert_eq!(config.min_text_chars, 10);
        assert_eq!(config.bedrock_model_id, "anthropic.claude-v2");
        assert!(!config.offline_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_env();
        env::set_var("CONFIDENCE_THRESHOLD", "0.65");
        env::set_var("AWS_REGION", "ap-southeast-2");
        env::set_var("USE_OFFLINE_ONLY", "true");
        env::set_var("STAGE_TIMEOUT_SECS", "15");

        let config = ClassifierConfig::from_env();
        assert_eq!(config.review_threshold, 0.65);
        assert_eq!(config.aws_region, "ap-southeast-2");
        // BEDROCK_REGION follows AWS_REGION when unset
        assert_eq!(config.bedrock_region, "ap-southeast-2");
        assert!(config.offline_only);
        assert_eq!(config.stage_timeout_secs, 15);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_from_env_ignores_garbage() {
        clear_env();
        env::set_var("CONFIDENCE_THRESHOLD", "high");
        env::set_var("MIN_TEXT_CHARS", "-4");

        let config = ClassifierConfig::from_env();
        assert_eq!(config.review_threshold, DEFAULT_REVIEW_THRESHOLD);
        assert_eq!(config.min_text_chars, DEFAULT_MIN_TEXT_CHARS);

        clear_env();
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = ClassifierConfig {
            review_threshold: 1.2,
            ..ClassifierConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ThresholdOutOfRange {
                name: "review_threshold",
                value: 1.2
            })
        );

        let config = ClassifierConfig {
            stage_timeout_secs: 0,
            ..ClassifierConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
