//! Error taxonomy for extraction, classification and orchestration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single text extraction attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    #[error("Extraction service error: {0}")]
    Service(String),

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported or malformed input: {0}")]
    UnsupportedInput(String),

    #[error("Extracted text too short ({chars} chars, need {min})")]
    EmptyOutput { chars: usize, min: usize },
}

/// Failure of a single classification attempt.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassificationError {
    #[error("Classification service error: {0}")]
    Service(String),

    #[error("Classification timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Insufficient text for classification ({0} chars)")]
    InsufficientText(usize),
}

/// Error type of a pipeline stage attempt.
pub trait StageError: fmt::Display {
    /// The attempt was abandoned after `after`.
    fn timed_out(after: Duration) -> Self;
}

impl StageError for ExtractionError {
    fn timed_out(after: Duration) -> Self {
        ExtractionError::Timeout(after)
    }
}

impl StageError for ClassificationError {
    fn timed_out(after: Duration) -> Self {
        ClassificationError::Timeout(after)
    }
}

/// One failed attempt inside a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub implementation: String,
    pub rank: usize,
    pub error: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}: {}", self.implementation, self.rank, self.error)
    }
}

fn join_failures(attempts: &[StageFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Terminal outcome of a document whose stage exhausted every implementation.
///
/// Kept apart from a low-confidence `Unknown` result so callers can tell
/// "could not classify" from "classified as unknown".
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrchestrationError {
    #[error("Text extraction failed after {} attempt(s): {}", .attempts.len(), join_failures(.attempts))]
    ExtractionFailed { attempts: Vec<StageFailure> },

    #[error("Classification failed after {} attempt(s): {}", .attempts.len(), join_failures(.attempts))]
    ClassificationFailed { attempts: Vec<StageFailure> },

    #[error("No {0} implementations configured")]
    NoImplementations(&'static str),
}

impl OrchestrationError {
    /// Attempts made before giving up (empty for configuration errors).
    #[must_use]
    pub fn attempts(&self) -> &[StageFailure] {
        match self {
            OrchestrationError::ExtractionFailed { attempts }
            | OrchestrationError::ClassificationFailed { attempts } => attempts,
            OrchestrationError::NoImplementations(_) => &[],
        }
    }

    /// Short machine-friendly outcome name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestrationError::ExtractionFailed { .. } => "extraction_failed",
            OrchestrationError::ClassificationFailed { .. } => "classification_failed",
            OrchestrationError::NoImplementations(_) => "no_implementations",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown document category: {0:?}")]
pub struct ParseCategoryError(pub String);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestration_error_message_lists_attempts() {
        let err = OrchestrationError::ExtractionFailed {
            attempts: vec![
                StageFailure {
                    implementation: "textract".into(),
                    rank: 0,
                    error: "throttled".into(),
                },
                StageFailure {
                    implementation: "local_pdf".into(),
                    rank: 1,
                    error: "no text".into(),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.contains("2 attempt(s)"));
        assert!(msg.contains("textract#0: throttled"));
        assert!(msg.contains("local_pdf#1: no text"));
        assert_eq!(err.kind(), "extraction_failed");
        assert_eq!(err.attempts().len(), 2);
    }

    #[test]
    fn test_extraction_error_display() {
        let err = ExtractionError::EmptyOutput { chars: 3, min: 10 };
        assert_eq!(
            err.to_string(),
            "Extracted text too short (3 chars, need 10)"
        );
    }
}
