use doc_classify_common::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Evaluation run not found: {0}")]
    NotFound(String),

    #[error("Evaluation run {0} is still processing")]
    NotReady(String),

    #[error("Run store error: {0}")]
    Store(String),

    #[error("Evaluation worker failed: {0}")]
    Worker(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EvaluationError>;
