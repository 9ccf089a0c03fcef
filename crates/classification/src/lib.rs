//! Document type classification capability.
//!
//! [`BedrockClassifier`] asks an LLM for a label; [`RuleBasedClassifier`] is a
//! deterministic keyword/pattern matcher that needs no credentials and is used
//! as the fallback.

pub mod bedrock;
pub mod key_info;
pub mod prompt;
pub mod response;
pub mod rules;

use async_trait::async_trait;
use doc_classify_common::{Classification, ClassificationError};

pub use bedrock::BedrockClassifier;
pub use key_info::{extract_key_info, KeyInfo};
pub use rules::RuleBasedClassifier;

pub type Result<T> = std::result::Result<T, ClassificationError>;

/// Assigns a [`Category`](doc_classify_common::Category) to extracted text.
#[async_trait]
pub trait TypeClassifier: Send + Sync {
    /// Stable implementation name, recorded in the result's source path.
    fn name(&self) -> &str;

    /// Classify `text`. Confidence must be within `[0.0, 1.0]`.
    ///
    /// # Errors
    ///
    /// Service failures, timeouts and unparseable model output.
    async fn classify(&self, text: &str) -> Result<Classification>;

    /// Lightweight readiness probe used by health checks.
    async fn health_check(&self) -> bool {
        true
    }
}
