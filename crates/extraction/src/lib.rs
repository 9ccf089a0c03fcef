//! Text extraction capability.
//!
//! Two implementations ship with the crate: [`TextractExtractor`] (cloud OCR,
//! handles scans and photos) and [`LocalPdfExtractor`] (reads the embedded text
//! layer of a PDF, no network). The orchestrator tries them in rank order.

pub mod local_pdf;
pub mod textract;

use async_trait::async_trait;
use doc_classify_common::ExtractionError;
use regex::Regex;
use std::sync::OnceLock;

pub use local_pdf::LocalPdfExtractor;
pub use textract::TextractExtractor;

pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Turns document bytes into text.
///
/// Implementations own their transient-error retry policy. A returned `Err`
/// means this implementation is done with the document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Stable implementation name, recorded in the result's source path.
    fn name(&self) -> &str;

    /// Extract text from `document`.
    ///
    /// # Errors
    ///
    /// Any [`ExtractionError`]; empty or too-short output is
    /// [`ExtractionError::EmptyOutput`].
    async fn extract(&self, document: &[u8]) -> Result<String>;

    /// Lightweight readiness probe used by health checks.
    async fn health_check(&self) -> bool {
        true
    }
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Collapse runs of whitespace into single spaces and trim.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    whitespace_re().replace_all(text.trim(), " ").into_owned()
}

/// Reject text that is too short to classify.
///
/// # Errors
///
/// [`ExtractionError::EmptyOutput`] when the trimmed text has fewer than
/// `min_chars` characters.
pub fn ensure_min_text(text: String, min_chars: usize) -> Result<String> {
    let chars = text.trim().chars().count();
    if chars < min_chars {
        return Err(ExtractionError::EmptyOutput {
            chars,
            min: min_chars,
        });
    }
    Ok(text)
}

/// True if the bytes start with a PDF header.
#[must_use]
pub fn is_pdf(document: &[u8]) -> bool {
    document.starts_with(b"%PDF")
}
