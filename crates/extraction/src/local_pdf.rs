//! Local PDF text-layer extractor (no network)

use crate::{collapse_whitespace, ensure_min_text, is_pdf, Result, TextExtractor};
use async_trait::async_trait;
use doc_classify_common::ExtractionError;
use tracing::debug;

/// Pages with this many characters or fewer are treated as blank.
const MIN_PAGE_CHARS: usize = 5;

/// Fallback extractor reading the embedded text layer with `pdf-extract`.
///
/// Only works for born-digital PDFs; scanned images have no text layer and
/// come back as [`ExtractionError::EmptyOutput`].
#[derive(Debug, Clone)]
pub struct LocalPdfExtractor {
    min_chars: usize,
}

impl LocalPdfExtractor {
    #[must_use]
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }
}

impl Default for LocalPdfExtractor {
    fn default() -> Self {
        Self::new(doc_classify_common::config::DEFAULT_MIN_TEXT_CHARS)
    }
}

/// Normalise raw extracted text page by page.
///
/// `pdf-extract` separates pages with form feeds.
pub(crate) fn normalise_pages(raw: &str) -> String {
    raw.split('\u{c}')
        .map(collapse_whitespace)
        .filter(|page| page.chars().count() > MIN_PAGE_CHARS)
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl TextExtractor for LocalPdfExtractor {
    fn name(&self) -> &str {
        "local_pdf"
    }

    async fn extract(&self, document: &[u8]) -> Result<String> {
        if !is_pdf(document) {
            return Err(ExtractionError::UnsupportedInput(
                "local extraction only supports PDF documents".into(),
            ));
        }

        let bytes = document.to_vec();
        // pdf-extract is synchronous and can panic on malformed PDFs
        let raw = tokio::task::spawn_blocking(move || {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                pdf_extract::extract_text_from_mem(&bytes)
            }))
        })
        .await
        .map_err(|e| ExtractionError::Service(format!("extraction task failed: {e}")))?
        .map_err(|_| ExtractionError::UnsupportedInput("PDF parser panicked".into()))?
        .map_err(|e| ExtractionError::UnsupportedInput(format!("PDF extraction failed: {e}")))?;

        let text = normalise_pages(&raw);
        debug!("Local PDF extraction produced {} chars", text.len());

        ensure_min_text(text, self.min_chars)
    }
}
