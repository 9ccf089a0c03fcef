//! AWS Textract OCR extractor

use crate::{ensure_min_text, Result, TextExtractor};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_textract::error::DisplayErrorContext;
use aws_sdk_textract::primitives::Blob;
use aws_sdk_textract::types::{Block, BlockType, Document};
use aws_sdk_textract::Client;
use doc_classify_common::{ClassifierConfig, ExtractionError};
use tracing::{debug, info};

/// Textract `DetectDocumentText` accepts at most 10 MB of inline bytes.
const MAX_INLINE_BYTES: usize = 10 * 1024 * 1024;

/// OCR block reduced to the fields the extractor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OcrBlockKind {
    Line,
    Word,
}

#[derive(Debug, Clone)]
pub(crate) struct OcrBlock<'a> {
    pub kind: OcrBlockKind,
    pub text: &'a str,
    /// Textract reports confidence in percent (0-100)
    pub confidence: f32,
}

impl<'a> OcrBlock<'a> {
    fn from_sdk(block: &'a Block) -> Option<Self> {
        let kind = match block.block_type()? {
            BlockType::Line => OcrBlockKind::Line,
            BlockType::Word => OcrBlockKind::Word,
            _ => return None,
        };
        Some(Self {
            kind,
            text: block.text()?,
            confidence: block.confidence().unwrap_or(0.0),
        })
    }
}

/// Assemble text from OCR blocks.
///
/// Lines whose confidence clears `min_confidence` (0.0-1.0) are joined with
/// newlines. When no line survives, or the result is shorter than
/// `min_chars`, high-confidence words joined by spaces are used instead.
pub(crate) fn assemble_text(blocks: &[OcrBlock<'_>], min_confidence: f64, min_chars: usize) -> String {
    let min_percent = (min_confidence * 100.0) as f32;
    let kept = |kind: OcrBlockKind| {
        blocks
            .iter()
            .filter(move |b| b.kind == kind && b.confidence >= min_percent)
            .map(|b| b.text.trim())
            .filter(|t| !t.is_empty())
    };

    let lines: Vec<&str> = kept(OcrBlockKind::Line).collect();
    let text = lines.join("\n");
    if !lines.is_empty() && text.trim().chars().count() >= min_chars {
        return text;
    }

    debug!(
        "Line-level OCR produced {} chars, falling back to word blocks",
        text.trim().chars().count()
    );
    kept(OcrBlockKind::Word).collect::<Vec<_>>().join(" ")
}

/// Primary extractor backed by Textract `DetectDocumentText`.
pub struct TextractExtractor {
    client: Client,
    min_confidence: f64,
    min_chars: usize,
}

impl TextractExtractor {
    /// Create an extractor in `config.aws_region` using the default credential chain.
    pub async fn from_config(config: &ClassifierConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()))
            .load()
            .await;
        info!("Textract extractor initialised in region {}", config.aws_region);

        Self {
            client: Client::new(&sdk_config),
            min_confidence: config.ocr_confidence_threshold,
            min_chars: config.min_text_chars,
        }
    }
}

#[async_trait]
impl TextExtractor for TextractExtractor {
    fn name(&self) -> &str {
        "textract"
    }

    async fn extract(&self, document: &[u8]) -> Result<String> {
        if document.is_empty() {
            return Err(ExtractionError::UnsupportedInput("empty document".into()));
        }
        if document.len() > MAX_INLINE_BYTES {
            return Err(ExtractionError::UnsupportedInput(format!(
                "document is {} bytes, inline OCR limit is {MAX_INLINE_BYTES}",
                document.len()
            )));
        }

        let response = self
            .client
            .detect_document_text()
            .document(Document::builder().bytes(Blob::new(document.to_vec())).build())
            .send()
            .await
            .map_err(|e| {
                let unsupported = e.as_service_error().is_some_and(|se| {
                    se.is_unsupported_document_exception()
                        || se.is_bad_document_exception()
                        || se.is_document_too_large_exception()
                });
                let msg = DisplayErrorContext(&e).to_string();
                if unsupported {
                    ExtractionError::UnsupportedInput(msg)
                } else {
                    ExtractionError::Service(msg)
                }
            })?;

        let blocks: Vec<OcrBlock<'_>> = response.blocks().iter().filter_map(OcrBlock::from_sdk).collect();
        let text = assemble_text(&blocks, self.min_confidence, self.min_chars);
        debug!("Textract returned {} blocks, {} chars kept", blocks.len(), text.len());

        ensure_min_text(text, self.min_chars)
    }
}
