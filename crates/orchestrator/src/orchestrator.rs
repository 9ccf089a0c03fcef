//! Classification orchestrator

use crate::fallback::FallbackChain;
use crate::task::{TaskRecord, TaskStatus, TaskStore, TaskStoreError, TaskUpdate};
use doc_classify_classification::{BedrockClassifier, RuleBasedClassifier, TypeClassifier};
use doc_classify_common::{
    config::{DEFAULT_MIN_TEXT_CHARS, DEFAULT_REVIEW_THRESHOLD, DEFAULT_STAGE_TIMEOUT_SECS},
    Category, ClassificationError, ClassificationResult, ClassifierConfig, ConfidenceGate,
    OrchestrationError, SourcePath,
};
use doc_classify_extraction::{ensure_min_text, LocalPdfExtractor, TextExtractor, TextractExtractor};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// A classification result together with the text it was computed from.
#[derive(Debug, Clone)]
pub struct ClassifiedDocument {
    pub result: ClassificationResult,
    pub text: String,
}

/// Health of one configured implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
}

/// Health of every extractor and classifier, keyed by `stage/name`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: ServiceHealth,
    pub services: BTreeMap<String, ServiceHealth>,
}

/// Turns document bytes into exactly one [`ClassificationResult`].
///
/// Holds no mutable state; share it behind an `Arc` and call it concurrently
/// for independent documents.
pub struct ClassificationOrchestrator {
    extractors: FallbackChain<dyn TextExtractor>,
    classifiers: FallbackChain<dyn TypeClassifier>,
    review_threshold: f64,
    min_text_chars: usize,
}

impl ClassificationOrchestrator {
    /// Build an orchestrator from ranked implementations (index 0 = primary).
    pub fn new(
        extractors: Vec<Arc<dyn TextExtractor>>,
        classifiers: Vec<Arc<dyn TypeClassifier>>,
    ) -> Self {
        let timeout = Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS);
        Self {
            extractors: FallbackChain::new("extraction", extractors, timeout),
            classifiers: FallbackChain::new("classification", classifiers, timeout),
            review_threshold: DEFAULT_REVIEW_THRESHOLD,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
        }
    }

    /// Build the production pipeline: Textract then local PDF for extraction,
    /// Bedrock then rules for classification. With `offline_only` only the
    /// local implementations are used.
    pub async fn from_config(config: &ClassifierConfig) -> Self {
        let mut extractors: Vec<Arc<dyn TextExtractor>> = Vec::new();
        let mut classifiers: Vec<Arc<dyn TypeClassifier>> = Vec::new();

        if config.offline_only {
            info!("Offline mode: using local extraction and rule-based classification only");
        } else {
            extractors.push(Arc::new(TextractExtractor::from_config(config).await));
            classifiers.push(Arc::new(BedrockClassifier::from_config(config).await));
        }
        extractors.push(Arc::new(LocalPdfExtractor::new(config.min_text_chars)));
        classifiers.push(Arc::new(RuleBasedClassifier::new(config.min_text_chars)));

        Self::new(extractors, classifiers)
            .with_review_threshold(config.review_threshold)
            .with_min_text_chars(config.min_text_chars)
            .with_stage_timeout(Duration::from_secs(config.stage_timeout_secs))
    }

    /// Default threshold used by [`Self::classify`].
    #[must_use]
    pub fn with_review_threshold(mut self, review_threshold: f64) -> Self {
        self.review_threshold = review_threshold;
        self
    }

    /// Extracted text shorter than this is treated as an extractor failure.
    #[must_use]
    pub fn with_min_text_chars(mut self, min_text_chars: usize) -> Self {
        self.min_text_chars = min_text_chars;
        self
    }

    /// Per-attempt timeout applied to every extractor and classifier call.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.extractors = self.extractors.with_attempt_timeout(timeout);
        self.classifiers = self.classifiers.with_attempt_timeout(timeout);
        self
    }

    #[must_use]
    pub fn review_threshold(&self) -> f64 {
        self.review_threshold
    }

    /// Classify with the configured review threshold.
    ///
    /// # Errors
    ///
    /// See [`Self::classify_document`].
    pub async fn classify(&self, document: &[u8]) -> Result<ClassificationResult, OrchestrationError> {
        self.classify_document(document, self.review_threshold).await
    }

    /// Extract, classify and gate one document.
    ///
    /// # Errors
    ///
    /// [`OrchestrationError::ExtractionFailed`] or
    /// [`OrchestrationError::ClassificationFailed`] once every implementation
    /// of that stage has failed.
    pub async fn classify_document(
        &self,
        document: &[u8],
        review_threshold: f64,
    ) -> Result<ClassificationResult, OrchestrationError> {
        self.classify_document_with_text(document, review_threshold)
            .await
            .map(|doc| doc.result)
    }

    /// Like [`Self::classify_document`] but also returns the extracted text.
    ///
    /// # Errors
    ///
    /// See [`Self::classify_document`].
    pub async fn classify_document_with_text(
        &self,
        document: &[u8],
        review_threshold: f64,
    ) -> Result<ClassifiedDocument, OrchestrationError> {
        if self.extractors.is_empty() {
            return Err(OrchestrationError::NoImplementations("extractor"));
        }
        if self.classifiers.is_empty() {
            return Err(OrchestrationError::NoImplementations("classifier"));
        }

        let start = Instant::now();
        let min_chars = self.min_text_chars;

        let (text, extractor) = self
            .extractors
            .run(|extractor| async move {
                let text = extractor.extract(document).await?;
                ensure_min_text(text, min_chars)
            })
            .await
            .map_err(|attempts| {
                error!("Text extraction failed on all {} extractor(s)", attempts.len());
                OrchestrationError::ExtractionFailed { attempts }
            })?;

        let text_ref = text.as_str();
        let (classification, classifier) = self
            .classifiers
            .run(|classifier| async move {
                let classification = classifier.classify(text_ref).await?;
                if !(0.0..=1.0).contains(&classification.confidence) {
                    return Err(ClassificationError::MalformedResponse(format!(
                        "confidence {} outside [0, 1]",
                        classification.confidence
                    )));
                }
                Ok(classification)
            })
            .await
            .map_err(|attempts| {
                error!("Classification failed on all {} classifier(s)", attempts.len());
                OrchestrationError::ClassificationFailed { attempts }
            })?;

        let result = ConfidenceGate::new(review_threshold).apply(
            classification,
            SourcePath {
                extractor,
                classifier,
            },
            text.chars().count(),
        );

        info!(
            "Classified as {} (confidence {:.2}, review={}, extractor={}, classifier={}) in {}ms",
            result.category(),
            result.confidence(),
            result.needs_manual_review(),
            result.source_path().extractor.implementation,
            result.source_path().classifier.implementation,
            start.elapsed().as_millis()
        );

        Ok(ClassifiedDocument { result, text })
    }

    /// Categories a document can be classified into (excludes `Unknown`).
    #[must_use]
    pub fn supported_document_types() -> &'static [Category] {
        &Category::DOCUMENT_TYPES
    }

    /// Probe every configured implementation.
    pub async fn health_check(&self) -> HealthReport {
        let mut services = BTreeMap::new();

        for extractor in self.extractors.implementations() {
            let health = if extractor.health_check().await {
                ServiceHealth::Healthy
            } else {
                ServiceHealth::Unhealthy
            };
            services.insert(format!("extraction/{}", extractor.name()), health);
        }
        for classifier in self.classifiers.implementations() {
            let health = if classifier.health_check().await {
                ServiceHealth::Healthy
            } else {
                ServiceHealth::Unhealthy
            };
            services.insert(format!("classification/{}", classifier.name()), health);
        }

        let status = if services.values().all(|h| *h == ServiceHealth::Healthy) {
            ServiceHealth::Healthy
        } else {
            ServiceHealth::Unhealthy
        };
        HealthReport { status, services }
    }

    /// Register a document as `queued` and return its task id.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn submit(&self, store: &dyn TaskStore, filename: &str) -> Result<String, TaskStoreError> {
        let record = TaskRecord::queued(filename);
        let task_id = record.task_id.clone();
        store.create(record).await?;
        info!("Queued task_id={} filename={}", task_id, filename);
        Ok(task_id)
    }

    /// Drive a queued task through `processing` to `completed` or `failed`.
    ///
    /// Classification failures end the task as `failed`; only store errors
    /// are returned as `Err`.
    ///
    /// # Errors
    ///
    /// Unknown task id or an illegal state transition.
    pub async fn run_task(
        &self,
        store: &dyn TaskStore,
        task_id: &str,
        document: &[u8],
    ) -> Result<TaskRecord, TaskStoreError> {
        store
            .update(
                task_id,
                TaskUpdate::status(TaskStatus::Processing, "Extracting text and classifying document"),
            )
            .await?;

        let update = match self.classify(document).await {
            Ok(result) => {
                let progress = if result.needs_manual_review() {
                    "Classification completed, manual review required"
                } else {
                    "Classification completed"
                };
                TaskUpdate::status(TaskStatus::Completed, progress).with_result(result)
            }
            Err(e) => {
                error!("task_id={} failed: {}", task_id, e);
                TaskUpdate::status(TaskStatus::Failed, "Processing failed").with_error(e.to_string())
            }
        };

        store.update(task_id, update).await
    }
}
