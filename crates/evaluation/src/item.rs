//! Batch entries and per-item evaluation records.

use crate::metrics::LabeledPrediction;
use doc_classify_common::{Category, ClassificationResult, OrchestrationError, SourcePath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One document submitted for evaluation.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub filename: String,
    pub document: Arc<[u8]>,
    /// Ground truth; entries without one are classified but not graded
    pub true_label: Option<Category>,
}

impl BatchEntry {
    pub fn new(filename: impl Into<String>, document: impl Into<Arc<[u8]>>, true_label: Option<Category>) -> Self {
        Self {
            filename: filename.into(),
            document: document.into(),
            true_label,
        }
    }
}

/// How an entry's processing ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Classified,
    /// Extraction or classification exhausted every implementation
    Failed,
    /// The run was cancelled before this entry was dispatched
    Cancelled,
}

/// One row of a batch evaluation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationItem {
    pub filename: String,
    pub true_label: Option<Category>,
    pub predicted_label: Category,
    pub confidence: f64,
    /// Seconds spent classifying this entry
    pub processing_time: f64,
    /// `true_label == predicted_label`; false when there is no ground truth
    pub correct: bool,
    pub outcome: ItemOutcome,
    #[serde(default)]
    pub needs_manual_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<SourcePath>,
    /// Classifier's explanation for its prediction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationItem {
    /// Item for an already-computed prediction.
    pub fn predicted(
        filename: impl Into<String>,
        true_label: Option<Category>,
        predicted_label: Category,
        confidence: f64,
    ) -> Self {
        Self {
            filename: filename.into(),
            true_label,
            predicted_label,
            confidence,
            processing_time: 0.0,
            correct: true_label == Some(predicted_label),
            outcome: ItemOutcome::Classified,
            needs_manual_review: false,
            source_path: None,
            rationale: None,
            error: None,
        }
    }

    pub fn classified(entry: &BatchEntry, result: &ClassificationResult, elapsed: Duration) -> Self {
        Self {
            processing_time: elapsed.as_secs_f64(),
            needs_manual_review: result.needs_manual_review(),
            source_path: Some(result.source_path().clone()),
            rationale: Some(result.rationale().to_string()),
            ..Self::predicted(
                entry.filename.clone(),
                entry.true_label,
                result.category(),
                result.confidence(),
            )
        }
    }

    pub fn failed(entry: &BatchEntry, error: &OrchestrationError, elapsed: Duration) -> Self {
        Self::failure(entry, error.to_string(), elapsed)
    }

    /// Failure that did not come from the orchestrator (e.g. a worker panic).
    pub fn failure(entry: &BatchEntry, error: String, elapsed: Duration) -> Self {
        Self {
            filename: entry.filename.clone(),
            true_label: entry.true_label,
            predicted_label: Category::Unknown,
            confidence: 0.0,
            processing_time: elapsed.as_secs_f64(),
            correct: false,
            outcome: ItemOutcome::Failed,
            needs_manual_review: true,
            source_path: None,
            rationale: None,
            error: Some(error),
        }
    }

    pub fn cancelled(entry: &BatchEntry) -> Self {
        Self {
            outcome: ItemOutcome::Cancelled,
            error: Some("run cancelled before dispatch".to_string()),
            ..Self::failure(entry, String::new(), Duration::ZERO)
        }
    }

    /// The triple fed to the metrics calculator, if this item can be graded.
    ///
    /// Unlabelled and cancelled items cannot; failed items are graded as a
    /// wrong `Unknown` prediction.
    #[must_use]
    pub fn graded(&self) -> Option<LabeledPrediction> {
        if self.outcome == ItemOutcome::Cancelled {
            return None;
        }
        self.true_label
            .map(|t| LabeledPrediction::new(t, self.predicted_label, self.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: Option<Category>) -> BatchEntry {
        BatchEntry::new("doc.pdf", b"%PDF".to_vec(), label)
    }

    #[test]
    fn test_predicted_item_correctness() {
        let item = EvaluationItem::predicted("a.pdf", Some(Category::Payslip), Category::Payslip, 0.9);
        assert!(item.correct);
        assert!(item.graded().is_some());

        let item = EvaluationItem::predicted("b.pdf", None, Category::Payslip, 0.9);
        assert!(!item.correct);
        assert!(item.graded().is_none());
    }

    #[test]
    fn test_failed_item_is_graded_as_unknown() {
        let err = OrchestrationError::ExtractionFailed { attempts: vec![] };
        let item = EvaluationItem::failed(&entry(Some(Category::UtilityBill)), &err, Duration::from_millis(40));

        assert_eq!(item.outcome, ItemOutcome::Failed);
        assert_eq!(item.predicted_label, Category::Unknown);
        assert!(!item.correct);
        assert_eq!(
            item.graded(),
            Some(LabeledPrediction::new(Category::UtilityBill, Category::Unknown, 0.0))
        );
    }

    #[test]
    fn test_cancelled_item_is_not_graded() {
        let item = EvaluationItem::cancelled(&entry(Some(Category::Payslip)));
        assert_eq!(item.outcome, ItemOutcome::Cancelled);
        assert!(item.graded().is_none());
        assert!(item.error.is_some());
    }

    #[test]
    fn test_outcome_serialization() {
        let item = EvaluationItem::cancelled(&entry(None));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["outcome"], "cancelled");
        assert!(json["true_label"].is_null());
        assert_eq!(json["predicted_label"], "Unknown");
    }
}
