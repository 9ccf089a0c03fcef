//! Evaluation report assembly.

use crate::item::EvaluationItem;
use crate::metrics::{EvaluationMetrics, LabeledPrediction, MetricsCalculator};
use crate::summary::EvaluationSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Final output of an evaluation run.
///
/// Serialises with `confusion_matrix`, `metrics`, `confidence_threshold_sweep`
/// and `confidence_stats` at the top level, next to `classification_details`
/// and `summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// True if the run was cancelled and some entries were never dispatched
    pub cancelled: bool,
    #[serde(flatten)]
    pub evaluation: EvaluationMetrics,
    /// Every submitted entry, in submission order
    pub classification_details: Vec<EvaluationItem>,
    pub summary: EvaluationSummary,
}

impl EvaluationReport {
    /// Assemble a report from a frozen item list.
    #[must_use]
    pub fn build(
        run_id: impl Into<String>,
        created_at: DateTime<Utc>,
        items: Vec<EvaluationItem>,
        calculator: &MetricsCalculator,
        cancelled: bool,
    ) -> Self {
        let graded: Vec<LabeledPrediction> = items.iter().filter_map(EvaluationItem::graded).collect();

        Self {
            run_id: run_id.into(),
            created_at,
            completed_at: Utc::now(),
            cancelled,
            evaluation: calculator.compute(&graded),
            summary: EvaluationSummary::from_items(&items),
            classification_details: items,
        }
    }

    #[must_use]
    pub fn overall_accuracy(&self) -> Option<f64> {
        self.evaluation.metrics.overall_accuracy
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` errors.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_classify_common::Category::*;

    #[test]
    fn test_report_layout() {
        let items = vec![
            EvaluationItem::predicted("a.pdf", Some(BankStatement), BankStatement, 0.9),
            EvaluationItem::predicted("b.pdf", Some(Payslip), BankStatement, 0.6),
            EvaluationItem::predicted("c.pdf", Some(BankStatement), BankStatement, 0.95),
            EvaluationItem::predicted("d.pdf", None, UtilityBill, 0.99),
        ];
        let report = EvaluationReport::build("run-1", Utc::now(), items, &MetricsCalculator::default(), false);
        let json = serde_json::to_value(&report).unwrap();

        for key in [
            "confusion_matrix",
            "metrics",
            "confidence_threshold_sweep",
            "confidence_stats",
            "classification_details",
            "summary",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json["metrics"]["per_class"].is_array());
        assert!(json["metrics"]["macro_avg"]["f1"].is_number());
        assert_eq!(json["classification_details"].as_array().unwrap().len(), 4);
        assert_eq!(json["summary"]["total_items"], 4);
        assert_eq!(json["summary"]["most_common_true_label"], "Bank Statement");

        // the unlabelled item is not graded
        assert_eq!(report.evaluation.confusion_matrix.total(), 3);
        let accuracy = report.overall_accuracy().unwrap();
        assert!((accuracy - 2.0 / 3.0).abs() < 1e-12);
    }
}
