//! Metrics Calculator.
//!
//! Pure functions from labelled predictions to a confusion matrix, per-class
//! and aggregate precision/recall/F1, a confidence threshold sweep and
//! confidence statistics. No I/O, and the result does not depend on the
//! order of the input.
//!
//! Zero denominators produce 0, never NaN, and each [`ClassMetrics`] carries
//! flags saying which of its values came from an empty denominator. Overall
//! accuracy and sweep accuracies with no eligible items are `None`, so "no
//! data" stays distinguishable from "0% accurate".

use doc_classify_common::Category;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;

pub const DEFAULT_SWEEP_THRESHOLDS: [f64; 6] = [0.5, 0.6, 0.7, 0.8, 0.9, 0.95];

/// One gradable (true, predicted, confidence) triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledPrediction {
    pub true_label: Category,
    pub predicted_label: Category,
    pub confidence: f64,
}

impl LabeledPrediction {
    pub fn new(true_label: Category, predicted_label: Category, confidence: f64) -> Self {
        Self {
            true_label,
            predicted_label,
            confidence,
        }
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.true_label == self.predicted_label
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// True-label x predicted-label counts over the categories observed, in
/// canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    labels: Vec<Category>,
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    #[must_use]
    pub fn from_predictions(predictions: &[LabeledPrediction]) -> Self {
        let labels: Vec<Category> = predictions
            .iter()
            .flat_map(|p| [p.true_label, p.predicted_label])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut counts = vec![vec![0u64; labels.len()]; labels.len()];
        let mut index = [usize::MAX; Category::ALL.len()];
        for (i, label) in labels.iter().enumerate() {
            index[label.canonical_index()] = i;
        }
        for p in predictions {
            let row = index[p.true_label.canonical_index()];
            let col = index[p.predicted_label.canonical_index()];
            counts[row][col] += 1;
        }

        Self { labels, counts }
    }

    /// Axis labels (rows are true labels, columns predicted).
    pub fn labels(&self) -> &[Category] {
        &self.labels
    }

    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    fn position(&self, category: Category) -> Option<usize> {
        self.labels.iter().position(|c| *c == category)
    }

    /// Count for `(true_label, predicted_label)`; 0 for unobserved labels.
    #[must_use]
    pub fn get(&self, true_label: Category, predicted_label: Category) -> u64 {
        match (self.position(true_label), self.position(predicted_label)) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    /// Items whose true label is `category`.
    #[must_use]
    pub fn row_total(&self, category: Category) -> u64 {
        self.position(category)
            .map_or(0, |r| self.counts[r].iter().sum())
    }

    /// Items predicted as `category`.
    #[must_use]
    pub fn column_total(&self, category: Category) -> u64 {
        self.position(category)
            .map_or(0, |c| self.counts.iter().map(|row| row[c]).sum())
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Sum of the diagonal.
    #[must_use]
    pub fn correct(&self) -> u64 {
        (0..self.labels.len()).map(|i| self.counts[i][i]).sum()
    }

    /// Row-normalised percentages; rows with no items stay all zero.
    #[must_use]
    pub fn percentages(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| {
                let total: u64 = row.iter().sum();
                row.iter().map(|&n| ratio(n, total) * 100.0).collect()
            })
            .collect()
    }
}

impl Serialize for ConfusionMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            labels: &'a [Category],
            matrix: &'a [Vec<u64>],
            percentages: Vec<Vec<f64>>,
        }

        Repr {
            labels: &self.labels,
            matrix: &self.counts,
            percentages: self.percentages(),
        }
        .serialize(serializer)
    }
}

/// Precision, recall and F1 for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub category: Category,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of items whose true label is this category
    pub support: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    /// No true instances: recall and F1 are 0 by definition
    pub zero_support: bool,
    /// Never predicted: precision is 0 by definition
    pub zero_predictions: bool,
}

impl ClassMetrics {
    fn from_matrix(matrix: &ConfusionMatrix, category: Category) -> Self {
        let true_positives = matrix.get(category, category);
        let support = matrix.row_total(category);
        let predicted = matrix.column_total(category);
        let false_positives = predicted - true_positives;
        let false_negatives = support - true_positives;

        let precision = ratio(true_positives, predicted);
        let recall = ratio(true_positives, support);

        Self {
            category,
            precision,
            recall,
            f1: f1_score(precision, recall),
            support,
            true_positives,
            false_positives,
            false_negatives,
            zero_support: support == 0,
            zero_predictions: predicted == 0,
        }
    }
}

/// An averaged precision/recall/F1 triple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Classes that contributed to the average
    pub classes: usize,
}

impl AverageMetrics {
    /// Unweighted mean over classes with support.
    fn macro_average(per_class: &[ClassMetrics]) -> Self {
        let supported: Vec<&ClassMetrics> = per_class.iter().filter(|m| !m.zero_support).collect();
        if supported.is_empty() {
            return Self::default();
        }
        let n = supported.len() as f64;
        Self {
            precision: supported.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: supported.iter().map(|m| m.recall).sum::<f64>() / n,
            f1: supported.iter().map(|m| m.f1).sum::<f64>() / n,
            classes: supported.len(),
        }
    }

    /// Mean weighted by support.
    fn weighted_average(per_class: &[ClassMetrics]) -> Self {
        let total: u64 = per_class.iter().map(|m| m.support).sum();
        if total == 0 {
            return Self::default();
        }
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            per_class
                .iter()
                .map(|m| f(m) * m.support as f64)
                .sum::<f64>()
                / total as f64
        };
        Self {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            classes: per_class.iter().filter(|m| !m.zero_support).count(),
        }
    }

    /// Pooled counts. For single-label data every false positive is some
    /// other class's false negative, so all three equal accuracy.
    fn micro_average(matrix: &ConfusionMatrix) -> Self {
        let accuracy = ratio(matrix.correct(), matrix.total());
        Self {
            precision: accuracy,
            recall: accuracy,
            f1: accuracy,
            classes: matrix.labels().len(),
        }
    }
}

/// Per-class and aggregate metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub micro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    /// `None` when there were no items to grade
    pub overall_accuracy: Option<f64>,
    pub total: u64,
    pub correct: u64,
}

/// Accuracy among items at or above one confidence threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdPoint {
    pub threshold: f64,
    /// `None` when no item reaches the threshold
    pub accuracy: Option<f64>,
    pub count: u64,
    /// Share of all graded items that reach the threshold, in percent
    pub percentage: f64,
}

/// Distribution of confidence scores. Every field is `None` when it has no
/// data behind it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ConfidenceStats {
    pub mean: Option<f64>,
    pub mean_correct: Option<f64>,
    pub mean_incorrect: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std_dev: Option<f64>,
    pub median: Option<f64>,
}

/// Sorted so float sums do not depend on input order.
fn sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

impl ConfidenceStats {
    fn from_predictions(predictions: &[LabeledPrediction]) -> Self {
        let all = sorted(predictions.iter().map(|p| p.confidence));
        let correct = sorted(predictions.iter().filter(|p| p.is_correct()).map(|p| p.confidence));
        let incorrect = sorted(predictions.iter().filter(|p| !p.is_correct()).map(|p| p.confidence));

        let mean_all = mean(&all);
        let std_dev = mean_all.map(|m| {
            (all.iter().map(|v| (v - m).powi(2)).sum::<f64>() / all.len() as f64).sqrt()
        });
        let median = match all.len() {
            0 => None,
            n if n % 2 == 1 => Some(all[n / 2]),
            n => Some((all[n / 2 - 1] + all[n / 2]) / 2.0),
        };

        Self {
            mean: mean_all,
            mean_correct: mean(&correct),
            mean_incorrect: mean(&incorrect),
            min: all.first().copied(),
            max: all.last().copied(),
            std_dev,
            median,
        }
    }
}

/// Everything the Metrics Calculator produces for one item list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub confusion_matrix: ConfusionMatrix,
    pub metrics: AggregateMetrics,
    /// One point per configured threshold, ascending (0.5 up to 0.95 by default)
    pub confidence_threshold_sweep: Vec<ThresholdPoint>,
    pub confidence_stats: ConfidenceStats,
}

/// Computes [`EvaluationMetrics`] over a fixed set of sweep thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsCalculator {
    thresholds: Vec<f64>,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_THRESHOLDS.to_vec())
    }
}

impl MetricsCalculator {
    pub fn new(thresholds: Vec<f64>) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    #[must_use]
    pub fn compute(&self, predictions: &[LabeledPrediction]) -> EvaluationMetrics {
        let confusion_matrix = ConfusionMatrix::from_predictions(predictions);

        let per_class: Vec<ClassMetrics> = confusion_matrix
            .labels()
            .iter()
            .map(|&c| ClassMetrics::from_matrix(&confusion_matrix, c))
            .collect();

        let total = confusion_matrix.total();
        let correct = confusion_matrix.correct();
        let metrics = AggregateMetrics {
            macro_avg: AverageMetrics::macro_average(&per_class),
            micro_avg: AverageMetrics::micro_average(&confusion_matrix),
            weighted_avg: AverageMetrics::weighted_average(&per_class),
            overall_accuracy: (total > 0).then(|| ratio(correct, total)),
            total,
            correct,
            per_class,
        };

        EvaluationMetrics {
            confidence_threshold_sweep: self.sweep(predictions),
            confidence_stats: ConfidenceStats::from_predictions(predictions),
            confusion_matrix,
            metrics,
        }
    }

    fn sweep(&self, predictions: &[LabeledPrediction]) -> Vec<ThresholdPoint> {
        let total = predictions.len() as u64;
        self.thresholds
            .iter()
            .map(|&threshold| {
                let (count, correct) = predictions
                    .iter()
                    .filter(|p| p.confidence >= threshold)
                    .fold((0u64, 0u64), |(n, c), p| (n + 1, c + u64::from(p.is_correct())));
                ThresholdPoint {
                    threshold,
                    accuracy: (count > 0).then(|| ratio(correct, count)),
                    count,
                    percentage: ratio(count, total) * 100.0,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Category::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn sample() -> Vec<LabeledPrediction> {
        vec![
            LabeledPrediction::new(BankStatement, BankStatement, 0.9),
            LabeledPrediction::new(Payslip, BankStatement, 0.6),
            LabeledPrediction::new(BankStatement, BankStatement, 0.95),
        ]
    }

    fn class(metrics: &EvaluationMetrics, category: Category) -> &ClassMetrics {
        metrics
            .metrics
            .per_class
            .iter()
            .find(|m| m.category == category)
            .unwrap()
    }

    #[test]
    fn test_three_item_matrix() {
        let m = MetricsCalculator::default().compute(&sample());
        let cm = &m.confusion_matrix;

        // canonical order puts Payslip before Bank Statement
        assert_eq!(cm.labels(), &[Payslip, BankStatement]);
        assert_eq!(cm.get(BankStatement, BankStatement), 2);
        assert_eq!(cm.get(Payslip, BankStatement), 1);
        assert_eq!(cm.get(Payslip, Payslip), 0);
        assert_eq!(cm.total(), 3);
    }

    #[test]
    fn test_three_item_metrics() {
        let m = MetricsCalculator::default().compute(&sample());

        let bank = class(&m, BankStatement);
        assert!(approx(bank.precision, 2.0 / 3.0));
        assert!(approx(bank.recall, 1.0));
        assert!(approx(bank.f1, 0.8));
        assert_eq!(bank.support, 2);

        let payslip = class(&m, Payslip);
        assert_eq!(payslip.precision, 0.0);
        assert_eq!(payslip.recall, 0.0);
        assert_eq!(payslip.f1, 0.0);
        assert!(payslip.zero_predictions);
        assert!(!payslip.zero_support);

        assert!(approx(m.metrics.overall_accuracy.unwrap(), 2.0 / 3.0));
        assert!(approx(m.metrics.micro_avg.precision, 2.0 / 3.0));
        assert_eq!(m.metrics.macro_avg.classes, 2);
        assert!(approx(m.metrics.macro_avg.precision, 1.0 / 3.0));
        assert!(approx(m.metrics.macro_avg.recall, 0.5));
    }

    #[test]
    fn test_three_item_sweep() {
        let m = MetricsCalculator::default().compute(&sample());
        let at = |t: f64| {
            *m.confidence_threshold_sweep
                .iter()
                .find(|p| p.threshold == t)
                .unwrap()
        };

        assert_eq!(at(0.8).count, 2);
        assert_eq!(at(0.8).accuracy, Some(1.0));
        assert_eq!(at(0.95).count, 1);
        assert_eq!(at(0.95).accuracy, Some(1.0));
        assert_eq!(at(0.5).count, 3);
        assert!(approx(at(0.5).accuracy.unwrap(), 2.0 / 3.0));
        assert!(approx(at(0.9).percentage, 200.0 / 3.0));
    }

    #[test]
    fn test_sweep_with_no_eligible_items_is_none() {
        let preds = vec![LabeledPrediction::new(Payslip, Payslip, 0.4)];
        let m = MetricsCalculator::default().compute(&preds);
        for point in &m.confidence_threshold_sweep {
            assert_eq!(point.count, 0);
            assert_eq!(point.accuracy, None);
            assert_eq!(point.percentage, 0.0);
        }
    }

    #[test]
    fn test_empty_input() {
        let m = MetricsCalculator::default().compute(&[]);

        assert_eq!(m.confusion_matrix.total(), 0);
        assert!(m.confusion_matrix.labels().is_empty());
        assert!(m.metrics.per_class.is_empty());
        assert_eq!(m.metrics.overall_accuracy, None);
        assert_eq!(m.metrics.macro_avg, AverageMetrics::default());
        assert_eq!(m.confidence_stats, ConfidenceStats::default());
        let thresholds: Vec<f64> = m.confidence_threshold_sweep.iter().map(|p| p.threshold).collect();
        assert_eq!(thresholds, DEFAULT_SWEEP_THRESHOLDS.to_vec());
    }

    #[test]
    fn test_zero_support_class_excluded_from_macro() {
        // Unknown is only ever predicted, never a true label
        let preds = vec![
            LabeledPrediction::new(UtilityBill, UtilityBill, 0.9),
            LabeledPrediction::new(UtilityBill, Unknown, 0.3),
        ];
        let m = MetricsCalculator::default().compute(&preds);

        let unknown = class(&m, Unknown);
        assert!(unknown.zero_support);
        assert_eq!((unknown.precision, unknown.recall, unknown.f1), (0.0, 0.0, 0.0));

        assert_eq!(m.metrics.macro_avg.classes, 1);
        assert!(approx(m.metrics.macro_avg.precision, 1.0));
        assert!(approx(m.metrics.macro_avg.recall, 0.5));
    }

    #[test]
    fn test_percentages_row_normalised() {
        let m = MetricsCalculator::default().compute(&sample());
        let pct = m.confusion_matrix.percentages();
        // row Payslip: 0 / 1 -> [0, 100]; row Bank Statement: [0, 100]
        assert_eq!(pct, vec![vec![0.0, 100.0], vec![0.0, 100.0]]);
    }

    #[test]
    fn test_weighted_average() {
        let m = MetricsCalculator::default().compute(&sample());
        // (2 * 0.8 + 1 * 0.0) / 3
        assert!(approx(m.metrics.weighted_avg.f1, 1.6 / 3.0));
    }

    #[test]
    fn test_confidence_stats() {
        let m = MetricsCalculator::default().compute(&sample());
        let s = m.confidence_stats;

        assert!(approx(s.mean.unwrap(), 2.45 / 3.0));
        assert!(approx(s.mean_correct.unwrap(), 0.925));
        assert!(approx(s.mean_incorrect.unwrap(), 0.6));
        assert_eq!(s.min, Some(0.6));
        assert_eq!(s.max, Some(0.95));
        assert_eq!(s.median, Some(0.9));
        assert!(s.std_dev.unwrap() > 0.0);
    }

    #[test]
    fn test_serialized_shape() {
        let m = MetricsCalculator::default().compute(&sample());
        let json = serde_json::to_value(&m).unwrap();

        assert_eq!(json["confusion_matrix"]["labels"][1], "Bank Statement");
        assert_eq!(json["confusion_matrix"]["matrix"][0][1], 1);
        assert_eq!(json["metrics"]["per_class"][0]["category"], "Payslip");
        assert!(json["metrics"]["overall_accuracy"].is_number());
        assert!(json["confidence_threshold_sweep"][0]["accuracy"].is_number());

        let empty = serde_json::to_value(MetricsCalculator::default().compute(&[])).unwrap();
        assert!(empty["metrics"]["overall_accuracy"].is_null());
        assert!(empty["confidence_threshold_sweep"][0]["accuracy"].is_null());
    }
}
