//! Report summary block.

use crate::item::{EvaluationItem, ItemOutcome};
use doc_classify_common::Category;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    /// Every submitted entry, graded or not
    pub total_items: usize,
    /// Entries with ground truth that were not cancelled
    pub graded_items: usize,
    pub total_correct: usize,
    pub failed_items: usize,
    pub unlabeled_items: usize,
    pub cancelled_items: usize,
    /// Ties go to the category first in canonical order
    pub most_common_true_label: Option<Category>,
    pub most_common_predicted_label: Option<Category>,
    pub true_label_distribution: BTreeMap<Category, usize>,
    pub predicted_label_distribution: BTreeMap<Category, usize>,
    pub correct_by_class: BTreeMap<Category, usize>,
    /// Smallest over largest true-label count; 1.0 is perfectly balanced
    pub class_balance_score: Option<f64>,
}

/// Most frequent key. `BTreeMap` iterates in canonical order and only a
/// strictly greater count replaces the leader, so ties keep the earlier one.
fn most_common(distribution: &BTreeMap<Category, usize>) -> Option<Category> {
    distribution
        .iter()
        .fold(None::<(Category, usize)>, |best, (&c, &n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ => Some((c, n)),
        })
        .map(|(c, _)| c)
}

impl EvaluationSummary {
    #[must_use]
    pub fn from_items(items: &[EvaluationItem]) -> Self {
        let mut true_dist = BTreeMap::new();
        let mut pred_dist = BTreeMap::new();
        let mut correct_by_class = BTreeMap::new();
        let mut graded_items = 0;
        let mut total_correct = 0;

        for graded in items.iter().filter_map(EvaluationItem::graded) {
            graded_items += 1;
            *true_dist.entry(graded.true_label).or_insert(0) += 1;
            *pred_dist.entry(graded.predicted_label).or_insert(0) += 1;
            if graded.is_correct() {
                total_correct += 1;
                *correct_by_class.entry(graded.true_label).or_insert(0) += 1;
            }
        }

        let class_balance_score = match (true_dist.values().min(), true_dist.values().max()) {
            (Some(&min), Some(&max)) if max > 0 => Some(min as f64 / max as f64),
            _ => None,
        };

        Self {
            total_items: items.len(),
            graded_items,
            total_correct,
            failed_items: items.iter().filter(|i| i.outcome == ItemOutcome::Failed).count(),
            unlabeled_items: items.iter().filter(|i| i.true_label.is_none()).count(),
            cancelled_items: items
                .iter()
                .filter(|i| i.outcome == ItemOutcome::Cancelled)
                .count(),
            most_common_true_label: most_common(&true_dist),
            most_common_predicted_label: most_common(&pred_dist),
            true_label_distribution: true_dist,
            predicted_label_distribution: pred_dist,
            correct_by_class,
            class_balance_score,
        }
    }
}
