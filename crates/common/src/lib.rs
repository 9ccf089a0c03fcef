//! Common types shared by the document classification crates.
//!
//! A [`ClassificationResult`] can only be built through [`ConfidenceGate`], so
//! every result that leaves the orchestrator already carries the manual review
//! decision.

pub mod config;
pub mod error;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use config::ClassifierConfig;
pub use error::{
    ClassificationError, ConfigError, ExtractionError, OrchestrationError, ParseCategoryError,
    StageError, StageFailure,
};

/// Document type label. Closed set: six document types plus `Unknown`.
///
/// Variant order is the canonical category order used for confusion matrix
/// axes and tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Government ID", alias = "government_id")]
    GovernmentId,
    #[serde(rename = "Payslip", alias = "payslip")]
    Payslip,
    #[serde(rename = "Bank Statement", alias = "bank_statement")]
    BankStatement,
    #[serde(rename = "Employment Letter", alias = "employment_letter")]
    EmploymentLetter,
    #[serde(rename = "Utility Bill", alias = "utility_bill")]
    UtilityBill,
    #[serde(rename = "Savings Statement", alias = "savings_statement")]
    SavingsStatement,
    #[serde(rename = "Unknown", alias = "unknown")]
    Unknown,
}

impl Category {
    /// All labels in canonical order, `Unknown` last.
    pub const ALL: [Category; 7] = [
        Category::GovernmentId,
        Category::Payslip,
        Category::BankStatement,
        Category::EmploymentLetter,
        Category::UtilityBill,
        Category::SavingsStatement,
        Category::Unknown,
    ];

    /// The six real document types (everything except `Unknown`).
    pub const DOCUMENT_TYPES: [Category; 6] = [
        Category::GovernmentId,
        Category::Payslip,
        Category::BankStatement,
        Category::EmploymentLetter,
        Category::UtilityBill,
        Category::SavingsStatement,
    ];

    /// Human-readable label, as used in reports and prompts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Category::GovernmentId => "Government ID",
            Category::Payslip => "Payslip",
            Category::BankStatement => "Bank Statement",
            Category::EmploymentLetter => "Employment Letter",
            Category::UtilityBill => "Utility Bill",
            Category::SavingsStatement => "Savings Statement",
            Category::Unknown => "Unknown",
        }
    }

    /// Position in the canonical order.
    #[must_use]
    pub fn canonical_index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn is_unknown(self) -> bool {
        self == Category::Unknown
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    /// Accepts display labels and snake/kebab variants, case-insensitively
    /// ("Bank Statement", "bank_statement", "BANK-STATEMENT").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Category::ALL
            .into_iter()
            .find(|c| {
                let label: String = c
                    .label()
                    .chars()
                    .filter(char::is_ascii_alphanumeric)
                    .map(|ch| ch.to_ascii_lowercase())
                    .collect();
                label == key
            })
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Raw output of a type classifier, before the confidence gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    /// In `[0.0, 1.0]`.
    pub confidence: f64,
    pub rationale: String,
}

impl Classification {
    pub fn new(category: Category, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            category,
            confidence,
            rationale: rationale.into(),
        }
    }
}

/// Which implementation in a ranked chain produced a stage's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSource {
    /// Implementation name (e.g. "textract", "rule_based")
    pub implementation: String,
    /// 0 for the primary, 1 for the first fallback, and so on
    pub rank: usize,
}

impl StageSource {
    pub fn new(implementation: impl Into<String>, rank: usize) -> Self {
        Self {
            implementation: implementation.into(),
            rank,
        }
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.rank > 0
    }
}

/// Extractor and classifier actually used for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePath {
    pub extractor: StageSource,
    pub classifier: StageSource,
}

impl SourcePath {
    /// True if either stage had to fall back.
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        self.extractor.is_fallback() || self.classifier.is_fallback()
    }
}

/// Final, gated outcome of classifying one document.
///
/// Immutable: fields are private and the only constructor is
/// [`ConfidenceGate::apply`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    category: Category,
    confidence: f64,
    rationale: String,
    needs_manual_review: bool,
    source_path: SourcePath,
    /// Category the classifier returned before gating
    classifier_category: Category,
    /// Length in characters of the extracted text that was classified
    text_length: usize,
}

impl ClassificationResult {
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    #[must_use]
    pub fn needs_manual_review(&self) -> bool {
        self.needs_manual_review
    }

    #[must_use]
    pub fn source_path(&self) -> &SourcePath {
        &self.source_path
    }

    #[must_use]
    pub fn classifier_category(&self) -> Category {
        self.classifier_category
    }

    #[must_use]
    pub fn text_length(&self) -> usize {
        self.text_length
    }

    /// Short human-readable description of the confidence level.
    #[must_use]
    pub fn confidence_explanation(&self) -> String {
        confidence_explanation(self.classifier_category, self.confidence)
    }
}

/// Describe a confidence score in words.
#[must_use]
pub fn confidence_explanation(category: Category, confidence: f64) -> String {
    if confidence >= 0.9 {
        format!("High confidence - clear {category} indicators present")
    } else if confidence >= 0.7 {
        format!("Good confidence - most {category} characteristics identified")
    } else if confidence >= 0.5 {
        format!("Moderate confidence - some {category} features detected")
    } else {
        format!("Low confidence - ambiguous or unclear {category} classification")
    }
}

/// Routes low-confidence classifications to manual review.
///
/// Below the threshold the category is forced to `Unknown` and
/// `needs_manual_review` is set. The gate never rejects a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceGate {
    review_threshold: f64,
}

impl ConfidenceGate {
    /// `review_threshold` is clamped to `[0.0, 1.0]`.
    pub fn new(review_threshold: f64) -> Self {
        let review_threshold = if review_threshold.is_nan() {
            0.0
        } else {
            review_threshold.clamp(0.0, 1.0)
        };
        Self { review_threshold }
    }

    #[must_use]
    pub fn review_threshold(&self) -> f64 {
        self.review_threshold
    }

    pub fn apply(
        &self,
        classification: Classification,
        source_path: SourcePath,
        text_length: usize,
    ) -> ClassificationResult {
        let Classification {
            category: classifier_category,
            confidence,
            rationale,
        } = classification;

        // NaN compares false against everything; treat it as no confidence.
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        let needs_manual_review = confidence < self.review_threshold;
        let category = if needs_manual_review {
            tracing::debug!(
                "Confidence {:.3} below review threshold {:.3}, routing {} to manual review",
                confidence,
                self.review_threshold,
                classifier_category
            );
            Category::Unknown
        } else {
            classifier_category
        };

        ClassificationResult {
            category,
            confidence,
            rationale,
            needs_manual_review,
            source_path,
            classifier_category,
            text_length,
        }
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::new(config::DEFAULT_REVIEW_THRESHOLD)
    }
}
