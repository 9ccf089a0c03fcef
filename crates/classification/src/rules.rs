//! Deterministic keyword and pattern classifier.
//!
//! Scores every category against the lowercased text: each keyword found is
//! worth 1 point, each regex pattern 2. The highest score wins; ties go to
//! the category that comes first in canonical order.

use crate::{Result, TypeClassifier};
use async_trait::async_trait;
use doc_classify_common::{Category, Classification};
use regex::Regex;
use std::sync::OnceLock;

const KEYWORD_WEIGHT: usize = 1;
const PATTERN_WEIGHT: usize = 2;
const MAX_CONFIDENCE: f64 = 0.95;
const BASE_CONFIDENCE: f64 = 0.3;
const SCORE_SCALE: f64 = 0.8;

struct RuleSet {
    category: Category,
    keywords: &'static [&'static str],
    patterns: &'static [&'static str],
}

const RULES: &[RuleSet] = &[
    RuleSet {
        category: Category::GovernmentId,
        keywords: &[
            "driver", "license", "passport", "national id", "identity card",
            "drivers license", "driver's license", "state id", "identification",
            "license number", "dl number", "passport number", "id number",
        ],
        patterns: &[
            r"\b(drivers?\s+licen[cs]e|dl)\b",
            r"\bpassport\s+number\b",
            r"\bid\s*number\b",
            r"\bstate\s+id\b",
        ],
    },
    RuleSet {
        category: Category::Payslip,
        keywords: &[
            "payslip", "pay slip", "pay stub", "paystub", "salary", "wages",
            "earnings", "gross pay", "net pay", "deductions", "tax withheld",
            "employer", "employee", "pay period", "hours worked", "overtime",
        ],
        patterns: &[
            r"\b(gross|net)\s+pay\b",
            r"\bpay\s+(period|stub|slip)\b",
            r"\bearnings\b",
            r"\bdeductions\b",
            r"\btax\s+with[he]eld\b",
        ],
    },
    RuleSet {
        category: Category::BankStatement,
        keywords: &[
            "bank statement", "account statement", "checking account", "savings account",
            "balance", "transaction", "deposit", "withdrawal", "transfer",
            "beginning balance", "ending balance", "account number", "routing number",
            "statement period", "credit card", "american express", "visa", "mastercard",
        ],
        patterns: &[
            r"\b(bank|account)\s+statement\b",
            r"\b(checking|savings)\s+account\b",
            r"\b(beginning|ending)\s+balance\b",
            r"\baccount\s+number\b",
            r"\bstatement\s+period\b",
            r"\b(american\s+express|amex|visa|mastercard)\b",
        ],
    },
    RuleSet {
        category: Category::EmploymentLetter,
        keywords: &[
            "employment letter", "employment verification", "job offer", "offer letter",
            "employment confirmation", "work verification", "position", "title",
            "start date", "hire date", "employment status", "full time", "part time",
            "salary", "compensation", "benefits", "hr department", "human resources",
        ],
        patterns: &[
            r"\bemployment\s+(letter|verification|confirmation)\b",
            r"\b(job|offer)\s+letter\b",
            r"\bstart\s+date\b",
            r"\bemployment\s+status\b",
            r"\b(full|part)\s+time\b",
        ],
    },
    RuleSet {
        category: Category::UtilityBill,
        keywords: &[
            "utility bill", "electric bill", "gas bill", "water bill", "electricity",
            "natural gas", "water service", "sewage", "internet bill", "phone bill",
            "cable bill", "utility company", "service period", "meter reading",
            "kilowatt", "kwh", "usage", "due date", "amount due",
        ],
        patterns: &[
            r"\b(utility|electric|gas|water)\s+bill\b",
            r"\b(electricity|natural\s+gas)\b",
            r"\bmeter\s+reading\b",
            r"\bkilowatt|kwh\b",
            r"\bservice\s+period\b",
        ],
    },
    RuleSet {
        category: Category::SavingsStatement,
        keywords: &[
            "savings statement", "investment statement", "portfolio statement",
            "savings account", "investment account", "mutual fund", "stocks",
            "bonds", "securities", "dividend", "interest earned", "capital gains",
            "portfolio value", "investment summary", "asset allocation",
        ],
        patterns: &[
            r"\b(savings|investment|portfolio)\s+statement\b",
            r"\binvestment\s+account\b",
            r"\bmutual\s+fund\b",
            r"\b(dividend|interest)\s+earned\b",
            r"\bportfolio\s+value\b",
        ],
    },
];

struct CompiledRules {
    rules: &'static RuleSet,
    patterns: Vec<(&'static str, Regex)>,
}

impl CompiledRules {
    fn max_score(&self) -> usize {
        self.rules.keywords.len() * KEYWORD_WEIGHT + self.patterns.len() * PATTERN_WEIGHT
    }
}

fn compiled_rules() -> &'static [CompiledRules] {
    static COMPILED: OnceLock<Vec<CompiledRules>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|rules| CompiledRules {
                rules,
                patterns: rules
                    .patterns
                    .iter()
                    .map(|p| (*p, Regex::new(&format!("(?i){p}")).expect("rule patterns are valid")))
                    .collect(),
            })
            .collect()
    })
}

#[derive(Debug)]
struct Score {
    category: Category,
    score: usize,
    max_score: usize,
    matches: Vec<String>,
}

fn score(rules: &CompiledRules, normalized: &str) -> Score {
    let mut matches = Vec::new();
    let mut score = 0;

    for keyword in rules.rules.keywords {
        if normalized.contains(keyword) {
            score += KEYWORD_WEIGHT;
            matches.push((*keyword).to_string());
        }
    }
    for (source, pattern) in &rules.patterns {
        if pattern.is_match(normalized) {
            score += PATTERN_WEIGHT;
            matches.push(format!("pattern: {source}"));
        }
    }

    Score {
        category: rules.rules.category,
        score,
        max_score: rules.max_score(),
        matches,
    }
}

/// Offline fallback classifier. Never fails: text it cannot place is
/// reported as `Unknown` with zero confidence.
#[derive(Debug, Clone)]
pub struct RuleBasedClassifier {
    min_text_chars: usize,
}

impl RuleBasedClassifier {
    #[must_use]
    pub fn new(min_text_chars: usize) -> Self {
        Self { min_text_chars }
    }

    /// Synchronous core of [`TypeClassifier::classify`].
    #[must_use]
    pub fn classify_text(&self, text: &str) -> Classification {
        if text.trim().chars().count() < self.min_text_chars {
            return Classification::new(
                Category::Unknown,
                0.0,
                "Insufficient text content for classification",
            );
        }

        let normalized = text.trim().to_lowercase();
        let best = compiled_rules()
            .iter()
            .map(|rules| score(rules, &normalized))
            .filter(|s| s.score > 0)
            .fold(None::<Score>, |best, candidate| match best {
                Some(b) if b.score >= candidate.score => Some(b),
                _ => Some(candidate),
            });

        let Some(best) = best else {
            return Classification::new(
                Category::Unknown,
                0.0,
                "No matching patterns found in document text",
            );
        };

        let confidence = (best.score as f64 / best.max_score as f64 * SCORE_SCALE
            + BASE_CONFIDENCE)
            .min(MAX_CONFIDENCE);

        let mut rationale = format!(
            "Classified as {} based on {} matching indicators: {}",
            best.category,
            best.matches.len(),
            best.matches.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        );
        if best.matches.len() > 3 {
            rationale.push_str(&format!(" and {} others", best.matches.len() - 3));
        }
        rationale.push_str(". This is an offline classification using rule-based matching.");

        Classification::new(best.category, confidence, rationale)
    }
}

impl Default for RuleBasedClassifier {
    fn default() -> Self {
        Self::new(doc_classify_common::config::DEFAULT_MIN_TEXT_CHARS)
    }
}

#[async_trait]
impl TypeClassifier for RuleBasedClassifier {
    fn name(&self) -> &str {
        "rule_based"
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        Ok(self.classify_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rule_patterns_compile() {
        assert_eq!(compiled_rules().len(), Category::DOCUMENT_TYPES.len());
        for (compiled, category) in compiled_rules().iter().zip(Category::DOCUMENT_TYPES) {
            assert_eq!(compiled.rules.category, category);
        }
    }

    #[test]
    fn test_classifies_bank_statement() {
        let text = "FIRST NATIONAL BANK STATEMENT\nAccount Number: ****1234\n\
                    Statement Period: Jan 1 - Jan 31, 2024\nBeginning Balance: $2,500.00\n\
                    Ending Balance: $2,750.00";
        let c = RuleBasedClassifier::default().classify_text(text);

        assert_eq!(c.category, Category::BankStatement);
        assert!(c.confidence > 0.3 && c.confidence <= 0.95);
        assert!(c.rationale.starts_with("Classified as Bank Statement based on"));
        assert!(c.rationale.ends_with("rule-based matching."));
    }

    #[test]
    fn test_classifies_payslip() {
        let text = "Pay Period: 01/01/2024 - 01/31/2024 Employee ID: E12345 \
                    Gross Pay: $5,000.00 Deductions: $1,200.00 Net Pay: $3,800.00";
        let c = RuleBasedClassifier::default().classify_text(text);
        assert_eq!(c.category, Category::Payslip);
    }

    #[test]
    fn test_confidence_formula() {
        // "passport" keyword plus "passport number" keyword and pattern:
        // score = 1 + 1 + 2 = 4, max = 13 + 4*2 = 21
        let c = RuleBasedClassifier::default().classify_text("passport number X1234567");
        assert_eq!(c.category, Category::GovernmentId);
        let expected = 4.0 / 21.0 * 0.8 + 0.3;
        assert!((c.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_text() {
        let c = RuleBasedClassifier::default().classify_text("  visa ");
        assert_eq!(c.category, Category::Unknown);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.rationale, "Insufficient text content for classification");
    }

    #[test]
    fn test_no_match() {
        let c = RuleBasedClassifier::default().classify_text("Lorem ipsum dolor sit amet");
        assert_eq!(c.category, Category::Unknown);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.rationale, "No matching patterns found in document text");
    }

    #[test]
    fn test_tie_goes_to_canonical_order() {
        // "salary" is a keyword for both Payslip and Employment Letter
        let c = RuleBasedClassifier::default().classify_text("the salary is attached here");
        assert_eq!(c.category, Category::Payslip);
    }

    #[tokio::test]
    async fn test_trait_never_fails() {
        let classifier = RuleBasedClassifier::default();
        assert!(classifier.classify("").await.is_ok());
        assert_eq!(classifier.name(), "rule_based");
    }
}
