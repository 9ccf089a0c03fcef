//! Key field extraction (dates, amounts, account numbers) from document text.

use doc_classify_common::Category;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const MAX_DATES: usize = 3;
const MAX_AMOUNTS: usize = 5;

/// Fields pulled out of a classified document for reviewers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dates: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub amounts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub account_number: Option<String>,
}

impl KeyInfo {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.amounts.is_empty() && self.account_number.is_none()
    }
}

struct Patterns {
    date: Regex,
    amount: Regex,
    account: [Regex; 2],
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        date: Regex::new(r"\b\d{1,2}[-/]\d{1,2}[-/]\d{2,4}\b").expect("valid regex"),
        amount: Regex::new(r"\$[\d,]+\.?\d*").expect("valid regex"),
        account: [
            Regex::new(r"account\s+number[:\s]+([*\d-]+)").expect("valid regex"),
            Regex::new(r"account[:\s]+([*\d-]+)").expect("valid regex"),
        ],
    })
}

/// Extract the first few dates and dollar amounts, plus the account number
/// for bank statements.
#[must_use]
pub fn extract_key_info(text: &str, category: Category) -> KeyInfo {
    let p = patterns();

    let account_number = if category == Category::BankStatement {
        let lowered = text.to_lowercase();
        p.account
            .iter()
            .find_map(|re| re.captures(&lowered))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    } else {
        None
    };

    KeyInfo {
        dates: p
            .date
            .find_iter(text)
            .take(MAX_DATES)
            .map(|m| m.as_str().to_string())
            .collect(),
        amounts: p
            .amount
            .find_iter(text)
            .take(MAX_AMOUNTS)
            .map(|m| m.as_str().to_string())
            .collect(),
        account_number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_dates_and_amounts() {
        let text = "Pay Period: 01/01/2024 - 01/31/2024 Paid 2/5/24 and 3-6-2024 \
                    Gross Pay: $5,000.00 Tax: $750.00 Net Pay: $3,800";
        let info = extract_key_info(text, Category::Payslip);

        assert_eq!(info.dates, vec!["01/01/2024", "01/31/2024", "2/5/24"]);
        assert_eq!(info.amounts, vec!["$5,000.00", "$750.00", "$3,800"]);
        assert!(info.account_number.is_none());
    }

    #[test]
    fn test_account_number_only_for_bank_statements() {
        let text = "Account Number: ****1234 Ending Balance $10.00";
        let info = extract_key_info(text, Category::BankStatement);
        assert_eq!(info.account_number.as_deref(), Some("****1234"));

        let info = extract_key_info(text, Category::SavingsStatement);
        assert!(info.account_number.is_none());
    }

    #[test]
    fn test_empty_text() {
        assert!(extract_key_info("", Category::Unknown).is_empty());
    }
}
