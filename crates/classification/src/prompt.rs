//! Classification prompt for the LLM classifier.

use doc_classify_common::Category;

const EXAMPLES: &str = r#"Classification Examples:

Text: "DRIVER LICENSE Class C License Number: D123456789 Date of Birth: 01/15/1985 Expires: 12/31/2027"
Category: Government ID

Text: "Pay Period: 01/01/2024 - 01/31/2024 Employee ID: E12345 Gross Pay: $5,000.00 Net Pay: $3,800.00"
Category: Payslip

Text: "BANK STATEMENT Account Number: ****1234 Statement Period: Jan 1 - Jan 31, 2024 Ending Balance: $2,750.00"
Category: Bank Statement

Text: "Employment Verification Letter John Smith has been employed with ABC Corporation since March 2020"
Category: Employment Letter

Text: "Electric Company Monthly Bill Service Period: Jan 1-31, 2024 Amount Due: $145.67"
Category: Utility Bill

Text: "Savings Account Statement Account Type: High-Yield Savings Interest Rate: 2.5% APY Interest Earned: $312.50"
Category: Savings Statement"#;

const INSTRUCTIONS: &str = r#"Instructions:
1. Look for identifying features, structure and terminology.
2. If the document mixes content, classify by its primary purpose.
3. If it matches none of the categories, answer "Unknown" with a low confidence.
4. Give a confidence between 0.0 and 1.0 and a brief reasoning.

Respond with JSON only:
{"category": "<category>", "confidence": 0.95, "reasoning": "<brief explanation>"}"#;

/// Truncate to at most `max_chars` characters, appending `...` when cut.
#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Build the classification prompt for `text`.
#[must_use]
pub fn build_prompt(text: &str, max_chars: usize) -> String {
    let categories = Category::DOCUMENT_TYPES
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert document classifier for home loan applications. \
         Classify the document text into exactly one of these categories:\n\n\
         {categories}\n\n<text>\n{}\n</text>\n\n{EXAMPLES}\n\n{INSTRUCTIONS}",
        truncate_text(text, max_chars)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abcdef", 10), "abcdef");
        assert_eq!(truncate_text("abcdef", 6), "abcdef");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        // multi-byte characters are cut on char boundaries
        assert_eq!(truncate_text("ééééé", 2), "éé...");
    }

    #[test]
    fn test_prompt_lists_categories_and_text() {
        let prompt = build_prompt("Gross Pay: $5,000", 4000);
        for category in Category::DOCUMENT_TYPES {
            assert!(prompt.contains(&format!("- {category}")));
        }
        assert!(prompt.contains("<text>\nGross Pay: $5,000\n</text>"));
        assert!(!prompt.contains("- Unknown"));
    }
}
