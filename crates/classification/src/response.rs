//! Parsing of free-form LLM classification output.

use doc_classify_common::{Category, Classification, ClassificationError};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ModelAnswer {
    category: String,
    confidence: Value,
    #[serde(default, alias = "rationale")]
    reasoning: Option<String>,
}

/// Pull a JSON object out of model output, tolerating markdown fences and
/// surrounding prose.
#[must_use]
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if text.starts_with("```") {
        if let Some(start) = text.find('\n') {
            let after_first_line = &text[start + 1..];
            if let Some(end) = after_first_line.rfind("```") {
                return after_first_line[..end].trim();
            }
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return &text[start..=end];
        }
    }

    text
}

fn parse_confidence(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

fn validate(
    category: &str,
    confidence: Option<f64>,
    reasoning: Option<String>,
) -> Result<Classification, ClassificationError> {
    let category: Category = category
        .trim()
        .parse()
        .map_err(|e: doc_classify_common::ParseCategoryError| {
            ClassificationError::MalformedResponse(e.to_string())
        })?;

    let confidence = confidence
        .filter(|c| c.is_finite())
        .ok_or_else(|| ClassificationError::MalformedResponse("missing or non-numeric confidence".into()))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ClassificationError::MalformedResponse(format!(
            "confidence {confidence} outside [0, 1]"
        )));
    }

    Ok(Classification::new(
        category,
        confidence,
        reasoning.unwrap_or_default().trim(),
    ))
}

/// Strip quoting and trailing commas from a `key: value` line value.
fn clean_value(raw: &str) -> &str {
    raw.trim().trim_end_matches(',').trim().trim_matches('"').trim()
}

/// Fallback for answers that are not JSON, e.g.
/// `Category: Payslip\nConfidence: 0.9\nReasoning: ...`.
fn parse_lines(text: &str) -> Option<(String, Option<f64>, Option<String>)> {
    let mut category = None;
    let mut confidence = None;
    let mut reasoning = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.to_lowercase();
        let value = clean_value(value);
        if key.contains("category") && category.is_none() {
            category = Some(value.to_string());
        } else if key.contains("confidence") && confidence.is_none() {
            confidence = value.trim_end_matches('%').trim().parse().ok();
        } else if (key.contains("reasoning") || key.contains("rationale")) && reasoning.is_none() {
            reasoning = Some(value.to_string());
        }
    }

    category.map(|c| (c, confidence, reasoning))
}

/// Parse model output into a validated [`Classification`].
///
/// # Errors
///
/// [`ClassificationError::MalformedResponse`] when no category can be found,
/// the category is outside the closed set, or the confidence is missing or
/// outside `[0, 1]`.
pub fn parse_model_response(text: &str) -> Result<Classification, ClassificationError> {
    if let Ok(answer) = serde_json::from_str::<ModelAnswer>(extract_json(text)) {
        return validate(
            &answer.category,
            parse_confidence(&answer.confidence),
            answer.reasoning,
        );
    }

    let (category, confidence, reasoning) = parse_lines(text).ok_or_else(|| {
        let preview: String = text.chars().take(200).collect();
        ClassificationError::MalformedResponse(format!("no category in response: {preview}"))
    })?;
    validate(&category, confidence, reasoning)
}
