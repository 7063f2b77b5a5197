//! AI body extraction: turn receipt-like email text into structured fields.
//!
//! The model is held to a strict JSON-only contract. This adapter owns every
//! piece of leniency around that contract: markdown code fences are stripped
//! before parsing, an explicit `error` field or any parse failure is a typed
//! extraction failure (never partial data), and missing numeric/date fields
//! on success are defaulted deterministically because the receipt entity
//! requires always-valid values.

use crate::llm::{CompletionRequest, LlmError, LlmProvider, Message};
use papertrail_core::money;
use papertrail_core::{ExtractionResult, Provenance};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound on the characters of body text sent to the model.
pub const MAX_BODY_CHARS: usize = 6000;

const SYSTEM_PROMPT: &str = "You extract structured receipt data from emails. \
Respond with ONLY a JSON object, no prose and no markdown, with these fields: \
\"storeName\" (string), \"total\" (bare numeric string, no currency symbol), \
\"date\" (ISO calendar date YYYY-MM-DD; use today's date if absent), \
\"items\" (array of line-item strings, possibly empty), \
\"currency\" (ISO currency code string), \
\"confidence\" (number between 0 and 1). \
If the text contains no receipt or invoice data, respond with exactly \
{\"error\": \"No receipt data found\"}.";

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The model reported no receipt data in the text
    #[error("no receipt data: {0}")]
    NoReceiptData(String),

    #[error("model returned malformed JSON: {0}")]
    MalformedJson(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Typed adapter around the language-model capability.
pub struct BodyExtractor {
    provider: Arc<dyn LlmProvider>,
}

impl BodyExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// Extract receipt fields from subject + signature-stripped body text.
    pub async fn extract(
        &self,
        subject: &str,
        body: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        let text = truncate_chars(body, MAX_BODY_CHARS);
        let request = CompletionRequest {
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(format!("Subject: {subject}\n\n{text}")),
            ],
            max_tokens: Some(1024),
            temperature: Some(0.1),
        };

        let response = self.provider.complete(request).await?;
        let parsed = parse_model_response(&response.content)?;
        info!(store = %parsed.store_name, total = %parsed.total, "body extraction succeeded");
        Ok(parsed)
    }
}

/// Parse the model's text into an extraction, enforcing the contract.
fn parse_model_response(content: &str) -> Result<ExtractionResult, ExtractError> {
    let stripped = strip_code_fences(content);
    let value: serde_json::Value = serde_json::from_str(stripped)
        .map_err(|e| ExtractError::MalformedJson(e.to_string()))?;

    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        return Err(ExtractError::NoReceiptData(error.to_string()));
    }
    if !value.is_object() {
        return Err(ExtractError::MalformedJson("expected a JSON object".to_string()));
    }

    let store_name = value["storeName"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown store")
        .to_string();

    // Models return totals as strings or bare numbers; both are accepted.
    let total = match &value["total"] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    };

    let date = value["date"]
        .as_str()
        .and_then(money::parse_date_lenient);

    let items: Vec<String> = value["items"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|i| i.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let currency = value["currency"]
        .as_str()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());

    let confidence = value["confidence"]
        .as_f64()
        .map(|c| c.clamp(0.0, 1.0) as f32);

    debug!(?date, item_count = items.len(), "parsed model response");
    Ok(
        ExtractionResult::new(store_name, &total, date, items, Provenance::EmailBodyAi)
            .with_currency(currency)
            .with_confidence(confidence),
    )
}

/// Drop a wrapping markdown code fence (```json ... ``` or ``` ... ```).
fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(inner) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed;
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use chrono::{NaiveDate, Utc};

    async fn extract_with(response: &str) -> Result<ExtractionResult, ExtractError> {
        let extractor = BodyExtractor::new(Arc::new(MockLlm::always(response)));
        extractor.extract("Invoice", "Tax Invoice Total: R450.00").await
    }

    #[tokio::test]
    async fn well_formed_response_parses() {
        let result = extract_with(
            r#"{"storeName": "Spar", "total": "450.00", "date": "2024-03-01",
                "items": ["Milk", "Bread"], "currency": "zar", "confidence": 0.92}"#,
        )
        .await
        .unwrap();
        assert_eq!(result.store_name, "Spar");
        assert_eq!(result.total, "450.00");
        assert_eq!(result.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(result.items, vec!["Milk", "Bread"]);
        assert_eq!(result.currency.as_deref(), Some("ZAR"));
        assert_eq!(result.provenance, Provenance::EmailBodyAi);
    }

    #[tokio::test]
    async fn fenced_response_parses_identically() {
        let plain = extract_with(r#"{"storeName": "Spar", "total": "450.00"}"#)
            .await
            .unwrap();
        let fenced = extract_with("```json\n{\"storeName\": \"Spar\", \"total\": \"450.00\"}\n```")
            .await
            .unwrap();
        let bare_fence = extract_with("```\n{\"storeName\": \"Spar\", \"total\": \"450.00\"}\n```")
            .await
            .unwrap();
        assert_eq!(plain.store_name, fenced.store_name);
        assert_eq!(plain.total, fenced.total);
        assert_eq!(plain.total, bare_fence.total);
    }

    #[tokio::test]
    async fn error_object_is_a_failure_never_partial() {
        let err = extract_with(r#"{"error": "No receipt data found"}"#).await.unwrap_err();
        assert!(matches!(err, ExtractError::NoReceiptData(_)));
    }

    #[tokio::test]
    async fn malformed_json_is_a_failure() {
        let err = extract_with("Sure! Here's the receipt you asked for.").await.unwrap_err();
        assert!(matches!(err, ExtractError::MalformedJson(_)));
    }

    #[tokio::test]
    async fn missing_fields_default_deterministically() {
        let result = extract_with(r#"{"storeName": "Spar"}"#).await.unwrap();
        assert_eq!(result.total, "0.00");
        assert_eq!(result.date, Utc::now().date_naive());
        assert!(result.items.is_empty());
        assert!(result.currency.is_none());
    }

    #[tokio::test]
    async fn numeric_total_accepted() {
        let result = extract_with(r#"{"storeName": "Spar", "total": 450.5}"#).await.unwrap();
        assert_eq!(result.total, "450.50");
    }

    #[tokio::test]
    async fn missing_store_name_defaults() {
        let result = extract_with(r#"{"total": "10.00"}"#).await.unwrap();
        assert_eq!(result.store_name, "Unknown store");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "é".repeat(10);
        assert_eq!(truncate_chars(&s, 4).chars().count(), 4);
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
