//! OCR/form-recognition adapter.
//!
//! The recognition service is a black box reached over HTTP: it takes a
//! base64-encoded raster image and answers with structured receipt fields, or
//! null when it found nothing. This adapter owns the field mapping so callers
//! only see [`OcrFields`] or a typed [`ServiceError`].

use async_trait::async_trait;
use papertrail_core::money;
use papertrail_core::{ExtractionResult, Provenance, ServiceError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Structured fields as returned by the recognition capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrFields {
    pub store_name: String,
    pub total: String,
    pub date: Option<String>,
    #[serde(default)]
    pub items: Vec<String>,
    pub confidence_score: Option<f32>,
}

impl OcrFields {
    /// Convert to a pipeline extraction, enforcing the field invariants.
    pub fn into_extraction(self) -> ExtractionResult {
        let date = self.date.as_deref().and_then(money::parse_date_lenient);
        ExtractionResult::new(
            self.store_name,
            &self.total,
            date,
            self.items,
            Provenance::AttachmentOcr,
        )
        .with_confidence(self.confidence_score)
    }
}

/// Trait for the receipt-recognition capability.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Analyze one raster image; `Ok(None)` means "no receipt recognized".
    async fn analyze_receipt(&self, image_base64: &str) -> Result<Option<OcrFields>, ServiceError>;
}

// ============================================================================
// HTTP client
// ============================================================================

/// HTTP client for the hosted recognition service.
pub struct ReceiptOcrClient {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl ReceiptOcrClient {
    pub fn new(endpoint: &str, api_key: &str) -> Result<Self, ServiceError> {
        let timeout_secs = 30;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_secs,
        })
    }

    /// Probe `RECEIPT_OCR_ENDPOINT` / `RECEIPT_OCR_KEY`.
    pub fn from_env() -> Option<Result<Self, ServiceError>> {
        let endpoint = std::env::var("RECEIPT_OCR_ENDPOINT").ok()?;
        let key = std::env::var("RECEIPT_OCR_KEY").unwrap_or_default();
        Some(Self::new(&endpoint, &key))
    }
}

#[async_trait]
impl OcrProvider for ReceiptOcrClient {
    async fn analyze_receipt(&self, image_base64: &str) -> Result<Option<OcrFields>, ServiceError> {
        let url = format!("{}/analyze", self.endpoint);
        let body = serde_json::json!({ "image": image_base64 });

        let response = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::timeout("ocr", self.timeout_secs)
                } else {
                    ServiceError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(format!("{status}: {text}")));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        if value.is_null() {
            debug!("ocr service recognized no receipt");
            return Ok(None);
        }

        let fields: OcrFields = serde_json::from_value(value)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        Ok(Some(fields))
    }
}

// ============================================================================
// Mock provider for testing
// ============================================================================

type MockOutcome = Result<Option<OcrFields>, ServiceError>;

/// Scripted OCR provider: plays back canned outcomes in order, repeating the
/// last.
pub struct MockOcr {
    outcomes: Vec<MockOutcome>,
    outcome_idx: std::sync::atomic::AtomicUsize,
}

impl MockOcr {
    pub fn new(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes,
            outcome_idx: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Always recognizes the same receipt.
    pub fn recognizing(fields: OcrFields) -> Self {
        Self::new(vec![Ok(Some(fields))])
    }

    /// Never recognizes anything.
    pub fn blank() -> Self {
        Self::new(vec![Ok(None)])
    }

    /// Fails every call.
    pub fn failing() -> Self {
        Self::new(vec![Err(ServiceError::Api("ocr unavailable".to_string()))])
    }

    /// How many analyses have been requested so far.
    pub fn calls(&self) -> usize {
        self.outcome_idx.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrProvider for MockOcr {
    async fn analyze_receipt(&self, _image_base64: &str) -> Result<Option<OcrFields>, ServiceError> {
        let idx = self
            .outcome_idx
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let clamped = idx.min(self.outcomes.len().saturating_sub(1));
        self.outcomes
            .get(clamped)
            .cloned()
            .unwrap_or_else(|| Err(ServiceError::Api("mock exhausted".to_string())))
    }
}
