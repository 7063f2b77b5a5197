//! Extraction results and persisted receipts.

use crate::money;
use crate::{AccountId, ReceiptId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which extraction path produced a receipt's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// OCR over an attachment image (or a rasterized PDF page)
    #[serde(rename = "attachment-ocr")]
    AttachmentOcr,
    /// Language-model extraction from the email body text
    #[serde(rename = "email-body-ai")]
    EmailBodyAi,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttachmentOcr => "attachment-ocr",
            Self::EmailBodyAi => "email-body-ai",
        }
    }
}

/// Structured fields pulled out of one receipt, from either extraction path.
///
/// Invariants: `total` is always a non-negative decimal string, `date` always
/// a valid calendar date (today when the source was unparseable), `items` may
/// be empty but never absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub store_name: String,
    pub total: String,
    pub date: NaiveDate,
    pub items: Vec<String>,
    pub currency: Option<String>,
    pub confidence: Option<f32>,
    pub provenance: Provenance,
}

impl ExtractionResult {
    /// Build a result enforcing the field invariants: total normalized to a
    /// non-negative decimal string, unparseable dates defaulting to today.
    pub fn new(
        store_name: impl Into<String>,
        total: &str,
        date: Option<NaiveDate>,
        items: Vec<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            total: money::normalize_total(total),
            date: date.unwrap_or_else(|| Utc::now().date_naive()),
            items,
            currency: None,
            confidence: None,
            provenance,
        }
    }

    pub fn with_currency(mut self, currency: Option<String>) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_confidence(mut self, confidence: Option<f32>) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Where a receipt's viewable image lives. Exactly one of the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReceiptImage {
    /// Uploaded to blob storage
    Blob { url: String, name: String },
    /// Blob upload failed or was skipped; bytes stored inline, base64-encoded
    Inline { base64: String },
}

/// A persisted expense record, owned by an account/workspace.
///
/// Created exactly once per successful extraction; never created for
/// rejected or failed runs. Every receipt carries *some* viewable image;
/// body-extracted receipts get a synthesized preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub account_id: AccountId,
    pub store_name: String,
    pub total: String,
    pub date: NaiveDate,
    pub items: Vec<String>,
    pub currency: Option<String>,
    pub confidence: Option<f32>,
    pub provenance: Provenance,
    /// Assigned by the external categorization capability; `"other"` when
    /// that call fails
    pub category: String,
    pub image: ReceiptImage,
    /// Always `"email"` for pipeline-created receipts
    pub source: String,
    /// Sender address of the originating email
    pub source_email: String,
    /// Advisory flag set by the duplicate screener; never blocks creation
    pub is_duplicate: bool,
    pub created_at: DateTime<Utc>,
}

impl Receipt {
    pub fn from_extraction(
        account_id: AccountId,
        extraction: &ExtractionResult,
        category: String,
        image: ReceiptImage,
        source_email: String,
    ) -> Self {
        Self {
            id: ReceiptId::new_v4(),
            account_id,
            store_name: extraction.store_name.clone(),
            total: extraction.total.clone(),
            date: extraction.date,
            items: extraction.items.clone(),
            currency: extraction.currency.clone(),
            confidence: extraction.confidence,
            provenance: extraction.provenance,
            category,
            image,
            source: "email".to_string(),
            source_email,
            is_duplicate: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_normalizes_total() {
        let r = ExtractionResult::new("Spar", "R1,234.50", None, vec![], Provenance::AttachmentOcr);
        assert_eq!(r.total, "1234.50");
    }

    #[test]
    fn extraction_defaults_date_to_today() {
        let r = ExtractionResult::new("Spar", "10", None, vec![], Provenance::EmailBodyAi);
        assert_eq!(r.date, Utc::now().date_naive());
    }

    #[test]
    fn provenance_serializes_to_kebab_tags() {
        assert_eq!(
            serde_json::to_string(&Provenance::AttachmentOcr).unwrap(),
            "\"attachment-ocr\""
        );
        assert_eq!(
            serde_json::to_string(&Provenance::EmailBodyAi).unwrap(),
            "\"email-body-ai\""
        );
    }

    #[test]
    fn receipt_carries_email_source() {
        let e = ExtractionResult::new("Spar", "10", None, vec![], Provenance::AttachmentOcr);
        let r = Receipt::from_extraction(
            AccountId::new_v4(),
            &e,
            "groceries".into(),
            ReceiptImage::Inline { base64: String::new() },
            "user@example.com".into(),
        );
        assert_eq!(r.source, "email");
        assert!(!r.is_duplicate);
    }
}
