//! Inbound email shapes as handed over by the mail-ingestion transport.
//!
//! The transport itself (webhook, MIME parsing) is out of scope; the pipeline
//! receives an already-parsed message. Messages are immutable for the
//! duration of one run and are never shared across runs.

use serde::{Deserialize, Serialize};

/// One attachment of an inbound email.
///
/// `content_id` marks an inline/embedded image (referenced from the HTML
/// body) rather than a regular attachment; inline content is overwhelmingly
/// decorative and the classifier treats it with a higher bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAttachment {
    /// Raw content bytes
    #[serde(default)]
    pub content: Vec<u8>,
    /// Declared content type, e.g. `image/jpeg`
    pub content_type: String,
    pub filename: String,
    /// Declared size; falls back to `content.len()` when absent
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub content_id: Option<String>,
}

impl EmailAttachment {
    /// Effective byte size: declared size when present, content length otherwise.
    pub fn byte_len(&self) -> usize {
        self.size.unwrap_or(self.content.len())
    }

    pub fn is_inline(&self) -> bool {
        self.content_id.is_some()
    }

    /// PDF by declared MIME type or by byte signature.
    pub fn is_pdf(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("application/pdf")
            || self.content.starts_with(b"%PDF-")
    }
}

/// A parsed inbound email, exactly as supplied by the mail transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEmailMessage {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub attachments: Vec<EmailAttachment>,
}

impl InboundEmailMessage {
    /// Whether the message carries any body content at all.
    pub fn has_body(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
            || self.html.as_deref().is_some_and(|h| !h.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(content_type: &str, content: &[u8]) -> EmailAttachment {
        EmailAttachment {
            content: content.to_vec(),
            content_type: content_type.to_string(),
            filename: "file".to_string(),
            size: None,
            content_id: None,
        }
    }

    #[test]
    fn pdf_detected_by_mime_type() {
        assert!(attachment("application/pdf", b"junk").is_pdf());
        assert!(attachment("APPLICATION/PDF", b"junk").is_pdf());
    }

    #[test]
    fn pdf_detected_by_signature() {
        assert!(attachment("application/octet-stream", b"%PDF-1.7 ...").is_pdf());
        assert!(!attachment("application/octet-stream", b"GIF89a").is_pdf());
    }

    #[test]
    fn declared_size_wins_over_content_length() {
        let mut a = attachment("image/png", &[0u8; 10]);
        assert_eq!(a.byte_len(), 10);
        a.size = Some(120_000);
        assert_eq!(a.byte_len(), 120_000);
    }

    #[test]
    fn has_body_ignores_whitespace() {
        let msg = InboundEmailMessage {
            from: "a@b.c".into(),
            to: "d@e.f".into(),
            subject: String::new(),
            text: Some("   \n".into()),
            html: None,
            attachments: vec![],
        };
        assert!(!msg.has_body());
    }
}
