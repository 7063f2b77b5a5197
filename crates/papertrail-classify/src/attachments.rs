//! Attachment classification: which attachments are worth an OCR call.
//!
//! Real-world forwarded receipts ride along with signature graphics, social
//! icons and tracking pixels. Single-signal filtering (size alone, or
//! filename alone) misfires on real traffic, so rejection requires the size
//! and filename signals to agree, and a receipt-like filename overrides any
//! filename-pattern rejection. PDFs are never filtered; they are too
//! information-dense to be signatures.

use papertrail_core::EmailAttachment;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// MIME types the pipeline knows how to process.
pub const RECOGNIZED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/heic",
    "image/heif",
    "application/pdf",
];

/// Absolute minimum byte size for a real receipt photo.
pub const MIN_IMAGE_BYTES: usize = 10 * 1024;

/// Minimum byte size for inline (content-id) images, which are
/// overwhelmingly decorative.
pub const MIN_INLINE_IMAGE_BYTES: usize = 20 * 1024;

/// Inline images below this need an explicit receipt hint in the filename.
pub const INLINE_HINT_FREE_BYTES: usize = 2 * MIN_INLINE_IMAGE_BYTES;

/// Filename fragments that mark an attachment as an actual receipt and
/// override every filename-pattern rejection.
pub const RECEIPT_FILENAME_HINTS: &[&str] = &["receipt", "invoice", "statement", "bill", "order"];

/// Filename fragments typical of decorative/signature imagery.
pub const DECORATIVE_FILENAME_PATTERNS: &[&str] = &[
    "logo",
    "icon",
    "banner",
    "signature",
    "badge",
    "avatar",
    "facebook",
    "twitter",
    "instagram",
    "linkedin",
    "youtube",
    "whatsapp",
    "social",
    "spacer",
    "divider",
    "unnamed",
];

/// Per-attachment decision, kept for logging only, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub filename: String,
    pub accepted: bool,
    /// Human-readable reason, present for rejected items
    pub reason: Option<String>,
}

/// Classifier output: what survives, plus counts for the processing log.
#[derive(Debug, Clone)]
pub struct ClassifiedAttachments {
    pub accepted: Vec<EmailAttachment>,
    /// Signature-like images dropped by the size/filename heuristics
    pub rejected_decorative: usize,
    pub verdicts: Vec<ClassificationVerdict>,
}

/// Filters attachments through the two-tier size + filename heuristics.
pub struct AttachmentClassifier {
    auto_numbered: Regex,
}

impl AttachmentClassifier {
    pub fn new() -> Self {
        Self {
            // Mail clients auto-name embedded images image001.png, image002.jpg, ...
            auto_numbered: Regex::new(r"(?i)^image\d+\.").unwrap(),
        }
    }

    /// Classify every attachment of one email, in arrival order.
    pub fn classify(&self, attachments: &[EmailAttachment]) -> ClassifiedAttachments {
        let mut accepted = Vec::new();
        let mut rejected_decorative = 0;
        let mut verdicts = Vec::new();

        for attachment in attachments {
            match self.verdict(attachment) {
                Ok(()) => {
                    verdicts.push(ClassificationVerdict {
                        filename: attachment.filename.clone(),
                        accepted: true,
                        reason: None,
                    });
                    accepted.push(attachment.clone());
                }
                Err(rejection) => {
                    debug!(filename = %attachment.filename, reason = %rejection.reason, "attachment rejected");
                    // Unsupported MIME types are not "signature-like"; every
                    // size/filename rejection is.
                    if rejection.decorative {
                        rejected_decorative += 1;
                    }
                    verdicts.push(ClassificationVerdict {
                        filename: attachment.filename.clone(),
                        accepted: false,
                        reason: Some(rejection.reason),
                    });
                }
            }
        }

        ClassifiedAttachments {
            accepted,
            rejected_decorative,
            verdicts,
        }
    }

    fn verdict(&self, attachment: &EmailAttachment) -> Result<(), Rejection> {
        let mime = attachment.content_type.to_lowercase();
        if !RECOGNIZED_MIME_TYPES.contains(&mime.as_str()) && !attachment.is_pdf() {
            return Err(Rejection::unsupported(format!(
                "unsupported content type: {}",
                attachment.content_type
            )));
        }

        // PDFs are never decorative.
        if attachment.is_pdf() {
            return Ok(());
        }

        let bytes = attachment.byte_len();
        let filename = attachment.filename.to_lowercase();
        let has_hint = RECEIPT_FILENAME_HINTS.iter().any(|h| filename.contains(h));

        if bytes < MIN_IMAGE_BYTES {
            return Err(Rejection::decorative(format!(
                "too small for a real receipt photo ({bytes} bytes < {MIN_IMAGE_BYTES})"
            )));
        }

        if attachment.is_inline() {
            if bytes < MIN_INLINE_IMAGE_BYTES {
                return Err(Rejection::decorative(format!(
                    "inline image below minimum ({bytes} bytes < {MIN_INLINE_IMAGE_BYTES})"
                )));
            }
            if bytes < INLINE_HINT_FREE_BYTES && !has_hint {
                return Err(Rejection::decorative(format!(
                    "inline image without receipt hint ({bytes} bytes < {INLINE_HINT_FREE_BYTES})"
                )));
            }
        }

        if !has_hint {
            if self.auto_numbered.is_match(&attachment.filename) {
                return Err(Rejection::decorative("auto-numbered embedded image".to_string()));
            }
            if let Some(pattern) = DECORATIVE_FILENAME_PATTERNS
                .iter()
                .find(|p| filename.contains(*p))
            {
                return Err(Rejection::decorative(format!(
                    "filename matches decorative pattern \"{pattern}\""
                )));
            }
        }

        Ok(())
    }
}

impl Default for AttachmentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal rejection record; `decorative` distinguishes signature-like
/// drops (logged as such) from unsupported content types.
struct Rejection {
    reason: String,
    decorative: bool,
}

impl Rejection {
    fn decorative(reason: String) -> Self {
        Self { reason, decorative: true }
    }

    fn unsupported(reason: String) -> Self {
        Self { reason, decorative: false }
    }
}
