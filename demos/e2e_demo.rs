//! End-to-End Papertrail Demo
//!
//! Drives the full ingestion pipeline the way the mail transport would:
//! 1. A forwarded photo receipt (attachment OCR path)
//! 2. A plain-text order confirmation (AI body extraction + preview image)
//! 3. Signature-only noise (filtered out, failure notice queued)
//!
//! Everything runs against in-memory backends with scripted recognition
//! services, so the demo is deterministic and needs no network access.

use std::sync::Arc;

use papertrail_core::{EmailAttachment, InboundEmailMessage, ReceiptImage};
use papertrail_extract::{MockLlm, MockOcr, OcrFields};
use papertrail_pipeline::{Pipeline, PipelineServices};
use papertrail_store::{
    KeywordCategorizer, MemoryAccountDirectory, MemoryBlobStore, MemoryLogStore,
    MemoryReceiptStore, RecordingNotifier,
};

fn photo_receipt_email() -> InboundEmailMessage {
    InboundEmailMessage {
        from: "jane.doe@gmail.com".to_string(),
        to: "jane1@receipts.papertrail.com".to_string(),
        subject: "Fwd: till slip".to_string(),
        text: Some("Forwarding my grocery slip.".to_string()),
        html: None,
        attachments: vec![EmailAttachment {
            content: vec![0xFF, 0xD8, 0xFF, 0xE0],
            content_type: "image/jpeg".to_string(),
            filename: "receipt.jpg".to_string(),
            size: Some(146_000),
            content_id: None,
        }],
    }
}

fn order_confirmation_email() -> InboundEmailMessage {
    InboundEmailMessage {
        from: "orders@takealot.com".to_string(),
        to: "jane1@receipts.papertrail.com".to_string(),
        subject: "Order confirmation #51223".to_string(),
        text: Some(
            "Tax Invoice\n\
             Takealot Online (Pty) Ltd\n\
             1 x Kettle  R899.00\n\
             Total: R899.00 (VAT incl.)\n\
             Thank you for your order\n\
             Sent from our order system"
                .to_string(),
        ),
        html: None,
        attachments: vec![],
    }
}

fn signature_noise_email() -> InboundEmailMessage {
    InboundEmailMessage {
        from: "colleague@corp.example".to_string(),
        to: "jane1@receipts.papertrail.com".to_string(),
        subject: "Re: lunch".to_string(),
        text: Some("See you at 1pm.".to_string()),
        html: None,
        attachments: vec![
            EmailAttachment {
                content: vec![0u8; 64],
                content_type: "image/png".to_string(),
                filename: "company-logo.png".to_string(),
                size: Some(4_200),
                content_id: Some("part1.logo@corp".to_string()),
            },
            EmailAttachment {
                content: vec![0u8; 64],
                content_type: "image/png".to_string(),
                filename: "facebook.png".to_string(),
                size: Some(2_100),
                content_id: Some("part2.fb@corp".to_string()),
            },
        ],
    }
}

#[tokio::main]
async fn main() {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           PAPERTRAIL END-TO-END DEMO                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // ========================================================================
    // Wire up the pipeline against in-memory backends
    // ========================================================================

    let receipts = Arc::new(MemoryReceiptStore::new());
    let log = Arc::new(MemoryLogStore::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let ocr = MockOcr::recognizing(OcrFields {
        store_name: "Spar".to_string(),
        total: "R 452.80".to_string(),
        date: Some("2024-06-12".to_string()),
        items: vec![
            "Milk 2L".to_string(),
            "Bread brown".to_string(),
            "Coffee 250g".to_string(),
        ],
        confidence_score: Some(0.93),
    });
    let llm = MockLlm::always(
        r#"{"storeName": "Takealot", "total": "899.00", "date": "2024-06-14",
            "items": ["Kettle"], "currency": "ZAR", "confidence": 0.88}"#,
    );

    let services = PipelineServices {
        accounts: Arc::new(
            MemoryAccountDirectory::new().with_account("jane1", "jane@example.com", "Jane"),
        ),
        receipts: receipts.clone(),
        log: log.clone(),
        blobs: Arc::new(MemoryBlobStore::new()),
        categorizer: Arc::new(KeywordCategorizer::new()),
        notifier: notifier.clone(),
        ocr: Arc::new(ocr),
        llm: Arc::new(llm),
    };
    let pipeline = Pipeline::new(services);

    // ========================================================================
    // Run three inbound emails through the pipeline
    // ========================================================================

    let emails = [
        ("Photo receipt", photo_receipt_email()),
        ("Order confirmation", order_confirmation_email()),
        ("Signature noise", signature_noise_email()),
    ];

    for (label, email) in emails {
        println!("━━━ {label} ━━━");
        println!("  from: {}", email.from);
        println!("  attachments: {}", email.attachments.len());

        let report = pipeline.process_inbound_email(email).await;

        println!("  outcome: {}", report.outcome.as_str());
        if let Some(error) = &report.error {
            println!("  error: {error}");
        }
        println!();
    }

    // ========================================================================
    // What got persisted
    // ========================================================================

    println!("━━━ Persisted receipts ━━━");
    for receipt in receipts.all() {
        let image = match &receipt.image {
            ReceiptImage::Blob { name, .. } => format!("blob:{name}"),
            ReceiptImage::Inline { base64 } => format!("inline ({}b)", base64.len()),
        };
        println!(
            "  • {} | {} {} | {} | {} | {} [{}]",
            receipt.store_name,
            receipt.currency.as_deref().unwrap_or("-"),
            receipt.total,
            receipt.date,
            receipt.category,
            image,
            receipt.provenance.as_str(),
        );
    }
    println!();

    println!("━━━ Processing log ━━━");
    for entry in log.all() {
        println!(
            "  • {} → {} ({}/{} attachments valid, {} receipts, {}ms)",
            entry.subject,
            entry.outcome.as_str(),
            entry.valid_attachment_count,
            entry.attachment_count,
            entry.receipts_created,
            entry.duration_ms,
        );
    }
    println!();

    println!("━━━ Notifications ━━━");
    for notification in notifier.sent() {
        println!("  • {notification:?}");
    }
}
