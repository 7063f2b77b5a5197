//! End-to-end pipeline scenarios over in-memory backends.
//!
//! Each test drives `Pipeline::process_inbound_email` the way the mail
//! transport would, and asserts the full contract: outcome status, receipts,
//! the single processing-log entry, and queued notifications.

use std::sync::Arc;

use papertrail_core::{
    EmailAttachment, InboundEmailMessage, PipelineOutcome, Provenance, ReceiptImage,
};
use papertrail_extract::{MockLlm, MockOcr, OcrFields};
use papertrail_pipeline::{Pipeline, PipelineServices};
use papertrail_store::{
    KeywordCategorizer, MemoryAccountDirectory, MemoryBlobStore, MemoryLogStore,
    MemoryReceiptStore, RecordingNotifier, SentNotification,
};

// ============================================================================
// Harness
// ============================================================================

struct World {
    pipeline: Pipeline,
    receipts: Arc<MemoryReceiptStore>,
    log: Arc<MemoryLogStore>,
    notifier: Arc<RecordingNotifier>,
}

fn world(ocr: MockOcr, llm: MockLlm) -> World {
    let receipts = Arc::new(MemoryReceiptStore::new());
    let log = Arc::new(MemoryLogStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
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
    World {
        pipeline: Pipeline::new(services),
        receipts,
        log,
        notifier,
    }
}

fn spar_fields() -> OcrFields {
    OcrFields {
        store_name: "Spar".to_string(),
        total: "450.00".to_string(),
        date: Some("2024-03-01".to_string()),
        items: vec!["Milk 2L".to_string(), "Bread".to_string()],
        confidence_score: Some(0.93),
    }
}

const BODY_RECEIPT_JSON: &str = r#"{"storeName": "ACME Stationers", "total": "450.00",
    "date": "2024-03-01", "items": ["Paper A4", "Toner"], "currency": "ZAR",
    "confidence": 0.88}"#;

fn jpeg_attachment(filename: &str, bytes: usize) -> EmailAttachment {
    EmailAttachment {
        content: vec![0xAB; 128],
        content_type: "image/jpeg".to_string(),
        filename: filename.to_string(),
        size: Some(bytes),
        content_id: None,
    }
}

fn message(
    to: &str,
    text: Option<&str>,
    attachments: Vec<EmailAttachment>,
) -> InboundEmailMessage {
    InboundEmailMessage {
        from: "forwarder@example.com".to_string(),
        to: to.to_string(),
        subject: "Fwd: receipt".to_string(),
        text: text.map(str::to_string),
        html: None,
        attachments,
    }
}

// ============================================================================
// Scenario A: unknown alias
// ============================================================================

#[tokio::test]
async fn scenario_a_unknown_alias() {
    let w = world(MockOcr::blank(), MockLlm::failing());
    let report = w
        .pipeline
        .process_inbound_email(message(
            "stranger9@receipts.papertrail.com",
            Some("hello"),
            vec![jpeg_attachment("receipt.jpg", 120_000)],
        ))
        .await;

    assert_eq!(report.outcome, PipelineOutcome::UserNotFound);
    assert!(!report.success);
    assert!(w.receipts.all().is_empty());

    let entries = w.log.all();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, PipelineOutcome::UserNotFound);
    assert_eq!(entries[0].alias.as_deref(), Some("stranger9"));
    assert!(entries[0].user_id.is_none());

    // Nobody to notify
    assert!(w.notifier.sent().is_empty());
}

// ============================================================================
// Scenario B: valid JPEG attachment, OCR succeeds
// ============================================================================

#[tokio::test]
async fn scenario_b_jpeg_attachment_success() {
    let w = world(MockOcr::recognizing(spar_fields()), MockLlm::failing());
    let report = w
        .pipeline
        .process_inbound_email(message(
            "jane1@receipts.papertrail.com",
            None,
            vec![jpeg_attachment("receipt.jpg", 120_000)],
        ))
        .await;

    assert_eq!(report.outcome, PipelineOutcome::Success);
    assert_eq!(report.receipt_ids.len(), 1);

    let receipts = w.receipts.all();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].source, "email");
    assert_eq!(receipts[0].provenance, Provenance::AttachmentOcr);
    assert_eq!(receipts[0].store_name, "Spar");
    assert_eq!(receipts[0].total, "450.00");
    assert_eq!(receipts[0].category, "groceries");

    let entries = w.log.all();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, PipelineOutcome::Success);
    assert_eq!(entries[0].attachment_count, 1);
    assert_eq!(entries[0].valid_attachment_count, 1);
    assert_eq!(entries[0].receipts_created, 1);

    assert_eq!(
        w.notifier.sent(),
        vec![SentNotification::Confirmation {
            email: "jane@example.com".to_string(),
            receipt_count: 1,
        }]
    );
}

// ============================================================================
// Scenario C: PDF fails, body fallback succeeds
// ============================================================================

#[tokio::test]
async fn scenario_c_pdf_failure_body_fallback() {
    // PDF conversion fails (renderer disabled), so the attachment path dies;
    // the body carries "tax invoice", "total" and more.
    let w = world(MockOcr::failing(), MockLlm::always(BODY_RECEIPT_JSON));
    let report = w
        .pipeline
        .process_inbound_email(message(
            "jane1@receipts.papertrail.com",
            Some("Tax Invoice attached.\nTotal: R450.00\nThank you for your order"),
            vec![EmailAttachment {
                content: b"%PDF-1.5 broken".to_vec(),
                content_type: "application/pdf".to_string(),
                filename: "invoice.pdf".to_string(),
                size: Some(80_000),
                content_id: None,
            }],
        ))
        .await;

    // Fallback-success status per the outcome taxonomy
    assert_eq!(report.outcome, PipelineOutcome::Success);
    assert_eq!(report.receipt_ids.len(), 1);

    let receipts = w.receipts.all();
    assert_eq!(receipts[0].provenance, Provenance::EmailBodyAi);
    assert_eq!(receipts[0].store_name, "ACME Stationers");
    // A synthesized preview image fills the image slot
    match &receipts[0].image {
        ReceiptImage::Blob { name, .. } => assert!(name.ends_with("preview.jpg")),
        ReceiptImage::Inline { .. } => panic!("expected uploaded preview"),
    }

    let entries = w.log.all();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].outcome.is_success());
}

// ============================================================================
// Scenario D: decorative-only attachment, no receipt anywhere
// ============================================================================

#[tokio::test]
async fn scenario_d_decorative_only_rejection() {
    let w = world(MockOcr::blank(), MockLlm::failing());
    let report = w
        .pipeline
        .process_inbound_email(message(
            "jane1@receipts.papertrail.com",
            Some("See attached."),
            vec![EmailAttachment {
                content: vec![0u8; 128],
                content_type: "image/png".to_string(),
                filename: "logo.png".to_string(),
                size: Some(5 * 1024),
                content_id: None,
            }],
        ))
        .await;

    assert_eq!(report.outcome, PipelineOutcome::NoAttachments);
    assert!(w.receipts.all().is_empty());

    let entries = w.log.all();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attachment_count, 1);
    assert_eq!(entries[0].valid_attachment_count, 0);

    // One failure notification queued
    assert!(matches!(
        w.notifier.sent().as_slice(),
        [SentNotification::Failure { .. }]
    ));
}

// ============================================================================
// Body-only ingestion (no attachments at all)
// ============================================================================

#[tokio::test]
async fn body_only_receipt_email() {
    let w = world(MockOcr::blank(), MockLlm::always(BODY_RECEIPT_JSON));
    let report = w
        .pipeline
        .process_inbound_email(message(
            "jane1@receipts.papertrail.com",
            Some("Payment confirmation\nAmount due: R450.00\nVAT included"),
            vec![],
        ))
        .await;

    assert_eq!(report.outcome, PipelineOutcome::SuccessEmailBody);
    let entries = w.log.all();
    assert_eq!(entries[0].valid_attachment_count, 0);
    assert_eq!(entries[0].receipts_created, 1);
}

// ============================================================================
// Idempotence: re-running never updates, always inserts
// ============================================================================

#[tokio::test]
async fn rerun_inserts_fresh_log_and_flags_duplicate() {
    let w = world(
        MockOcr::new(vec![Ok(Some(spar_fields())), Ok(Some(spar_fields()))]),
        MockLlm::failing(),
    );
    let msg = message(
        "jane1@receipts.papertrail.com",
        None,
        vec![jpeg_attachment("receipt.jpg", 120_000)],
    );

    let first = w.pipeline.process_inbound_email(msg.clone()).await;
    let second = w.pipeline.process_inbound_email(msg).await;

    assert_eq!(first.outcome, PipelineOutcome::Success);
    assert_eq!(second.outcome, PipelineOutcome::Success);

    // Two distinct log entries, never an update of the first
    let entries = w.log.all();
    assert_eq!(entries.len(), 2);
    assert_ne!(entries[0].id, entries[1].id);

    // Duplicate detection is advisory: the second receipt exists, flagged
    let receipts = w.receipts.all();
    assert_eq!(receipts.len(), 2);
    assert!(!receipts[0].is_duplicate);
    assert!(receipts[1].is_duplicate);
}

// ============================================================================
// Outcome taxonomy: every run ends in exactly one closed status
// ============================================================================

#[tokio::test]
async fn every_run_logs_exactly_one_closed_outcome() {
    let w = world(MockOcr::blank(), MockLlm::failing());

    let runs = vec![
        message("not-an-address", None, vec![]),
        message("ghost@receipts.papertrail.com", None, vec![]),
        message("jane1@receipts.papertrail.com", Some("hi"), vec![]),
        message(
            "jane1@receipts.papertrail.com",
            None,
            vec![jpeg_attachment("receipt.jpg", 120_000)],
        ),
    ];
    let expected = vec![
        PipelineOutcome::InvalidAddress,
        PipelineOutcome::UserNotFound,
        PipelineOutcome::NoAttachments,
        // Valid attachment, OCR recognizes nothing, no PDF fallback
        PipelineOutcome::Failed,
    ];

    for (msg, expected) in runs.into_iter().zip(expected) {
        let report = w.pipeline.process_inbound_email(msg).await;
        assert_eq!(report.outcome, expected);
    }

    let entries = w.log.all();
    assert_eq!(entries.len(), 4, "one log entry per run, no more, no fewer");
}
