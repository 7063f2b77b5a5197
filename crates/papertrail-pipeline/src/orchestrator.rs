//! The pipeline orchestrator.
//!
//! One call to [`Pipeline::process_inbound_email`] handles one email:
//!
//! 1. resolve the recipient alias to an account;
//! 2. classify attachments, dropping decorative/signature images;
//! 3. run each valid attachment through its sub-pipeline in arrival order
//!    (PDF → raster → OCR → categorize → persist);
//! 4. when nothing persisted, fall back to AI body extraction: always for a
//!    receipt-like body with zero valid attachments, and at most once per
//!    email after a PDF failure;
//! 5. screen for duplicates (advisory), synthesize a preview image for
//!    body-extracted receipts, and notify the user.
//!
//! Every run ends in exactly one of the seven outcome statuses and writes
//! exactly one processing-log entry, including the catch-all paths. All
//! external calls are bounded by timeouts; a timeout is an expected failure
//! routed into the same fallback logic as any other service error.

use crate::address::parse_receipt_alias;
use crate::attachment::{AttachmentOutcome, AttachmentStage};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use papertrail_classify::{AttachmentClassifier, BodyReceiptDetector};
use papertrail_core::{
    EmailAttachment, ExtractionResult, InboundEmailMessage, PipelineOutcome, PipelineReport,
    ProcessingLogEntry, Receipt, ReceiptId, ReceiptImage, RunId, ServiceError,
};
use papertrail_extract::{BodyExtractor, LlmProvider, OcrProvider};
use papertrail_pdf::PdfConverter;
use papertrail_render::PreviewSynthesizer;
use papertrail_store::{
    Account, AccountDirectory, BlobStore, Categorizer, Notifier, ProcessingLogStore, ReceiptStore,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Timeouts for the external capabilities. PDF conversion carries its own
/// hard limit inside [`PdfConverter`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub ocr_timeout: Duration,
    pub ai_timeout: Duration,
    pub blob_timeout: Duration,
    pub categorize_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_timeout: Duration::from_secs(30),
            ai_timeout: Duration::from_secs(30),
            blob_timeout: Duration::from_secs(15),
            categorize_timeout: Duration::from_secs(10),
        }
    }
}

/// The external collaborators one pipeline talks to.
pub struct PipelineServices {
    pub accounts: Arc<dyn AccountDirectory>,
    pub receipts: Arc<dyn ReceiptStore>,
    pub log: Arc<dyn ProcessingLogStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub categorizer: Arc<dyn Categorizer>,
    pub notifier: Arc<dyn Notifier>,
    pub ocr: Arc<dyn OcrProvider>,
    pub llm: Arc<dyn LlmProvider>,
}

/// One pipeline instance per host; each email is an independent unit of work
/// with no mutable state shared between runs.
pub struct Pipeline {
    services: PipelineServices,
    classifier: AttachmentClassifier,
    detector: BodyReceiptDetector,
    extractor: BodyExtractor,
    pdf: PdfConverter,
    preview: PreviewSynthesizer,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(services: PipelineServices) -> Self {
        let extractor = BodyExtractor::new(services.llm.clone());
        Self {
            services,
            classifier: AttachmentClassifier::new(),
            detector: BodyReceiptDetector::new(),
            extractor,
            pdf: PdfConverter::new(),
            preview: PreviewSynthesizer::new(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Process one inbound email end to end.
    ///
    /// Guarantees exactly one processing-log entry and one of the seven
    /// closed outcome statuses, whatever happens inside.
    pub async fn process_inbound_email(&self, message: InboundEmailMessage) -> PipelineReport {
        let run_id = RunId::new_v4();
        let started = Instant::now();
        info!(%run_id, from = %message.from, to = %message.to, "processing inbound email");

        let state = self.run(&message).await;

        let entry = ProcessingLogEntry {
            id: run_id,
            sender: message.from.clone(),
            recipient: message.to.clone(),
            alias: state.alias.clone(),
            user_id: state.account.as_ref().map(|a| a.id),
            subject: message.subject.clone(),
            attachment_count: message.attachments.len(),
            valid_attachment_count: state.valid_attachments,
            receipts_created: state.receipt_ids.len(),
            outcome: state.outcome,
            error: state.error.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            body_text: message.text.clone(),
            body_html: message.html.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.services.log.insert(entry).await {
            error!(%run_id, error = %e, "failed to write processing log entry");
        }

        self.notify(&state).await;

        info!(
            %run_id,
            outcome = state.outcome.as_str(),
            receipts = state.receipt_ids.len(),
            "inbound email processed"
        );
        PipelineReport {
            success: state.outcome.is_success(),
            outcome: state.outcome,
            receipt_ids: state.receipt_ids,
            error: state.error,
        }
    }

    async fn run(&self, message: &InboundEmailMessage) -> RunState {
        let mut state = RunState::new();

        let Some(alias) = parse_receipt_alias(&message.to) else {
            state.outcome = PipelineOutcome::InvalidAddress;
            state.error = Some(format!("no resolvable alias in \"{}\"", message.to));
            return state;
        };
        state.alias = Some(alias.clone());

        let account = match self.services.accounts.find_by_alias(&alias).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                state.outcome = PipelineOutcome::UserNotFound;
                state.error = Some(format!("no account for alias \"{alias}\""));
                return state;
            }
            Err(e) => {
                state.outcome = PipelineOutcome::Failed;
                state.error = Some(e.to_string());
                return state;
            }
        };
        state.account = Some(account.clone());

        let classified = self.classifier.classify(&message.attachments);
        state.valid_attachments = classified.accepted.len();
        if classified.rejected_decorative > 0 {
            info!(
                rejected = classified.rejected_decorative,
                "filtered signature-like attachments"
            );
        }

        let mut pdf_failed = false;
        let mut failure_count = 0usize;
        for attachment in &classified.accepted {
            match self.process_attachment(&account, message, attachment).await {
                AttachmentOutcome::Persisted { receipt_id, duplicate } => {
                    if duplicate {
                        info!(%receipt_id, "receipt flagged as possible duplicate");
                    }
                    state.receipt_ids.push(receipt_id);
                }
                AttachmentOutcome::Failed { filename, stage, was_pdf, reason } => {
                    warn!(%filename, stage = stage.as_str(), %reason, "attachment failed");
                    failure_count += 1;
                    pdf_failed |= was_pdf;
                    state.error = Some(format!("{filename}: {reason}"));
                }
            }
        }

        if !state.receipt_ids.is_empty() {
            if failure_count == 0 {
                state.outcome = PipelineOutcome::Success;
                state.error = None;
            } else {
                state.outcome = PipelineOutcome::Partial;
            }
            return state;
        }

        // Zero receipts so far; the body is the remaining candidate.
        let detection = self.detector.detect(
            &message.subject,
            message.text.as_deref(),
            message.html.as_deref(),
        );

        if state.valid_attachments == 0 {
            if detection.is_receipt_like {
                debug!(keywords = ?detection.matched_keywords, "body looks receipt-like");
                match self.extract_from_body(&account, message, &detection.text).await {
                    Ok(receipt_id) => {
                        state.receipt_ids.push(receipt_id);
                        state.outcome = PipelineOutcome::SuccessEmailBody;
                        state.error = None;
                    }
                    Err(reason) => {
                        state.outcome = PipelineOutcome::NoAttachments;
                        state.error = Some(reason);
                    }
                }
            } else {
                state.outcome = PipelineOutcome::NoAttachments;
                state.error = Some("no valid attachments and body is not receipt-like".to_string());
            }
            return state;
        }

        // Valid attachments existed but none produced a receipt. A PDF
        // failure buys one body-extraction attempt; non-PDF failures do not.
        if pdf_failed && message.has_body() {
            info!("pdf attachment failed, falling back to body extraction");
            match self.extract_from_body(&account, message, &detection.text).await {
                Ok(receipt_id) => {
                    state.receipt_ids.push(receipt_id);
                    state.outcome = PipelineOutcome::Success;
                    state.error = None;
                }
                Err(reason) => {
                    state.outcome = PipelineOutcome::Failed;
                    state.error = Some(reason);
                }
            }
        } else {
            state.outcome = PipelineOutcome::Failed;
            if state.error.is_none() {
                state.error = Some("no attachment produced a receipt".to_string());
            }
        }
        state
    }

    /// One attachment's sub-pipeline: [PDF →] OCR → categorize → persist.
    async fn process_attachment(
        &self,
        account: &Account,
        message: &InboundEmailMessage,
        attachment: &EmailAttachment,
    ) -> AttachmentOutcome {
        let was_pdf = attachment.is_pdf();
        let filename = attachment.filename.clone();
        debug!(%filename, was_pdf, bytes = attachment.byte_len(), "processing attachment");

        let image_bytes = if was_pdf {
            match self.pdf.convert_first_page(attachment.content.clone()).await {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    return AttachmentOutcome::Failed {
                        filename,
                        stage: AttachmentStage::PdfConversion,
                        was_pdf,
                        reason: e.to_string(),
                    }
                }
            }
        } else {
            attachment.content.clone()
        };

        let image_base64 = BASE64.encode(&image_bytes);

        let ocr_call = self.services.ocr.analyze_receipt(&image_base64);
        let fields = match tokio::time::timeout(self.config.ocr_timeout, ocr_call).await {
            Err(_) => {
                let reason = ServiceError::timeout("ocr", self.config.ocr_timeout.as_secs());
                return AttachmentOutcome::Failed {
                    filename,
                    stage: AttachmentStage::Ocr,
                    was_pdf,
                    reason: reason.to_string(),
                };
            }
            Ok(Err(e)) => {
                return AttachmentOutcome::Failed {
                    filename,
                    stage: AttachmentStage::Ocr,
                    was_pdf,
                    reason: e.to_string(),
                }
            }
            Ok(Ok(None)) => {
                return AttachmentOutcome::Failed {
                    filename,
                    stage: AttachmentStage::Ocr,
                    was_pdf,
                    reason: "no receipt recognized in image".to_string(),
                }
            }
            Ok(Ok(Some(fields))) => fields,
        };

        let extraction = fields.into_extraction();
        let stored_name = if was_pdf {
            format!("{}.jpg", filename.trim_end_matches(".pdf").trim_end_matches(".PDF"))
        } else {
            filename.clone()
        };

        match self
            .persist_receipt(account, message, &extraction, image_base64, &stored_name)
            .await
        {
            Ok((receipt_id, duplicate)) => AttachmentOutcome::Persisted { receipt_id, duplicate },
            Err(reason) => AttachmentOutcome::Failed {
                filename,
                stage: AttachmentStage::Persistence,
                was_pdf,
                reason,
            },
        }
    }

    /// Body-extraction path: AI extraction, then a synthesized preview image
    /// standing in for the scan that never existed.
    async fn extract_from_body(
        &self,
        account: &Account,
        message: &InboundEmailMessage,
        text: &str,
    ) -> Result<ReceiptId, String> {
        if text.trim().is_empty() {
            return Err("email body is empty".to_string());
        }

        let extract_call = self.extractor.extract(&message.subject, text);
        let extraction = match tokio::time::timeout(self.config.ai_timeout, extract_call).await {
            Err(_) => {
                return Err(
                    ServiceError::timeout("ai-extraction", self.config.ai_timeout.as_secs())
                        .to_string(),
                )
            }
            Ok(Err(e)) => return Err(e.to_string()),
            Ok(Ok(extraction)) => extraction,
        };

        let preview = self
            .preview
            .synthesize(&extraction, &message.subject)
            .map_err(|e| e.to_string())?;
        let image_base64 = BASE64.encode(&preview);

        self.persist_receipt(account, message, &extraction, image_base64, "preview.jpg")
            .await
            .map(|(receipt_id, _)| receipt_id)
    }

    /// Categorize, screen for duplicates, upload the image and insert the
    /// receipt. Categorization and blob failures degrade; only the final
    /// insert can fail the attachment.
    async fn persist_receipt(
        &self,
        account: &Account,
        message: &InboundEmailMessage,
        extraction: &ExtractionResult,
        image_base64: String,
        filename: &str,
    ) -> Result<(ReceiptId, bool), String> {
        let categorize_call = self.services.categorizer.categorize(
            &extraction.store_name,
            &extraction.items,
            &extraction.total,
        );
        let category =
            match tokio::time::timeout(self.config.categorize_timeout, categorize_call).await {
                Ok(Ok(category)) => category,
                Ok(Err(e)) => {
                    warn!(error = %e, "categorization failed, defaulting to \"other\"");
                    "other".to_string()
                }
                Err(_) => {
                    warn!("categorization timed out, defaulting to \"other\"");
                    "other".to_string()
                }
            };

        // Advisory only: a match flags the receipt, it never blocks it.
        let duplicate = match self
            .services
            .receipts
            .find_duplicates(
                account.id,
                &extraction.store_name,
                extraction.date,
                &extraction.total,
            )
            .await
        {
            Ok(matches) => {
                if !matches.is_empty() {
                    info!(matches = matches.len(), "duplicate screen matched existing receipts");
                }
                !matches.is_empty()
            }
            Err(e) => {
                warn!(error = %e, "duplicate query failed, assuming no duplicates");
                false
            }
        };

        let blob_name = format!("{}-{}", Uuid::new_v4(), filename);
        let upload_call = self.services.blobs.upload_file(&image_base64, &blob_name);
        let image = match tokio::time::timeout(self.config.blob_timeout, upload_call).await {
            Ok(Ok(Some(blob))) => ReceiptImage::Blob { url: blob.url, name: blob.name },
            Ok(Ok(None)) => {
                warn!("blob store returned no reference, storing image inline");
                ReceiptImage::Inline { base64: image_base64 }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "blob upload failed, storing image inline");
                ReceiptImage::Inline { base64: image_base64 }
            }
            Err(_) => {
                warn!("blob upload timed out, storing image inline");
                ReceiptImage::Inline { base64: image_base64 }
            }
        };

        let mut receipt = Receipt::from_extraction(
            account.id,
            extraction,
            category,
            image,
            message.from.clone(),
        );
        receipt.is_duplicate = duplicate;

        let receipt_id = self
            .services
            .receipts
            .insert(receipt)
            .await
            .map_err(|e| e.to_string())?;
        Ok((receipt_id, duplicate))
    }

    /// User-facing outcome notification. Delivery failures are logged and
    /// swallowed; they are never pipeline failures.
    async fn notify(&self, state: &RunState) {
        let Some(account) = &state.account else {
            return;
        };

        let result = match state.outcome {
            PipelineOutcome::Success
            | PipelineOutcome::SuccessEmailBody
            | PipelineOutcome::Partial => {
                self.services
                    .notifier
                    .send_import_confirmation(&account.email, &account.username, state.receipt_ids.len())
                    .await
            }
            PipelineOutcome::NoAttachments | PipelineOutcome::Failed => {
                self.services
                    .notifier
                    .send_import_failure(
                        &account.email,
                        &account.username,
                        "No receipt detected",
                        "We couldn't find a readable receipt in your email. Attach a clear \
                         photo or PDF of the receipt, or forward the original invoice email.",
                    )
                    .await
            }
            PipelineOutcome::InvalidAddress | PipelineOutcome::UserNotFound => return,
        };

        if let Err(e) = result {
            warn!(error = %e, "notification delivery failed");
        }
    }
}

/// Everything the run accumulates for the final log entry and report.
struct RunState {
    outcome: PipelineOutcome,
    receipt_ids: Vec<ReceiptId>,
    error: Option<String>,
    alias: Option<String>,
    account: Option<Account>,
    valid_attachments: usize,
}

impl RunState {
    fn new() -> Self {
        Self {
            outcome: PipelineOutcome::Failed,
            receipt_ids: Vec::new(),
            error: None,
            alias: None,
            account: None,
            valid_attachments: 0,
        }
    }
}
