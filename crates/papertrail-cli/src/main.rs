//! Papertrail CLI
//!
//! Command-line runner for the receipt ingestion pipeline:
//! - `process` runs a JSON-described inbound email through the full pipeline
//!   against in-memory backends (live OCR/LLM providers when configured via
//!   the environment);
//! - `classify` dry-runs the attachment classifier;
//! - `detect` dry-runs the body-text receipt detector.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use papertrail_classify::{AttachmentClassifier, BodyReceiptDetector};
use papertrail_core::{EmailAttachment, InboundEmailMessage, ReceiptImage};
use papertrail_extract::{LlmProvider, MockLlm, MockOcr, OcrProvider, ReceiptOcrClient, UnifiedLlmClient};
use papertrail_pipeline::{parse_receipt_alias, Pipeline, PipelineServices};
use papertrail_store::{
    KeywordCategorizer, MemoryAccountDirectory, MemoryBlobStore, MemoryLogStore,
    MemoryReceiptStore, RecordingNotifier,
};

#[derive(Parser)]
#[command(name = "papertrail")]
#[command(author, version, about = "Papertrail: turn forwarded emails into expense records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process an inbound email (JSON file) through the full pipeline.
    ///
    /// Uses in-memory stores. OCR and LLM providers are taken from the
    /// environment (RECEIPT_OCR_ENDPOINT / OPENAI_API_KEY / ANTHROPIC_API_KEY)
    /// and fall back to inert mocks with a warning.
    Process {
        /// Path to the message JSON file
        path: PathBuf,
        /// Email address receiving outcome notifications
        #[arg(long, default_value = "demo@example.com")]
        notify_email: String,
    },

    /// Dry-run the attachment classifier over a message file.
    Classify { path: PathBuf },

    /// Dry-run the body-text receipt detector over a message file.
    Detect { path: PathBuf },
}

// ============================================================================
// Message file format
// ============================================================================

#[derive(Deserialize)]
struct MessageFile {
    from: String,
    to: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    attachments: Vec<AttachmentFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentFile {
    #[serde(default)]
    content_base64: Option<String>,
    content_type: String,
    filename: String,
    #[serde(default)]
    size: Option<usize>,
    #[serde(default)]
    content_id: Option<String>,
}

fn load_message(path: &Path) -> Result<InboundEmailMessage> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading message file {}", path.display()))?;
    let file: MessageFile = serde_json::from_str(&raw).context("parsing message JSON")?;

    let mut attachments = Vec::new();
    for a in file.attachments {
        let content = match a.content_base64 {
            Some(b64) => BASE64
                .decode(b64.trim())
                .with_context(|| format!("decoding attachment {}", a.filename))?,
            None => Vec::new(),
        };
        attachments.push(EmailAttachment {
            content,
            content_type: a.content_type,
            filename: a.filename,
            size: a.size,
            content_id: a.content_id,
        });
    }

    Ok(InboundEmailMessage {
        from: file.from,
        to: file.to,
        subject: file.subject,
        text: file.text,
        html: file.html,
        attachments,
    })
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_process(path: &Path, notify_email: &str) -> Result<()> {
    let message = load_message(path)?;

    let alias = parse_receipt_alias(&message.to)
        .unwrap_or_else(|| "demo".to_string());

    let ocr: Arc<dyn OcrProvider> = match ReceiptOcrClient::from_env() {
        Some(client) => Arc::new(client.context("building OCR client")?),
        None => {
            eprintln!(
                "{}",
                "warning: RECEIPT_OCR_ENDPOINT not set; attachment OCR disabled".yellow()
            );
            Arc::new(MockOcr::blank())
        }
    };
    let llm: Arc<dyn LlmProvider> = match UnifiedLlmClient::from_env() {
        Some(client) => Arc::new(client.context("building LLM client")?),
        None => {
            eprintln!(
                "{}",
                "warning: no LLM API key in environment; body extraction disabled".yellow()
            );
            Arc::new(MockLlm::failing())
        }
    };

    let receipts = Arc::new(MemoryReceiptStore::new());
    let log = Arc::new(MemoryLogStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let services = PipelineServices {
        accounts: Arc::new(
            MemoryAccountDirectory::new().with_account(&alias, notify_email, "Demo"),
        ),
        receipts: receipts.clone(),
        log: log.clone(),
        blobs: Arc::new(MemoryBlobStore::new()),
        categorizer: Arc::new(KeywordCategorizer::new()),
        notifier: notifier.clone(),
        ocr,
        llm,
    };
    let pipeline = Pipeline::new(services);

    let report = pipeline.process_inbound_email(message).await;

    let outcome = report.outcome.as_str();
    if report.success {
        println!("{} {}", "outcome:".bold(), outcome.green().bold());
    } else {
        println!("{} {}", "outcome:".bold(), outcome.red().bold());
    }
    if let Some(error) = &report.error {
        println!("{} {error}", "error:".bold());
    }

    for receipt in receipts.all() {
        let image = match &receipt.image {
            ReceiptImage::Blob { url, .. } => url.clone(),
            ReceiptImage::Inline { base64 } => format!("inline ({} bytes base64)", base64.len()),
        };
        println!(
            "{} {} | {} {} | {} | {} | {}{}",
            "receipt:".bold(),
            receipt.store_name,
            receipt.currency.as_deref().unwrap_or(""),
            receipt.total,
            receipt.date,
            receipt.category.cyan(),
            image,
            if receipt.is_duplicate {
                " [possible duplicate]".yellow().to_string()
            } else {
                String::new()
            }
        );
    }

    for entry in log.all() {
        println!(
            "{} {} attachments, {} valid, {} receipts, {}ms",
            "log:".bold(),
            entry.attachment_count,
            entry.valid_attachment_count,
            entry.receipts_created,
            entry.duration_ms
        );
    }

    for notification in notifier.sent() {
        println!("{} {notification:?}", "notification:".bold());
    }

    Ok(())
}

fn cmd_classify(path: &Path) -> Result<()> {
    let message = load_message(path)?;
    let classified = AttachmentClassifier::new().classify(&message.attachments);

    for verdict in &classified.verdicts {
        if verdict.accepted {
            println!("{} {}", "accept".green().bold(), verdict.filename);
        } else {
            println!(
                "{} {} ({})",
                "reject".red().bold(),
                verdict.filename,
                verdict.reason.as_deref().unwrap_or("?")
            );
        }
    }
    println!(
        "{} accepted, {} signature-like rejected",
        classified.accepted.len(),
        classified.rejected_decorative
    );
    Ok(())
}

fn cmd_detect(path: &Path) -> Result<()> {
    let message = load_message(path)?;
    let detection = BodyReceiptDetector::new().detect(
        &message.subject,
        message.text.as_deref(),
        message.html.as_deref(),
    );

    if detection.is_receipt_like {
        println!("{}", "receipt-like".green().bold());
    } else {
        println!("{}", "not receipt-like".red().bold());
    }
    println!("matched keywords: {:?}", detection.matched_keywords);
    let preview: String = detection.text.chars().take(400).collect();
    println!("stripped body preview:\n{preview}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Process { path, notify_email } => cmd_process(&path, &notify_email).await,
        Commands::Classify { path } => cmd_classify(&path),
        Commands::Detect { path } => cmd_detect(&path),
    }
}
