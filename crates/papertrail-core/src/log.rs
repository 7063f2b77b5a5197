//! Processing log entries and the closed outcome taxonomy.
//!
//! Every inbound email produces exactly one log entry (never zero, never
//! more than one) with one of seven statuses. Downstream notification and
//! audit logic branch on the status, so the set is closed and mutually
//! exclusive.

use crate::{AccountId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final status of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// The "to" address did not contain a resolvable alias
    InvalidAddress,
    /// Alias parsed but no account carries it
    UserNotFound,
    /// Zero valid attachments, and the body was not receipt-like (or body
    /// extraction failed)
    NoAttachments,
    /// All valid attachments produced a receipt, or the single
    /// body-extraction fallback attempt succeeded
    Success,
    /// Receipt created purely from body text; zero valid attachments existed
    SuccessEmailBody,
    /// Some but not all valid attachments produced receipts
    Partial,
    /// Valid attachments existed but none produced a receipt and no fallback
    /// applied or succeeded; also the catch-all for unexpected errors
    Failed,
}

impl PipelineOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAddress => "invalid_address",
            Self::UserNotFound => "user_not_found",
            Self::NoAttachments => "no_attachments",
            Self::Success => "success",
            Self::SuccessEmailBody => "success_email_body",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    /// Whether at least one receipt was created on this path.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::SuccessEmailBody | Self::Partial)
    }
}

/// Append-only forensic record of one inbound email.
///
/// Write-once: the orchestrator accumulates counts during the run and inserts
/// the entry in a single finalize step; there is no update stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    /// The pipeline run's own generated id; doubles as the storage key
    pub id: RunId,
    pub sender: String,
    pub recipient: String,
    /// Alias token, when one could be parsed out of the recipient
    pub alias: Option<String>,
    /// Account id, when the alias resolved
    pub user_id: Option<AccountId>,
    pub subject: String,
    pub attachment_count: usize,
    /// Attachments surviving the classifier
    pub valid_attachment_count: usize,
    pub receipts_created: usize,
    pub outcome: PipelineOutcome,
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Raw body snapshots for forensic replay
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What `process_inbound_email` hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub success: bool,
    pub outcome: PipelineOutcome,
    pub receipt_ids: Vec<crate::ReceiptId>,
    pub error: Option<String>,
}

impl PipelineReport {
    pub fn failure(outcome: PipelineOutcome, error: impl Into<String>) -> Self {
        Self {
            success: false,
            outcome,
            receipt_ids: Vec::new(),
            error: Some(error.into()),
        }
    }
}
