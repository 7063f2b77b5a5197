//! Papertrail Core: shared data model for the receipt ingestion pipeline
//!
//! Everything that crosses a crate boundary lives here: the inbound email
//! shape handed to the pipeline, extraction results and their provenance,
//! persisted receipts, the append-only processing log, and the closed
//! outcome taxonomy that notification and audit logic key off.

pub mod error;
pub mod log;
pub mod message;
pub mod money;
pub mod receipt;

pub use error::ServiceError;
pub use log::{PipelineOutcome, PipelineReport, ProcessingLogEntry};
pub use message::{EmailAttachment, InboundEmailMessage};
pub use receipt::{ExtractionResult, Provenance, Receipt, ReceiptImage};

use uuid::Uuid;

/// Unique identifier for one pipeline run (one inbound email)
pub type RunId = Uuid;

/// Unique identifier for a persisted receipt
pub type ReceiptId = Uuid;

/// Unique identifier for an account/workspace
pub type AccountId = Uuid;
