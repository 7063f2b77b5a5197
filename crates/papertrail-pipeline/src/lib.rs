//! Papertrail Pipeline: inbound email → structured expense records.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 INBOUND EMAIL RECEIPT INGESTION                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  inbound email ──► Address Resolver ──► Attachment Classifier      │
//! │                                              │                      │
//! │                      per attachment, in order▼                      │
//! │                    [PDF Converter ──►] OCR Adapter ──► Receipt     │
//! │                                              │                      │
//! │            zero receipts│                    │PDF failed, once      │
//! │                         ▼                    ▼                      │
//! │              Body Detector ──► AI Body Extractor ──► Preview       │
//! │                                              │        Synthesizer  │
//! │                                              ▼                      │
//! │                Duplicate Screener ──► persisted Receipt(s)         │
//! │                                              │                      │
//! │                                              ▼                      │
//! │                  one outcome + one ProcessingLogEntry               │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The orchestrator owns all fallback decisions; adapters below it return
//! typed results and never panic across the sub-pipeline boundary.

pub mod address;
pub mod attachment;
pub mod orchestrator;

pub use address::parse_receipt_alias;
pub use attachment::{AttachmentOutcome, AttachmentStage};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineServices};
