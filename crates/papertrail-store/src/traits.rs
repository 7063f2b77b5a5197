//! Trait seams between the pipeline and its external collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use papertrail_core::{AccountId, Receipt, ReceiptId, ServiceError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An account/workspace reachable through a receipt alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// The lowercase alias token of the personal inbound address
    pub alias: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Alias → account lookup.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Exactly one account per alias; `None` is the loggable "user not
    /// found" condition, distinct from a malformed address.
    async fn find_by_alias(&self, alias: &str) -> Result<Option<Account>, StoreError>;
}

/// Persisted receipts, plus the advisory duplicate query.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn insert(&self, receipt: Receipt) -> Result<ReceiptId, StoreError>;

    /// Near-matches on (store, date, total) within one account. Advisory
    /// only: callers flag, never block.
    async fn find_duplicates(
        &self,
        account_id: AccountId,
        store_name: &str,
        date: NaiveDate,
        total: &str,
    ) -> Result<Vec<Receipt>, StoreError>;
}

/// Append-only processing log, one entry per inbound email.
#[async_trait]
pub trait ProcessingLogStore: Send + Sync {
    async fn insert(&self, entry: papertrail_core::ProcessingLogEntry) -> Result<(), StoreError>;
}

/// Where an uploaded image landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRef {
    pub url: String,
    pub name: String,
}

/// Blob storage for receipt images. Upload failure is tolerated; callers
/// fall back to storing encoded bytes inline on the receipt.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload_file(
        &self,
        base64: &str,
        filename: &str,
    ) -> Result<Option<BlobRef>, ServiceError>;
}

/// External categorization capability; failure defaults to `"other"`.
#[async_trait]
pub trait Categorizer: Send + Sync {
    async fn categorize(
        &self,
        store_name: &str,
        items: &[String],
        total: &str,
    ) -> Result<String, ServiceError>;
}

/// Outbound notification email delivery. Failures are logged by callers,
/// never propagated as pipeline failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_import_confirmation(
        &self,
        email: &str,
        username: &str,
        receipt_count: usize,
    ) -> Result<(), ServiceError>;

    async fn send_import_failure(
        &self,
        email: &str,
        username: &str,
        title: &str,
        message: &str,
    ) -> Result<(), ServiceError>;
}
