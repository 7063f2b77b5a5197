//! In-memory backends for tests and the CLI runner.

use crate::traits::{
    Account, AccountDirectory, BlobRef, BlobStore, Categorizer, Notifier, ProcessingLogStore,
    ReceiptStore, StoreError,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use papertrail_core::{AccountId, ProcessingLogEntry, Receipt, ReceiptId, ServiceError};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

// ============================================================================
// Accounts
// ============================================================================

#[derive(Default)]
pub struct MemoryAccountDirectory {
    accounts: RwLock<Vec<Account>>,
}

impl MemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, alias: &str, email: &str, username: &str) -> Self {
        self.accounts.write().push(Account {
            id: AccountId::new_v4(),
            alias: alias.to_lowercase(),
            email: email.to_string(),
            username: username.to_string(),
        });
        self
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn find_by_alias(&self, alias: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .read()
            .iter()
            .find(|a| a.alias == alias)
            .cloned())
    }
}

// ============================================================================
// Receipts
// ============================================================================

#[derive(Default)]
pub struct MemoryReceiptStore {
    receipts: RwLock<Vec<Receipt>>,
}

impl MemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Receipt> {
        self.receipts.read().clone()
    }
}

#[async_trait]
impl ReceiptStore for MemoryReceiptStore {
    async fn insert(&self, receipt: Receipt) -> Result<ReceiptId, StoreError> {
        let id = receipt.id;
        self.receipts.write().push(receipt);
        Ok(id)
    }

    async fn find_duplicates(
        &self,
        account_id: AccountId,
        store_name: &str,
        date: NaiveDate,
        total: &str,
    ) -> Result<Vec<Receipt>, StoreError> {
        Ok(self
            .receipts
            .read()
            .iter()
            .filter(|r| {
                r.account_id == account_id
                    && r.store_name.eq_ignore_ascii_case(store_name)
                    && r.date == date
                    && r.total == total
            })
            .cloned()
            .collect())
    }
}

// ============================================================================
// Processing log
// ============================================================================

#[derive(Default)]
pub struct MemoryLogStore {
    entries: RwLock<Vec<ProcessingLogEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ProcessingLogEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl ProcessingLogStore for MemoryLogStore {
    async fn insert(&self, entry: ProcessingLogEntry) -> Result<(), StoreError> {
        self.entries.write().push(entry);
        Ok(())
    }
}

// ============================================================================
// Blob storage
// ============================================================================

/// In-memory blob container; can be switched to fail for exercising the
/// inline-image fallback.
#[derive(Default)]
pub struct MemoryBlobStore {
    uploads: RwLock<Vec<(String, usize)>>,
    failing: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.read().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload_file(
        &self,
        base64: &str,
        filename: &str,
    ) -> Result<Option<BlobRef>, ServiceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::Api("blob container unavailable".to_string()));
        }
        self.uploads.write().push((filename.to_string(), base64.len()));
        Ok(Some(BlobRef {
            url: format!("memory://receipts/{filename}"),
            name: filename.to_string(),
        }))
    }
}

// ============================================================================
// Categorization
// ============================================================================

/// Categorization table: first keyword hit on the store name wins.
const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("spar", "groceries"),
    ("woolworths", "groceries"),
    ("checkers", "groceries"),
    ("pick n pay", "groceries"),
    ("grocer", "groceries"),
    ("shell", "fuel"),
    ("engen", "fuel"),
    ("bp", "fuel"),
    ("petrol", "fuel"),
    ("uber", "transport"),
    ("bolt", "transport"),
    ("pharmacy", "health"),
    ("clicks", "health"),
    ("dis-chem", "health"),
    ("restaurant", "dining"),
    ("cafe", "dining"),
    ("coffee", "dining"),
    ("hardware", "home"),
    ("builders", "home"),
];

/// Keyword-table categorizer standing in for the hosted capability.
#[derive(Default)]
pub struct KeywordCategorizer;

impl KeywordCategorizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Categorizer for KeywordCategorizer {
    async fn categorize(
        &self,
        store_name: &str,
        _items: &[String],
        _total: &str,
    ) -> Result<String, ServiceError> {
        let store = store_name.to_lowercase();
        let category = CATEGORY_KEYWORDS
            .iter()
            .find(|(keyword, _)| store.contains(keyword))
            .map(|(_, category)| (*category).to_string())
            .unwrap_or_else(|| "other".to_string());
        Ok(category)
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentNotification {
    Confirmation { email: String, receipt_count: usize },
    Failure { email: String, title: String, message: String },
}

/// Records outbound notifications instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose sends all fail, for asserting that delivery failures
    /// never become pipeline failures.
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_import_confirmation(
        &self,
        email: &str,
        username: &str,
        receipt_count: usize,
    ) -> Result<(), ServiceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::Network("smtp unreachable".to_string()));
        }
        info!(%email, %username, receipt_count, "import confirmation queued");
        self.sent.write().push(SentNotification::Confirmation {
            email: email.to_string(),
            receipt_count,
        });
        Ok(())
    }

    async fn send_import_failure(
        &self,
        email: &str,
        username: &str,
        title: &str,
        message: &str,
    ) -> Result<(), ServiceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::Network("smtp unreachable".to_string()));
        }
        info!(%email, %username, %title, "import failure notice queued");
        self.sent.write().push(SentNotification::Failure {
            email: email.to_string(),
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
