//! Papertrail Store: the pipeline's view of the outside world's persistence.
//!
//! The pipeline never talks to a database, blob container or mail sender
//! directly; it goes through the traits defined here. Production backends
//! live with the host application; the in-memory implementations in
//! [`memory`] back the test suite and the CLI runner.

pub mod memory;
pub mod traits;

pub use memory::{
    KeywordCategorizer, MemoryAccountDirectory, MemoryBlobStore, MemoryLogStore,
    MemoryReceiptStore, RecordingNotifier, SentNotification,
};
pub use traits::{
    Account, AccountDirectory, BlobRef, BlobStore, Categorizer, Notifier, ProcessingLogStore,
    ReceiptStore, StoreError,
};
