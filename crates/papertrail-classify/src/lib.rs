//! Papertrail Classify: heuristic filters in front of the expensive stages.
//!
//! Two families of heuristics live here, both kept as swappable data tables
//! evaluated by pure functions:
//!
//! - the **attachment classifier**, which filters signature/decorative images
//!   (logos, social icons) out of the OCR queue using size and filename
//!   signals together: both must agree before rejection, and an explicit
//!   receipt-like filename always wins;
//! - the **body-text receipt detector**, which decides whether an email body
//!   itself looks like a receipt/invoice before any language-model call is
//!   spent on it.

pub mod attachments;
pub mod body;

pub use attachments::{AttachmentClassifier, ClassificationVerdict, ClassifiedAttachments};
pub use body::{BodyDetection, BodyReceiptDetector};
