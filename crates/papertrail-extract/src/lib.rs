//! Papertrail Extract: the typed boundary around untyped extraction services.
//!
//! Two external capabilities do the actual reading:
//!
//! - an OCR/form-recognition service for raster images (`ocr` module), and
//! - a chat-style language model for plain-text bodies (`llm` + `body`).
//!
//! Both are wrapped behind adapters that own every bit of JSON-parsing and
//! defaulting logic, so the rest of the pipeline only ever sees a
//! strongly-typed [`papertrail_core::ExtractionResult`] or a typed failure,
//! never raw model text.

pub mod body;
pub mod llm;
pub mod ocr;

pub use body::{BodyExtractor, ExtractError};
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, LlmConfig, LlmError, LlmProvider,
    Message, MockLlm, OpenAiClient, Role, UnifiedLlmClient,
};
pub use ocr::{MockOcr, OcrFields, OcrProvider, ReceiptOcrClient};
