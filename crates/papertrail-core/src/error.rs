//! Cross-crate error type for external-service calls.

use thiserror::Error;

/// Failure of an external capability (OCR, LLM, blob storage, categorizer).
///
/// A timeout is a normal, expected failure mode here, not a crash; the
/// orchestrator routes these into fallback or degradation paths.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("{service} call timed out after {seconds}s")]
    Timeout { service: &'static str, seconds: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("service not configured: {0}")]
    NotConfigured(String),
}

impl ServiceError {
    pub fn timeout(service: &'static str, seconds: u64) -> Self {
        Self::Timeout { service, seconds }
    }
}
