//! LLM provider interface and concrete API clients.

mod providers;

pub use providers::{AnthropicClient, LlmConfig, OpenAiClient, Provider, UnifiedLlmClient};

use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// Provider Interface
// ============================================================================

/// Trait for chat-completion providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    Network(String),
}

// ============================================================================
// Mock provider for testing
// ============================================================================

/// Scripted provider: returns canned responses in order, repeating the last.
pub struct MockLlm {
    responses: Vec<String>,
    response_idx: std::sync::atomic::AtomicUsize,
}

impl MockLlm {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            response_idx: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// A provider that fails every call, for exercising fallback paths.
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    /// How many completions have been requested so far.
    pub fn calls(&self) -> usize {
        self.response_idx.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let idx = self
            .response_idx
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match self.responses.get(idx.min(self.responses.len().saturating_sub(1))) {
            Some(content) if !self.responses.is_empty() => Ok(CompletionResponse {
                content: content.clone(),
                model: "mock".to_string(),
            }),
            _ => Err(LlmError::Api("mock provider exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_scripted_responses_in_order() {
        let mock = MockLlm::new(vec!["first".into(), "second".into()]);
        let request = CompletionRequest {
            messages: vec![Message::user("hi")],
            max_tokens: None,
            temperature: None,
        };
        assert_eq!(mock.complete(request.clone()).await.unwrap().content, "first");
        assert_eq!(mock.complete(request.clone()).await.unwrap().content, "second");
        // Repeats the last
        assert_eq!(mock.complete(request).await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        let mock = MockLlm::failing();
        let request = CompletionRequest {
            messages: vec![Message::user("hi")],
            max_tokens: None,
            temperature: None,
        };
        assert!(mock.complete(request).await.is_err());
    }
}
