//! Concrete LLM API clients (OpenAI-compatible and Anthropic).

use super::{CompletionRequest, CompletionResponse, LlmError, LlmProvider, Role};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Configuration
// ============================================================================

/// LLM configuration loaded from the environment or built explicitly.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl LlmConfig {
    /// Probe the environment: OpenAI first, then Anthropic.
    pub fn from_env() -> Option<Self> {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            return Some(Self {
                provider: Provider::OpenAi,
                api_key: key,
                model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                base_url: std::env::var("OPENAI_BASE_URL").ok(),
                timeout_secs: 30,
            });
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            return Some(Self {
                provider: Provider::Anthropic,
                api_key: key,
                model: std::env::var("ANTHROPIC_MODEL")
                    .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string()),
                base_url: None,
                timeout_secs: 30,
            });
        }
        None
    }

    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::OpenAi,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            timeout_secs: 30,
        }
    }

    pub fn anthropic(api_key: &str, model: &str) -> Self {
        Self {
            provider: Provider::Anthropic,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: None,
            timeout_secs: 30,
        }
    }
}

fn build_client(timeout_secs: u64) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::Network(e.to_string()))
}

fn request_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Network("request timed out".to_string())
    } else {
        LlmError::Network(e.to_string())
    }
}

// ============================================================================
// OpenAI-compatible client
// ============================================================================

pub struct OpenAiClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config
                .base_url
                .as_deref()
                .unwrap_or("https://api.openai.com/v1")
        );

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": m.content
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        debug!(model = %self.config.model, "llm completion request");
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after_ms: retry_after * 1000,
            });
        }
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(error_text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("missing message content".to_string()))?
            .to_string();

        Ok(CompletionResponse {
            content,
            model: self.config.model.clone(),
        })
    }
}

// ============================================================================
// Anthropic client
// ============================================================================

pub struct AnthropicClient {
    client: Client,
    config: LlmConfig,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = "https://api.anthropic.com/v1/messages";

        // Anthropic takes the system prompt as a top-level field.
        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::Assistant => "assistant",
                        _ => "user",
                    },
                    "content": m.content
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(1024),
        });
        if let Some(system) = system {
            body["system"] = serde_json::json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        debug!(model = %self.config.model, "llm completion request");
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == 429 {
            return Err(LlmError::RateLimited { retry_after_ms: 60_000 });
        }
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(error_text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = data["content"][0]["text"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("missing content block".to_string()))?
            .to_string();

        Ok(CompletionResponse {
            content,
            model: self.config.model.clone(),
        })
    }
}

// ============================================================================
// Unified client
// ============================================================================

/// Dispatches to whichever provider the configuration selected.
pub enum UnifiedLlmClient {
    OpenAi(OpenAiClient),
    Anthropic(AnthropicClient),
}

impl UnifiedLlmClient {
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        match config.provider {
            Provider::OpenAi => Ok(Self::OpenAi(OpenAiClient::new(config)?)),
            Provider::Anthropic => Ok(Self::Anthropic(AnthropicClient::new(config)?)),
        }
    }

    pub fn from_env() -> Option<Result<Self, LlmError>> {
        LlmConfig::from_env().map(Self::from_config)
    }
}

#[async_trait]
impl LlmProvider for UnifiedLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match self {
            Self::OpenAi(c) => c.complete(request).await,
            Self::Anthropic(c) => c.complete(request).await,
        }
    }
}
