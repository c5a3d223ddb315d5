//! LLM provider integrations for SQL generation.
//!
//! This module provides a unified completion interface over several hosted
//! and local LLM providers. It handles authentication, request formatting,
//! response parsing, and optional retry with exponential backoff.
//!
//! # Supported Providers
//!
//! | Provider | Endpoint | Authentication |
//! |----------|----------|----------------|
//! | Gemini | `generativelanguage.googleapis.com` | x-goog-api-key header |
//! | OpenAI | `api.openai.com` | Bearer token |
//! | Anthropic | `api.anthropic.com` | x-api-key header |
//! | Ollama | Local (configurable) | None |
//!
//! # Retry Behavior
//!
//! When `max_retries` is non-zero the client retries transient errors:
//! - Connection timeouts
//! - Rate limiting (429)
//! - Server errors (5xx)
//!
//! # Example
//!
//! ```
//! use text_to_sql::{
//!     config::RetryConfig,
//!     llm::{LlmClient, LlmProvider}
//! };
//!
//! let provider = LlmProvider::Ollama {
//!     base_url: "http://localhost:11434".into(),
//!     model:    "llama3.2".into()
//! };
//!
//! let client = LlmClient::with_retry_config(provider, RetryConfig::default());
//! assert!(client.provider().api_key().is_none());
//! ```

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::{
    config::RetryConfig,
    error::{AppError, AppResult, http_error, llm_api_error}
};

/// LLM provider configuration with authentication credentials.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Google Gemini API
    Gemini {
        /// API key
        api_key: String,
        /// Model identifier (e.g., "gemini-2.0-flash-001")
        model:   String
    },
    /// OpenAI API (GPT-4, GPT-4o, etc.)
    OpenAI {
        /// API key (sk-...)
        api_key: String,
        /// Model identifier (e.g., "gpt-4o")
        model:   String
    },
    /// Anthropic API (Claude models)
    Anthropic {
        /// API key
        api_key: String,
        /// Model identifier (e.g., "claude-sonnet-4-20250514")
        model:   String
    },
    /// Local Ollama instance
    Ollama {
        /// Base URL (e.g., "http://localhost:11434")
        base_url: String,
        /// Model name (e.g., "llama3.2", "sqlcoder")
        model:    String
    }
}

impl LlmProvider {
    /// API key for hosted providers, `None` for local ones
    pub fn api_key(&self) -> Option<&str> {
        match self {
            Self::Gemini {
                api_key, ..
            }
            | Self::OpenAI {
                api_key, ..
            }
            | Self::Anthropic {
                api_key, ..
            } => Some(api_key.as_str()),
            Self::Ollama {
                ..
            } => None
        }
    }

    /// Model identifier sent with every request
    pub fn model(&self) -> &str {
        match self {
            Self::Gemini {
                model, ..
            }
            | Self::OpenAI {
                model, ..
            }
            | Self::Anthropic {
                model, ..
            }
            | Self::Ollama {
                model, ..
            } => model.as_str()
        }
    }

    /// Short provider name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini {
                ..
            } => "gemini",
            Self::OpenAI {
                ..
            } => "openai",
            Self::Anthropic {
                ..
            } => "anthropic",
            Self::Ollama {
                ..
            } => "ollama"
        }
    }
}

/// HTTP client for LLM API communication with retry support.
///
/// Handles provider-specific request formatting and response parsing.
pub struct LlmClient {
    provider:     LlmProvider,
    client:       reqwest::Client,
    retry_config: RetryConfig
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>
}

#[derive(Serialize)]
struct OpenAIRequest {
    model:    String,
    messages: Vec<OpenAIRequestMessage>
}

#[derive(Serialize)]
struct OpenAIRequestMessage {
    role:    String,
    content: String
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>
}

#[derive(Serialize)]
struct AnthropicRequest {
    model:      String,
    max_tokens: u32,
    messages:   Vec<AnthropicMessage>
}

#[derive(Serialize)]
struct AnthropicMessage {
    role:    String,
    content: String
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String
}

#[derive(Serialize)]
struct OllamaRequest {
    model:  String,
    prompt: String,
    stream: bool
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String
}

impl LlmClient {
    /// Create new LLM client with default retry configuration
    pub fn new(provider: LlmProvider) -> Self {
        Self::with_retry_config(provider, RetryConfig::default())
    }

    /// Create new LLM client with custom retry configuration
    pub fn with_retry_config(provider: LlmProvider, retry_config: RetryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            provider,
            client,
            retry_config
        }
    }

    /// Provider this client talks to
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Send a single prompt and return the raw text completion
    pub async fn complete(&self, prompt: &str) -> AppResult<String> {
        self.call_with_retry(prompt).await
    }

    async fn call_with_retry(&self, prompt: &str) -> AppResult<String> {
        let mut last_error = None;
        let mut delay = self.retry_config.initial_delay_ms;
        for attempt in 0..=self.retry_config.max_retries {
            if attempt > 0 {
                tracing::warn!(
                    "Retrying LLM request (attempt {}/{}), waiting {}ms",
                    attempt + 1,
                    self.retry_config.max_retries + 1,
                    delay
                );
                sleep(Duration::from_millis(delay)).await;
                delay = ((delay as f64 * self.retry_config.backoff_factor) as u64)
                    .min(self.retry_config.max_delay_ms);
            }
            match self.call_provider(prompt).await {
                Ok(result) => return Ok(result),
                Err(failure) if failure.retryable => last_error = Some(failure.error),
                Err(failure) => return Err(failure.error)
            }
        }
        Err(last_error.unwrap_or_else(|| llm_api_error("All retry attempts failed")))
    }

    async fn call_provider(&self, prompt: &str) -> Result<String, CallFailure> {
        tracing::debug!(
            provider = self.provider.name(),
            model = self.provider.model(),
            prompt_len = prompt.len(),
            "Sending completion request"
        );
        match &self.provider {
            LlmProvider::Gemini {
                api_key,
                model
            } => self.call_gemini(api_key, model, prompt).await,
            LlmProvider::OpenAI {
                api_key,
                model
            } => self.call_openai(api_key, model, prompt).await,
            LlmProvider::Anthropic {
                api_key,
                model
            } => self.call_anthropic(api_key, model, prompt).await,
            LlmProvider::Ollama {
                base_url,
                model
            } => self.call_ollama(base_url, model, prompt).await
        }
    }

    async fn call_gemini(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str
    ) -> Result<String, CallFailure> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string()
                }]
            }]
        };
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            model
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(CallFailure::transport)?;
        let response = ensure_success("Gemini", response).await?;
        let result: GeminiResponse = response.json().await.map_err(CallFailure::transport)?;
        result
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .reduce(|mut acc, text| {
                acc.push_str(&text);
                acc
            })
            .ok_or_else(|| CallFailure::fatal(llm_api_error("Empty response from Gemini")))
    }

    async fn call_openai(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str
    ) -> Result<String, CallFailure> {
        let request = OpenAIRequest {
            model:    model.to_string(),
            messages: vec![OpenAIRequestMessage {
                role:    String::from("user"),
                content: prompt.to_string()
            }]
        };
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(CallFailure::transport)?;
        let response = ensure_success("OpenAI", response).await?;
        let result: OpenAIResponse = response.json().await.map_err(CallFailure::transport)?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CallFailure::fatal(llm_api_error("Empty response from OpenAI")))
    }

    async fn call_anthropic(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str
    ) -> Result<String, CallFailure> {
        let request = AnthropicRequest {
            model:      model.to_string(),
            max_tokens: 4096,
            messages:   vec![AnthropicMessage {
                role:    String::from("user"),
                content: prompt.to_string()
            }]
        };
        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(CallFailure::transport)?;
        let response = ensure_success("Anthropic", response).await?;
        let result: AnthropicResponse = response.json().await.map_err(CallFailure::transport)?;
        result
            .content
            .first()
            .map(|c| c.text.clone())
            .ok_or_else(|| CallFailure::fatal(llm_api_error("Empty response from Anthropic")))
    }

    async fn call_ollama(
        &self,
        base_url: &str,
        model: &str,
        prompt: &str
    ) -> Result<String, CallFailure> {
        let request = OllamaRequest {
            model:  model.to_string(),
            prompt: prompt.to_string(),
            stream: false
        };
        let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(CallFailure::transport)?;
        let response = ensure_success("Ollama", response).await?;
        let result: OllamaResponse = response.json().await.map_err(CallFailure::transport)?;
        Ok(result.response)
    }
}

/// Failed provider call and whether another attempt may succeed.
struct CallFailure {
    error:     AppError,
    retryable: bool
}

impl CallFailure {
    fn fatal(error: AppError) -> Self {
        Self {
            error,
            retryable: false
        }
    }

    fn transport(err: reqwest::Error) -> Self {
        let retryable = is_retryable_transport(&err);
        Self {
            error: http_error(err),
            retryable
        }
    }
}

/// Turn a non-success response into a failure carrying the response body
async fn ensure_success(
    provider: &str,
    response: reqwest::Response
) -> Result<reqwest::Response, CallFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(CallFailure {
        error:     llm_api_error(format!("{} API error {}: {}", provider, status, text)),
        retryable: is_retryable_status(status)
    })
}

/// Rate limiting and server-side failures are worth another attempt
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn is_retryable_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.status().is_some_and(is_retryable_status)
}
