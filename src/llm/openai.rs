//! OpenAI LLM provider implementation.
//!
//! This module provides an OpenAI client that implements the [`LlmClient`]
//! trait. It includes structured error types, rate limit detection, and
//! support for the GPT-4.1 and GPT-4o model families.
//!
//! # Architecture
//!
//! The [`OpenAiProvider`] communicates with OpenAI's chat completions API
//! over HTTPS. The crate carries no native HTTP client, so requests go
//! through a `curl` subprocess (see [`post_json`]). The same helper backs
//! the embeddings client in [`crate::retrieval::embedding`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ragnar::llm::{OpenAiProvider, OpenAiModel, LlmClient};
//!
//! let provider = OpenAiProvider::new(OpenAiModel::Gpt41Mini)
//!     .with_api_key_env("OPENAI_API_KEY");
//!
//! let response = provider.run_prompt("Hello!").await?;
//! ```

use crate::llm::LlmClient;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use tracing::debug;

// =============================================================================
// OpenAI Model Variants
// =============================================================================

/// Supported OpenAI model variants.
///
/// Each variant has different capabilities and pricing. Use
/// [`OpenAiModel::model_id`] to get the full model ID for API calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OpenAiModel {
    /// GPT-4.1 Mini - fast, affordable model tuned for instruction following
    #[default]
    Gpt41Mini,
    /// GPT-4.1 - flagship model
    Gpt41,
    /// GPT-4o - multimodal flagship of the previous generation
    Gpt4o,
    /// GPT-4o Mini - small, inexpensive model
    Gpt4oMini,
    /// Custom model ID passed through verbatim
    Custom(String),
}

impl OpenAiModel {
    /// Get the full model ID for API calls.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ragnar::llm::openai::OpenAiModel;
    ///
    /// assert_eq!(OpenAiModel::Gpt41Mini.model_id(), "gpt-4.1-mini");
    /// assert_eq!(OpenAiModel::Gpt4o.model_id(), "gpt-4o");
    /// ```
    #[must_use]
    pub fn model_id(&self) -> &str {
        match self {
            Self::Gpt41Mini => "gpt-4.1-mini",
            Self::Gpt41 => "gpt-4.1",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
            Self::Custom(id) => id.as_str(),
        }
    }

    /// Get the context window size for this model.
    #[must_use]
    pub fn context_window(&self) -> u32 {
        match self {
            Self::Gpt41Mini | Self::Gpt41 => 1_047_576,
            Self::Gpt4o | Self::Gpt4oMini => 128_000,
            Self::Custom(_) => 128_000,
        }
    }

    /// Get the maximum output tokens to request.
    #[must_use]
    pub fn max_output_tokens(&self) -> u32 {
        match self {
            Self::Gpt41Mini | Self::Gpt41 => 32_768,
            Self::Gpt4o | Self::Gpt4oMini | Self::Custom(_) => 16_384,
        }
    }

    /// Parse a model name string into an `OpenAiModel`.
    ///
    /// Unrecognized names become [`OpenAiModel::Custom`] so that new model
    /// IDs work without a crate release.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ragnar::llm::openai::OpenAiModel;
    ///
    /// assert_eq!(OpenAiModel::parse("gpt-4.1-mini"), OpenAiModel::Gpt41Mini);
    /// assert_eq!(
    ///     OpenAiModel::parse("gpt-5-preview"),
    ///     OpenAiModel::Custom("gpt-5-preview".to_string())
    /// );
    /// ```
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gpt-4.1-mini" => Self::Gpt41Mini,
            "gpt-4.1" => Self::Gpt41,
            "gpt-4o" => Self::Gpt4o,
            "gpt-4o-mini" => Self::Gpt4oMini,
            _ => Self::Custom(s.to_string()),
        }
    }
}

// =============================================================================
// OpenAI API Errors
// =============================================================================

/// Structured errors from the OpenAI API.
#[derive(Debug, Error)]
pub enum OpenAiApiError {
    /// API key environment variable not set.
    #[error("API key not found in environment variable {env_var}")]
    ApiKeyNotFound { env_var: String },

    /// Rate limit exceeded.
    #[error("Rate limited: {message} (retry after {retry_after_secs}s)")]
    RateLimited {
        message: String,
        retry_after_secs: u64,
    },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Invalid request.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Server-side error.
    #[error("OpenAI server error: {message}")]
    ServerError { message: String },

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Connection failed.
    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    /// Invalid response from API.
    #[error("Invalid API response: {message}")]
    InvalidResponse { message: String },
}

impl OpenAiApiError {
    /// Check if this error indicates the request should be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::ServerError { .. }
                | Self::Timeout { .. }
                | Self::ConnectionError { .. }
        )
    }

    /// Extract retry-after seconds from an error message body.
    fn extract_retry_after(body: &str) -> Option<u64> {
        let patterns = [
            r"retry.?after[:\s]+(\d+)",
            r"wait[:\s]+(\d+)",
            r"(\d+)\s*seconds?",
        ];

        for pattern in patterns {
            if let Ok(re) = regex::Regex::new(pattern) {
                if let Some(caps) = re.captures(&body.to_lowercase()) {
                    if let Some(m) = caps.get(1) {
                        if let Ok(secs) = m.as_str().parse::<u64>() {
                            return Some(secs);
                        }
                    }
                }
            }
        }
        None
    }

    /// Classify an error payload returned in a 200-or-otherwise response body.
    fn from_error_payload(error_type: &str, message: &str) -> Self {
        if error_type.contains("rate_limit") || message.contains("rate limit") {
            let retry_after = Self::extract_retry_after(message).unwrap_or(60);
            return Self::RateLimited {
                message: message.to_string(),
                retry_after_secs: retry_after,
            };
        }
        if error_type.contains("authentication") || message.contains("API key") {
            return Self::AuthenticationFailed {
                message: message.to_string(),
            };
        }
        if error_type.contains("server_error") {
            return Self::ServerError {
                message: message.to_string(),
            };
        }
        Self::InvalidRequest {
            message: message.to_string(),
        }
    }
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// POST a JSON body to an authenticated endpoint and return the raw response.
///
/// Uses curl as a subprocess since the crate carries no native HTTP client.
/// Error payloads embedded in the response body are surfaced as structured
/// [`OpenAiApiError`] values.
pub(crate) async fn post_json(
    url: &str,
    api_key: &str,
    body_json: &str,
    timeout_secs: u64,
) -> std::result::Result<String, OpenAiApiError> {
    let output = tokio::process::Command::new("curl")
        .args([
            "-s",
            "-X",
            "POST",
            url,
            "-H",
            &format!("Authorization: Bearer {}", api_key),
            "-H",
            "Content-Type: application/json",
            "-d",
            body_json,
            "--max-time",
            &timeout_secs.to_string(),
        ])
        .output()
        .await
        .map_err(|e| OpenAiApiError::ConnectionError {
            message: format!("Failed to execute curl: {}", e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // curl exit code 28 is a timeout
        if output.status.code() == Some(28) || stderr.contains("timed out") {
            return Err(OpenAiApiError::Timeout { timeout_secs });
        }
        return Err(OpenAiApiError::ConnectionError {
            message: format!("curl failed: {}", stderr),
        });
    }

    let response_body = String::from_utf8_lossy(&output.stdout).to_string();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&response_body) {
        if let Some(error) = value.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            let error_type = error.get("type").and_then(|t| t.as_str()).unwrap_or("");
            return Err(OpenAiApiError::from_error_payload(error_type, message));
        }
    }

    Ok(response_body)
}

// =============================================================================
// OpenAI API Request/Response Types
// =============================================================================

/// Message in an OpenAI chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request body for OpenAI chat completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Choice in API response.
#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Response from OpenAI chat completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

// =============================================================================
// OpenAI Provider
// =============================================================================

/// OpenAI LLM provider.
///
/// Implements the [`LlmClient`] trait with:
/// - HTTP API calls to OpenAI's chat completions endpoint
/// - Structured error types with rate-limit classification
/// - Support for GPT-4.1 and GPT-4o model variants
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    /// Model variant to use.
    model: OpenAiModel,
    /// Cached model ID, returned by [`LlmClient::model_name`].
    model_id: String,
    /// Environment variable name for API key.
    api_key_env: String,
    /// Request timeout in seconds.
    timeout_secs: u64,
    /// API base URL.
    api_base: String,
}

impl OpenAiProvider {
    /// Default timeout for requests (2 minutes).
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Default API base URL.
    pub const DEFAULT_API_BASE: &'static str = "https://api.openai.com/v1";

    /// Default API key environment variable.
    pub const DEFAULT_API_KEY_ENV: &'static str = "OPENAI_API_KEY";

    /// Create a new OpenAI provider with the specified model.
    #[must_use]
    pub fn new(model: OpenAiModel) -> Self {
        let model_id = model.model_id().to_string();
        Self {
            model,
            model_id,
            api_key_env: Self::DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            api_base: Self::DEFAULT_API_BASE.to_string(),
        }
    }

    /// Set the environment variable name for the API key.
    #[must_use]
    pub fn with_api_key_env(mut self, env_var: &str) -> Self {
        self.api_key_env = env_var.to_string();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set a custom API base URL (for Azure OpenAI or proxies).
    #[must_use]
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Get the current model.
    #[must_use]
    pub fn model(&self) -> &OpenAiModel {
        &self.model
    }

    /// Get the API key from the environment.
    fn get_api_key(&self) -> std::result::Result<String, OpenAiApiError> {
        env::var(&self.api_key_env).map_err(|_| OpenAiApiError::ApiKeyNotFound {
            env_var: self.api_key_env.clone(),
        })
    }

    /// Execute a chat completion request and return the message content.
    async fn execute_request(&self, prompt: &str) -> std::result::Result<String, OpenAiApiError> {
        let api_key = self.get_api_key()?;
        let url = format!("{}/chat/completions", self.api_base);

        let request_body = ChatCompletionRequest {
            model: self.model_id.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: Some(self.model.max_output_tokens()),
            temperature: Some(0.0),
        };

        let body_json =
            serde_json::to_string(&request_body).map_err(|e| OpenAiApiError::InvalidRequest {
                message: format!("Failed to serialize request: {}", e),
            })?;

        debug!(
            "Sending request to OpenAI {} ({} chars prompt)",
            self.model_id,
            prompt.len()
        );

        let response_body = post_json(&url, &api_key, &body_json, self.timeout_secs).await?;

        let response: ChatCompletionResponse =
            serde_json::from_str(&response_body).map_err(|e| OpenAiApiError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })?;

        let content = response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| OpenAiApiError::InvalidResponse {
                message: "Response contained no choices".to_string(),
            })?;

        Ok(content)
    }
}

#[async_trait]
impl LlmClient for OpenAiProvider {
    async fn run_prompt(&self, prompt: &str) -> Result<String> {
        let content = self.execute_request(prompt).await?;
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_mapping() {
        assert_eq!(OpenAiModel::Gpt41Mini.model_id(), "gpt-4.1-mini");
        assert_eq!(OpenAiModel::Gpt41.model_id(), "gpt-4.1");
        assert_eq!(OpenAiModel::Gpt4o.model_id(), "gpt-4o");
        assert_eq!(OpenAiModel::Gpt4oMini.model_id(), "gpt-4o-mini");
    }

    #[test]
    fn test_model_parse_roundtrip() {
        for name in ["gpt-4.1-mini", "gpt-4.1", "gpt-4o", "gpt-4o-mini"] {
            assert_eq!(OpenAiModel::parse(name).model_id(), name);
        }
    }

    #[test]
    fn test_model_parse_custom() {
        let model = OpenAiModel::parse("gpt-5-preview");
        assert_eq!(model, OpenAiModel::Custom("gpt-5-preview".to_string()));
        assert_eq!(model.model_id(), "gpt-5-preview");
    }

    #[test]
    fn test_default_model_is_gpt41_mini() {
        assert_eq!(OpenAiModel::default(), OpenAiModel::Gpt41Mini);
    }

    #[test]
    fn test_error_retryable_classification() {
        let rate = OpenAiApiError::RateLimited {
            message: "slow down".to_string(),
            retry_after_secs: 30,
        };
        assert!(rate.is_retryable());

        let auth = OpenAiApiError::AuthenticationFailed {
            message: "bad key".to_string(),
        };
        assert!(!auth.is_retryable());
    }

    #[test]
    fn test_extract_retry_after() {
        assert_eq!(
            OpenAiApiError::extract_retry_after("Please retry after 42 seconds"),
            Some(42)
        );
        assert_eq!(OpenAiApiError::extract_retry_after("no digits here"), None);
    }

    #[test]
    fn test_from_error_payload_rate_limit() {
        let err = OpenAiApiError::from_error_payload("rate_limit_exceeded", "retry after 10s");
        assert!(matches!(
            err,
            OpenAiApiError::RateLimited {
                retry_after_secs: 10,
                ..
            }
        ));
    }

    #[test]
    fn test_from_error_payload_authentication() {
        let err = OpenAiApiError::from_error_payload("authentication_error", "Incorrect API key");
        assert!(matches!(err, OpenAiApiError::AuthenticationFailed { .. }));
    }

    #[test]
    fn test_provider_builder() {
        let provider = OpenAiProvider::new(OpenAiModel::Gpt4o)
            .with_api_key_env("MY_KEY")
            .with_timeout(30)
            .with_api_base("https://proxy.example.com/v1/");

        assert_eq!(provider.model_name(), "gpt-4o");
        assert_eq!(provider.api_key_env, "MY_KEY");
        assert_eq!(provider.timeout_secs, 30);
        assert_eq!(provider.api_base, "https://proxy.example.com/v1");
    }

    #[tokio::test]
    async fn test_missing_api_key_errors_before_any_request() {
        let provider = OpenAiProvider::new(OpenAiModel::Gpt41Mini)
            .with_api_key_env("RAGNAR_TEST_KEY_THAT_DOES_NOT_EXIST");
        let err = provider.run_prompt("hello").await.unwrap_err();
        assert!(err
            .to_string()
            .contains("RAGNAR_TEST_KEY_THAT_DOES_NOT_EXIST"));
    }
}
