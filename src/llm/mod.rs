//! LLM client abstraction layer for multi-backend support.
//!
//! This module provides a trait-based abstraction for LLM clients, enabling
//! Ragnar to drive answer generation and evaluation through multiple backends
//! (OpenAI, Ollama) behind a unified interface.
//!
//! # Architecture
//!
//! The [`LlmClient`] trait defines the core interface that all LLM clients must
//! implement. It is designed to be:
//!
//! - **Object-safe**: Supports dynamic dispatch via `Arc<dyn LlmClient>`
//! - **Thread-safe**: `Send + Sync` bounds enable concurrent usage
//! - **Async-first**: Core operations are async for non-blocking I/O
//!
//! # Example
//!
//! ```rust,ignore
//! use ragnar::llm::{LlmClient, OpenAiProvider, OpenAiModel};
//!
//! let client: Box<dyn LlmClient> = Box::new(OpenAiProvider::new(OpenAiModel::Gpt41Mini));
//! let response = client.run_prompt("Hello, world!").await?;
//! ```

pub mod ollama;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub use ollama::{OllamaModel, OllamaProvider};
pub use openai::{OpenAiApiError, OpenAiModel, OpenAiProvider};

/// Abstraction for LLM client operations.
///
/// This trait defines the core interface for interacting with large language
/// models. Implementations can wrap specific APIs (OpenAI, Ollama) while
/// providing a unified interface for the answer pipeline.
///
/// # Object Safety
///
/// This trait is object-safe and can be used with `Arc<dyn LlmClient>` for
/// dynamic dispatch. This enables runtime backend selection without generic
/// type parameters.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` so that distinct invocations of
/// the pipeline can run concurrently against a shared client.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run a prompt and return the model's response.
    ///
    /// # Arguments
    ///
    /// * `prompt` - The prompt text to send to the model
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The model API is unreachable
    /// - Authentication fails
    /// - The request times out
    /// - The response cannot be parsed
    async fn run_prompt(&self, prompt: &str) -> Result<String>;

    /// Get the name of the model being used.
    ///
    /// Returns a human-readable model identifier (e.g., "gpt-4.1-mini",
    /// "llama3").
    fn model_name(&self) -> &str;
}

/// Mock LLM client for testing.
///
/// Provides controllable behavior for unit tests without making actual
/// API calls. Thread-safe for use in async contexts.
///
/// Responses can be scripted so that consecutive calls return different
/// payloads, which is how tests drive the generate/evaluate cycle through
/// multiple attempts.
///
/// # Example
///
/// ```rust,ignore
/// use ragnar::llm::MockLlmClient;
///
/// let client = MockLlmClient::new()
///     .with_responses(["draft one", "draft two"]);
///
/// assert_eq!(client.run_prompt("a").await.unwrap(), "draft one");
/// assert_eq!(client.run_prompt("b").await.unwrap(), "draft two");
/// assert_eq!(client.call_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// Scripted responses, consumed front to back.
    script: Mutex<VecDeque<String>>,
    /// Response returned once the script is exhausted.
    fallback: String,
    /// Error to return on every call (if set).
    error: Option<String>,
    /// Model name to return.
    model: String,
    /// Count of prompt calls.
    call_count: AtomicU32,
    /// Number of calls to fail before succeeding.
    fail_count: AtomicU32,
    /// Error message for fail_count failures.
    fail_error: Option<String>,
    /// Prompts received, in call order.
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    /// Create a new mock client with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: "mock-llm".to_string(),
            ..Self::default()
        }
    }

    /// Set the response to return on every call.
    #[must_use]
    pub fn with_response(mut self, response: &str) -> Self {
        self.fallback = response.to_string();
        self
    }

    /// Script a sequence of responses, consumed one per call.
    ///
    /// After the script runs dry the fallback response is returned.
    #[must_use]
    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut script = self
                .script
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            script.extend(responses.into_iter().map(Into::into));
        }
        self
    }

    /// Configure the mock to return an error on every call.
    #[must_use]
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model = name.to_string();
        self
    }

    /// Configure the mock to fail the first N calls, then succeed.
    #[must_use]
    pub fn with_fail_count(mut self, count: u32, error: &str) -> Self {
        self.fail_count = AtomicU32::new(count);
        self.fail_error = Some(error.to_string());
        self
    }

    /// Get the number of times `run_prompt` was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the prompts received so far, in call order.
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn run_prompt(&self, prompt: &str) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(prompt.to_string());

        // Check fail_count first
        let current_fail_count = self.fail_count.load(Ordering::SeqCst);
        if current_fail_count > 0 {
            self.fail_count.fetch_sub(1, Ordering::SeqCst);
            if let Some(ref fail_error) = self.fail_error {
                anyhow::bail!("{}", fail_error)
            }
            anyhow::bail!("Mock failure")
        }

        // Check permanent error
        if let Some(ref error) = self.error {
            anyhow::bail!("{}", error)
        }

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();

        Ok(scripted.unwrap_or_else(|| self.fallback.clone()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// Configuration for LLM backend selection and options.
///
/// This configuration is typically loaded from the `[llm]` section of
/// `ragnar.toml` and can be overridden via CLI flags.
///
/// # Example ragnar.toml
///
/// ```toml
/// [llm]
/// backend = "openai"
/// model = "gpt-4.1-mini"
/// api_key_env = "OPENAI_API_KEY"
/// ```
///
/// # Supported Backends
///
/// - `openai`: OpenAI models via the chat completions API (default)
/// - `ollama`: Local models via the `ollama` CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// The LLM backend to use.
    ///
    /// Valid values: "openai", "ollama". Default: "openai".
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Model name within the selected backend.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable name containing the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Optional API base URL override (proxies, compatible servers).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    OpenAiModel::default().model_id().to_string()
}

fn default_api_key_env() -> String {
    OpenAiProvider::DEFAULT_API_KEY_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    OpenAiProvider::DEFAULT_TIMEOUT_SECS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self.backend.as_str() {
            "openai" | "ollama" => {}
            other => {
                return Err(format!(
                    "unknown llm backend '{other}' (expected 'openai' or 'ollama')"
                ))
            }
        }

        if self.model.trim().is_empty() {
            return Err("llm model must not be empty".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("llm timeout_secs must be at least 1".to_string());
        }

        Ok(())
    }
}

/// Create an LLM client from configuration.
///
/// # Errors
///
/// Returns an error if the configured backend is unknown.
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    match config.backend.as_str() {
        "openai" => {
            let mut provider = OpenAiProvider::new(OpenAiModel::parse(&config.model))
                .with_api_key_env(&config.api_key_env)
                .with_timeout(config.timeout_secs);
            if let Some(ref base) = config.base_url {
                provider = provider.with_api_base(base);
            }
            Ok(Arc::new(provider))
        }
        "ollama" => {
            let provider =
                OllamaProvider::new(OllamaModel::parse(&config.model)).with_timeout(config.timeout_secs);
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("unknown llm backend '{other}'"),
    }
}
