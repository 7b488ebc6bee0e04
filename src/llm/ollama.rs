//! Ollama LLM provider implementation.
//!
//! This module provides an Ollama client that implements the [`LlmClient`]
//! trait for local LLM inference. Ollama runs open-source models such as
//! llama3 and mistral on the local machine, which makes it useful for
//! answering questions over a private corpus without sending text to a
//! hosted API.
//!
//! The provider shells out to the `ollama` CLI and degrades gracefully when
//! the binary or the requested model is unavailable.

use crate::llm::LlmClient;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Supported Ollama model variants.
///
/// These are common models available through Ollama. The actual availability
/// depends on which models have been pulled locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OllamaModel {
    /// Meta's Llama 3 - general purpose, 8B parameters
    #[default]
    Llama3,
    /// Meta's Llama 3.1 - improved version, 8B parameters
    Llama3_1,
    /// Mistral 7B - efficient general purpose model
    Mistral,
    /// Custom model name
    Custom(String),
}

impl OllamaModel {
    /// Get the model name as used by Ollama.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ragnar::llm::ollama::OllamaModel;
    ///
    /// assert_eq!(OllamaModel::Llama3.model_name(), "llama3");
    /// assert_eq!(OllamaModel::Mistral.model_name(), "mistral");
    /// ```
    #[must_use]
    pub fn model_name(&self) -> &str {
        match self {
            Self::Llama3 => "llama3",
            Self::Llama3_1 => "llama3.1",
            Self::Mistral => "mistral",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Parse a model name string into an `OllamaModel`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "llama3" | "llama-3" => Self::Llama3,
            "llama3.1" | "llama-3.1" => Self::Llama3_1,
            "mistral" => Self::Mistral,
            _ => Self::Custom(s.to_string()),
        }
    }
}

/// Errors from the Ollama runtime.
#[derive(Debug, Error)]
pub enum OllamaApiError {
    /// The ollama CLI is not installed or not on PATH.
    #[error("ollama CLI not found: {message}")]
    CliNotFound { message: String },

    /// The requested model has not been pulled.
    #[error("Model '{model}' not available locally (try 'ollama pull {model}')")]
    ModelNotFound { model: String },

    /// The Ollama server is not responding.
    #[error("Ollama server unavailable: {message}")]
    ServerUnavailable { message: String },

    /// Request timed out.
    #[error("Ollama request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Process-level failure.
    #[error("Ollama process error: {message}")]
    ProcessError { message: String },
}

/// Local Ollama LLM provider.
///
/// # Example
///
/// ```rust,ignore
/// use ragnar::llm::{OllamaProvider, OllamaModel, LlmClient};
///
/// let provider = OllamaProvider::new(OllamaModel::Llama3);
/// if provider.available().await {
///     let response = provider.run_prompt("Hello!").await?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// Model variant to use.
    model: OllamaModel,
    /// Request timeout in seconds.
    timeout_secs: u64,
}

impl OllamaProvider {
    /// Default timeout for local inference (5 minutes).
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Create a new Ollama provider with the specified model.
    #[must_use]
    pub fn new(model: OllamaModel) -> Self {
        Self {
            model,
            timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Check if Ollama is installed and the model is available.
    pub async fn available(&self) -> bool {
        self.check_availability().await.unwrap_or(false)
    }

    /// Check if Ollama is running and the model has been pulled.
    ///
    /// Uses `ollama list` to detect availability.
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected process failures; a missing
    /// binary or model reports `Ok(false)`.
    pub async fn check_availability(&self) -> std::result::Result<bool, OllamaApiError> {
        if which::which("ollama").is_err() {
            return Ok(false);
        }

        // 'ollama list' fails when the server isn't running
        let output = match tokio::time::timeout(
            Duration::from_secs(5),
            AsyncCommand::new("ollama").arg("list").output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("Failed to run 'ollama list': {}", e);
                return Ok(false);
            }
            Err(_) => {
                debug!("'ollama list' timed out");
                return Ok(false);
            }
        };

        if !output.status.success() {
            return Ok(false);
        }

        // Output format:
        // NAME            ID              SIZE    MODIFIED
        // llama3:latest   abc123...       4.7GB   2 days ago
        let stdout = String::from_utf8_lossy(&output.stdout);
        let model_name = self.model.model_name();
        let model_available = stdout.lines().skip(1).any(|line| {
            line.split_whitespace().next().is_some_and(|name| {
                name.starts_with(model_name) || name.split(':').next() == Some(model_name)
            })
        });

        Ok(model_available)
    }

    /// Run a prompt via the ollama CLI.
    async fn execute_prompt(&self, prompt: &str) -> std::result::Result<String, OllamaApiError> {
        let available = self.check_availability().await?;
        if !available {
            return Err(OllamaApiError::ModelNotFound {
                model: self.model.model_name().to_string(),
            });
        }

        let model_name = self.model.model_name();

        debug!(
            "Running Ollama {} ({} chars prompt)",
            model_name,
            prompt.len()
        );

        let mut child = AsyncCommand::new("ollama")
            .args(["run", model_name])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| OllamaApiError::ProcessError {
                message: format!("Failed to spawn ollama process: {}", e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| OllamaApiError::ProcessError {
                    message: format!("Failed to write prompt: {}", e),
                })?;
            stdin
                .flush()
                .await
                .map_err(|e| OllamaApiError::ProcessError {
                    message: format!("Failed to flush stdin: {}", e),
                })?;
            drop(stdin);
        }

        let output = match tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(OllamaApiError::ProcessError {
                    message: format!("Failed to read output: {}", e),
                });
            }
            Err(_) => {
                return Err(OllamaApiError::Timeout {
                    timeout_secs: self.timeout_secs,
                });
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            if stderr.contains("not found") {
                Err(OllamaApiError::ModelNotFound {
                    model: model_name.to_string(),
                })
            } else if stderr.contains("connection refused") || stderr.contains("connect:") {
                Err(OllamaApiError::ServerUnavailable { message: stderr })
            } else {
                Err(OllamaApiError::ProcessError { message: stderr })
            }
        }
    }
}

#[async_trait]
impl LlmClient for OllamaProvider {
    async fn run_prompt(&self, prompt: &str) -> Result<String> {
        let content = self.execute_prompt(prompt).await?;
        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        self.model.model_name()
    }
}
