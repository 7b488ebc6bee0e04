//! Custom error types for Ragnar.
//!
//! This module provides structured error types that enable better
//! error handling, reporting, and recovery throughout the application.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Ragnar operations
#[derive(Error, Debug)]
pub enum RagnarError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    /// Answer evaluation failed and the loop cannot route without a verdict
    #[error("Evaluation error: {message}")]
    Evaluation { message: String },

    // =========================================================================
    // Retrieval and Store Errors
    // =========================================================================
    /// Document store operation failed
    #[error("Document store error: {message}")]
    Store {
        message: String,
        path: Option<PathBuf>,
    },

    /// Embedding request failed
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Corpus ingestion failed
    #[error("Ingestion error: {message}")]
    Ingest { message: String },

    // =========================================================================
    // LLM Errors
    // =========================================================================
    /// LLM backend call failed
    #[error("LLM backend '{backend}' failed: {message}")]
    Llm { backend: String, message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RagnarError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an evaluation error
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
            path: None,
        }
    }

    /// Create a store error with path
    pub fn store_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Store {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create an ingestion error
    pub fn ingest(message: impl Into<String>) -> Self {
        Self::Ingest {
            message: message.into(),
        }
    }

    /// Create an LLM error
    pub fn llm(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Llm {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Check if this error is fatal to the invocation.
    ///
    /// Retrieval and generation failures are absorbed by the pipeline steps
    /// before an error value is ever constructed, so any `Evaluation` error
    /// reaching a caller means the invocation could not produce a verdict.
    #[must_use]
    pub fn is_evaluation_failure(&self) -> bool {
        matches!(self, Self::Evaluation { .. })
    }
}

/// Result type alias for Ragnar operations
pub type Result<T> = std::result::Result<T, RagnarError>;
