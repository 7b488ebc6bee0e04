//! Embedding client abstraction and implementations.
//!
//! Embeddings are needed in two places: ingestion embeds every corpus
//! section, and the store-backed retriever embeds the incoming question.
//! Both go through the [`EmbeddingClient`] trait so tests can substitute a
//! deterministic local implementation.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

use crate::llm::openai::{post_json, OpenAiApiError};
use crate::llm::OpenAiProvider;

/// Abstraction for text embedding.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding backend is unreachable or returns
    /// a malformed response.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedding backend returned no vectors"))
    }

    /// Get the embedding model name.
    fn model_name(&self) -> &str;
}

// =============================================================================
// OpenAI Embeddings
// =============================================================================

/// Response from the OpenAI embeddings API.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// OpenAI embeddings client.
///
/// Speaks the `/embeddings` endpoint through the same curl transport as the
/// chat provider.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    /// Embedding model ID.
    model: String,
    /// Environment variable name for API key.
    api_key_env: String,
    /// Request timeout in seconds.
    timeout_secs: u64,
    /// API base URL.
    api_base: String,
}

impl OpenAiEmbeddings {
    /// Default embedding model.
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-large";

    /// Create a new embeddings client with the default model.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            api_key_env: OpenAiProvider::DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: OpenAiProvider::DEFAULT_TIMEOUT_SECS,
            api_base: OpenAiProvider::DEFAULT_API_BASE.to_string(),
        }
    }

    /// Set the embedding model ID.
    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
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

    /// Set a custom API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn get_api_key(&self) -> std::result::Result<String, OpenAiApiError> {
        env::var(&self.api_key_env).map_err(|_| OpenAiApiError::ApiKeyNotFound {
            env_var: self.api_key_env.clone(),
        })
    }
}

impl Default for OpenAiEmbeddings {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self.get_api_key()?;
        let url = format!("{}/embeddings", self.api_base);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let body_json = serde_json::to_string(&body)?;

        debug!("Embedding {} texts with {}", texts.len(), self.model);

        let response_body = post_json(&url, &api_key, &body_json, self.timeout_secs).await?;
        let response: EmbeddingResponse = serde_json::from_str(&response_body)
            .map_err(|e| anyhow::anyhow!("failed to parse embeddings response: {e}"))?;

        if response.data.len() != texts.len() {
            anyhow::bail!(
                "embedding count mismatch: sent {} texts, got {} vectors",
                texts.len(),
                response.data.len()
            );
        }

        // The API documents data as ordered, but carries an index field
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// =============================================================================
// Mock Embeddings
// =============================================================================

/// Deterministic embedding client for tests.
///
/// Maps each text to a fixed-dimension vector derived from its bytes, so
/// identical texts always embed identically and no network is involved.
#[derive(Debug)]
pub struct MockEmbeddings {
    /// Output vector dimension.
    dimension: usize,
    /// Error to return (if set).
    error: Option<String>,
    /// Count of embed calls.
    call_count: AtomicU32,
}

impl MockEmbeddings {
    /// Create a mock with the given output dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            error: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Configure the mock to return an error on every call.
    #[must_use]
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Get the number of times `embed` was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dimension] += f32::from(byte) / 255.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(ref error) = self.error {
            anyhow::bail!("{}", error)
        }

        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embeddings"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embeddings_deterministic() {
        let mock = MockEmbeddings::new(8);
        let a = mock.embed_query("hello").await.unwrap();
        let b = mock.embed_query("hello").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_embeddings_distinct_texts_differ() {
        let mock = MockEmbeddings::new(8);
        let a = mock.embed_query("alpha").await.unwrap();
        let b = mock.embed_query("a completely different sentence").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_mock_embeddings_batch_order() {
        let mock = MockEmbeddings::new(4);
        let texts = vec!["one".to_string(), "two".to_string()];
        let vectors = mock.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], mock.embed_text("one"));
        assert_eq!(vectors[1], mock.embed_text("two"));
    }

    #[tokio::test]
    async fn test_mock_embeddings_error() {
        let mock = MockEmbeddings::new(4).with_error("offline");
        let err = mock.embed_query("x").await.unwrap_err();
        assert!(err.to_string().contains("offline"));
    }

    #[tokio::test]
    async fn test_openai_embeddings_missing_key() {
        let client = OpenAiEmbeddings::new().with_api_key_env("RAGNAR_TEST_NO_SUCH_KEY");
        let err = client.embed_query("x").await.unwrap_err();
        assert!(err.to_string().contains("RAGNAR_TEST_NO_SUCH_KEY"));
    }

    #[test]
    fn test_openai_embeddings_builder() {
        let client = OpenAiEmbeddings::new()
            .with_model("text-embedding-3-small")
            .with_api_base("https://proxy.local/v1/");
        assert_eq!(client.model_name(), "text-embedding-3-small");
        assert_eq!(client.api_base, "https://proxy.local/v1");
    }
}
