//! Document retrieval for the answer pipeline.
//!
//! The pipeline consumes retrieval through the narrow [`Retriever`] trait:
//! a query in, a relevance-ordered list of [`RetrievedDocument`]s out. The
//! production implementation is [`StoreRetriever`], which embeds the query
//! and searches the ingested [`store::VectorStore`]; tests use
//! [`MockRetriever`].

pub mod embedding;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub use embedding::{EmbeddingClient, MockEmbeddings, OpenAiEmbeddings};
pub use store::{DocumentRecord, StoreMetadata, VectorStore};

/// Default number of documents returned per query.
pub const DEFAULT_TOP_K: usize = 4;

/// One retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Document text.
    pub content: String,
    /// Human-readable origin of the text.
    pub source_label: String,
    /// Relevance score, higher is better.
    pub score: f32,
}

/// Abstraction for document retrieval.
///
/// Implementations return results ordered by descending relevance and may
/// return an empty list. Callers treat failure and empty results
/// identically, so implementations should not strain to mask errors.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Search the corpus for documents relevant to the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store or embedding backend fails.
    async fn search(&self, query: &str) -> Result<Vec<RetrievedDocument>>;
}

// =============================================================================
// Store-backed Retriever
// =============================================================================

/// Retriever over an ingested vector store.
///
/// Embeds the query with the same model the store was built with and
/// returns the top-k sections by cosine similarity.
pub struct StoreRetriever {
    store: VectorStore,
    embedder: Arc<dyn EmbeddingClient>,
    top_k: usize,
}

impl StoreRetriever {
    /// Create a retriever over an already-loaded store.
    #[must_use]
    pub fn new(store: VectorStore, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            store,
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Load the store from disk and wrap it in a retriever.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file is missing or malformed.
    pub fn open(path: &Path, embedder: Arc<dyn EmbeddingClient>) -> crate::error::Result<Self> {
        let store = VectorStore::load(path)?;
        Ok(Self::new(store, embedder))
    }

    /// Set the number of documents returned per query.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Number of records available to search.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.store.len()
    }
}

#[async_trait]
impl Retriever for StoreRetriever {
    async fn search(&self, query: &str) -> Result<Vec<RetrievedDocument>> {
        if self.store.is_empty() {
            debug!("Document store is empty");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        let hits = self.store.search(&query_embedding, self.top_k);

        Ok(hits
            .into_iter()
            .map(|(score, record)| RetrievedDocument {
                content: record.text.clone(),
                source_label: record.source_label.clone(),
                score,
            })
            .collect())
    }
}

// =============================================================================
// Mock Retriever
// =============================================================================

/// Mock retriever for testing.
///
/// Returns a fixed document list or a fixed error, and records queries so
/// tests can assert how many retrieval calls the pipeline made.
#[derive(Debug, Default)]
pub struct MockRetriever {
    documents: Vec<RetrievedDocument>,
    error: Option<String>,
    call_count: AtomicU32,
    queries: Mutex<Vec<String>>,
}

impl MockRetriever {
    /// Create a mock that returns no documents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the documents to return from every search.
    #[must_use]
    pub fn with_documents(mut self, documents: Vec<RetrievedDocument>) -> Self {
        self.documents = documents;
        self
    }

    /// Convenience for a single-document mock.
    #[must_use]
    pub fn with_document(self, content: &str, source_label: &str) -> Self {
        let mut documents = self.documents.clone();
        documents.push(RetrievedDocument {
            content: content.to_string(),
            source_label: source_label.to_string(),
            score: 1.0,
        });
        Self {
            documents,
            ..self
        }
    }

    /// Configure the mock to fail every search.
    #[must_use]
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Get the number of times `search` was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the queries received so far, in call order.
    pub fn recorded_queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    async fn search(&self, query: &str) -> Result<Vec<RetrievedDocument>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(query.to_string());

        if let Some(ref error) = self.error {
            anyhow::bail!("{}", error)
        }

        Ok(self.documents.clone())
    }
}
