//! JSON-persisted vector store with cosine-similarity search.
//!
//! The store holds one record per corpus section, each carrying its text,
//! source label, and embedding vector. It is written once by ingestion and
//! read at serving time, so the on-disk format is a single JSON document
//! that loads fully into memory.

use crate::error::{RagnarError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One embedded corpus section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Section text as retrieved context.
    pub text: String,
    /// Human-readable origin, shown in assembled context blocks.
    pub source_label: String,
    /// Position of the section within its source.
    pub section_index: usize,
    /// Embedding vector for similarity search.
    pub embedding: Vec<f32>,
}

/// Store-level metadata written at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Embedding model used to build the store.
    pub embedding_model: String,
    /// Embedding dimension shared by all records.
    pub dimension: usize,
    /// When the store was built.
    pub built_at: DateTime<Utc>,
    /// Corpus file the store was built from.
    pub source: String,
}

/// In-memory vector store backed by a JSON file.
///
/// # Example
///
/// ```rust,ignore
/// use ragnar::retrieval::store::VectorStore;
///
/// let store = VectorStore::load("store.json".as_ref())?;
/// let hits = store.search(&query_embedding, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    /// Store metadata.
    pub metadata: StoreMetadata,
    /// Embedded sections.
    records: Vec<DocumentRecord>,
}

impl VectorStore {
    /// Create a store from ingested records.
    ///
    /// # Errors
    ///
    /// Returns an error if any record's embedding dimension disagrees with
    /// the metadata.
    pub fn new(metadata: StoreMetadata, records: Vec<DocumentRecord>) -> Result<Self> {
        for record in &records {
            if record.embedding.len() != metadata.dimension {
                return Err(RagnarError::store(format!(
                    "record '{}' has dimension {} but store dimension is {}",
                    record.source_label,
                    record.embedding.len(),
                    metadata.dimension
                )));
            }
        }
        Ok(Self { metadata, records })
    }

    /// Create an empty store with zero records.
    ///
    /// Searching an empty store returns no results, which the pipeline
    /// treats as the empty-evidence condition.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            metadata: StoreMetadata {
                embedding_model: String::new(),
                dimension: 0,
                built_at: Utc::now(),
                source: String::new(),
            },
            records: Vec::new(),
        }
    }

    /// Load a store from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagnarError::store_with_path(format!("failed to read store: {e}"), path.to_path_buf())
        })?;
        let store: Self = serde_json::from_str(&content).map_err(|e| {
            RagnarError::store_with_path(format!("failed to parse store: {e}"), path.to_path_buf())
        })?;
        Ok(store)
    }

    /// Persist the store to a JSON file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Number of records in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the `k` records most similar to the query embedding.
    ///
    /// Results are ordered by descending cosine similarity. Records whose
    /// dimension does not match the query are skipped.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(f32, &DocumentRecord)> {
        let mut scored: Vec<(f32, &DocumentRecord)> = self
            .records
            .iter()
            .filter(|r| r.embedding.len() == query.len())
            .map(|r| (cosine_similarity(query, &r.embedding), r))
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);
        scored
    }
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0.0 when either vector has zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(label: &str, embedding: Vec<f32>) -> DocumentRecord {
        DocumentRecord {
            text: format!("text for {label}"),
            source_label: label.to_string(),
            section_index: 0,
            embedding,
        }
    }

    fn metadata(dimension: usize) -> StoreMetadata {
        StoreMetadata {
            embedding_model: "test-model".to_string(),
            dimension,
            built_at: Utc::now(),
            source: "corpus.txt".to_string(),
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let store = VectorStore::new(
            metadata(2),
            vec![
                record("far", vec![0.0, 1.0]),
                record("near", vec![1.0, 0.0]),
                record("mid", vec![1.0, 1.0]),
            ],
        )
        .unwrap();

        let hits = store.search(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].1.source_label, "near");
        assert_eq!(hits[1].1.source_label, "mid");
        assert!(hits[0].0 > hits[1].0);
    }

    #[test]
    fn test_search_empty_store() {
        let store = VectorStore::empty();
        assert!(store.search(&[1.0, 0.0], 4).is_empty());
    }

    #[test]
    fn test_search_k_larger_than_store() {
        let store = VectorStore::new(metadata(2), vec![record("only", vec![1.0, 0.0])]).unwrap();
        let hits = store.search(&[1.0, 0.0], 10);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_new_rejects_dimension_mismatch() {
        let result = VectorStore::new(metadata(3), vec![record("bad", vec![1.0, 0.0])]);
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/store.json");

        let store = VectorStore::new(
            metadata(2),
            vec![record("a", vec![1.0, 0.0]), record("b", vec![0.0, 1.0])],
        )
        .unwrap();
        store.save(&path).unwrap();

        let loaded = VectorStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.metadata.embedding_model, "test-model");
        assert_eq!(loaded.metadata.dimension, 2);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let temp = TempDir::new().unwrap();
        let result = VectorStore::load(&temp.path().join("absent.json"));
        assert!(matches!(result, Err(RagnarError::Store { .. })));
    }
}
