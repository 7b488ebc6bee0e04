//! Offline corpus ingestion.
//!
//! Ingestion is a one-time batch job that turns a text corpus into the
//! vector store the retriever searches at serving time. The corpus is
//! whitespace-normalized, split into sections on a delimiter token, and
//! each section is embedded and persisted. The serving loop never calls
//! into this module.

use crate::error::{RagnarError, Result};
use crate::retrieval::{DocumentRecord, EmbeddingClient, StoreMetadata, VectorStore};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Default token separating corpus sections.
pub const DEFAULT_SECTION_DELIMITER: &str = "skirtukas";

/// Number of sections embedded concurrently.
const EMBED_CONCURRENCY: usize = 4;

/// Ingestion job parameters.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Corpus file to ingest (UTF-8 text).
    pub source: PathBuf,
    /// Where to write the store.
    pub store_path: PathBuf,
    /// Token separating sections in the corpus.
    pub delimiter: String,
    /// Whether to draw a progress bar.
    pub show_progress: bool,
}

impl IngestConfig {
    /// Create a config with the default delimiter.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            store_path: store_path.into(),
            delimiter: DEFAULT_SECTION_DELIMITER.to_string(),
            show_progress: false,
        }
    }

    /// Set the section delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: &str) -> Self {
        self.delimiter = delimiter.to_string();
        self
    }

    /// Enable the progress bar.
    #[must_use]
    pub fn with_progress(mut self) -> Self {
        self.show_progress = true;
        self
    }
}

/// Summary of a completed ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Number of sections written to the store.
    pub sections: usize,
    /// Embedding dimension of the store.
    pub dimension: usize,
    /// Embedding model used.
    pub embedding_model: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Split a corpus into sections.
///
/// Runs of whitespace are collapsed first, then the text is split on the
/// delimiter token; empty sections are dropped.
#[must_use]
pub fn split_sections(text: &str, delimiter: &str) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized
        .split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Ingest a corpus file into a vector store.
///
/// # Errors
///
/// Returns an error if the corpus cannot be read, yields no sections, an
/// embedding call fails, or the store cannot be written.
pub async fn ingest_file(
    config: &IngestConfig,
    embedder: Arc<dyn EmbeddingClient>,
) -> Result<IngestReport> {
    let started_at = Utc::now();

    let text = std::fs::read_to_string(&config.source).map_err(|e| {
        RagnarError::ingest(format!(
            "failed to read corpus {}: {e}",
            config.source.display()
        ))
    })?;

    let sections = split_sections(&text, &config.delimiter);
    if sections.is_empty() {
        return Err(RagnarError::ingest(format!(
            "no sections found in {} (delimiter '{}')",
            config.source.display(),
            config.delimiter
        )));
    }

    info!(
        "Ingesting {} sections from {}",
        sections.len(),
        config.source.display()
    );

    let source_label = source_label(&config.source);
    let progress = build_progress(config.show_progress, sections.len() as u64);

    // Embed in fixed-size batches, bounded concurrency, order preserved
    let batches: Vec<Vec<String>> = sections.chunks(16).map(<[String]>::to_vec).collect();
    let embedded: Vec<Result<Vec<Vec<f32>>>> = stream::iter(batches)
        .map(|batch| {
            let embedder = Arc::clone(&embedder);
            let progress = progress.clone();
            async move {
                let vectors = embedder
                    .embed(&batch)
                    .await
                    .map_err(|e| RagnarError::embedding(e.to_string()))?;
                if let Some(ref bar) = progress {
                    bar.inc(batch.len() as u64);
                }
                Ok(vectors)
            }
        })
        .buffered(EMBED_CONCURRENCY)
        .collect()
        .await;

    let mut vectors = Vec::with_capacity(sections.len());
    for batch in embedded {
        vectors.extend(batch?);
    }

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if vectors.len() != sections.len() {
        return Err(RagnarError::embedding(format!(
            "embedded {} vectors for {} sections",
            vectors.len(),
            sections.len()
        )));
    }

    let dimension = vectors.first().map_or(0, Vec::len);
    let records: Vec<DocumentRecord> = sections
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(index, (text, embedding))| DocumentRecord {
            text,
            source_label: format!("{source_label}#{index}"),
            section_index: index,
            embedding,
        })
        .collect();

    let metadata = StoreMetadata {
        embedding_model: embedder.model_name().to_string(),
        dimension,
        built_at: started_at,
        source: config.source.display().to_string(),
    };

    let sections_written = records.len();
    let store = VectorStore::new(metadata, records)?;
    store.save(&config.store_path)?;

    info!(
        "Wrote {} records to {}",
        sections_written,
        config.store_path.display()
    );

    Ok(IngestReport {
        sections: sections_written,
        dimension,
        embedding_model: embedder.model_name().to_string(),
        started_at,
        finished_at: Utc::now(),
    })
}

fn source_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn build_progress(enabled: bool, total: u64) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} embedding [{bar:40}] {pos}/{len} sections")
    {
        bar.set_style(style);
    }
    Some(bar)
}
