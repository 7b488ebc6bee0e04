//! Configuration management for Ragnar.
//!
//! Configuration is read from `ragnar.toml` in the project directory, with
//! a fallback to the user-level config directory. Every field has a
//! default, so a missing file yields a fully usable configuration.
//!
//! # Example ragnar.toml
//!
//! ```toml
//! [pipeline]
//! max_attempts = 5
//!
//! [retrieval]
//! store_path = ".ragnar/store.json"
//! top_k = 4
//!
//! [llm]
//! backend = "openai"
//! model = "gpt-4.1-mini"
//! ```

use crate::llm::LlmConfig;
use crate::retrieval::{OpenAiEmbeddings, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = "ragnar.toml";

/// Pipeline behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum generate/evaluate cycles per question.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Path to the ingested vector store, relative to the project dir.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Documents returned per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Embedding model used for queries and ingestion.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".ragnar/store.json")
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_embedding_model() -> String {
    OpenAiEmbeddings::DEFAULT_MODEL.to_string()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            top_k: default_top_k(),
            embedding_model: default_embedding_model(),
        }
    }
}

/// Top-level Ragnar configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagnarConfig {
    /// Pipeline behavior.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// LLM backend selection.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl RagnarConfig {
    /// Load configuration for a project directory.
    ///
    /// Looks for `ragnar.toml` in the project directory, then in the
    /// user-level config directory, and falls back to defaults when
    /// neither exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load(project_dir: &Path) -> anyhow::Result<Self> {
        let candidates = [
            Some(project_dir.join(CONFIG_FILE_NAME)),
            dirs::config_dir().map(|d| d.join("ragnar").join(CONFIG_FILE_NAME)),
        ];

        for path in candidates.into_iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                let config: Self = toml::from_str(&content)
                    .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
                return Ok(config);
            }
        }

        Ok(Self::default())
    }

    /// Resolve the store path against the project directory.
    #[must_use]
    pub fn store_path(&self, project_dir: &Path) -> PathBuf {
        if self.retrieval.store_path.is_absolute() {
            self.retrieval.store_path.clone()
        } else {
            project_dir.join(&self.retrieval.store_path)
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.pipeline.max_attempts == 0 {
            return Err("pipeline.max_attempts must be at least 1".to_string());
        }
        if self.retrieval.top_k == 0 {
            return Err("retrieval.top_k must be at least 1".to_string());
        }
        if self.retrieval.embedding_model.trim().is_empty() {
            return Err("retrieval.embedding_model must not be empty".to_string());
        }
        self.llm
            .validate()
            .map_err(|e| format!("llm.{e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RagnarConfig::default();
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retrieval.embedding_model, "text-embedding-3-large");
        assert_eq!(config.llm.backend, "openai");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = RagnarConfig::load(temp.path()).unwrap();
        assert_eq!(config.pipeline.max_attempts, 5);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[pipeline]\nmax_attempts = 2\n",
        )
        .unwrap();

        let config = RagnarConfig::load(temp.path()).unwrap();
        assert_eq!(config.pipeline.max_attempts, 2);
        assert_eq!(config.retrieval.top_k, 4);
    }

    #[test]
    fn test_load_full_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            r#"
[pipeline]
max_attempts = 3

[retrieval]
store_path = "data/store.json"
top_k = 2
embedding_model = "text-embedding-3-small"

[llm]
backend = "ollama"
model = "llama3"
"#,
        )
        .unwrap();

        let config = RagnarConfig::load(temp.path()).unwrap();
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.retrieval.store_path, PathBuf::from("data/store.json"));
        assert_eq!(config.llm.backend, "ollama");
        assert_eq!(config.llm.model, "llama3");
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE_NAME), "pipeline = nonsense[").unwrap();
        assert!(RagnarConfig::load(temp.path()).is_err());
    }

    #[test]
    fn test_store_path_resolution() {
        let config = RagnarConfig::default();
        let resolved = config.store_path(Path::new("/proj"));
        assert_eq!(resolved, PathBuf::from("/proj/.ragnar/store.json"));
    }

    #[test]
    fn test_validate_rejects_zero_max_attempts() {
        let config = RagnarConfig {
            pipeline: PipelineConfig { max_attempts: 0 },
            ..RagnarConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("max_attempts"));
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = RagnarConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_surfaces_llm_errors() {
        let mut config = RagnarConfig::default();
        config.llm.backend = "unknown".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.starts_with("llm."));
    }
}
