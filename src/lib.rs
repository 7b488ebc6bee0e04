//! Ragnar - Retrieval-augmented question answering with evaluator-driven
//! answer refinement.
//!
//! Ragnar answers questions over an ingested text corpus. Each question is
//! run through a bounded refinement loop: supporting documents are
//! retrieved once, a candidate answer is generated, and an evaluator model
//! judges the candidate. Unsatisfactory answers are regenerated with the
//! evaluator's critique until the evaluator is satisfied or the attempt
//! budget runs out, at which point the best effort is returned with a
//! clarification request.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`pipeline`] - The core retrieve/generate/evaluate loop
//! - [`retrieval`] - Retriever trait, vector store, and embeddings
//! - [`generate`] - Answer generation collaborator
//! - [`evaluate`] - Answer evaluation collaborator and verdict parsing
//! - [`llm`] - LLM backend abstraction (OpenAI, Ollama)
//! - [`prompt`] - Prompt templates and rendering rules
//! - [`ingest`] - Offline corpus ingestion
//! - [`session`] - Rolling chat history for the interactive surface
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Custom error types and handling
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragnar::pipeline::{AnswerPipeline, AnswerPipelineConfig};
//! use ragnar::generate::LlmGenerator;
//! use ragnar::evaluate::LlmEvaluator;
//! use ragnar::llm::{create_llm_client, LlmConfig};
//! use ragnar::retrieval::{OpenAiEmbeddings, StoreRetriever};
//!
//! let client = create_llm_client(&LlmConfig::default())?;
//! let retriever = StoreRetriever::open(
//!     ".ragnar/store.json".as_ref(),
//!     Arc::new(OpenAiEmbeddings::new()),
//! )?;
//!
//! let pipeline = AnswerPipeline::new(
//!     Arc::new(retriever),
//!     Arc::new(LlmGenerator::new(Arc::clone(&client))),
//!     Arc::new(LlmEvaluator::new(client)),
//! )
//! .with_config(AnswerPipelineConfig::new(5));
//!
//! let answer = pipeline.run("What services are offered?", &[]).await?;
//! ```

pub mod config;
pub mod error;
pub mod evaluate;
pub mod generate;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod session;

// Re-export commonly used types
pub use error::{RagnarError, Result};

// Re-export pipeline types
pub use pipeline::{
    AnswerPipeline, AnswerPipelineConfig, Route, SessionState, CLARIFICATION_NOTICE,
    INVALID_QUESTION_MESSAGE, NO_DOCUMENTS_SENTINEL,
};

// Re-export collaborator contracts
pub use evaluate::{AnswerEvaluator, LlmEvaluator, MockEvaluator, Verdict};
pub use generate::{AnswerGenerator, LlmGenerator, MockGenerator};
pub use retrieval::{MockRetriever, RetrievedDocument, Retriever, StoreRetriever};

// Re-export LLM types
pub use llm::{create_llm_client, LlmClient, LlmConfig, MockLlmClient};

// Re-export config types
pub use config::RagnarConfig;

// Re-export session types
pub use session::ChatSession;
