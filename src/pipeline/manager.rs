//! Answer pipeline manager.
//!
//! [`AnswerPipeline`] owns the three collaborators and drives one question
//! through retrieve, generate, and evaluate until the router terminates the
//! run. Collaborators are injected at construction, so the pipeline carries
//! no process-wide state and distinct invocations can run concurrently.

use super::router::{self, Route};
use super::state::SessionState;
use super::steps;
use crate::error::Result;
use crate::evaluate::AnswerEvaluator;
use crate::generate::AnswerGenerator;
use crate::retrieval::Retriever;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Returned for an empty or whitespace-only question.
pub const INVALID_QUESTION_MESSAGE: &str = "Please provide a valid question.";

/// Configuration for the answer pipeline.
#[derive(Debug, Clone)]
pub struct AnswerPipelineConfig {
    /// Maximum generate/evaluate cycles per question, at least 1.
    pub max_attempts: u32,
}

impl AnswerPipelineConfig {
    /// Default evaluation budget.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Create a configuration with the given evaluation budget.
    ///
    /// The budget is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for AnswerPipelineConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Evaluator-driven answer pipeline.
///
/// Retrieval runs once per question; generation and evaluation cycle until
/// the evaluator is satisfied or the budget is spent. The worst case costs
/// `1 + 2 * max_attempts` collaborator calls.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use ragnar::pipeline::{AnswerPipeline, AnswerPipelineConfig};
///
/// let pipeline = AnswerPipeline::new(retriever, generator, evaluator)
///     .with_config(AnswerPipelineConfig::new(3));
///
/// let answer = pipeline.run("What is the fee?", &[]).await?;
/// ```
pub struct AnswerPipeline {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn AnswerGenerator>,
    evaluator: Arc<dyn AnswerEvaluator>,
    config: AnswerPipelineConfig,
}

impl AnswerPipeline {
    /// Create a pipeline with the default configuration.
    #[must_use]
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn AnswerGenerator>,
        evaluator: Arc<dyn AnswerEvaluator>,
    ) -> Self {
        Self {
            retriever,
            generator,
            evaluator,
            config: AnswerPipelineConfig::default(),
        }
    }

    /// Set the pipeline configuration.
    #[must_use]
    pub fn with_config(mut self, config: AnswerPipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the configured evaluation budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Answer one question.
    ///
    /// Builds a fresh [`SessionState`], drives the loop to termination, and
    /// returns the final generation. Retrieval and generation failures are
    /// absorbed along the way; the caller sees either a complete answer
    /// (possibly carrying the clarification notice) or an error.
    ///
    /// # Errors
    ///
    /// Returns an error only when evaluation fails, since the loop cannot
    /// route without a verdict.
    pub async fn run(&self, question: &str, chat_history: &[(String, String)]) -> Result<String> {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            debug!("Rejected empty question");
            return Ok(INVALID_QUESTION_MESSAGE.to_string());
        }

        let invocation_id = Uuid::new_v4();
        info!(%invocation_id, max_attempts = self.config.max_attempts, "Answering question");

        let mut state = SessionState::new(trimmed, chat_history.to_vec(), self.config.max_attempts);

        steps::run_retrieve(self.retriever.as_ref(), &mut state).await;

        loop {
            steps::run_generate(self.generator.as_ref(), &mut state).await;
            steps::run_evaluate(self.evaluator.as_ref(), &mut state).await?;

            match router::decide(&state) {
                Route::Terminate => break,
                Route::ForceTerminate => {
                    info!(%invocation_id, attempts = state.attempts, "Evaluation budget exhausted");
                    router::force_terminate(&mut state);
                    break;
                }
                Route::Loop => {
                    debug!(%invocation_id, attempts = state.attempts, "Regenerating with feedback");
                }
            }
        }

        info!(%invocation_id, attempts = state.attempts, "Answer ready");
        Ok(state.generation)
    }
}
