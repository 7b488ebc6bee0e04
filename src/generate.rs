//! Answer generation collaborator.
//!
//! The pipeline consumes generation through the [`AnswerGenerator`] trait.
//! Callers pass the question, the assembled context, and the already
//! rendered feedback and history strings (placeholder rules live in
//! [`crate::prompt`]); the collaborator returns an answer string.
//!
//! [`LlmGenerator`] is the production implementation, backed by any
//! [`LlmClient`]. [`MockGenerator`] records its inputs for tests.

use crate::llm::LlmClient;
use crate::prompt;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Abstraction for answer generation.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Produce an answer to `question` grounded in `context`.
    ///
    /// `feedback` and `history` arrive pre-rendered: the literal evaluator
    /// critique or its placeholder, and the formatted conversation or its
    /// placeholder.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing model call fails. Callers absorb
    /// this error rather than propagating it.
    async fn generate(
        &self,
        question: &str,
        context: &str,
        feedback: &str,
        history: &str,
    ) -> Result<String>;
}

/// LLM-backed answer generator.
///
/// Fills the generation template and runs it through the configured model.
pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
}

impl LlmGenerator {
    /// Create a generator over the given LLM client.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerGenerator for LlmGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        feedback: &str,
        history: &str,
    ) -> Result<String> {
        let rendered = prompt::fill(
            prompt::GENERATION_TEMPLATE,
            &[
                ("{{CHAT_HISTORY}}", history),
                ("{{QUESTION}}", question),
                ("{{CONTEXT}}", context),
                ("{{FEEDBACK}}", feedback),
            ],
        );

        let answer = self.client.run_prompt(&rendered).await?;
        Ok(answer.trim().to_string())
    }
}

/// Inputs received by one [`MockGenerator`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedGeneration {
    pub question: String,
    pub context: String,
    pub feedback: String,
    pub history: String,
}

/// Mock answer generator for testing.
///
/// Returns scripted answers and records every input set so tests can assert
/// what reached the collaborator on each attempt.
#[derive(Debug, Default)]
pub struct MockGenerator {
    /// Scripted answers, consumed front to back.
    script: Mutex<VecDeque<String>>,
    /// Answer returned once the script is exhausted.
    fallback: String,
    /// Error to return on every call (if set).
    error: Option<String>,
    /// Count of generate calls.
    call_count: AtomicU32,
    /// Inputs received, in call order.
    recorded: Mutex<Vec<RecordedGeneration>>,
}

impl MockGenerator {
    /// Create a mock returning an empty answer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the answer returned on every call.
    #[must_use]
    pub fn with_answer(mut self, answer: &str) -> Self {
        self.fallback = answer.to_string();
        self
    }

    /// Script a sequence of answers, consumed one per call.
    #[must_use]
    pub fn with_answers<I, S>(self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut script = self
                .script
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            script.extend(answers.into_iter().map(Into::into));
        }
        self
    }

    /// Configure the mock to fail every call.
    #[must_use]
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Get the number of times `generate` was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the inputs received so far, in call order.
    pub fn recorded(&self) -> Vec<RecordedGeneration> {
        self.recorded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AnswerGenerator for MockGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &str,
        feedback: &str,
        history: &str,
    ) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.recorded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(RecordedGeneration {
                question: question.to_string(),
                context: context.to_string(),
                feedback: feedback.to_string(),
                history: history.to_string(),
            });

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_llm_generator_fills_template() {
        let client = Arc::new(MockLlmClient::new().with_response("an answer"));
        let generator = LlmGenerator::new(Arc::clone(&client) as Arc<dyn LlmClient>);

        let answer = generator
            .generate("the question", "the context", "the feedback", "the history")
            .await
            .unwrap();

        assert_eq!(answer, "an answer");
        let prompts = client.recorded_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("the question"));
        assert!(prompts[0].contains("the context"));
        assert!(prompts[0].contains("the feedback"));
        assert!(prompts[0].contains("the history"));
        assert!(!prompts[0].contains("{{"));
    }

    #[tokio::test]
    async fn test_llm_generator_trims_answer() {
        let client = Arc::new(MockLlmClient::new().with_response("  padded  \n"));
        let generator = LlmGenerator::new(client);
        let answer = generator.generate("q", "c", "f", "h").await.unwrap();
        assert_eq!(answer, "padded");
    }

    #[tokio::test]
    async fn test_llm_generator_propagates_client_error() {
        let client = Arc::new(MockLlmClient::new().with_error("model down"));
        let generator = LlmGenerator::new(client);
        assert!(generator.generate("q", "c", "f", "h").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_generator_scripted_answers() {
        let generator = MockGenerator::new()
            .with_answers(["first", "second"])
            .with_answer("later");

        assert_eq!(generator.generate("q", "c", "f", "h").await.unwrap(), "first");
        assert_eq!(generator.generate("q", "c", "f", "h").await.unwrap(), "second");
        assert_eq!(generator.generate("q", "c", "f", "h").await.unwrap(), "later");
        assert_eq!(generator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_generator_records_inputs() {
        let generator = MockGenerator::new().with_answer("a");
        generator
            .generate("q1", "ctx", "No feedback yet.", "hist")
            .await
            .unwrap();

        let recorded = generator.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].question, "q1");
        assert_eq!(recorded[0].feedback, "No feedback yet.");
    }
}
