//! Session state threaded through one pipeline invocation.
//!
//! A [`SessionState`] is created fresh for every question, populated field
//! by field as the pipeline executes, and discarded once the final answer
//! is returned. It is never shared between invocations and never persisted.

use crate::evaluate::Verdict;
use crate::retrieval::RetrievedDocument;
use serde::{Deserialize, Serialize};

/// Mutable state for one answer-pipeline invocation.
///
/// Invariants held across the run:
///
/// - `question` never changes after construction
/// - `context` and `documents` are set once by retrieval
/// - `attempts` increases by exactly 1 per evaluation, nowhere else
/// - once `answer_ready` is true no further generation or evaluation runs
///
/// # Example
///
/// ```
/// use ragnar::pipeline::state::SessionState;
///
/// let state = SessionState::new("What is rent?", Vec::new(), 5);
/// assert_eq!(state.attempts, 0);
/// assert!(!state.answer_ready);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// User question, trimmed, fixed for the lifetime of the invocation.
    pub question: String,
    /// Prior (user, assistant) exchanges supplied by the caller.
    pub chat_history: Vec<(String, String)>,
    /// Raw retrieval results.
    pub documents: Vec<RetrievedDocument>,
    /// Flattened context assembled from `documents`.
    pub context: String,
    /// Current candidate answer, overwritten on every generation.
    pub generation: String,
    /// Evaluator critique carried into the next generation, if any.
    pub feedback: Option<String>,
    /// Number of evaluations performed so far.
    pub attempts: u32,
    /// Evaluation budget for this invocation.
    pub max_attempts: u32,
    /// Terminal flag; set by a satisfied verdict or forced termination.
    pub answer_ready: bool,
}

impl SessionState {
    /// Create a fresh state for one question.
    ///
    /// `max_attempts` is clamped to at least 1 so the loop always runs.
    #[must_use]
    pub fn new(question: &str, chat_history: Vec<(String, String)>, max_attempts: u32) -> Self {
        Self {
            question: question.to_string(),
            chat_history,
            documents: Vec::new(),
            context: String::new(),
            generation: String::new(),
            feedback: None,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            answer_ready: false,
        }
    }

    /// Record the outcome of the single retrieval execution.
    pub fn record_retrieval(&mut self, documents: Vec<RetrievedDocument>, context: String) {
        self.documents = documents;
        self.context = context;
    }

    /// Record a new candidate answer.
    pub fn record_generation(&mut self, generation: String) {
        self.generation = generation;
    }

    /// Apply an evaluation verdict.
    ///
    /// Increments `attempts` by exactly 1 regardless of the verdict. A
    /// satisfied verdict marks the answer ready and clears feedback; an
    /// unsatisfied verdict stores the critique for the next generation.
    pub fn record_evaluation(&mut self, verdict: &Verdict) {
        self.attempts += 1;
        if verdict.satisfied {
            self.answer_ready = true;
            self.feedback = None;
        } else {
            self.answer_ready = false;
            self.feedback = Some(verdict.feedback.clone());
        }
    }

    /// Check if the evaluation budget is exhausted.
    #[must_use]
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
