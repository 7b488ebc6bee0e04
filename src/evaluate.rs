//! Answer evaluation collaborator.
//!
//! The pipeline consumes evaluation through the [`AnswerEvaluator`] trait:
//! question and candidate answer in, a typed [`Verdict`] out. The
//! production implementation coerces the model's free-form reply into the
//! verdict schema at this boundary; a reply that cannot be coerced is an
//! error, never a verdict, so a malfunctioning evaluator cannot masquerade
//! as a content judgment.

use crate::llm::LlmClient;
use crate::prompt;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Evaluation outcome for one candidate answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the answer resolves the question.
    pub satisfied: bool,
    /// Actionable critique; empty when satisfied.
    pub feedback: String,
}

impl Verdict {
    /// A satisfied verdict with no feedback.
    #[must_use]
    pub fn satisfied() -> Self {
        Self {
            satisfied: true,
            feedback: String::new(),
        }
    }

    /// An unsatisfied verdict carrying a critique.
    #[must_use]
    pub fn unsatisfied(feedback: impl Into<String>) -> Self {
        Self {
            satisfied: false,
            feedback: feedback.into(),
        }
    }
}

/// Abstraction for answer evaluation.
#[async_trait]
pub trait AnswerEvaluator: Send + Sync {
    /// Judge whether `answer` resolves `question`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing model call fails or its reply cannot
    /// be coerced into a [`Verdict`]. This error is fatal to the invocation.
    async fn evaluate(&self, question: &str, answer: &str) -> Result<Verdict>;
}

// =============================================================================
// Verdict Parsing
// =============================================================================

/// Failure to coerce a model reply into a [`Verdict`].
#[derive(Debug, Error)]
pub enum VerdictParseError {
    /// No JSON object found in the reply.
    #[error("no JSON object in evaluator reply: {snippet}")]
    NoJson { snippet: String },

    /// JSON found but it does not match the verdict schema.
    #[error("evaluator reply does not match verdict schema: {message}")]
    SchemaMismatch { message: String },
}

/// Wire form of the verdict, tolerant of a missing feedback field.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    satisfied: RawSatisfied,
    #[serde(default)]
    feedback: String,
}

/// Models sometimes emit "yes"/"no" strings where a boolean was requested.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSatisfied {
    Bool(bool),
    Text(String),
}

impl RawSatisfied {
    fn into_bool(self) -> std::result::Result<bool, VerdictParseError> {
        match self {
            Self::Bool(b) => Ok(b),
            Self::Text(s) => match s.trim().to_lowercase().as_str() {
                "yes" | "true" => Ok(true),
                "no" | "false" => Ok(false),
                other => Err(VerdictParseError::SchemaMismatch {
                    message: format!("satisfied is neither boolean nor yes/no: '{other}'"),
                }),
            },
        }
    }
}

/// Extract a [`Verdict`] from a model reply.
///
/// Accepts a bare JSON object or one wrapped in a Markdown code fence.
///
/// # Errors
///
/// Returns a [`VerdictParseError`] when the reply carries no parseable
/// verdict.
pub fn parse_verdict(reply: &str) -> std::result::Result<Verdict, VerdictParseError> {
    let json_text = extract_json_object(reply).ok_or_else(|| VerdictParseError::NoJson {
        snippet: snippet(reply),
    })?;

    let raw: RawVerdict =
        serde_json::from_str(json_text).map_err(|e| VerdictParseError::SchemaMismatch {
            message: e.to_string(),
        })?;

    let satisfied = raw.satisfied.into_bool()?;
    Ok(Verdict {
        satisfied,
        // The contract requires empty feedback alongside a satisfied verdict
        feedback: if satisfied { String::new() } else { raw.feedback },
    })
}

/// Find the first balanced JSON object in a reply.
fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in reply[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&reply[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn snippet(reply: &str) -> String {
    let trimmed = reply.trim();
    if trimmed.len() <= 80 {
        trimmed.to_string()
    } else {
        let mut end = 80;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

// =============================================================================
// LLM-backed Evaluator
// =============================================================================

/// LLM-backed answer evaluator.
pub struct LlmEvaluator {
    client: Arc<dyn LlmClient>,
}

impl LlmEvaluator {
    /// Create an evaluator over the given LLM client.
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerEvaluator for LlmEvaluator {
    async fn evaluate(&self, question: &str, answer: &str) -> Result<Verdict> {
        let rendered = prompt::render_evaluation_prompt(question, answer);
        let reply = self.client.run_prompt(&rendered).await?;
        debug!("Evaluator reply ({} chars)", reply.len());
        let verdict = parse_verdict(&reply)?;
        Ok(verdict)
    }
}

// =============================================================================
// Mock Evaluator
// =============================================================================

/// Mock answer evaluator for testing.
///
/// Returns scripted verdicts, then a fallback verdict once the script is
/// exhausted.
#[derive(Debug)]
pub struct MockEvaluator {
    /// Scripted verdicts, consumed front to back.
    script: Mutex<VecDeque<Verdict>>,
    /// Verdict returned once the script is exhausted.
    fallback: Verdict,
    /// Error to return on every call (if set).
    error: Option<String>,
    /// Count of evaluate calls.
    call_count: AtomicU32,
    /// Answers received, in call order.
    answers: Mutex<Vec<String>>,
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Verdict::satisfied(),
            error: None,
            call_count: AtomicU32::new(0),
            answers: Mutex::new(Vec::new()),
        }
    }
}

impl MockEvaluator {
    /// Create a mock that judges every answer satisfactory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the verdict returned once the script is exhausted.
    #[must_use]
    pub fn with_fallback(mut self, verdict: Verdict) -> Self {
        self.fallback = verdict;
        self
    }

    /// Create a mock that judges every answer unsatisfactory.
    #[must_use]
    pub fn always_unsatisfied(feedback: &str) -> Self {
        Self::new().with_fallback(Verdict::unsatisfied(feedback))
    }

    /// Script a sequence of verdicts, consumed one per call.
    #[must_use]
    pub fn with_verdicts<I>(self, verdicts: I) -> Self
    where
        I: IntoIterator<Item = Verdict>,
    {
        {
            let mut script = self
                .script
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            script.extend(verdicts);
        }
        self
    }

    /// Configure the mock to fail every call.
    #[must_use]
    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Get the number of times `evaluate` was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the answers received so far, in call order.
    pub fn recorded_answers(&self) -> Vec<String> {
        self.answers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AnswerEvaluator for MockEvaluator {
    async fn evaluate(&self, _question: &str, answer: &str) -> Result<Verdict> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(answer.to_string());

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

    #[test]
    fn test_parse_bare_json() {
        let verdict = parse_verdict(r#"{"satisfied": true, "feedback": ""}"#).unwrap();
        assert!(verdict.satisfied);
        assert!(verdict.feedback.is_empty());
    }

    #[test]
    fn test_parse_fenced_json() {
        let reply = "```json\n{\"satisfied\": false, \"feedback\": \"cite the source\"}\n```";
        let verdict = parse_verdict(reply).unwrap();
        assert!(!verdict.satisfied);
        assert_eq!(verdict.feedback, "cite the source");
    }

    #[test]
    fn test_parse_json_with_surrounding_prose() {
        let reply = "Here is my judgment: {\"satisfied\": false, \"feedback\": \"too vague\"} Hope that helps.";
        let verdict = parse_verdict(reply).unwrap();
        assert_eq!(verdict.feedback, "too vague");
    }

    #[test]
    fn test_parse_yes_no_strings() {
        let yes = parse_verdict(r#"{"satisfied": "yes", "feedback": ""}"#).unwrap();
        assert!(yes.satisfied);
        let no = parse_verdict(r#"{"satisfied": "no", "feedback": "missing detail"}"#).unwrap();
        assert!(!no.satisfied);
        assert_eq!(no.feedback, "missing detail");
    }

    #[test]
    fn test_parse_satisfied_clears_feedback() {
        let verdict =
            parse_verdict(r#"{"satisfied": true, "feedback": "stray critique"}"#).unwrap();
        assert!(verdict.satisfied);
        assert!(verdict.feedback.is_empty());
    }

    #[test]
    fn test_parse_missing_feedback_defaults_empty() {
        let verdict = parse_verdict(r#"{"satisfied": false}"#).unwrap();
        assert!(!verdict.satisfied);
        assert!(verdict.feedback.is_empty());
    }

    #[test]
    fn test_parse_no_json_is_error() {
        let err = parse_verdict("the answer looks fine to me").unwrap_err();
        assert!(matches!(err, VerdictParseError::NoJson { .. }));
    }

    #[test]
    fn test_parse_wrong_schema_is_error() {
        let err = parse_verdict(r#"{"score": 0.9}"#).unwrap_err();
        assert!(matches!(err, VerdictParseError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_parse_unrecognized_satisfied_string_is_error() {
        let err = parse_verdict(r#"{"satisfied": "maybe", "feedback": ""}"#).unwrap_err();
        assert!(matches!(err, VerdictParseError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_extract_json_handles_nested_braces() {
        let reply = r#"{"satisfied": false, "feedback": "use {placeholders} sparingly"}"#;
        let verdict = parse_verdict(reply).unwrap();
        assert!(verdict.feedback.contains("{placeholders}"));
    }

    #[tokio::test]
    async fn test_llm_evaluator_parses_reply() {
        let client = Arc::new(
            MockLlmClient::new().with_response(r#"{"satisfied": false, "feedback": "expand"}"#),
        );
        let evaluator = LlmEvaluator::new(client);
        let verdict = evaluator.evaluate("q", "a").await.unwrap();
        assert_eq!(verdict, Verdict::unsatisfied("expand"));
    }

    #[tokio::test]
    async fn test_llm_evaluator_malformed_reply_is_error() {
        let client = Arc::new(MockLlmClient::new().with_response("looks good!"));
        let evaluator = LlmEvaluator::new(client);
        assert!(evaluator.evaluate("q", "a").await.is_err());
    }

    #[tokio::test]
    async fn test_llm_evaluator_transport_failure_is_error() {
        let client = Arc::new(MockLlmClient::new().with_error("connection reset"));
        let evaluator = LlmEvaluator::new(client);
        assert!(evaluator.evaluate("q", "a").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_evaluator_script_then_fallback() {
        let evaluator = MockEvaluator::new()
            .with_verdicts([Verdict::unsatisfied("first pass"), Verdict::satisfied()]);

        let first = evaluator.evaluate("q", "a1").await.unwrap();
        assert!(!first.satisfied);
        let second = evaluator.evaluate("q", "a2").await.unwrap();
        assert!(second.satisfied);
        // Script exhausted, fallback is satisfied
        let third = evaluator.evaluate("q", "a3").await.unwrap();
        assert!(third.satisfied);
        assert_eq!(evaluator.recorded_answers(), vec!["a1", "a2", "a3"]);
    }
}
