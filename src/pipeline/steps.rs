//! Pipeline step wrappers around the three collaborators.
//!
//! Each step owns its failure semantics:
//!
//! - retrieval failure or zero results degrades to a sentinel context
//! - generation failure degrades to a diagnostic answer string
//! - evaluation failure is fatal, since the loop cannot route without a
//!   verdict
//!
//! Absorbed failures are logged, never re-raised, so a flaky collaborator
//! costs at most one wasted attempt rather than the whole session.

use super::state::SessionState;
use crate::error::{RagnarError, Result};
use crate::evaluate::AnswerEvaluator;
use crate::generate::AnswerGenerator;
use crate::prompt;
use crate::retrieval::{RetrievedDocument, Retriever};
use tracing::{debug, warn};

/// Context used when retrieval produces no evidence.
pub const NO_DOCUMENTS_SENTINEL: &str = "No relevant documents found.";

/// Assemble retrieved documents into a single context blob.
///
/// Each document becomes an indexed block prefixed with its source label;
/// blocks are joined by blank lines.
#[must_use]
pub fn assemble_context(documents: &[RetrievedDocument]) -> String {
    let blocks: Vec<String> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "[Document {} - Source: {}]\n{}",
                i + 1,
                doc.source_label,
                doc.content
            )
        })
        .collect();
    blocks.join("\n\n")
}

/// Execute the retrieval step.
///
/// Runs exactly once per invocation. Failures and empty results both leave
/// the state carrying the sentinel context and no documents.
pub async fn run_retrieve(retriever: &dyn Retriever, state: &mut SessionState) {
    match retriever.search(&state.question).await {
        Ok(documents) if !documents.is_empty() => {
            debug!("Retrieved {} documents", documents.len());
            let context = assemble_context(&documents);
            state.record_retrieval(documents, context);
        }
        Ok(_) => {
            debug!("No documents retrieved");
            state.record_retrieval(Vec::new(), NO_DOCUMENTS_SENTINEL.to_string());
        }
        Err(e) => {
            warn!("Error retrieving documents: {e}");
            state.record_retrieval(Vec::new(), NO_DOCUMENTS_SENTINEL.to_string());
        }
    }
}

/// Execute the generation step.
///
/// Renders feedback and history per the prompt rules and asks the
/// collaborator for an answer. A collaborator failure is absorbed into a
/// diagnostic answer string so the loop can keep going; the evaluator will
/// see the diagnostic text and judge it like any other candidate.
pub async fn run_generate(generator: &dyn AnswerGenerator, state: &mut SessionState) {
    let feedback = prompt::render_feedback(state.feedback.as_deref());
    let history = prompt::render_history(&state.chat_history);

    let outcome = generator
        .generate(&state.question, &state.context, &feedback, &history)
        .await;

    match outcome {
        Ok(answer) => state.record_generation(answer),
        Err(e) => {
            warn!("Error in generation: {e}");
            state.record_generation(format!(
                "I encountered an error while generating the answer: {e}"
            ));
        }
    }
}

/// Execute the evaluation step.
///
/// Applies the verdict to the state, incrementing the attempt counter.
///
/// # Errors
///
/// Returns [`RagnarError::Evaluation`] if the collaborator fails; the
/// attempt counter is left untouched in that case.
pub async fn run_evaluate(
    evaluator: &dyn AnswerEvaluator,
    state: &mut SessionState,
) -> Result<()> {
    let verdict = evaluator
        .evaluate(&state.question, &state.generation)
        .await
        .map_err(|e| RagnarError::evaluation(e.to_string()))?;

    debug!(
        satisfied = verdict.satisfied,
        attempt = state.attempts + 1,
        "Evaluation verdict"
    );
    state.record_evaluation(&verdict);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::{MockEvaluator, Verdict};
    use crate::generate::MockGenerator;
    use crate::prompt::{NO_FEEDBACK_PLACEHOLDER, NO_HISTORY_PLACEHOLDER};
    use crate::retrieval::MockRetriever;

    fn fresh() -> SessionState {
        SessionState::new("what is the fee?", Vec::new(), 3)
    }

    fn doc(content: &str, source: &str) -> RetrievedDocument {
        RetrievedDocument {
            content: content.to_string(),
            source_label: source.to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn test_assemble_context_indexes_from_one() {
        let context = assemble_context(&[doc("first text", "a.txt"), doc("second text", "b.txt")]);
        assert_eq!(
            context,
            "[Document 1 - Source: a.txt]\nfirst text\n\n[Document 2 - Source: b.txt]\nsecond text"
        );
    }

    #[tokio::test]
    async fn test_retrieve_populates_context_and_documents() {
        let retriever = MockRetriever::new().with_document("the fee is 10 EUR", "fees.txt");
        let mut state = fresh();

        run_retrieve(&retriever, &mut state).await;

        assert_eq!(state.documents.len(), 1);
        assert!(state.context.contains("[Document 1 - Source: fees.txt]"));
        assert!(state.context.contains("the fee is 10 EUR"));
        assert_eq!(retriever.recorded_queries(), vec!["what is the fee?"]);
    }

    #[tokio::test]
    async fn test_retrieve_empty_results_use_sentinel() {
        let retriever = MockRetriever::new();
        let mut state = fresh();

        run_retrieve(&retriever, &mut state).await;

        assert!(state.documents.is_empty());
        assert_eq!(state.context, NO_DOCUMENTS_SENTINEL);
    }

    #[tokio::test]
    async fn test_retrieve_failure_uses_sentinel() {
        let retriever = MockRetriever::new().with_error("store offline");
        let mut state = fresh();

        run_retrieve(&retriever, &mut state).await;

        assert!(state.documents.is_empty());
        assert_eq!(state.context, NO_DOCUMENTS_SENTINEL);
    }

    #[tokio::test]
    async fn test_generate_renders_placeholders_for_fresh_state() {
        let generator = MockGenerator::new().with_answer("the fee is 10 EUR");
        let mut state = fresh();
        state.context = NO_DOCUMENTS_SENTINEL.to_string();

        run_generate(&generator, &mut state).await;

        assert_eq!(state.generation, "the fee is 10 EUR");
        let recorded = generator.recorded();
        assert_eq!(recorded[0].feedback, NO_FEEDBACK_PLACEHOLDER);
        assert_eq!(recorded[0].history, NO_HISTORY_PLACEHOLDER);
        assert_eq!(recorded[0].context, NO_DOCUMENTS_SENTINEL);
    }

    #[tokio::test]
    async fn test_generate_passes_feedback_verbatim() {
        let generator = MockGenerator::new().with_answer("better answer");
        let mut state = fresh();
        state.feedback = Some("quote the exact amount".to_string());

        run_generate(&generator, &mut state).await;

        assert_eq!(generator.recorded()[0].feedback, "quote the exact amount");
    }

    #[tokio::test]
    async fn test_generate_failure_degrades_to_diagnostic() {
        let generator = MockGenerator::new().with_error("model unavailable");
        let mut state = fresh();

        run_generate(&generator, &mut state).await;

        assert!(state
            .generation
            .starts_with("I encountered an error while generating the answer:"));
        assert!(state.generation.contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_evaluate_applies_verdict_and_counts_attempt() {
        let evaluator = MockEvaluator::new().with_verdicts([Verdict::unsatisfied("expand")]);
        let mut state = fresh();
        state.generation = "short".to_string();

        run_evaluate(&evaluator, &mut state).await.unwrap();

        assert_eq!(state.attempts, 1);
        assert!(!state.answer_ready);
        assert_eq!(state.feedback.as_deref(), Some("expand"));
        assert_eq!(evaluator.recorded_answers(), vec!["short"]);
    }

    #[tokio::test]
    async fn test_evaluate_failure_is_fatal_and_leaves_attempts() {
        let evaluator = MockEvaluator::new().with_error("malformed verdict");
        let mut state = fresh();

        let err = run_evaluate(&evaluator, &mut state).await.unwrap_err();

        assert!(err.is_evaluation_failure());
        assert_eq!(state.attempts, 0);
        assert!(!state.answer_ready);
    }
}
