//! Prompt templates and rendering for answer generation and evaluation.
//!
//! Templates use `{{MARKER}}` injection points filled by [`fill`]. The
//! rendering rules for conversation history and evaluator feedback live here
//! so that every caller assembles generation input the same way:
//!
//! - history is truncated to the last [`HISTORY_WINDOW`] exchanges and
//!   rendered as alternating `Human:` / `Assistant:` lines
//! - an empty history renders as [`NO_HISTORY_PLACEHOLDER`]
//! - absent feedback renders as [`NO_FEEDBACK_PLACEHOLDER`]
//!
//! # Example
//!
//! ```
//! use ragnar::prompt::{render_generation_prompt, NO_FEEDBACK_PLACEHOLDER};
//!
//! let prompt = render_generation_prompt("What is rent?", "No data.", None, &[]);
//! assert!(prompt.contains("What is rent?"));
//! assert!(prompt.contains(NO_FEEDBACK_PLACEHOLDER));
//! ```

/// Number of most recent (user, assistant) exchanges kept as context.
pub const HISTORY_WINDOW: usize = 10;

/// Rendered in place of feedback before the first evaluation.
pub const NO_FEEDBACK_PLACEHOLDER: &str = "No feedback yet.";

/// Rendered in place of history for a fresh conversation.
pub const NO_HISTORY_PLACEHOLDER: &str = "No previous conversation.";

/// Template for the answer generation prompt.
///
/// The model is constrained to the supplied context, told to answer in the
/// language of the question, and told to apply evaluator feedback when
/// present.
pub const GENERATION_TEMPLATE: &str = r#"# Role
You are an AI assistant focused on Question-Answering (QA) tasks within a Retrieval-Augmented Generation (RAG) system.
Your primary goal is to provide precise answers based on the given context and chat history.

# Instructions
Provide a concise, logical answer by organizing the selected content into coherent paragraphs with a natural flow.
Avoid merely listing information. Include key numerical values, technical terms, jargon, and names.
DO NOT use any outside knowledge or information that is not in the given material.
If you get feedback from the evaluator, use it to improve your answer.

# Constraints
- Review the provided context thoroughly and extract key details related to the question.
- Craft a precise answer based on the relevant information.
- Keep the answer concise but logical/natural/in-depth.
- Consider the chat history for context continuity.
- Conduct conversation in the same language as **The Most Recent User Question**.
    - If the most recent user question is not in the same language as the context, try your best use **The Same Language of The User Question**.

# Chat History
<chat_history>
{{CHAT_HISTORY}}
</chat_history>

# Question
<question>
{{QUESTION}}
</question>

# Context
<retrieved context>
{{CONTEXT}}
</retrieved context>

# Feedback
<feedback from evaluator>
{{FEEDBACK}}
</feedback from evaluator>

# Answer"#;

/// Template for the answer evaluation prompt.
///
/// The model must reply with a single JSON object so the verdict can be
/// parsed into a typed value at the collaborator boundary.
pub const EVALUATION_TEMPLATE: &str = r#"# Role
You are an evaluator assessing whether an assistant's answer resolves the user's question.

# Instructions
- Judge whether the answer actually resolves the question, not whether it is merely on topic.
- Make sure that the assistant's answer is in the same language as **The User Question**.
- Reply with a single JSON object and nothing else:
    {"satisfied": true|false, "feedback": "..."}
- If satisfied is false, feedback must contain concise, actionable suggestions to improve the answer.
- If satisfied is true, feedback must be an empty string.

# Question
<question>
{{QUESTION}}
</question>

# Answer
<answer>
{{ANSWER}}
</answer>"#;

/// Fill `{{MARKER}}` injection points in a template.
///
/// Unknown markers in the template are left in place; substitution values
/// are inserted verbatim.
///
/// # Example
///
/// ```
/// use ragnar::prompt::fill;
///
/// let out = fill("Hello {{NAME}}", &[("{{NAME}}", "world")]);
/// assert_eq!(out, "Hello world");
/// ```
#[must_use]
pub fn fill(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut output = template.to_string();
    for (marker, value) in substitutions {
        output = output.replace(marker, value);
    }
    output
}

/// Render conversation history for prompt injection.
///
/// Keeps the last [`HISTORY_WINDOW`] exchanges, each rendered as a
/// `Human:` line followed by an `Assistant:` line.
#[must_use]
pub fn render_history(history: &[(String, String)]) -> String {
    if history.is_empty() {
        return NO_HISTORY_PLACEHOLDER.to_string();
    }

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut lines = Vec::with_capacity((history.len() - start) * 2);
    for (human, assistant) in &history[start..] {
        lines.push(format!("Human: {human}"));
        lines.push(format!("Assistant: {assistant}"));
    }
    lines.join("\n")
}

/// Render evaluator feedback for prompt injection.
///
/// Present feedback is passed through verbatim; absent feedback renders as
/// the fixed placeholder.
#[must_use]
pub fn render_feedback(feedback: Option<&str>) -> String {
    match feedback {
        Some(text) => text.to_string(),
        None => NO_FEEDBACK_PLACEHOLDER.to_string(),
    }
}

/// Render the full generation prompt.
#[must_use]
pub fn render_generation_prompt(
    question: &str,
    context: &str,
    feedback: Option<&str>,
    history: &[(String, String)],
) -> String {
    fill(
        GENERATION_TEMPLATE,
        &[
            ("{{CHAT_HISTORY}}", &render_history(history)),
            ("{{QUESTION}}", question),
            ("{{CONTEXT}}", context),
            ("{{FEEDBACK}}", &render_feedback(feedback)),
        ],
    )
}

/// Render the full evaluation prompt.
#[must_use]
pub fn render_evaluation_prompt(question: &str, answer: &str) -> String {
    fill(
        EVALUATION_TEMPLATE,
        &[("{{QUESTION}}", question), ("{{ANSWER}}", answer)],
    )
}
