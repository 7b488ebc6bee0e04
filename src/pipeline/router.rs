//! Routing decisions after each evaluation.
//!
//! Evaluation is the only decision point in the pipeline. After every
//! verdict the loop asks [`decide`] where to go next; the answer is a pure
//! function of the session state, which keeps the control flow auditable
//! and directly testable.

use super::state::SessionState;

/// Next step after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Re-enter generation, carrying the evaluator's feedback.
    Loop,
    /// The answer is ready; return it.
    Terminate,
    /// The evaluation budget is spent; finalize with a clarification notice.
    ForceTerminate,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Loop => write!(f, "loop"),
            Route::Terminate => write!(f, "terminate"),
            Route::ForceTerminate => write!(f, "force-terminate"),
        }
    }
}

/// Notice appended to the final answer when the budget runs out.
pub const CLARIFICATION_NOTICE: &str = "\n\n---\n**Note:** I was unable to fully answer your \
question after multiple attempts. Could you please clarify or rephrase your question? More \
specific details would help me provide a better answer.";

/// Decide the next route from the post-evaluation state.
#[must_use]
pub fn decide(state: &SessionState) -> Route {
    if state.answer_ready {
        return Route::Terminate;
    }
    if state.attempts_exhausted() {
        return Route::ForceTerminate;
    }
    Route::Loop
}

/// Finalize an invocation whose evaluation budget is spent.
///
/// Appends the clarification notice to the current generation and marks the
/// answer ready, so the invocation always terminates with a non-empty
/// answer.
pub fn force_terminate(state: &mut SessionState) {
    state.generation.push_str(CLARIFICATION_NOTICE);
    state.answer_ready = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::Verdict;

    fn state_with(attempts: u32, max_attempts: u32, answer_ready: bool) -> SessionState {
        let mut state = SessionState::new("q", Vec::new(), max_attempts);
        state.attempts = attempts;
        state.answer_ready = answer_ready;
        state
    }

    #[test]
    fn test_decide_terminate_when_ready() {
        let state = state_with(1, 5, true);
        assert_eq!(decide(&state), Route::Terminate);
    }

    #[test]
    fn test_decide_ready_wins_over_exhaustion() {
        let state = state_with(5, 5, true);
        assert_eq!(decide(&state), Route::Terminate);
    }

    #[test]
    fn test_decide_force_terminate_on_exhaustion() {
        let state = state_with(5, 5, false);
        assert_eq!(decide(&state), Route::ForceTerminate);
    }

    #[test]
    fn test_decide_loop_with_budget_remaining() {
        let state = state_with(2, 5, false);
        assert_eq!(decide(&state), Route::Loop);
    }

    #[test]
    fn test_decide_single_attempt_budget() {
        let mut state = SessionState::new("q", Vec::new(), 1);
        state.record_evaluation(&Verdict::unsatisfied("no"));
        assert_eq!(decide(&state), Route::ForceTerminate);
    }

    #[test]
    fn test_force_terminate_appends_notice_and_marks_ready() {
        let mut state = state_with(5, 5, false);
        state.generation = "best effort answer".to_string();

        force_terminate(&mut state);

        assert!(state.answer_ready);
        assert!(state.generation.starts_with("best effort answer"));
        assert!(state.generation.ends_with(CLARIFICATION_NOTICE));
    }

    #[test]
    fn test_force_terminate_yields_nonempty_answer_even_without_generation() {
        let mut state = state_with(1, 1, false);
        force_terminate(&mut state);
        assert!(!state.generation.is_empty());
    }

    #[test]
    fn test_route_display() {
        assert_eq!(Route::Loop.to_string(), "loop");
        assert_eq!(Route::Terminate.to_string(), "terminate");
        assert_eq!(Route::ForceTerminate.to_string(), "force-terminate");
    }
}
