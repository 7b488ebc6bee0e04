//! Evaluator-driven answer pipeline.
//!
//! This module contains the core control loop:
//!
//! - [`state`] - Session state threaded through one invocation
//! - [`steps`] - Retrieve/generate/evaluate wrappers with failure absorption
//! - [`router`] - Post-evaluation routing and forced termination
//! - [`manager`] - The [`AnswerPipeline`] entry point
//!
//! # Architecture
//!
//! Retrieval runs once; generation and evaluation cycle until the evaluator
//! is satisfied or the budget is spent, at which point the run is finalized
//! with a clarification notice.
//!
//! ```text
//! ┌──────────┐     ┌──────────┐     ┌──────────┐
//! │ Retrieve │────>│ Generate │────>│ Evaluate │
//! └──────────┘     └──────────┘     └──────────┘
//!                        ^                │
//!                        │          ┌─────┴─────┐
//!                        └──────────│  Router   │──> Terminate
//!                         feedback  └───────────┘       ^
//!                                         │             │
//!                                         └──> ForceTerminate
//! ```

pub mod manager;
pub mod router;
pub mod state;
pub mod steps;

// Re-exports for convenience
pub use manager::{AnswerPipeline, AnswerPipelineConfig, INVALID_QUESTION_MESSAGE};
pub use router::{Route, CLARIFICATION_NOTICE};
pub use state::SessionState;
pub use steps::NO_DOCUMENTS_SENTINEL;
