//! Rolling conversation history for the chat surface.
//!
//! The pipeline itself is stateless across questions; the caller is
//! responsible for folding each completed exchange into the history it
//! passes to the next invocation. [`ChatSession`] does that folding with a
//! bounded window so long conversations do not grow without limit.

use serde::{Deserialize, Serialize};

/// Default number of (user, assistant) exchanges kept.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Bounded conversation history.
///
/// # Example
///
/// ```
/// use ragnar::session::ChatSession;
///
/// let mut session = ChatSession::new();
/// session.record("hi", "hello");
/// assert_eq!(session.history().len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    exchanges: Vec<(String, String)>,
    window: usize,
}

impl ChatSession {
    /// Create an empty session with the default window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            exchanges: Vec::new(),
            window: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Set the number of exchanges kept.
    ///
    /// The window is clamped to at least 1.
    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self.trim();
        self
    }

    /// Fold a completed exchange into the history.
    pub fn record(&mut self, question: &str, answer: &str) {
        self.exchanges
            .push((question.to_string(), answer.to_string()));
        self.trim();
    }

    /// History to pass to the next pipeline invocation.
    #[must_use]
    pub fn history(&self) -> &[(String, String)] {
        &self.exchanges
    }

    /// Number of exchanges currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Check if no exchanges have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Drop all recorded exchanges.
    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    fn trim(&mut self) {
        if self.exchanges.len() > self.window {
            let excess = self.exchanges.len() - self.window;
            self.exchanges.drain(..excess);
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
