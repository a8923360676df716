//! The session store: an ordered, append-only transcript of turns.
//!
//! A session lives in memory only.  It starts empty, grows by `append`, and
//! shrinks only through an explicit `reset`.

use crate::observability::{SESSION_RESETS, SESSION_TURNS};
use crate::types::{Role, Turn};

/// Ordered transcript of one conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a turn to the end of the transcript.
    pub fn append(&mut self, turn: Turn) {
        SESSION_TURNS.click();
        self.turns.push(turn);
    }

    /// Clears all turns.  Calling it on an empty session is a no-op.
    pub fn reset(&mut self) {
        if !self.turns.is_empty() {
            SESSION_RESETS.click();
            tracing::debug!(turns = self.turns.len(), "session reset");
        }
        self.turns.clear();
    }

    /// Returns the most recent turn, or `None` for an empty session.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns the last turn if it is a user turn still awaiting an answer.
    pub fn last_unresolved_user(&self) -> Option<&Turn> {
        self.last().filter(|turn| turn.role == Role::User)
    }

    /// Number of turns in the transcript.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The turns in insertion order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Iterates the turns in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl<'a> IntoIterator for &'a Session {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
