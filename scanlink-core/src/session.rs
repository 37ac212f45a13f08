//! Session lifecycle for the scan protocol
//!
//! ```text
//! Idle -> ReadingCommand -> Scanning -> Complete -> ServingImages -> Closed
//!                 |             |-> Empty ----------------------------^
//!                 |             '-> Faulted --------------------------^
//!                 '---------------------------------------------------^
//! ```
//!
//! Any live state may also jump to `Closed` when the connection breaks.

use tracing::debug;

use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Connection accepted, nothing read yet
    Idle,

    /// Waiting for the scan command
    ReadingCommand,

    /// Feeding pages
    Scanning,

    /// Scan ended with pages saved
    Complete,

    /// Scan ended without pages
    Empty,

    /// Scan aborted by a device fault
    Faulted,

    /// Answering page requests
    ServingImages,

    /// Terminal; all resources released
    Closed,
}

impl SessionState {
    /// Check if `next` may follow this state
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, ReadingCommand)
            | (ReadingCommand, Scanning)
            | (Scanning, Complete)
            | (Scanning, Empty)
            | (Scanning, Faulted)
            | (Complete, ServingImages) => true,
            _ => false,
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Per-connection session tracker
#[derive(Debug)]
pub struct Session {
    id: u64,
    state: SessionState,
}

impl Session {
    /// Create a session for a freshly accepted connection
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: SessionState::Idle,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSessionState`] if the lifecycle does not
    /// allow the move.
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidSessionState {
                from: self.state,
                to: next,
            });
        }

        debug!("Session {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Close the session; returns `false` if it was already closed
    pub fn close(&mut self) -> bool {
        if self.state.is_closed() {
            return false;
        }

        debug!("Session {}: {:?} -> Closed", self.id, self.state);
        self.state = SessionState::Closed;
        true
    }
}
