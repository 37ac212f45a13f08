//! Session outcomes as seen by callers

use std::fmt;

/// Terminal result of one scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// At least one page was captured and saved
    Completed,
    
    /// The feeder was empty, nothing was saved
    Empty,
    
    /// The device reported a fault (jam, cover open, ...)
    Faulted(String),
}

impl ScanOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Empty => f.write_str("empty"),
            Self::Faulted(message) => write!(f, "faulted: {}", message),
        }
    }
}

/// What a client session ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    /// The stream closed or broke before a terminal event arrived
    BrokenConnection,
    
    /// A terminal event was observed
    Finished(ScanOutcome),
}

impl SessionResult {
    /// The scan outcome, if one was reported
    pub fn outcome(&self) -> Option<&ScanOutcome> {
        match self {
            Self::BrokenConnection => None,
            Self::Finished(outcome) => Some(outcome),
        }
    }
}
