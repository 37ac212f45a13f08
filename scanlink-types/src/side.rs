//! Sheet side classification

use std::fmt;

/// Which side of a sheet a captured page shows
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FeedSide {
    /// A fresh sheet pulled from the tray
    Front,
    
    /// Reverse side of the sheet fed just before
    Back,
}

impl FeedSide {
    /// Single-letter marker used by progress displays
    pub fn marker(self) -> char {
        match self {
            Self::Front => 'f',
            Self::Back => 'b',
        }
    }
    
    pub fn is_back(self) -> bool {
        matches!(self, Self::Back)
    }
}

impl fmt::Display for FeedSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Front => f.write_str("front"),
            Self::Back => f.write_str("back"),
        }
    }
}
