//! Type definitions for scanlink

pub mod error;
pub mod outcome;
pub mod page;
pub mod side;

pub use error::{Error, Result};
pub use outcome::{ScanOutcome, SessionResult};
pub use page::{Page, Preview, PREVIEW_HEIGHT, PREVIEW_LEN, PREVIEW_WIDTH};
pub use side::FeedSide;
