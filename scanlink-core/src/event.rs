//! Progress events streamed from the scanner host to the controller

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Scan progress event
///
/// # Wire Strings
///
/// | Event          | Wire text          |
/// |----------------|--------------------|
/// | `FeedStart`    | `feed start`       |
/// | `PageFed`      | `page fed`         |
/// | `Backside`     | `backside`         |
/// | `PageSaved(n)` | `PAGE <n>`         |
/// | `PagesEnd`     | `pages end`        |
/// | `Complete`     | `complete`         |
/// | `EmptyScan`    | `empty scan`       |
/// | `Error(msg)`   | `error:<msg>`      |
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProgressEvent {
    /// About to pull the next page
    FeedStart,

    /// A new sheet (front side) was captured
    PageFed,

    /// The reverse side of the previous sheet was captured
    Backside,

    /// Page number `n` (1-based) has been persisted
    PageSaved(usize),

    /// The feeder ran out of sheets
    PagesEnd,

    /// Scan finished with at least one page
    Complete,

    /// Scan finished without any page
    EmptyScan,

    /// Scan aborted by a device fault
    Error(String),
}

impl ProgressEvent {
    /// Check if this event ends the event stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::EmptyScan | Self::Error(_))
    }

    /// Get event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::FeedStart => "FEED_START",
            Self::PageFed => "PAGE_FED",
            Self::Backside => "BACKSIDE",
            Self::PageSaved(_) => "PAGE_SAVED",
            Self::PagesEnd => "PAGES_END",
            Self::Complete => "COMPLETE",
            Self::EmptyScan => "EMPTY_SCAN",
            Self::Error(_) => "ERROR",
        }
    }

    /// Decode an event from a message payload
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload).map_err(|_| Error::NotUtf8)?;
        text.parse()
    }

    /// Encode as a UTF-8 message payload
    pub fn to_payload(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeedStart => f.write_str("feed start"),
            Self::PageFed => f.write_str("page fed"),
            Self::Backside => f.write_str("backside"),
            Self::PageSaved(n) => write!(f, "PAGE {}", n),
            Self::PagesEnd => f.write_str("pages end"),
            Self::Complete => f.write_str("complete"),
            Self::EmptyScan => f.write_str("empty scan"),
            Self::Error(message) => write!(f, "error:{}", message),
        }
    }
}

impl FromStr for ProgressEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(message) = s.strip_prefix("error:") {
            return Ok(Self::Error(message.to_string()));
        }

        if let Some(number) = s.strip_prefix("PAGE ") {
            return number
                .parse()
                .map(Self::PageSaved)
                .map_err(|_| Error::UnknownEvent(s.to_string()));
        }

        match s {
            "feed start" => Ok(Self::FeedStart),
            "page fed" => Ok(Self::PageFed),
            "backside" => Ok(Self::Backside),
            "pages end" => Ok(Self::PagesEnd),
            "complete" => Ok(Self::Complete),
            "empty scan" => Ok(Self::EmptyScan),
            _ => Err(Error::UnknownEvent(s.to_string())),
        }
    }
}

/// Destination for progress events
///
/// The server side implements this over its connection; tests collect
/// events into a `Vec`.
#[async_trait]
pub trait EventSink: Send {
    type Error: Send;

    /// Deliver one event
    async fn emit(&mut self, event: &ProgressEvent) -> std::result::Result<(), Self::Error>;
}

#[async_trait]
impl EventSink for Vec<ProgressEvent> {
    type Error = Infallible;

    async fn emit(&mut self, event: &ProgressEvent) -> std::result::Result<(), Infallible> {
        self.push(event.clone());
        Ok(())
    }
}
