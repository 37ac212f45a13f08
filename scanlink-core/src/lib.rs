//! # scanlink-core
//!
//! Core protocol implementation for the scan session protocol.
//!
//! This crate provides the protocol primitives:
//! - Length-prefixed message framing
//! - Scan command and progress event vocabulary
//! - Typed scanner options
//! - Front/back side detection over the device feed capability
//! - Page store and image responder
//! - Session lifecycle

pub mod command;
pub mod device;
pub mod error;
pub mod event;
pub mod feed;
pub mod frame;
pub mod options;
pub mod session;
pub mod store;

pub use command::ScanCommand;
pub use device::{FeedResult, ScanDevice};
pub use error::{Error, Result};
pub use event::{EventSink, ProgressEvent};
pub use feed::{Feed, FeedError, FedPage};
pub use frame::FrameDecoder;
pub use options::ScanOptions;
pub use session::{Session, SessionState};
pub use store::PageStore;

/// Default service port
pub const DEFAULT_PORT: u16 = 5555;
