//! # scanlink
//!
//! Network protocol between a document scanner host and a remote
//! controller.
//!
//! ## Features
//!
//! - Length-prefixed message framing over TCP
//! - Streaming scan progress with front/back side detection
//! - Page previews and random full-resolution crops after a scan
//! - Async/await API using Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use scanlink::ScanClient;
//! use serde_json::Map;
//!
//! #[tokio::main]
//! async fn main() -> scanlink::Result<()> {
//!     let mut client = ScanClient::connect("192.168.1.28", 5555).await?;
//!
//!     let result = client
//!         .scan_with(Map::new(), |event| println!("{}", event))
//!         .await?;
//!     println!("{:?}", result);
//!
//!     client.finish().await
//! }
//! ```

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod progress;
pub mod server;
pub mod simulator;

// Re-exports
pub use client::ScanClient;
pub use config::ServerConfig;
pub use controller::{ScanSession, SessionSettings, SessionSummary};
pub use error::{Error, Result};
pub use output::{DirectorySink, OutputSink};
pub use progress::{ProgressState, ScanProgress};
pub use server::ScanServer;
pub use simulator::{Sheet, SimulatedScanner};

// Re-export types
pub use scanlink_core::{ProgressEvent, ScanCommand, ScanDevice, ScanOptions, DEFAULT_PORT};
pub use scanlink_types::{FeedSide, Page, Preview, ScanOutcome, SessionResult};
