//! Scanner capability consumed by the session controller

use async_trait::async_trait;
use scanlink_types::Page;

use crate::error::Result;
use crate::options::ScanOptions;

/// Result of one feed attempt
#[derive(Debug)]
pub enum FeedResult {
    /// A page was pulled through and captured
    Captured(Page),

    /// No more sheets in the feeder
    FeederEmpty,

    /// Mechanical or driver fault (jam, cover open, ...)
    Fault(String),
}

/// A document scanner with an automatic feeder
///
/// Drivers that block (SANE and friends) should run their calls on
/// `tokio::task::spawn_blocking`.
#[async_trait]
pub trait ScanDevice: Send {
    /// Apply the option set for the next scan
    async fn apply_options(&mut self, options: &ScanOptions) -> Result<()>;

    /// Feed and capture one page
    async fn attempt_feed(&mut self) -> FeedResult;

    /// Abort any pending operation and release the feeder
    fn cancel(&mut self);

    /// Human readable device name
    fn name(&self) -> String {
        "scanner".to_string()
    }
}

#[async_trait]
impl<D: ScanDevice + ?Sized> ScanDevice for Box<D> {
    async fn apply_options(&mut self, options: &ScanOptions) -> Result<()> {
        (**self).apply_options(options).await
    }

    async fn attempt_feed(&mut self) -> FeedResult {
        (**self).attempt_feed().await
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}
