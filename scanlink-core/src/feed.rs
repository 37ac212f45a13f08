//! Page feed with front/back side detection
//!
//! The feeder gives no signal about which side of a sheet it just
//! captured. Duplex hardware captures the reverse of an already loaded
//! sheet much faster than it pulls a fresh sheet from the tray, so a
//! capture that finishes below the threshold is taken as a backside.

use std::fmt;
use std::time::Duration;

use scanlink_types::{FeedSide, Page};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::device::{FeedResult, ScanDevice};
use crate::event::{EventSink, ProgressEvent};

/// Captures faster than this are backsides
pub const DEFAULT_BACKSIDE_THRESHOLD: Duration = Duration::from_secs(2);

/// Classify a capture by how long the feed took
///
/// The boundary belongs to the front side.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use scanlink_core::feed::{classify, DEFAULT_BACKSIDE_THRESHOLD};
/// use scanlink_types::FeedSide;
///
/// assert_eq!(classify(Duration::from_millis(1900), DEFAULT_BACKSIDE_THRESHOLD), FeedSide::Back);
/// assert_eq!(classify(Duration::from_secs(2), DEFAULT_BACKSIDE_THRESHOLD), FeedSide::Front);
/// ```
pub fn classify(elapsed: Duration, threshold: Duration) -> FeedSide {
    if elapsed < threshold {
        FeedSide::Back
    } else {
        FeedSide::Front
    }
}

/// One captured page with its detected side
#[derive(Debug)]
pub struct FedPage {
    pub page: Page,
    pub side: FeedSide,
    /// Wall-clock time the feed took
    pub elapsed: Duration,
}

/// Why a feed sequence stopped early
#[derive(Debug)]
pub enum FeedError<E> {
    /// The device reported a fault; no further events were emitted
    Device(String),

    /// Delivering a progress event failed
    Sink(E),
}

impl<E: fmt::Display> fmt::Display for FeedError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(reason) => write!(f, "device fault: {}", reason),
            Self::Sink(err) => write!(f, "event delivery failed: {}", err),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for FeedError<E> {}

/// Lazy, finite, non-restartable sequence of captured pages
///
/// Each call to [`Feed::next`] performs one feed attempt. The device is
/// cancelled when the feed is dropped, on every exit path.
pub struct Feed<'d, D: ScanDevice + ?Sized> {
    device: &'d mut D,
    threshold: Duration,
    finished: bool,
    pages: usize,
}

impl<'d, D: ScanDevice + ?Sized> Feed<'d, D> {
    /// Start a feed sequence on `device`
    pub fn new(device: &'d mut D) -> Self {
        Self {
            device,
            threshold: DEFAULT_BACKSIDE_THRESHOLD,
            finished: false,
            pages: 0,
        }
    }

    /// Set the backside threshold
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Check if the sequence has ended (cleanly or not)
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Pages produced so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Feed the next page
    ///
    /// Emits `FeedStart`, then `PageFed` or `Backside` for a capture, or
    /// `PagesEnd` when the feeder is empty. Returns `Ok(None)` once the
    /// feeder is empty and on every call after the sequence ended.
    ///
    /// # Errors
    ///
    /// [`FeedError::Device`] when the device faults; the caller reports it.
    /// [`FeedError::Sink`] when an event cannot be delivered.
    pub async fn next<S>(&mut self, events: &mut S) -> Result<Option<FedPage>, FeedError<S::Error>>
    where
        S: EventSink + ?Sized,
    {
        if self.finished {
            return Ok(None);
        }

        let result = self.step(events).await;
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    async fn step<S>(&mut self, events: &mut S) -> Result<Option<FedPage>, FeedError<S::Error>>
    where
        S: EventSink + ?Sized,
    {
        events
            .emit(&ProgressEvent::FeedStart)
            .await
            .map_err(FeedError::Sink)?;

        let started = Instant::now();
        let result = self.device.attempt_feed().await;
        let elapsed = started.elapsed();

        match result {
            FeedResult::FeederEmpty => {
                debug!("Feeder empty after {} pages", self.pages);

                events
                    .emit(&ProgressEvent::PagesEnd)
                    .await
                    .map_err(FeedError::Sink)?;

                Ok(None)
            }
            FeedResult::Fault(reason) => {
                warn!("Device fault after {} pages: {}", self.pages, reason);
                Err(FeedError::Device(reason))
            }
            FeedResult::Captured(page) => {
                let side = classify(elapsed, self.threshold);
                self.pages += 1;

                trace!(
                    "Captured {:?} in {:?}, classified as {}",
                    page, elapsed, side
                );

                let event = match side {
                    FeedSide::Front => ProgressEvent::PageFed,
                    FeedSide::Back => ProgressEvent::Backside,
                };
                events.emit(&event).await.map_err(FeedError::Sink)?;

                Ok(Some(FedPage { page, side, elapsed }))
            }
        }
    }
}

impl<D: ScanDevice + ?Sized> Drop for Feed<'_, D> {
    fn drop(&mut self) {
        self.device.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::options::ScanOptions;
    use async_trait::async_trait;
    use image::RgbImage;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Step of a scripted device
    #[derive(Debug, Clone)]
    enum Step {
        Page(Duration),
        Fault(&'static str),
    }

    /// Device replaying a fixed script, then reporting an empty feeder
    struct ScriptedDevice {
        pub steps: VecDeque<Step>,
        pub attempts: usize,
        pub cancelled: usize,
    }

    impl ScriptedDevice {
        pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: steps.into_iter().collect(),
                attempts: 0,
                cancelled: 0,
            }
        }
    }

    #[async_trait]
    impl ScanDevice for ScriptedDevice {
        async fn apply_options(&mut self, _options: &ScanOptions) -> Result<()> {
            Ok(())
        }

        async fn attempt_feed(&mut self) -> FeedResult {
            self.attempts += 1;
            match self.steps.pop_front() {
                Some(Step::Page(delay)) => {
                    tokio::time::sleep(delay).await;
                    FeedResult::Captured(Page::new(RgbImage::new(8, 8)))
                }
                Some(Step::Fault(reason)) => FeedResult::Fault(reason.to_string()),
                None => FeedResult::FeederEmpty,
            }
        }

        fn cancel(&mut self) {
            self.cancelled += 1;
        }
    }

    const FRONT: Step = Step::Page(Duration::from_secs(3));
    const BACK: Step = Step::Page(Duration::from_millis(500));

    #[tokio::test(start_paused = true)]
    async fn test_front_back_front_sequence() {
        let mut device = ScriptedDevice::new([FRONT, BACK, FRONT]);
        let mut events = Vec::new();
        let mut sides = Vec::new();

        {
            let mut feed = Feed::new(&mut device);
            while let Some(fed) = feed.next(&mut events).await.unwrap() {
                sides.push(fed.side);
            }
            assert!(feed.is_finished());
            assert_eq!(feed.pages(), 3);
        }

        assert_eq!(sides, vec![FeedSide::Front, FeedSide::Back, FeedSide::Front]);
        assert_eq!(
            events,
            vec![
                ProgressEvent::FeedStart,
                ProgressEvent::PageFed,
                ProgressEvent::FeedStart,
                ProgressEvent::Backside,
                ProgressEvent::FeedStart,
                ProgressEvent::PageFed,
                ProgressEvent::FeedStart,
                ProgressEvent::PagesEnd,
            ]
        );
        assert_eq!(device.cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_boundary() {
        let mut device = ScriptedDevice::new([
            Step::Page(Duration::from_millis(1900)),
            Step::Page(Duration::from_secs(2)),
        ]);
        let mut events = Vec::new();
        let mut feed = Feed::new(&mut device);

        let first = feed.next(&mut events).await.unwrap().unwrap();
        let second = feed.next(&mut events).await.unwrap().unwrap();

        assert_eq!(first.side, FeedSide::Back);
        assert_eq!(second.side, FeedSide::Front);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_threshold() {
        let mut device = ScriptedDevice::new([Step::Page(Duration::from_millis(500))]);
        let mut events = Vec::new();
        let mut feed = Feed::new(&mut device).with_threshold(Duration::from_millis(100));

        let fed = feed.next(&mut events).await.unwrap().unwrap();
        assert_eq!(fed.side, FeedSide::Front);
    }

    #[tokio::test]
    async fn test_empty_feeder() {
        let mut device = ScriptedDevice::new([]);
        let mut events = Vec::new();
        let mut feed = Feed::new(&mut device);

        assert!(feed.next(&mut events).await.unwrap().is_none());
        assert_eq!(events, vec![ProgressEvent::FeedStart, ProgressEvent::PagesEnd]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_stops_sequence() {
        let mut device = ScriptedDevice::new([FRONT, Step::Fault("Document feeder jammed"), FRONT]);
        let mut events = Vec::new();

        {
            let mut feed = Feed::new(&mut device);
            assert!(feed.next(&mut events).await.unwrap().is_some());

            let err = feed.next(&mut events).await.unwrap_err();
            assert!(matches!(err, FeedError::Device(ref reason) if reason == "Document feeder jammed"));

            // Ended: the device is not touched again
            assert!(feed.next(&mut events).await.unwrap().is_none());
        }

        assert_eq!(
            events,
            vec![
                ProgressEvent::FeedStart,
                ProgressEvent::PageFed,
                ProgressEvent::FeedStart,
            ]
        );
        assert_eq!(device.attempts, 2);
        assert_eq!(device.cancelled, 1);
    }

    #[tokio::test]
    async fn test_not_restartable_after_end() {
        let mut device = ScriptedDevice::new([]);
        let mut events = Vec::new();
        let mut feed = Feed::new(&mut device);

        assert!(feed.next(&mut events).await.unwrap().is_none());
        assert!(feed.next(&mut events).await.unwrap().is_none());
        assert_eq!(events.len(), 2);
    }
}
