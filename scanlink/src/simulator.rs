//! Simulated scanner for development and tests
//!
//! Behaviour follows the selected color mode:
//!
//! - `Color`: a run of 2 to 10 pages. A fresh sheet takes the front delay,
//!   the reverse of the sheet just pulled takes the back delay.
//! - `Gray`: the tray is empty.
//! - anything else: the feeder jams on the first attempt.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scanlink_core::options::ColorMode;
use scanlink_core::{FeedResult, Result, ScanDevice, ScanOptions};
use scanlink_types::Page;
use tracing::debug;

/// Fault reported for unsupported modes
pub const JAM_MESSAGE: &str = "Document feeder jammed";

/// One simulated feed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sheet {
    Front,
    Back,
    Jam(String),
}

/// Development scanner with no hardware behind it
pub struct SimulatedScanner {
    script: Option<Vec<Sheet>>,
    queue: VecDeque<Sheet>,
    front_delay: Duration,
    back_delay: Duration,
    page_size: (u32, u32),
    rng: StdRng,
    captured: usize,
    cancelled: usize,
    last_options: Option<ScanOptions>,
}

impl SimulatedScanner {
    /// Scanner whose behaviour depends on the color mode
    pub fn new() -> Self {
        Self {
            script: None,
            queue: VecDeque::new(),
            front_delay: Duration::from_secs(3),
            back_delay: Duration::from_millis(500),
            page_size: (850, 1100),
            rng: StdRng::from_entropy(),
            captured: 0,
            cancelled: 0,
            last_options: None,
        }
    }

    /// Scanner replaying the same sheets on every scan, whatever the options
    pub fn scripted(sheets: impl IntoIterator<Item = Sheet>) -> Self {
        Self {
            script: Some(sheets.into_iter().collect()),
            ..Self::new()
        }
    }

    /// Set the time taken to pull a fresh sheet
    pub fn with_front_delay(mut self, delay: Duration) -> Self {
        self.front_delay = delay;
        self
    }

    /// Set the time taken to capture a reverse side
    pub fn with_back_delay(mut self, delay: Duration) -> Self {
        self.back_delay = delay;
        self
    }

    /// Set the size of generated pages
    pub fn with_page_size(mut self, width: u32, height: u32) -> Self {
        self.page_size = (width.max(1), height.max(1));
        self
    }

    /// Seed the random run length and page content
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Options of the most recent scan
    pub fn last_options(&self) -> Option<&ScanOptions> {
        self.last_options.as_ref()
    }

    /// Times a pending scan was cancelled
    pub fn cancel_count(&self) -> usize {
        self.cancelled
    }

    /// Build a duplex run: a back may only follow a front
    fn random_run(&mut self) -> Vec<Sheet> {
        let count = self.rng.gen_range(2..=10);
        let mut sheets = Vec::with_capacity(count);
        let mut next = Sheet::Front;

        for _ in 0..count {
            let after = if next == Sheet::Back || self.rng.gen_bool(0.5) {
                Sheet::Front
            } else {
                Sheet::Back
            };
            sheets.push(std::mem::replace(&mut next, after));
        }

        sheets
    }

    fn plan(&mut self, options: &ScanOptions) -> Vec<Sheet> {
        if let Some(script) = &self.script {
            return script.clone();
        }

        match options.mode {
            ColorMode::Color => self.random_run(),
            ColorMode::Gray => Vec::new(),
            _ => vec![Sheet::Jam(JAM_MESSAGE.to_string())],
        }
    }

    /// Synthetic page: a diagonal gradient with a tint per page
    fn render(&mut self) -> Page {
        let (width, height) = self.page_size;
        let tint: [u8; 3] = [
            self.rng.gen_range(0..64),
            self.rng.gen_range(0..64),
            self.rng.gen_range(0..64),
        ];

        Page::new(RgbImage::from_fn(width, height, |x, y| {
            let shade = ((x + y) % 192) as u8;
            Rgb([
                shade.saturating_add(tint[0]),
                shade.saturating_add(tint[1]),
                shade.saturating_add(tint[2]),
            ])
        }))
    }
}

impl Default for SimulatedScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanDevice for SimulatedScanner {
    async fn apply_options(&mut self, options: &ScanOptions) -> Result<()> {
        let plan = self.plan(options);
        debug!(
            "Simulating {} mode scan with {} feed attempts",
            options.mode,
            plan.len()
        );

        self.queue = plan.into();
        self.last_options = Some(options.clone());
        Ok(())
    }

    async fn attempt_feed(&mut self) -> FeedResult {
        match self.queue.pop_front() {
            Some(Sheet::Front) => {
                tokio::time::sleep(self.front_delay).await;
                self.captured += 1;
                FeedResult::Captured(self.render())
            }
            Some(Sheet::Back) => {
                tokio::time::sleep(self.back_delay).await;
                self.captured += 1;
                FeedResult::Captured(self.render())
            }
            Some(Sheet::Jam(reason)) => FeedResult::Fault(reason),
            None => FeedResult::FeederEmpty,
        }
    }

    fn cancel(&mut self) {
        if !self.queue.is_empty() {
            debug!("Dropping {} pending feed attempts", self.queue.len());
        }
        self.queue.clear();
        self.cancelled += 1;
    }

    fn name(&self) -> String {
        "simulated scanner".to_string()
    }
}
