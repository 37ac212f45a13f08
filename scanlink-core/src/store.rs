//! Page store and image responder
//!
//! Requests are ASCII decimal page indices (0-based). The first request for
//! a page answers with the whole page resampled to 240x320; every later
//! request for the same page answers with a randomly placed 240x320 crop of
//! the source page, giving the viewer a full-resolution look at some region.
//! Both replies are raw RGB24, row-major, exactly 230,400 bytes.

use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::RgbImage;
use rand::Rng;
use scanlink_types::{Page, PREVIEW_HEIGHT, PREVIEW_WIDTH};
use tracing::{debug, warn};

#[derive(Debug)]
struct StoredPage {
    page: Page,
    previewed: bool,
}

/// Pages captured by one completed session
#[derive(Debug, Default)]
pub struct PageStore {
    pages: Vec<StoredPage>,
}

impl PageStore {
    /// Build the store from pages in capture order
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|page| StoredPage { page, previewed: false })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index).map(|stored| &stored.page)
    }

    /// Check if the full preview of a page has been sent
    pub fn is_previewed(&self, index: usize) -> Option<bool> {
        self.pages.get(index).map(|stored| stored.previewed)
    }

    /// Parse a request payload into a page index
    ///
    /// # Examples
    ///
    /// ```
    /// use scanlink_core::PageStore;
    ///
    /// assert_eq!(PageStore::parse_request(b"3"), Some(3));
    /// assert_eq!(PageStore::parse_request(b"-1"), None);
    /// assert_eq!(PageStore::parse_request(b"next"), None);
    /// ```
    pub fn parse_request(payload: &[u8]) -> Option<usize> {
        std::str::from_utf8(payload).ok()?.trim().parse().ok()
    }

    /// Build the reply for `index`, or `None` if it is out of range
    pub fn respond<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) -> Option<Bytes> {
        let stored = self.pages.get_mut(index)?;

        let image = if stored.previewed {
            debug!("Sending random crop of page {}", index);
            random_crop(&stored.page, rng)
        } else {
            debug!("Sending full preview of page {}", index);
            stored.previewed = true;
            full_preview(&stored.page)
        };

        Some(Bytes::from(image.into_raw()))
    }

    /// Answer a raw request payload
    ///
    /// Unparsable and out-of-range requests get no reply at all.
    pub fn handle_request<R: Rng + ?Sized>(&mut self, payload: &[u8], rng: &mut R) -> Option<Bytes> {
        let Some(index) = Self::parse_request(payload) else {
            warn!(
                "Ignoring malformed page request: {:?}",
                String::from_utf8_lossy(payload)
            );
            return None;
        };

        if index >= self.pages.len() {
            warn!(
                "Ignoring request for page {} (have {} pages)",
                index,
                self.pages.len()
            );
            return None;
        }

        self.respond(index, rng)
    }
}

/// Resample the whole page to the preview size
pub fn full_preview(page: &Page) -> RgbImage {
    imageops::resize(page.image(), PREVIEW_WIDTH, PREVIEW_HEIGHT, FilterType::Triangle)
}

/// Cut a preview-sized window at a random position of the original page
///
/// Pages smaller than the window in either dimension are stretched to
/// cover it first.
pub fn random_crop<R: Rng + ?Sized>(page: &Page, rng: &mut R) -> RgbImage {
    let (width, height) = (page.width(), page.height());

    let covered;
    let source = if width < PREVIEW_WIDTH || height < PREVIEW_HEIGHT {
        covered = imageops::resize(
            page.image(),
            width.max(PREVIEW_WIDTH),
            height.max(PREVIEW_HEIGHT),
            FilterType::Triangle,
        );
        &covered
    } else {
        page.image()
    };

    let x = rng.gen_range(0..=source.width() - PREVIEW_WIDTH);
    let y = rng.gen_range(0..=source.height() - PREVIEW_HEIGHT);

    imageops::crop_imm(source, x, y, PREVIEW_WIDTH, PREVIEW_HEIGHT).to_image()
}
