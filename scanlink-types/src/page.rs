//! Captured pages and preview buffers

use std::fmt;

use image::RgbImage;

use crate::error::{Error, Result};

/// Preview width in pixels
pub const PREVIEW_WIDTH: u32 = 240;

/// Preview height in pixels
pub const PREVIEW_HEIGHT: u32 = 320;

/// Size of a raw RGB24 preview buffer (230,400 bytes)
pub const PREVIEW_LEN: usize = (PREVIEW_WIDTH * PREVIEW_HEIGHT * 3) as usize;

/// One captured page image
///
/// The pixel data never changes after capture.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    image: RgbImage,
}

impl Page {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl From<RgbImage> for Page {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// A 240x320 RGB image as delivered by the page responder
///
/// # Wire Layout
///
/// ```text
/// row 0: R G B R G B ... (240 pixels)
/// row 1: ...
/// ...
/// row 319
/// ```
///
/// No header and no compression: the buffer is always [`PREVIEW_LEN`] bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Preview {
    image: RgbImage,
}

impl Preview {
    /// Decode a raw preview buffer
    ///
    /// # Examples
    ///
    /// ```
    /// use scanlink_types::{Preview, PREVIEW_LEN};
    ///
    /// let preview = Preview::from_bytes(&vec![0u8; PREVIEW_LEN]).unwrap();
    /// assert_eq!(preview.image().width(), 240);
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != PREVIEW_LEN {
            return Err(Error::PreviewSize {
                expected: PREVIEW_LEN,
                actual: data.len(),
            });
        }

        let image = RgbImage::from_raw(PREVIEW_WIDTH, PREVIEW_HEIGHT, data.to_vec())
            .ok_or_else(|| Error::Validation("preview buffer does not fit 240x320".into()))?;

        Ok(Self { image })
    }

    /// Wrap an image that already has preview dimensions
    pub fn from_image(image: RgbImage) -> Result<Self> {
        if image.width() != PREVIEW_WIDTH || image.height() != PREVIEW_HEIGHT {
            return Err(Error::Validation(format!(
                "preview must be {}x{}, got {}x{}",
                PREVIEW_WIDTH,
                PREVIEW_HEIGHT,
                image.width(),
                image.height()
            )));
        }

        Ok(Self { image })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Raw RGB24 bytes, row-major
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.image.into_raw()
    }
}

impl fmt::Debug for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preview")
            .field("len", &self.as_bytes().len())
            .finish()
    }
}
