//! Length-prefixed message framing
//!
//! # Frame Structure
//!
//! ```text
//! ┌─────────────┬─────────────┐
//! │   Length    │   Payload   │
//! │   4 bytes   │   N bytes   │
//! │  (BE u32)   │   (bytes)   │
//! └─────────────┴─────────────┘
//! ```
//!
//! A zero length is a valid, empty message.

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{Error, Result};

/// Length prefix size in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default upper bound for a single payload (16 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Encode one message: length prefix followed by the payload
///
/// The result is a single contiguous buffer, so writing it with one
/// `write_all` never exposes a partial prefix on its own.
///
/// # Examples
///
/// ```
/// use scanlink_core::frame;
///
/// let encoded = frame::encode(b"complete").unwrap();
/// assert_eq!(&encoded[..4], &[0, 0, 0, 8]);
/// assert_eq!(&encoded[4..], b"complete");
/// ```
pub fn encode(payload: &[u8]) -> Result<BytesMut> {
    if payload.len() > u32::MAX as usize {
        return Err(Error::MessageTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);

    Ok(buf)
}

/// Bytes of an unfinished message left in the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialFrame {
    /// Total frame size (prefix included), or just the prefix size if the
    /// prefix itself is incomplete
    pub expected: usize,

    /// Bytes buffered so far
    pub received: usize,
}

/// Incremental decoder for length-prefixed messages
///
/// Bytes may be pushed in arbitrarily small chunks; complete payloads are
/// split off the front of the internal buffer as soon as they are whole.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_message_size: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default size limit
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a decoder with a custom size limit
    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            max_message_size,
        }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Direct access to the receive buffer, for `read_buf` style reads
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Take the next complete payload, if one is buffered
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`] when the prefix announces a
    /// payload above the configured limit.
    pub fn decode(&mut self) -> Result<Option<Bytes>> {
        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        // Peek the prefix without consuming it
        let length = BigEndian::read_u32(&self.buffer[..LENGTH_PREFIX_SIZE]) as usize;

        if length > self.max_message_size {
            return Err(Error::MessageTooLarge {
                size: length,
                max: self.max_message_size,
            });
        }

        let total = LENGTH_PREFIX_SIZE + length;
        if self.buffer.len() < total {
            self.buffer.reserve(total - self.buffer.len());
            return Ok(None);
        }

        self.buffer.advance(LENGTH_PREFIX_SIZE);
        let payload = self.buffer.split_to(length).freeze();

        trace!("Decoded message of {} bytes", length);

        Ok(Some(payload))
    }

    /// Describe the message in flight, if any bytes of one are buffered
    ///
    /// `None` means the decoder sits exactly on a message boundary.
    pub fn partial(&self) -> Option<PartialFrame> {
        if self.buffer.is_empty() {
            return None;
        }

        let expected = if self.buffer.len() >= LENGTH_PREFIX_SIZE {
            LENGTH_PREFIX_SIZE + BigEndian::read_u32(&self.buffer[..LENGTH_PREFIX_SIZE]) as usize
        } else {
            LENGTH_PREFIX_SIZE
        };

        Some(PartialFrame {
            expected,
            received: self.buffer.len(),
        })
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
