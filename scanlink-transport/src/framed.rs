//! Length-prefixed message stream over any byte stream

use async_trait::async_trait;
use bytes::Bytes;
use scanlink_core::frame::{self, FrameDecoder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::{error::*, Transport};

/// Bytes of each message shown in trace logs
const TRACE_PREVIEW: usize = 32;

/// Message stream built on a byte stream
///
/// Reads may return any number of bytes; messages are reassembled in a
/// [`FrameDecoder`] before being handed out.
pub struct FramedStream<S> {
    stream: Option<S>,
    decoder: FrameDecoder,
    peer: String,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream: Some(stream),
            decoder: FrameDecoder::new(),
            peer: peer.into(),
        }
    }

    /// Set the largest accepted payload
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.decoder = FrameDecoder::with_max_message_size(max);
        self
    }

    /// Write one message as a single contiguous buffer
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
        let encoded = frame::encode(payload)?;

        trace!(
            "-> {} ({} bytes): {}",
            self.peer,
            payload.len(),
            hex::encode(&payload[..payload.len().min(TRACE_PREVIEW)])
        );

        stream.write_all(&encoded).await?;
        stream.flush().await?;

        Ok(())
    }

    /// Read the next message
    ///
    /// Returns `Ok(None)` when the peer closes on a message boundary.
    ///
    /// # Errors
    ///
    /// [`Error::TruncatedMessage`] when the peer closes mid-message.
    pub async fn receive(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(payload) = self.decoder.decode()? {
                trace!(
                    "<- {} ({} bytes): {}",
                    self.peer,
                    payload.len(),
                    hex::encode(&payload[..payload.len().min(TRACE_PREVIEW)])
                );
                return Ok(Some(payload));
            }

            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;
            let n = stream.read_buf(self.decoder.buffer_mut()).await?;

            if n == 0 {
                return match self.decoder.partial() {
                    Some(partial) => {
                        debug!(
                            "{} closed mid-message ({} of {} bytes)",
                            self.peer, partial.received, partial.expected
                        );
                        Err(Error::TruncatedMessage {
                            expected: partial.expected,
                            received: partial.received,
                        })
                    }
                    None => {
                        debug!("{} closed the connection", self.peer);
                        Ok(None)
                    }
                };
            }
        }
    }

    /// Shut down the write half and drop the stream
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing connection to {}", self.peer);
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Get the underlying stream
    pub fn get_ref(&self) -> Option<&S> {
        self.stream.as_ref()
    }
}

#[async_trait]
impl<S> Transport for FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    async fn send_message(&mut self, payload: &[u8]) -> Result<()> {
        self.send(payload).await
    }

    async fn receive_message(&mut self) -> Result<Option<Bytes>> {
        self.receive().await
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.close().await
    }

    fn is_connected(&self) -> bool {
        self.is_open()
    }

    fn remote_addr(&self) -> String {
        self.peer.clone()
    }
}
