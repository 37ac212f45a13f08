//! Transport layer for the scan session protocol
//!
//! Provides framed message exchange over TCP.

pub mod error;
pub mod framed;
pub mod listener;
pub mod tcp;

pub use error::{Error, Result};
pub use framed::FramedStream;
pub use listener::{bind_with_retry, BindOptions};
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// Message-oriented transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message
    async fn send_message(&mut self, payload: &[u8]) -> Result<()>;
    
    /// Receive one message
    ///
    /// `Ok(None)` means the peer closed cleanly between messages.
    async fn receive_message(&mut self) -> Result<Option<Bytes>>;
    
    /// Receive one message, giving up after `timeout`
    async fn receive_message_within(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        tokio::time::timeout(timeout, self.receive_message())
            .await
            .map_err(|_| Error::ReadTimeout)?
    }
    
    /// Close the connection
    async fn shutdown(&mut self) -> Result<()>;
    
    /// Check if connected
    fn is_connected(&self) -> bool;
    
    /// Get remote address
    fn remote_addr(&self) -> String;
}
