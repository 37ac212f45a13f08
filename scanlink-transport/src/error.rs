//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,
    
    #[error("Already connected")]
    AlreadyConnected,
    
    #[error("Connection timeout")]
    ConnectionTimeout,
    
    #[error("Read timeout")]
    ReadTimeout,
    
    #[error("Connection closed by remote")]
    ConnectionClosed,
    
    #[error("Connection closed mid-message: got {received} of {expected} bytes")]
    TruncatedMessage {
        expected: usize,
        received: usize,
    },
    
    #[error("Protocol error: {0}")]
    Protocol(#[from] scanlink_core::Error),
    
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    
    #[error("Address {addr} still in use after {attempts} attempts")]
    AddressInUse {
        addr: String,
        attempts: u32,
    },
}

impl Error {
    /// Check if the connection can no longer carry messages
    pub fn is_connection_broken(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectionClosed
                | Self::TruncatedMessage { .. }
                | Self::Io(_)
        ) || matches!(self, Self::Protocol(e) if e.is_fatal())
    }
}
