//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] scanlink_core::Error),
    
    #[error("Transport error: {0}")]
    Transport(#[from] scanlink_transport::Error),
    
    #[error("Type error: {0}")]
    Types(#[from] scanlink_types::Error),
    
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting {
        key: &'static str,
        reason: String,
    },
    
    #[error("Output already finalized")]
    OutputFinalized,
    
    #[error("Scan has not completed")]
    NotComplete,
    
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Check if the session connection is gone
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connection_broken(),
            Self::Core(e) => matches!(
                e,
                scanlink_core::Error::MessageTooLarge { .. } | scanlink_core::Error::Io(_)
            ),
            _ => false,
        }
    }
}
