//! Listening socket with bind retry

use std::io::ErrorKind;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::*;

/// How to retry a bind that fails with "address in use"
#[derive(Debug, Clone)]
pub struct BindOptions {
    /// Pause between attempts
    pub retry_interval: Duration,

    /// Give up after this many attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Bind `addr`, waiting for the port to be released if it is taken
///
/// A previous instance often leaves the port in use for a while after a
/// restart. Only "address in use" is retried; every other bind error is
/// returned at once.
///
/// # Errors
///
/// [`Error::AddressInUse`] when `max_attempts` runs out.
pub async fn bind_with_retry(addr: &str, options: &BindOptions) -> Result<TcpListener> {
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match TcpListener::bind(addr).await {
            Ok(listener) => {
                debug!("Bound {} after {} attempt(s)", addr, attempts);
                return Ok(listener);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                if options.max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(Error::AddressInUse {
                        addr: addr.to_string(),
                        attempts,
                    });
                }

                info!("Socket in use, trying again");
                tokio::time::sleep(options.retry_interval).await;
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }
}
