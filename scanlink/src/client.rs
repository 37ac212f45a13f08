//! Client session driver

use std::time::Duration;

use scanlink_core::{ProgressEvent, ScanCommand};
use scanlink_transport::{TcpTransport, Transport};
use scanlink_types::{Preview, ScanOutcome, SessionResult};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::progress::ScanProgress;

/// Drives one scan session from the controller side
///
/// # Examples
///
/// ```no_run
/// use scanlink::ScanClient;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> scanlink::Result<()> {
///     let mut client = ScanClient::connect("192.168.1.28", 5555).await?;
///
///     let options = json!({"mode": "Color", "resolution": 300});
///     let result = client.scan(options.as_object().unwrap().clone()).await?;
///     println!("Scan finished: {:?}", result);
///
///     if client.progress().is_complete() {
///         let preview = client.request_page(0).await?;
///         println!("Got preview: {}", preview.is_some());
///     }
///
///     client.finish().await
/// }
/// ```
pub struct ScanClient<T = TcpTransport> {
    transport: T,
    progress: ScanProgress,
    reply_timeout: Duration,
}

impl ScanClient<TcpTransport> {
    /// Connect to a scanner host
    pub async fn connect(addr: impl Into<String>, port: u16) -> Result<Self> {
        Self::connect_with(TcpTransport::new(addr, port)).await
    }

    /// Connect using a preconfigured transport
    pub async fn connect_with(mut transport: TcpTransport) -> Result<Self> {
        info!("Connecting to {}...", transport.remote_addr());
        transport.connect().await?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> ScanClient<T> {
    /// Drive a session over an already connected transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            progress: ScanProgress::new(),
            reply_timeout: Duration::from_secs(10),
        }
    }

    /// Set how long to wait for an image reply
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Shared progress handle
    pub fn progress(&self) -> ScanProgress {
        self.progress.clone()
    }

    /// Start a scan and follow it to its end
    pub async fn scan(&mut self, options: Map<String, Value>) -> Result<SessionResult> {
        self.scan_with(options, |_| {}).await
    }

    /// Start a scan, handing every event to `observer`
    ///
    /// A connection that closes or breaks before a terminal event yields
    /// [`SessionResult::BrokenConnection`].
    pub async fn scan_with<F>(&mut self, options: Map<String, Value>, mut observer: F) -> Result<SessionResult>
    where
        F: FnMut(&ProgressEvent) + Send,
    {
        let command = ScanCommand::scan(options).to_payload()?;

        match self.transport.send_message(&command).await {
            Ok(()) => {}
            Err(e) if e.is_connection_broken() => {
                warn!("Connection broken while sending scan command: {}", e);
                return Ok(SessionResult::BrokenConnection);
            }
            Err(e) => return Err(e.into()),
        }

        loop {
            let payload = match self.transport.receive_message().await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    warn!("Server closed the connection before the scan ended");
                    return Ok(SessionResult::BrokenConnection);
                }
                Err(e) if e.is_connection_broken() => {
                    warn!("Connection broken during scan: {}", e);
                    return Ok(SessionResult::BrokenConnection);
                }
                Err(e) => return Err(e.into()),
            };

            let event = ProgressEvent::from_payload(&payload)?;
            debug!("Event: {}", event);

            self.progress.apply(&event);
            observer(&event);

            let outcome = match event {
                ProgressEvent::Complete => ScanOutcome::Completed,
                ProgressEvent::EmptyScan => ScanOutcome::Empty,
                ProgressEvent::Error(message) => ScanOutcome::Faulted(message),
                _ => continue,
            };

            info!("Scan finished: {}", outcome);
            return Ok(SessionResult::Finished(outcome));
        }
    }

    /// Request the preview of page `index` (0-based)
    ///
    /// The first request for a page returns the whole page scaled down,
    /// later ones a random full-resolution detail. Indices beyond the pages
    /// saved are still sent but answered with `None` without waiting, since
    /// the server never replies to them.
    ///
    /// # Errors
    ///
    /// [`Error::NotComplete`] before a completed scan.
    pub async fn request_page(&mut self, index: usize) -> Result<Option<Preview>> {
        if !self.progress.is_complete() {
            return Err(Error::NotComplete);
        }

        self.transport.send_message(index.to_string().as_bytes()).await?;

        let pages = self.progress.pages_saved();
        if index >= pages {
            debug!("Page {} is out of range ({} pages), not waiting", index, pages);
            return Ok(None);
        }

        let reply = self
            .transport
            .receive_message_within(self.reply_timeout)
            .await?
            .ok_or(scanlink_transport::Error::ConnectionClosed)?;

        Ok(Some(Preview::from_bytes(&reply)?))
    }

    /// Close the session
    pub async fn finish(mut self) -> Result<()> {
        self.transport.shutdown().await?;
        Ok(())
    }
}
