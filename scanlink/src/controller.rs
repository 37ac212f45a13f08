//! Server-side session controller
//!
//! Runs one connection through the session lifecycle: read the scan
//! command, drive the feeder while streaming progress events, then serve
//! page previews until the client leaves.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scanlink_core::feed::DEFAULT_BACKSIDE_THRESHOLD;
use scanlink_core::{
    EventSink, Feed, FeedError, PageStore, ProgressEvent, ScanCommand, ScanDevice, ScanOptions,
    Session, SessionState,
};
use scanlink_transport::Transport;
use scanlink_types::{Page, ScanOutcome};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::output::OutputSink;

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub backside_threshold: Duration,
    /// Close a connection that sends no command or page request for this long
    pub idle_timeout: Option<Duration>,
    /// Options the client's overrides are layered on
    pub defaults: ScanOptions,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            backside_threshold: DEFAULT_BACKSIDE_THRESHOLD,
            idle_timeout: Some(Duration::from_secs(300)),
            defaults: ScanOptions::default(),
        }
    }
}

/// What happened during one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub id: u64,
    /// `None` if no scan ran or the connection broke mid-scan
    pub outcome: Option<ScanOutcome>,
    pub pages: usize,
    pub requests_served: usize,
    /// The connection broke before the session ended normally
    pub broken: bool,
}

/// Progress events written straight to the transport
struct EventStream<'t, T: ?Sized>(&'t mut T);

#[async_trait]
impl<'t, T: Transport + ?Sized> EventSink for EventStream<'t, T> {
    type Error = scanlink_transport::Error;

    async fn emit(&mut self, event: &ProgressEvent) -> std::result::Result<(), Self::Error> {
        debug!("Event: {}", event);
        self.0.send_message(&event.to_payload()).await
    }
}

/// How the feeding phase ended
enum ScanEnd {
    Clean,
    Fault(String),
}

/// One session on one connection
pub struct ScanSession<'a, T: ?Sized, D: ?Sized> {
    session: Session,
    transport: &'a mut T,
    device: &'a mut D,
    settings: &'a SessionSettings,
    summary: SessionSummary,
}

impl<'a, T, D> ScanSession<'a, T, D>
where
    T: Transport + ?Sized,
    D: ScanDevice + ?Sized,
{
    pub fn new(id: u64, transport: &'a mut T, device: &'a mut D, settings: &'a SessionSettings) -> Self {
        Self {
            session: Session::new(id),
            transport,
            device,
            settings,
            summary: SessionSummary {
                id,
                ..SessionSummary::default()
            },
        }
    }

    /// Run the session to its end and close the connection
    ///
    /// `open_output` is called once the scan starts. Output left
    /// uncommitted when the session ends is discarded.
    ///
    /// # Errors
    ///
    /// Connection faults end the session but are not errors; they are
    /// reported through [`SessionSummary::broken`].
    pub async fn run<O, F>(mut self, open_output: F) -> Result<SessionSummary>
    where
        O: OutputSink,
        F: FnOnce(u64) -> Result<O>,
    {
        let id = self.session.id();
        info!("Session {} started with {}", id, self.transport.remote_addr());

        self.session.transition(SessionState::ReadingCommand)?;
        let result = self.drive(open_output).await;

        self.session.close();
        let _ = self.transport.shutdown().await;

        match result {
            Ok(()) => {
                info!("Session {} closed", id);
                Ok(self.summary)
            }
            Err(e) if e.is_connection_broken() => {
                warn!("Session {} connection broken: {}", id, e);
                self.summary.broken = true;
                Ok(self.summary)
            }
            Err(e) => Err(e),
        }
    }

    async fn drive<O, F>(&mut self, open_output: F) -> Result<()>
    where
        O: OutputSink,
        F: FnOnce(u64) -> Result<O>,
    {
        let Some(options) = self.read_command().await? else {
            return Ok(());
        };

        self.session.transition(SessionState::Scanning)?;
        info!(
            "Session {}: scanning ({}, {}, {} dpi)",
            self.session.id(),
            options.source.name(),
            options.mode,
            options.resolution
        );

        if let Err(e) = self.device.apply_options(&options).await {
            return self.fault(e.to_string()).await;
        }

        let mut output = match open_output(self.session.id()) {
            Ok(output) => output,
            Err(e) => return self.fault(format!("cannot store pages: {}", e)).await,
        };

        let mut pages = Vec::new();
        match self.scan(&mut output, &mut pages).await? {
            ScanEnd::Fault(reason) => {
                if let Err(e) = output.discard() {
                    warn!("Failed to discard partial output: {}", e);
                }
                self.fault(reason).await
            }
            ScanEnd::Clean if pages.is_empty() || output.bytes_written() == 0 => {
                self.session.transition(SessionState::Empty)?;
                output.discard()?;

                self.emit(&ProgressEvent::EmptyScan).await?;
                self.summary.outcome = Some(ScanOutcome::Empty);
                info!("Session {}: no pages", self.session.id());
                Ok(())
            }
            ScanEnd::Clean => {
                self.session.transition(SessionState::Complete)?;
                output.commit()?;

                self.emit(&ProgressEvent::Complete).await?;
                self.summary.outcome = Some(ScanOutcome::Completed);
                info!("Session {}: {} pages saved", self.session.id(), pages.len());

                self.serve(PageStore::new(pages)).await
            }
        }
    }

    /// Read and validate the opening command
    ///
    /// Anything but a well-formed scan request closes the session without
    /// a word to the client. So does silence for longer than the idle
    /// timeout.
    async fn read_command(&mut self) -> Result<Option<ScanOptions>> {
        let id = self.session.id();

        let received = match self.settings.idle_timeout {
            Some(timeout) => match self.transport.receive_message_within(timeout).await {
                Err(scanlink_transport::Error::ReadTimeout) => {
                    info!("Session {}: no command within {:?}, closing", id, timeout);
                    return Ok(None);
                }
                other => other?,
            },
            None => self.transport.receive_message().await?,
        };

        let Some(payload) = received else {
            debug!("Session {}: closed before sending a command", id);
            return Ok(None);
        };

        let command = match ScanCommand::from_payload(&payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("Session {}: malformed command: {}", id, e);
                return Ok(None);
            }
        };

        match command.resolve(&self.settings.defaults) {
            Ok(Some(options)) => Ok(Some(options)),
            Ok(None) => {
                info!("Session {}: no scan requested", id);
                Ok(None)
            }
            Err(e) => {
                warn!("Session {}: rejected options: {}", id, e);
                Ok(None)
            }
        }
    }

    /// Feed pages until the tray is empty or the device faults
    async fn scan<O: OutputSink>(&mut self, output: &mut O, pages: &mut Vec<Page>) -> Result<ScanEnd> {
        let mut events = EventStream(&mut *self.transport);
        let mut feed = Feed::new(&mut *self.device).with_threshold(self.settings.backside_threshold);

        loop {
            match feed.next(&mut events).await {
                Ok(Some(fed)) => {
                    if let Err(e) = output.append(&fed.page) {
                        return Ok(ScanEnd::Fault(format!("failed to save page: {}", e)));
                    }
                    pages.push(fed.page);
                    self.summary.pages = pages.len();

                    events.emit(&ProgressEvent::PageSaved(pages.len())).await?;
                }
                Ok(None) => return Ok(ScanEnd::Clean),
                Err(FeedError::Device(reason)) => return Ok(ScanEnd::Fault(reason)),
                Err(FeedError::Sink(e)) => return Err(e.into()),
            }
        }
    }

    /// Report a device fault and end the scan
    async fn fault(&mut self, reason: String) -> Result<()> {
        warn!("Session {}: scan failed: {}", self.session.id(), reason);

        self.session.transition(SessionState::Faulted)?;
        self.summary.outcome = Some(ScanOutcome::Faulted(reason.clone()));
        self.emit(&ProgressEvent::Error(reason)).await
    }

    /// Answer page requests until the client leaves or goes quiet
    async fn serve(&mut self, mut store: PageStore) -> Result<()> {
        self.session.transition(SessionState::ServingImages)?;
        let mut rng = StdRng::from_entropy();

        loop {
            let request = match self.settings.idle_timeout {
                Some(timeout) => match self.transport.receive_message_within(timeout).await {
                    Err(scanlink_transport::Error::ReadTimeout) => {
                        info!("Session {}: idle for {:?}, closing", self.session.id(), timeout);
                        return Ok(());
                    }
                    other => other?,
                },
                None => self.transport.receive_message().await?,
            };

            let Some(payload) = request else {
                debug!("Session {}: client done after {} requests", self.session.id(), self.summary.requests_served);
                return Ok(());
            };

            if let Some(reply) = store.handle_request(&payload, &mut rng) {
                self.transport.send_message(&reply).await?;
                self.summary.requests_served += 1;
            }
        }
    }

    async fn emit(&mut self, event: &ProgressEvent) -> Result<()> {
        EventStream(&mut *self.transport).emit(event).await?;
        Ok(())
    }
}
