//! Scan server: accepts one controller at a time

use std::net::SocketAddr;

use scanlink_core::ScanDevice;
use scanlink_transport::{bind_with_retry, TcpTransport};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::controller::{ScanSession, SessionSettings, SessionSummary};
use crate::error::Result;
use crate::output::DirectorySink;

/// Serves scan sessions for a single device
///
/// The device is exclusive, so each connection is handled to completion
/// before the next one is accepted.
///
/// # Examples
///
/// ```no_run
/// use scanlink::{ScanServer, ServerConfig, SimulatedScanner};
///
/// #[tokio::main]
/// async fn main() -> scanlink::Result<()> {
///     let mut server = ScanServer::bind(ServerConfig::default(), SimulatedScanner::new()).await?;
///     server.run().await
/// }
/// ```
pub struct ScanServer<D> {
    listener: TcpListener,
    device: D,
    config: ServerConfig,
    settings: SessionSettings,
    next_id: u64,
}

impl<D: ScanDevice> ScanServer<D> {
    /// Bind the listening socket, waiting while the port is in use
    pub async fn bind(config: ServerConfig, device: D) -> Result<Self> {
        let settings = SessionSettings {
            backside_threshold: config.backside_threshold()?,
            idle_timeout: config.idle_timeout(),
            defaults: config.default_options()?,
        };

        let listener = bind_with_retry(&config.bind_addr(), &config.bind_options()).await?;
        info!(
            "Listening on {} with {}",
            listener.local_addr()?,
            device.name()
        );

        Ok(Self {
            listener,
            device,
            config,
            settings,
            next_id: 1,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Accept one connection and run its session to the end
    pub async fn serve_one(&mut self) -> Result<SessionSummary> {
        let (stream, peer) = self.listener.accept().await?;
        info!("Got connection from {}", peer);

        let mut transport =
            TcpTransport::from_stream(stream, peer)?.with_max_message_size(self.config.max_message_size);

        let id = self.next_id;
        self.next_id += 1;

        let output_dir = &self.config.output_dir;
        ScanSession::new(id, &mut transport, &mut self.device, &self.settings)
            .run(|id| DirectorySink::create(output_dir, id))
            .await
    }

    /// Serve sessions until the listener fails
    ///
    /// A failed session is logged and does not stop the server.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.serve_one().await {
                Ok(summary) => info!(
                    "Session {} done: {} pages, {} previews{}",
                    summary.id,
                    summary.pages,
                    summary.requests_served,
                    if summary.broken { ", connection broken" } else { "" }
                ),
                Err(e) => error!("Session failed: {}", e),
            }
        }
    }
}
