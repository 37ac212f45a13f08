//! TCP transport 

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use scanlink_core::frame::DEFAULT_MAX_MESSAGE_SIZE;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{error::*, FramedStream, Transport};

/// TCP transport carrying length-prefixed messages
pub struct TcpTransport {
    addr: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    framed: Option<FramedStream<TcpStream>>,
    connect_timeout: Duration,
    max_message_size: usize,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket_addr: None,
            framed: None,
            connect_timeout: Duration::from_secs(5),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
    
    /// Wrap a connection accepted by a listener
    pub fn from_stream(stream: TcpStream, peer: SocketAddr) -> Result<Self> {
        stream.set_nodelay(true)?;
        
        Ok(Self {
            addr: peer.ip().to_string(),
            port: peer.port(),
            socket_addr: Some(peer),
            framed: Some(FramedStream::new(stream, peer.to_string())),
            connect_timeout: Duration::from_secs(5),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        })
    }
    
    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
    
    /// Set the largest accepted payload
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        if let Some(framed) = self.framed.take() {
            self.framed = Some(framed.with_max_message_size(max));
        }
        self
    }
    
    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }
        
        let addr_str = format!("{}:{}", self.addr, self.port);
        
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .collect();
        
        let addr = addrs
            .first()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))?;
        
        self.socket_addr = Some(*addr);
        Ok(*addr)
    }
    
    /// Open the connection
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        
        let addr = self.resolve_addr().await?;
        
        debug!("Connecting to {}...", addr);
        
        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;
        
        // Progress events are tiny; don't let Nagle hold them back
        stream.set_nodelay(true)?;
        
        debug!("Connected to {}", addr);
        
        self.framed = Some(
            FramedStream::new(stream, addr.to_string()).with_max_message_size(self.max_message_size),
        );
        Ok(())
    }
    
    fn framed(&mut self) -> Result<&mut FramedStream<TcpStream>> {
        self.framed.as_mut().ok_or(Error::NotConnected)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send_message(&mut self, payload: &[u8]) -> Result<()> {
        self.framed()?.send(payload).await
    }
    
    async fn receive_message(&mut self) -> Result<Option<Bytes>> {
        self.framed()?.receive().await
    }
    
    async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut framed) = self.framed.take() {
            framed.close().await?;
        }
        Ok(())
    }
    
    fn is_connected(&self) -> bool {
        self.framed.as_ref().is_some_and(|framed| framed.is_open())
    }
    
    fn remote_addr(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("TCP transport to {} dropped while still connected", self.remote_addr());
        }
    }
}
