use std::net::SocketAddr;
use std::time::Duration;

use constellation_core::ProtectionLevel;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::binding::{Binding, ChannelFactoryHandle, DEFAULT_CLOSE_TIMEOUT, DEFAULT_OPEN_TIMEOUT};
use crate::channel::Channel;
use crate::endpoint::EndpointAddress;
use crate::error::{Error, Result};
use crate::params::{BindingParameterCollection, ChannelProtectionRequirements};
use crate::shape::ChannelShape;

pub const SCHEME: &str = "tcp";

/// Frames above this size are rejected
pub const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

/// Whole milliseconds, saturating at `u64::MAX`
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Settings of a [`TcpBinding`], as read from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TcpBindingConfig {
    pub open_timeout_ms: u64,
    pub close_timeout_ms: u64,
    pub send_timeout_ms: Option<u64>,
    pub receive_timeout_ms: Option<u64>,
    /// Whether sessioned shapes are offered
    pub sessions: bool,
}

impl Default for TcpBindingConfig {
    fn default() -> Self {
        Self {
            open_timeout_ms: millis(DEFAULT_OPEN_TIMEOUT),
            close_timeout_ms: millis(DEFAULT_CLOSE_TIMEOUT),
            send_timeout_ms: None,
            receive_timeout_ms: None,
            sessions: true,
        }
    }
}

/// Binding over plain TCP with length-prefix framing
///
/// Offers every shape (sessioned ones only when enabled) but no message
/// security, so contracts asking for signing or encryption are refused.
#[derive(Debug, Clone, Default)]
pub struct TcpBinding {
    config: TcpBindingConfig,
}

impl TcpBinding {
    pub fn new(config: TcpBindingConfig) -> Self {
        Self { config }
    }

    /// Create a builder for configuring the binding
    pub fn builder() -> TcpBindingBuilder {
        TcpBindingBuilder::new()
    }

    /// Read the binding settings from a configuration table
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        let config = toml::Value::Table(table.clone())
            .try_into::<TcpBindingConfig>()
            .map_err(|e| Error::Configuration(format!("tcp binding: {e}")))?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &TcpBindingConfig {
        &self.config
    }
}

impl Binding for TcpBinding {
    fn name(&self) -> &str {
        SCHEME
    }

    fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.config.open_timeout_ms)
    }

    fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.config.close_timeout_ms)
    }

    fn can_build(&self, shape: ChannelShape, params: &BindingParameterCollection) -> bool {
        if shape.is_sessioned() && !self.config.sessions {
            return false;
        }
        params
            .find::<ChannelProtectionRequirements>()
            .map_or(true, |r| r.required_level() == ProtectionLevel::None)
    }

    fn build(
        &self,
        shape: ChannelShape,
        params: &BindingParameterCollection,
    ) -> Result<Box<dyn ChannelFactoryHandle>> {
        if !self.can_build(shape, params) {
            return Err(Error::custom(format!(
                "tcp binding cannot build a {shape} channel factory"
            )));
        }
        Ok(Box::new(TcpChannelFactory {
            shape,
            config: self.config,
            state: FactoryState::Built,
        }))
    }
}

/// Builder for configuring a TCP binding
#[derive(Debug, Default)]
pub struct TcpBindingBuilder {
    config: TcpBindingConfig,
}

impl TcpBindingBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open timeout, also used to connect each channel
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout_ms = millis(timeout);
        self
    }

    /// Set the close timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.config.close_timeout_ms = millis(timeout);
        self
    }

    /// Set the send timeout of created channels
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout_ms = Some(millis(timeout));
        self
    }

    /// Set the receive timeout of created channels
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.config.receive_timeout_ms = Some(millis(timeout));
        self
    }

    /// Enable or disable sessioned shapes
    pub fn sessions(mut self, enabled: bool) -> Self {
        self.config.sessions = enabled;
        self
    }

    pub fn build(self) -> TcpBinding {
        TcpBinding::new(self.config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactoryState {
    Built,
    Opened,
    Closed,
}

/// Channel factory handle produced by [`TcpBinding`]
///
/// Opening is bookkeeping only; connections are made per channel.
#[derive(Debug)]
pub struct TcpChannelFactory {
    shape: ChannelShape,
    config: TcpBindingConfig,
    state: FactoryState,
}

#[async_trait::async_trait]
impl ChannelFactoryHandle for TcpChannelFactory {
    fn shape(&self) -> ChannelShape {
        self.shape
    }

    async fn open(&mut self, _timeout: Duration) -> Result<()> {
        if self.state == FactoryState::Closed {
            return Err(Error::custom("tcp channel factory is closed"));
        }
        self.state = FactoryState::Opened;
        Ok(())
    }

    async fn close(&mut self, _timeout: Duration) -> Result<()> {
        self.state = FactoryState::Closed;
        Ok(())
    }

    fn abort(&mut self) {
        self.state = FactoryState::Closed;
    }

    async fn create_channel(&mut self, address: &EndpointAddress) -> Result<Box<dyn Channel>> {
        if self.state != FactoryState::Opened {
            return Err(Error::custom("tcp channel factory is not open"));
        }
        if address.scheme() != SCHEME {
            return Err(Error::InvalidAddress(format!(
                "{address}: expected a {SCHEME}:// address"
            )));
        }

        let connect_timeout = Duration::from_millis(self.config.open_timeout_ms);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(address.authority()))
            .await
            .map_err(|_| Error::Timeout("Connect"))??;

        tracing::debug!(%address, shape = %self.shape, "Connected tcp channel");

        Ok(Box::new(TcpChannel {
            stream,
            shape: self.shape,
            send_timeout: self.config.send_timeout_ms.map(Duration::from_millis),
            receive_timeout: self.config.receive_timeout_ms.map(Duration::from_millis),
        }))
    }
}

/// TCP connection framing messages with a 4-byte big-endian length prefix
pub struct TcpChannel {
    stream: TcpStream,
    shape: ChannelShape,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl TcpChannel {
    /// Wrap an accepted stream
    pub fn from_stream(stream: TcpStream, shape: ChannelShape) -> Self {
        Self {
            stream,
            shape,
            send_timeout: None,
            receive_timeout: None,
        }
    }

    /// Get the remote address of this connection
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.stream.peer_addr().map_err(Into::into)
    }

    /// Get the local address of this connection
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr().map_err(Into::into)
    }

    async fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_FRAME_LEN {
            return Err(Error::InvalidFrame(format!(
                "Message too large: {} bytes",
                bytes.len()
            )));
        }
        self.stream.write_u32(bytes.len() as u32).await?;
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let len = self.stream.read_u32().await.map_err(eof_as_closed)? as usize;
        if len > MAX_FRAME_LEN {
            return Err(Error::InvalidFrame(format!(
                "Message too large: {len} bytes"
            )));
        }

        let mut buf = vec![0u8; len];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(eof_as_closed)?;
        Ok(buf)
    }
}

fn eof_as_closed(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        e.into()
    }
}

#[async_trait::async_trait]
impl Channel for TcpChannel {
    fn shape(&self) -> ChannelShape {
        self.shape
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match self.send_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.write_frame(bytes))
                .await
                .map_err(|_| Error::Timeout("Send"))?,
            None => self.write_frame(bytes).await,
        }
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        if !self.shape.can_receive() {
            return Err(Error::UnsupportedOperation {
                operation: "receive",
                shape: self.shape,
            });
        }
        match self.receive_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.read_frame())
                .await
                .map_err(|_| Error::Timeout("Receive"))?,
            None => self.read_frame().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Listener accepting framed TCP connections, for the service side
pub struct TcpChannelListener {
    listener: TcpListener,
}

impl TcpChannelListener {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept a connection as a duplex channel
    pub async fn accept(&self) -> Result<(TcpChannel, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await?;
        Ok((TcpChannel::from_stream(stream, ChannelShape::Duplex), addr))
    }

    /// Get the local address this listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }

    /// `tcp://` address of this listener with the given path
    pub fn endpoint_address(&self, path: &str) -> Result<EndpointAddress> {
        EndpointAddress::parse(format!("{SCHEME}://{}/{path}", self.local_addr()?))
    }
}
