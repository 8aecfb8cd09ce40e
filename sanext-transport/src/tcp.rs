//! TCP transport implementation

use crate::error::{SanextError, SanextResult};
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Wrapper for TcpStream that implements Debug
struct DebugTcpStream(TcpStream);

impl fmt::Debug for DebugTcpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpStream")
            .field("peer", &self.0.peer_addr().ok())
            .finish()
    }
}

impl Deref for DebugTcpStream {
    type Target = TcpStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugTcpStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// TCP transport layer settings
#[derive(Debug, Clone)]
pub struct TcpSettings {
    /// Host name or IP address of the meter or its gateway
    pub host: String,
    pub port: u16,
    /// Limit for name resolution plus connection establishment
    pub connect_timeout: Option<Duration>,
    /// Limit for a single write
    pub write_timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Some(Duration::from_secs(10)),
            write_timeout: Some(Duration::from_secs(5)),
        }
    }

    /// Create TCP settings with a connect timeout
    pub fn with_connect_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
            ..Self::new(host, port)
        }
    }
}

/// TCP transport layer implementation
///
/// Reads are never bounded here: the poller owns the response timeout and
/// races it against `read`, which is cancel safe on a `TcpStream`.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<DebugTcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Get the settings this transport connects with
    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }

    async fn resolve(&self) -> SanextResult<Vec<SocketAddr>> {
        let target = (self.settings.host.as_str(), self.settings.port);
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(target)
            .await
            .map_err(|e| {
                SanextError::connection(
                    std::io::ErrorKind::NotFound,
                    format!("Failed to resolve {}: {}", self.settings.host, e),
                )
            })?
            .collect();

        if addrs.is_empty() {
            return Err(SanextError::connection(
                std::io::ErrorKind::NotFound,
                format!("No address found for {}", self.settings.host),
            ));
        }
        Ok(addrs)
    }

    async fn establish(&self) -> SanextResult<TcpStream> {
        let addrs = self.resolve().await?;
        let stream = TcpStream::connect(&addrs[..]).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn stream_mut(&mut self) -> SanextResult<&mut DebugTcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            SanextError::connection(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            )
        })
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> SanextResult<()> {
        if !self.closed {
            return Err(SanextError::connection(
                std::io::ErrorKind::AlreadyExists,
                "Connection has already been opened",
            ));
        }

        let stream = if let Some(timeout) = self.settings.connect_timeout {
            tokio::time::timeout(timeout, self.establish())
                .await
                .map_err(|_| SanextError::Timeout)??
        } else {
            self.establish().await?
        };

        self.stream = Some(DebugTcpStream(stream));
        self.closed = false;
        Ok(())
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> SanextResult<usize> {
        let stream = self.stream_mut()?;

        match stream.read(buf).await {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(SanextError::Connection(e))
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> SanextResult<usize> {
        let write_timeout = self.settings.write_timeout;
        let stream = self.stream_mut()?;

        let result = if let Some(timeout) = write_timeout {
            tokio::time::timeout(timeout, stream.write(buf))
                .await
                .map_err(|_| SanextError::Timeout)?
                .map_err(SanextError::Connection)
        } else {
            stream.write(buf).await.map_err(SanextError::Connection)
        };

        if result.is_err() {
            self.closed = true;
        }
        result
    }

    async fn flush(&mut self) -> SanextResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(SanextError::Connection)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> SanextResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}
