//! TCP transport.

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};

use crate::{
    adapter::{ConnectionInfo, StreamAdapter},
    error::{Result, TransportError},
    framing::{read_frame, write_frame},
};

/// A connected TCP stream framed with [`crate::framing`].
pub struct TcpTransport {
    stream: TcpStream,
    info: ConnectionInfo,
}

impl TcpTransport {
    fn from_stream(stream: TcpStream) -> Result<Self> {
        let local = stream
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(Self { stream, info: ConnectionInfo { local, peer } })
    }

    /// Connect to `addr` (e.g. `"127.0.0.1:9000"`).
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        tracing::debug!(addr, "tcp transport connected");
        Self::from_stream(stream)
    }
}

#[async_trait]
impl StreamAdapter for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        write_frame(&mut self.stream, data).await
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.stream).await
    }

    fn connection_info(&self) -> ConnectionInfo {
        self.info.clone()
    }
}

/// Accepts incoming TCP connections and hands back framed [`TcpTransport`]s.
pub struct TcpTransportListener {
    listener: TcpListener,
}

impl TcpTransportListener {
    /// Bind to `addr` (e.g. `"127.0.0.1:9000"`, or `"127.0.0.1:0"` for an
    /// ephemeral port).
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "tcp transport listening");
        Ok(Self { listener })
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<TcpTransport> {
        let (stream, _addr) = self.listener.accept().await?;
        TcpTransport::from_stream(stream)
    }
}
