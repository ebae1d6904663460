//! Unix domain socket transport.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::net::{UnixListener, UnixStream};

use crate::{
    adapter::{ConnectionInfo, StreamAdapter},
    error::Result,
    framing::{read_frame, write_frame},
};

/// A connected Unix domain socket stream framed with [`crate::framing`].
pub struct UnixTransport {
    stream: UnixStream,
    info: ConnectionInfo,
}

impl UnixTransport {
    fn from_stream(stream: UnixStream, path: &Path) -> Self {
        let info = ConnectionInfo { local: path.display().to_string(), peer: path.display().to_string() };
        Self { stream, info }
    }

    /// Connect to the Unix domain socket at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).await?;
        tracing::debug!(path = %path.display(), "unix transport connected");
        Ok(Self::from_stream(stream, path))
    }
}

#[async_trait]
impl StreamAdapter for UnixTransport {
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

/// Accepts incoming Unix domain socket connections.
///
/// Owns the socket path and unlinks it on drop, mirroring the original
/// daemon's cleanup of its listening socket on shutdown.
pub struct UnixTransportListener {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixTransportListener {
    /// Bind a new listening socket at `path`. Fails if a file already
    /// exists there — callers that want to replace a stale socket should
    /// remove it explicitly first.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let listener = UnixListener::bind(&path)?;
        tracing::info!(path = %path.display(), "unix transport listening");
        Ok(Self { listener, path })
    }

    /// Path this listener is bound to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<UnixTransport> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(UnixTransport::from_stream(stream, &self.path))
    }
}

impl Drop for UnixTransportListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
