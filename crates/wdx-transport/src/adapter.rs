//! The [`StreamAdapter`] trait: a bidirectional, length-framed byte channel.
//!
//! A manager (see `wdx-ipc`) talks to its transport purely in terms of whole
//! frames — it neither knows nor cares whether the bytes travelled over TCP
//! or a Unix domain socket.

use async_trait::async_trait;

use crate::error::Result;

/// Information about one end of a connected transport, used for logging and
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Human-readable description of the local endpoint (e.g. `127.0.0.1:9000`
    /// or a Unix socket path).
    pub local: String,
    /// Human-readable description of the remote endpoint.
    pub peer: String,
}

/// A connected, bidirectional, frame-oriented transport.
///
/// Each call to [`send`](StreamAdapter::send) writes exactly one frame;
/// each call to [`receive`](StreamAdapter::receive) reads exactly one frame.
/// Implementations are responsible for framing (length-prefixing) the raw
/// stream they sit on top of.
#[async_trait]
pub trait StreamAdapter: Send {
    /// Send one frame. Fails with [`crate::TransportError::MessageTooLarge`]
    /// before writing anything if `data` exceeds [`crate::MAX_SEND_DATA`].
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive one frame, blocking until a full frame has arrived.
    /// Returns [`crate::TransportError::Closed`] if the peer closed the
    /// connection before sending a complete frame.
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Description of the local/peer endpoints, for logging.
    fn connection_info(&self) -> ConnectionInfo;
}
