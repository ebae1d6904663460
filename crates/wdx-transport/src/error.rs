//! Transport error type.

use thiserror::Error;

/// Errors produced by a [`crate::StreamAdapter`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying stream returned an I/O error.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A caller tried to send more than [`crate::MAX_SEND_DATA`] bytes in a
    /// single frame. The send is refused before anything is written to the
    /// wire.
    #[error("refusing to send {len} bytes, exceeds MAX_SEND_DATA ({max})")]
    MessageTooLarge { len: usize, max: usize },

    /// The peer closed the connection. Surfaced to callers as a distinct
    /// variant (rather than folded into `Io`) because a manager needs to
    /// tell a clean disconnect apart from a transport failure in order to
    /// decide whether reconnection should be attempted.
    #[error("transport closed by peer")]
    Closed,

    /// An in-flight call was dropped before a response arrived, typically
    /// because its proxy was cancelled or the connection it depended on was
    /// torn down.
    #[error("call dropped before completion")]
    Dropped,
}

/// Convenience alias for transport results.
pub type Result<T> = std::result::Result<T, TransportError>;
