//! Daemon-level error type.

use thiserror::Error;

/// Errors that can arise while binding or running the daemon.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The IPC transport listener failed to bind or accept.
    #[error("transport error: {0}")]
    Transport(#[from] wdx_transport::TransportError),

    /// The managed-object substrate reported an error outside of a single
    /// connection's request handling (which logs and continues instead).
    #[error("ipc error: {0}")]
    Ipc(#[from] wdx_ipc::IpcError),

    /// The HTTP listener failed to bind or serve.
    #[error("http server error: {0}")]
    Http(String),

    /// A request body failed to encode or decode on the wire.
    #[error("codec error: {0}")]
    Codec(#[from] wdx_codec::CodecError),
}

/// Convenience alias for daemon results.
pub type Result<T> = std::result::Result<T, ServerError>;
