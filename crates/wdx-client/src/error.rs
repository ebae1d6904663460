//! Client-side error type.

use thiserror::Error;

/// Errors that can arise while driving a connection to the daemon.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The managed-object substrate reported an error (transport failure,
    /// dropped call, unknown object).
    #[error("ipc error: {0}")]
    Ipc(#[from] wdx_ipc::IpcError),

    /// A call's arguments failed to encode, or its reply failed to decode.
    #[error("codec error: {0}")]
    Codec(#[from] wdx_codec::CodecError),

    /// The connection attempt itself failed, before any managed object
    /// traffic could flow.
    #[error("connect failed: {0}")]
    Connect(#[from] wdx_transport::TransportError),
}

/// Convenience alias for client results.
pub type Result<T> = std::result::Result<T, ClientError>;
