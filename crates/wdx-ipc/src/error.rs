//! IPC-level error type.

use thiserror::Error;

use crate::core_status::CoreStatus;

/// Errors that can arise anywhere in the managed-object IPC substrate.
#[derive(Debug, Error)]
pub enum IpcError {
    /// A message body failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] wdx_codec::CodecError),

    /// The stream adapter failed to send or receive a frame.
    #[error("transport error: {0}")]
    Transport(#[from] wdx_transport::TransportError),

    /// A message was addressed to an id that is unknown, or whose object is
    /// already marked for destruction.
    #[error("object {0} is gone")]
    ObjectGone(u32),

    /// A domain status code carried verbatim through the IPC from a remote
    /// call.
    #[error("core status: {0:?}")]
    CoreStatus(CoreStatus),

    /// An in-flight call was dropped before a response arrived (connection
    /// torn down, proxy destroyed, peer cancelled).
    #[error("call dropped before completion")]
    Dropped,

    /// A store operation violated a structural invariant (duplicate id on
    /// insert, etc).
    #[error("object store error: {0}")]
    Store(String),
}

/// Convenience alias for IPC results.
pub type Result<T> = std::result::Result<T, IpcError>;
