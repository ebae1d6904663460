//! Framed byte-stream transport layer.
//!
//! A [`StreamAdapter`] carries whole, length-prefixed frames between an IPC
//! manager and its peer over either a TCP socket or a Unix domain socket.
//! Framing, connection setup, and failure classification live here; the
//! `wdx-ipc` crate is the only thing that interprets what's inside a frame.

mod adapter;
mod error;
pub mod framing;
mod tcp;
mod unix;

pub use adapter::{ConnectionInfo, StreamAdapter};
pub use error::{Result, TransportError};
pub use tcp::{TcpTransport, TcpTransportListener};
pub use unix::{UnixTransport, UnixTransportListener};

/// Largest single frame a [`StreamAdapter`] will send or accept on receive,
/// mirroring the original `sender_i::max_send_data` bound. A send exceeding
/// this is refused before anything reaches the wire; a received length
/// prefix exceeding this is treated as a protocol violation.
pub const MAX_SEND_DATA: usize = 16 * 1024 * 1024;
