//! The `Message` wire envelope exchanged between an IPC manager and its
//! transport.
//!
//! Every other value in this crate is written in native byte order, but the
//! leading `target_object_id` field is the one documented exception (§3):
//! it is always little-endian on the wire regardless of host endianness, so
//! a manager can demultiplex an incoming frame to the right managed object
//! before it knows (or cares) what native order the sender used for the
//! rest of the payload. There is no inner length prefix on the body — the
//! transport's own frame length already delimits `id ‖ body`, so the
//! decoder simply takes whatever bytes remain after the id.

use bytes::BufMut;

use crate::{error::CodecError, reader::Reader, traits::{Decode, Encode}};

/// An IPC frame routed to a managed object and carrying an opaque,
/// already-encoded body.
///
/// The body is left as raw bytes here: the manager routes on
/// `target_object_id` alone, and only the addressed object's proxy/stub
/// knows how to interpret the payload that follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Id of the managed object this frame is addressed to. Object id `0`
    /// is reserved for the backend object.
    pub target_object_id: u32,
    /// Opaque, already-serialized call payload. Fills the rest of the frame.
    pub body: Vec<u8>,
}

impl Message {
    /// Build a message addressed to `target_object_id` carrying `body`.
    #[must_use]
    pub fn new(target_object_id: u32, body: Vec<u8>) -> Self {
        Self { target_object_id, body }
    }
}

impl Encode for Message {
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
        buf.put_slice(&self.target_object_id.to_le_bytes());
        buf.put_slice(&self.body);
        Ok(())
    }
}

impl Decode for Message {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let id_bytes = reader.take_array::<4>("Message::target_object_id")?;
        let target_object_id = u32::from_le_bytes(id_bytes);
        let body = reader.take(reader.remaining(), "Message::body")?.to_vec();
        Ok(Self { target_object_id, body })
    }
}

/// Fast-path wire type for a file-read response.
///
/// Bulk file data dwarfs the cost of an extra domain round-trip, so a
/// `FileReadResponse` skips [`crate::Domain`] wrapping entirely and is
/// framed directly as `core_status: u32`, `data: Vec<u8>` with the usual
/// `u64` count prefix on the byte vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReadResponse {
    /// Core status code of the read (see `wdx-ipc::CoreStatus`).
    pub core_status: u32,
    /// Bytes read from the file, empty on failure.
    pub data: Vec<u8>,
}

impl Encode for FileReadResponse {
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
        self.core_status.encode(buf)?;
        self.data.encode(buf)
    }
}

impl Decode for FileReadResponse {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let core_status = u32::decode(reader)?;
        let data = Vec::<u8>::decode(reader)?;
        Ok(Self { core_status, data })
    }
}
