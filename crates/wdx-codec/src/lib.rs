//! Deterministic byte codec for the parameter-service IPC wire format.
//!
//! Scalars are written in native byte order; strings and sequences carry
//! explicit length/count prefixes; domain (parameter) values are carried as
//! opaque blobs produced by their own serializer. The one documented
//! exception to native ordering is [`Message::target_object_id`], which is
//! always little-endian so a manager can route a frame before decoding
//! anything else in it.

mod domain;
mod error;
mod message;
mod reader;
mod traits;
mod writer;

pub use domain::{Domain, DomainDecode, DomainEncode};
pub use error::{CodecError, Result};
pub use message::{FileReadResponse, Message};
pub use reader::Reader;
pub use traits::{Decode, Encode};
pub use writer::Writer;
