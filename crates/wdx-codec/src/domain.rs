//! Domain-type delegation.
//!
//! Parameter values themselves are opaque to the IPC codec: a domain type
//! (the actual parameter payload — an integer, a struct, a blob) is
//! serialized by its own domain-specific serializer into a flat byte string,
//! and the codec only ever sees that string framed with a length prefix.
//! This keeps `wdx-codec` ignorant of parameter schemas while still letting
//! domain values travel inside an IPC [`crate::Message`] body.

use bytes::BufMut;

use crate::{error::CodecError, reader::Reader, traits::{Decode, Encode}};

/// A value with its own domain-specific wire representation, carried inside
/// the IPC codec as an opaque, length-prefixed blob.
pub trait DomainEncode {
    /// Serialize `self` into its domain-specific byte representation.
    fn domain_encode(&self) -> Vec<u8>;
}

/// The decode counterpart of [`DomainEncode`].
pub trait DomainDecode: Sized {
    /// Parse `self` from a domain-specific byte blob already extracted from
    /// the wire.
    fn domain_decode(bytes: &[u8]) -> Result<Self, CodecError>;
}

/// Wraps a domain type so it can be embedded directly in a codec-encoded
/// structure: on the wire it is a `u32`-length-prefixed blob produced by the
/// inner type's own serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain<T> {
    /// The wrapped domain value.
    pub value: T,
}

impl<T> Domain<T> {
    /// Wrap `value` for codec embedding.
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: DomainEncode> Encode for Domain<T> {
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
        let blob = self.value.domain_encode();
        let len = u32::try_from(blob.len())
            .map_err(|_| CodecError::LengthOverflow { type_name: "Domain", len: blob.len() })?;
        len.encode(buf)?;
        buf.put_slice(&blob);
        Ok(())
    }
}

impl<T: DomainDecode> Decode for Domain<T> {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let len = u32::decode(reader)? as usize;
        let blob = reader.take(len, "Domain")?;
        Ok(Domain::new(T::domain_decode(blob)?))
    }
}
