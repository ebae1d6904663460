//! Encode-side buffer used by callers that don't want to depend on `bytes`
//! directly.

use bytes::BytesMut;

use crate::{error::CodecError, traits::Encode};

/// Growable output buffer for [`Encode`] impls.
///
/// Mirrors the role of the original `data_output_stream`: a single buffer
/// that accumulates a value's wire representation so it can be handed to
/// the transport as one contiguous slice.
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
}

impl Writer {
    /// New, empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Encode `value` and append its bytes to this writer.
    pub fn write<T: Encode>(&mut self, value: &T) -> Result<(), CodecError> {
        value.encode(&mut self.buf)
    }

    /// Consume the writer, returning everything encoded so far.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Encode a single value into a fresh byte vector.
pub fn encode_to_vec<T: Encode>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::new();
    writer.write(value)?;
    Ok(writer.into_vec())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn writer_accumulates_multiple_values() {
        let mut w = Writer::new();
        w.write(&1u32).unwrap();
        w.write(&2u32).unwrap();
        assert_eq!(w.len(), 8);
        assert!(!w.is_empty());
    }

    #[test]
    fn encode_to_vec_matches_manual_write() {
        let direct = encode_to_vec(&0xABCDu16).unwrap();
        let mut w = Writer::new();
        w.write(&0xABCDu16).unwrap();
        assert_eq!(direct, w.into_vec());
    }
}
