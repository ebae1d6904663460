//! Cursor over an immutable byte slice used by [`crate::Decode`] impls.

use crate::error::CodecError;

/// Forward-only cursor over a decode buffer.
///
/// Mirrors the role of the original `data_input_stream`: a read-only view
/// over a byte buffer that tracks how much has been consumed so nested
/// decoders can keep reading from where the previous one stopped.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Wrap `buf` for decoding, starting at offset 0.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes remaining to be consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read exactly `n` bytes, advancing the cursor.
    pub fn take(&mut self, n: usize, type_name: &'static str) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::ShortRead { type_name, needed: n, available: self.remaining() });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a fixed-size array, advancing the cursor.
    pub fn take_array<const N: usize>(&mut self, type_name: &'static str) -> Result<[u8; N], CodecError> {
        let slice = self.take(N, type_name)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn take_advances_cursor() {
        let data = [1u8, 2, 3, 4];
        let mut r = Reader::new(&data);
        assert_eq!(r.take(2, "test").unwrap(), &[1, 2]);
        assert_eq!(r.take(2, "test").unwrap(), &[3, 4]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn take_past_end_is_short_read() {
        let data = [1u8];
        let mut r = Reader::new(&data);
        let err = r.take(2, "thing").unwrap_err();
        assert_eq!(err, CodecError::ShortRead { type_name: "thing", needed: 2, available: 1 });
    }
}
