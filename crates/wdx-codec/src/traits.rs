//! Core encode/decode traits.
//!
//! Every wire value implements both. There is no separate "scalar sequence"
//! fast path in the Rust port: a `Vec<T>` encodes as a `u64` count followed
//! by each element's own encoding, which is bit-for-bit identical to a bulk
//! byte copy when `T` is a fixed-size scalar (its `Encode` impl already
//! writes its bytes contiguously in native order).

use bytes::BufMut;

use crate::{error::CodecError, reader::Reader};

/// A value that can be written to the wire in native byte order.
pub trait Encode {
    /// Append `self`'s wire representation to `buf`.
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError>;
}

/// A value that can be parsed back out of the wire format.
pub trait Decode: Sized {
    /// Parse a value of `Self` from `reader`, advancing its cursor.
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError>;
}

macro_rules! impl_scalar {
    ($t:ty, $name:literal) => {
        impl Encode for $t {
            fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
                buf.put_slice(&self.to_ne_bytes());
                Ok(())
            }
        }

        impl Decode for $t {
            fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
                let bytes = reader.take_array::<{ std::mem::size_of::<$t>() }>($name)?;
                Ok(<$t>::from_ne_bytes(bytes))
            }
        }
    };
}

impl_scalar!(u8, "u8");
impl_scalar!(u16, "u16");
impl_scalar!(u32, "u32");
impl_scalar!(u64, "u64");
impl_scalar!(i8, "i8");
impl_scalar!(i16, "i16");
impl_scalar!(i32, "i32");
impl_scalar!(i64, "i64");
impl_scalar!(f32, "f32");
impl_scalar!(f64, "f64");

impl Encode for bool {
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
        buf.put_u8(u8::from(*self));
        Ok(())
    }
}

impl Decode for bool {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(u8::decode(reader)? != 0)
    }
}

/// Sequence of encodable elements: `u64` count prefix, then each element in
/// order (§4.1 "Sequences of scalars" / "Sequences of composites" — the same
/// wire shape covers both).
impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
        let count = self.len() as u64;
        count.encode(buf)?;
        for item in self {
            item.encode(buf)?;
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let count = u64::decode(reader)?;
        let mut out = Vec::with_capacity(count.min(1 << 20) as usize);
        for _ in 0..count {
            out.push(T::decode(reader)?);
        }
        Ok(out)
    }
}

/// String: `u32` length prefix followed by raw UTF-8 bytes.
impl Encode for String {
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
        let bytes = self.as_bytes();
        let len = u32::try_from(bytes.len())
            .map_err(|_| CodecError::LengthOverflow { type_name: "String", len: bytes.len() })?;
        len.encode(buf)?;
        buf.put_slice(bytes);
        Ok(())
    }
}

impl Decode for String {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let len = u32::decode(reader)? as usize;
        let bytes = reader.take(len, "String")?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CodecError::Malformed { type_name: "String", reason: e.to_string() })
    }
}

/// Owned pointer wrapper: encodes/decodes the inner value with no presence
/// flag (§4.1 "Owned pointer wrappers"). Used for fields that are always
/// populated but heap-allocated on the caller's side.
impl<T: Encode> Encode for Box<T> {
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
        (**self).encode(buf)
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Box::new(T::decode(reader)?))
    }
}

/// Optional value: one presence byte, followed by the inner encoding iff
/// present.
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
        match self {
            Some(value) => {
                true.encode(buf)?;
                value.encode(buf)
            }
            None => false.encode(buf),
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        if bool::decode(reader)? { Ok(Some(T::decode(reader)?)) } else { Ok(None) }
    }
}

/// Mapping: `u32` count prefix; per entry, key then value.
impl<K: Encode, V: Encode> Encode for std::collections::HashMap<K, V> {
    fn encode(&self, buf: &mut impl BufMut) -> Result<(), CodecError> {
        let len = u32::try_from(self.len())
            .map_err(|_| CodecError::LengthOverflow { type_name: "HashMap", len: self.len() })?;
        len.encode(buf)?;
        for (k, v) in self {
            k.encode(buf)?;
            v.encode(buf)?;
        }
        Ok(())
    }
}

impl<K: Decode + std::hash::Hash + Eq, V: Decode> Decode for std::collections::HashMap<K, V> {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let len = u32::decode(reader)? as usize;
        let mut out = std::collections::HashMap::with_capacity(len.min(1 << 16));
        for _ in 0..len {
            let key = K::decode(reader)?;
            let value = V::decode(reader)?;
            out.insert(key, value);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn roundtrip<T: Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = BytesMut::new();
        value.encode(&mut buf).unwrap();
        let mut reader = Reader::new(&buf);
        let decoded = T::decode(&mut reader).unwrap();
        assert_eq!(value, decoded);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn scalars_roundtrip() {
        roundtrip(42u8);
        roundtrip(1234u16);
        roundtrip(0xDEAD_BEEFu32);
        roundtrip(0xDEAD_BEEF_CAFE_F00Du64);
        roundtrip(-7i32);
        roundtrip(3.5f64);
        roundtrip(true);
        roundtrip(false);
    }

    #[test]
    fn string_roundtrip() {
        roundtrip("hello world".to_string());
        roundtrip(String::new());
    }

    #[test]
    fn vec_of_scalars_roundtrip() {
        roundtrip(vec![1u32, 2, 3, 4, 5]);
        roundtrip(Vec::<u8>::new());
    }

    #[test]
    fn vec_of_strings_roundtrip() {
        roundtrip(vec!["a".to_string(), "bb".to_string(), "ccc".to_string()]);
    }

    #[test]
    fn boxed_value_roundtrips_as_inner() {
        roundtrip(Box::new(99u32));
    }

    #[test]
    fn option_roundtrips_both_variants() {
        roundtrip(Some(7u32));
        roundtrip(None::<u32>);
        roundtrip(Some("present".to_string()));
    }

    #[test]
    fn hashmap_roundtrip() {
        let mut map = std::collections::HashMap::new();
        map.insert(1u32, "one".to_string());
        map.insert(2u32, "two".to_string());
        roundtrip(map);
    }

    #[test]
    fn short_read_reports_type_name() {
        let data = [0u8, 0, 0];
        let mut reader = Reader::new(&data);
        let err = u32::decode(&mut reader).unwrap_err();
        assert_eq!(err, CodecError::ShortRead { type_name: "u32", needed: 4, available: 3 });
    }

    #[test]
    fn truncated_string_length_fails() {
        let mut buf = BytesMut::new();
        10u32.encode(&mut buf).unwrap();
        buf.extend_from_slice(b"short");
        let mut reader = Reader::new(&buf);
        let err = String::decode(&mut reader).unwrap_err();
        assert!(matches!(err, CodecError::ShortRead { type_name: "String", .. }));
    }
}
