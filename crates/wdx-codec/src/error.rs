//! Codec error type.

use thiserror::Error;

/// Errors produced while encoding or decoding a value.
///
/// Every variant carries the name of the type that failed so a caller can
/// report which part of a nested structure was malformed without needing a
/// full decode stack trace.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CodecError {
    /// The input buffer was exhausted before a value of `type_name` could be
    /// fully read.
    #[error("short read while decoding `{type_name}`: needed {needed} bytes, had {available}")]
    ShortRead { type_name: &'static str, needed: usize, available: usize },

    /// A length prefix (string, mapping) exceeds what the wire format can
    /// represent.
    #[error("length of `{type_name}` ({len}) is not representable on the wire")]
    LengthOverflow { type_name: &'static str, len: usize },

    /// A decoded value violates a structural invariant of `type_name` (e.g.
    /// an unrepresentable discriminant or a domain serializer rejecting its
    /// bytes).
    #[error("malformed `{type_name}`: {reason}")]
    Malformed { type_name: &'static str, reason: String },
}

/// Convenience alias for codec results.
pub type Result<T> = std::result::Result<T, CodecError>;
