//! RFC 7233 byte-range parsing.
//!
//! Reimplements the original's two range grammars — `Range: bytes=...` and
//! `Content-Range: bytes .../...` — by hand rather than with a regex crate,
//! matching its parsing bit-for-bit: the suffix-range sentinel, the
//! `range_to < u64::MAX` bound check, and "ignore anything after the first
//! comma-separated range" (RFC 7233 §4.4 allows a server to serve only the
//! first range of a multi-range request).

/// Unit used throughout this engine's `Range`/`Accept-Ranges`/`Content-Range`
/// headers.
pub const ACCEPT_RANGES_UNIT: &str = "bytes";

/// Sentinel `offset` value produced by [`extract_byte_range_request`] for a
/// suffix range (`bytes=-500`): "resolve against the file size once it is
/// known."
pub const SUFFIX_RANGE_REQUEST_VALUE: u64 = u64::MAX;

/// A `Range` header resolved to a byte offset and length, before it has been
/// checked against the file's actual size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Starting offset, or [`SUFFIX_RANGE_REQUEST_VALUE`] for a suffix range.
    pub offset: u64,
    /// Number of bytes requested.
    pub length: u64,
}

fn parse_range_pair(segment: &str) -> Option<(Option<u64>, Option<u64>)> {
    let (from_raw, to_raw) = segment.split_once('-')?;
    let from = if from_raw.is_empty() {
        None
    } else {
        Some(from_raw.parse::<u64>().ok()?)
    };
    let to = if to_raw.is_empty() { None } else { Some(to_raw.parse::<u64>().ok()?) };
    Some((from, to))
}

/// Parse a `Range: bytes=<first>-<last>` (or suffix `bytes=-<n>`) header
/// value. Only the first comma-separated range is honored; the rest are
/// validated for shape but otherwise discarded, matching the original.
#[must_use]
pub fn extract_byte_range_request(header: &str) -> Option<ByteRange> {
    let spec = header.strip_prefix(ACCEPT_RANGES_UNIT)?.strip_prefix('=')?;
    let mut segments = spec.split(", ");
    let (from, to) = parse_range_pair(segments.next()?)?;
    for rest in segments {
        parse_range_pair(rest)?;
    }

    let range_from = from.unwrap_or(0);
    let range_to = to.unwrap_or(u64::MAX - 1);
    if range_to < range_from || range_to == u64::MAX {
        return None;
    }

    if from.is_none() {
        // Suffix byte range spec: https://tools.ietf.org/html/rfc7233#section-2.1
        Some(ByteRange { offset: SUFFIX_RANGE_REQUEST_VALUE, length: range_to })
    } else {
        Some(ByteRange { offset: range_from, length: 1 + range_to - range_from })
    }
}

/// Parse a `Content-Range: bytes <first>-<last>/<total|*>` header value, as
/// sent on each part of a multipart/byteranges PATCH body.
///
/// Returns `(offset, length, total_size)`; `total_size` is `0` for the `*`
/// (unknown total) form.
#[must_use]
pub fn parse_content_range(header: &str) -> Option<(u64, u64, u64)> {
    let spec = header.strip_prefix(ACCEPT_RANGES_UNIT)?.strip_prefix(' ')?;
    let (range, total_raw) = spec.split_once('/')?;
    let (from_raw, to_raw) = range.split_once('-')?;
    let range_from: u64 = from_raw.parse().ok()?;
    let range_to: u64 = to_raw.parse().ok()?;
    if range_to < range_from || range_to == u64::MAX {
        return None;
    }

    let total_size = if total_raw == "*" { 0 } else { total_raw.parse().ok()? };
    Some((range_from, 1 + range_to - range_from, total_size))
}

/// Render a `Content-Range: bytes <from>-<to>/<total>` header value.
#[must_use]
pub fn create_content_range(range_from: u64, range_to: u64, total_size: u64) -> String {
    format!("{ACCEPT_RANGES_UNIT} {range_from}-{range_to}/{total_size}")
}

/// A `Range` header resolved against a file's actual size: `valid` is
/// `false` when the request is unsatisfiable (RFC 7233 §3.1 — the engine
/// should answer `416`).
#[derive(Debug, Clone, Copy)]
pub struct RequestRange {
    /// Whether the resolved range can be served.
    pub valid: bool,
    /// Whether the original request carried a `Range` header at all — a
    /// response built from an invalid or absent header still needs to know
    /// this to pick `200` vs `206`.
    pub has_range_header: bool,
    /// Resolved start offset.
    pub offset: u64,
    /// Resolved length in bytes.
    pub length: u64,
    /// The file's total size, as reported by the provider.
    pub file_size: u64,
}

/// Resolve a parsed [`ByteRange`] (or its absence) against `file_size`.
#[must_use]
pub fn resolve_range(requested: Option<ByteRange>, file_size: u64) -> RequestRange {
    let has_range_header = requested.is_some();
    let Some(range) = requested else {
        return RequestRange { valid: true, has_range_header: false, offset: 0, length: file_size, file_size };
    };

    let offset =
        if range.offset == SUFFIX_RANGE_REQUEST_VALUE { file_size - range.length.min(file_size) } else { range.offset };

    if offset > file_size {
        return RequestRange { valid: false, has_range_header, offset, length: range.length, file_size };
    }

    let length = if range.offset == SUFFIX_RANGE_REQUEST_VALUE { range.length.min(file_size) } else { range.length.min(file_size - offset) };
    RequestRange { valid: true, has_range_header, offset, length, file_size }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plain_range_resolves_offset_and_length() {
        let range = extract_byte_range_request("bytes=10-19").unwrap();
        assert_eq!(range, ByteRange { offset: 10, length: 10 });
    }

    #[test]
    fn open_ended_range_uses_max_minus_one_as_range_to() {
        let range = extract_byte_range_request("bytes=5-").unwrap();
        assert_eq!(range.offset, 5);
        assert_eq!(range.length, u64::MAX - 5);
    }

    #[test]
    fn suffix_range_carries_the_sentinel_offset() {
        let range = extract_byte_range_request("bytes=-500").unwrap();
        assert_eq!(range.offset, SUFFIX_RANGE_REQUEST_VALUE);
        assert_eq!(range.length, 500);
    }

    #[test]
    fn further_ranges_after_the_first_comma_are_validated_but_ignored() {
        let range = extract_byte_range_request("bytes=0-9, 20-29").unwrap();
        assert_eq!(range, ByteRange { offset: 0, length: 10 });
    }

    #[test]
    fn malformed_further_range_rejects_the_whole_header() {
        assert!(extract_byte_range_request("bytes=0-9, nonsense").is_none());
    }

    #[test]
    fn range_to_before_range_from_is_rejected() {
        assert!(extract_byte_range_request("bytes=20-10").is_none());
    }

    #[test]
    fn missing_unit_is_rejected() {
        assert!(extract_byte_range_request("items=0-9").is_none());
    }

    #[test]
    fn content_range_with_known_total_parses() {
        let (offset, length, total) = parse_content_range("bytes 0-99/200").unwrap();
        assert_eq!((offset, length, total), (0, 100, 200));
    }

    #[test]
    fn content_range_with_unknown_total_reports_zero() {
        let (offset, length, total) = parse_content_range("bytes 0-99/*").unwrap();
        assert_eq!((offset, length, total), (0, 100, 0));
    }

    #[test]
    fn content_range_roundtrips_through_create_content_range() {
        let rendered = create_content_range(0, 99, 200);
        assert_eq!(rendered, "bytes 0-99/200");
        assert_eq!(parse_content_range(&rendered).unwrap(), (0, 100, 200));
    }

    #[test]
    fn absent_range_header_resolves_to_the_whole_file() {
        let resolved = resolve_range(None, 1000);
        assert!(resolved.valid);
        assert!(!resolved.has_range_header);
        assert_eq!((resolved.offset, resolved.length), (0, 1000));
    }

    #[test]
    fn suffix_range_resolves_against_file_size() {
        let resolved = resolve_range(Some(ByteRange { offset: SUFFIX_RANGE_REQUEST_VALUE, length: 10 }), 100);
        assert_eq!((resolved.offset, resolved.length), (90, 10));
    }

    #[test]
    fn suffix_range_longer_than_the_file_clamps_to_the_whole_file() {
        let resolved = resolve_range(Some(ByteRange { offset: SUFFIX_RANGE_REQUEST_VALUE, length: 1000 }), 100);
        assert_eq!((resolved.offset, resolved.length), (0, 100));
    }

    #[test]
    fn range_starting_past_the_end_of_file_is_invalid() {
        let resolved = resolve_range(Some(ByteRange { offset: 200, length: 10 }), 100);
        assert!(!resolved.valid);
    }

    #[test]
    fn range_extending_past_the_end_of_file_is_clamped() {
        let resolved = resolve_range(Some(ByteRange { offset: 90, length: 100 }), 100);
        assert_eq!((resolved.offset, resolved.length), (90, 10));
    }

    #[test]
    fn range_starting_exactly_at_end_of_file_is_valid_with_zero_length() {
        let resolved = resolve_range(Some(ByteRange { offset: 100, length: 10 }), 100);
        assert!(resolved.valid);
        assert_eq!(resolved.length, 0);
    }
}
