//! `multipart/byteranges` body parsing for chunked `PATCH` requests.
//!
//! The wire format (RFC 7233 §4.1) is a sequence of parts, each a
//! `Content-Type`/`Content-Range` header block, a blank line, then exactly
//! `Content-Range`'s declared number of raw bytes — not line-delimited, so a
//! part's body can contain anything including `\r\n`. This walks the buffer
//! with an explicit cursor for that reason, the same way the original reads
//! its content stream one `get_content_line` / fixed-length read at a time.

use std::collections::HashMap;

use crate::{error::FilesError, range::parse_content_range, DEFAULT_FILE_CONTENT_TYPE};

/// One decoded part of a multipart/byteranges body.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    /// Offset into the target file this part's data starts at.
    pub offset: u64,
    /// Length of `data` (redundant with `data.len()`, kept for parity with
    /// the `Content-Range` header it was parsed from).
    pub length: u64,
    /// Raw part payload.
    pub data: Vec<u8>,
}

fn read_line(body: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = body.get(pos..)?;
    let idx = rest.windows(2).position(|w| w == b"\r\n")?;
    Some((&rest[..idx], pos + idx + 2))
}

fn malformed(reason: &str) -> FilesError {
    FilesError::MalformedMultipart(reason.to_string())
}

/// Parse a full multipart/byteranges body against `boundary` (the value
/// extracted from the request's `Content-Type: multipart/byteranges;
/// boundary=...` header).
///
/// # Errors
/// Returns [`FilesError::MalformedMultipart`] if the body does not follow
/// the part grammar, and [`FilesError::UnsupportedMediaType`] if a part's
/// own `Content-Type` is not `application/octet-stream`.
pub fn parse_multipart_byteranges(body: &[u8], boundary: &str) -> Result<Vec<MultipartPart>, FilesError> {
    let boundary_line = format!("--{boundary}");
    let end_line = format!("--{boundary}--");

    let (first, mut pos) = read_line(body, 0).ok_or_else(|| malformed("empty body"))?;
    if first != boundary_line.as_bytes() {
        return Err(malformed("missing multipart boundary begin"));
    }

    let mut parts = Vec::new();
    loop {
        let mut headers: HashMap<String, String> = HashMap::new();
        loop {
            let (line, next) = read_line(body, pos).ok_or_else(|| malformed("unterminated part header"))?;
            pos = next;
            if line.is_empty() {
                break;
            }
            let line = std::str::from_utf8(line).map_err(|_| malformed("part header is not valid UTF-8"))?;
            let (name, value) = line.split_once(": ").ok_or_else(|| malformed("header line expected"))?;
            headers.insert(name.to_string(), value.to_string());
        }

        let content_type =
            headers.get("Content-Type").ok_or_else(|| malformed("Content-Type & Content-Range expected"))?;
        let content_range =
            headers.get("Content-Range").ok_or_else(|| malformed("Content-Type & Content-Range expected"))?;
        if content_type != DEFAULT_FILE_CONTENT_TYPE {
            return Err(FilesError::UnsupportedMediaType);
        }
        let (offset, length, _total_size) =
            parse_content_range(content_range).ok_or_else(|| malformed("malformed Content-Range"))?;

        let length_usize = usize::try_from(length).map_err(|_| malformed("part length overflows usize"))?;
        let data = body
            .get(pos..pos + length_usize)
            .ok_or_else(|| malformed("body shorter than its declared Content-Range length"))?
            .to_vec();
        pos += length_usize;
        parts.push(MultipartPart { offset, length, data });

        let (blank, next) = read_line(body, pos).ok_or_else(|| malformed("expected empty line after part body"))?;
        if !blank.is_empty() {
            return Err(malformed("expected empty line after part body"));
        }
        pos = next;

        let (marker, next) = read_line(body, pos).ok_or_else(|| malformed("expected boundary marker"))?;
        pos = next;
        if marker == end_line.as_bytes() {
            break;
        } else if marker == boundary_line.as_bytes() {
            continue;
        }
        return Err(malformed("expected boundary marker"));
    }

    Ok(parts)
}
