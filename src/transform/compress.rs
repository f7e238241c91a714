//! Body compression and decompression (gzip, deflate).
//!
//! # Responsibilities
//! - Decode upstream bodies per their `content-encoding`
//! - Re-encode rewritten bodies per the client's `accept-encoding`
//!
//! # Design Decisions
//! - Compression is never a correctness requirement: any codec failure or
//!   unsupported encoding returns `None` and the caller keeps the original
//!   payload
//! - HTTP `deflate` is the zlib-wrapped form
//! - Brotli is deliberately unsupported; the dispatcher forces upstream
//!   `accept-encoding: gzip, deflate` so it never arrives

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

/// Supported transfer encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
    Identity,
}

impl Encoding {
    /// The `content-encoding` header value, if the encoding carries one.
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            Encoding::Gzip => Some("gzip"),
            Encoding::Deflate => Some("deflate"),
            Encoding::Identity => None,
        }
    }
}

/// Pick the first supported encoding from an `accept-encoding` header.
pub fn negotiate(accept_encoding: Option<&str>) -> Encoding {
    let Some(accept) = accept_encoding else {
        return Encoding::Identity;
    };
    for token in accept.split(',') {
        let token = token.trim();
        let token = token.split(';').next().unwrap_or(token).trim();
        match token {
            "gzip" => return Encoding::Gzip,
            "deflate" => return Encoding::Deflate,
            _ => {}
        }
    }
    Encoding::Identity
}

/// Decode a body per its declared `content-encoding`.
///
/// `None` means the caller should keep the payload as-is: the encoding is
/// unsupported, or decoding failed.
pub fn decode(bytes: &[u8], content_encoding: &str) -> Option<Vec<u8>> {
    let result = match content_encoding {
        "" | "identity" => return None,
        "gzip" => {
            let mut out = Vec::new();
            GzDecoder::new(bytes).read_to_end(&mut out).map(|_| out)
        }
        "deflate" => {
            let mut out = Vec::new();
            ZlibDecoder::new(bytes).read_to_end(&mut out).map(|_| out)
        }
        other => {
            tracing::warn!(encoding = %other, "unsupported content-encoding, passing through");
            return None;
        }
    };
    match result {
        Ok(out) => Some(out),
        Err(err) => {
            tracing::warn!(encoding = %content_encoding, error = %err, "decompression failed, passing through");
            None
        }
    }
}

/// Encode a body with the given encoding. `None` for identity or failure.
pub fn encode(bytes: &[u8], encoding: Encoding) -> Option<Vec<u8>> {
    let result = match encoding {
        Encoding::Identity => return None,
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes).and_then(|_| encoder.finish())
        }
        Encoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes).and_then(|_| encoder.finish())
        }
    };
    match result {
        Ok(out) => Some(out),
        Err(err) => {
            tracing::warn!(error = %err, "compression failed, sending identity");
            None
        }
    }
}
