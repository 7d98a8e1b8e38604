//! Error types for the protocol layer.
//!
//! Every structural decode failure discards the whole frame, so each
//! variant describes why a byte range could not become a typed frame.
//! Content-level oddities (a garbled Julian date, an unknown data type)
//! are never errors here; they travel through as decoded text.

use crate::FrameType;

/// Errors that can occur while encoding or decoding CD-1.1 frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Fewer than 36 bytes were available for the frame header.
    #[error("truncated header: {available} of 36 bytes available")]
    TruncatedHeader {
        /// Bytes that were present.
        available: usize,
    },

    /// The header was complete but the frame ended before the trailer.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    TruncatedFrame { needed: usize, available: usize },

    /// The header's `trailerOffset` is structurally impossible.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A length field inside a body claims more bytes than are present.
    ///
    /// The entire frame is rejected; no partial body is returned.
    #[error(
        "buffer underflow reading {field}: needed {needed} bytes, \
         {available} available"
    )]
    BufferUnderflow {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// An acknack's gap count does not match the bytes that follow it.
    #[error(
        "malformed gap list: {gap_count} gaps declared, {remaining} bytes \
         remaining"
    )]
    MalformedGapList { gap_count: i32, remaining: usize },

    /// Bytes remain after the last field of a body or subframe, so the
    /// declared length does not describe the content.
    #[error("{extra} unexpected bytes after {field}")]
    TrailingBytes { field: &'static str, extra: usize },

    /// The frame type has no body codec.
    #[error("unsupported frame type: {0}")]
    UnsupportedFrameType(FrameType),

    /// A declared length or count is negative.
    #[error("invalid length for {field}: {value}")]
    InvalidLength { field: &'static str, value: i64 },

    /// A value cannot be represented on the wire (encode side).
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ProtocolError {
    pub(crate) fn invalid_field(
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
