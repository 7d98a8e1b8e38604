//! The authentication and verification suffix at `trailerOffset`.
//!
//! The trailer is self-describing: its first 8 bytes carry the size of the
//! authentication value that follows, so it is decoded in two passes.
//! Both the authentication value and `commVerification` are opaque here
//! and pass through unchanged.

use bytes::BufMut;

use crate::wire::{self, FieldReader};
use crate::ProtocolError;

/// The first 8 bytes of a trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailerPrefix {
    pub auth_key_identifier: i32,
    pub auth_size: usize,
}

impl TrailerPrefix {
    pub const SIZE: usize = 8;

    /// # Errors
    /// [`ProtocolError::InvalidLength`] for a negative `authenticationSize`.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = FieldReader::new(bytes);
        Ok(Self {
            auth_key_identifier: reader
                .read_i32("authenticationKeyIdentifier")?,
            auth_size: reader.read_len("authenticationSize")?,
        })
    }

    /// Bytes that follow the prefix: the value and `commVerification`.
    pub fn remainder_len(&self) -> usize {
        self.auth_size + 8
    }

    /// Full trailer length, `16 + authenticationSize`.
    pub fn trailer_len(&self) -> usize {
        Self::SIZE + self.remainder_len()
    }
}

/// Decoded frame trailer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameTrailer {
    pub auth_key_identifier: i32,
    /// Opaque authentication value; empty means unauthenticated.
    pub auth_value: Vec<u8>,
    /// Opaque link-verification value.
    pub comm_verification: i64,
}

impl FrameTrailer {
    /// Length of a trailer with no authentication value.
    pub const MIN_SIZE: usize = 16;

    /// A trailer with no authentication value and zero verification.
    pub fn unauthenticated(auth_key_identifier: i32) -> Self {
        Self {
            auth_key_identifier,
            ..Self::default()
        }
    }

    pub fn wire_len(&self) -> usize {
        Self::MIN_SIZE + self.auth_value.len()
    }

    /// Second decode pass, given the prefix and the bytes after it.
    ///
    /// # Errors
    /// [`ProtocolError::TruncatedFrame`] if `rest` is shorter than the
    /// prefix declares.
    pub fn decode_with_prefix(
        prefix: TrailerPrefix,
        rest: &[u8],
    ) -> Result<Self, ProtocolError> {
        if rest.len() < prefix.remainder_len() {
            return Err(ProtocolError::TruncatedFrame {
                needed: prefix.trailer_len(),
                available: TrailerPrefix::SIZE + rest.len(),
            });
        }
        let mut reader = FieldReader::new(rest);
        let auth_value = reader
            .read_bytes("authenticationValue", prefix.auth_size)?
            .to_vec();
        Ok(Self {
            auth_key_identifier: prefix.auth_key_identifier,
            auth_value,
            comm_verification: reader.read_i64("commVerification")?,
        })
    }

    /// Decodes a complete trailer region.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < TrailerPrefix::SIZE {
            return Err(ProtocolError::TruncatedFrame {
                needed: Self::MIN_SIZE,
                available: bytes.len(),
            });
        }
        let (prefix, rest) = bytes.split_at(TrailerPrefix::SIZE);
        Self::decode_with_prefix(TrailerPrefix::decode(prefix)?, rest)
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        buf.put_i32(self.auth_key_identifier);
        wire::put_len(buf, "authenticationSize", self.auth_value.len())?;
        buf.put_slice(&self.auth_value);
        buf.put_i64(self.comm_verification);
        Ok(())
    }
}
