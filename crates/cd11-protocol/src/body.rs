//! The seam every frame body codec plugs into.

use crate::ProtocolError;

/// A typed frame body that can be decoded from, and encoded to, the bytes
/// between the header and the trailer.
///
/// Decoding is all-or-nothing: any structural failure returns an error
/// and no partially decoded body escapes.
pub trait BodyCodec: Sized {
    /// Decodes a body from exactly the bytes between header and trailer.
    ///
    /// # Errors
    /// Any structural [`ProtocolError`]; content is never validated.
    fn decode_body(body: &[u8]) -> Result<Self, ProtocolError>;

    /// Appends the body's wire form to `buf`.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidField`] if a value cannot be represented.
    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError>;

    /// Exact number of bytes [`encode_body`](Self::encode_body) writes.
    fn body_len(&self) -> usize;

    fn to_body_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(self.body_len());
        self.encode_body(&mut buf)?;
        Ok(buf)
    }
}
