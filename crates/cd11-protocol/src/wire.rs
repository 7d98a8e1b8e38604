//! Primitive field codecs shared by every frame layout.
//!
//! All integers and floats are big-endian. Text fields are fixed-width
//! single-byte text: each byte maps to the Unicode code point of the same
//! value, so any byte sequence decodes and re-encodes losslessly. Padded
//! text is blank-filled on encode and stripped of trailing blanks and NULs
//! on decode.

use bytes::{Buf, BufMut};

use crate::ProtocolError;

/// Alignment unit for padded variable-length fields.
pub const WORD: usize = 4;

/// Rounds `len` up to the next multiple of [`WORD`].
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// Decodes raw bytes as single-byte text without trimming.
pub fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Encodes text as single-byte characters.
///
/// # Errors
/// [`ProtocolError::InvalidField`] if a character is above U+00FF.
pub fn latin1_bytes(
    field: &'static str,
    text: &str,
) -> Result<Vec<u8>, ProtocolError> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                ProtocolError::invalid_field(
                    field,
                    format!("character {c:?} is not single-byte text"),
                )
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// FieldReader
// ---------------------------------------------------------------------------

/// A bounds-checked cursor over a frame region.
///
/// Each read names the field it is decoding so an underflow reports
/// exactly which declaration ran past the end of the region.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    consumed: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, consumed: 0 }
    }

    /// Bytes consumed since construction.
    pub fn position(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Fails with `TrailingBytes` unless the region is fully consumed.
    pub fn finish(&self, field: &'static str) -> Result<(), ProtocolError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(ProtocolError::TrailingBytes { field, extra }),
        }
    }

    /// Fails with `BufferUnderflow` unless `needed` bytes remain.
    pub fn require(
        &self,
        field: &'static str,
        needed: usize,
    ) -> Result<(), ProtocolError> {
        if self.remaining() < needed {
            return Err(ProtocolError::BufferUnderflow {
                field,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, ProtocolError> {
        self.require(field, 1)?;
        self.consumed += 1;
        Ok(self.buf.get_u8())
    }

    /// Reads a one-byte flag where `1` means true.
    ///
    /// Any other value reads as false and re-encodes as `0`, so a
    /// non-canonical flag byte does not survive a round trip.
    pub fn read_flag(
        &mut self,
        field: &'static str,
    ) -> Result<bool, ProtocolError> {
        Ok(self.read_u8(field)? == 1)
    }

    pub fn read_u16(
        &mut self,
        field: &'static str,
    ) -> Result<u16, ProtocolError> {
        self.require(field, 2)?;
        self.consumed += 2;
        Ok(self.buf.get_u16())
    }

    pub fn read_i32(
        &mut self,
        field: &'static str,
    ) -> Result<i32, ProtocolError> {
        self.require(field, 4)?;
        self.consumed += 4;
        Ok(self.buf.get_i32())
    }

    pub fn read_u32(
        &mut self,
        field: &'static str,
    ) -> Result<u32, ProtocolError> {
        self.require(field, 4)?;
        self.consumed += 4;
        Ok(self.buf.get_u32())
    }

    pub fn read_i64(
        &mut self,
        field: &'static str,
    ) -> Result<i64, ProtocolError> {
        self.require(field, 8)?;
        self.consumed += 8;
        Ok(self.buf.get_i64())
    }

    pub fn read_f32(
        &mut self,
        field: &'static str,
    ) -> Result<f32, ProtocolError> {
        self.require(field, 4)?;
        self.consumed += 4;
        Ok(self.buf.get_f32())
    }

    /// Reads a 4-byte length that must not be negative.
    pub fn read_len(
        &mut self,
        field: &'static str,
    ) -> Result<usize, ProtocolError> {
        let value = self.read_i32(field)?;
        usize::try_from(value).map_err(|_| ProtocolError::InvalidLength {
            field,
            value: i64::from(value),
        })
    }

    /// Borrows the next `len` bytes.
    pub fn read_bytes(
        &mut self,
        field: &'static str,
        len: usize,
    ) -> Result<&'a [u8], ProtocolError> {
        self.require(field, len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        self.consumed += len;
        Ok(head)
    }

    /// Reads `len` bytes followed by zero padding to the next word.
    pub fn read_padded_bytes(
        &mut self,
        field: &'static str,
        len: usize,
    ) -> Result<&'a [u8], ProtocolError> {
        self.require(field, padded_len(len))?;
        let value = self.read_bytes(field, len)?;
        self.skip(field, padded_len(len) - len)?;
        Ok(value)
    }

    /// Reads a blank-padded text field and strips the padding.
    pub fn read_text(
        &mut self,
        field: &'static str,
        width: usize,
    ) -> Result<String, ProtocolError> {
        let raw = self.read_bytes(field, width)?;
        let text = latin1_string(raw);
        Ok(text.trim_end_matches([' ', '\0']).to_string())
    }

    /// Reads a fixed-width text field exactly as it appears on the wire.
    pub fn read_raw_text(
        &mut self,
        field: &'static str,
        width: usize,
    ) -> Result<String, ProtocolError> {
        Ok(latin1_string(self.read_bytes(field, width)?))
    }

    pub fn skip(
        &mut self,
        field: &'static str,
        len: usize,
    ) -> Result<(), ProtocolError> {
        self.read_bytes(field, len).map(|_| ())
    }

    /// Looks at the next `len` bytes without consuming them.
    pub fn peek(&self, len: usize) -> Option<&'a [u8]> {
        let buf: &'a [u8] = self.buf;
        buf.get(..len)
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Writes `text` blank-padded to exactly `width` bytes.
///
/// # Errors
/// [`ProtocolError::InvalidField`] if the text is wider than `width` or
/// contains characters above U+00FF.
pub fn put_text(
    buf: &mut Vec<u8>,
    field: &'static str,
    text: &str,
    width: usize,
) -> Result<(), ProtocolError> {
    let bytes = latin1_bytes(field, text)?;
    if bytes.len() > width {
        return Err(ProtocolError::invalid_field(
            field,
            format!("{} bytes exceed the {width}-byte field", bytes.len()),
        ));
    }
    buf.put_slice(&bytes);
    buf.put_bytes(b' ', width - bytes.len());
    Ok(())
}

/// Writes `bytes` followed by zero padding to the next word.
pub fn put_padded(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.put_slice(bytes);
    buf.put_bytes(0, padded_len(bytes.len()) - bytes.len());
}

/// Writes a length as a 4-byte signed integer.
///
/// # Errors
/// [`ProtocolError::InvalidField`] if `len` does not fit in an `i32`.
pub fn put_len(
    buf: &mut Vec<u8>,
    field: &'static str,
    len: usize,
) -> Result<(), ProtocolError> {
    buf.put_i32(checked_len(field, len)?);
    Ok(())
}

pub(crate) fn checked_len(
    field: &'static str,
    len: usize,
) -> Result<i32, ProtocolError> {
    i32::try_from(len).map_err(|_| {
        ProtocolError::invalid_field(field, format!("length {len} overflows"))
    })
}
