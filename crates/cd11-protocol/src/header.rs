//! The fixed 36-byte envelope at the start of every frame.

use bytes::BufMut;

use crate::wire::{self, FieldReader};
use crate::{FrameType, ProtocolError};

/// Decoded frame header.
///
/// `trailer_offset` is the only length field tying the header to its
/// body: a well-formed frame has `trailer_offset == 36 + body length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub trailer_offset: i32,
    pub frame_creator: String,
    pub frame_destination: String,
    pub sequence_number: i64,
    pub series: i32,
}

impl FrameHeader {
    /// Size of the header on the wire.
    pub const SIZE: usize = 36;
    /// Width of the creator and destination fields.
    pub const NAME_LEN: usize = 8;

    /// Builds a header whose `trailer_offset` covers a body of `body_len`.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidField`] if the offset overflows an `i32`.
    pub fn new(
        frame_type: FrameType,
        body_len: usize,
        frame_creator: impl Into<String>,
        frame_destination: impl Into<String>,
        sequence_number: i64,
        series: i32,
    ) -> Result<Self, ProtocolError> {
        let trailer_offset =
            wire::checked_len("trailerOffset", Self::SIZE + body_len)?;
        Ok(Self {
            frame_type,
            trailer_offset,
            frame_creator: frame_creator.into(),
            frame_destination: frame_destination.into(),
            sequence_number,
            series,
        })
    }

    /// Decodes the first 36 bytes of `bytes`.
    ///
    /// # Errors
    /// - [`ProtocolError::TruncatedHeader`] if fewer than 36 bytes exist.
    /// - [`ProtocolError::InvalidHeader`] if `trailerOffset < 36`.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::TruncatedHeader {
                available: bytes.len(),
            });
        }
        let mut reader = FieldReader::new(&bytes[..Self::SIZE]);
        let frame_type = FrameType::from(reader.read_i32("frameType")?);
        let trailer_offset = reader.read_i32("trailerOffset")?;
        check_trailer_offset(trailer_offset)?;
        Ok(Self {
            frame_type,
            trailer_offset,
            frame_creator: reader.read_text("frameCreator", Self::NAME_LEN)?,
            frame_destination: reader
                .read_text("frameDestination", Self::NAME_LEN)?,
            sequence_number: reader.read_i64("sequenceNumber")?,
            series: reader.read_i32("series")?,
        })
    }

    /// Reads only `trailerOffset`, validating nothing else.
    ///
    /// Stream readers use this to size the rest of the frame before the
    /// header is decoded in full.
    pub fn peek_trailer_offset(bytes: &[u8]) -> Result<usize, ProtocolError> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::TruncatedHeader {
                available: bytes.len(),
            });
        }
        let mut reader = FieldReader::new(&bytes[4..8]);
        check_trailer_offset(reader.read_i32("trailerOffset")?)
    }

    /// Body length implied by `trailer_offset`.
    pub fn body_len(&self) -> usize {
        usize::try_from(self.trailer_offset)
            .map_or(0, |offset| offset.saturating_sub(Self::SIZE))
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        check_trailer_offset(self.trailer_offset)?;
        buf.put_i32(self.frame_type.code());
        buf.put_i32(self.trailer_offset);
        wire::put_text(buf, "frameCreator", &self.frame_creator, Self::NAME_LEN)?;
        wire::put_text(
            buf,
            "frameDestination",
            &self.frame_destination,
            Self::NAME_LEN,
        )?;
        buf.put_i64(self.sequence_number);
        buf.put_i32(self.series);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

fn check_trailer_offset(trailer_offset: i32) -> Result<usize, ProtocolError> {
    match usize::try_from(trailer_offset) {
        Ok(offset) if offset >= FrameHeader::SIZE => Ok(offset),
        _ => Err(ProtocolError::InvalidHeader(format!(
            "trailerOffset {trailer_offset} is below the {}-byte header",
            FrameHeader::SIZE
        ))),
    }
}
