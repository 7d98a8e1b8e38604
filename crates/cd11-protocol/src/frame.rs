//! Complete frames: header, typed body and trailer, plus the dispatcher
//! that selects a body codec from the header's type tag.

use serde::{Deserialize, Serialize};

use crate::{
    AcknackFrame, AlertFrame, BodyCodec, ConnectionFrame, DataFrame,
    FrameHeader, FrameTrailer, FrameType, ProtocolError, TrailerPrefix,
};

/// What the dispatcher does with a frame type that has no body codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFramePolicy {
    /// Log and skip the frame. The header is valid, so the stream stays
    /// aligned.
    #[default]
    Drop,
    /// Surface [`ProtocolError::UnsupportedFrameType`].
    Reject,
}

// ---------------------------------------------------------------------------
// FrameBody
// ---------------------------------------------------------------------------

/// Typed body of a frame, one variant per supported frame type.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    ConnectionRequest(ConnectionFrame),
    ConnectionResponse(ConnectionFrame),
    Data(DataFrame),
    Acknack(AcknackFrame),
    Alert(AlertFrame),
}

impl FrameBody {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::ConnectionRequest(_) => FrameType::ConnectionRequest,
            Self::ConnectionResponse(_) => FrameType::ConnectionResponse,
            Self::Data(_) => FrameType::Data,
            Self::Acknack(_) => FrameType::Acknack,
            Self::Alert(_) => FrameType::Alert,
        }
    }

    /// Decodes `body` with the codec registered for `frame_type`.
    ///
    /// # Errors
    /// [`ProtocolError::UnsupportedFrameType`] for types without a codec,
    /// otherwise whatever the body codec reports.
    pub fn decode(
        frame_type: FrameType,
        body: &[u8],
    ) -> Result<Self, ProtocolError> {
        match frame_type {
            FrameType::ConnectionRequest => {
                ConnectionFrame::decode_body(body).map(Self::ConnectionRequest)
            }
            FrameType::ConnectionResponse => {
                ConnectionFrame::decode_body(body).map(Self::ConnectionResponse)
            }
            FrameType::Data => DataFrame::decode_body(body).map(Self::Data),
            FrameType::Acknack => {
                AcknackFrame::decode_body(body).map(Self::Acknack)
            }
            FrameType::Alert => AlertFrame::decode_body(body).map(Self::Alert),
            FrameType::OptionRequest
            | FrameType::OptionResponse
            | FrameType::CommandRequest
            | FrameType::CommandResponse
            | FrameType::CdOneEncapsulation
            | FrameType::CustomReset
            | FrameType::Unknown(_) => {
                Err(ProtocolError::UnsupportedFrameType(frame_type))
            }
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        match self {
            Self::ConnectionRequest(b) | Self::ConnectionResponse(b) => {
                b.encode_body(buf)
            }
            Self::Data(b) => b.encode_body(buf),
            Self::Acknack(b) => b.encode_body(buf),
            Self::Alert(b) => b.encode_body(buf),
        }
    }

    pub fn body_len(&self) -> usize {
        match self {
            Self::ConnectionRequest(b) | Self::ConnectionResponse(b) => {
                b.body_len()
            }
            Self::Data(b) => b.body_len(),
            Self::Acknack(b) => b.body_len(),
            Self::Alert(b) => b.body_len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A fully decoded frame. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: FrameBody,
    pub trailer: FrameTrailer,
}

impl Frame {
    /// Decodes one complete frame occupying all of `bytes`.
    ///
    /// Returns `Ok(None)` when the frame type has no codec and `policy`
    /// is [`UnknownFramePolicy::Drop`].
    ///
    /// # Errors
    /// Any structural [`ProtocolError`]. The whole frame is discarded.
    pub fn decode(
        bytes: &[u8],
        policy: UnknownFramePolicy,
    ) -> Result<Option<Self>, ProtocolError> {
        let (header, body, trailer) = split_frame(bytes)?;
        let trailer = FrameTrailer::decode(trailer)?;
        dispatch(header, body, trailer, policy)
    }

    /// Encodes the frame, checking that the header agrees with the body.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidField`] if `frame_type` or
    /// `trailer_offset` do not describe the body.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let body_type = self.body.frame_type();
        if self.header.frame_type != body_type {
            return Err(ProtocolError::invalid_field(
                "frameType",
                format!(
                    "header says {} but body is {body_type}",
                    self.header.frame_type
                ),
            ));
        }
        let body_len = self.body.body_len();
        if self.header.body_len() != body_len {
            return Err(ProtocolError::invalid_field(
                "trailerOffset",
                format!(
                    "{} does not cover a {body_len}-byte body",
                    self.header.trailer_offset
                ),
            ));
        }

        let mut buf = Vec::with_capacity(
            FrameHeader::SIZE + body_len + self.trailer.wire_len(),
        );
        self.header.encode(&mut buf)?;
        self.body.encode(&mut buf)?;
        self.trailer.encode(&mut buf)?;
        Ok(buf)
    }

    pub fn frame_type(&self) -> FrameType {
        self.header.frame_type
    }

    pub fn sequence_number(&self) -> i64 {
        self.header.sequence_number
    }

    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.body.body_len() + self.trailer.wire_len()
    }
}

/// Routes a decoded header and raw body to the matching body codec.
///
/// # Errors
/// Body codec errors, or [`ProtocolError::UnsupportedFrameType`] when the
/// type has no codec and `policy` is [`UnknownFramePolicy::Reject`].
pub fn dispatch(
    header: FrameHeader,
    body: &[u8],
    trailer: FrameTrailer,
    policy: UnknownFramePolicy,
) -> Result<Option<Frame>, ProtocolError> {
    match FrameBody::decode(header.frame_type, body) {
        Ok(body) => Ok(Some(Frame {
            header,
            body,
            trailer,
        })),
        Err(ProtocolError::UnsupportedFrameType(frame_type))
            if policy == UnknownFramePolicy::Drop =>
        {
            tracing::warn!(
                %frame_type,
                seq = header.sequence_number,
                creator = %header.frame_creator,
                "dropping frame without a body codec"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Splits a complete frame into its decoded header, raw body and raw
/// trailer.
///
/// # Errors
/// - [`ProtocolError::TruncatedHeader`] / [`ProtocolError::InvalidHeader`]
///   from the header.
/// - [`ProtocolError::TruncatedFrame`] if `bytes` stops before the end of
///   the trailer, or runs past it.
pub fn split_frame(
    bytes: &[u8],
) -> Result<(FrameHeader, &[u8], &[u8]), ProtocolError> {
    let header = FrameHeader::decode(bytes)?;
    let trailer_offset = FrameHeader::SIZE + header.body_len();
    let prefix_end = trailer_offset + TrailerPrefix::SIZE;
    if bytes.len() < prefix_end {
        return Err(ProtocolError::TruncatedFrame {
            needed: trailer_offset + FrameTrailer::MIN_SIZE,
            available: bytes.len(),
        });
    }
    let prefix = TrailerPrefix::decode(&bytes[trailer_offset..prefix_end])?;
    let frame_len = trailer_offset + prefix.trailer_len();
    if bytes.len() != frame_len {
        return Err(ProtocolError::TruncatedFrame {
            needed: frame_len,
            available: bytes.len(),
        });
    }
    Ok((
        header,
        &bytes[FrameHeader::SIZE..trailer_offset],
        &bytes[trailer_offset..],
    ))
}

// ---------------------------------------------------------------------------
// RawFrame
// ---------------------------------------------------------------------------

/// The bytes of exactly one frame, as extracted from a stream.
///
/// Only the header has been decoded; the body is decoded on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    header: FrameHeader,
    bytes: Vec<u8>,
}

impl RawFrame {
    /// # Errors
    /// The same as [`split_frame`].
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ProtocolError> {
        let (header, _, _) = split_frame(&bytes)?;
        Ok(Self { header, bytes })
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.bytes[FrameHeader::SIZE..self.trailer_start()]
    }

    pub fn trailer_bytes(&self) -> &[u8] {
        &self.bytes[self.trailer_start()..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Decodes the trailer and dispatches the body.
    pub fn decode(
        &self,
        policy: UnknownFramePolicy,
    ) -> Result<Option<Frame>, ProtocolError> {
        let trailer = FrameTrailer::decode(self.trailer_bytes())?;
        dispatch(self.header.clone(), self.body(), trailer, policy)
    }

    fn trailer_start(&self) -> usize {
        FrameHeader::SIZE + self.header.body_len()
    }
}
