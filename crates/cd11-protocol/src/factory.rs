//! Outbound frame construction.
//!
//! A [`FrameFactory`] holds the sender's identity and produces complete
//! frames whose headers already agree with their bodies. Control frames
//! (acknack, alert, connection) carry sequence number 0; data frames carry
//! the caller's sequence number.

use serde::{Deserialize, Serialize};

use crate::{
    AcknackFrame, AlertFrame, ConnectionFrame, DataFrame, Frame, FrameBody,
    FrameHeader, FrameTrailer, ProtocolError,
};

/// Immutable sender identity used to stamp outbound frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFactory {
    pub frame_creator: String,
    pub frame_destination: String,
    pub auth_key_identifier: i32,
}

impl FrameFactory {
    pub fn new(
        frame_creator: impl Into<String>,
        frame_destination: impl Into<String>,
        auth_key_identifier: i32,
    ) -> Self {
        Self {
            frame_creator: frame_creator.into(),
            frame_destination: frame_destination.into(),
            auth_key_identifier,
        }
    }

    /// Wraps `body` in a header and an unauthenticated trailer.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidField`] if the body length overflows the
    /// header's `trailerOffset`.
    pub fn frame(
        &self,
        body: FrameBody,
        sequence_number: i64,
        series: i32,
    ) -> Result<Frame, ProtocolError> {
        let header = FrameHeader::new(
            body.frame_type(),
            body.body_len(),
            self.frame_creator.clone(),
            self.frame_destination.clone(),
            sequence_number,
            series,
        )?;
        Ok(Frame {
            header,
            body,
            trailer: FrameTrailer::unauthenticated(self.auth_key_identifier),
        })
    }

    pub fn acknack(&self, acknack: AcknackFrame) -> Result<Frame, ProtocolError> {
        self.frame(FrameBody::Acknack(acknack), 0, 0)
    }

    pub fn alert(
        &self,
        message: impl Into<String>,
    ) -> Result<Frame, ProtocolError> {
        self.frame(FrameBody::Alert(AlertFrame::new(message)), 0, 0)
    }

    pub fn connection_request(
        &self,
        request: ConnectionFrame,
    ) -> Result<Frame, ProtocolError> {
        self.frame(FrameBody::ConnectionRequest(request), 0, 0)
    }

    pub fn connection_response(
        &self,
        response: ConnectionFrame,
    ) -> Result<Frame, ProtocolError> {
        self.frame(FrameBody::ConnectionResponse(response), 0, 0)
    }

    pub fn data(
        &self,
        data: DataFrame,
        sequence_number: i64,
        series: i32,
    ) -> Result<Frame, ProtocolError> {
        self.frame(FrameBody::Data(data), sequence_number, series)
    }
}
