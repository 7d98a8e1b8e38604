use cd11_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The deadline fired before a complete frame arrived.
    #[error("read timed out after {bytes_read} bytes of the frame")]
    ReadTimeout {
        /// Bytes of the partial frame already consumed from the stream.
        bytes_read: usize,
    },

    /// The stream ended before a full header arrived.
    #[error("stream ended after {available} of 36 header bytes")]
    TruncatedHeader { available: usize },

    /// The stream ended after the header but before the frame's end.
    #[error("stream ended after {available} of {needed} frame bytes")]
    TruncatedFrame { needed: usize, available: usize },

    /// The header declares a frame longer than the reader accepts.
    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The frame's length fields are impossible, so its end is unknown.
    #[error("invalid framing: {0}")]
    InvalidFraming(#[source] ProtocolError),

    /// A complete frame was read but its content did not decode.
    #[error(transparent)]
    Decode(#[from] ProtocolError),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

impl TransportError {
    /// True if part of a frame was consumed, so the next byte on the
    /// stream is not a frame boundary. The caller should reconnect.
    pub fn is_stream_desynchronized(&self) -> bool {
        match self {
            Self::ReadTimeout { bytes_read } => *bytes_read > 0,
            Self::TruncatedHeader { available } => *available > 0,
            Self::Decode(_) => false,
            Self::ConnectionClosed(_) | Self::AcceptFailed(_) => false,
            Self::TruncatedFrame { .. }
            | Self::FrameTooLarge { .. }
            | Self::InvalidFraming(_)
            | Self::SendFailed(_)
            | Self::ReceiveFailed(_) => true,
        }
    }

    /// True if the peer closed the stream between frames.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, Self::TruncatedHeader { available: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_timeout_keeps_stream_aligned() {
        assert!(!TransportError::ReadTimeout { bytes_read: 0 }
            .is_stream_desynchronized());
        assert!(TransportError::ReadTimeout { bytes_read: 7 }
            .is_stream_desynchronized());
    }

    #[test]
    fn test_decode_error_keeps_stream_aligned() {
        let err = TransportError::from(ProtocolError::MalformedGapList {
            gap_count: 1,
            remaining: 0,
        });
        assert!(!err.is_stream_desynchronized());
        assert!(err.to_string().contains("malformed gap list"));
    }

    #[test]
    fn test_clean_close_only_at_frame_boundary() {
        assert!(TransportError::TruncatedHeader { available: 0 }.is_clean_close());
        assert!(!TransportError::TruncatedHeader { available: 3 }.is_clean_close());
    }
}
