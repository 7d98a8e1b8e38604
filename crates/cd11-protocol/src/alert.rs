//! Alert body: a length-prefixed operator message.

use bytes::BufMut;

use crate::wire::{self, FieldReader};
use crate::{BodyCodec, ProtocolError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertFrame {
    pub message: String,
}

impl AlertFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl BodyCodec for AlertFrame {
    fn decode_body(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = FieldReader::new(body);
        let size = reader.read_len("size")?;
        let message = reader.read_raw_text("message", size)?;
        reader.finish("message")?;
        Ok(Self { message })
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let message = wire::latin1_bytes("message", &self.message)?;
        wire::put_len(buf, "size", message.len())?;
        buf.put_slice(&message);
        Ok(())
    }

    fn body_len(&self) -> usize {
        4 + self.message.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_body_prefixes_size() {
        let bytes = AlertFrame::new("shutdown").to_body_bytes().unwrap();
        assert_eq!(&bytes[..4], &8i32.to_be_bytes());
        assert_eq!(&bytes[4..], b"shutdown");
    }

    #[test]
    fn test_decode_body_keeps_message_verbatim() {
        let alert = AlertFrame::new("  padded message  ");
        let bytes = alert.to_body_bytes().unwrap();
        assert_eq!(bytes.len(), alert.body_len());
        assert_eq!(AlertFrame::decode_body(&bytes).unwrap(), alert);
    }

    #[test]
    fn test_decode_body_size_past_end_is_buffer_underflow() {
        let mut bytes = 10i32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"short");
        assert!(matches!(
            AlertFrame::decode_body(&bytes),
            Err(ProtocolError::BufferUnderflow { field: "message", .. })
        ));
    }
}
