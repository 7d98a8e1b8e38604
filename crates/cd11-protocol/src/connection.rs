//! Connection request and response bodies.
//!
//! Both directions share one 32-byte layout: protocol version, the
//! sender's name and role, and a primary plus failover endpoint.

use std::net::{Ipv4Addr, SocketAddrV4};

use bytes::BufMut;

use crate::wire::{self, FieldReader};
use crate::{BodyCodec, ProtocolError};

/// Body of a `ConnectionRequest` or `ConnectionResponse` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFrame {
    pub major_version: u16,
    pub minor_version: u16,
    /// Station name for a request, responder name for a response.
    pub station_name: String,
    /// Station type for a request (e.g. `IMS`), responder type otherwise.
    pub station_type: String,
    /// Service type, e.g. `TCP`.
    pub service_type: String,
    pub primary: SocketAddrV4,
    pub secondary: SocketAddrV4,
}

impl ConnectionFrame {
    pub const SIZE: usize = 32;
    pub const NAME_LEN: usize = 8;
    pub const TYPE_LEN: usize = 4;

    /// A frame with no failover endpoint (`0.0.0.0:0`).
    pub fn new(
        major_version: u16,
        minor_version: u16,
        station_name: impl Into<String>,
        station_type: impl Into<String>,
        service_type: impl Into<String>,
        primary: SocketAddrV4,
    ) -> Self {
        Self {
            major_version,
            minor_version,
            station_name: station_name.into(),
            station_type: station_type.into(),
            service_type: service_type.into(),
            primary,
            secondary: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
        }
    }

    /// The failover endpoint, if one was offered.
    pub fn failover(&self) -> Option<SocketAddrV4> {
        (!self.secondary.ip().is_unspecified()).then_some(self.secondary)
    }
}

fn read_endpoint(
    reader: &mut FieldReader<'_>,
    ip_field: &'static str,
    port_field: &'static str,
) -> Result<SocketAddrV4, ProtocolError> {
    let ip = Ipv4Addr::from(reader.read_u32(ip_field)?);
    Ok(SocketAddrV4::new(ip, reader.read_u16(port_field)?))
}

fn put_endpoint(buf: &mut Vec<u8>, endpoint: SocketAddrV4) {
    buf.put_u32(u32::from(*endpoint.ip()));
    buf.put_u16(endpoint.port());
}

impl BodyCodec for ConnectionFrame {
    fn decode_body(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = FieldReader::new(body);
        reader.require("connection", Self::SIZE)?;
        let frame = Self {
            major_version: reader.read_u16("majorVersion")?,
            minor_version: reader.read_u16("minorVersion")?,
            station_name: reader.read_text("stationName", Self::NAME_LEN)?,
            station_type: reader.read_text("stationType", Self::TYPE_LEN)?,
            service_type: reader.read_text("serviceType", Self::TYPE_LEN)?,
            primary: read_endpoint(&mut reader, "primaryIp", "primaryPort")?,
            secondary: read_endpoint(
                &mut reader,
                "secondaryIp",
                "secondaryPort",
            )?,
        };
        reader.finish("connection")?;
        Ok(frame)
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        buf.put_u16(self.major_version);
        buf.put_u16(self.minor_version);
        wire::put_text(buf, "stationName", &self.station_name, Self::NAME_LEN)?;
        wire::put_text(buf, "stationType", &self.station_type, Self::TYPE_LEN)?;
        wire::put_text(buf, "serviceType", &self.service_type, Self::TYPE_LEN)?;
        put_endpoint(buf, self.primary);
        put_endpoint(buf, self.secondary);
        Ok(())
    }

    fn body_len(&self) -> usize {
        Self::SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionFrame {
        ConnectionFrame {
            major_version: 1,
            minor_version: 1,
            station_name: "H04N".into(),
            station_type: "IDC".into(),
            service_type: "TCP".into(),
            primary: SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 1), 8100),
            secondary: SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 8101),
        }
    }

    #[test]
    fn test_encode_body_is_thirty_two_bytes() {
        let bytes = sample().to_body_bytes().unwrap();
        assert_eq!(bytes.len(), ConnectionFrame::SIZE);
        assert_eq!(&bytes[4..12], b"H04N    ");
        assert_eq!(&bytes[20..24], &[192, 168, 0, 1]);
        assert_eq!(&bytes[24..26], &8100u16.to_be_bytes());
    }

    #[test]
    fn test_decode_body_reads_encoded_fields() {
        let frame = sample();
        let decoded =
            ConnectionFrame::decode_body(&frame.to_body_bytes().unwrap())
                .unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.failover(), Some(frame.secondary));
    }

    #[test]
    fn test_decode_body_short_is_buffer_underflow() {
        let bytes = sample().to_body_bytes().unwrap();
        assert!(matches!(
            ConnectionFrame::decode_body(&bytes[..31]),
            Err(ProtocolError::BufferUnderflow { needed: 32, .. })
        ));
    }

    #[test]
    fn test_new_has_no_failover() {
        let frame = ConnectionFrame::new(
            1,
            0,
            "STA",
            "IMS",
            "TCP",
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9000),
        );
        assert_eq!(frame.failover(), None);
    }

    #[test]
    fn test_encode_body_overlong_name_is_rejected() {
        let mut frame = sample();
        frame.service_type = "UDP/IP".into();
        assert!(matches!(
            frame.to_body_bytes(),
            Err(ProtocolError::InvalidField { field: "serviceType", .. })
        ));
    }
}
