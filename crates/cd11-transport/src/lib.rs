//! Transport layer for CD-1.1 frame streams.
//!
//! Provides the deadline-bounded [`FrameReader`], the [`FrameWriter`], and
//! a TCP [`Transport`]. Reconnection policy is left to callers: errors say
//! whether the stream is still aligned on a frame boundary
//! ([`TransportError::is_stream_desynchronized`]).

#![allow(async_fn_in_trait)]

pub mod deadline;
mod error;
mod reader;
mod tcp;

pub use error::TransportError;
pub use reader::{FrameReader, FrameWriter, ReaderConfig};
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Send + 'static;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
        assert_eq!(id.into_inner(), 7);
    }
}
