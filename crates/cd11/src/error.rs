//! Unified error type for the CD-1.1 receiver.

use std::path::PathBuf;

use cd11_acknack::AcknackError;
use cd11_protocol::ProtocolError;
use cd11_transport::TransportError;

/// Failure loading a [`ReceiverConfig`](crate::ReceiverConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but cannot be used.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum Cd11Error {
    /// Reading, writing or accepting on a stream failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding a frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Gap tracking state was invalid.
    #[error(transparent)]
    Acknack(#[from] AcknackError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The logging subscriber could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}
