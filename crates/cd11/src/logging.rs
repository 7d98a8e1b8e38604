//! Tracing subscriber setup for binaries. Library code only emits events.

use tracing_subscriber::EnvFilter;

use crate::Cd11Error;

/// Installs a formatted subscriber. `RUST_LOG` wins over `default_filter`.
///
/// # Errors
/// [`Cd11Error::Logging`] if the filter is malformed or a global
/// subscriber is already installed.
pub fn init(default_filter: &str) -> Result<(), Cd11Error> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| Cd11Error::Logging(e.to_string()))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| Cd11Error::Logging(e.to_string()))
}
