//! Receiver configuration, loaded from TOML.

use std::path::Path;
use std::time::Duration;

use cd11_acknack::GapTrackerConfig;
use cd11_protocol::{FrameFactory, FrameHeader, UnknownFramePolicy};
use cd11_transport::ReaderConfig;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Everything a receiver needs, passed explicitly to the components that
/// use it.
///
/// Missing keys take their defaults, so a config file only lists what it
/// overrides:
///
/// ```toml
/// listen_address = "0.0.0.0:8100"
/// frame_creator = "IDC"
/// acknack_interval_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub listen_address: String,
    /// Creator name stamped on outbound frames (acknacks).
    pub frame_creator: String,
    pub frame_destination: String,
    pub auth_key_identifier: i32,
    /// How long one read waits before the receiver checks its timers.
    pub read_timeout_ms: u64,
    pub acknack_interval_secs: u64,
    /// Upper bound of the random delay added to each acknack interval.
    pub acknack_jitter_ms: u64,
    pub unknown_frame_policy: UnknownFramePolicy,
    pub max_frame_len: usize,
    pub gap_expiry_secs: Option<u64>,
    /// Data frames retained per frame set for retransmission.
    pub send_buffer_capacity: usize,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8100".to_string(),
            frame_creator: "IDC".to_string(),
            frame_destination: "0".to_string(),
            auth_key_identifier: 0,
            read_timeout_ms: 1_000,
            acknack_interval_secs: 60,
            acknack_jitter_ms: 500,
            unknown_frame_policy: UnknownFramePolicy::Drop,
            max_frame_len: ReaderConfig::default().max_frame_len,
            gap_expiry_secs: None,
            send_buffer_capacity: 10_000,
            log_filter: "info".to_string(),
        }
    }
}

impl ReceiverConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, name) in [
            ("frame_creator", &self.frame_creator),
            ("frame_destination", &self.frame_destination),
        ] {
            if name.chars().count() > FrameHeader::NAME_LEN {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{name:?} is longer than 8 characters"),
                });
            }
        }
        if self.acknack_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "acknack_interval_secs",
                reason: "must be positive".into(),
            });
        }
        if self.max_frame_len < FrameHeader::SIZE {
            return Err(ConfigError::Invalid {
                field: "max_frame_len",
                reason: format!("must be at least {}", FrameHeader::SIZE),
            });
        }
        Ok(())
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            max_frame_len: self.max_frame_len,
            ..ReaderConfig::default()
        }
    }

    pub fn tracker_config(&self) -> GapTrackerConfig {
        GapTrackerConfig {
            gap_expiry_secs: self.gap_expiry_secs,
        }
    }

    pub fn factory(&self) -> FrameFactory {
        FrameFactory::new(
            self.frame_creator.clone(),
            self.frame_destination.clone(),
            self.auth_key_identifier,
        )
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn acknack_interval(&self) -> Duration {
        Duration::from_secs(self.acknack_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_fills_missing_keys_with_defaults() {
        let config = ReceiverConfig::from_toml(
            r#"
            listen_address = "127.0.0.1:9000"
            unknown_frame_policy = "reject"
            gap_expiry_secs = 600
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:9000");
        assert_eq!(config.unknown_frame_policy, UnknownFramePolicy::Reject);
        assert_eq!(config.tracker_config().gap_expiry_secs, Some(600));
        assert_eq!(config.acknack_interval_secs, 60);
    }

    #[test]
    fn test_from_toml_rejects_wide_creator() {
        let err = ReceiverConfig::from_toml(r#"frame_creator = "TOOLONGNAME""#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "frame_creator", .. }
        ));
    }

    #[test]
    fn test_from_toml_rejects_unknown_policy() {
        let err = ReceiverConfig::from_toml(r#"unknown_frame_policy = "ignore""#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = ReceiverConfig {
            gap_expiry_secs: Some(30),
            ..ReceiverConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(ReceiverConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = ReceiverConfig::load("/nonexistent/cd11.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cd11.toml"));
    }
}
