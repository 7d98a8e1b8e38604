use std::fmt;

use cd11_protocol::{AcknackFrame, FrameHeader};
use serde::{Deserialize, Serialize};

use crate::AcknackError;

/// Identifies one creator/destination frame set.
///
/// Built from a header as `"creator:destination"`, which always fits the
/// acknack's 20-character `framesetAcked` field. Names taken from inbound
/// acknacks are used verbatim.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FrameSetKey(String);

impl FrameSetKey {
    /// Validates an explicit frame-set name.
    ///
    /// # Errors
    /// [`AcknackError::InvalidFrameSet`] if the name is empty, longer than
    /// 20 characters, or not Latin-1.
    pub fn new(name: impl Into<String>) -> Result<Self, AcknackError> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("empty")
        } else if name.chars().count() > AcknackFrame::FRAMESET_LEN {
            Some("longer than 20 characters")
        } else if name.chars().any(|c| u32::from(c) > 0xFF) {
            Some("not Latin-1")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(AcknackError::InvalidFrameSet { name, reason }),
            None => Ok(Self(name)),
        }
    }

    pub fn from_parts(creator: &str, destination: &str) -> Self {
        Self(format!("{creator}:{destination}"))
    }

    /// The frame set a received frame belongs to.
    pub fn from_header(header: &FrameHeader) -> Self {
        Self::from_parts(&header.frame_creator, &header.frame_destination)
    }

    /// The frame set an inbound acknack refers to.
    pub fn from_acknack(acknack: &AcknackFrame) -> Self {
        Self(acknack.frameset_acked.clone())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
