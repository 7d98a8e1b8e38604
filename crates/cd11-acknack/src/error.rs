//! Error types for gap tracking.

/// Errors that can occur while tracking or restoring gap state.
///
/// Unrecoverable retransmit ranges are not errors; they are reported inside
/// a [`RetransmitRequest`](crate::RetransmitRequest).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcknackError {
    /// A frame-set name does not fit the 20-character `framesetAcked` field.
    #[error("invalid frame set name {name:?}: {reason}")]
    InvalidFrameSet { name: String, reason: &'static str },

    /// A persisted snapshot violates the gap list's ordering rules.
    #[error("invalid snapshot for frame set {frame_set}: {reason}")]
    InvalidSnapshot { frame_set: String, reason: String },
}
