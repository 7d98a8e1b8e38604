//! The frame type tag carried in every header.

use std::fmt;

/// Type tag of a CD-1.1 frame.
///
/// Codes not listed here are preserved as [`FrameType::Unknown`] so a
/// reader can skip frames it does not understand without losing its place
/// in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    ConnectionRequest,
    ConnectionResponse,
    OptionRequest,
    OptionResponse,
    Data,
    Acknack,
    Alert,
    CommandRequest,
    CommandResponse,
    /// A CD-1 frame tunnelled inside CD-1.1.
    CdOneEncapsulation,
    CustomReset,
    Unknown(i32),
}

impl FrameType {
    /// The numeric code written to the header.
    pub fn code(self) -> i32 {
        match self {
            Self::ConnectionRequest => 1,
            Self::ConnectionResponse => 2,
            Self::OptionRequest => 3,
            Self::OptionResponse => 4,
            Self::Data => 5,
            Self::Acknack => 6,
            Self::Alert => 7,
            Self::CommandRequest => 8,
            Self::CommandResponse => 9,
            Self::CdOneEncapsulation => 13,
            Self::CustomReset => 26,
            Self::Unknown(code) => code,
        }
    }

    /// True for types this crate can decode into a typed body.
    pub fn has_body_codec(self) -> bool {
        matches!(
            self,
            Self::ConnectionRequest
                | Self::ConnectionResponse
                | Self::Data
                | Self::Acknack
                | Self::Alert
        )
    }
}

impl From<i32> for FrameType {
    fn from(code: i32) -> Self {
        match code {
            1 => Self::ConnectionRequest,
            2 => Self::ConnectionResponse,
            3 => Self::OptionRequest,
            4 => Self::OptionResponse,
            5 => Self::Data,
            6 => Self::Acknack,
            7 => Self::Alert,
            8 => Self::CommandRequest,
            9 => Self::CommandResponse,
            13 => Self::CdOneEncapsulation,
            26 => Self::CustomReset,
            other => Self::Unknown(other),
        }
    }
}

impl From<FrameType> for i32 {
    fn from(frame_type: FrameType) -> Self {
        frame_type.code()
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({code})"),
            known => write!(f, "{known:?}({})", known.code()),
        }
    }
}
