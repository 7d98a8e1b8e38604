//! Sequence-gap tracking for CD-1.1 frame sets.
//!
//! The receive side observes data frames per frame set, keeps the missing
//! sequence numbers as sorted inclusive ranges, and builds outbound
//! [`AcknackFrame`](cd11_protocol::AcknackFrame)s from them. The send side
//! applies inbound acknacks against what it still retains and produces a
//! [`RetransmitRequest`].
//!
//! ```text
//! Data frame ──→ GapTracker::observe ──→ GapList (per frame set)
//!                                            │
//!                         build_acknack ←────┘
//!
//! Acknack ──→ GapTracker::apply_acknack ──→ RetransmitRequest
//!                       ↑                     ├─ scheduled
//!          record_sent / release_through      └─ unrecoverable
//! ```

mod error;
mod frame_set;
mod gap_list;
mod tracker;

pub use error::AcknackError;
pub use frame_set::FrameSetKey;
pub use gap_list::{GapList, GapListSnapshot, Observation};
pub use tracker::{
    GapTracker, GapTrackerConfig, RetransmitRequest, TrackerSnapshot,
    UnrecoverableGap, UnrecoverableReason,
};
