//! Retained copies of sent data frames, for answering acknacks.

use std::collections::BTreeMap;
use std::sync::Arc;

use cd11_acknack::{FrameSetKey, GapTracker, RetransmitRequest};

/// Bounded store of encoded data frames for one frame set.
///
/// Every pushed frame is recorded in the tracker's send window; evicting
/// the oldest frame releases it there, so later acknacks asking for it
/// come back as unrecoverable instead of scheduled.
#[derive(Debug)]
pub struct SendBuffer {
    frame_set: FrameSetKey,
    capacity: usize,
    frames: BTreeMap<i64, Vec<u8>>,
    tracker: Arc<GapTracker>,
}

impl SendBuffer {
    pub fn new(
        frame_set: FrameSetKey,
        capacity: usize,
        tracker: Arc<GapTracker>,
    ) -> Self {
        Self {
            frame_set,
            capacity: capacity.max(1),
            frames: BTreeMap::new(),
            tracker,
        }
    }

    pub fn frame_set(&self) -> &FrameSetKey {
        &self.frame_set
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Retains the encoded frame sent as `seq`, evicting the oldest
    /// frames past capacity.
    pub fn push(&mut self, seq: i64, bytes: Vec<u8>) {
        self.frames.insert(seq, bytes);
        self.tracker.record_sent(&self.frame_set, seq);
        let mut released = None;
        while self.frames.len() > self.capacity {
            released = self.frames.pop_first().map(|(seq, _)| seq);
        }
        if let Some(seq) = released {
            self.tracker.release_through(&self.frame_set, seq);
            tracing::trace!(frame_set = %self.frame_set, seq, "released sent frames");
        }
    }

    pub fn get(&self, seq: i64) -> Option<&[u8]> {
        self.frames.get(&seq).map(Vec::as_slice)
    }

    /// The retained frames covering `request.scheduled`, in sequence
    /// order within each range.
    pub fn resolve<'a>(
        &'a self,
        request: &'a RetransmitRequest,
    ) -> impl Iterator<Item = (i64, &'a [u8])> + 'a {
        request.scheduled.iter().flat_map(move |range| {
            self.frames
                .range(range.start..=range.end)
                .map(|(&seq, bytes)| (seq, bytes.as_slice()))
        })
    }
}
