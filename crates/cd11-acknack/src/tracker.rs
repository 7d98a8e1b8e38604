//! Per-frame-set gap tracking on the receive side and retransmit planning
//! on the send side.
//!
//! # Concurrency
//!
//! The table of frame sets sits behind an `RwLock` that is held only long
//! enough to find or insert an entry; each frame set's [`GapList`] has its
//! own `Mutex`, so updates for different frame sets do not block each
//! other.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use cd11_protocol::{AcknackFrame, Frame, FrameType, GapRange};
use serde::{Deserialize, Serialize};

use crate::{AcknackError, FrameSetKey, GapList, GapListSnapshot, Observation};

/// Gap tracker tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapTrackerConfig {
    /// Gaps untouched for this long are given up on by
    /// [`GapTracker::expire`]. `None` keeps gaps forever.
    pub gap_expiry_secs: Option<u64>,
}

/// Why a requested range cannot be retransmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrecoverableReason {
    /// Already released from the send buffer.
    Released,
    /// Beyond the highest sequence number ever sent.
    NeverSent,
}

/// A requested range the sender cannot satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrecoverableGap {
    pub range: GapRange,
    pub reason: UnrecoverableReason,
}

/// The sender's response plan for one inbound acknack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetransmitRequest {
    pub frame_set: FrameSetKey,
    /// Ranges to resend, in the order requested.
    pub scheduled: Vec<GapRange>,
    pub unrecoverable: Vec<UnrecoverableGap>,
}

impl RetransmitRequest {
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty() && self.unrecoverable.is_empty()
    }

    /// Total sequence numbers scheduled for retransmission.
    pub fn scheduled_len(&self) -> u64 {
        self.scheduled
            .iter()
            .fold(0u64, |acc, range| acc.saturating_add(range.len()))
    }
}

/// Range of sequence numbers the sender still holds, `[oldest, newest]`.
/// Empty once everything sent has been released (`oldest > newest`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SendWindow {
    oldest: i64,
    newest: i64,
}

impl SendWindow {
    /// Splits `range` into its released, retained and unsent parts.
    fn partition(
        &self,
        range: GapRange,
    ) -> (Option<GapRange>, Option<GapRange>, Option<GapRange>) {
        let released = self
            .oldest
            .checked_sub(1)
            .and_then(|hi| intersect(range, i64::MIN, hi));
        let retained = intersect(range, self.oldest, self.newest);
        let unsent = self
            .newest
            .checked_add(1)
            .and_then(|lo| intersect(range, lo.max(self.oldest), i64::MAX));
        (released, retained, unsent)
    }
}

fn intersect(range: GapRange, lo: i64, hi: i64) -> Option<GapRange> {
    let clipped = GapRange::new(range.start.max(lo), range.end.min(hi));
    clipped.is_valid().then_some(clipped)
}

/// Serializable receive-side state of every frame set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub frame_sets: BTreeMap<FrameSetKey, GapListSnapshot>,
}

/// Tracks gaps per frame set and plans retransmissions.
#[derive(Debug, Default)]
pub struct GapTracker {
    config: GapTrackerConfig,
    received: RwLock<HashMap<FrameSetKey, Arc<Mutex<GapList>>>>,
    sent: Mutex<HashMap<FrameSetKey, SendWindow>>,
}

impl GapTracker {
    pub fn new(config: GapTrackerConfig) -> Self {
        Self {
            config,
            received: RwLock::default(),
            sent: Mutex::default(),
        }
    }

    pub fn config(&self) -> &GapTrackerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Receive side
    // -----------------------------------------------------------------------

    /// Feeds a received frame to its frame set's gap list.
    ///
    /// Only data frames carry tracked sequence numbers; anything else
    /// returns `None` and changes nothing.
    pub fn observe(&self, frame: &Frame) -> Option<Observation> {
        if frame.frame_type() != FrameType::Data {
            return None;
        }
        let key = FrameSetKey::from_header(&frame.header);
        Some(self.observe_sequence(&key, frame.sequence_number()))
    }

    /// Records `seq` as received for `key`, starting tracking on first use.
    pub fn observe_sequence(&self, key: &FrameSetKey, seq: i64) -> Observation {
        let now = Instant::now();
        let list = {
            let received = self.received.read().unwrap_or_else(PoisonError::into_inner);
            received.get(key).cloned()
        };
        let Some(list) = list else {
            let mut received =
                self.received.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(list) = received.get(key).cloned() {
                drop(received);
                return observe_locked(&list, key, seq, now);
            }
            received.insert(key.clone(), Arc::new(Mutex::new(GapList::new(seq))));
            tracing::debug!(%key, seq, "frame set tracking started");
            return Observation::InOrder;
        };
        observe_locked(&list, key, seq, now)
    }

    /// Builds the acknack describing `key`'s current gaps.
    ///
    /// A frame set that has seen no data acknowledges the empty range
    /// `lowestSeqNum = 0, highestSeqNum = -1`.
    pub fn build_acknack(&self, key: &FrameSetKey) -> AcknackFrame {
        let (lowest_seq_num, highest_seq_num, gap_ranges) =
            match self.list(key) {
                Some(list) => {
                    let list = list.lock().unwrap_or_else(PoisonError::into_inner);
                    (list.lowest(), list.highest(), list.gaps())
                }
                None => (0, -1, Vec::new()),
            };
        AcknackFrame {
            frameset_acked: key.to_string(),
            lowest_seq_num,
            highest_seq_num,
            gap_ranges,
        }
    }

    /// Frame sets with any receive-side state.
    pub fn frame_sets(&self) -> Vec<FrameSetKey> {
        let received = self.received.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = received.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Marks `range` as received for `key`, e.g. after the sender reported
    /// it unrecoverable. Returns the number of gaps touched.
    pub fn fill_range(&self, key: &FrameSetKey, range: GapRange) -> usize {
        self.list(key).map_or(0, |list| {
            list.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .fill_range(range, Instant::now())
        })
    }

    /// Drops gaps older than the configured expiry, measured from `now`.
    /// Returns the number of gaps dropped across all frame sets.
    pub fn expire(&self, now: Instant) -> usize {
        let Some(cutoff) = self
            .config
            .gap_expiry_secs
            .and_then(|secs| now.checked_sub(Duration::from_secs(secs)))
        else {
            return 0;
        };
        let lists: Vec<_> = {
            let received = self.received.read().unwrap_or_else(PoisonError::into_inner);
            received.iter().map(|(k, l)| (k.clone(), Arc::clone(l))).collect()
        };
        let mut total = 0;
        for (key, list) in lists {
            let removed = list
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove_modified_before(cutoff);
            if removed > 0 {
                tracing::info!(%key, removed, "expired stale gaps");
            }
            total += removed;
        }
        total
    }

    /// Forgets all state for `key`, on both sides.
    pub fn forget(&self, key: &FrameSetKey) {
        self.received
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let received = self.received.read().unwrap_or_else(PoisonError::into_inner);
        let frame_sets = received
            .iter()
            .map(|(key, list)| {
                let list = list.lock().unwrap_or_else(PoisonError::into_inner);
                (key.clone(), list.snapshot())
            })
            .collect();
        TrackerSnapshot { frame_sets }
    }

    /// Replaces receive-side state with `snapshot`. Restored gaps count as
    /// modified now for expiry.
    ///
    /// # Errors
    /// [`AcknackError::InvalidSnapshot`] if any frame set's gaps are out of
    /// order or out of bounds; existing state is left untouched.
    pub fn restore(&self, snapshot: &TrackerSnapshot) -> Result<(), AcknackError> {
        let now = Instant::now();
        let mut restored = HashMap::with_capacity(snapshot.frame_sets.len());
        for (key, list) in &snapshot.frame_sets {
            let list = GapList::restore(list, now).map_err(|reason| {
                AcknackError::InvalidSnapshot {
                    frame_set: key.to_string(),
                    reason,
                }
            })?;
            restored.insert(key.clone(), Arc::new(Mutex::new(list)));
        }
        *self.received.write().unwrap_or_else(PoisonError::into_inner) = restored;
        tracing::info!(frame_sets = snapshot.frame_sets.len(), "gap state restored");
        Ok(())
    }

    fn list(&self, key: &FrameSetKey) -> Option<Arc<Mutex<GapList>>> {
        self.received
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    // -----------------------------------------------------------------------
    // Send side
    // -----------------------------------------------------------------------

    /// Records that `seq` was sent on `key` and is retained for resending.
    pub fn record_sent(&self, key: &FrameSetKey, seq: i64) {
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.entry(key.clone())
            .and_modify(|window| window.newest = window.newest.max(seq))
            .or_insert(SendWindow {
                oldest: seq,
                newest: seq,
            });
    }

    /// Records that everything up to and including `seq` is no longer
    /// retained on `key`.
    pub fn release_through(&self, key: &FrameSetKey, seq: i64) {
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(window) = sent.get_mut(key) {
            let floor = seq.saturating_add(1);
            window.oldest = window.oldest.max(floor);
        }
    }

    /// Plans retransmission of the ranges an inbound acknack reports.
    ///
    /// Without a recorded send window for the frame set, every valid
    /// range is scheduled. Otherwise each range is split: parts inside
    /// the retained window are scheduled, the rest are reported as
    /// [`UnrecoverableGap`]s. Inverted ranges are skipped.
    pub fn apply_acknack(&self, acknack: &AcknackFrame) -> RetransmitRequest {
        let frame_set = FrameSetKey::from_acknack(acknack);
        let window = self
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&frame_set)
            .copied();

        let mut scheduled = Vec::new();
        let mut unrecoverable = Vec::new();
        for &range in &acknack.gap_ranges {
            if !range.is_valid() {
                tracing::warn!(%frame_set, %range, "skipping inverted gap range");
                continue;
            }
            let Some(window) = window else {
                scheduled.push(range);
                continue;
            };
            let (released, retained, unsent) = window.partition(range);
            if let Some(range) = released {
                unrecoverable.push(UnrecoverableGap {
                    range,
                    reason: UnrecoverableReason::Released,
                });
            }
            scheduled.extend(retained);
            if let Some(range) = unsent {
                unrecoverable.push(UnrecoverableGap {
                    range,
                    reason: UnrecoverableReason::NeverSent,
                });
            }
        }

        if !unrecoverable.is_empty() {
            tracing::warn!(
                %frame_set,
                count = unrecoverable.len(),
                "acknack requests unrecoverable ranges"
            );
        }
        tracing::debug!(
            %frame_set,
            scheduled = scheduled.len(),
            "acknack applied"
        );
        RetransmitRequest {
            frame_set,
            scheduled,
            unrecoverable,
        }
    }
}

fn observe_locked(
    list: &Mutex<GapList>,
    key: &FrameSetKey,
    seq: i64,
    now: Instant,
) -> Observation {
    let observation = list
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .observe(seq, now);
    match observation {
        Observation::GapOpened(gap) | Observation::FloorLowered(Some(gap)) => {
            tracing::debug!(%key, seq, %gap, "gap opened");
        }
        Observation::GapFilled => tracing::debug!(%key, seq, "gap filled"),
        _ => {}
    }
    observation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FrameSetKey {
        FrameSetKey::from_parts("STA", "IDC")
    }

    #[test]
    fn test_partition_splits_around_window() {
        let window = SendWindow {
            oldest: 10,
            newest: 20,
        };
        let (released, retained, unsent) = window.partition(GapRange::new(5, 25));
        assert_eq!(released, Some(GapRange::new(5, 9)));
        assert_eq!(retained, Some(GapRange::new(10, 20)));
        assert_eq!(unsent, Some(GapRange::new(21, 25)));
    }

    #[test]
    fn test_partition_empty_window_has_no_retained_part() {
        // Released through 30 after sending up to 20.
        let window = SendWindow {
            oldest: 31,
            newest: 20,
        };
        let (released, retained, unsent) = window.partition(GapRange::new(15, 35));
        assert_eq!(released, Some(GapRange::new(15, 30)));
        assert_eq!(retained, None);
        assert_eq!(unsent, Some(GapRange::new(31, 35)));
    }

    #[test]
    fn test_partition_extreme_window_does_not_overflow() {
        let window = SendWindow {
            oldest: i64::MIN,
            newest: i64::MAX,
        };
        let range = GapRange::new(i64::MIN, i64::MAX);
        assert_eq!(window.partition(range), (None, Some(range), None));
    }

    #[test]
    fn test_observe_sequence_first_frame_starts_tracking() {
        let tracker = GapTracker::default();
        assert_eq!(tracker.observe_sequence(&key(), 7), Observation::InOrder);
        let acknack = tracker.build_acknack(&key());
        assert_eq!((acknack.lowest_seq_num, acknack.highest_seq_num), (7, 7));
        assert!(acknack.gap_ranges.is_empty());
    }

    #[test]
    fn test_record_sent_after_release_keeps_floor() {
        let tracker = GapTracker::default();
        tracker.record_sent(&key(), 1);
        tracker.record_sent(&key(), 10);
        tracker.release_through(&key(), 4);
        let window = tracker.sent.lock().unwrap()[&key()];
        assert_eq!(window, SendWindow { oldest: 5, newest: 10 });
    }
}
