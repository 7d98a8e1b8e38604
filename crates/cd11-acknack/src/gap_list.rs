//! The interval set of missing sequence numbers for one frame set.

use std::collections::BTreeMap;
use std::time::Instant;

use cd11_protocol::GapRange;
use serde::{Deserialize, Serialize};

/// What a single observed sequence number did to a [`GapList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Immediate successor of the highest sequence seen.
    InOrder,
    /// Jumped ahead; the skipped numbers are now a gap.
    GapOpened(GapRange),
    /// Retransmission that shrank, split or removed a gap.
    GapFilled,
    /// Lower than anything seen before; the floor moved down, possibly
    /// opening a gap between the new and old floor.
    FloorLowered(Option<GapRange>),
    /// Already received.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Gap {
    end: i64,
    modified: Instant,
}

/// Sorted, non-overlapping gaps within `[lowest, highest]`.
///
/// `lowest` and `highest` are always sequence numbers that were received,
/// so every gap lies strictly inside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapList {
    lowest: i64,
    highest: i64,
    /// Keyed by gap start.
    gaps: BTreeMap<i64, Gap>,
}

impl GapList {
    /// Starts tracking at the first received sequence number.
    pub fn new(first: i64) -> Self {
        Self {
            lowest: first,
            highest: first,
            gaps: BTreeMap::new(),
        }
    }

    pub fn lowest(&self) -> i64 {
        self.lowest
    }

    pub fn highest(&self) -> i64 {
        self.highest
    }

    pub fn gap_count(&self) -> usize {
        self.gaps.len()
    }

    /// Inclusive gap ranges in ascending order.
    pub fn gaps(&self) -> Vec<GapRange> {
        self.gaps
            .iter()
            .map(|(&start, gap)| GapRange::new(start, gap.end))
            .collect()
    }

    /// True if `seq` lies inside a recorded gap.
    pub fn is_missing(&self, seq: i64) -> bool {
        self.gap_containing(seq).is_some()
    }

    pub fn observe(&mut self, seq: i64, now: Instant) -> Observation {
        if seq > self.highest {
            let previous = self.highest;
            self.highest = seq;
            // `previous < seq` so neither bound overflows.
            if previous + 1 == seq {
                return Observation::InOrder;
            }
            let gap = GapRange::new(previous + 1, seq - 1);
            self.insert(gap, now);
            return Observation::GapOpened(gap);
        }

        if seq < self.lowest {
            let previous = self.lowest;
            self.lowest = seq;
            let gap = (seq + 1 < previous)
                .then(|| GapRange::new(seq + 1, previous - 1));
            if let Some(gap) = gap {
                self.insert(gap, now);
            }
            return Observation::FloorLowered(gap);
        }

        if self.gap_containing(seq).is_some() {
            self.fill_range(GapRange::single(seq), now);
            Observation::GapFilled
        } else {
            Observation::Duplicate
        }
    }

    /// Marks every sequence number in `range` as received.
    ///
    /// Gaps partly covered are trimmed or split; the surviving parts get
    /// `now` as their modification time. The tracked bounds do not move.
    /// Returns the number of gaps touched.
    pub fn fill_range(&mut self, range: GapRange, now: Instant) -> usize {
        if !range.is_valid() {
            return 0;
        }
        let overlapping: Vec<(i64, i64)> = self
            .gaps
            .range(..=range.end)
            .rev()
            .take_while(|(_, gap)| gap.end >= range.start)
            .map(|(&start, gap)| (start, gap.end))
            .collect();

        for &(start, end) in &overlapping {
            self.gaps.remove(&start);
            if start < range.start {
                self.insert(GapRange::new(start, range.start - 1), now);
            }
            if end > range.end {
                self.insert(GapRange::new(range.end + 1, end), now);
            }
        }
        overlapping.len()
    }

    /// Drops gaps last modified before `cutoff`. Returns how many.
    pub fn remove_modified_before(&mut self, cutoff: Instant) -> usize {
        let before = self.gaps.len();
        self.gaps.retain(|_, gap| gap.modified >= cutoff);
        before - self.gaps.len()
    }

    pub fn snapshot(&self) -> GapListSnapshot {
        GapListSnapshot {
            lowest: self.lowest,
            highest: self.highest,
            gaps: self.gaps(),
        }
    }

    /// Rebuilds a gap list, stamping every gap with `now`.
    ///
    /// # Errors
    /// A description of the first violated ordering rule.
    pub fn restore(
        snapshot: &GapListSnapshot,
        now: Instant,
    ) -> Result<Self, String> {
        if snapshot.lowest > snapshot.highest {
            return Err(format!(
                "lowest {} above highest {}",
                snapshot.lowest, snapshot.highest
            ));
        }
        let mut floor = snapshot.lowest;
        let mut list = Self {
            lowest: snapshot.lowest,
            highest: snapshot.highest,
            gaps: BTreeMap::new(),
        };
        for gap in &snapshot.gaps {
            if !gap.is_valid() {
                return Err(format!("inverted gap {gap}"));
            }
            if gap.start <= floor || gap.end >= snapshot.highest {
                return Err(format!("gap {gap} out of order or out of bounds"));
            }
            list.insert(*gap, now);
            floor = gap.end;
        }
        Ok(list)
    }

    fn insert(&mut self, gap: GapRange, now: Instant) {
        self.gaps.insert(
            gap.start,
            Gap {
                end: gap.end,
                modified: now,
            },
        );
    }

    fn gap_containing(&self, seq: i64) -> Option<GapRange> {
        self.gaps
            .range(..=seq)
            .next_back()
            .filter(|(_, gap)| gap.end >= seq)
            .map(|(&start, gap)| GapRange::new(start, gap.end))
    }
}

/// Serializable form of a [`GapList`]; modification times are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapListSnapshot {
    pub lowest: i64,
    pub highest: i64,
    pub gaps: Vec<GapRange>,
}
