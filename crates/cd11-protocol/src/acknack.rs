//! Acknack body: the receiver's view of which sequence ranges are missing.

use std::fmt;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::wire::{self, FieldReader};
use crate::{BodyCodec, ProtocolError};

/// An inclusive range of sequence numbers that was never received.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
pub struct GapRange {
    pub start: i64,
    pub end: i64,
}

impl GapRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn single(seq: i64) -> Self {
        Self::new(seq, seq)
    }

    /// False for inverted ranges (`start > end`).
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    pub fn contains(&self, seq: i64) -> bool {
        (self.start..=self.end).contains(&seq)
    }

    /// Number of sequence numbers covered; zero for inverted ranges.
    pub fn len(&self) -> u64 {
        if self.is_valid() {
            self.end.abs_diff(self.start).saturating_add(1)
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for GapRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Body of an `Acknack` frame.
///
/// Decoding does not enforce the ordering invariants, since inbound
/// acknacks come from remote peers; use
/// [`is_well_ordered`](Self::is_well_ordered) to check them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcknackFrame {
    /// Identifier of the frame set being acknowledged.
    pub frameset_acked: String,
    pub lowest_seq_num: i64,
    pub highest_seq_num: i64,
    pub gap_ranges: Vec<GapRange>,
}

impl AcknackFrame {
    pub const FRAMESET_LEN: usize = 20;
    const FIXED_LEN: usize = Self::FRAMESET_LEN + 8 + 8 + 4;

    pub fn gap_count(&self) -> usize {
        self.gap_ranges.len()
    }

    /// True if every gap is valid, gaps are sorted ascending without
    /// overlap, and `lowest_seq_num <= highest_seq_num`.
    pub fn is_well_ordered(&self) -> bool {
        self.lowest_seq_num <= self.highest_seq_num
            && self.gap_ranges.iter().all(GapRange::is_valid)
            && self.gap_ranges.windows(2).all(|w| w[0].end < w[1].start)
    }
}

impl BodyCodec for AcknackFrame {
    fn decode_body(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = FieldReader::new(body);
        let frameset_acked =
            reader.read_text("framesetAcked", Self::FRAMESET_LEN)?;
        let lowest_seq_num = reader.read_i64("lowestSeqNum")?;
        let highest_seq_num = reader.read_i64("highestSeqNum")?;
        let gap_count = reader.read_i32("gapCount")?;

        let remaining = reader.remaining();
        let expected = usize::try_from(gap_count)
            .ok()
            .and_then(|n| n.checked_mul(16));
        if expected != Some(remaining) {
            return Err(ProtocolError::MalformedGapList {
                gap_count,
                remaining,
            });
        }

        let mut gap_ranges = Vec::with_capacity(remaining / 16);
        for _ in 0..remaining / 16 {
            let start = reader.read_i64("gapStart")?;
            let end = reader.read_i64("gapEnd")?;
            gap_ranges.push(GapRange { start, end });
        }

        Ok(Self {
            frameset_acked,
            lowest_seq_num,
            highest_seq_num,
            gap_ranges,
        })
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        wire::put_text(
            buf,
            "framesetAcked",
            &self.frameset_acked,
            Self::FRAMESET_LEN,
        )?;
        buf.put_i64(self.lowest_seq_num);
        buf.put_i64(self.highest_seq_num);
        wire::put_len(buf, "gapCount", self.gap_ranges.len())?;
        for gap in &self.gap_ranges {
            buf.put_i64(gap.start);
            buf.put_i64(gap.end);
        }
        Ok(())
    }

    fn body_len(&self) -> usize {
        Self::FIXED_LEN + 16 * self.gap_ranges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> AcknackFrame {
        AcknackFrame {
            frameset_acked: "STA12345678901234567".into(),
            lowest_seq_num: 1_512_074_377_000,
            highest_seq_num: 1_512_076_209_000,
            gap_ranges: vec![GapRange::new(1, 2), GapRange::new(3, 4)],
        }
    }

    #[test]
    fn test_encode_body_fixture_layout() {
        let bytes = fixture().to_body_bytes().unwrap();
        assert_eq!(bytes.len(), 40 + 32);
        assert_eq!(&bytes[..20], b"STA12345678901234567");
        assert_eq!(&bytes[36..40], &2i32.to_be_bytes());
        assert_eq!(&bytes[40..48], &1i64.to_be_bytes());
        assert_eq!(&bytes[64..72], &4i64.to_be_bytes());
    }

    #[test]
    fn test_decode_body_fixture_preserves_gap_order() {
        let frame = fixture();
        let bytes = frame.to_body_bytes().unwrap();
        let decoded = AcknackFrame::decode_body(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.gap_count() * 2, 4);
        assert_eq!(decoded.to_body_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_decode_body_count_mismatch_is_malformed() {
        let mut bytes = fixture().to_body_bytes().unwrap();
        bytes[36..40].copy_from_slice(&3i32.to_be_bytes());
        assert_eq!(
            AcknackFrame::decode_body(&bytes).unwrap_err(),
            ProtocolError::MalformedGapList {
                gap_count: 3,
                remaining: 32,
            }
        );
    }

    #[test]
    fn test_decode_body_partial_pair_is_malformed() {
        let mut bytes = fixture().to_body_bytes().unwrap();
        bytes.truncate(bytes.len() - 8);
        assert!(matches!(
            AcknackFrame::decode_body(&bytes),
            Err(ProtocolError::MalformedGapList { gap_count: 2, remaining: 24 })
        ));
    }

    #[test]
    fn test_decode_body_negative_count_is_malformed() {
        let mut bytes = fixture().to_body_bytes().unwrap();
        bytes.truncate(40);
        bytes[36..40].copy_from_slice(&(-1i32).to_be_bytes());
        assert!(matches!(
            AcknackFrame::decode_body(&bytes),
            Err(ProtocolError::MalformedGapList { gap_count: -1, .. })
        ));
    }

    #[test]
    fn test_decode_body_no_gaps() {
        let frame = AcknackFrame {
            frameset_acked: "A:B".into(),
            lowest_seq_num: 0,
            highest_seq_num: -1,
            gap_ranges: Vec::new(),
        };
        let bytes = frame.to_body_bytes().unwrap();
        assert_eq!(bytes.len(), 40);
        assert_eq!(AcknackFrame::decode_body(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_is_well_ordered_detects_overlap_and_inversion() {
        let mut frame = fixture();
        frame.lowest_seq_num = 0;
        assert!(frame.is_well_ordered());
        frame.gap_ranges = vec![GapRange::new(1, 3), GapRange::new(3, 4)];
        assert!(!frame.is_well_ordered());
        frame.gap_ranges = vec![GapRange::new(5, 4)];
        assert!(!frame.is_well_ordered());
    }

    #[test]
    fn test_gap_range_len() {
        assert_eq!(GapRange::new(3, 7).len(), 5);
        assert_eq!(GapRange::single(9).len(), 1);
        assert!(GapRange::new(7, 3).is_empty());
        assert_eq!(GapRange::new(i64::MIN, i64::MAX).len(), u64::MAX);
    }
}
