//! Integration tests for the gap tracker: receive-side acknack building,
//! send-side acknack application, expiry and snapshots.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cd11_acknack::{
    AcknackError, FrameSetKey, GapTracker, GapTrackerConfig, Observation,
    TrackerSnapshot, UnrecoverableGap, UnrecoverableReason,
};
use cd11_protocol::{
    AcknackFrame, BodyCodec, ChannelSubframe, CompressionFormat, DataFrame,
    Frame, FrameFactory, GapRange, JulianDate, SensorType,
};

// =========================================================================
// Helpers
// =========================================================================

fn station() -> FrameSetKey {
    FrameSetKey::from_parts("STA", "IDC")
}

fn acknack(frameset: &str, gaps: Vec<GapRange>) -> AcknackFrame {
    AcknackFrame {
        frameset_acked: frameset.into(),
        lowest_seq_num: 1_512_074_377_000,
        highest_seq_num: 1_512_076_209_000,
        gap_ranges: gaps,
    }
}

fn data_frame(seq: i64) -> Frame {
    let subframe = ChannelSubframe {
        auth_offset: 0,
        authentication_on: false,
        compression_format: CompressionFormat::None,
        sensor_type: SensorType::Seismic,
        is_calib: false,
        site_name: "STA".into(),
        channel_name: "BHZ".into(),
        location_name: String::new(),
        data_type: "s4".into(),
        calibration_factor: 1.0,
        calibration_period: 1.0,
        time_stamp: JulianDate::from_text("2017334 20:39:37.000").unwrap(),
        subframe_time_length: 10_000,
        samples: 2,
        channel_status: Vec::new(),
        channel_data: vec![0; 8],
        subframe_count: 0,
        auth_key_identifier: 0,
        auth_value: Vec::new(),
    };
    let data = DataFrame::new(
        10_000,
        JulianDate::from_text("2017334 20:39:37.000").unwrap(),
        vec![subframe],
    );
    FrameFactory::new("STA", "IDC", 0).data(data, seq, 0).unwrap()
}

// =========================================================================
// Receive side
// =========================================================================

#[test]
fn test_build_acknack_unknown_frame_set_is_empty() {
    let tracker = GapTracker::default();
    let acknack = tracker.build_acknack(&station());
    assert_eq!(acknack.frameset_acked, "STA:IDC");
    assert_eq!(acknack.lowest_seq_num, 0);
    assert_eq!(acknack.highest_seq_num, -1);
    assert!(acknack.gap_ranges.is_empty());
}

#[test]
fn test_observe_data_frames_builds_sorted_gaps() {
    let tracker = GapTracker::default();
    for seq in [100, 101, 105, 106, 110] {
        tracker.observe(&data_frame(seq));
    }
    let acknack = tracker.build_acknack(&station());
    assert_eq!(acknack.lowest_seq_num, 100);
    assert_eq!(acknack.highest_seq_num, 110);
    assert_eq!(
        acknack.gap_ranges,
        vec![GapRange::new(102, 104), GapRange::new(107, 109)]
    );
    assert!(acknack.is_well_ordered());

    // A retransmission inside a gap shrinks it.
    assert_eq!(
        tracker.observe(&data_frame(102)),
        Some(Observation::GapFilled)
    );
    let acknack = tracker.build_acknack(&station());
    assert_eq!(acknack.gap_ranges[0], GapRange::new(103, 104));
}

#[test]
fn test_observe_ignores_frames_without_sequence_tracking() {
    let tracker = GapTracker::default();
    let alert = FrameFactory::new("STA", "IDC", 0).alert("hi").unwrap();
    assert_eq!(tracker.observe(&alert), None);
    assert!(tracker.frame_sets().is_empty());
}

#[test]
fn test_built_acknack_encodes_within_frameset_field() {
    let tracker = GapTracker::default();
    let key = FrameSetKey::from_parts("XDCXDC_1", "XDCXDC_2");
    tracker.observe_sequence(&key, 1);
    tracker.observe_sequence(&key, 5);
    let acknack = tracker.build_acknack(&key);
    let bytes = acknack.to_body_bytes().unwrap();
    assert_eq!(AcknackFrame::decode_body(&bytes).unwrap(), acknack);
}

#[test]
fn test_frame_sets_are_tracked_independently() {
    let tracker = Arc::new(GapTracker::default());
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                let key = FrameSetKey::from_parts(&format!("STA{n}"), "IDC");
                for seq in (0..200).step_by(2) {
                    tracker.observe_sequence(&key, seq);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(tracker.frame_sets().len(), 4);
    let acknack = tracker.build_acknack(&FrameSetKey::from_parts("STA2", "IDC"));
    assert_eq!(acknack.gap_ranges.len(), 99);
    assert_eq!(acknack.highest_seq_num, 198);
}

#[test]
fn test_fill_range_clears_given_up_gaps() {
    let tracker = GapTracker::default();
    tracker.observe_sequence(&station(), 0);
    tracker.observe_sequence(&station(), 10);
    assert_eq!(tracker.fill_range(&station(), GapRange::new(1, 4)), 1);
    assert_eq!(
        tracker.build_acknack(&station()).gap_ranges,
        vec![GapRange::new(5, 9)]
    );
}

#[test]
fn test_expire_drops_stale_gaps_only_when_configured() {
    let tracker = GapTracker::default();
    tracker.observe_sequence(&station(), 0);
    tracker.observe_sequence(&station(), 10);
    let later = Instant::now() + Duration::from_secs(3600);
    assert_eq!(tracker.expire(later), 0);

    let tracker = GapTracker::new(GapTrackerConfig {
        gap_expiry_secs: Some(60),
    });
    tracker.observe_sequence(&station(), 0);
    tracker.observe_sequence(&station(), 10);
    assert_eq!(tracker.expire(Instant::now()), 0);
    assert_eq!(tracker.expire(later), 1);
    assert!(tracker.build_acknack(&station()).gap_ranges.is_empty());
}

// =========================================================================
// Send side
// =========================================================================

#[test]
fn test_apply_acknack_fixture_schedules_both_ranges() {
    let tracker = GapTracker::default();
    let request = tracker.apply_acknack(&acknack(
        "STA12345678901234567",
        vec![GapRange::new(1, 2), GapRange::new(3, 4)],
    ));
    assert_eq!(request.frame_set.as_str(), "STA12345678901234567");
    assert_eq!(
        request.scheduled,
        vec![GapRange::new(1, 2), GapRange::new(3, 4)]
    );
    assert!(request.unrecoverable.is_empty());
    assert_eq!(request.scheduled_len(), 4);
}

#[test]
fn test_apply_acknack_reports_released_and_unsent_ranges() {
    let tracker = GapTracker::default();
    for seq in 1..=20 {
        tracker.record_sent(&station(), seq);
    }
    tracker.release_through(&station(), 5);

    let request = tracker.apply_acknack(&acknack(
        "STA:IDC",
        vec![GapRange::new(3, 8), GapRange::new(18, 25)],
    ));
    assert_eq!(
        request.scheduled,
        vec![GapRange::new(6, 8), GapRange::new(18, 20)]
    );
    assert_eq!(
        request.unrecoverable,
        vec![
            UnrecoverableGap {
                range: GapRange::new(3, 5),
                reason: UnrecoverableReason::Released,
            },
            UnrecoverableGap {
                range: GapRange::new(21, 25),
                reason: UnrecoverableReason::NeverSent,
            },
        ]
    );
}

#[test]
fn test_apply_acknack_skips_inverted_ranges() {
    let tracker = GapTracker::default();
    let request = tracker.apply_acknack(&acknack(
        "STA:IDC",
        vec![GapRange::new(9, 3), GapRange::new(10, 10)],
    ));
    assert_eq!(request.scheduled, vec![GapRange::single(10)]);
    assert!(request.unrecoverable.is_empty());
}

#[test]
fn test_apply_acknack_without_gaps_is_empty() {
    let tracker = GapTracker::default();
    tracker.record_sent(&station(), 1);
    assert!(tracker.apply_acknack(&acknack("STA:IDC", vec![])).is_empty());
}

#[test]
fn test_forget_clears_send_window() {
    let tracker = GapTracker::default();
    tracker.record_sent(&station(), 1);
    tracker.forget(&station());
    let request =
        tracker.apply_acknack(&acknack("STA:IDC", vec![GapRange::new(50, 60)]));
    assert_eq!(request.scheduled, vec![GapRange::new(50, 60)]);
}

// =========================================================================
// Snapshots
// =========================================================================

#[test]
fn test_snapshot_restore_through_json() {
    let tracker = GapTracker::default();
    tracker.observe_sequence(&station(), 0);
    tracker.observe_sequence(&station(), 10);
    tracker.observe_sequence(&station(), 20);
    let json = serde_json::to_string(&tracker.snapshot()).unwrap();
    assert!(json.contains("\"STA:IDC\""));

    let restored = GapTracker::default();
    restored
        .restore(&serde_json::from_str::<TrackerSnapshot>(&json).unwrap())
        .unwrap();
    assert_eq!(
        restored.build_acknack(&station()),
        tracker.build_acknack(&station())
    );
}

#[test]
fn test_restore_invalid_snapshot_keeps_existing_state() {
    let tracker = GapTracker::default();
    tracker.observe_sequence(&station(), 3);
    let json = r#"{"frame_sets":{"BAD:IDC":{"lowest":10,"highest":5,"gaps":[]}}}"#;
    let snapshot: TrackerSnapshot = serde_json::from_str(json).unwrap();

    let err = tracker.restore(&snapshot).unwrap_err();
    assert!(matches!(err, AcknackError::InvalidSnapshot { .. }));
    assert_eq!(tracker.frame_sets(), vec![station()]);
}
