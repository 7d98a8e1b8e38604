//! Integration tests for the receive loop and the server.
//!
//! A station is simulated on the far end of an in-memory duplex pipe (or
//! a real socket for the server test). Time is paused, so acknack
//! intervals elapse as soon as every task is idle.

use std::sync::Arc;
use std::time::Duration;

use cd11::prelude::*;
use cd11::transport::{
    ConnectionId, FrameReader, FrameWriter, ReaderConfig, TcpConnection,
    deadline,
};
use cd11_protocol::{
    ChannelSubframe, CompressionFormat, DataFrame, FrameHeader, FrameTrailer,
    GapRange, JulianDate, SensorType,
};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// =========================================================================
// Helpers
// =========================================================================

type Station = (
    FrameReader<ReadHalf<DuplexStream>>,
    FrameWriter<WriteHalf<DuplexStream>>,
);

fn config() -> ReceiverConfig {
    ReceiverConfig {
        acknack_interval_secs: 5,
        acknack_jitter_ms: 0,
        ..ReceiverConfig::default()
    }
}

fn station_factory() -> FrameFactory {
    FrameFactory::new("STA", "IDC", 0)
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
        channel_data: vec![0, 0, 0, 1, 0, 0, 0, 2],
        subframe_count: 0,
        auth_key_identifier: 0,
        auth_value: Vec::new(),
    };
    let data = DataFrame::new(
        10_000,
        JulianDate::from_text("2017334 20:39:37.000").unwrap(),
        vec![subframe],
    );
    station_factory().data(data, seq, 0).unwrap()
}

/// Starts a connection task; returns the station end and the event stream.
fn connect(
    config: ReceiverConfig,
) -> (
    Station,
    mpsc::Receiver<ReceiverEvent>,
    Receiver,
    JoinHandle<Result<(), Cd11Error>>,
) {
    let (station, server) = tokio::io::duplex(64 * 1024);
    let (events, rx) = mpsc::channel(64);
    let tracker = Arc::new(GapTracker::new(config.tracker_config()));
    let receiver = Receiver::new(config, tracker, events);

    let (server_read, server_write) = tokio::io::split(server);
    let task = {
        let receiver = receiver.clone();
        tokio::spawn(async move {
            receiver
                .run_connection(
                    ConnectionId::new(1),
                    FrameReader::new(server_read, ReaderConfig::default()),
                    FrameWriter::new(server_write),
                )
                .await
        })
    };

    let (station_read, station_write) = tokio::io::split(station);
    let station = (
        FrameReader::new(station_read, ReaderConfig::default()),
        FrameWriter::new(station_write),
    );
    (station, rx, receiver, task)
}

async fn next_frame(rx: &mut mpsc::Receiver<ReceiverEvent>) -> Frame {
    match rx.recv().await {
        Some(ReceiverEvent::Frame { frame, .. }) => frame,
        other => panic!("expected frame event, got {other:?}"),
    }
}

// =========================================================================
// Data and acknacks
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_data_frames_forwarded_and_gaps_acknowledged() {
    let ((mut reader, mut writer), mut rx, receiver, _task) = connect(config());
    for seq in [1, 2, 5] {
        writer.write_frame(&data_frame(seq)).await.unwrap();
    }
    for seq in [1, 2, 5] {
        assert_eq!(next_frame(&mut rx).await.sequence_number(), seq);
    }

    let acknack = reader
        .read_frame(deadline::never(), UnknownFramePolicy::Reject)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(acknack.frame_type(), FrameType::Acknack);
    assert_eq!(acknack.sequence_number(), 0);
    assert_eq!(acknack.header.frame_creator, "IDC");
    let FrameBody::Acknack(body) = acknack.body else {
        panic!("expected acknack body");
    };
    assert_eq!(body.frameset_acked, "STA:IDC");
    assert_eq!((body.lowest_seq_num, body.highest_seq_num), (1, 5));
    assert_eq!(body.gap_ranges, vec![GapRange::new(3, 4)]);

    assert_eq!(receiver.tracker().frame_sets().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retransmission_shrinks_next_acknack() {
    let ((mut reader, mut writer), mut rx, _receiver, _task) = connect(config());
    for seq in [10, 14, 12] {
        writer.write_frame(&data_frame(seq)).await.unwrap();
        next_frame(&mut rx).await;
    }

    let frame = reader
        .read_frame(deadline::never(), UnknownFramePolicy::Reject)
        .await
        .unwrap()
        .unwrap();
    let FrameBody::Acknack(body) = frame.body else {
        panic!("expected acknack body");
    };
    assert_eq!(
        body.gap_ranges,
        vec![GapRange::single(11), GapRange::single(13)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_inbound_acknack_produces_retransmit_request() {
    let ((_reader, mut writer), mut rx, _receiver, _task) = connect(config());
    let acknack = AcknackFrame {
        frameset_acked: "STA12345678901234567".into(),
        lowest_seq_num: 1_512_074_377_000,
        highest_seq_num: 1_512_076_209_000,
        gap_ranges: vec![GapRange::new(1, 2), GapRange::new(3, 4)],
    };
    writer
        .write_frame(&station_factory().acknack(acknack).unwrap())
        .await
        .unwrap();

    match rx.recv().await {
        Some(ReceiverEvent::Retransmit { request, .. }) => {
            assert_eq!(
                request.scheduled,
                vec![GapRange::new(1, 2), GapRange::new(3, 4)]
            );
            assert!(request.unrecoverable.is_empty());
        }
        other => panic!("expected retransmit event, got {other:?}"),
    }
    assert_eq!(next_frame(&mut rx).await.frame_type(), FrameType::Acknack);
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_alert_closes_connection_cleanly() {
    let ((_reader, mut writer), mut rx, _receiver, task) = connect(config());
    writer
        .write_frame(&station_factory().alert("shutting down").unwrap())
        .await
        .unwrap();

    assert_eq!(next_frame(&mut rx).await.frame_type(), FrameType::Alert);
    assert!(matches!(
        rx.recv().await,
        Some(ReceiverEvent::Closed { error: None, .. })
    ));
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_station_disconnect_between_frames_is_clean() {
    let ((reader, writer), mut rx, _receiver, task) = connect(config());
    writer.into_inner().shutdown().await.unwrap();
    drop(reader);

    assert!(matches!(
        rx.recv().await,
        Some(ReceiverEvent::Closed { error: None, .. })
    ));
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_frame_fails_connection() {
    let ((_reader, writer), mut rx, _receiver, task) = connect(config());
    let bytes = data_frame(1).encode().unwrap();
    let mut raw = writer.into_inner();
    raw.write_all(&bytes[..50]).await.unwrap();
    raw.shutdown().await.unwrap();

    assert!(matches!(
        rx.recv().await,
        Some(ReceiverEvent::Closed { error: Some(_), .. })
    ));
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        Cd11Error::Transport(cd11::transport::TransportError::TruncatedFrame { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_rejected_and_stream_continues() {
    let ((_reader, writer), mut rx, _receiver, _task) = connect(config());
    // An acknack body declaring one gap but carrying none.
    let mut body = vec![b' '; 20];
    body.extend_from_slice(&0i64.to_be_bytes());
    body.extend_from_slice(&0i64.to_be_bytes());
    body.extend_from_slice(&1i32.to_be_bytes());
    let mut bytes = FrameHeader::new(FrameType::Acknack, body.len(), "STA", "IDC", 0, 0)
        .unwrap()
        .to_bytes()
        .unwrap();
    bytes.extend_from_slice(&body);
    FrameTrailer::unauthenticated(0).encode(&mut bytes).unwrap();

    let mut raw = writer.into_inner();
    raw.write_all(&bytes).await.unwrap();
    raw.write_all(&data_frame(7).encode().unwrap()).await.unwrap();

    assert!(matches!(
        rx.recv().await,
        Some(ReceiverEvent::Rejected { .. })
    ));
    assert_eq!(next_frame(&mut rx).await.sequence_number(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_frame_type_dropped_by_default() {
    let ((_reader, writer), mut rx, _receiver, _task) = connect(config());
    let mut bytes = FrameHeader::new(FrameType::CustomReset, 4, "STA", "IDC", 0, 0)
        .unwrap()
        .to_bytes()
        .unwrap();
    bytes.extend_from_slice(&[0; 4]);
    FrameTrailer::unauthenticated(0).encode(&mut bytes).unwrap();

    let mut raw = writer.into_inner();
    raw.write_all(&bytes).await.unwrap();
    raw.write_all(&data_frame(3).encode().unwrap()).await.unwrap();

    assert_eq!(next_frame(&mut rx).await.sequence_number(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_idle_connection() {
    let (_station, mut rx, receiver, task) = connect(config());
    tokio::time::sleep(Duration::from_millis(10)).await;
    receiver.shutdown();

    assert!(matches!(
        rx.recv().await,
        Some(ReceiverEvent::Closed { error: None, .. })
    ));
    task.await.unwrap().unwrap();
}

// =========================================================================
// Server
// =========================================================================

#[tokio::test]
async fn test_server_accepts_station_over_tcp() {
    let config = ReceiverConfig {
        listen_address: "127.0.0.1:0".into(),
        ..config()
    };
    let (events, mut rx) = mpsc::channel(16);
    let server = Cd11Server::bind(config, events).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let station = TcpConnection::connect(addr).await.unwrap();
    let (_reader, mut writer) = station.into_split(ReaderConfig::default());
    writer.write_frame(&data_frame(42)).await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), next_frame(&mut rx))
        .await
        .unwrap();
    assert_eq!(frame.sequence_number(), 42);
    assert_eq!(frame.header.frame_creator, "STA");
}

#[tokio::test]
async fn test_server_stops_listening_on_shutdown_without_new_connection() {
    let config = ReceiverConfig {
        listen_address: "127.0.0.1:0".into(),
        ..config()
    };
    let (events, _rx) = mpsc::channel(16);
    let server = Cd11Server::bind(config, events).await.unwrap();
    let receiver = server.receiver();
    let run = tokio::spawn(server.run());

    tokio::time::sleep(Duration::from_millis(20)).await;
    receiver.shutdown();

    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("accept loop still running after shutdown")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_shut_down_resolves_when_already_requested() {
    let (events, _rx) = mpsc::channel(1);
    let tracker = Arc::new(GapTracker::new(config().tracker_config()));
    let receiver = Receiver::new(config(), tracker, events);
    receiver.shutdown();
    tokio::time::timeout(Duration::from_secs(1), receiver.shut_down())
        .await
        .unwrap();
}
