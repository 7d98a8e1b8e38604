//! Per-connection receive loop.
//!
//! Each connection runs two tasks:
//!   1. The read loop: read a frame under a deadline, feed data frames to
//!      the gap tracker, apply inbound acknacks, and forward everything to
//!      the collaborator channel.
//!   2. The acknack loop: on a jittered interval, write one acknack per
//!      frame set seen on this connection.
//!
//! They are separate tasks because a read cannot be abandoned part way
//! through a frame without losing stream alignment.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cd11_acknack::{FrameSetKey, GapTracker, Observation, RetransmitRequest};
use cd11_protocol::{Frame, FrameBody, FrameFactory, ProtocolError};
use cd11_transport::{
    ConnectionId, FrameReader, FrameWriter, TransportError, deadline,
};
use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Notify, mpsc};

use crate::{Cd11Error, ReceiverConfig};

/// What a connection reports to the collaborator consuming frames.
#[derive(Debug, Clone)]
pub enum ReceiverEvent {
    /// A fully decoded frame.
    Frame {
        connection: ConnectionId,
        frame: Frame,
    },
    /// The peer asked for frames again. Resending is up to the consumer.
    Retransmit {
        connection: ConnectionId,
        request: RetransmitRequest,
    },
    /// A complete frame arrived but did not decode; it was discarded and
    /// the stream is still aligned.
    Rejected {
        connection: ConnectionId,
        error: ProtocolError,
    },
    /// The connection ended. `error` is set unless the peer closed
    /// cleanly or the receiver was shut down.
    Closed {
        connection: ConnectionId,
        error: Option<String>,
    },
}

type FrameSets = Arc<Mutex<BTreeSet<FrameSetKey>>>;

/// Shared per-server receive state. Cheap to clone into connection tasks.
#[derive(Clone)]
pub struct Receiver {
    config: Arc<ReceiverConfig>,
    factory: FrameFactory,
    tracker: Arc<GapTracker>,
    events: mpsc::Sender<ReceiverEvent>,
    shutdown: Arc<AtomicBool>,
    shutdown_signal: Arc<Notify>,
}

impl Receiver {
    pub fn new(
        config: ReceiverConfig,
        tracker: Arc<GapTracker>,
        events: mpsc::Sender<ReceiverEvent>,
    ) -> Self {
        Self {
            factory: config.factory(),
            config: Arc::new(config),
            tracker,
            events,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_signal: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<GapTracker> {
        &self.tracker
    }

    /// Asks every connection to stop after its current read.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.shutdown_signal.notify_waiters();
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called.
    pub async fn shut_down(&self) {
        let notified = self.shutdown_signal.notified();
        tokio::pin!(notified);
        // Registered before the flag is read, so a concurrent shutdown
        // either sets the flag first or wakes this waiter.
        notified.as_mut().enable();
        if self.is_shut_down() {
            return;
        }
        notified.await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Runs one connection until the peer closes it, the stream breaks,
    /// or the receiver shuts down.
    ///
    /// # Errors
    /// The transport error that ended the connection: a timeout or EOF
    /// part way through a frame, impossible framing, or an I/O failure.
    pub async fn run_connection<R, W>(
        &self,
        connection: ConnectionId,
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
    ) -> Result<(), Cd11Error>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tracing::info!(%connection, "receiving frames");
        let frame_sets = FrameSets::default();
        let acknacks = tokio::spawn(self.clone().acknack_loop(
            connection,
            writer,
            Arc::clone(&frame_sets),
        ));

        let result = self.read_loop(connection, reader, &frame_sets).await;
        acknacks.abort();

        match &result {
            Ok(()) => tracing::info!(%connection, "connection closed"),
            Err(e) => {
                tracing::warn!(%connection, error = %e, "connection failed");
            }
        }
        let _ = self
            .events
            .send(ReceiverEvent::Closed {
                connection,
                error: result.as_ref().err().map(ToString::to_string),
            })
            .await;
        result
    }

    async fn read_loop<R>(
        &self,
        connection: ConnectionId,
        mut reader: FrameReader<R>,
        frame_sets: &FrameSets,
    ) -> Result<(), Cd11Error>
    where
        R: AsyncRead + Unpin + Send,
    {
        let policy = self.config.unknown_frame_policy;
        while !self.is_shut_down() {
            let deadline = deadline::or_cancelled(
                deadline::after(self.config.read_timeout()),
                Arc::clone(&self.shutdown),
            );
            let frame = match reader.read_frame(deadline, policy).await {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(TransportError::ReadTimeout { bytes_read: 0 }) => continue,
                Err(TransportError::Decode(error)) => {
                    tracing::warn!(%connection, error = %error, "discarding frame");
                    let event = ReceiverEvent::Rejected { connection, error };
                    if !self.emit(event).await {
                        return Ok(());
                    }
                    continue;
                }
                Err(e) if e.is_clean_close() => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            if !self.handle_frame(connection, frame, frame_sets).await {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Returns false once the connection should stop.
    async fn handle_frame(
        &self,
        connection: ConnectionId,
        frame: Frame,
        frame_sets: &FrameSets,
    ) -> bool {
        let mut keep_open = true;
        match &frame.body {
            FrameBody::Data(_) => {
                let key = FrameSetKey::from_header(&frame.header);
                let seq = frame.sequence_number();
                if let Some(Observation::Duplicate) = self.tracker.observe(&frame) {
                    tracing::debug!(%connection, %key, seq, "duplicate data frame");
                }
                frame_sets
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key);
            }
            FrameBody::Acknack(acknack) => {
                let request = self.tracker.apply_acknack(acknack);
                if !request.is_empty()
                    && !self
                        .emit(ReceiverEvent::Retransmit {
                            connection,
                            request,
                        })
                        .await
                {
                    return false;
                }
            }
            FrameBody::Alert(alert) => {
                tracing::info!(%connection, message = %alert.message, "peer sent alert");
                keep_open = false;
            }
            FrameBody::ConnectionRequest(_) | FrameBody::ConnectionResponse(_) => {
                tracing::debug!(%connection, frame_type = %frame.frame_type(), "connection frame");
            }
        }
        self.emit(ReceiverEvent::Frame { connection, frame }).await && keep_open
    }

    /// Returns false if the consumer has gone away.
    async fn emit(&self, event: ReceiverEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    async fn acknack_loop<W>(
        self,
        connection: ConnectionId,
        mut writer: FrameWriter<W>,
        frame_sets: FrameSets,
    ) where
        W: AsyncWrite + Unpin,
    {
        loop {
            tokio::time::sleep(self.acknack_delay()).await;
            let keys: Vec<FrameSetKey> = frame_sets
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned()
                .collect();
            for key in keys {
                if let Err(e) = self.send_acknack(&mut writer, &key).await {
                    tracing::warn!(%connection, %key, error = %e, "acknack failed");
                    return;
                }
            }
            self.tracker.expire(std::time::Instant::now());
        }
    }

    async fn send_acknack<W>(
        &self,
        writer: &mut FrameWriter<W>,
        key: &FrameSetKey,
    ) -> Result<(), Cd11Error>
    where
        W: AsyncWrite + Unpin,
    {
        let acknack = self.tracker.build_acknack(key);
        let gaps = acknack.gap_count();
        let frame = self.factory.acknack(acknack)?;
        writer.write_frame(&frame).await?;
        tracing::debug!(%key, gaps, "acknack sent");
        Ok(())
    }

    fn acknack_delay(&self) -> Duration {
        let jitter = if self.config.acknack_jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.acknack_jitter_ms)
        } else {
            0
        };
        self.config.acknack_interval() + Duration::from_millis(jitter)
    }
}
