//! `Cd11Server` accept loop.
//!
//! Ties the layers together: TCP transport → frame reader → gap tracker →
//! collaborator channel.

use std::net::SocketAddr;
use std::sync::Arc;

use cd11_acknack::GapTracker;
use cd11_transport::{TcpTransport, Transport};
use tokio::sync::mpsc;

use crate::{Cd11Error, Receiver, ReceiverConfig, ReceiverEvent};

/// A bound CD-1.1 receiver.
///
/// Call [`run()`](Self::run) to start accepting station connections.
pub struct Cd11Server {
    transport: TcpTransport,
    receiver: Receiver,
}

impl Cd11Server {
    /// Binds to `config.listen_address`. Decoded frames and connection
    /// events are delivered on `events`.
    pub async fn bind(
        config: ReceiverConfig,
        events: mpsc::Sender<ReceiverEvent>,
    ) -> Result<Self, Cd11Error> {
        let tracker = Arc::new(GapTracker::new(config.tracker_config()));
        Self::bind_with_tracker(config, tracker, events).await
    }

    /// Like [`bind`](Self::bind), sharing an existing tracker, e.g. one
    /// restored from a snapshot.
    pub async fn bind_with_tracker(
        config: ReceiverConfig,
        tracker: Arc<GapTracker>,
        events: mpsc::Sender<ReceiverEvent>,
    ) -> Result<Self, Cd11Error> {
        let transport = TcpTransport::bind(&config.listen_address).await?;
        let receiver = Receiver::new(config, tracker, events);
        Ok(Self {
            transport,
            receiver,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle for shutting connections down or reading tracker state
    /// while the server runs.
    pub fn receiver(&self) -> Receiver {
        self.receiver.clone()
    }

    /// Runs the accept loop until the receiver is shut down. A pending
    /// accept is abandoned as soon as shutdown is requested.
    ///
    /// Each connection gets its own task; a failed connection never stops
    /// the loop.
    pub async fn run(mut self) -> Result<(), Cd11Error> {
        tracing::info!("CD-1.1 receiver running");

        loop {
            let accepted = tokio::select! {
                () = self.receiver.shut_down() => break,
                accepted = self.transport.accept() => accepted,
            };
            match accepted {
                Ok(conn) => {
                    let receiver = self.receiver.clone();
                    let id = conn.id();
                    tracing::info!(%id, peer = %conn.peer_addr(), "station connected");
                    let (reader, writer) =
                        conn.into_split(receiver.config().reader_config());
                    tokio::spawn(async move {
                        if let Err(e) =
                            receiver.run_connection(id, reader, writer).await
                        {
                            tracing::debug!(
                                %id,
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
        tracing::info!("CD-1.1 receiver stopped");
        Ok(())
    }
}
