//! # cd11
//!
//! Receiver for CD-1.1 seismic data frame streams.
//!
//! Stations connect over TCP and send frames; the receiver decodes them,
//! tracks sequence gaps per frame set, answers with acknacks on an
//! interval, and hands every decoded frame to a collaborator over a
//! channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cd11::prelude::*;
//!
//! # async fn example() -> Result<(), Cd11Error> {
//! let config = ReceiverConfig::default();
//! let (events, mut frames) = tokio::sync::mpsc::channel(1024);
//! let server = Cd11Server::bind(config, events).await?;
//! tokio::spawn(server.run());
//! while let Some(event) = frames.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod logging;
mod receiver;
mod send_buffer;
mod server;

pub use config::ReceiverConfig;
pub use error::{Cd11Error, ConfigError};
pub use receiver::{Receiver, ReceiverEvent};
pub use send_buffer::SendBuffer;
pub use server::Cd11Server;

pub use cd11_acknack as acknack;
pub use cd11_protocol as protocol;
pub use cd11_transport as transport;

pub mod prelude {
    pub use crate::{
        Cd11Error, Cd11Server, Receiver, ReceiverConfig, ReceiverEvent,
        SendBuffer,
    };
    pub use cd11_acknack::{
        FrameSetKey, GapTracker, RetransmitRequest, UnrecoverableGap,
    };
    pub use cd11_protocol::{
        AcknackFrame, Frame, FrameBody, FrameFactory, FrameType,
        UnknownFramePolicy,
    };
}
