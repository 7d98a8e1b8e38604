//! CD-1.1 frame codecs.
//!
//! This crate turns bytes into typed frames and back. It knows nothing
//! about sockets or sequence bookkeeping:
//!
//! - **Primitives** ([`wire`], [`JulianDate`]): big-endian integers,
//!   blank-padded text and Julian-date timestamps.
//! - **Envelope** ([`FrameHeader`], [`FrameTrailer`]): the 36-byte header
//!   and the self-describing authentication trailer.
//! - **Bodies** ([`ConnectionFrame`], [`AlertFrame`], [`AcknackFrame`],
//!   [`DataFrame`]): one [`BodyCodec`] per supported frame type.
//! - **Dispatch** ([`Frame`], [`dispatch`], [`RawFrame`]): selecting the
//!   body codec from the header's type tag.
//!
//! ```text
//! Header(36) ∥ Body(trailerOffset - 36) ∥ Trailer(16 + authSize)
//! ```
//!
//! Decoding is pure and stateless, so independent buffers can be decoded
//! concurrently from any number of tasks.

mod acknack;
mod alert;
mod body;
mod connection;
mod data;
mod error;
mod factory;
mod frame;
mod frame_type;
mod header;
mod julian;
mod trailer;
pub mod wire;

pub use acknack::{AcknackFrame, GapRange};
pub use alert::AlertFrame;
pub use body::BodyCodec;
pub use connection::ConnectionFrame;
pub use data::{
    ChannelSubframe, ChannelSubframeHeader, CompressionFormat, DataFrame,
    SensorType,
};
pub use error::ProtocolError;
pub use factory::FrameFactory;
pub use frame::{
    Frame, FrameBody, RawFrame, UnknownFramePolicy, dispatch, split_frame,
};
pub use frame_type::FrameType;
pub use header::FrameHeader;
pub use julian::JulianDate;
pub use trailer::{FrameTrailer, TrailerPrefix};
