//! Extracting exactly one frame at a time from a byte stream.

use std::time::Duration;

use cd11_protocol::{
    Frame, FrameHeader, FrameTrailer, RawFrame, TrailerPrefix,
    UnknownFramePolicy,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Reader tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Longest a single read waits before the deadline is checked again.
    pub poll_interval_ms: u64,
    /// Largest frame accepted, header and trailer included.
    pub max_frame_len: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            max_frame_len: 8 * 1024 * 1024,
        }
    }
}

impl ReaderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// FrameReader
// ---------------------------------------------------------------------------

/// Reads whole frames from one stream.
///
/// Bound to a single stream and used by one task at a time. Never reads
/// past the end of the frame it is assembling, so the next call starts
/// exactly at the next frame boundary.
pub struct FrameReader<R> {
    inner: R,
    config: ReaderConfig,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, config: ReaderConfig) -> Self {
        Self { inner, config }
    }

    /// Reads one frame's bytes, header through trailer.
    ///
    /// The header's `trailerOffset` sizes the body; the trailer's first 8
    /// bytes size the rest. `deadline` is checked between reads.
    ///
    /// # Errors
    /// - [`TransportError::ReadTimeout`] if `deadline` fires first.
    /// - [`TransportError::TruncatedHeader`] if the stream ends within the
    ///   first 36 bytes, [`TransportError::TruncatedFrame`] after that.
    /// - [`TransportError::InvalidFraming`] for an impossible
    ///   `trailerOffset` or authentication size.
    /// - [`TransportError::FrameTooLarge`] past `max_frame_len`.
    pub async fn read_raw_frame<D>(
        &mut self,
        deadline: D,
    ) -> Result<RawFrame, TransportError>
    where
        D: Fn() -> bool,
    {
        let mut buf = Vec::with_capacity(FrameHeader::SIZE);
        self.fill_to(&mut buf, FrameHeader::SIZE, &deadline).await?;

        let trailer_offset = FrameHeader::peek_trailer_offset(&buf)
            .map_err(TransportError::InvalidFraming)?;
        self.check_len(trailer_offset + FrameTrailer::MIN_SIZE)?;
        let prefix_end = trailer_offset + TrailerPrefix::SIZE;
        self.fill_to(&mut buf, prefix_end, &deadline).await?;

        let prefix = TrailerPrefix::decode(&buf[trailer_offset..prefix_end])
            .map_err(TransportError::InvalidFraming)?;
        let frame_len = trailer_offset + prefix.trailer_len();
        self.check_len(frame_len)?;
        self.fill_to(&mut buf, frame_len, &deadline).await?;

        RawFrame::from_bytes(buf).map_err(TransportError::InvalidFraming)
    }

    /// Reads and decodes one frame.
    ///
    /// Returns `Ok(None)` for a frame dropped under `policy`; the stream
    /// is still aligned and the next call reads the following frame.
    pub async fn read_frame<D>(
        &mut self,
        deadline: D,
        policy: UnknownFramePolicy,
    ) -> Result<Option<Frame>, TransportError>
    where
        D: Fn() -> bool,
    {
        let raw = self.read_raw_frame(deadline).await?;
        Ok(raw.decode(policy)?)
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn check_len(&self, len: usize) -> Result<(), TransportError> {
        if len > self.config.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len,
                max: self.config.max_frame_len,
            });
        }
        Ok(())
    }

    /// Reads until `buf` holds `target` bytes, never beyond.
    async fn fill_to<D>(
        &mut self,
        buf: &mut Vec<u8>,
        target: usize,
        deadline: &D,
    ) -> Result<(), TransportError>
    where
        D: Fn() -> bool,
    {
        let mut filled = buf.len();
        buf.resize(target, 0);
        while filled < target {
            if deadline() {
                buf.truncate(filled);
                return Err(TransportError::ReadTimeout { bytes_read: filled });
            }
            let read = tokio::time::timeout(
                self.config.poll_interval(),
                self.inner.read(&mut buf[filled..target]),
            )
            .await;
            match read {
                Err(_) => continue,
                Ok(Ok(0)) => {
                    buf.truncate(filled);
                    return Err(if filled < FrameHeader::SIZE {
                        TransportError::TruncatedHeader { available: filled }
                    } else {
                        TransportError::TruncatedFrame {
                            needed: target,
                            available: filled,
                        }
                    });
                }
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Ok(Err(e)) => {
                    buf.truncate(filled);
                    return Err(TransportError::ReceiveFailed(e));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FrameWriter
// ---------------------------------------------------------------------------

/// Writes encoded frames to one stream.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Encodes and writes `frame`, returning the bytes written.
    pub async fn write_frame(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<u8>, TransportError> {
        let bytes = frame.encode()?;
        self.write_bytes(&bytes).await?;
        Ok(bytes)
    }

    /// Writes an already encoded frame, e.g. from a retransmit buffer.
    pub async fn write_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        self.inner
            .write_all(bytes)
            .await
            .map_err(TransportError::SendFailed)?;
        self.inner.flush().await.map_err(TransportError::SendFailed)
    }

    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
