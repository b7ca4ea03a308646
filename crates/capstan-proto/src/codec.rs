//! Streaming frame codec.
//!
//! TCP-like byte streams deliver data at arbitrary split points: a read may
//! contain half a header, three frames and a fragment, or nothing useful at
//! all. [`FrameCodec`] owns an accumulation buffer, so callers feed raw bytes
//! as they arrive and drain complete frames as they become available.

use bytes::{Buf, BytesMut};

use crate::{error::Result, frame::Frame, header::FrameHeader};

/// Initial capacity of the accumulation buffer.
///
/// Large enough for typical chunks; grows on demand up to one maximum frame.
const INITIAL_CAPACITY: usize = 16 * 1024;

/// Stateful decoder that reassembles frames from a byte stream.
///
/// # Usage
///
/// ```
/// use capstan_proto::{Frame, FrameCodec};
///
/// let frame = Frame::new(0, 0, vec![0u8; 16]);
/// let wire = frame.encode_to_bytes().unwrap();
///
/// let mut codec = FrameCodec::new();
/// codec.feed(&wire[..5]); // partial input
/// assert!(codec.next_frame().unwrap().is_none());
///
/// codec.feed(&wire[5..]);
/// assert_eq!(codec.next_frame().unwrap(), Some(frame));
/// ```
///
/// # Errors
///
/// `next_frame` returns an error only for malformed input (length field above
/// the 1 MiB cap, or below the tag size). A length-prefixed stream cannot be
/// resynchronized after a corrupt length field, so the codec is unusable after
/// the first error and the caller must tear down the session.
#[derive(Debug, Default)]
pub struct FrameCodec {
    buffer: BytesMut,
}

impl FrameCodec {
    /// Create a codec with an empty accumulation buffer.
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: BytesMut::with_capacity(INITIAL_CAPACITY) }
    }

    /// Append raw bytes from the transport to the accumulation buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of buffered bytes not yet consumed by a complete frame.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decode the next complete frame, if one is available.
    ///
    /// Returns `Ok(None)` when the buffer holds only a partial frame - feed
    /// more bytes and call again. Call in a loop to drain all complete frames
    /// after each `feed`.
    ///
    /// # Errors
    ///
    /// [`WireError::Oversized`] or [`WireError::TagMissing`] on a malformed
    /// header. Fatal: the stream position can no longer be trusted.
    ///
    /// [`WireError::Oversized`]: crate::WireError::Oversized
    /// [`WireError::TagMissing`]: crate::WireError::TagMissing
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buffer.len() < FrameHeader::SIZE {
            return Ok(None);
        }

        let total = match FrameHeader::from_bytes(&self.buffer) {
            Ok(header) => FrameHeader::SIZE + header.ciphertext_len() as usize,
            // Malformed length fields are fatal; a short buffer cannot occur
            // here because we checked for a complete header above.
            Err(err) => return Err(err),
        };

        if self.buffer.len() < total {
            // Reserve up front so repeated feeds don't reallocate per call
            self.buffer.reserve(total - self.buffer.len());
            return Ok(None);
        }

        let frame_bytes = self.buffer.copy_to_bytes(total);
        let frame = Frame::decode(&frame_bytes)?;

        Ok(Some(frame))
    }
}
