//! Frame type combining header and sealed payload.
//!
//! A `Frame` is the transport-layer packet consisting of:
//! - 16-byte raw binary header (Big Endian)
//! - Variable-length ciphertext with trailing 16-byte authentication tag
//!
//! This is a pure data holder. Sealing and opening the ciphertext happen in
//! `capstan-crypto`; this crate only guarantees structural validity.

use bytes::{BufMut, Bytes};

use crate::{
    error::{Result, WireError},
    header::FrameHeader,
};

/// Complete wire frame (transport layer).
///
/// Layout on the wire:
/// `[FrameHeader: 16 bytes, raw binary] + [ciphertext||tag: variable bytes]`
///
/// # Invariants
///
/// - Size Consistency: `ciphertext.len()` MUST match
///   `header.ciphertext_len()`. Enforced by [`Frame::new`] and verified by
///   [`Frame::decode`].
/// - Size Limit: `ciphertext.len()` MUST NOT exceed
///   [`FrameHeader::MAX_CIPHERTEXT_LEN`] (1 MiB). Violations are rejected
///   during encoding and decoding.
/// - Tag Presence: `ciphertext.len()` is at least [`FrameHeader::TAG_SIZE`].
///
/// # Security
///
/// Provides structural validity only. A decoded frame has a well-formed
/// header and a ciphertext of the claimed length, but the ciphertext is
/// unauthenticated until the AEAD tag is verified with the (epoch, sequence)
/// slot as associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header (16 bytes)
    pub header: FrameHeader,

    /// Ciphertext including trailing 16-byte tag
    pub ciphertext: Bytes,
}

impl Frame {
    /// Create a new frame with automatic `ciphertext_len` calculation.
    ///
    /// The header's length field is set to match the actual ciphertext
    /// length, making it impossible to construct a frame with mismatched
    /// header and payload sizes.
    #[must_use]
    pub fn new(epoch: u32, sequence: u64, ciphertext: impl Into<Bytes>) -> Self {
        let ciphertext = ciphertext.into();
        let mut header = FrameHeader::new(epoch, sequence);

        // INVARIANT: Ciphertext length always fits in u32 because the encoder
        // enforces the 1 MiB cap before sealing, and Bytes is bounded by
        // isize::MAX regardless.
        #[allow(clippy::expect_used)]
        let len = u32::try_from(ciphertext.len())
            .expect("invariant: ciphertext length fits in u32 (bounded by protocol limit)");
        header.ciphertext_len = len.to_be_bytes();

        Self { header, ciphertext }
    }

    /// Total encoded size of this frame in bytes.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        FrameHeader::SIZE + self.ciphertext.len()
    }

    /// Encode frame into a buffer.
    ///
    /// Writes: `[header (16 bytes)] + [ciphertext||tag (variable)]`
    ///
    /// # Errors
    ///
    /// - [`WireError::Oversized`] if ciphertext exceeds the 1 MiB cap
    /// - [`WireError::TagMissing`] if ciphertext is shorter than the tag
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        debug_assert_eq!(self.ciphertext.len(), self.header.ciphertext_len() as usize);

        if self.ciphertext.len() > FrameHeader::MAX_CIPHERTEXT_LEN as usize {
            return Err(WireError::Oversized {
                len: self.ciphertext.len(),
                max: FrameHeader::MAX_CIPHERTEXT_LEN as usize,
            });
        }
        if self.ciphertext.len() < FrameHeader::TAG_SIZE {
            return Err(WireError::TagMissing {
                len: self.ciphertext.len(),
                tag: FrameHeader::TAG_SIZE,
            });
        }

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.ciphertext);

        Ok(())
    }

    /// Encode frame into a freshly allocated byte buffer.
    pub fn encode_to_bytes(&self) -> Result<Bytes> {
        let mut buf = Vec::with_capacity(self.wire_len());
        self.encode(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Decode a frame from wire format (one-shot).
    ///
    /// Requires the complete frame to be present. For decoding from a byte
    /// stream where frames may arrive split, use
    /// [`FrameCodec`](crate::FrameCodec) instead.
    ///
    /// # Errors
    ///
    /// - Header errors from [`FrameHeader::from_bytes`]
    /// - [`WireError::FrameTooShort`] if the ciphertext is truncated (fewer
    ///   bytes than the header claims)
    ///
    /// # Security
    ///
    /// All validation happens before allocating memory for the ciphertext.
    /// Only exactly `ciphertext_len` bytes are read; trailing data is
    /// ignored, preventing buffer over-read.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let ciphertext_len = header.ciphertext_len() as usize;
        // Cannot overflow: ciphertext_len is capped at 1 MiB by from_bytes.
        let total = FrameHeader::SIZE + ciphertext_len;

        if bytes.len() < total {
            return Err(WireError::FrameTooShort { expected: total, actual: bytes.len() });
        }

        // INVARIANT: bytes.len() >= total was verified above, so the slice
        // bounds FrameHeader::SIZE..total are in range.
        #[allow(clippy::expect_used)]
        let ciphertext = Bytes::copy_from_slice(
            bytes.get(FrameHeader::SIZE..total).expect("invariant: bounds checked above"),
        );

        debug_assert_eq!(ciphertext.len(), ciphertext_len);

        Ok(Self { header: *header, ciphertext })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed_payload(len: usize) -> Vec<u8> {
        // Ciphertext stand-in: arbitrary bytes with room for the tag
        vec![0xAB; len + FrameHeader::TAG_SIZE]
    }

    #[test]
    fn new_sets_length_from_ciphertext() {
        let frame = Frame::new(3, 42, sealed_payload(100));
        assert_eq!(frame.header.ciphertext_len() as usize, 116);
        assert_eq!(frame.header.epoch(), 3);
        assert_eq!(frame.header.sequence(), 42);
    }

    #[test]
    fn encode_decode_round_trip() {
        let frame = Frame::new(1, 7, sealed_payload(32));

        let wire = frame.encode_to_bytes().unwrap();
        assert_eq!(wire.len(), frame.wire_len());

        let parsed = Frame::decode(&wire).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn tag_only_ciphertext_is_valid() {
        // Empty plaintext seals to exactly one tag (empty chunks are legal)
        let frame = Frame::new(0, 0, sealed_payload(0));
        let wire = frame.encode_to_bytes().unwrap();
        let parsed = Frame::decode(&wire).unwrap();
        assert_eq!(parsed.ciphertext.len(), FrameHeader::TAG_SIZE);
    }

    #[test]
    fn reject_truncated_frame() {
        let frame = Frame::new(0, 0, sealed_payload(100));
        let wire = frame.encode_to_bytes().unwrap();

        // Drop the last 10 bytes of ciphertext
        let result = Frame::decode(&wire[..wire.len() - 10]);
        assert!(matches!(result, Err(WireError::FrameTooShort { .. })));
    }

    #[test]
    fn reject_encode_below_tag_size() {
        let frame = Frame { header: FrameHeader::new(0, 0), ciphertext: Bytes::new() };

        let mut buf = Vec::new();
        let result = frame.encode(&mut buf);
        assert!(matches!(result, Err(WireError::TagMissing { .. })));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let frame = Frame::new(2, 9, sealed_payload(8));
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();
        wire.extend_from_slice(b"next frame begins here");

        let parsed = Frame::decode(&wire).unwrap();
        assert_eq!(parsed, frame);
    }
}
