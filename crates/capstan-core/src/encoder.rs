//! Send-side pipeline: sequence assignment, sealing, framing.

use std::sync::Arc;

use bytes::Bytes;
use capstan_crypto::{KeyRing, aead};
use capstan_proto::Frame;

use crate::{chunk::MAX_CHUNK_SIZE, error::TransportError};

/// Seals plaintext chunks into wire frames.
///
/// Sequence numbers are assigned by the [`KeyRing`] in strictly increasing
/// submission order with no gaps - there is no reordering on send. The
/// session serializes submissions (one in flight at a time); the ring's
/// atomic counter makes the assignment safe even if a caller drives an
/// encoder from multiple threads.
#[derive(Debug)]
pub struct Encoder {
    ring: Arc<KeyRing>,
}

impl Encoder {
    /// Create an encoder drawing send slots from the given ring.
    #[must_use]
    pub fn new(ring: Arc<KeyRing>) -> Self {
        Self { ring }
    }

    /// Seal one chunk and encode it as a wire frame.
    ///
    /// The (epoch, sequence) slot is bound to the ciphertext as associated
    /// data, so the header cannot be re-pointed at a different slot without
    /// failing authentication.
    ///
    /// # Errors
    ///
    /// - [`TransportError::ChunkTooLarge`] for payloads above
    ///   [`MAX_CHUNK_SIZE`]
    /// - [`TransportError::NonceExhausted`] when the counter runs out - the
    ///   caller must rotate keys before continuing
    /// - [`TransportError::SessionClosed`] if the ring is closed
    pub fn submit(&mut self, payload: &[u8]) -> Result<Bytes, TransportError> {
        if payload.len() > MAX_CHUNK_SIZE {
            return Err(TransportError::ChunkTooLarge { len: payload.len(), max: MAX_CHUNK_SIZE });
        }

        let slot = self.ring.next_send()?;

        let aad = aead::build_nonce(slot.epoch, slot.sequence);
        let ciphertext = aead::seal(&slot.key, slot.epoch, slot.sequence, &aad, payload);

        let frame = Frame::new(slot.epoch, slot.sequence, ciphertext);
        // Size invariant holds by construction: payload <= MAX_CHUNK_SIZE,
        // so ciphertext <= MAX_CIPHERTEXT_LEN and carries a full tag.
        frame.encode_to_bytes().map_err(TransportError::MalformedFrame)
    }
}

#[cfg(test)]
mod tests {
    use capstan_crypto::{KeyRingConfig, Role, derive_session_keys};
    use capstan_proto::FrameHeader;

    use super::*;

    fn encoder() -> Encoder {
        let keys = derive_session_keys(b"test_root", 0, Role::Initiator);
        Encoder::new(Arc::new(KeyRing::new(keys, KeyRingConfig::default())))
    }

    #[test]
    fn submissions_get_strictly_increasing_sequences() {
        let mut enc = encoder();

        for expected in 0..20u64 {
            let wire = enc.submit(b"payload").unwrap();
            let frame = Frame::decode(&wire).unwrap();
            assert_eq!(frame.header.sequence(), expected);
            assert_eq!(frame.header.epoch(), 0);
        }
    }

    #[test]
    fn empty_payload_produces_tag_only_frame() {
        let mut enc = encoder();
        let wire = enc.submit(b"").unwrap();
        let frame = Frame::decode(&wire).unwrap();
        assert_eq!(frame.ciphertext.len(), FrameHeader::TAG_SIZE);
    }

    #[test]
    fn oversized_chunk_is_rejected_without_consuming_a_sequence() {
        let mut enc = encoder();

        let too_big = vec![0u8; MAX_CHUNK_SIZE + 1];
        let result = enc.submit(&too_big);
        assert!(matches!(result, Err(TransportError::ChunkTooLarge { .. })));

        // Rejection happened before the ring was consulted
        let wire = enc.submit(b"next").unwrap();
        assert_eq!(Frame::decode(&wire).unwrap().header.sequence(), 0);
    }

    #[test]
    fn closed_ring_fails_submission() {
        let keys = derive_session_keys(b"test_root", 0, Role::Initiator);
        let ring = Arc::new(KeyRing::new(keys, KeyRingConfig::default()));
        let mut enc = Encoder::new(ring.clone());

        ring.close();
        assert_eq!(enc.submit(b"late").unwrap_err(), TransportError::SessionClosed);
    }
}
