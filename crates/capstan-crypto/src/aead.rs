//! Frame sealing and opening with ChaCha20-Poly1305.
//!
//! Pure functions over explicit inputs - no internal state, no randomness.
//! Nonces are constructed deterministically from the (epoch, sequence) slot
//! that the [`KeyRing`](crate::KeyRing) hands out, and the same slot bytes
//! are bound to the ciphertext as associated data.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::{error::CryptoError, keys::AeadKey};

/// ChaCha20-Poly1305 nonce size (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Build the 96-bit nonce for a frame slot.
///
/// Structure:
/// - bytes 0-3: epoch (big-endian)
/// - bytes 4-11: sequence (big-endian)
///
/// The sequence counter never repeats within a session and the epoch changes
/// on every rotation, so each (key, nonce) pair is used exactly once.
#[must_use]
pub fn build_nonce(epoch: u32, sequence: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[0..4].copy_from_slice(&epoch.to_be_bytes());
    nonce[4..12].copy_from_slice(&sequence.to_be_bytes());
    nonce
}

/// Seal a plaintext chunk for the given frame slot.
///
/// Returns `ciphertext || tag`. Deterministic given its inputs.
///
/// # Security
///
/// - `aad` is covered by the authentication tag; callers pass the frame's
///   slot bytes so header tampering is detected even though the header
///   travels in the clear
/// - Encryption cannot fail with a valid 256-bit key and 96-bit nonce
pub fn seal(key: &AeadKey, epoch: u32, sequence: u64, aad: &[u8], plaintext: &[u8]) -> Vec<u8> {
    let nonce = build_nonce(epoch, sequence);
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
    else {
        unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    ciphertext
}

/// Open a sealed frame payload for the given frame slot.
///
/// Returns the plaintext chunk.
///
/// # Errors
///
/// - [`CryptoError::CiphertextTooShort`] if the input cannot contain a tag
/// - [`CryptoError::AuthenticationFailed`] if the tag does not verify
///   (ciphertext or header was tampered with, or the key is wrong)
pub fn open(
    key: &AeadKey,
    epoch: u32,
    sequence: u64,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::CiphertextTooShort { len: ciphertext.len(), min: TAG_SIZE });
    }

    let nonce = build_nonce(epoch, sequence);
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(&nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn test_key() -> AeadKey {
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = i as u8;
        }
        AeadKey::new(bytes)
    }

    #[test]
    fn seal_open_round_trip() {
        let key = test_key();
        let aad = b"header bytes";

        let sealed = seal(&key, 1, 42, aad, b"hello, world");
        let opened = open(&key, 1, 42, aad, &sealed).unwrap();

        assert_eq!(opened, b"hello, world");
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let key = test_key();

        let sealed = seal(&key, 0, 0, b"", b"");
        assert_eq!(sealed.len(), TAG_SIZE);

        let opened = open(&key, 0, 0, b"", &sealed).unwrap();
        assert!(opened.is_empty());
    }

    #[test]
    fn ciphertext_adds_exactly_one_tag() {
        let key = test_key();
        let plaintext = b"sixteen bytes!!!";

        let sealed = seal(&key, 0, 0, b"", plaintext);
        assert_eq!(sealed.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = test_key();
        let mut sealed = seal(&key, 0, 0, b"aad", b"payload");
        sealed[0] ^= 0x01;

        assert_eq!(open(&key, 0, 0, b"aad", &sealed), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn tampered_aad_fails() {
        let key = test_key();
        let sealed = seal(&key, 0, 0, b"aad", b"payload");

        assert_eq!(open(&key, 0, 0, b"axd", &sealed), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn wrong_slot_fails() {
        // Same key, different (epoch, sequence) means a different nonce
        let key = test_key();
        let sealed = seal(&key, 0, 7, b"", b"payload");

        assert_eq!(open(&key, 0, 8, b"", &sealed), Err(CryptoError::AuthenticationFailed));
        assert_eq!(open(&key, 1, 7, b"", &sealed), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn short_ciphertext_is_rejected_before_decryption() {
        let key = test_key();
        let result = open(&key, 0, 0, b"", &[0u8; 5]);
        assert_eq!(result, Err(CryptoError::CiphertextTooShort { len: 5, min: 16 }));
    }

    #[test]
    fn nonce_structure() {
        let nonce = build_nonce(0x0102_0304, 0x0506_0708_090A_0B0C);
        assert_eq!(&nonce[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&nonce[4..12], &[0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C]);
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            plaintext in prop::collection::vec(any::<u8>(), 0..2048),
            aad in prop::collection::vec(any::<u8>(), 0..64),
            epoch in any::<u32>(),
            sequence in any::<u64>(),
        ) {
            let key = test_key();
            let sealed = seal(&key, epoch, sequence, &aad, &plaintext);
            let opened = open(&key, epoch, sequence, &aad, &sealed)
                .expect("untampered frame must open");
            prop_assert_eq!(opened, plaintext);
        }

        #[test]
        fn prop_any_bit_flip_fails(
            plaintext in prop::collection::vec(any::<u8>(), 1..256),
            flip_byte in any::<prop::sample::Index>(),
            flip_bit in 0u8..8,
        ) {
            let key = test_key();
            let mut sealed = seal(&key, 0, 0, b"", &plaintext);
            let idx = flip_byte.index(sealed.len());
            sealed[idx] ^= 1 << flip_bit;

            prop_assert_eq!(
                open(&key, 0, 0, b"", &sealed),
                Err(CryptoError::AuthenticationFailed)
            );
        }
    }
}
