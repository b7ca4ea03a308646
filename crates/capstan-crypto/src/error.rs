//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors from AEAD sealing and opening.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication tag did not verify (tampering or wrong key).
    ///
    /// The underlying primitive compares tags in constant time and reports
    /// a single opaque failure; no detail is available by design.
    #[error("authentication failed: tag mismatch")]
    AuthenticationFailed,

    /// Ciphertext is too short to contain an authentication tag.
    #[error("ciphertext too short: {len} bytes, need at least {min}")]
    CiphertextTooShort {
        /// Actual ciphertext length
        len: usize,
        /// Minimum valid length (tag size)
        min: usize,
    },
}

impl CryptoError {
    /// Returns true if this error is fatal to the session.
    ///
    /// Both variants indicate tampering or a broken peer; neither is
    /// recoverable within the session.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationFailed | Self::CiphertextTooShort { .. } => true,
        }
    }
}

/// Errors from key ring operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyRingError {
    /// Send nonce counter would wrap past `2^64 - 1`.
    ///
    /// Continuing would reuse a (key, nonce) pair, which breaks the AEAD's
    /// confidentiality guarantee. The caller must rotate keys.
    #[error("nonce counter exhausted in epoch {epoch}")]
    NonceExhausted {
        /// Epoch whose counter ran out
        epoch: u32,
    },

    /// Frame epoch has been retired (older than the grace window allows).
    #[error("stale epoch {epoch}: current is {current}")]
    StaleEpoch {
        /// Epoch claimed by the frame
        epoch: u32,
        /// Current epoch of the ring
        current: u32,
    },

    /// Frame epoch is ahead of anything this ring has installed.
    #[error("unknown epoch {epoch}: current is {current}")]
    UnknownEpoch {
        /// Epoch claimed by the frame
        epoch: u32,
        /// Current epoch of the ring
        current: u32,
    },

    /// Sequence number was already accepted or fell behind the replay window.
    #[error("replayed sequence {sequence}")]
    Replayed {
        /// The duplicated or too-old sequence number
        sequence: u64,
    },

    /// The ring has been closed; all key material is gone.
    #[error("key ring is closed")]
    Closed,
}

impl KeyRingError {
    /// Returns true if the offending frame can simply be dropped.
    ///
    /// Replays and stale/unknown epochs are expected on an adversarial or
    /// reordering transport; the session logs and continues. Exhaustion and
    /// use-after-close must surface to the caller.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::StaleEpoch { .. } | Self::UnknownEpoch { .. } | Self::Replayed { .. } => true,
            Self::NonceExhausted { .. } | Self::Closed => false,
        }
    }
}
