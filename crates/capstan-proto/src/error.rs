//! Error types for wire framing.

use thiserror::Error;

/// Result type for wire protocol operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors from frame encoding and decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer is shorter than a complete header or the payload it claims.
    ///
    /// For one-shot decoding this is an error; the streaming [`FrameCodec`]
    /// treats the same condition as "buffer more bytes" instead.
    ///
    /// [`FrameCodec`]: crate::FrameCodec
    #[error("frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes required for the complete frame
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Header claims a ciphertext length above the 1 MiB cap.
    ///
    /// This indicates stream desynchronization or a hostile peer. There is no
    /// way to resynchronize a length-prefixed stream after a corrupt length
    /// field, so this is fatal to the session.
    #[error("ciphertext length {len} exceeds maximum {max}")]
    Oversized {
        /// Length claimed by the header
        len: usize,
        /// Maximum permitted ciphertext length
        max: usize,
    },

    /// Header claims a ciphertext shorter than the authentication tag.
    ///
    /// Every sealed payload carries a trailing 16-byte Poly1305 tag; a shorter
    /// ciphertext cannot have been produced by a conforming encoder.
    #[error("ciphertext length {len} is shorter than the {tag}-byte tag")]
    TagMissing {
        /// Length claimed by the header
        len: usize,
        /// Required trailing tag size
        tag: usize,
    },
}

impl WireError {
    /// Returns true if this error indicates an unrecoverable desync.
    ///
    /// Malformed errors are fatal to the session. `FrameTooShort` is only a
    /// signal to buffer more input when decoding from a stream.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Oversized { .. } | Self::TagMissing { .. })
    }
}
