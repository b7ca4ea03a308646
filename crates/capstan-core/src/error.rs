//! Error taxonomy for the transport pipeline.
//!
//! Strongly-typed errors distinguishing three classes: fatal-to-session
//! (tampering, desync, exhaustion), usage errors (operating on a terminal
//! session), and recoverable per-frame conditions - the latter never appear
//! here at all, they are absorbed by the decoder and surfaced as
//! [`FeedReport`](crate::FeedReport) events.

use capstan_crypto::KeyRingError;
use capstan_proto::WireError;
use thiserror::Error;

/// Errors surfaced by the transport pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// AEAD tag verification failed on an inbound frame.
    ///
    /// Indicates tampering or key mismatch. Fatal: a transport that has seen
    /// one forged-but-framed message cannot trust any later one.
    #[error("authentication failure on frame {sequence}")]
    AuthenticationFailure {
        /// Sequence claimed by the offending frame
        sequence: u64,
    },

    /// The inbound byte stream desynchronized (corrupt length field).
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] WireError),

    /// An authenticated frame arrived too far ahead of the delivery gap.
    ///
    /// The sender outran the reorder buffer without the gap resolving;
    /// in-order delivery can no longer be guaranteed.
    #[error(
        "reorder buffer overflow: frame {sequence} with {next_expected} undelivered, window {window}"
    )]
    ReorderBufferOverflow {
        /// Sequence of the frame that exceeded the window
        sequence: u64,
        /// Next sequence owed to the consumer
        next_expected: u64,
        /// Configured reorder window
        window: u64,
    },

    /// Send nonce counter is exhausted; keys must rotate before continuing.
    #[error("nonce counter exhausted; rotate keys")]
    NonceExhausted,

    /// Submitted chunk exceeds the maximum sealable size.
    #[error("chunk of {len} bytes exceeds maximum {max}")]
    ChunkTooLarge {
        /// Submitted payload length
        len: usize,
        /// Maximum chunk size
        max: usize,
    },

    /// The byte channel failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// Operation attempted on a closed session.
    #[error("session is closed")]
    SessionClosed,

    /// Operation attempted on a faulted session.
    ///
    /// The original fault reason is queryable via
    /// [`PipelineSession::fault`](crate::PipelineSession::fault).
    #[error("session is faulted")]
    SessionFaulted,
}

impl TransportError {
    /// Returns true if this error must transition the session to `Faulted`.
    ///
    /// Usage errors (`SessionClosed`, `SessionFaulted`, `ChunkTooLarge`)
    /// reject the single operation without changing session state.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationFailure { .. }
            | Self::MalformedFrame(_)
            | Self::ReorderBufferOverflow { .. }
            | Self::NonceExhausted
            | Self::Channel(_) => true,
            Self::ChunkTooLarge { .. } | Self::SessionClosed | Self::SessionFaulted => false,
        }
    }
}

/// Map key ring failures that escape the recoverable-drop path.
impl From<KeyRingError> for TransportError {
    fn from(err: KeyRingError) -> Self {
        match err {
            KeyRingError::NonceExhausted { .. } => Self::NonceExhausted,
            KeyRingError::Closed => Self::SessionClosed,
            // Recoverable variants are handled (dropped + logged) before
            // conversion; reaching here means a frame was rejected in a
            // context that cannot drop it, which only happens at send time.
            KeyRingError::StaleEpoch { .. }
            | KeyRingError::UnknownEpoch { .. }
            | KeyRingError::Replayed { .. } => Self::SessionClosed,
        }
    }
}
