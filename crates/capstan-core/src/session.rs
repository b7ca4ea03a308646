//! Pipeline session state machine.
//!
//! Owns the key ring, both pipeline directions, and the duplex byte channel,
//! and drives the session lifecycle:
//!
//! ```text
//! ┌─────────┐ keys installed ┌────────┐  rotate()   ┌──────────┐
//! │ Opening │───────────────>│ Active │────────────>│ Rotating │
//! └─────────┘                └────────┘<────────────└──────────┘
//!                               │   │   grace spent
//!                       close() │   │ fatal error
//!                               ▼   ▼
//!                        ┌────────┐ ┌─────────┐
//!                        │ Closed │ │ Faulted │   (both terminal)
//!                        └────────┘ └─────────┘
//! ```
//!
//! Send and receive paths touch disjoint halves of the ring, so a caller may
//! drive `send` and `pump` from two threads by splitting the session behind
//! its own synchronization; each individual path is single-writer.

use std::sync::Arc;

use capstan_crypto::{KeyRing, KeyRingConfig, SessionKeys};

use crate::{
    channel::ByteChannel,
    chunk::PlaintextChunk,
    decoder::{DEFAULT_REORDER_WINDOW, Decoder, FeedReport},
    encoder::Encoder,
    error::TransportError,
};

/// Default upper bound on bytes pulled from the channel per `pump` call.
pub const DEFAULT_READ_CHUNK: usize = 64 * 1024;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Keys not yet installed
    Opening,
    /// Bidirectional traffic flowing
    Active,
    /// New epoch installed, previous epoch draining through its grace window
    Rotating,
    /// Gracefully closed (terminal)
    Closed,
    /// Halted by a fatal error (terminal); reason queryable via
    /// [`PipelineSession::fault`]
    Faulted,
}

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Key ring limits (replay window, rotation grace)
    pub keyring: KeyRingConfig,
    /// Reorder buffer bound, in frames
    pub reorder_window: u64,
    /// Maximum bytes read from the channel per [`PipelineSession::pump`]
    pub read_chunk: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keyring: KeyRingConfig::default(),
            reorder_window: DEFAULT_REORDER_WINDOW,
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

/// Orchestrates encoder and decoder over a duplex byte channel.
///
/// # Error Discipline
///
/// Fatal errors transition the session to [`SessionState::Faulted`], record
/// the reason, and halt all further I/O; the error is returned to the caller
/// and every later operation fails with [`TransportError::SessionFaulted`].
/// Per-frame recoverable conditions never surface as errors (see
/// [`Decoder`]). Nothing is retried automatically - retry policy belongs to
/// the caller.
#[derive(Debug)]
pub struct PipelineSession<C> {
    state: SessionState,
    ring: Arc<KeyRing>,
    encoder: Encoder,
    decoder: Decoder,
    channel: C,
    read_chunk: usize,
    fault: Option<TransportError>,
}

impl<C: ByteChannel> PipelineSession<C> {
    /// Install session keys and open the pipeline over `channel`.
    ///
    /// The session passes through `Opening` and lands in `Active` once the
    /// ring holds the keys.
    #[must_use]
    pub fn open(keys: SessionKeys, config: SessionConfig, channel: C) -> Self {
        let mut session = Self::assemble(keys, config, channel);
        debug_assert_eq!(session.state, SessionState::Opening);
        session.state = SessionState::Active;
        tracing::debug!(epoch = session.ring.current_epoch().ok(), "session active");
        session
    }

    fn assemble(keys: SessionKeys, config: SessionConfig, channel: C) -> Self {
        let ring = Arc::new(KeyRing::new(keys, config.keyring));
        Self {
            state: SessionState::Opening,
            encoder: Encoder::new(ring.clone()),
            decoder: Decoder::new(ring.clone(), config.reorder_window),
            ring,
            channel,
            read_chunk: config.read_chunk.max(1),
            fault: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Terminal fault reason, if the session has faulted.
    #[must_use]
    pub fn fault(&self) -> Option<&TransportError> {
        self.fault.as_ref()
    }

    /// Seal one chunk and write it to the channel.
    ///
    /// # Errors
    ///
    /// - [`TransportError::ChunkTooLarge`] (usage; session stays up)
    /// - [`TransportError::NonceExhausted`] (fatal unless the caller rotated
    ///   proactively; the session faults)
    /// - [`TransportError::Channel`] on write failure (fatal)
    /// - [`TransportError::SessionClosed`] / [`TransportError::SessionFaulted`]
    ///   in terminal states
    pub fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.ensure_live()?;

        let wire = match self.encoder.submit(payload) {
            Ok(wire) => wire,
            Err(err) => return Err(self.absorb(err)),
        };

        if let Err(io_err) = self.channel.write(&wire) {
            return Err(self.enter_fault(TransportError::Channel(io_err.to_string())));
        }
        Ok(())
    }

    /// Pull available bytes from the channel and release deliverable chunks.
    ///
    /// Returns an empty vector when the channel had nothing to read. Also
    /// completes a pending rotation once the previous epoch's grace window
    /// has been fully spent.
    ///
    /// # Errors
    ///
    /// Fatal decode errors (see [`Decoder::feed`]); the session faults and
    /// the reason is recorded.
    pub fn pump(&mut self) -> Result<Vec<PlaintextChunk>, TransportError> {
        self.ensure_live()?;

        let bytes = match self.channel.read(self.read_chunk) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(Vec::new()),
            Err(io_err) => {
                return Err(self.enter_fault(TransportError::Channel(io_err.to_string())));
            },
        };

        let FeedReport { chunks, rejected } = match self.decoder.feed(&bytes) {
            Ok(report) => report,
            Err(err) => return Err(self.absorb(err)),
        };

        if !rejected.is_empty() {
            tracing::debug!(dropped = rejected.len(), "recoverable frame drops this pump");
        }

        if self.state == SessionState::Rotating && !self.ring.rotation_pending() {
            self.state = SessionState::Active;
            tracing::debug!(epoch = self.ring.current_epoch().ok(), "rotation complete");
        }

        Ok(chunks)
    }

    /// Begin a key rotation, transparent to in-flight traffic.
    ///
    /// Frames sealed under the previous epoch keep decrypting until the
    /// grace window elapses; the session returns to `Active` on the `pump`
    /// that observes the window spent.
    pub fn rotate(&mut self, new_keys: SessionKeys) -> Result<(), TransportError> {
        self.ensure_live()?;

        let epoch = new_keys.epoch();
        self.ring.rotate(new_keys)?;
        self.state = SessionState::Rotating;
        tracing::debug!(epoch, "rotation started");
        Ok(())
    }

    /// Gracefully close the session, zeroizing all key material.
    ///
    /// Idempotent from any state; a faulted session stays faulted.
    pub fn close(&mut self) {
        self.ring.close();
        if self.state != SessionState::Faulted {
            self.state = SessionState::Closed;
        }
    }

    /// Reject operations in terminal states.
    fn ensure_live(&self) -> Result<(), TransportError> {
        match self.state {
            SessionState::Closed => Err(TransportError::SessionClosed),
            SessionState::Faulted => Err(TransportError::SessionFaulted),
            SessionState::Opening | SessionState::Active | SessionState::Rotating => Ok(()),
        }
    }

    /// Fault on fatal errors; pass usage errors through unchanged.
    fn absorb(&mut self, err: TransportError) -> TransportError {
        if err.is_fatal() { self.enter_fault(err) } else { err }
    }

    /// Transition to `Faulted`, record the reason, and zeroize keys.
    fn enter_fault(&mut self, err: TransportError) -> TransportError {
        tracing::error!(error = %err, "session faulted");
        self.state = SessionState::Faulted;
        self.fault = Some(err.clone());
        self.ring.close();
        err
    }
}

#[cfg(test)]
mod tests {
    use capstan_crypto::{Role, derive_session_keys};

    use super::*;
    use crate::testing::MemoryChannel;

    const ROOT: &[u8] = b"test_root_secret_material_here!!";

    fn session_pair() -> (PipelineSession<MemoryChannel>, PipelineSession<MemoryChannel>) {
        let (left, right) = MemoryChannel::duplex();
        let initiator = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Initiator),
            SessionConfig::default(),
            left,
        );
        let responder = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Responder),
            SessionConfig::default(),
            right,
        );
        (initiator, responder)
    }

    #[test]
    fn open_lands_in_active() {
        let (session, _) = session_pair();
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.fault().is_none());
    }

    #[test]
    fn duplex_round_trip() {
        let (mut alice, mut bob) = session_pair();

        alice.send(b"hello bob").unwrap();
        bob.send(b"hello alice").unwrap();

        let to_bob = bob.pump().unwrap();
        assert_eq!(to_bob.len(), 1);
        assert_eq!(to_bob[0].payload.as_ref(), b"hello bob");

        let to_alice = alice.pump().unwrap();
        assert_eq!(to_alice.len(), 1);
        assert_eq!(to_alice[0].payload.as_ref(), b"hello alice");
    }

    #[test]
    fn pump_with_no_data_is_empty() {
        let (mut alice, _bob) = session_pair();
        assert!(alice.pump().unwrap().is_empty());
        assert_eq!(alice.state(), SessionState::Active);
    }

    #[test]
    fn closed_session_rejects_everything() {
        let (mut alice, _bob) = session_pair();
        alice.close();

        assert_eq!(alice.state(), SessionState::Closed);
        assert_eq!(alice.send(b"x").unwrap_err(), TransportError::SessionClosed);
        assert_eq!(alice.pump().unwrap_err(), TransportError::SessionClosed);
        let keys = derive_session_keys(ROOT, 1, Role::Initiator);
        assert_eq!(alice.rotate(keys).unwrap_err(), TransportError::SessionClosed);
    }

    #[test]
    fn tampering_faults_the_receiver() {
        let (left, right) = MemoryChannel::duplex();
        let tap = right.clone();
        let mut alice = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Initiator),
            SessionConfig::default(),
            left,
        );
        let mut bob = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Responder),
            SessionConfig::default(),
            right,
        );

        alice.send(b"payload").unwrap();
        tap.corrupt_next_read(|bytes| {
            let last = bytes.len() - 1;
            bytes[last] ^= 0x01;
        });

        let result = bob.pump();
        assert_eq!(result, Err(TransportError::AuthenticationFailure { sequence: 0 }));
        assert_eq!(bob.state(), SessionState::Faulted);
        assert_eq!(bob.fault(), Some(&TransportError::AuthenticationFailure { sequence: 0 }));

        // Terminal: every later operation fails with the usage error
        assert_eq!(bob.send(b"x").unwrap_err(), TransportError::SessionFaulted);
        assert_eq!(bob.pump().unwrap_err(), TransportError::SessionFaulted);
    }

    #[test]
    fn faulted_session_stays_faulted_after_close() {
        let (left, right) = MemoryChannel::duplex();
        let tap = right.clone();
        let mut alice = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Initiator),
            SessionConfig::default(),
            left,
        );
        let mut bob = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Responder),
            SessionConfig::default(),
            right,
        );

        alice.send(b"payload").unwrap();
        tap.corrupt_next_read(|bytes| {
            // Flip a ciphertext bit so authentication fails
            bytes[20] ^= 0xFF;
        });
        let _ = bob.pump();
        assert_eq!(bob.state(), SessionState::Faulted);

        bob.close();
        assert_eq!(bob.state(), SessionState::Faulted);
        assert_eq!(bob.pump().unwrap_err(), TransportError::SessionFaulted);
    }

    #[test]
    fn rotation_round_trip_returns_to_active() {
        let config = SessionConfig {
            keyring: KeyRingConfig { replay_window: 1024, grace_frames: 1 },
            ..SessionConfig::default()
        };
        let (left, right) = MemoryChannel::duplex();
        let mut alice = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Initiator),
            config.clone(),
            left,
        );
        let mut bob = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Responder),
            config,
            right,
        );

        // One epoch-0 frame left in flight across the rotation
        alice.send(b"in flight").unwrap();

        alice.rotate(derive_session_keys(ROOT, 1, Role::Initiator)).unwrap();
        bob.rotate(derive_session_keys(ROOT, 1, Role::Responder)).unwrap();
        assert_eq!(bob.state(), SessionState::Rotating);

        // The in-flight frame decrypts under the grace window and spends it
        let chunks = bob.pump().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload.as_ref(), b"in flight");
        assert_eq!(bob.state(), SessionState::Active, "grace spent, rotation complete");

        // Traffic continues under the new epoch
        alice.send(b"epoch one").unwrap();
        let chunks = bob.pump().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload.as_ref(), b"epoch one");
    }

    #[test]
    fn rotation_completes_without_old_epoch_traffic() {
        let config = SessionConfig {
            keyring: KeyRingConfig { replay_window: 1024, grace_frames: 4 },
            ..SessionConfig::default()
        };
        let (left, right) = MemoryChannel::duplex();
        let mut alice = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Initiator),
            config.clone(),
            left,
        );
        let mut bob = PipelineSession::open(
            derive_session_keys(ROOT, 0, Role::Responder),
            config,
            right,
        );

        // Nothing in flight when both sides rotate
        alice.rotate(derive_session_keys(ROOT, 1, Role::Initiator)).unwrap();
        bob.rotate(derive_session_keys(ROOT, 1, Role::Responder)).unwrap();
        assert_eq!(bob.state(), SessionState::Rotating);

        // New-epoch traffic alone must spend the grace window
        for i in 0..4u32 {
            alice.send(format!("msg {i}").as_bytes()).unwrap();
        }
        let chunks = bob.pump().unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(bob.state(), SessionState::Active, "rotation must not stall forever");
    }

    #[test]
    fn oversized_chunk_does_not_fault_the_session() {
        let (mut alice, _bob) = session_pair();

        let too_big = vec![0u8; crate::MAX_CHUNK_SIZE + 1];
        assert!(matches!(
            alice.send(&too_big),
            Err(TransportError::ChunkTooLarge { .. })
        ));
        assert_eq!(alice.state(), SessionState::Active);

        alice.send(b"still fine").unwrap();
    }
}
