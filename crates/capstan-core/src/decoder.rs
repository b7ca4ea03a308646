//! Receive-side pipeline: reassembly, replay rejection, verification,
//! in-order delivery.
//!
//! The decoder consumes raw bytes at arbitrary split points, decodes as many
//! complete frames as are available, and classifies each one:
//!
//! - replayed or stale-epoch frames are dropped, logged, and reported - the
//!   chunk stream continues uninterrupted
//! - authentication failures, malformed framing, and reorder overflow are
//!   fatal and must fault the session
//! - valid frames park in a bounded reorder buffer until every lower
//!   sequence has been delivered, preserving strict in-order delivery

use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use capstan_crypto::{KeyRing, KeyRingError, aead};
use capstan_proto::{Frame, FrameCodec};

use crate::{chunk::PlaintextChunk, error::TransportError};

/// Default reorder window: how many frames may park ahead of the gap.
pub const DEFAULT_REORDER_WINDOW: u64 = 64;

/// A frame dropped for a recoverable reason.
///
/// Surfaced for observability only; dropped frames never interrupt the
/// stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFrame {
    /// Epoch claimed by the frame
    pub epoch: u32,
    /// Sequence claimed by the frame
    pub sequence: u64,
    /// Why the frame was dropped
    pub reason: KeyRingError,
}

/// Outcome of one [`Decoder::feed`] call.
///
/// Finite per call, restartable across calls: chunks not yet deliverable
/// stay parked inside the decoder and appear in a later report once the gap
/// closes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeedReport {
    /// Chunks released in strict sequence order
    pub chunks: Vec<PlaintextChunk>,
    /// Frames dropped for recoverable reasons (replay, stale epoch)
    pub rejected: Vec<RejectedFrame>,
}

/// Opens wire frames back into an ordered chunk stream.
pub struct Decoder {
    ring: Arc<KeyRing>,
    codec: FrameCodec,
    /// Authenticated frames waiting for the gap below them to close
    parked: BTreeMap<u64, Bytes>,
    /// Next sequence owed to the consumer
    next_expected: u64,
    reorder_window: u64,
}

impl Decoder {
    /// Create a decoder resolving keys and replay state from the given ring.
    #[must_use]
    pub fn new(ring: Arc<KeyRing>, reorder_window: u64) -> Self {
        Self {
            ring,
            codec: FrameCodec::new(),
            parked: BTreeMap::new(),
            next_expected: 0,
            reorder_window: reorder_window.max(1),
        }
    }

    /// Next sequence number owed to the consumer.
    #[must_use]
    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    /// Number of authenticated frames parked behind a delivery gap.
    #[must_use]
    pub fn parked(&self) -> usize {
        self.parked.len()
    }

    /// Consume raw transport bytes and release every chunk that became
    /// deliverable.
    ///
    /// Incomplete trailing input is buffered silently. Replayed and
    /// stale-epoch frames are dropped and reported in
    /// [`FeedReport::rejected`].
    ///
    /// # Errors
    ///
    /// Fatal conditions only - the caller must fault the session and stop
    /// feeding:
    ///
    /// - [`TransportError::MalformedFrame`] on stream desync
    /// - [`TransportError::AuthenticationFailure`] on tag mismatch
    /// - [`TransportError::ReorderBufferOverflow`] when the gap outgrows the
    ///   window
    /// - [`TransportError::SessionClosed`] if the ring was closed underneath
    pub fn feed(&mut self, bytes: &[u8]) -> Result<FeedReport, TransportError> {
        self.codec.feed(bytes);

        let mut report = FeedReport::default();
        while let Some(frame) = self.codec.next_frame()? {
            self.process_frame(frame, &mut report)?;
        }
        Ok(report)
    }

    /// Classify one complete frame and release any newly deliverable chunks.
    fn process_frame(
        &mut self,
        frame: Frame,
        report: &mut FeedReport,
    ) -> Result<(), TransportError> {
        let epoch = frame.header.epoch();
        let sequence = frame.header.sequence();

        // Replay screen first: cheap, and duplicates must not reach the AEAD
        if let Err(reason) = self.ring.check_replay(sequence) {
            return self.reject(epoch, sequence, reason, report);
        }

        let key = match self.ring.open_key(epoch) {
            Ok(key) => key,
            Err(reason) => return self.reject(epoch, sequence, reason, report),
        };

        let aad = aead::build_nonce(epoch, sequence);
        let plaintext = aead::open(&key, epoch, sequence, &aad, &frame.ciphertext)
            .map_err(|_| TransportError::AuthenticationFailure { sequence })?;

        // Only authenticated frames may touch the replay window or the
        // overflow check; forged input must not be able to fault the session
        // or block legitimate sequence numbers.
        self.ring.record_receive(sequence)?;

        if sequence < self.next_expected {
            // Already delivered but outside the replay window (possible only
            // with a window smaller than the delivery history)
            return self.reject(epoch, sequence, KeyRingError::Replayed { sequence }, report);
        }

        if sequence >= self.next_expected + self.reorder_window {
            return Err(TransportError::ReorderBufferOverflow {
                sequence,
                next_expected: self.next_expected,
                window: self.reorder_window,
            });
        }

        self.parked.insert(sequence, Bytes::from(plaintext));
        self.release(report);
        Ok(())
    }

    /// Drop a frame for a recoverable reason, keeping the stream alive.
    fn reject(
        &mut self,
        epoch: u32,
        sequence: u64,
        reason: KeyRingError,
        report: &mut FeedReport,
    ) -> Result<(), TransportError> {
        if !reason.is_recoverable() {
            return Err(reason.into());
        }
        tracing::warn!(epoch, sequence, %reason, "dropping frame");
        report.rejected.push(RejectedFrame { epoch, sequence, reason });
        Ok(())
    }

    /// Move every consecutively-available chunk out of the parking buffer.
    fn release(&mut self, report: &mut FeedReport) {
        while let Some(payload) = self.parked.remove(&self.next_expected) {
            report.chunks.push(PlaintextChunk { sequence: self.next_expected, payload });
            self.next_expected += 1;
        }
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("next_expected", &self.next_expected)
            .field("parked", &self.parked.len())
            .field("buffered_bytes", &self.codec.buffered())
            .finish_non_exhaustive()
    }
}
