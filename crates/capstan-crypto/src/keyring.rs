//! Session key ring: key lifecycle, nonce state, and replay protection.
//!
//! The `KeyRing` exclusively owns all key material for one session. It hands
//! out send slots (epoch + sequence + seal key) to the encoder, resolves open
//! keys for the decoder, and tracks which sequence numbers have already been
//! accepted.
//!
//! # Locking
//!
//! Send and receive paths touch disjoint state and never contend with each
//! other: the send counter is a lone atomic, the replay window has its own
//! mutex, and the epoch chain mutex is held only for key clones and rotation.

use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use crate::{
    error::KeyRingError,
    keys::{AeadKey, SessionKeys},
};

/// Default replay window size (sequence numbers tracked behind the highest).
pub const DEFAULT_REPLAY_WINDOW: u64 = 1024;

/// Default rotation grace budget, counted in frames received after rotation.
pub const DEFAULT_GRACE_FRAMES: u32 = 64;

/// Tunable limits for a key ring.
#[derive(Debug, Clone)]
pub struct KeyRingConfig {
    /// How far behind the highest accepted sequence a frame may arrive.
    pub replay_window: u64,
    /// How many frames may be received after a rotation before the previous
    /// epoch's keys are zeroized.
    pub grace_frames: u32,
}

impl Default for KeyRingConfig {
    fn default() -> Self {
        Self { replay_window: DEFAULT_REPLAY_WINDOW, grace_frames: DEFAULT_GRACE_FRAMES }
    }
}

/// Everything the encoder needs to seal one frame.
#[derive(Debug)]
pub struct SendSlot {
    /// Epoch the frame is sealed under
    pub epoch: u32,
    /// Sequence number assigned to the frame
    pub sequence: u64,
    /// Seal key for this epoch
    pub key: AeadKey,
}

/// Previous-epoch keys kept alive through the rotation grace window.
struct PreviousEpoch {
    keys: SessionKeys,
    grace_remaining: u32,
}

/// Current keys plus at most one retiring epoch.
struct EpochChain {
    current: SessionKeys,
    previous: Option<PreviousEpoch>,
}

/// Sliding-window duplicate detector over accepted sequence numbers.
///
/// Slots store the exact sequence accepted, so modulo collisions cannot
/// produce false rejections: two in-window sequences hitting the same slot
/// would have to differ by a full window, and the older one is rejected by
/// the age check first.
struct ReplayWindow {
    slots: Vec<Option<u64>>,
    highest: Option<u64>,
    window: u64,
}

impl ReplayWindow {
    fn new(window: u64) -> Self {
        Self { slots: vec![None; window as usize], highest: None, window }
    }

    /// Would this sequence be a duplicate or fall behind the window?
    fn check(&self, sequence: u64) -> Result<(), KeyRingError> {
        let Some(highest) = self.highest else {
            return Ok(());
        };

        if sequence <= highest {
            if highest - sequence >= self.window {
                return Err(KeyRingError::Replayed { sequence });
            }
            if self.slots[(sequence % self.window) as usize] == Some(sequence) {
                return Err(KeyRingError::Replayed { sequence });
            }
        }

        Ok(())
    }

    /// Mark a sequence as accepted. Call only after authentication succeeds.
    fn record(&mut self, sequence: u64) {
        self.slots[(sequence % self.window) as usize] = Some(sequence);
        if self.highest.is_none_or(|h| sequence > h) {
            self.highest = Some(sequence);
        }
    }
}

/// Owns session keys, nonce counters, and the replay window.
///
/// # Epoch Model
///
/// At most two epochs are live: the current one and, during a rotation grace
/// window, the previous one (for frames still in flight when the rotation
/// happened). The send path always seals under the current epoch.
///
/// The send sequence counter is continuous across rotations. Delivery order
/// is defined by sequence alone, and (epoch, counter) uniqueness holds a
/// fortiori since the counter never repeats at all.
pub struct KeyRing {
    config: KeyRingConfig,
    send_counter: AtomicU64,
    epochs: Mutex<Option<EpochChain>>,
    replay: Mutex<ReplayWindow>,
    closed: AtomicBool,
}

/// Recover the guard from a poisoned lock.
///
/// Key ring state stays consistent even if a holder panicked: every critical
/// section either completes its field writes or touches a single field.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl KeyRing {
    /// Install initial session keys and start counting from sequence 0.
    #[must_use]
    pub fn new(keys: SessionKeys, config: KeyRingConfig) -> Self {
        let replay_window = config.replay_window.max(1);
        Self {
            config,
            send_counter: AtomicU64::new(0),
            epochs: Mutex::new(Some(EpochChain { current: keys, previous: None })),
            replay: Mutex::new(ReplayWindow::new(replay_window)),
            closed: AtomicBool::new(false),
        }
    }

    /// Install keys with the send counter already advanced.
    #[cfg(test)]
    fn with_send_counter(keys: SessionKeys, config: KeyRingConfig, counter: u64) -> Self {
        let ring = Self::new(keys, config);
        ring.send_counter.store(counter, Ordering::Relaxed);
        ring
    }

    /// Current epoch identifier.
    pub fn current_epoch(&self) -> Result<u32, KeyRingError> {
        let guard = lock(&self.epochs);
        let chain = guard.as_ref().ok_or(KeyRingError::Closed)?;
        Ok(chain.current.epoch())
    }

    /// Reserve the next send slot: epoch, sequence, and seal key.
    ///
    /// Sequence numbers are assigned in strictly increasing order with no
    /// gaps or repeats, atomically across threads.
    ///
    /// # Errors
    ///
    /// - [`KeyRingError::NonceExhausted`] if the counter would wrap past
    ///   `2^64 - 1`; the caller must rotate before continuing
    /// - [`KeyRingError::Closed`] after [`close`](Self::close)
    pub fn next_send(&self) -> Result<SendSlot, KeyRingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KeyRingError::Closed);
        }

        let guard = lock(&self.epochs);
        let chain = guard.as_ref().ok_or(KeyRingError::Closed)?;
        let epoch = chain.current.epoch();

        // CAS loop so the exhaustion check and the increment are one step;
        // a plain fetch_add would wrap before we could notice.
        let mut current = self.send_counter.load(Ordering::Relaxed);
        let sequence = loop {
            if current == u64::MAX {
                return Err(KeyRingError::NonceExhausted { epoch });
            }
            match self.send_counter.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(seq) => break seq,
                Err(actual) => current = actual,
            }
        };

        Ok(SendSlot { epoch, sequence, key: chain.current.seal_key().clone() })
    }

    /// Resolve the open key for a frame's epoch.
    ///
    /// # Errors
    ///
    /// - [`KeyRingError::StaleEpoch`] for epochs already retired (recoverable:
    ///   drop the frame)
    /// - [`KeyRingError::UnknownEpoch`] for epochs never installed
    ///   (recoverable: drop the frame)
    /// - [`KeyRingError::Closed`] after [`close`](Self::close)
    pub fn open_key(&self, epoch: u32) -> Result<AeadKey, KeyRingError> {
        let guard = lock(&self.epochs);
        let chain = guard.as_ref().ok_or(KeyRingError::Closed)?;
        let current = chain.current.epoch();

        if epoch == current {
            return Ok(chain.current.open_key().clone());
        }
        if let Some(previous) = &chain.previous
            && previous.keys.epoch() == epoch
        {
            return Ok(previous.keys.open_key().clone());
        }
        if epoch < current {
            return Err(KeyRingError::StaleEpoch { epoch, current });
        }
        Err(KeyRingError::UnknownEpoch { epoch, current })
    }

    /// Check a receive sequence against the replay window without mutating it.
    ///
    /// # Errors
    ///
    /// [`KeyRingError::Replayed`] if the sequence was already accepted or is
    /// older than the window reaches (recoverable: drop the frame).
    pub fn check_replay(&self, sequence: u64) -> Result<(), KeyRingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KeyRingError::Closed);
        }
        lock(&self.replay).check(sequence)
    }

    /// Commit an authenticated frame to the replay window.
    ///
    /// Must be called only after the AEAD tag verified; committing earlier
    /// would let forged frames block the sequence numbers of legitimate ones.
    /// While a previous epoch is retiring, every recorded frame spends one
    /// unit of the rotation grace budget, whatever epoch it was sealed
    /// under; when the budget is gone the old keys are zeroized. Counting
    /// all traffic guarantees retirement even when no old-epoch frames were
    /// in flight at rotation time.
    pub fn record_receive(&self, sequence: u64) -> Result<(), KeyRingError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KeyRingError::Closed);
        }
        lock(&self.replay).record(sequence);

        let mut guard = lock(&self.epochs);
        let chain = guard.as_mut().ok_or(KeyRingError::Closed)?;
        if let Some(previous) = &mut chain.previous {
            previous.grace_remaining = previous.grace_remaining.saturating_sub(1);
            if previous.grace_remaining == 0 {
                // SessionKeys zeroizes on drop
                chain.previous = None;
            }
        }

        Ok(())
    }

    /// Begin a new epoch.
    ///
    /// The outgoing epoch's keys stay available for decryption until the
    /// grace budget is spent (or [`retire_previous`](Self::retire_previous)
    /// is called), then are zeroized. A rotation that arrives while a grace
    /// window is still open retires the older epoch immediately - at most two
    /// epochs are ever live.
    pub fn rotate(&self, new_keys: SessionKeys) -> Result<(), KeyRingError> {
        let mut guard = lock(&self.epochs);
        let chain = guard.as_mut().ok_or(KeyRingError::Closed)?;

        debug_assert!(
            new_keys.epoch() > chain.current.epoch(),
            "rotation must advance the epoch"
        );

        let outgoing = std::mem::replace(&mut chain.current, new_keys);
        chain.previous =
            Some(PreviousEpoch { keys: outgoing, grace_remaining: self.config.grace_frames });

        Ok(())
    }

    /// True while previous-epoch keys are still alive after a rotation.
    pub fn rotation_pending(&self) -> bool {
        lock(&self.epochs).as_ref().is_some_and(|chain| chain.previous.is_some())
    }

    /// Zeroize previous-epoch keys immediately, ending the grace window.
    pub fn retire_previous(&self) {
        if let Some(chain) = lock(&self.epochs).as_mut() {
            chain.previous = None;
        }
    }

    /// Zeroize all key material. All subsequent operations fail with
    /// [`KeyRingError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the chain zeroizes both epochs' keys
        *lock(&self.epochs) = None;
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("rotation_pending", &self.rotation_pending())
            .finish_non_exhaustive()
    }
}
