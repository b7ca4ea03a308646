//! Capstan Cryptographic Engine
//!
//! Cryptographic building blocks for the Capstan transport: AEAD sealing and
//! opening, session key derivation, and the [`KeyRing`] that owns all key
//! material and nonce state for a session.
//!
//! # Key Lifecycle
//!
//! Both peers derive mirrored directional keys from a shared root secret.
//! Rotation installs a fresh epoch; the previous epoch's keys stay usable for
//! decryption during a bounded grace window (a configurable number of
//! received frames), then are zeroized. Closing the ring zeroizes everything
//! immediately.
//!
//! ```text
//! Root Secret
//!        │
//!        ▼ HKDF (direction label, epoch)
//! SessionKeys (seal key + open key, per epoch)
//!        │
//!        ▼ install / rotate
//! KeyRing (nonce counters, replay window, at most two live epochs)
//!        │
//!        ▼ seal / open
//! ChaCha20-Poly1305 Ciphertext
//! ```
//!
//! # Security
//!
//! Nonce Uniqueness:
//! - The 96-bit nonce is `epoch || sequence`; the sequence counter is
//!   strictly increasing for the lifetime of the session, so no (key, nonce)
//!   pair is ever reused
//! - The counter refuses to wrap; exhaustion forces a key rotation
//!
//! Replay Protection:
//! - A sliding window over accepted sequence numbers rejects duplicates and
//!   frames older than the window
//! - The window is only updated after the AEAD tag verifies, so forged
//!   frames cannot block the sequence numbers of legitimate ones
//!
//! Key Hygiene:
//! - All key material is zeroized on drop, rotation retirement, and close
//! - At most two epochs are live at any moment (current + grace)

pub mod aead;
pub mod error;
pub mod keyring;
pub mod keys;

pub use error::{CryptoError, KeyRingError};
pub use keyring::{KeyRing, KeyRingConfig, SendSlot};
pub use keys::{AeadKey, Role, SessionKeys, derive_session_keys};
