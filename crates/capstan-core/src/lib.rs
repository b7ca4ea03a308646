//! Capstan Transport Core
//!
//! Streaming authenticated transport over an unreliable byte channel. The
//! pipeline frames, seals, and authenticates an arbitrary-length byte stream
//! on the send side, and verifies, de-duplicates, reorders, and reassembles
//! it on the receive side, with explicit key lifecycle and failure handling.
//!
//! # Architecture
//!
//! ```text
//! caller payload
//!        │
//!        ▼ Encoder::submit (sequence assignment, AEAD seal, framing)
//! wire frames ──► ByteChannel ──► arbitrary split / reorder / replay
//!        │
//!        ▼ Decoder::feed (reassembly, replay rejection, AEAD open)
//! PlaintextChunks, strictly in sequence order
//! ```
//!
//! [`PipelineSession`] owns both directions plus the
//! [`KeyRing`](capstan_crypto::KeyRing) and drives the
//! `Opening -> Active -> Rotating -> Closed | Faulted` lifecycle.
//!
//! # Error Discipline
//!
//! Per-frame recoverable conditions (incomplete input, replayed or stale
//! frames) are absorbed inside the decoder and surfaced only as log events
//! and [`FeedReport`](decoder::FeedReport) entries - they never interrupt the
//! chunk stream. Fatal errors (tampering, malformed framing, reorder
//! overflow, nonce exhaustion) fault the session terminally; the fault reason
//! stays queryable afterwards.

pub mod channel;
pub mod chunk;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod session;
pub mod testing;

pub use channel::ByteChannel;
pub use chunk::{MAX_CHUNK_SIZE, PlaintextChunk};
pub use decoder::{Decoder, FeedReport, RejectedFrame};
pub use encoder::Encoder;
pub use error::TransportError;
pub use session::{PipelineSession, SessionConfig, SessionState};
