//! Capstan Wire Protocol
//!
//! Frame types and codec for the Capstan authenticated transport. This crate
//! defines structural framing only: a fixed 16-byte binary header followed by
//! ciphertext. It performs no cryptography - sealing and verification happen
//! in `capstan-crypto`, orchestration in `capstan-core`.
//!
//! # Wire Format
//!
//! All multi-byte integers are Big Endian (network byte order):
//!
//! ```text
//! offset 0  : epoch            (4 bytes)
//! offset 4  : sequence         (8 bytes)
//! offset 12 : ciphertext_len   (4 bytes)
//! offset 16 : ciphertext||tag  (ciphertext_len bytes, tag is trailing 16)
//! ```
//!
//! # Streaming
//!
//! Byte streams do not align with frame boundaries. [`FrameCodec`] accumulates
//! input and yields complete frames as they become available, distinguishing
//! "need more bytes" (recoverable) from a malformed header (unrecoverable
//! desync, fatal to the session).

pub mod codec;
pub mod error;
pub mod frame;
pub mod header;

pub use codec::FrameCodec;
pub use error::{Result, WireError};
pub use frame::Frame;
pub use header::FrameHeader;
