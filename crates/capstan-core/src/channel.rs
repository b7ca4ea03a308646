//! Byte channel abstraction.
//!
//! The pipeline core never touches sockets. Callers supply any byte-oriented
//! duplex channel - TCP stream, QUIC stream, in-memory pair - behind this
//! trait, and keep cancellation/timeout policy on their side of it.

use bytes::Bytes;

/// A byte-oriented duplex channel.
///
/// Reads and writes are unsequenced with respect to each other; the session
/// serializes each direction itself. Delivery may split, but the channel
/// must not corrupt bytes - corruption is detected (and is fatal) at the
/// authentication layer, not here.
pub trait ByteChannel {
    /// Read up to `max` bytes.
    ///
    /// Returns `Ok(None)` when no bytes are available (the stream may still
    /// deliver more later, or has ended - the session treats both as "nothing
    /// to process right now").
    fn read(&mut self, max: usize) -> std::io::Result<Option<Bytes>>;

    /// Write all of `bytes` to the channel.
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}
