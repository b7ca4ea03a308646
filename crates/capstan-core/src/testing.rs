//! In-memory channels for exercising sessions without real I/O.
//!
//! A [`MemoryChannel`] pair behaves like a lossless duplex byte stream with
//! explicit test hooks: reads can be corrupted in place to simulate an
//! on-path attacker. Clones share the same buffers, so a test can keep a
//! handle to a channel it has already moved into a session.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;

use crate::channel::ByteChannel;

type CorruptFn = Box<dyn FnOnce(&mut Vec<u8>) + Send>;

/// One direction of the duplex pair.
#[derive(Default)]
struct Pipe {
    buffer: VecDeque<u8>,
    corrupt: Option<CorruptFn>,
}

fn lock(pipe: &Mutex<Pipe>) -> MutexGuard<'_, Pipe> {
    pipe.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// In-memory duplex byte channel endpoint.
///
/// Reads return whatever the peer has written so far, up to the requested
/// maximum; `Ok(None)` means the buffer is currently empty.
#[derive(Clone)]
pub struct MemoryChannel {
    incoming: Arc<Mutex<Pipe>>,
    outgoing: Arc<Mutex<Pipe>>,
}

impl MemoryChannel {
    /// Create a connected pair of endpoints.
    #[must_use]
    pub fn duplex() -> (Self, Self) {
        let a_to_b = Arc::new(Mutex::new(Pipe::default()));
        let b_to_a = Arc::new(Mutex::new(Pipe::default()));

        let left = Self { incoming: b_to_a.clone(), outgoing: a_to_b.clone() };
        let right = Self { incoming: a_to_b, outgoing: b_to_a };
        (left, right)
    }

    /// Corrupt the bytes returned by this endpoint's next successful read.
    ///
    /// One-shot: the hook is consumed by the first read that returns data.
    pub fn corrupt_next_read(&self, f: impl FnOnce(&mut Vec<u8>) + Send + 'static) {
        lock(&self.incoming).corrupt = Some(Box::new(f));
    }

    /// Bytes currently queued toward this endpoint.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.incoming).buffer.len()
    }
}

impl ByteChannel for MemoryChannel {
    fn read(&mut self, max: usize) -> std::io::Result<Option<Bytes>> {
        let mut pipe = lock(&self.incoming);
        if pipe.buffer.is_empty() {
            return Ok(None);
        }

        let take = max.min(pipe.buffer.len());
        let mut bytes: Vec<u8> = pipe.buffer.drain(..take).collect();

        if let Some(corrupt) = pipe.corrupt.take() {
            corrupt(&mut bytes);
        }

        Ok(Some(Bytes::from(bytes)))
    }

    fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        lock(&self.outgoing).buffer.extend(bytes);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel").field("pending", &self.pending()).finish()
    }
}
