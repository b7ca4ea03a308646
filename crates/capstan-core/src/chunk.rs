//! Plaintext chunk type delivered by the decoder.

use bytes::Bytes;
use capstan_proto::FrameHeader;

/// Maximum plaintext chunk size: one maximum ciphertext minus the tag.
pub const MAX_CHUNK_SIZE: usize = FrameHeader::MAX_CIPHERTEXT_LEN as usize - FrameHeader::TAG_SIZE;

/// One unit of application data, in delivery order.
///
/// Ordering is defined by `sequence`, not arrival order; the decoder only
/// emits chunks once every lower sequence has been delivered. Pure value
/// type - consumed and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaintextChunk {
    /// Position in the session's delivery order
    pub sequence: u64,
    /// Application payload (may be empty)
    pub payload: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_chunk_leaves_room_for_tag() {
        assert_eq!(MAX_CHUNK_SIZE + FrameHeader::TAG_SIZE, 1024 * 1024);
    }
}
