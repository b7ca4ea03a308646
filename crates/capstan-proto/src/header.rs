//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 16-byte structure serialized as raw binary
//! (Big Endian). The decoder reads it straight off the receive buffer to
//! decide how many payload bytes to wait for, without any deserialization
//! step.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Result, WireError};

/// Fixed 16-byte frame header (Big Endian network byte order).
///
/// Fields are stored as raw byte arrays to avoid alignment issues with the
/// packed representation. The epoch and sequence fields are bound to the
/// ciphertext as AEAD associated data, so a header that parses but was
/// tampered with still fails authentication downstream; a tampered length
/// field mis-slices the ciphertext and fails the tag check the same way.
///
/// # Security
///
/// The `#[repr(C, packed)]` layout with zerocopy traits ensures this struct
/// can be safely cast from untrusted network bytes - all 16-byte patterns are
/// valid, preventing undefined behavior. Parsing validates structure only
/// (length bounds); authenticity is established later when the AEAD tag is
/// verified against the (epoch, sequence) slot as associated data.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    /// Key generation this frame was sealed under
    epoch: [u8; 4],
    /// Monotonic per-session sequence number
    sequence: [u8; 8],
    /// Length of ciphertext including trailing tag
    pub(crate) ciphertext_len: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header (16 bytes)
    pub const SIZE: usize = 16;

    /// Maximum ciphertext length (1 MiB), tag included
    pub const MAX_CIPHERTEXT_LEN: u32 = 1024 * 1024;

    /// Poly1305 authentication tag size (16 bytes)
    pub const TAG_SIZE: usize = 16;

    /// Create a new header for the given (epoch, sequence) slot.
    ///
    /// `ciphertext_len` starts at zero; [`Frame::new`](crate::Frame::new)
    /// sets it to match the actual payload.
    #[must_use]
    pub fn new(epoch: u32, sequence: u64) -> Self {
        Self {
            epoch: epoch.to_be_bytes(),
            sequence: sequence.to_be_bytes(),
            ciphertext_len: [0u8; 4],
        }
    }

    /// Parse header from network bytes (zero-copy, safe).
    ///
    /// # Errors
    ///
    /// - [`WireError::FrameTooShort`] if the buffer holds fewer than 16 bytes
    /// - [`WireError::Oversized`] if `ciphertext_len` exceeds the 1 MiB cap
    /// - [`WireError::TagMissing`] if `ciphertext_len` is below the tag size
    ///
    /// # Security
    ///
    /// Length bounds are checked before any payload memory is allocated, so a
    /// hostile header cannot trigger a large allocation.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| WireError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        let len = u32::from_be_bytes(header.ciphertext_len);
        if len > Self::MAX_CIPHERTEXT_LEN {
            return Err(WireError::Oversized {
                len: len as usize,
                max: Self::MAX_CIPHERTEXT_LEN as usize,
            });
        }
        if (len as usize) < Self::TAG_SIZE {
            return Err(WireError::TagMissing { len: len as usize, tag: Self::TAG_SIZE });
        }

        Ok(header)
    }

    /// Serialize header to bytes (zero-copy).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Key epoch this frame was sealed under.
    #[must_use]
    pub fn epoch(&self) -> u32 {
        u32::from_be_bytes(self.epoch)
    }

    /// Monotonic sequence number assigned at submission.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        u64::from_be_bytes(self.sequence)
    }

    /// Ciphertext length in bytes, trailing tag included.
    #[must_use]
    pub fn ciphertext_len(&self) -> u32 {
        u32::from_be_bytes(self.ciphertext_len)
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("epoch", &self.epoch())
            .field("sequence", &self.sequence())
            .field("ciphertext_len", &self.ciphertext_len())
            .finish()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for FrameHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FrameHeader {}
