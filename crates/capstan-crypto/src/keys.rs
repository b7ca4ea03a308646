//! Session key material and derivation.
//!
//! Both peers hold a shared root secret (from whatever key exchange sits
//! outside this crate) and derive one key per direction per epoch with HKDF.
//! Distinct direction labels guarantee the initiator's seal key equals the
//! responder's open key and vice versa, so the two sides never encrypt with
//! the same key.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Label for keys sealing initiator-to-responder traffic
const INITIATOR_LABEL: &[u8] = b"capstan/i2r/v1";

/// Label for keys sealing responder-to-initiator traffic
const RESPONDER_LABEL: &[u8] = b"capstan/r2i/v1";

/// A 256-bit AEAD key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; 32]);

impl AeadKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes for the AEAD primitive.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// Key material must never appear in logs
impl std::fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AeadKey(..)")
    }
}

/// Which side of the session this peer is.
///
/// Determines which derivation label feeds the seal key and which feeds the
/// open key, so the two peers end up with mirrored key pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The peer that opened the session
    Initiator,
    /// The peer that accepted the session
    Responder,
}

/// Directional key material for one epoch.
///
/// Owned exclusively by the [`KeyRing`](crate::KeyRing) after installation.
/// Replaced wholesale on rotation; zeroized on drop.
#[derive(Clone)]
pub struct SessionKeys {
    /// Key for sealing outbound frames
    seal_key: AeadKey,
    /// Key for opening inbound frames
    open_key: AeadKey,
    /// Key generation identifier
    epoch: u32,
}

impl SessionKeys {
    /// Assemble session keys from externally derived material.
    #[must_use]
    pub fn new(seal_key: AeadKey, open_key: AeadKey, epoch: u32) -> Self {
        Self { seal_key, open_key, epoch }
    }

    /// Key for sealing outbound frames.
    pub fn seal_key(&self) -> &AeadKey {
        &self.seal_key
    }

    /// Key for opening inbound frames.
    pub fn open_key(&self) -> &AeadKey {
        &self.open_key
    }

    /// Key generation identifier.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys").field("epoch", &self.epoch).finish_non_exhaustive()
    }
}

/// Derive directional session keys for one epoch from a shared root secret.
///
/// # Security
///
/// - Different epochs produce unrelated keys (the epoch feeds the HKDF info)
/// - Different directions produce unrelated keys (distinct labels)
/// - Deterministic: both peers derive identical mirrored material
pub fn derive_session_keys(root_secret: &[u8], epoch: u32, role: Role) -> SessionKeys {
    let (seal_label, open_label) = match role {
        Role::Initiator => (INITIATOR_LABEL, RESPONDER_LABEL),
        Role::Responder => (RESPONDER_LABEL, INITIATOR_LABEL),
    };

    SessionKeys {
        seal_key: derive_key(root_secret, epoch, seal_label),
        open_key: derive_key(root_secret, epoch, open_label),
        epoch,
    }
}

/// Derive a single 32-byte key for (label, epoch) from the root secret.
fn derive_key(root_secret: &[u8], epoch: u32, label: &[u8]) -> AeadKey {
    let hkdf = Hkdf::<Sha256>::new(None, root_secret);

    // Info: label || epoch
    let mut info = Vec::with_capacity(label.len() + 4);
    info.extend_from_slice(label);
    info.extend_from_slice(&epoch.to_be_bytes());

    let mut key = [0u8; 32];
    let Ok(()) = hkdf.expand(&info, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    AeadKey(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &[u8] = b"test_root_secret_material_here!!";

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_session_keys(ROOT, 0, Role::Initiator);
        let b = derive_session_keys(ROOT, 0, Role::Initiator);

        assert_eq!(a.seal_key().as_bytes(), b.seal_key().as_bytes());
        assert_eq!(a.open_key().as_bytes(), b.open_key().as_bytes());
    }

    #[test]
    fn roles_derive_mirrored_keys() {
        let initiator = derive_session_keys(ROOT, 0, Role::Initiator);
        let responder = derive_session_keys(ROOT, 0, Role::Responder);

        assert_eq!(initiator.seal_key().as_bytes(), responder.open_key().as_bytes());
        assert_eq!(initiator.open_key().as_bytes(), responder.seal_key().as_bytes());
    }

    #[test]
    fn directions_use_distinct_keys() {
        let keys = derive_session_keys(ROOT, 0, Role::Initiator);
        assert_ne!(keys.seal_key().as_bytes(), keys.open_key().as_bytes());
    }

    #[test]
    fn epochs_derive_distinct_keys() {
        let epoch0 = derive_session_keys(ROOT, 0, Role::Initiator);
        let epoch1 = derive_session_keys(ROOT, 1, Role::Initiator);

        assert_ne!(epoch0.seal_key().as_bytes(), epoch1.seal_key().as_bytes());
        assert_ne!(epoch0.open_key().as_bytes(), epoch1.open_key().as_bytes());
    }

    #[test]
    fn different_roots_derive_distinct_keys() {
        let a = derive_session_keys(b"root_a", 0, Role::Initiator);
        let b = derive_session_keys(b"root_b", 0, Role::Initiator);

        assert_ne!(a.seal_key().as_bytes(), b.seal_key().as_bytes());
    }

    #[test]
    fn debug_never_prints_key_material() {
        let keys = derive_session_keys(ROOT, 7, Role::Initiator);
        let rendered = format!("{keys:?}");

        assert!(rendered.contains("epoch: 7"));
        assert!(!rendered.contains("AeadKey(["));
    }
}
