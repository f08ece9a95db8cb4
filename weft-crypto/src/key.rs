//! Symmetric channel keys.

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a channel key in bytes (256 bits for ChaCha20-Poly1305).
pub const KEY_SIZE: usize = 32;

/// A symmetric key shared by every peer on a channel.
///
/// Zeroized on drop. The engine does not derive this key from a
/// passphrase — spec.md's `PeerState.secretKey` is already-available
/// key material handed in from outside the core (key exchange and
/// pairing are part of the excluded application layer).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ChannelKey {
    bytes: [u8; KEY_SIZE],
}

impl ChannelKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generates a fresh random key (for a newly created channel).
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }
}

impl std::fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelKey").field("bytes", &"[REDACTED]").finish()
    }
}
