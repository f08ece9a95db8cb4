//! `seal`/`open` — the authenticated-encryption boundary around wire
//! payloads.
//!
//! The engine treats this as an opaque transform: `seal(key, bytes) ->
//! bytes` on the way out, `open(key, bytes) -> Result<bytes, _>` on
//! the way in. Everything above this boundary (message framing, the
//! wire codec) never sees plaintext cross it.

use crate::error::{CryptoError, CryptoResult};
use crate::key::ChannelKey;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

/// Size of the nonce prepended to every sealed payload, in bytes.
pub const NONCE_SIZE: usize = 12;

/// Encrypts `plaintext` under `key`, authenticating the whole payload.
///
/// Returns `nonce || ciphertext`, a single opaque byte string suitable
/// for handing straight to a transport.
pub fn seal(key: &ChannelKey, plaintext: &[u8]) -> Vec<u8> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // A key that was constructed from valid bytes never fails to encrypt.
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .expect("chacha20poly1305 encryption is infallible for a valid key");

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypts and authenticates a payload produced by [`seal`].
///
/// Fails closed: any tamper, truncation, or wrong key produces
/// [`CryptoError::Open`] rather than garbage plaintext.
pub fn open(key: &ChannelKey, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < NONCE_SIZE {
        return Err(CryptoError::TooShort(sealed.len()));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher.decrypt(nonce, ciphertext).map_err(|_| CryptoError::Open)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_roundtrips() {
        let key = ChannelKey::generate();
        let plaintext = b"causally ready message";
        let sealed = seal(&key, plaintext);
        let opened = open(&key, &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn open_fails_on_tamper() {
        let key = ChannelKey::generate();
        let mut sealed = seal(&key, b"hello");
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(open(&key, &sealed).is_err());
    }

    #[test]
    fn open_fails_on_wrong_key() {
        let key_a = ChannelKey::generate();
        let key_b = ChannelKey::generate();
        let sealed = seal(&key_a, b"hello");
        assert!(open(&key_b, &sealed).is_err());
    }

    #[test]
    fn open_fails_on_truncated_input() {
        let key = ChannelKey::generate();
        assert!(matches!(open(&key, &[0u8; 4]), Err(CryptoError::TooShort(4))));
    }
}
