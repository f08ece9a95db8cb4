//! Error types for the sealed-envelope boundary.

use thiserror::Error;

/// Result type for seal/open operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while sealing or opening an envelope.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Authenticated decryption failed: wrong key, or the payload was
    /// tampered with in transit. Corresponds to spec.md's `SealOpen`
    /// error kind — reported to the caller, never silently swallowed.
    #[error("open failed: payload is tampered or the key is wrong")]
    Open,

    /// The sealed payload was shorter than a nonce, so it cannot
    /// possibly be valid.
    #[error("sealed payload too short: {0} bytes")]
    TooShort(usize),
}
