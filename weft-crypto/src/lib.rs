//! Sealed-envelope boundary for weft wire payloads.
//!
//! This crate is deliberately small: it provides exactly the
//! `seal`/`open` primitive the sync engine needs to treat transport
//! payloads as opaque, authenticated blobs. Key exchange, pairing, and
//! passphrase-based key derivation belong to the application layer and
//! are out of scope here.

mod error;
mod key;
mod seal;

pub use error::{CryptoError, CryptoResult};
pub use key::{ChannelKey, KEY_SIZE};
pub use seal::{open, seal, NONCE_SIZE};
