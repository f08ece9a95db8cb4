//! Peer and channel identifiers used throughout the engine.
//!
//! Both are flat byte arrays rather than UUIDs: the wire format and the
//! peer matrix only ever need a fixed-width, globally unique value to
//! compare and hash, never UUID's version/variant structure.

use crate::error::{TypesError, TypesResult};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 256-bit identifier for a peer instance.
///
/// Assigned once, at peer creation, and never reused. Peers compare
/// `PeerId`s byte-for-byte; the ordering is used only as an arbitrary,
/// deterministic tie-break (see [`crate::ItemId`]).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId([u8; 32]);

impl PeerId {
    /// Generates a fresh peer ID from a CSPRNG.
    ///
    /// Called exactly once per peer instance, at creation.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Builds a peer ID from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parses a peer ID from its hex representation.
    pub fn parse(s: &str) -> TypesResult<Self> {
        parse_fixed(s).map(Self)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", hex::encode(self.0))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for PeerId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A 128-bit identifier for a shared document/channel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId([u8; 16]);

impl ChannelId {
    /// Generates a fresh channel ID from a CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Builds a channel ID from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parses a channel ID from its hex representation.
    pub fn parse(s: &str) -> TypesResult<Self> {
        parse_fixed(s).map(Self)
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", hex::encode(self.0))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ChannelId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_fixed<const N: usize>(s: &str) -> TypesResult<[u8; N]> {
    let decoded = hex::decode(s).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
    let actual = decoded.len();
    decoded
        .try_into()
        .map_err(|_| TypesError::InvalidLength { expected: N, actual })
}
