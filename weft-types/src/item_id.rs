//! `ItemId` — the globally-orderable identifier assigned to every edit.

use crate::error::{TypesError, TypesResult};
use crate::ids::PeerId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Identifies a single insertion (or, by reuse, the tombstone that
/// marks a deletion) in the ordered-list CRDT.
///
/// Total order is lexicographic on `(logical_ts, peer_id)`: two
/// distinct `ItemId`s can never compare equal, so this order is a
/// genuine total order, not just a partial one — exactly one of
/// `a < b`, `a > b` holds for distinct `a`, `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId {
    /// Lamport-style logical timestamp: advances by one on every local
    /// edit and jumps forward to match an incoming `ClockUpdate`.
    pub logical_ts: u64,
    /// The peer that minted this ID.
    pub peer_id: PeerId,
}

impl ItemId {
    /// Builds an `ItemId` from its components.
    #[must_use]
    pub const fn new(logical_ts: u64, peer_id: PeerId) -> Self {
        Self {
            logical_ts,
            peer_id,
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.logical_ts, self.peer_id)
    }
}

impl FromStr for ItemId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts_part, peer_part) = s
            .split_once(':')
            .ok_or_else(|| TypesError::InvalidItemId(s.to_string()))?;
        let logical_ts: u64 = ts_part
            .parse()
            .map_err(|_| TypesError::InvalidItemId(s.to_string()))?;
        let peer_id = PeerId::parse(peer_part)?;
        Ok(Self {
            logical_ts,
            peer_id,
        })
    }
}

impl PartialOrd for ItemId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ItemId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.logical_ts
            .cmp(&other.logical_ts)
            .then_with(|| self.peer_id.cmp(&other.peer_id))
    }
}
