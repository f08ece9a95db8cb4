//! Cursor map CRDT — a map of `PeerId` to LWW register values.
//!
//! Each entry behaves like an independent Last-Writer-Wins register,
//! keyed by the peer it belongs to. A write wins over whatever is
//! currently stored iff its `ItemId` compares greater than the stored
//! entry's `ItemId`; ties can't occur because `ItemId`'s total order
//! never produces one for distinct writes (and same-peer writes are
//! already serialized by that peer's own logical clock).
//!
//! In practice every peer only ever writes its own key, so two writes
//! racing for the same entry never actually happens — but the merge
//! rule below is the general one, not a single-writer shortcut.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use weft_types::{ItemId, PeerId};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry<T> {
    value: T,
    update_ts: ItemId,
}

/// A map from `PeerId` to an LWW value, such as each collaborator's
/// current cursor position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorMap<T> {
    entries: HashMap<PeerId, Entry<T>>,
}

impl<T> Default for CursorMap<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> CursorMap<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value for `peer_id`, if any.
    #[must_use]
    pub fn get(&self, peer_id: PeerId) -> Option<&T> {
        self.entries.get(&peer_id).map(|e| &e.value)
    }

    /// Returns the `ItemId` of the write currently stored for
    /// `peer_id`, if any.
    #[must_use]
    pub fn update_ts(&self, peer_id: PeerId) -> Option<ItemId> {
        self.entries.get(&peer_id).map(|e| e.update_ts)
    }

    /// Applies a write to `peer_id`'s entry. Wins over whatever is
    /// stored iff `update_ts` is strictly greater than the stored
    /// entry's `update_ts`. Returns whether the write took effect.
    pub fn put(&mut self, peer_id: PeerId, value: T, update_ts: ItemId) -> bool {
        let should_update = match self.entries.get(&peer_id) {
            Some(existing) => update_ts > existing.update_ts,
            None => true,
        };
        if should_update {
            self.entries.insert(peer_id, Entry { value, update_ts });
        }
        should_update
    }

    /// Removes `peer_id`'s entry entirely, e.g. when that peer leaves
    /// the channel. Not itself a CRDT merge operation — local-only
    /// housekeeping.
    pub fn remove(&mut self, peer_id: PeerId) {
        self.entries.remove(&peer_id);
    }

    /// Iterates over every current entry.
    pub fn iter(&self) -> impl Iterator<Item = (PeerId, &T)> {
        self.entries.iter().map(|(&peer_id, e)| (peer_id, &e.value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> CursorMap<T> {
    /// Merges another cursor map into this one, entry by entry, using
    /// the same `put` rule.
    pub fn merge(&mut self, other: &Self) {
        for (&peer_id, entry) in &other.entries {
            self.put(peer_id, entry.value.clone(), entry.update_ts);
        }
    }
}
