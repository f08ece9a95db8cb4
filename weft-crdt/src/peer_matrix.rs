//! Peer matrix — per-peer vector clocks, index assignment, and causal
//! readiness.
//!
//! For every peer the engine has heard of, the matrix holds that
//! peer's most-recently-reported vector clock, keyed by a compact,
//! densely-packed local index rather than the full [`PeerId`] (which
//! is how the wire codec keeps messages small: a sender refers to
//! peers it has told us about by a per-sender integer alias instead of
//! repeating 32-byte IDs).

use std::collections::HashMap;

use thiserror::Error;
use weft_types::PeerId;

/// A single peer's reported observation of another peer: "I have
/// applied messages from `peer_id` up to sequence number
/// `last_seq_no`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeerVClockEntry {
    pub peer_id: PeerId,
    pub peer_index: u64,
    pub last_seq_no: u64,
}

/// A row of the peer matrix: one peer's most-recently-reported state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeerEntry {
    pub peer_id: PeerId,
    /// The next logical timestamp this peer will mint, as of their
    /// most recent `ClockUpdate` (or, for the local peer, as tracked
    /// by the engine itself).
    pub next_ts: u64,
    /// This peer's view of every other peer's sequence progress.
    /// Entry 0, if present, is the peer's view of itself.
    pub clock: Vec<PeerVClockEntry>,
}

impl PeerEntry {
    fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            next_ts: 0,
            clock: Vec::new(),
        }
    }

    fn get(&self, peer_index: u64) -> Option<&PeerVClockEntry> {
        self.clock.iter().find(|e| e.peer_index == peer_index)
    }

    fn get_by_peer_id(&self, peer_id: PeerId) -> Option<&PeerVClockEntry> {
        self.clock.iter().find(|e| e.peer_id == peer_id)
    }

    fn upsert(&mut self, incoming: PeerVClockEntry) -> Result<(), PeerMatrixError> {
        if let Some(existing) = self.clock.iter_mut().find(|e| e.peer_index == incoming.peer_index) {
            if incoming.last_seq_no < existing.last_seq_no {
                return Err(PeerMatrixError::ClockRegression {
                    peer_id: incoming.peer_id,
                    previous: existing.last_seq_no,
                    attempted: incoming.last_seq_no,
                });
            }
            existing.last_seq_no = incoming.last_seq_no;
        } else {
            self.clock.push(incoming);
        }
        Ok(())
    }
}

/// Errors produced by the peer matrix. See spec.md §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerMatrixError {
    /// A decoded operation referenced a `peerIndex` for which the
    /// sender never declared a mapping.
    #[error("unknown peer index {remote_index} from origin {origin}")]
    UnknownPeerIndex { origin: PeerId, remote_index: u64 },

    /// A `lastSeqNo` (or `nextTS`) went backwards relative to what was
    /// previously reported.
    #[error("clock regression for peer {peer_id}: {attempted} <= previous {previous}")]
    ClockRegression {
        peer_id: PeerId,
        previous: u64,
        attempted: u64,
    },

    /// Persisted peer order did not match the order reconstructed
    /// from the ID-assignment rule on load. Fatal; the engine refuses
    /// to load.
    #[error("persisted peer order does not match reconstructed order at index {index}")]
    IndexMismatch { index: u64 },
}

/// The peer matrix: vector-clock bookkeeping plus index translation.
///
/// `entries[0]` is always the local peer's own row; its `clock` field
/// doubles as "what we have applied from every other peer", updated
/// by [`PeerMatrix::record_applied`] every time a message is applied.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PeerMatrix {
    entries: Vec<PeerEntry>,
    id_to_index: HashMap<PeerId, u64>,
    /// `(origin, remote_index) -> peer_id`: what `origin` calls
    /// `remote_index`. `origin`'s own index 0 is never stored here —
    /// it always denotes `origin` itself, by wire-format convention.
    translations: HashMap<(PeerId, u64), PeerId>,
    /// Fast-path mirror of `entries[0].clock`, keyed directly by
    /// `PeerId` rather than held in `PeerEntry`'s linear `Vec`.
    /// `causally_ready` calls `last_applied_seq` once per entry in a
    /// message's reported clock, so for a long-lived channel with many
    /// known peers that walk dominates message application; this
    /// turns it into a single hash lookup instead of a scan. Rebuilt
    /// from `entries[0]` on [`PeerMatrix::from_entries`], kept in sync
    /// by [`PeerMatrix::record_applied`], never persisted directly.
    #[serde(skip)]
    applied_index: HashMap<PeerId, u64>,
}

impl PeerMatrix {
    /// Creates a fresh matrix with the local peer at index 0.
    #[must_use]
    pub fn new(local_peer_id: PeerId) -> Self {
        let mut id_to_index = HashMap::new();
        id_to_index.insert(local_peer_id, 0);
        Self {
            entries: vec![PeerEntry::new(local_peer_id)],
            id_to_index,
            translations: HashMap::new(),
            applied_index: HashMap::new(),
        }
    }

    /// Rebuilds a matrix from a persisted, ordered list of peer
    /// entries. `entries[0]` must be the local peer. Translation
    /// tables are not persisted (see spec.md §6); they are rebuilt
    /// lazily as each origin redeclares its mappings.
    ///
    /// Returns [`PeerMatrixError::IndexMismatch`] if the list is empty
    /// or contains a duplicate `peer_id` (which would make the
    /// reconstructed dense-index assignment inconsistent with the one
    /// that produced the persisted data).
    pub fn from_entries(entries: Vec<PeerEntry>) -> Result<Self, PeerMatrixError> {
        if entries.is_empty() {
            return Err(PeerMatrixError::IndexMismatch { index: 0 });
        }
        let mut id_to_index = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if id_to_index.insert(entry.peer_id, idx as u64).is_some() {
                return Err(PeerMatrixError::IndexMismatch { index: idx as u64 });
            }
        }
        let applied_index = entries[0]
            .clock
            .iter()
            .map(|e| (e.peer_id, e.last_seq_no))
            .collect();
        Ok(Self {
            entries,
            id_to_index,
            translations: HashMap::new(),
            applied_index,
        })
    }

    /// Returns the local peer's ID (the peer this matrix belongs to).
    #[must_use]
    pub fn local_peer_id(&self) -> PeerId {
        self.entries[0].peer_id
    }

    /// Returns the local index of `peer_id`, assigning the next dense
    /// index if this peer hasn't been seen before.
    pub fn peer_id_to_index(&mut self, peer_id: PeerId) -> u64 {
        if let Some(&idx) = self.id_to_index.get(&peer_id) {
            return idx;
        }
        let idx = self.entries.len() as u64;
        self.entries.push(PeerEntry::new(peer_id));
        self.id_to_index.insert(peer_id, idx);
        tracing::debug!(peer = %peer_id, index = idx, "assigned new peer index");
        idx
    }

    /// Returns the local index of `peer_id` without assigning one.
    #[must_use]
    pub fn existing_index(&self, peer_id: PeerId) -> Option<u64> {
        self.id_to_index.get(&peer_id).copied()
    }

    /// Translates a remote index, as used by `origin`, back to a full
    /// `PeerId`. Index 0 always denotes `origin` itself.
    pub fn remote_index_to_peer_id(
        &self,
        origin: PeerId,
        remote_index: u64,
    ) -> Result<PeerId, PeerMatrixError> {
        if remote_index == 0 {
            return Ok(origin);
        }
        self.translations
            .get(&(origin, remote_index))
            .copied()
            .ok_or(PeerMatrixError::UnknownPeerIndex { origin, remote_index })
    }

    /// Registers that `origin` uses `remote_index` to denote
    /// `subject_peer_id`. Must be called before decoding any operation
    /// from `origin` that references `remote_index`.
    ///
    /// If `subject_peer_id` is `None`, the mapping must already exist
    /// (this is used when re-confirming a previously-declared mapping
    /// rather than introducing a new one).
    pub fn peer_index_mapping(
        &mut self,
        origin: PeerId,
        subject_peer_id: Option<PeerId>,
        remote_index: u64,
    ) -> Result<(), PeerMatrixError> {
        if remote_index == 0 {
            // Index 0 is always `origin` itself; nothing to register.
            return Ok(());
        }
        match subject_peer_id {
            Some(peer_id) => {
                self.translations.insert((origin, remote_index), peer_id);
                self.peer_id_to_index(peer_id);
                Ok(())
            }
            None => {
                if self.translations.contains_key(&(origin, remote_index)) {
                    Ok(())
                } else {
                    Err(PeerMatrixError::UnknownPeerIndex { origin, remote_index })
                }
            }
        }
    }

    /// Merges a `ClockUpdate` reported by `origin` into its row.
    ///
    /// `next_ts` must strictly increase from whatever `origin` last
    /// reported (0 means "never reported", so any value passes the
    /// first time). Every `last_seq_no` in `entries` must not
    /// decrease either.
    pub fn apply_clock_update(
        &mut self,
        origin: PeerId,
        next_ts: u64,
        entries: &[PeerVClockEntry],
    ) -> Result<(), PeerMatrixError> {
        let idx = self.peer_id_to_index(origin);
        let row = &mut self.entries[idx as usize];

        if row.next_ts != 0 && next_ts <= row.next_ts {
            return Err(PeerMatrixError::ClockRegression {
                peer_id: origin,
                previous: row.next_ts,
                attempted: next_ts,
            });
        }
        row.next_ts = next_ts;

        for entry in entries {
            row.upsert(*entry)?;
        }
        tracing::debug!(origin = %origin, next_ts, "applied clock update");
        Ok(())
    }

    /// Records that the local peer has applied a message from
    /// `peer_id` up through `seq_no`. Called by the engine after a
    /// message is fully applied; feeds [`PeerMatrix::causally_ready`].
    pub fn record_applied(&mut self, peer_id: PeerId, seq_no: u64) {
        let idx = self.peer_id_to_index(peer_id);
        let local = &mut self.entries[0];
        // Monotonic by construction: the engine only calls this with
        // strictly increasing sequence numbers per sender.
        let _ = local.upsert(PeerVClockEntry {
            peer_id,
            peer_index: idx,
            last_seq_no: seq_no,
        });
        self.applied_index.insert(peer_id, seq_no);
    }

    /// Returns the last sequence number applied locally from `peer_id`.
    ///
    /// Backed by `applied_index`, a `PeerId`-keyed mirror of
    /// `entries[0].clock` kept for this lookup specifically —
    /// `causally_ready` calls this once per reported dependency, and
    /// `entries[0]`'s own representation is a linear `Vec` meant for
    /// ordered iteration, not point lookup.
    #[must_use]
    pub fn last_applied_seq(&self, peer_id: PeerId) -> u64 {
        self.applied_index.get(&peer_id).copied().unwrap_or(0)
    }

    /// True iff every dependency named in `reported_clock` (a sender's
    /// self-reported view of what it has observed) has already been
    /// applied locally.
    ///
    /// An entry naming the local peer itself is always satisfied: a
    /// sender's claim to have observed *our* messages up to some
    /// sequence number is never a real dependency, since we trivially
    /// know everything we have ever produced ourselves (and
    /// `last_applied_seq` never records self-observations — it only
    /// tracks what we've applied from others).
    #[must_use]
    pub fn causally_ready(&self, reported_clock: &[PeerVClockEntry]) -> bool {
        let local = self.local_peer_id();
        reported_clock
            .iter()
            .all(|e| e.peer_id == local || self.last_applied_seq(e.peer_id) >= e.last_seq_no)
    }

    /// Iterates over every known peer entry, in index order.
    pub fn entries(&self) -> impl Iterator<Item = &PeerEntry> {
        self.entries.iter()
    }

    /// Clones out the ordered peer-entry list, suitable for
    /// persistence via [`PeerMatrix::from_entries`].
    #[must_use]
    pub fn to_entries(&self) -> Vec<PeerEntry> {
        self.entries.clone()
    }

    /// Returns the number of known peers (including the local one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false // entries[0] (the local peer) always exists.
    }
}
