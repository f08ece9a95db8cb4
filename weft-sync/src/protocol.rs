//! Wire record shapes for the peer engine.
//!
//! The wire form mirrors the in-memory model closely, with one
//! deliberate difference: every `ItemId` on the wire carries a compact
//! `peerIndex` instead of the full 32-byte `PeerId`. Translating
//! between the two is the codec's job (see `crate::codec`), not this
//! module's.

use serde::{Deserialize, Serialize};

/// The wire form of an `ItemId`: `(logicalTS, peerIndex)` instead of
/// `(logicalTS, peerId)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireItemId {
    pub logical_ts: u64,
    pub peer_index: u64,
}

/// One entry of a `ClockUpdate`: "origin has observed messages from
/// `peer_index` up to `last_seq_no`".
///
/// `peer_id` is present the first time `origin` introduces
/// `peer_index` to the recipient; omitted on subsequent clock updates
/// that merely refresh `last_seq_no` for an already-known index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerClockUpdate {
    #[serde(default)]
    pub peer_id: Option<weft_types::PeerId>,
    pub peer_index: u64,
    pub last_seq_no: u64,
}

/// Declares the sender's current vector clock. Entries must appear in
/// ascending `peer_index` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockUpdate {
    pub next_ts: u64,
    pub entries: Vec<PeerClockUpdate>,
}

/// Declares (or re-declares) a schema. The core treats `definition` as
/// an opaque blob; only the declaring `schema_id` matters for the
/// per-engine schema cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaUpdate {
    pub schema_id: WireItemId,
    pub definition: Vec<u8>,
}

/// Inserts a character into the ordered list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertCharOp {
    pub reference_id: Option<WireItemId>,
    pub new_id: WireItemId,
    pub value: char,
}

/// Deletes (tombstones) a character already in the ordered list.
///
/// Carries `is_delete_character`, a placeholder field kept solely for
/// bit-exact compatibility with a historical decoder that told this
/// variant apart from `SetCursorOp` by the field's presence rather
/// than an explicit tag. Always `true`; never read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCharOp {
    pub delete_id: WireItemId,
    pub delete_ts: WireItemId,
    #[serde(default = "default_true")]
    pub is_delete_character: bool,
}

/// Updates the sender's cursor position. `update_ts.peer_index`
/// identifies the cursor-map key this write targets (the sender, in
/// every case actually observed, since each peer only writes its own
/// entry).
///
/// Carries `is_set_cursor` for the same legacy-compatibility reason as
/// [`DeleteCharOp::is_delete_character`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetCursorOp {
    pub update_ts: WireItemId,
    pub position: u64,
    #[serde(default = "default_true")]
    pub is_set_cursor: bool,
}

fn default_true() -> bool {
    true
}

/// The application-level operations: edits to the document CRDTs, as
/// opposed to engine bookkeeping (`ClockUpdate`, `SchemaUpdate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppOperation {
    InsertChar(InsertCharOp),
    DeleteChar(DeleteCharOp),
    SetCursor(SetCursorOp),
}

/// One entry of a message's operation list. Three variants, tagged
/// explicitly rather than distinguished structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireOp {
    ClockUpdate(ClockUpdate),
    SchemaUpdate(SchemaUpdate),
    Operation(AppOperation),
}

/// A full wire message: a schema reference, an informational
/// timestamp, and an ordered list of operations to apply in sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub schema_id: WireItemId,
    /// Informational only; not used for correctness and not required
    /// to round-trip bit-exact.
    pub timestamp: i64,
    pub operations: Vec<WireOp>,
}
