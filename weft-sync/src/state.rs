//! Persisted engine state: the record written to stable storage on
//! shutdown and restored verbatim on startup.

use serde::{Deserialize, Serialize};
use weft_crdt::{CursorMap, OrderedList, PeerEntry};
use weft_types::{ChannelId, ItemId};

/// A single logged outgoing or applied message, kept for replay on
/// startup. `offset` starts at `-1` and transitions exactly once, to
/// the value the relay assigns once it has accepted the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub sender_peer_index: u64,
    pub sender_seq_no: u64,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// The document this engine replicates: the text itself plus every
/// collaborator's cursor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TextDocument {
    pub characters: OrderedList<char>,
    pub cursors: CursorMap<u64>,
}

/// The full persisted state of one peer's engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerState {
    pub channel_id: ChannelId,
    /// The last offset this peer has durably consumed from the relay,
    /// or `-1` if it has never subscribed.
    pub channel_offset: i64,
    /// The channel's symmetric key, if payloads on this channel are
    /// sealed. `None` means messages are exchanged in the clear.
    pub secret_key: Option<[u8; 32]>,
    pub default_schema_id: ItemId,
    pub cursors_item_id: ItemId,
    pub characters_item_id: ItemId,
    pub peers: Vec<PeerEntry>,
    pub message_log: Vec<MessageLogEntry>,
    pub data: TextDocument,
}
