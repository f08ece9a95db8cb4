//! The peer engine: local mutation capture, message apply/buffer, and
//! replay.
//!
//! The engine is a pure state machine with no I/O of its own (see the
//! concurrency model in the design notes): callers hand it bytes and
//! get bytes back. Everything it touches — the peer matrix, the
//! ordered-list CRDT, the cursor map — is owned exclusively by this
//! type; nothing outside the engine ever mutates them directly.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use weft_crdt::{CursorMap, OrderedList, PeerMatrix, PeerVClockEntry};
use weft_crypto::ChannelKey;
use weft_types::{ChannelId, ItemId, PeerId};

use crate::codec::{self, MAX_MESSAGE_SIZE};
use crate::error::{EngineError, EngineResult};
use crate::protocol::{
    AppOperation, ClockUpdate, DeleteCharOp, InsertCharOp, Message, PeerClockUpdate, SchemaUpdate,
    SetCursorOp, WireOp,
};
use crate::state::{MessageLogEntry, PeerState, TextDocument};

/// Engine-wide tunables that don't belong to any single channel's
/// CRDT state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Human-readable label for this peer, surfaced in logs only.
    pub device_name: String,
    /// Upper bound on how many not-yet-causally-ready messages the
    /// engine will hold in its buffer at once. When exceeded, the
    /// oldest buffered message is dropped (and a warning logged)
    /// rather than growing without bound.
    pub max_pending_messages: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_name: "weft peer".to_string(),
            max_pending_messages: 256,
        }
    }
}

/// A locally produced, not-yet-encoded operation.
#[derive(Debug, Clone)]
enum LocalOp {
    Insert {
        reference_id: Option<ItemId>,
        new_id: ItemId,
        value: char,
    },
    Delete {
        delete_id: ItemId,
        delete_ts: ItemId,
    },
    Cursor {
        update_ts: ItemId,
        position: u64,
    },
}

/// A decoded message that could not be applied yet because its
/// reported dependencies were not causally satisfied, or whose sender
/// sequence was ahead of what we expect next from that sender.
struct PendingMessage {
    origin: PeerId,
    sender_seq: u64,
    offset: i64,
    raw_payload: Vec<u8>,
    message: Message,
}

/// The peer engine: owns one peer's view of one channel and exposes
/// local-mutation and message-apply operations as its API surface.
pub struct Engine {
    local_peer_id: PeerId,
    channel_id: ChannelId,
    channel_offset: i64,
    key: Option<ChannelKey>,
    config: EngineConfig,

    local_clock: u64,
    local_seq: u64,

    matrix: PeerMatrix,
    characters: OrderedList<char>,
    cursors: CursorMap<u64>,

    outgoing: Vec<LocalOp>,
    message_log: Vec<MessageLogEntry>,
    pending: Vec<PendingMessage>,

    schema_cache: HashMap<ItemId, Vec<u8>>,
    default_schema_id: ItemId,
    cursors_item_id: ItemId,
    characters_item_id: ItemId,

    /// Peers whose full `PeerId` we have already sent in some prior
    /// `ClockUpdate`. Later updates referencing the same peer omit the
    /// `peer_id` field.
    declared_peer_ids: std::collections::HashSet<PeerId>,
}

impl Engine {
    /// Creates a fresh engine for a new peer joining `channel_id`.
    #[must_use]
    pub fn new_peer(peer_id: PeerId, channel_id: ChannelId) -> Self {
        // The document has one fixed schema for its lifetime (schema
        // migration is explicitly out of scope); mint a single
        // bootstrap identifier for it rather than standing up a real
        // schema-negotiation handshake.
        let bootstrap = ItemId::new(0, peer_id);
        Self {
            local_peer_id: peer_id,
            channel_id,
            channel_offset: -1,
            key: None,
            config: EngineConfig::default(),
            local_clock: 0,
            local_seq: 0,
            matrix: PeerMatrix::new(peer_id),
            characters: OrderedList::new(),
            cursors: CursorMap::new(),
            outgoing: Vec::new(),
            message_log: Vec::new(),
            pending: Vec::new(),
            schema_cache: HashMap::new(),
            default_schema_id: bootstrap,
            cursors_item_id: bootstrap,
            characters_item_id: bootstrap,
            declared_peer_ids: std::collections::HashSet::from([peer_id]),
        }
    }

    /// Sets the channel's symmetric key. Once set, `encode_message`
    /// seals outgoing payloads and `receive_message` expects sealed
    /// input. Channels without a key exchange plaintext frames.
    #[must_use]
    pub fn with_channel_key(mut self, key: ChannelKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Overrides the default [`EngineConfig`].
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Restores an engine from a snapshot produced by [`Engine::save`].
    pub fn load(state_bytes: &[u8]) -> EngineResult<Self> {
        let state: PeerState = postcard::from_bytes(state_bytes)?;
        let matrix = PeerMatrix::from_entries(state.peers)?;
        let local_peer_id = matrix.local_peer_id();

        let mut engine = Self {
            local_peer_id,
            channel_id: state.channel_id,
            channel_offset: state.channel_offset,
            key: state.secret_key.map(ChannelKey::from_bytes),
            config: EngineConfig::default(),
            local_clock: 0,
            local_seq: 0,
            matrix,
            characters: state.data.characters,
            cursors: state.data.cursors,
            outgoing: Vec::new(),
            message_log: state.message_log,
            pending: Vec::new(),
            schema_cache: HashMap::new(),
            default_schema_id: state.default_schema_id,
            cursors_item_id: state.cursors_item_id,
            characters_item_id: state.characters_item_id,
            declared_peer_ids: std::collections::HashSet::from([local_peer_id]),
        };

        engine.local_clock = engine
            .message_log
            .iter()
            .filter(|e| e.sender_peer_index == 0)
            .map(|e| e.sender_seq_no)
            .max()
            .unwrap_or(0);
        engine.local_seq = engine.local_clock;

        info!(
            peer = %engine.local_peer_id,
            channel = %engine.channel_id,
            device = %engine.config.device_name,
            log_len = engine.message_log.len(),
            "loaded engine from snapshot"
        );
        Ok(engine)
    }

    /// Serializes this engine's full state to a snapshot suitable for
    /// [`Engine::load`].
    pub fn save(&self) -> EngineResult<Vec<u8>> {
        let state = PeerState {
            channel_id: self.channel_id,
            channel_offset: self.channel_offset,
            secret_key: self.key.as_ref().map(|k| *k.as_bytes()),
            default_schema_id: self.default_schema_id,
            cursors_item_id: self.cursors_item_id,
            characters_item_id: self.characters_item_id,
            peers: self.matrix.to_entries(),
            message_log: self.message_log.clone(),
            data: TextDocument {
                characters: self.characters.clone(),
                cursors: self.cursors.clone(),
            },
        };
        Ok(postcard::to_allocvec(&state)?)
    }

    // ── Local mutations ──────────────────────────────────────────

    /// Inserts `ch` at `index` in the document and buffers the
    /// resulting operation for the next `encode_message`.
    pub fn insert_char(&mut self, index: usize, ch: char) {
        let new_id = self.next_local_id();
        let op = self.characters.insert_at(index, new_id, ch);
        self.outgoing.push(LocalOp::Insert {
            reference_id: op.reference_id,
            new_id: op.new_id,
            value: op.value,
        });
    }

    /// Deletes the character at `index`, if any.
    pub fn delete_char(&mut self, index: usize) {
        let delete_ts = self.next_local_id();
        if let Some(op) = self.characters.delete_at(index, delete_ts) {
            self.outgoing.push(LocalOp::Delete {
                delete_id: op.delete_id,
                delete_ts: op.delete_ts,
            });
        }
    }

    /// Sets the local peer's cursor to `index`.
    pub fn set_cursor(&mut self, index: usize) {
        let update_ts = self.next_local_id();
        self.cursors.put(self.local_peer_id, index as u64, update_ts);
        self.outgoing.push(LocalOp::Cursor {
            update_ts,
            position: index as u64,
        });
    }

    fn next_local_id(&mut self) -> ItemId {
        self.local_clock += 1;
        ItemId::new(self.local_clock, self.local_peer_id)
    }

    // ── Queries ──────────────────────────────────────────────────

    /// The current visible document.
    #[must_use]
    pub fn document(&self) -> String {
        self.characters.as_string()
    }

    /// The current cursor position reported by `peer_id`, if any.
    #[must_use]
    pub fn cursor_of(&self, peer_id: PeerId) -> Option<usize> {
        self.cursors.get(peer_id).map(|&p| p as usize)
    }

    #[must_use]
    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    #[must_use]
    pub fn message_log_len(&self) -> usize {
        self.message_log.len()
    }

    /// Number of received messages currently held because they are not
    /// yet causally ready to apply.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    // ── Outgoing ─────────────────────────────────────────────────

    /// Builds and seals the next outgoing message, if any local
    /// mutations are pending. Returns `None` if there is nothing to
    /// send.
    pub fn encode_message(&mut self) -> EngineResult<Option<Vec<u8>>> {
        if self.outgoing.is_empty() {
            return Ok(None);
        }

        let clock_update = self.build_clock_update();
        let mut wire_ops = vec![WireOp::ClockUpdate(clock_update)];

        for local_op in self.outgoing.drain(..).collect::<Vec<_>>() {
            let wire_op = match local_op {
                LocalOp::Insert {
                    reference_id,
                    new_id,
                    value,
                } => {
                    let reference_id =
                        reference_id.map(|r| codec::item_id_to_wire(&mut self.matrix, r));
                    let new_id = codec::item_id_to_wire(&mut self.matrix, new_id);
                    WireOp::Operation(AppOperation::InsertChar(InsertCharOp {
                        reference_id,
                        new_id,
                        value,
                    }))
                }
                LocalOp::Delete { delete_id, delete_ts } => {
                    let delete_id = codec::item_id_to_wire(&mut self.matrix, delete_id);
                    let delete_ts = codec::item_id_to_wire(&mut self.matrix, delete_ts);
                    WireOp::Operation(AppOperation::DeleteChar(DeleteCharOp {
                        delete_id,
                        delete_ts,
                        is_delete_character: true,
                    }))
                }
                LocalOp::Cursor { update_ts, position } => {
                    let update_ts = codec::item_id_to_wire(&mut self.matrix, update_ts);
                    WireOp::Operation(AppOperation::SetCursor(SetCursorOp {
                        update_ts,
                        position,
                        is_set_cursor: true,
                    }))
                }
            };
            wire_ops.push(wire_op);
        }

        let schema_id = codec::item_id_to_wire(&mut self.matrix, self.characters_item_id);
        let message = Message {
            schema_id,
            timestamp: now_millis(),
            operations: wire_ops,
        };

        let frame = codec::encode_frame(&message)?;
        let payload = match &self.key {
            Some(key) => weft_crypto::seal(key, &frame),
            None => frame,
        };

        self.local_seq += 1;
        self.message_log.push(MessageLogEntry {
            sender_peer_index: 0,
            sender_seq_no: self.local_seq,
            offset: -1,
            payload: payload.clone(),
        });

        info!(
            peer = %self.local_peer_id,
            seq = self.local_seq,
            ops = message.operations.len(),
            "encoded outgoing message"
        );
        Ok(Some(payload))
    }

    fn build_clock_update(&mut self) -> ClockUpdate {
        let next_ts = self.local_clock + 1;
        let declared = &mut self.declared_peer_ids;
        let local_row_clock = self
            .matrix
            .entries()
            .next()
            .expect("local peer row always exists")
            .clock
            .clone();

        let entries = local_row_clock
            .into_iter()
            .map(|e| {
                let peer_id = if declared.contains(&e.peer_id) {
                    None
                } else {
                    declared.insert(e.peer_id);
                    Some(e.peer_id)
                };
                PeerClockUpdate {
                    peer_id,
                    peer_index: e.peer_index,
                    last_seq_no: e.last_seq_no,
                }
            })
            .collect();

        ClockUpdate { next_ts, entries }
    }

    // ── Incoming ─────────────────────────────────────────────────

    /// Processes a message received from the transport. `sender_seq`
    /// must be exactly one more than the last sequence number applied
    /// from `sender_id`, or this returns
    /// [`EngineError::OutOfOrderSeqNo`].
    pub fn receive_message(
        &mut self,
        sender_id: PeerId,
        sender_seq: u64,
        offset: i64,
        payload: Vec<u8>,
    ) -> EngineResult<()> {
        let expected = self.matrix.last_applied_seq(sender_id) + 1;
        if sender_seq != expected {
            return Err(EngineError::OutOfOrderSeqNo {
                sender: sender_id,
                expected,
                got: sender_seq,
                last_known_seq_no: self.matrix.last_applied_seq(sender_id),
            });
        }

        let frame = match &self.key {
            Some(key) => weft_crypto::open(key, &payload).map_err(|_| EngineError::SealOpen)?,
            None => payload.clone(),
        };
        let message = codec::decode_frame(&frame)?;

        let applied = self.try_apply(sender_id, sender_seq, offset, payload, message)?;
        if applied {
            self.drain_pending()?;
        }
        Ok(())
    }

    /// Attempts to apply a decoded message immediately. Returns `Ok(true)`
    /// if it was applied, `Ok(false)` if it was buffered.
    fn try_apply(
        &mut self,
        origin: PeerId,
        sender_seq: u64,
        offset: i64,
        raw_payload: Vec<u8>,
        message: Message,
    ) -> EngineResult<bool> {
        // Register every index mapping the sender declares before
        // resolving any WireItemId in the rest of the message.
        for op in &message.operations {
            if let WireOp::ClockUpdate(update) = op {
                for entry in &update.entries {
                    self.matrix
                        .peer_index_mapping(origin, entry.peer_id, entry.peer_index)?;
                }
            }
        }

        let reported_clock = self.resolve_reported_clock(origin, &message)?;
        if !self.matrix.causally_ready(&reported_clock) {
            debug!(origin = %origin, seq = sender_seq, "message not causally ready, buffering");
            if self.pending.len() >= self.config.max_pending_messages {
                let dropped = self.pending.remove(0);
                warn!(
                    origin = %dropped.origin,
                    seq = dropped.sender_seq,
                    limit = self.config.max_pending_messages,
                    "pending buffer full, dropping oldest buffered message"
                );
            }
            self.pending.push(PendingMessage {
                origin,
                sender_seq,
                offset,
                raw_payload,
                message,
            });
            return Ok(false);
        }

        self.apply_ready_message(origin, sender_seq, offset, raw_payload, &message)?;
        Ok(true)
    }

    fn resolve_reported_clock(
        &self,
        origin: PeerId,
        message: &Message,
    ) -> EngineResult<Vec<PeerVClockEntry>> {
        let mut resolved = Vec::new();
        for op in &message.operations {
            if let WireOp::ClockUpdate(update) = op {
                for entry in &update.entries {
                    let peer_id = match entry.peer_id {
                        Some(id) => id,
                        None => self.matrix.remote_index_to_peer_id(origin, entry.peer_index)?,
                    };
                    resolved.push(PeerVClockEntry {
                        peer_id,
                        peer_index: entry.peer_index,
                        last_seq_no: entry.last_seq_no,
                    });
                }
            }
        }
        Ok(resolved)
    }

    fn apply_ready_message(
        &mut self,
        origin: PeerId,
        sender_seq: u64,
        offset: i64,
        raw_payload: Vec<u8>,
        message: &Message,
    ) -> EngineResult<()> {
        for op in &message.operations {
            match op {
                WireOp::ClockUpdate(update) => {
                    let entries = self.resolve_update_entries(origin, update)?;
                    self.matrix.apply_clock_update(origin, update.next_ts, &entries)?;
                }
                WireOp::SchemaUpdate(SchemaUpdate { schema_id, definition }) => {
                    let id = codec::wire_to_item_id(&self.matrix, origin, *schema_id)?;
                    self.schema_cache.insert(id, definition.clone());
                }
                WireOp::Operation(AppOperation::InsertChar(op)) => {
                    let reference_id = op
                        .reference_id
                        .map(|r| codec::wire_to_item_id(&self.matrix, origin, r))
                        .transpose()?;
                    let new_id = codec::wire_to_item_id(&self.matrix, origin, op.new_id)?;
                    self.characters.apply_insert(reference_id, new_id, op.value);
                }
                WireOp::Operation(AppOperation::DeleteChar(op)) => {
                    let delete_id = codec::wire_to_item_id(&self.matrix, origin, op.delete_id)?;
                    let delete_ts = codec::wire_to_item_id(&self.matrix, origin, op.delete_ts)?;
                    self.characters.apply_delete(delete_id, delete_ts);
                }
                WireOp::Operation(AppOperation::SetCursor(op)) => {
                    let update_ts = codec::wire_to_item_id(&self.matrix, origin, op.update_ts)?;
                    self.cursors.put(update_ts.peer_id, op.position, update_ts);
                }
            }
        }

        self.matrix.record_applied(origin, sender_seq);
        self.message_log.push(MessageLogEntry {
            sender_peer_index: self.matrix.existing_index(origin).unwrap_or(0),
            sender_seq_no: sender_seq,
            offset,
            payload: raw_payload,
        });
        info!(origin = %origin, seq = sender_seq, "applied message");
        Ok(())
    }

    fn resolve_update_entries(
        &self,
        origin: PeerId,
        update: &ClockUpdate,
    ) -> EngineResult<Vec<PeerVClockEntry>> {
        update
            .entries
            .iter()
            .map(|entry| {
                let peer_id = match entry.peer_id {
                    Some(id) => id,
                    None => self.matrix.remote_index_to_peer_id(origin, entry.peer_index)?,
                };
                Ok(PeerVClockEntry {
                    peer_id,
                    peer_index: entry.peer_index,
                    last_seq_no: entry.last_seq_no,
                })
            })
            .collect()
    }

    /// Re-examines every buffered message after a successful apply;
    /// repeats until a full pass makes no further progress.
    fn drain_pending(&mut self) -> EngineResult<()> {
        loop {
            let mut progressed = false;
            let mut still_pending = Vec::with_capacity(self.pending.len());

            for pending in std::mem::take(&mut self.pending) {
                let expected = self.matrix.last_applied_seq(pending.origin) + 1;
                if pending.sender_seq != expected {
                    still_pending.push(pending);
                    continue;
                }

                match self.resolve_reported_clock(pending.origin, &pending.message) {
                    Ok(reported_clock) if self.matrix.causally_ready(&reported_clock) => {
                        if let Err(e) = self.apply_ready_message(
                            pending.origin,
                            pending.sender_seq,
                            pending.offset,
                            pending.raw_payload.clone(),
                            &pending.message,
                        ) {
                            warn!(origin = %pending.origin, error = %e, "dropping undeliverable buffered message");
                            continue;
                        }
                        progressed = true;
                    }
                    Ok(_) => still_pending.push(pending),
                    Err(e) => {
                        warn!(origin = %pending.origin, error = %e, "dropping undeliverable buffered message");
                    }
                }
            }

            self.pending = still_pending;
            if !progressed {
                break;
            }
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

const _: () = assert!(MAX_MESSAGE_SIZE > 0);
