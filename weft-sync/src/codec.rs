//! Binary wire codec: message framing and peer-index translation.
//!
//! This module never touches the peer engine's document state — it
//! only knows how to turn a [`Message`] into bytes and back, and how
//! to translate an in-memory [`ItemId`] (carrying a full [`PeerId`])
//! into its wire form (carrying a compact `peerIndex`) and back, given
//! a reference to the engine's [`PeerMatrix`].

use weft_crdt::PeerMatrix;
use weft_types::{ItemId, PeerId};

use crate::error::{EngineError, EngineResult};
use crate::protocol::{Message, WireItemId};

/// Maximum size of a single framed message, in bytes. Chosen generously
/// for a text document; a real deployment would tune this to the
/// expected document size.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix, in bytes.
const LEN_PREFIX_SIZE: usize = 4;

/// Serializes `message` to its binary wire form and prepends a 4-byte
/// big-endian length prefix, ready to hand to a transport.
pub fn encode_frame(message: &Message) -> EngineResult<Vec<u8>> {
    let body = postcard::to_allocvec(message)?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(EngineError::FrameTooLarge(body.len()));
    }
    let mut frame = Vec::with_capacity(LEN_PREFIX_SIZE + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Reads the message encoded by [`encode_frame`] back out of `bytes`.
/// `bytes` must contain exactly one frame; trailing bytes are an
/// error since the sealed transport layer delivers one message per
/// envelope.
pub fn decode_frame(bytes: &[u8]) -> EngineResult<Message> {
    if bytes.len() < LEN_PREFIX_SIZE {
        return Err(EngineError::TruncatedFrame {
            expected: LEN_PREFIX_SIZE,
            got: bytes.len(),
        });
    }
    let (len_bytes, rest) = bytes.split_at(LEN_PREFIX_SIZE);
    let len = u32::from_be_bytes(len_bytes.try_into().expect("checked length above")) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(EngineError::FrameTooLarge(len));
    }
    if rest.len() < len {
        return Err(EngineError::TruncatedFrame {
            expected: len,
            got: rest.len(),
        });
    }

    postcard::from_bytes(&rest[..len]).map_err(|err| match err {
        postcard::Error::DeserializeBadEnum => EngineError::UnknownOperationVariant,
        other => EngineError::Codec(other),
    })
}

/// Encodes an in-memory `ItemId` to its wire form, assigning `id`'s
/// peer a fresh index in `matrix` if this is the first time it has
/// been referenced.
pub fn item_id_to_wire(matrix: &mut PeerMatrix, id: ItemId) -> WireItemId {
    WireItemId {
        logical_ts: id.logical_ts,
        peer_index: matrix.peer_id_to_index(id.peer_id),
    }
}

/// Decodes a wire `ItemId` back to its in-memory form. `origin` is the
/// peer that sent the message this `ItemId` appeared in; `peer_index`
/// is resolved relative to `origin`'s declared mappings.
pub fn wire_to_item_id(
    matrix: &PeerMatrix,
    origin: PeerId,
    wire: WireItemId,
) -> EngineResult<ItemId> {
    let peer_id = matrix.remote_index_to_peer_id(origin, wire.peer_index)?;
    Ok(ItemId::new(wire.logical_ts, peer_id))
}
