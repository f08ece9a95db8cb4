//! Error types for the wire codec and peer engine.

use thiserror::Error;
use weft_crdt::PeerMatrixError;
use weft_types::PeerId;

/// Result type for engine and codec operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the peer engine. See §7 of the design notes for
/// the policy each variant implies: some are fatal to the whole
/// engine, some are fatal only to the message being processed, some
/// are reported and otherwise harmless.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Covers the three peer-matrix failure modes: `IndexMismatch` on
    /// load, `UnknownPeerIndex` on a decoded operation, and
    /// `ClockRegression` on a non-monotonic clock update. See
    /// [`PeerMatrixError`] for which is which.
    #[error(transparent)]
    PeerMatrix(#[from] PeerMatrixError),

    /// `senderSeqNo` was not exactly `last_applied_seq_from_sender +
    /// 1`. Reported up to the transport, which should resubscribe from
    /// `last_known_seq_no`.
    #[error("out-of-order sequence number from {sender}: expected {expected}, got {got}")]
    OutOfOrderSeqNo {
        sender: PeerId,
        expected: u64,
        got: u64,
        last_known_seq_no: u64,
    },

    /// A decoded operation, clock update, or schema update did not
    /// match any known tag — distinguished from a generic [`Self::Codec`]
    /// failure because postcard surfaces a bad enum discriminant as its
    /// own `DeserializeBadEnum` variant; see `crate::codec::decode_frame`.
    #[error("decoded message contained an unknown operation variant tag")]
    UnknownOperationVariant,

    /// Decryption or authentication failed on a sealed payload. The
    /// message is discarded; not fatal to the engine.
    #[error("seal/open failed: payload is tampered or the key is wrong")]
    SealOpen,

    /// The message body could not be decoded, or exceeded the frame
    /// size limit.
    #[error("wire codec error: {0}")]
    Codec(#[from] postcard::Error),

    /// The frame length prefix exceeded [`crate::codec::MAX_MESSAGE_SIZE`].
    #[error("frame of {0} bytes exceeds the maximum message size")]
    FrameTooLarge(usize),

    /// The byte stream ended before a full frame could be read.
    #[error("truncated frame: expected {expected} bytes, got {got}")]
    TruncatedFrame { expected: usize, got: usize },
}
