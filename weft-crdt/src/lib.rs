//! CRDT building blocks for the weft collaborative text engine.
//!
//! Three pieces compose to form a replicated document:
//! - [`PeerMatrix`] tracks who the engine has heard from and what it
//!   has applied from them
//! - [`OrderedList`] is the RGA that holds the document's characters
//! - [`CursorMap`] is an LWW map holding each peer's cursor position
//!
//! None of these types know about the wire format, encryption, or
//! transport — they only implement the merge rules. That separation
//! mirrors how the engine crate composes them.

mod cursor_map;
mod peer_matrix;
mod rga;

pub use cursor_map::CursorMap;
pub use peer_matrix::{PeerEntry, PeerMatrix, PeerMatrixError, PeerVClockEntry};
pub use rga::{DeleteOp, InsertOp, OrderedList, OrderedListItem};
