//! Core identifier primitives for the weft collaborative-editing engine.
//!
//! This crate defines the fundamental, transport-agnostic identifiers
//! used throughout the engine:
//! - [`PeerId`] — a 256-bit identifier for a peer instance
//! - [`ChannelId`] — a 128-bit identifier for a shared document/channel
//! - [`ItemId`] — a totally-ordered `(logicalTS, peerID)` pair used to
//!   identify every edit
//!
//! Higher-level concerns (CRDT merge semantics, wire encoding, sealing)
//! live in sibling crates; this crate has no knowledge of any of them.

mod error;
mod ids;
mod item_id;

pub use error::{TypesError, TypesResult};
pub use ids::{ChannelId, PeerId};
pub use item_id::ItemId;
