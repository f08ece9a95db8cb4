//! Ordered-list CRDT (RGA — Replicated Growable Array).
//!
//! Each insertion carries the `ItemId` of its immediate left neighbor
//! at insertion time (its "reference"). The visible sequence is
//! produced by a deterministic linearization that every replica
//! computes the same way, regardless of the order operations arrive
//! in — this is what makes concurrent inserts converge.
//!
//! Use cases:
//! - The characters of a collaboratively-edited text document
//! - Any ordered sequence where position matters and inserts/deletes
//!   must commute across replicas

use serde::{Deserialize, Serialize};
use weft_types::ItemId;

/// An entry in the ordered list.
///
/// `value` is `None` iff `delete_ts` is set — deletion clears the
/// value and sets a tombstone, but the entry itself (and its original
/// position in the insertion graph) is retained forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderedListItem<T> {
    /// This item's identity. Never changes.
    pub id: ItemId,
    /// The `ItemId` this item was inserted immediately after, or
    /// `None` if it was inserted at the head of the list. Needed to
    /// replay the insertion-ordering rule for concurrent inserts.
    reference_id: Option<ItemId>,
    /// The value, or `None` if this item has been deleted.
    pub value: Option<T>,
    /// The `ItemId` of the delete operation that tombstoned this
    /// item, if any.
    pub delete_ts: Option<ItemId>,
}

impl<T> OrderedListItem<T> {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.delete_ts.is_some()
    }
}

/// The result of a local insertion: what to broadcast to other peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertOp<T> {
    pub reference_id: Option<ItemId>,
    pub new_id: ItemId,
    pub value: T,
}

/// The result of a local deletion: what to broadcast to other peers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeleteOp {
    pub delete_id: ItemId,
    pub delete_ts: ItemId,
}

/// An ordered-list CRDT.
///
/// Tombstones are never removed; iteration over the visible document
/// skips them. The list length (including tombstones) only grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderedList<T> {
    items: Vec<OrderedListItem<T>>,
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Clone> OrderedList<T> {
    /// Creates an empty ordered list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of items retained, including tombstones.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.items.len()
    }

    /// Number of visible (non-deleted) items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.iter().filter(|i| !i.is_deleted()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the visible items as a vector, in document order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.items
            .iter()
            .filter_map(|i| i.value.clone())
            .collect()
    }

    /// Returns the value at a visible index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.visible_iter().nth(index).and_then(|i| i.value.as_ref())
    }

    /// Returns whether an `ItemId` exists in the list (even if
    /// tombstoned).
    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        self.find_index(id).is_some()
    }

    /// Returns whether an `ItemId` is tombstoned.
    #[must_use]
    pub fn is_tombstoned(&self, id: ItemId) -> bool {
        self.find_index(id)
            .map(|idx| self.items[idx].is_deleted())
            .unwrap_or(false)
    }

    /// Returns the `ItemId` of the visible predecessor of `index`, or
    /// `None` if `index` is 0 (insertion at the head).
    #[must_use]
    pub fn reference_id_for_index(&self, index: usize) -> Option<ItemId> {
        if index == 0 {
            return None;
        }
        self.visible_iter().nth(index - 1).map(|i| i.id)
    }

    fn visible_iter(&self) -> impl Iterator<Item = &OrderedListItem<T>> {
        self.items.iter().filter(|i| !i.is_deleted())
    }

    fn find_index(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    /// Applies a remote (or local) insertion.
    ///
    /// Items anchored at the same reference are linearized in
    /// ascending `ItemId` order: the skip loop steps over any
    /// already-present item whose ID sorts *before* `new_id`, so the
    /// new item lands just ahead of the first same-anchor item with a
    /// greater ID (or at the end of the chain). This is what makes
    /// concurrent inserts at one position converge to the same order
    /// everywhere regardless of application order.
    pub fn apply_insert(&mut self, reference_id: Option<ItemId>, new_id: ItemId, value: T) {
        let mut pos = match reference_id {
            None => 0,
            Some(rid) => match self.find_index(rid) {
                Some(idx) => idx + 1,
                // The reference was never seen (shouldn't happen once
                // causal delivery is respected) — fall back to the head.
                None => 0,
            },
        };

        while pos < self.items.len() {
            let candidate = &self.items[pos];
            let candidate_wins_position = candidate.id < new_id
                && opt_id_le(candidate.reference_id, reference_id);
            if candidate_wins_position {
                pos += 1;
            } else {
                break;
            }
        }

        self.items.insert(
            pos,
            OrderedListItem {
                id: new_id,
                reference_id,
                value: Some(value),
                delete_ts: None,
            },
        );
    }

    /// Applies a remote (or local) deletion. Idempotent: re-applying
    /// the same or a different deletion to an already-tombstoned item
    /// keeps the earliest (lowest) tombstone `ItemId`.
    pub fn apply_delete(&mut self, delete_id: ItemId, delete_ts: ItemId) {
        if let Some(idx) = self.find_index(delete_id) {
            let item = &mut self.items[idx];
            item.value = None;
            item.delete_ts = Some(match item.delete_ts {
                Some(existing) if existing <= delete_ts => existing,
                _ => delete_ts,
            });
        }
    }

    /// Computes the op for a local insertion at a visible index,
    /// mutating the list in place. `new_id` must already be freshly
    /// allocated by the caller's logical clock.
    pub fn insert_at(&mut self, visible_index: usize, new_id: ItemId, value: T) -> InsertOp<T> {
        let reference_id = self.reference_id_for_index(visible_index);
        self.apply_insert(reference_id, new_id, value.clone());
        InsertOp {
            reference_id,
            new_id,
            value,
        }
    }

    /// Computes the op for a local deletion at a visible index,
    /// mutating the list in place. Returns `None` if the index is out
    /// of range.
    pub fn delete_at(&mut self, visible_index: usize, delete_ts: ItemId) -> Option<DeleteOp> {
        let id = self.visible_iter().nth(visible_index)?.id;
        self.apply_delete(id, delete_ts);
        Some(DeleteOp {
            delete_id: id,
            delete_ts,
        })
    }
}

/// Orders `Option<ItemId>` with `None` (the virtual head) below every
/// `Some`, matching the "reference_id compares ≤ reference_id" rule
/// from spec.md §4.2.
fn opt_id_le(a: Option<ItemId>, b: Option<ItemId>) -> bool {
    match (a, b) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(a), Some(b)) => a <= b,
    }
}

impl OrderedList<char> {
    /// Returns the visible document as a `String`.
    #[must_use]
    pub fn as_string(&self) -> String {
        self.to_vec().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::PeerId;

    fn id(ts: u64, peer: PeerId) -> ItemId {
        ItemId::new(ts, peer)
    }

    #[test]
    fn single_peer_sequential_inserts_produce_expected_order() {
        let peer = PeerId::generate();
        let mut list: OrderedList<char> = OrderedList::new();
        list.insert_at(0, id(1, peer), 'h');
        list.insert_at(1, id(2, peer), 'i');
        assert_eq!(list.as_string(), "hi");
    }

    #[test]
    fn delete_clears_value_and_keeps_tombstone() {
        let peer = PeerId::generate();
        let mut list: OrderedList<char> = OrderedList::new();
        list.insert_at(0, id(1, peer), 'a');
        let op = list.delete_at(0, id(2, peer)).unwrap();
        assert_eq!(list.as_string(), "");
        assert_eq!(list.total_len(), 1);
        assert!(list.is_tombstoned(op.delete_id));
    }

    #[test]
    fn delete_is_idempotent_keeps_earliest_tombstone() {
        let peer = PeerId::generate();
        let mut list: OrderedList<char> = OrderedList::new();
        list.insert_at(0, id(1, peer), 'a');
        let target = list.get(0).is_some();
        assert!(target);

        let first_id = id(1, peer);
        list.apply_delete(first_id, id(5, peer));
        list.apply_delete(first_id, id(3, peer));
        list.apply_delete(first_id, id(9, peer));

        // Earliest tombstone (3) should win.
        let idx = list.find_index(first_id).unwrap();
        assert_eq!(list.items[idx].delete_ts, Some(id(3, peer)));
    }

    #[test]
    fn concurrent_inserts_at_head_order_by_item_id_tie_break() {
        // Two peers concurrently insert at the head (reference_id = None).
        // The insertion with the *smaller* ItemId should end up first,
        // per the skip-while-smaller-and-same-reference rule: if
        // peerID(A) < peerID(B) and both mint logicalTS=1, A's character
        // sorts first.
        let low_peer = PeerId::from_bytes([1u8; 32]);
        let high_peer = PeerId::from_bytes([2u8; 32]);

        let mut list: OrderedList<char> = OrderedList::new();
        // A inserts "a" at position 0 with logicalTS=1.
        list.apply_insert(None, id(1, low_peer), 'a');
        // B concurrently inserts "b" at position 0 with logicalTS=1, unaware of A's op.
        list.apply_insert(None, id(1, high_peer), 'b');

        // low_peer < high_peer at equal logicalTS, so 'a' sorts first.
        assert_eq!(list.as_string(), "ab");
    }

    #[test]
    fn concurrent_inserts_converge_regardless_of_apply_order() {
        let low_peer = PeerId::from_bytes([1u8; 32]);
        let high_peer = PeerId::from_bytes([2u8; 32]);

        let mut list_a: OrderedList<char> = OrderedList::new();
        list_a.apply_insert(None, id(1, low_peer), 'a');
        list_a.apply_insert(None, id(1, high_peer), 'b');

        let mut list_b: OrderedList<char> = OrderedList::new();
        list_b.apply_insert(None, id(1, high_peer), 'b');
        list_b.apply_insert(None, id(1, low_peer), 'a');

        assert_eq!(list_a.as_string(), list_b.as_string());
    }

    #[test]
    fn tombstones_never_shrink_total_length() {
        let peer = PeerId::generate();
        let mut list: OrderedList<char> = OrderedList::new();
        list.insert_at(0, id(1, peer), 'a');
        list.insert_at(1, id(2, peer), 'b');
        let before = list.total_len();
        list.delete_at(0, id(3, peer));
        assert_eq!(list.total_len(), before);
    }

    #[test]
    fn insert_after_tombstoned_reference_still_places_correctly() {
        let peer = PeerId::generate();
        let mut list: OrderedList<char> = OrderedList::new();
        list.insert_at(0, id(1, peer), 'a');
        let op = list.delete_at(0, id(2, peer)).unwrap();
        // Insert "b" referencing the now-tombstoned "a".
        list.apply_insert(Some(op.delete_id), id(3, peer), 'b');
        assert_eq!(list.as_string(), "b");
        assert_eq!(list.total_len(), 2);
    }
}
