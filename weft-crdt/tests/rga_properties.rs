//! Property-based tests for the ordered-list CRDT.
//!
//! These check the algebraic guarantees that make concurrent editing
//! converge: insertion order independence, tombstone-only length
//! growth, and `ItemId`'s total order.

use proptest::prelude::*;
use weft_crdt::OrderedList;
use weft_types::{ItemId, PeerId};

fn peer_strategy() -> impl Strategy<Value = PeerId> {
    any::<[u8; 32]>().prop_map(PeerId::from_bytes)
}

fn char_strategy() -> impl Strategy<Value = char> {
    prop::char::range('a', 'z')
}

/// A sequence of concurrent inserts, all anchored at the head (`None`),
/// each from a distinct peer at `logical_ts = 1` — the maximally
/// concurrent case.
fn concurrent_head_inserts() -> impl Strategy<Value = Vec<(PeerId, char)>> {
    prop::collection::vec((peer_strategy(), char_strategy()), 1..8)
}

proptest! {
    /// Applying the same set of head-anchored concurrent inserts in any
    /// order converges to the same document.
    #[test]
    fn concurrent_head_inserts_converge_regardless_of_apply_order(
        ops in concurrent_head_inserts(),
    ) {
        // Dedup peer ids: two ops from the same peer at the same
        // logical_ts can't happen in practice (a peer's own clock is
        // strictly increasing), so skip fixtures that collide.
        let mut seen = std::collections::HashSet::new();
        let ops: Vec<_> = ops.into_iter().filter(|(p, _)| seen.insert(*p)).collect();
        prop_assume!(!ops.is_empty());

        let forward: OrderedList<char> = {
            let mut list = OrderedList::new();
            for (peer, ch) in &ops {
                list.apply_insert(None, ItemId::new(1, *peer), *ch);
            }
            list
        };

        let mut reversed_ops = ops.clone();
        reversed_ops.reverse();
        let backward: OrderedList<char> = {
            let mut list = OrderedList::new();
            for (peer, ch) in &reversed_ops {
                list.apply_insert(None, ItemId::new(1, *peer), *ch);
            }
            list
        };

        prop_assert_eq!(forward.as_string(), backward.as_string());

        // The converged order is exactly ascending ItemId order: the
        // lower peerID sorts first among ties.
        let mut expected: Vec<_> = ops.clone();
        expected.sort_by_key(|(peer, _)| *peer);
        let expected_string: String = expected.into_iter().map(|(_, ch)| ch).collect();
        prop_assert_eq!(forward.as_string(), expected_string);
    }

    /// Deleting (tombstoning) any visible item never shrinks the
    /// list's total length, only its visible length.
    #[test]
    fn delete_never_shrinks_total_length(
        chars in prop::collection::vec(char_strategy(), 1..12),
        delete_at in 0usize..12,
    ) {
        let peer = PeerId::generate();
        let mut list: OrderedList<char> = OrderedList::new();
        for (i, ch) in chars.iter().enumerate() {
            let id = ItemId::new((i + 1) as u64, peer);
            list.insert_at(i, id, *ch);
        }
        let before_total = list.total_len();
        let before_visible = list.len();

        let delete_ts = ItemId::new((chars.len() + 1) as u64, peer);
        let deleted = list.delete_at(delete_at.min(chars.len().saturating_sub(1)), delete_ts);

        prop_assert_eq!(list.total_len(), before_total);
        if deleted.is_some() && !chars.is_empty() {
            prop_assert_eq!(list.len(), before_visible - 1);
        }
    }

    /// Re-applying the same deletion, or applying a second deletion to
    /// an already-tombstoned item, always keeps the earliest tombstone.
    #[test]
    fn double_delete_keeps_earliest_tombstone(
        first_ts in 1u64..1000,
        second_ts in 1u64..1000,
    ) {
        let peer = PeerId::generate();
        let mut list: OrderedList<char> = OrderedList::new();
        let id = ItemId::new(1, peer);
        list.apply_insert(None, id, 'x');

        list.apply_delete(id, ItemId::new(first_ts, peer));
        list.apply_delete(id, ItemId::new(second_ts, peer));

        prop_assert!(list.is_tombstoned(id));
        prop_assert_eq!(list.total_len(), 1);
        prop_assert_eq!(list.len(), 0);
    }

    /// For any two distinct `ItemId`s, exactly one of `a < b`, `a > b`
    /// holds (total order).
    #[test]
    fn item_id_total_order(
        ts_a in 0u64..1000, peer_a in peer_strategy(),
        ts_b in 0u64..1000, peer_b in peer_strategy(),
    ) {
        let a = ItemId::new(ts_a, peer_a);
        let b = ItemId::new(ts_b, peer_b);
        if a == b {
            prop_assert!(!(a < b) && !(a > b));
        } else {
            prop_assert!((a < b) ^ (a > b));
        }
    }
}
