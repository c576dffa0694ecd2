//! Property-based tests for the skiplist, using `BTreeSet` as the model.

use std::collections::BTreeSet;
use std::ops::Bound;

use lessdb::engine::{NaturalOrder, SkipList};
use proptest::prelude::*;

fn keys() -> impl Strategy<Value = Vec<u16>> {
    prop::collection::vec(0u16..512, 0..300)
}

fn build(keys: &[u16], seed: u64) -> (SkipList<u16, NaturalOrder>, BTreeSet<u16>) {
    let mut list = SkipList::with_seed(NaturalOrder, seed);
    let mut model = BTreeSet::new();
    for &key in keys {
        list.insert(key);
        model.insert(key);
    }
    (list, model)
}

proptest! {
    /// Traversal yields the distinct keys in ascending order.
    #[test]
    fn traversal_matches_model(keys in keys(), seed in any::<u64>()) {
        let (list, model) = build(&keys, seed);
        let listed: Vec<u16> = list.iter().copied().collect();
        let expected: Vec<u16> = model.iter().copied().collect();
        prop_assert_eq!(listed, expected);
        prop_assert_eq!(list.len(), model.len());
    }

    /// Insert reports the element it placed or found.
    #[test]
    fn insert_returns_position_of_key(keys in keys(), extra in 0u16..512) {
        let (mut list, _) = build(&keys, 7);
        let cursor = list.insert(extra);
        prop_assert_eq!(cursor.key(), Some(&extra));
    }

    /// find, lower_bound and upper_bound agree with the model.
    #[test]
    fn bounds_match_model(
        keys in keys(),
        probes in prop::collection::vec(0u16..520, 1..32),
        seed in any::<u64>(),
    ) {
        let (list, model) = build(&keys, seed);
        for probe in probes {
            prop_assert_eq!(list.contains(&probe), model.contains(&probe));
            prop_assert_eq!(list.find(&probe).key().copied(), model.get(&probe).copied());
            prop_assert_eq!(
                list.lower_bound(&probe).key().copied(),
                model.range(probe..).next().copied()
            );
            prop_assert_eq!(
                list.upper_bound(&probe).key().copied(),
                model.range((Bound::Excluded(probe), Bound::Unbounded)).next().copied()
            );
        }
    }

    /// Iteration from a lower bound continues through the rest of the list.
    #[test]
    fn scan_from_lower_bound(keys in keys(), start in 0u16..520) {
        let (list, model) = build(&keys, 3);
        let scanned: Vec<u16> = list.lower_bound(&start).into_iter().copied().collect();
        let expected: Vec<u16> = model.range(start..).copied().collect();
        prop_assert_eq!(scanned, expected);
    }

    /// Heights stay within bounds whatever the seed.
    #[test]
    fn height_is_bounded(keys in keys(), seed in any::<u64>()) {
        let (list, _) = build(&keys, seed);
        prop_assert!(list.height() >= 1);
        prop_assert!(list.height() <= lessdb::engine::skiplist::MAX_HEIGHT);
    }
}
