//! Model-based tests: the skip list against a `BTreeMap`.

use std::collections::BTreeMap;

use proptest::prelude::*;
use skipwindow::Item;
use skipwindow::index::{Direction, SkipList};

// =============================================================================
// Test helpers
// =============================================================================

#[derive(Clone, Debug)]
enum Op {
    Insert(u64, u32),
    Remove(u64),
    Range(u64, bool, usize),
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..200u64, any::<u32>()).prop_map(|(id, payload)| Op::Insert(id, payload)),
        2 => (0..200u64).prop_map(Op::Remove),
        1 => (0..220u64, any::<bool>(), 0..30usize)
            .prop_map(|(id, forward, count)| Op::Range(id, forward, count)),
    ]
}

fn model_range(
    model: &BTreeMap<u64, u32>,
    start: u64,
    direction: Direction,
    count: usize,
) -> Vec<u64> {
    return match direction {
        Direction::Forward => model.range(start..).take(count).map(|(&id, _)| id).collect(),
        Direction::Backward => {
            // Exact match first, then strictly below.
            let exact = model.get_key_value(&start).map(|(&id, _)| id);
            exact
                .into_iter()
                .chain(model.range(..start).rev().map(|(&id, _)| id))
                .take(count)
                .collect()
        }
    };
}

fn ids(items: &[&Item<u32>]) -> Vec<u64> {
    return items.iter().map(|item| item.id).collect();
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every operation agrees with the model, and the list stays sorted.
    #[test]
    fn matches_btree_model(
        seed in any::<u64>(),
        ops in prop::collection::vec(arbitrary_op(), 1..300),
    ) {
        let mut list = SkipList::with_seed(seed);
        let mut model = BTreeMap::new();

        for op in &ops {
            match *op {
                Op::Insert(id, payload) => {
                    let old = list.insert(Item::new(id, payload)).map(|item| item.payload);
                    prop_assert_eq!(old, model.insert(id, payload));
                }
                Op::Remove(id) => {
                    let old = list.remove(id).map(|item| item.payload);
                    prop_assert_eq!(old, model.remove(&id));
                }
                Op::Range(start, forward, count) => {
                    let direction = if forward { Direction::Forward } else { Direction::Backward };
                    let got = ids(&list.range_from_id(start, direction, count));
                    prop_assert_eq!(got, model_range(&model, start, direction, count));
                }
            }
            prop_assert_eq!(list.len(), model.len());
        }

        let listed: Vec<(u64, u32)> = list.iter().map(|item| (item.id, item.payload)).collect();
        let expected: Vec<(u64, u32)> = model.iter().map(|(&id, &payload)| (id, payload)).collect();
        prop_assert_eq!(listed, expected);
        prop_assert_eq!(list.first().map(|item| item.id), model.keys().next().copied());
        prop_assert_eq!(list.last().map(|item| item.id), model.keys().next_back().copied());
    }

    /// Each level is a sorted subsequence of the level below it.
    #[test]
    fn levels_are_nested(
        seed in any::<u64>(),
        ids in prop::collection::btree_set(0..10_000u64, 0..500),
    ) {
        let mut list = SkipList::with_seed(seed);
        for &id in &ids {
            list.insert(id);
        }
        let mut below: Vec<u64> = list.nodes_at_level(0).into_iter().copied().collect();
        prop_assert_eq!(below.len(), ids.len());
        for level in 1..=list.level() {
            let current: Vec<u64> = list.nodes_at_level(level).into_iter().copied().collect();
            prop_assert!(current.windows(2).all(|pair| pair[0] < pair[1]));
            prop_assert!(current.iter().all(|id| below.binary_search(id).is_ok()));
            prop_assert!(current.len() <= below.len());
            below = current;
        }
        prop_assert!(list.nodes_at_level(list.level() + 1).is_empty());
    }

    /// Ranges are strictly ascending in walk order forward and strictly
    /// descending backward, never longer than asked.
    #[test]
    fn ranges_are_ordered(
        ids in prop::collection::btree_set(0..1_000u64, 1..200),
        start in 0..1_100u64,
        count in 0..50usize,
    ) {
        let mut list = SkipList::with_seed(3);
        for &id in &ids {
            list.insert(id);
        }
        let forward: Vec<u64> =
            list.range_from_id(start, Direction::Forward, count).into_iter().copied().collect();
        prop_assert!(forward.len() <= count);
        prop_assert!(forward.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert!(forward.iter().all(|&id| id >= start));

        let backward: Vec<u64> =
            list.range_from_id(start, Direction::Backward, count).into_iter().copied().collect();
        prop_assert!(backward.len() <= count);
        prop_assert!(backward.windows(2).all(|pair| pair[0] > pair[1]));
        prop_assert!(backward.iter().all(|&id| id <= start));
    }
}

// =============================================================================
// Fixed cases
// =============================================================================

#[test]
fn ranges_over_one_to_ten() {
    let mut list = SkipList::new();
    for id in 1..=10u64 {
        list.insert(id);
    }
    let forward: Vec<u64> =
        list.range_from_id(3, Direction::Forward, 5).into_iter().copied().collect();
    assert_eq!(forward, vec![3, 4, 5, 6, 7]);

    let backward: Vec<u64> =
        list.range_from_id(8, Direction::Backward, 3).into_iter().copied().collect();
    assert_eq!(backward, vec![8, 7, 6]);
}

#[test]
fn search_after_remove_is_missing() {
    let mut list = SkipList::new();
    for id in 0..100u64 {
        list.insert(Item::new(id, id as u32));
    }
    for id in (0..100).step_by(2) {
        assert!(list.remove(id).is_some());
    }
    assert_eq!(list.len(), 50);
    for id in 0..100 {
        assert_eq!(list.search(id).is_some(), id % 2 == 1, "id {}", id);
    }
}
