//! Bidirectional Skip List
//!
//! A classic probabilistic skip list keyed by `Keyed::id`, with one item per
//! node and both forward and backward links at every level a node occupies.
//! The backward links make stepping in either direction O(1), which is what
//! range queries in both directions need.
//!
//! # Operations
//!
//! - `search(id)`: O(log n) expected
//! - `insert(item)`: O(log n) expected, upserts on an existing id
//! - `remove(id)`: O(log n) expected
//! - `range_from_id(id, direction, count)`: O(log n + count)
//! - `first()` / `last()`: O(1)
//! - `nodes_at_level(level)`: O(n / 2^level) expected
//!
//! # Structure
//!
//! ```text
//! Level 2: HEAD ------------------> 7 ----------------------> TAIL
//! Level 1: HEAD ------> 3 --------> 7 ---------> 12 --------> TAIL
//! Level 0: HEAD -> 1 -> 3 -> 4 -> 7 -> 9 -> 12 -> 15 -> TAIL
//! ```
//!
//! Every arrow has a matching backward link. HEAD and TAIL are sentinels that
//! span all `MAX_LEVEL` levels, so no link is ever null.

use rand_core::OsRng;
use rand_core::RngCore;
use smallvec::SmallVec;
use smallvec::smallvec;

use super::Direction;
use crate::Keyed;

/// Maximum number of levels. 16 levels comfortably index ~65k items per
/// top-level span, far more than a scroll window ever needs.
pub const MAX_LEVEL: usize = 16;

/// Node index type. u32 saves space vs usize on 64-bit.
type Idx = u32;

/// Index of the head sentinel in the arena.
const HEAD: Idx = 0;

/// Index of the tail sentinel in the arena.
const TAIL: Idx = 1;

/// Per-level links. Most nodes have one or two levels, so keep a few inline.
type Links = SmallVec<[Idx; 4]>;

struct Node<T> {
    /// `None` only for the sentinels and for slots on the free list.
    value: Option<T>,
    forward: Links,
    backward: Links,
}

impl<T> Node<T> {
    fn new(value: Option<T>, height: usize) -> Node<T> {
        return Node {
            value,
            forward: smallvec![TAIL; height],
            backward: smallvec![HEAD; height],
        };
    }

    fn height(&self) -> usize {
        return self.forward.len();
    }
}

/// A skip list of items ordered by their unique id.
pub struct SkipList<T> {
    /// Arena of nodes. Slots 0 and 1 are the head and tail sentinels.
    nodes: Vec<Node<T>>,
    /// Removed slots available for reuse.
    free_list: Vec<Idx>,
    /// Highest level currently in use (0-based).
    level: usize,
    /// Number of items (not counting sentinels).
    len: usize,
    /// Xorshift state for level generation.
    rand_state: u64,
}

impl<T> SkipList<T> {
    /// Create an empty list seeded from the OS random source.
    pub fn new() -> SkipList<T> {
        return SkipList::with_seed(OsRng.next_u64());
    }

    /// Create an empty list with a fixed seed, for reproducible layouts.
    pub fn with_seed(seed: u64) -> SkipList<T> {
        return SkipList {
            nodes: vec![Node::new(None, MAX_LEVEL), Node::new(None, MAX_LEVEL)],
            free_list: Vec::new(),
            level: 0,
            len: 0,
            // Xorshift gets stuck on zero.
            rand_state: seed | 1,
        };
    }

    pub fn len(&self) -> usize {
        return self.len;
    }

    pub fn is_empty(&self) -> bool {
        return self.len == 0;
    }

    /// The highest level currently holding at least one node.
    pub fn level(&self) -> usize {
        return self.level;
    }

    /// Remove every item, keeping the arena allocation.
    pub fn clear(&mut self) {
        self.nodes.truncate(2);
        for sentinel in [HEAD, TAIL] {
            let node = self.node_mut(sentinel);
            node.forward.iter_mut().for_each(|link| *link = TAIL);
            node.backward.iter_mut().for_each(|link| *link = HEAD);
        }
        self.free_list.clear();
        self.level = 0;
        self.len = 0;
    }

    /// Iterate over all items in ascending id order.
    pub fn iter(&self) -> Iter<'_, T> {
        return Iter {
            list: self,
            current: self.node(HEAD).forward[0],
        };
    }

    /// The item with the smallest id.
    pub fn first(&self) -> Option<&T> {
        return self.value_at(self.node(HEAD).forward[0]);
    }

    /// The item with the largest id.
    pub fn last(&self) -> Option<&T> {
        return self.value_at(self.node(TAIL).backward[0]);
    }

    /// All items linked at `level`, in ascending order. Level 0 holds every
    /// item, level 1 roughly half of them, and so on.
    pub fn nodes_at_level(&self, level: usize) -> Vec<&T> {
        let mut out = Vec::new();
        if level > self.level {
            return out;
        }
        let mut idx = self.node(HEAD).forward[level];
        while idx != TAIL {
            let node = self.node(idx);
            if let Some(value) = node.value.as_ref() {
                out.push(value);
            }
            idx = node.forward[level];
        }
        return out;
    }

    // --- Node access helpers ---

    fn node(&self, idx: Idx) -> &Node<T> {
        return &self.nodes[idx as usize];
    }

    fn node_mut(&mut self, idx: Idx) -> &mut Node<T> {
        return &mut self.nodes[idx as usize];
    }

    fn value_at(&self, idx: Idx) -> Option<&T> {
        if idx == HEAD || idx == TAIL {
            return None;
        }
        return self.node(idx).value.as_ref();
    }

    fn alloc_node(&mut self, item: T, height: usize) -> Idx {
        if let Some(idx) = self.free_list.pop() {
            *self.node_mut(idx) = Node::new(Some(item), height);
            return idx;
        }
        let idx = self.nodes.len() as Idx;
        self.nodes.push(Node::new(Some(item), height));
        return idx;
    }

    /// Draw a level from a geometric distribution with p = 1/2: each
    /// trailing zero bit of a uniform word is one promotion.
    fn random_level(&mut self) -> usize {
        self.rand_state ^= self.rand_state << 13;
        self.rand_state ^= self.rand_state >> 7;
        self.rand_state ^= self.rand_state << 17;
        return (self.rand_state.trailing_zeros() as usize).min(MAX_LEVEL - 1);
    }
}

impl<T: Keyed> SkipList<T> {
    fn key(&self, idx: Idx) -> u64 {
        return match self.node(idx).value.as_ref() {
            Some(value) => value.id(),
            None => panic!("node {} has no key (sentinel or freed)", idx),
        };
    }

    /// Walk from the head down to level 0, stopping at each level on the
    /// last node whose id is below `id`. Returns the per-level predecessors
    /// and the level-0 predecessor.
    fn descend(&self, id: u64) -> ([Idx; MAX_LEVEL], Idx) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut current = HEAD;
        for level in (0..=self.level).rev() {
            loop {
                let next = self.node(current).forward[level];
                if next == TAIL || self.key(next) >= id {
                    break;
                }
                current = next;
            }
            update[level] = current;
        }
        return (update, current);
    }

    fn find(&self, id: u64) -> Option<Idx> {
        let (_, pred) = self.descend(id);
        let candidate = self.node(pred).forward[0];
        if candidate != TAIL && self.key(candidate) == id {
            return Some(candidate);
        }
        return None;
    }

    /// Look up an item by id.
    pub fn search(&self, id: u64) -> Option<&T> {
        let idx = self.find(id)?;
        return self.node(idx).value.as_ref();
    }

    /// Mutable access to an item. Changing its id breaks the ordering.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        let idx = self.find(id)?;
        return self.node_mut(idx).value.as_mut();
    }

    pub fn contains(&self, id: u64) -> bool {
        return self.find(id).is_some();
    }

    /// Insert an item. If an item with the same id is already present, its
    /// value is replaced in place and the old value returned.
    pub fn insert(&mut self, item: T) -> Option<T> {
        let id = item.id();
        let (mut update, pred) = self.descend(id);

        let candidate = self.node(pred).forward[0];
        if candidate != TAIL && self.key(candidate) == id {
            return self.node_mut(candidate).value.replace(item);
        }

        let new_level = self.random_level();
        if new_level > self.level {
            for level in (self.level + 1)..=new_level {
                update[level] = HEAD;
            }
            self.level = new_level;
        }

        let new_idx = self.alloc_node(item, new_level + 1);
        for level in 0..=new_level {
            let pred = update[level];
            let next = self.node(pred).forward[level];

            let node = self.node_mut(new_idx);
            node.forward[level] = next;
            node.backward[level] = pred;

            self.node_mut(pred).forward[level] = new_idx;
            self.node_mut(next).backward[level] = new_idx;
        }

        self.len += 1;
        self.check_links(new_idx);
        return None;
    }

    /// Remove an item by id, returning it if it was present.
    pub fn remove(&mut self, id: u64) -> Option<T> {
        let (update, pred) = self.descend(id);

        let target = self.node(pred).forward[0];
        if target == TAIL || self.key(target) != id {
            return None;
        }

        for level in 0..self.node(target).height() {
            let pred = update[level];
            debug_assert_eq!(
                self.node(pred).forward[level],
                target,
                "INVARIANT VIOLATED: predecessor at level {} does not link to node {}",
                level,
                target
            );
            let next = self.node(target).forward[level];
            self.node_mut(pred).forward[level] = next;
            self.node_mut(next).backward[level] = pred;
        }

        while self.level > 0 && self.node(HEAD).forward[self.level] == TAIL {
            self.level -= 1;
        }

        let node = self.node_mut(target);
        let value = node.value.take();
        node.forward.clear();
        node.backward.clear();
        self.free_list.push(target);
        self.len -= 1;

        self.check_links(update[0]);
        return value;
    }

    /// Collect up to `count` items starting at `start_id` and walking in
    /// `direction`.
    ///
    /// When `start_id` is absent, a forward walk starts at the first item
    /// above it and a backward walk at the last item below it. Items come
    /// back in walk order, so a backward range is descending.
    pub fn range_from_id(&self, start_id: u64, direction: Direction, count: usize) -> Vec<&T> {
        if self.len == 0 || count == 0 {
            return Vec::new();
        }

        let (_, pred) = self.descend(start_id);
        let next = self.node(pred).forward[0];
        let start = if next != TAIL && self.key(next) == start_id {
            next
        } else {
            match direction {
                Direction::Forward => next,
                Direction::Backward => pred,
            }
        };

        let mut out = Vec::with_capacity(count.min(self.len));
        let mut idx = start;
        while idx != HEAD && idx != TAIL && out.len() < count {
            let node = self.node(idx);
            if let Some(value) = node.value.as_ref() {
                out.push(value);
            }
            idx = match direction {
                Direction::Forward => node.forward[0],
                Direction::Backward => node.backward[0],
            };
        }
        return out;
    }

    // --- Invariant checking ---

    /// Check that the node's neighbours at every level are ordered around it
    /// and link back to it.
    #[cfg(debug_assertions)]
    fn check_links(&self, idx: Idx) {
        let node = self.node(idx);
        for level in 0..node.height() {
            let next = node.forward[level];
            let prev = node.backward[level];
            if idx != TAIL {
                assert_eq!(
                    self.node(next).backward[level],
                    idx,
                    "INVARIANT VIOLATED: backward link at level {} does not mirror forward link",
                    level
                );
            }
            if idx != HEAD {
                assert_eq!(
                    self.node(prev).forward[level],
                    idx,
                    "INVARIANT VIOLATED: forward link at level {} does not mirror backward link",
                    level
                );
            }
            if idx != HEAD && next != TAIL {
                assert!(
                    self.key(idx) < self.key(next),
                    "INVARIANT VIOLATED: ids out of order at level {}",
                    level
                );
            }
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn check_links(&self, _idx: Idx) {}

    /// Full structural check: ascending ids, mirrored links at every level,
    /// and a level-0 walk that agrees with `len`.
    #[cfg(test)]
    fn check_invariants(&self) {
        for level in 0..MAX_LEVEL {
            let mut count = 0usize;
            let mut prev = HEAD;
            let mut idx = self.node(HEAD).forward[level];
            while idx != TAIL {
                assert_eq!(self.node(idx).backward[level], prev);
                if prev != HEAD {
                    assert!(self.key(prev) < self.key(idx));
                }
                prev = idx;
                idx = self.node(idx).forward[level];
                count += 1;
            }
            assert_eq!(self.node(TAIL).backward[level], prev);
            if level == 0 {
                assert_eq!(count, self.len, "level 0 walk disagrees with len");
            }
            if level > self.level {
                assert_eq!(
                    count, 0,
                    "level {} above list level {} is populated",
                    level, self.level
                );
            }
        }
    }
}

impl<T> Default for SkipList<T> {
    fn default() -> Self {
        return SkipList::new();
    }
}

/// Ascending iterator over a [`SkipList`].
pub struct Iter<'a, T> {
    list: &'a SkipList<T>,
    current: Idx,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == TAIL {
            return None;
        }
        let node = self.list.node(self.current);
        self.current = node.forward[0];
        return node.value.as_ref();
    }
}
