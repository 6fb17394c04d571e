//! Fixed-size circular doubly linked list.
//!
//! Slots live in an arena and link to each other by index. The ring never
//! grows or shrinks while in use: values are overwritten in place, and only
//! [`Ring::reset`] rebuilds the links.

/// Slot index type.
pub type Slot = u32;

struct RingNode<T> {
    value: Option<T>,
    next: Slot,
    prev: Slot,
}

pub struct Ring<T> {
    nodes: Vec<RingNode<T>>,
}

impl<T> Ring<T> {
    /// A ring of `size` empty slots (at least one, the head).
    pub fn new(size: usize) -> Ring<T> {
        let mut ring = Ring { nodes: Vec::new() };
        ring.reset(size);
        return ring;
    }

    /// Drop every value and relink `size` empty slots into a cycle.
    pub fn reset(&mut self, size: usize) {
        let size = size.max(1);
        self.nodes.clear();
        self.nodes.extend((0..size).map(|i| RingNode {
            value: None,
            next: ((i + 1) % size) as Slot,
            prev: ((i + size - 1) % size) as Slot,
        }));
    }

    pub fn len(&self) -> usize {
        return self.nodes.len();
    }

    pub fn head(&self) -> Slot {
        return 0;
    }

    pub fn next(&self, slot: Slot) -> Slot {
        return self.nodes[slot as usize].next;
    }

    pub fn prev(&self, slot: Slot) -> Slot {
        return self.nodes[slot as usize].prev;
    }

    /// Step `steps` slots forward. Whole laps are skipped.
    pub fn forward(&self, mut slot: Slot, steps: usize) -> Slot {
        for _ in 0..steps % self.len() {
            slot = self.next(slot);
        }
        return slot;
    }

    /// Step `steps` slots backward. Whole laps are skipped.
    pub fn backward(&self, mut slot: Slot, steps: usize) -> Slot {
        for _ in 0..steps % self.len() {
            slot = self.prev(slot);
        }
        return slot;
    }

    /// Forward steps from `from` to `to`.
    pub fn distance(&self, from: Slot, to: Slot) -> usize {
        let mut slot = from;
        let mut steps = 0;
        while slot != to {
            slot = self.next(slot);
            steps += 1;
            debug_assert!(steps < self.len(), "slot {} not on the ring", to);
        }
        return steps;
    }

    pub fn get(&self, slot: Slot) -> Option<&T> {
        return self.nodes[slot as usize].value.as_ref();
    }

    /// Store a value in a slot, returning what was there.
    pub fn set(&mut self, slot: Slot, value: Option<T>) -> Option<T> {
        return std::mem::replace(&mut self.nodes[slot as usize].value, value);
    }

    /// Values of up to `count` consecutive slots starting at `slot`, without
    /// wrapping past the start.
    pub fn values(&self, slot: Slot, count: usize) -> Values<'_, T> {
        return Values {
            ring: self,
            slot,
            remaining: count.min(self.len()),
        };
    }

    /// Write values into consecutive slots starting at `slot`, stopping
    /// before wrapping. Returns how many slots were written.
    pub fn set_values(&mut self, slot: Slot, values: impl IntoIterator<Item = Option<T>>) -> usize {
        let mut current = slot;
        let mut written = 0;
        for value in values.into_iter().take(self.len()) {
            self.set(current, value);
            current = self.next(current);
            written += 1;
        }
        return written;
    }

    /// First slot at or after `slot` (checking at most `max` slots) whose
    /// value satisfies `pred`.
    pub fn find(&self, slot: Slot, max: usize, mut pred: impl FnMut(&T) -> bool) -> Option<Slot> {
        let mut current = slot;
        for _ in 0..max.min(self.len()) {
            if self.get(current).is_some_and(&mut pred) {
                return Some(current);
            }
            current = self.next(current);
        }
        return None;
    }
}

pub struct Values<'a, T> {
    ring: &'a Ring<T>,
    slot: Slot,
    remaining: usize,
}

impl<'a, T> Iterator for Values<'a, T> {
    type Item = Option<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let value = self.ring.get(self.slot);
        self.slot = self.ring.next(self.slot);
        return Some(value);
    }
}
