use std::collections::HashMap;
use std::hash::Hash;

use crate::entry::{Arena, Lane, LearnedEntry};
use crate::list::List;

/// Per-port bookkeeping: how many entries point at the port and their
/// recency order. Exists exactly while at least one entry is bound.
#[derive(Debug)]
pub struct PortUsage<P> {
    port: P,
    // Set from `PortTracker::stamp` whenever `lru.len()` changes.
    stamp: u64,
    lru: List,
}

impl<P> PortUsage<P> {
    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn count(&self) -> usize {
        self.lru.len()
    }

    pub(crate) fn oldest(&self) -> Option<u32> {
        self.lru.front()
    }

    /// Heap order: more entries first, then the port whose count has been
    /// stable the longest.
    #[inline]
    fn outranks(&self, other: &Self) -> bool {
        self.count() > other.count() || (self.count() == other.count() && self.stamp < other.stamp)
    }
}

/// Max-heap of ports by entry count with a position index so that count
/// changes re-order in O(log n).
#[derive(Debug)]
pub(crate) struct PortTracker<P> {
    heap: Vec<PortUsage<P>>,
    position: HashMap<P, usize>,
    stamp: u64,
}

impl<P> Default for PortTracker<P> {
    fn default() -> Self {
        Self {
            heap: Vec::new(),
            position: HashMap::new(),
            stamp: 0,
        }
    }
}

impl<P: Clone + Eq + Hash> PortTracker<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ports with at least one bound entry.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn count(&self, port: &P) -> usize {
        self.position
            .get(port)
            .map(|pos| self.heap[*pos].count())
            .unwrap_or(0)
    }

    pub fn busiest(&self) -> Option<&PortUsage<P>> {
        self.heap.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortUsage<P>> {
        self.heap.iter()
    }

    fn next_stamp(&mut self) -> u64 {
        self.stamp += 1;
        self.stamp
    }

    /// Binds the entry at `slot` to `port` as its most recent entry.
    pub fn attach<E>(&mut self, arena: &mut Arena<LearnedEntry<E>>, slot: u32, port: P) {
        let stamp = self.next_stamp();
        let pos = match self.position.get(&port) {
            Some(pos) => *pos,
            None => {
                let pos = self.heap.len();
                self.position.insert(port.clone(), pos);
                self.heap.push(PortUsage {
                    port,
                    stamp,
                    lru: List::new(),
                });
                pos
            }
        };
        let usage = &mut self.heap[pos];
        usage.lru.push_back(arena, slot, Lane::Port);
        usage.stamp = stamp;
        self.sift_up(pos);
    }

    /// Unbinds the entry at `slot` from `port`, dropping the usage record
    /// when it was the last one.
    pub fn detach<E>(&mut self, arena: &mut Arena<LearnedEntry<E>>, slot: u32, port: &P) {
        let Some(pos) = self.position.get(port).copied() else {
            return;
        };
        let stamp = self.next_stamp();
        let usage = &mut self.heap[pos];
        usage.lru.remove(arena, slot, Lane::Port);
        usage.stamp = stamp;
        if usage.lru.is_empty() {
            self.remove_at(pos);
        } else {
            self.sift_down(pos);
        }
    }

    /// Marks the entry at `slot` as the most recent one on `port`.
    pub fn touch<E>(&mut self, arena: &mut Arena<LearnedEntry<E>>, slot: u32, port: &P) {
        if let Some(pos) = self.position.get(port) {
            self.heap[*pos].lru.touch(arena, slot, Lane::Port);
        }
    }

    fn remove_at(&mut self, pos: usize) {
        let last = self.heap.len() - 1;
        self.swap(pos, last);
        if let Some(usage) = self.heap.pop() {
            self.position.remove(&usage.port);
        }
        if pos < self.heap.len() {
            self.sift_up(pos);
            self.sift_down(pos);
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        for pos in [a, b] {
            if let Some(slot) = self.position.get_mut(&self.heap[pos].port) {
                *slot = pos;
            }
        }
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.heap[pos].outranks(&self.heap[parent]) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut top = pos;
            if left < self.heap.len() && self.heap[left].outranks(&self.heap[top]) {
                top = left;
            }
            if right < self.heap.len() && self.heap[right].outranks(&self.heap[top]) {
                top = right;
            }
            if top == pos {
                break;
            }
            self.swap(pos, top);
            pos = top;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MacKey;
    use hwaddr::HwAddr;

    fn arena_with(n: u8) -> (Arena<LearnedEntry<u32>>, Vec<u32>) {
        let mut arena = Arena::new();
        let slots = (0..n)
            .map(|i| {
                let key = MacKey::new(HwAddr::from([0, 0, 0, 0, 1, i]), 1);
                arena.insert(LearnedEntry::new(key)).slot()
            })
            .collect();
        (arena, slots)
    }

    fn check_heap(tracker: &PortTracker<u32>) {
        for (pos, usage) in tracker.heap.iter().enumerate() {
            assert_eq!(tracker.position[&usage.port], pos);
            if pos > 0 {
                assert!(!usage.outranks(&tracker.heap[(pos - 1) / 2]));
            }
        }
        assert_eq!(tracker.position.len(), tracker.heap.len());
    }

    #[test]
    fn test_busiest_port() {
        let (mut arena, slots) = arena_with(6);
        let mut tracker = PortTracker::new();
        tracker.attach(&mut arena, slots[0], 1);
        tracker.attach(&mut arena, slots[1], 2);
        tracker.attach(&mut arena, slots[2], 2);
        tracker.attach(&mut arena, slots[3], 3);
        tracker.attach(&mut arena, slots[4], 3);
        tracker.attach(&mut arena, slots[5], 3);
        check_heap(&tracker);

        let busiest = tracker.busiest().unwrap();
        assert_eq!(*busiest.port(), 3);
        assert_eq!(busiest.count(), 3);
        assert_eq!(busiest.oldest(), Some(slots[3]));

        tracker.detach(&mut arena, slots[3], &3);
        tracker.detach(&mut arena, slots[4], &3);
        check_heap(&tracker);
        assert_eq!(*tracker.busiest().unwrap().port(), 2);
        assert_eq!(tracker.count(&3), 1);
    }

    #[test]
    fn test_usage_removed_at_zero() {
        let (mut arena, slots) = arena_with(2);
        let mut tracker = PortTracker::new();
        tracker.attach(&mut arena, slots[0], 7);
        tracker.attach(&mut arena, slots[1], 8);
        assert_eq!(tracker.len(), 2);

        tracker.detach(&mut arena, slots[0], &7);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.count(&7), 0);
        check_heap(&tracker);

        tracker.detach(&mut arena, slots[1], &8);
        assert_eq!(tracker.len(), 0);
        assert!(tracker.busiest().is_none());
    }

    #[test]
    fn test_tie_goes_to_least_recently_changed() {
        let (mut arena, slots) = arena_with(4);
        let mut tracker = PortTracker::new();
        tracker.attach(&mut arena, slots[0], 1);
        tracker.attach(&mut arena, slots[1], 1);
        tracker.attach(&mut arena, slots[2], 2);
        tracker.attach(&mut arena, slots[3], 2);
        // Both ports hold two entries; port 1 reached two first.
        assert_eq!(*tracker.busiest().unwrap().port(), 1);
        check_heap(&tracker);
    }

    #[test]
    fn test_touch_reorders_port_lane() {
        let (mut arena, slots) = arena_with(3);
        let mut tracker = PortTracker::new();
        for slot in &slots {
            tracker.attach(&mut arena, *slot, 5);
        }
        tracker.touch(&mut arena, slots[0], &5);
        assert_eq!(tracker.busiest().unwrap().oldest(), Some(slots[1]));
    }

    #[test]
    fn test_many_ports_heap_invariant() {
        let (mut arena, slots) = arena_with(60);
        let mut tracker = PortTracker::new();
        for (i, slot) in slots.iter().enumerate() {
            tracker.attach(&mut arena, *slot, (i % 7) as u32);
            check_heap(&tracker);
        }
        for (i, slot) in slots.iter().enumerate().filter(|(i, _)| i % 3 == 0) {
            tracker.detach(&mut arena, *slot, &((i % 7) as u32));
            check_heap(&tracker);
        }
        let max = tracker.iter().map(|u| u.count()).max().unwrap();
        assert_eq!(tracker.busiest().unwrap().count(), max);
    }
}
