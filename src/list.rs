use crate::entry::{Arena, Lane, LearnedEntry};

/// Doubly linked recency list threaded through the arena. The front is the
/// least recently used entry.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct List {
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<u32> {
        self.head
    }

    pub fn push_back<P>(&mut self, arena: &mut Arena<LearnedEntry<P>>, slot: u32, lane: Lane) {
        let old_tail = self.tail;
        {
            let link = arena.at_mut(slot).link_mut(lane);
            link.prev = old_tail;
            link.next = None;
        }
        match old_tail {
            Some(tail) => arena.at_mut(tail).link_mut(lane).next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
    }

    pub fn remove<P>(&mut self, arena: &mut Arena<LearnedEntry<P>>, slot: u32, lane: Lane) {
        let link = *arena.at(slot).link(lane);
        match link.prev {
            Some(prev) => arena.at_mut(prev).link_mut(lane).next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => arena.at_mut(next).link_mut(lane).prev = link.prev,
            None => self.tail = link.prev,
        }
        *arena.at_mut(slot).link_mut(lane) = Default::default();
        self.len -= 1;
    }

    /// Moves `slot` to the most recently used end.
    pub fn touch<P>(&mut self, arena: &mut Arena<LearnedEntry<P>>, slot: u32, lane: Lane) {
        if self.tail == Some(slot) {
            return;
        }
        self.remove(arena, slot, lane);
        self.push_back(arena, slot, lane);
    }

    pub fn iter<'a, P>(
        &self,
        arena: &'a Arena<LearnedEntry<P>>,
        lane: Lane,
    ) -> impl Iterator<Item = u32> + 'a {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let slot = cursor?;
            cursor = arena.at(slot).link(lane).next;
            Some(slot)
        })
    }
}
