use hwaddr::HwAddr;

use crate::{MacKey, Timestamp};

/// Handle to a learned entry. Carries the generation of its slot, so a handle
/// kept past the entry's expiry never resolves to a newer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    slot: u32,
    generation: u32,
}

impl EntryId {
    #[inline]
    pub(crate) fn slot(&self) -> u32 {
        self.slot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Learned, but no port has been set yet. Invisible to lookups.
    Unbound,
    Bound,
    /// Removed from the table. Terminal.
    Expired,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Link {
    pub prev: Option<u32>,
    pub next: Option<u32>,
}

/// The two recency orders an entry sits in at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lane {
    Global,
    Port,
}

#[derive(Debug)]
pub struct LearnedEntry<P> {
    key: MacKey,
    pub(crate) expires_at: Timestamp,
    anti_flood_lock: Timestamp,
    pub(crate) port: Option<P>,

    lru: Link,
    port_lru: Link,
}

impl<P> LearnedEntry<P> {
    pub(crate) fn new(key: MacKey) -> Self {
        Self {
            key,
            expires_at: 0,
            anti_flood_lock: 0,
            port: None,
            lru: Link::default(),
            port_lru: Link::default(),
        }
    }

    pub fn key(&self) -> MacKey {
        self.key
    }

    pub fn mac(&self) -> HwAddr {
        self.key.mac
    }

    pub fn vlan(&self) -> u16 {
        self.key.vlan
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    pub fn port(&self) -> Option<&P> {
        self.port.as_ref()
    }

    pub fn state(&self) -> EntryState {
        match self.port {
            Some(_) => EntryState::Bound,
            None => EntryState::Unbound,
        }
    }

    // Carried for relearn suppression; nothing in the table reads it.
    pub fn anti_flood_lock(&self) -> Timestamp {
        self.anti_flood_lock
    }

    pub fn set_anti_flood_lock(&mut self, until: Timestamp) {
        self.anti_flood_lock = until;
    }

    #[inline]
    pub(crate) fn link(&self, lane: Lane) -> &Link {
        match lane {
            Lane::Global => &self.lru,
            Lane::Port => &self.port_lru,
        }
    }

    #[inline]
    pub(crate) fn link_mut(&mut self, lane: Lane) -> &mut Link {
        match lane {
            Lane::Global => &mut self.lru,
            Lane::Port => &mut self.port_lru,
        }
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage addressed by stable indices. Freed slots are reused; each reuse
/// bumps the slot generation.
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn insert(&mut self, value: T) -> EntryId {
        self.len += 1;
        match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.generation = entry.generation.wrapping_add(1);
                entry.value = Some(value);
                EntryId {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                EntryId {
                    slot,
                    generation: 0,
                }
            }
        }
    }

    pub fn remove(&mut self, id: EntryId) -> Option<T> {
        let entry = self.slots.get_mut(id.slot as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let value = entry.value.take()?;
        self.free.push(id.slot);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: EntryId) -> Option<&T> {
        self.slots
            .get(id.slot as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut T> {
        self.slots
            .get_mut(id.slot as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Handle for an occupied slot reached through a list link.
    pub fn id_of(&self, slot: u32) -> EntryId {
        EntryId {
            slot,
            generation: self.slots[slot as usize].generation,
        }
    }

    // Linked slots are always occupied; a vacant one means a list is corrupt.
    #[inline]
    pub fn at(&self, slot: u32) -> &T {
        match &self.slots[slot as usize].value {
            Some(value) => value,
            None => panic!("list links vacant slot {slot}"),
        }
    }

    #[inline]
    pub fn at_mut(&mut self, slot: u32) -> &mut T {
        match &mut self.slots[slot as usize].value {
            Some(value) => value,
            None => panic!("list links vacant slot {slot}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_handle() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        assert_eq!(arena.remove(a), Some("a"));
        let b = arena.insert("b");
        assert_eq!(a.slot(), b.slot());
        assert_ne!(a, b);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_entry_state() {
        let key = MacKey::new(HwAddr::from([0, 0, 0, 0, 0, 1]), 1);
        let mut entry: LearnedEntry<u32> = LearnedEntry::new(key);
        assert_eq!(entry.state(), EntryState::Unbound);
        entry.port = Some(4);
        assert_eq!(entry.state(), EntryState::Bound);
        entry.set_anti_flood_lock(30);
        assert_eq!(entry.anti_flood_lock(), 30);
        assert_eq!(entry.mac(), key.mac);
        assert_eq!(entry.vlan(), 1);
    }
}
