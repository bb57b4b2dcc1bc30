use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use hwaddr::HwAddr;
use log::{debug, info, trace, warn};

use crate::entry::{Arena, EntryId, EntryState, Lane, LearnedEntry};
use crate::eviction::select_victim;
use crate::list::List;
use crate::mac::{is_multicast, MacHashState, MacKey};
use crate::port_tracker::{PortTracker, PortUsage};
use crate::{Clock, MonotonicClock, Timestamp, VlanBitmap};

pub const MIN_IDLE_TIME: u32 = 15;
pub const MAX_IDLE_TIME: u32 = 3600;
pub const DEFAULT_IDLE_TIME: u32 = 300;

pub const MIN_MAX_ENTRIES: usize = 10;
pub const MAX_MAX_ENTRIES: usize = 1_000_000;
pub const DEFAULT_MAX_ENTRIES: usize = 8192;

/// Anything the table can bind an address to. The table only compares and
/// hashes ports; it never looks inside them.
pub trait PortHandle: Clone + Eq + Hash {}

impl<T: Clone + Eq + Hash> PortHandle for T {}

/// Receives the table's request for its next maintenance pass.
pub trait Scheduler {
    fn wake_immediately(&mut self);
    /// Wake no later than `deadline`.
    fn wake_at(&mut self, deadline: Timestamp);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearningStats {
    pub learned: u64,
    pub expired: u64,
    pub evicted: u64,
    pub moved: u64,
}

/// MAC learning table: maps `(MAC, VLAN)` to the port the address was last
/// seen on. Entries age out after `idle_time` seconds without traffic, and
/// when the table is full the busiest port gives up its oldest entry.
///
/// Methods that change the table take `&mut self`; share the table through
/// [`crate::MacLearning`] to get read/write guarded access.
pub struct AddressTable<P: PortHandle> {
    entries: Arena<LearnedEntry<P>>,
    index: HashMap<MacKey, EntryId, MacHashState>,
    lru: List,
    ports: PortTracker<P>,

    idle_time: u32,
    max_entries: usize,
    flooded_vlans: VlanBitmap,
    needs_revalidation: bool,

    clock: Arc<dyn Clock>,
    stats: LearningStats,
}

fn clamp_idle_time(idle_time: u32) -> u32 {
    idle_time.clamp(MIN_IDLE_TIME, MAX_IDLE_TIME)
}

/// `false` when there is no table at all, otherwise [`AddressTable::may_learn`].
pub fn may_learn<P: PortHandle>(table: Option<&AddressTable<P>>, mac: HwAddr, vlan: u16) -> bool {
    table.is_some_and(|table| table.may_learn(mac, vlan))
}

impl<P: PortHandle> AddressTable<P> {
    pub fn new(idle_time: u32) -> Self {
        Self::with_clock(idle_time, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(idle_time: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arena::new(),
            index: HashMap::with_hasher(MacHashState::new(rand::random())),
            lru: List::new(),
            ports: PortTracker::new(),
            idle_time: clamp_idle_time(idle_time),
            max_entries: DEFAULT_MAX_ENTRIES,
            flooded_vlans: VlanBitmap::new(),
            needs_revalidation: false,
            clock,
            stats: LearningStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    pub fn idle_time(&self) -> u32 {
        self.idle_time
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn flooded_vlans(&self) -> &VlanBitmap {
        &self.flooded_vlans
    }

    pub fn needs_revalidation(&self) -> bool {
        self.needs_revalidation
    }

    pub fn salt(&self) -> u32 {
        self.index.hasher().salt()
    }

    pub fn stats(&self) -> LearningStats {
        self.stats
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Replaces the flooded VLAN set. Returns whether it changed; a change
    /// means cached forwarding decisions must be revisited by the caller.
    pub fn set_flooded_vlans(&mut self, vlans: VlanBitmap) -> bool {
        if self.flooded_vlans == vlans {
            return false;
        }
        info!("flooded vlans set to {:?}", vlans);
        self.flooded_vlans = vlans;
        true
    }

    /// Entries already learned keep the same remaining lifetime relative to
    /// the new idle time.
    pub fn set_idle_time(&mut self, idle_time: u32) {
        let idle_time = clamp_idle_time(idle_time);
        if idle_time == self.idle_time {
            return;
        }
        let delta = idle_time as i64 - self.idle_time as i64;
        let mut cursor = self.lru.front();
        while let Some(slot) = cursor {
            let entry = self.entries.at_mut(slot);
            entry.expires_at = entry.expires_at.saturating_add_signed(delta);
            cursor = entry.link(Lane::Global).next;
        }
        info!("idle time {} -> {}", self.idle_time, idle_time);
        self.idle_time = idle_time;
    }

    /// Takes effect the next time `insert` or `run` needs room.
    pub fn set_max_entries(&mut self, max_entries: usize) {
        let max_entries = max_entries.clamp(MIN_MAX_ENTRIES, MAX_MAX_ENTRIES);
        if max_entries != self.max_entries {
            info!("max entries {} -> {}", self.max_entries, max_entries);
        }
        self.max_entries = max_entries;
    }

    #[inline]
    fn is_learning_vlan(&self, vlan: u16) -> bool {
        !self.flooded_vlans.contains(vlan)
    }

    /// Whether a frame from `mac` on `vlan` may be learned. Check this before
    /// [`AddressTable::insert`].
    pub fn may_learn(&self, mac: HwAddr, vlan: u16) -> bool {
        self.is_learning_vlan(vlan) && !is_multicast(&mac)
    }

    /// Learns or refreshes `(mac, vlan)` and returns its handle. A new entry
    /// starts unbound; bind it with [`AddressTable::set_port`].
    pub fn insert(&mut self, mac: HwAddr, vlan: u16) -> EntryId {
        let key = MacKey::new(mac, vlan);
        let id = match self.index.get(&key).copied() {
            Some(id) => {
                self.lru.remove(&mut self.entries, id.slot(), Lane::Global);
                id
            }
            None => {
                if self.entries.len() >= self.max_entries {
                    self.evict_one();
                }
                let id = self.entries.insert(LearnedEntry::new(key));
                self.index.insert(key, id);
                self.stats.learned += 1;
                trace!("learned {}", key);
                id
            }
        };

        let slot = id.slot();
        self.lru.push_back(&mut self.entries, slot, Lane::Global);
        if let Some(port) = self.entries.at(slot).port.clone() {
            self.ports.touch(&mut self.entries, slot, &port);
        }
        self.entries.at_mut(slot).expires_at = self.clock.now() + self.idle_time as u64;
        id
    }

    /// Binds the entry to `port`; `None` only unbinds it.
    pub fn set_port(&mut self, id: EntryId, port: Option<P>) {
        let Some(entry) = self.entries.get_mut(id) else {
            warn!("set_port on expired entry {:?}", id);
            return;
        };
        if entry.port == port {
            return;
        }
        let old = entry.port.take();
        let slot = id.slot();
        if let Some(old) = &old {
            self.ports.detach(&mut self.entries, slot, old);
        }
        if let Some(port) = port {
            if old.is_some() {
                self.stats.moved += 1;
            }
            self.ports.attach(&mut self.entries, slot, port.clone());
            self.entries.at_mut(slot).port = Some(port);
        }
        self.needs_revalidation = true;
    }

    /// Port learned for `(mac, vlan)`. Multicast destinations, flooded
    /// VLANs and entries without a port never match.
    pub fn lookup(&self, mac: HwAddr, vlan: u16) -> Option<&P> {
        self.lookup_entry(mac, vlan).and_then(|entry| entry.port())
    }

    pub fn lookup_entry(&self, mac: HwAddr, vlan: u16) -> Option<&LearnedEntry<P>> {
        if is_multicast(&mac) || !self.is_learning_vlan(vlan) {
            return None;
        }
        let id = self.index.get(&MacKey::new(mac, vlan))?;
        self.entries
            .get(*id)
            .filter(|entry| entry.state() == EntryState::Bound)
    }

    pub fn entry(&self, id: EntryId) -> Option<&LearnedEntry<P>> {
        self.entries.get(id)
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut LearnedEntry<P>> {
        self.entries.get_mut(id)
    }

    pub fn state(&self, id: EntryId) -> EntryState {
        self.entries
            .get(id)
            .map(|entry| entry.state())
            .unwrap_or(EntryState::Expired)
    }

    /// Seconds since the entry was last learned or refreshed.
    pub fn entry_age(&self, id: EntryId) -> Option<u32> {
        let entry = self.entries.get(id)?;
        let remaining = entry.expires_at.saturating_sub(self.clock.now());
        Some((self.idle_time as u64).saturating_sub(remaining) as u32)
    }

    pub fn port_count(&self, port: &P) -> usize {
        self.ports.count(port)
    }

    /// Number of ports with at least one bound entry.
    pub fn tracked_ports(&self) -> usize {
        self.ports.len()
    }

    /// Ports with at least one bound entry, in heap order.
    pub fn port_usage(&self) -> impl Iterator<Item = &PortUsage<P>> {
        self.ports.iter()
    }

    /// Entries from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &LearnedEntry<P>> {
        self.lru
            .iter(&self.entries, Lane::Global)
            .map(move |slot| self.entries.at(slot))
    }

    /// Removes the entry from every structure. No-op for an expired handle.
    pub fn expire(&mut self, id: EntryId) {
        if self.entries.get(id).is_none() {
            return;
        }
        self.needs_revalidation = true;
        self.set_port(id, None);
        self.lru.remove(&mut self.entries, id.slot(), Lane::Global);
        if let Some(entry) = self.entries.remove(id) {
            self.index.remove(&entry.key());
        }
    }

    fn evict_one(&mut self) {
        let Some(slot) = select_victim(&self.ports, &self.lru) else {
            return;
        };
        let id = self.entries.id_of(slot);
        debug!("table full, evicting {}", self.entries.at(slot).key());
        self.stats.evicted += 1;
        self.expire(id);
    }

    /// Expires every entry, oldest first, and compacts the index. Arena
    /// slots stay allocated, so handles taken before the flush keep failing
    /// the generation check.
    pub fn flush(&mut self) {
        while let Some(slot) = self.lru.front() {
            let id = self.entries.id_of(slot);
            self.expire(id);
        }
        self.index.shrink_to_fit();
    }

    /// Drops aged-out entries and anything beyond `max_entries`, oldest
    /// first. Returns whether forwarding state needs revalidation since the
    /// last call.
    pub fn run(&mut self) -> bool {
        let now = self.clock.now();
        while let Some(slot) = self.lru.front() {
            let over = self.entries.len() > self.max_entries;
            let entry = self.entries.at(slot);
            if !over && entry.expires_at > now {
                break;
            }
            if over {
                self.stats.evicted += 1;
            } else {
                self.stats.expired += 1;
            }
            debug!("expiring {}", entry.key());
            let id = self.entries.id_of(slot);
            self.expire(id);
        }
        std::mem::take(&mut self.needs_revalidation)
    }

    /// Tells `scheduler` when `run` should be called next.
    pub fn wait<S: Scheduler + ?Sized>(&self, scheduler: &mut S) {
        if self.entries.len() > self.max_entries || self.needs_revalidation {
            scheduler.wake_immediately();
        } else if let Some(slot) = self.lru.front() {
            scheduler.wake_at(self.entries.at(slot).expires_at);
        }
    }
}

impl<P: PortHandle> Drop for AddressTable<P> {
    fn drop(&mut self) {
        debug!("destroying table with {} entries", self.entries.len());
        self.flush();
    }
}
