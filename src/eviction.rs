use std::hash::Hash;

use crate::list::List;
use crate::port_tracker::PortTracker;

/// Picks the entry to drop when the table is full: the least recently used
/// entry of the port holding the most entries. Falls back to the globally
/// oldest entry when no entry is bound to a port.
pub(crate) fn select_victim<P: Clone + Eq + Hash>(ports: &PortTracker<P>, lru: &List) -> Option<u32> {
    ports
        .busiest()
        .and_then(|usage| usage.oldest())
        .or_else(|| lru.front())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Arena, Lane, LearnedEntry};
    use crate::MacKey;
    use hwaddr::HwAddr;

    #[test]
    fn test_victim_from_busiest_port() {
        let mut arena: Arena<LearnedEntry<u32>> = Arena::new();
        let mut lru = List::new();
        let mut ports = PortTracker::new();
        let slots: Vec<u32> = (0..5u8)
            .map(|i| {
                let key = MacKey::new(HwAddr::from([0, 0, 0, 0, 2, i]), 1);
                let slot = arena.insert(LearnedEntry::new(key)).slot();
                lru.push_back(&mut arena, slot, Lane::Global);
                slot
            })
            .collect();
        // Globally oldest entry sits on the quiet port.
        ports.attach(&mut arena, slots[0], 1);
        for slot in &slots[1..] {
            ports.attach(&mut arena, *slot, 2);
        }
        assert_eq!(select_victim(&ports, &lru), Some(slots[1]));
    }

    #[test]
    fn test_victim_without_ports() {
        let mut arena: Arena<LearnedEntry<u32>> = Arena::new();
        let mut lru = List::new();
        let ports: PortTracker<u32> = PortTracker::new();
        assert_eq!(select_victim(&ports, &lru), None);

        let key = MacKey::new(HwAddr::from([0, 0, 0, 0, 2, 9]), 1);
        let slot = arena.insert(LearnedEntry::new(key)).slot();
        lru.push_back(&mut arena, slot, Lane::Global);
        assert_eq!(select_victim(&ports, &lru), Some(slot));
    }
}
