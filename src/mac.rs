use std::fmt::{self, Display, Formatter};
use std::hash::BuildHasher;

use ahash::RandomState;
use hwaddr::HwAddr;

// Fixed lanes mixed with the per-table salt.
const SEED_1: u64 = 0x243f_6a88_85a3_08d3;
const SEED_2: u64 = 0x1319_8a2e_0370_7344;
const SEED_3: u64 = 0xa409_3822_299f_31d0;

/// Identity of a learned address: the MAC together with its VLAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacKey {
    pub mac: HwAddr,
    pub vlan: u16,
}

impl MacKey {
    pub fn new(mac: HwAddr, vlan: u16) -> Self {
        Self { mac, vlan }
    }
}

impl Display for MacKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.mac, self.vlan)
    }
}

/// True for group addresses, broadcast included.
#[inline]
pub fn is_multicast(mac: &HwAddr) -> bool {
    mac.octets()[0] & 0x01 != 0
}

/// Keyed hasher for the entry index. Every table draws its own salt, so an
/// attacker choosing source addresses cannot aim for one bucket.
#[derive(Clone, Debug)]
pub struct MacHashState {
    salt: u32,
    inner: RandomState,
}

impl MacHashState {
    pub fn new(salt: u32) -> Self {
        Self {
            salt,
            inner: RandomState::with_seeds(salt as u64, SEED_1, SEED_2, SEED_3),
        }
    }

    pub fn salt(&self) -> u32 {
        self.salt
    }

    pub fn hash_key(&self, key: &MacKey) -> u32 {
        self.inner.hash_one(key) as u32
    }
}

impl BuildHasher for MacHashState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}

/// The hash the entry index is keyed on. Deterministic for a fixed salt.
pub fn hash_mac(mac: HwAddr, vlan: u16, salt: u32) -> u32 {
    MacHashState::new(salt).hash_key(&MacKey::new(mac, vlan))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multicast() {
        assert!(is_multicast(&HwAddr::from([0xff; 6])));
        assert!(is_multicast(&HwAddr::from([0x01, 0x00, 0x5e, 0x00, 0x00, 0x01])));
        assert!(!is_multicast(&HwAddr::from([0x00, 0x00, 0x00, 0x00, 0x00, 0x01])));
        assert!(!is_multicast(&HwAddr::from([0x02, 0x42, 0xac, 0x11, 0x00, 0x02])));
    }

    #[test]
    fn test_hash_keyed_by_salt() {
        let mac = HwAddr::from([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(hash_mac(mac, 1, 7), hash_mac(mac, 1, 7));
        assert_ne!(hash_mac(mac, 1, 7), hash_mac(mac, 2, 7));
        assert_ne!(hash_mac(mac, 1, 7), hash_mac(mac, 1, 8));
    }

    #[test]
    fn test_index_hash_matches_hash_mac() {
        let mac = HwAddr::from([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let state = MacHashState::new(99);
        assert_eq!(state.hash_key(&MacKey::new(mac, 3)), hash_mac(mac, 3, 99));
    }
}
