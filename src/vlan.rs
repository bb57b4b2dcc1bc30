use std::fmt::{self, Debug, Formatter};
use std::str::FromStr;

use anyhow::Context;

pub const VLAN_COUNT: usize = 4096;
const WORDS: usize = VLAN_COUNT / 64;

/// Set of VLAN ids on which no learning takes place and every frame floods.
#[derive(Clone, PartialEq, Eq)]
pub struct VlanBitmap {
    words: Box<[u64; WORDS]>,
}

impl Default for VlanBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for VlanBitmap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl VlanBitmap {
    pub fn new() -> Self {
        Self {
            words: Box::new([0; WORDS]),
        }
    }

    /// Returns false if `vlan` is not a valid 12-bit id.
    pub fn insert(&mut self, vlan: u16) -> bool {
        if vlan as usize >= VLAN_COUNT {
            return false;
        }
        self.words[vlan as usize / 64] |= 1u64 << (vlan % 64);
        true
    }

    pub fn remove(&mut self, vlan: u16) {
        if (vlan as usize) < VLAN_COUNT {
            self.words[vlan as usize / 64] &= !(1u64 << (vlan % 64));
        }
    }

    #[inline]
    pub fn contains(&self, vlan: u16) -> bool {
        (vlan as usize) < VLAN_COUNT && self.words[vlan as usize / 64] & (1u64 << (vlan % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        (0..VLAN_COUNT as u16).filter(|vlan| self.contains(*vlan))
    }
}

impl FromIterator<u16> for VlanBitmap {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut bitmap = Self::new();
        for vlan in iter {
            bitmap.insert(vlan);
        }
        bitmap
    }
}

/// Parses a single id or an inclusive range, e.g. `"7"` or `"100-110"`.
pub(crate) fn parse_vlan_range(s: &str) -> anyhow::Result<(u16, u16)> {
    let s = s.trim();
    let (lo, hi) = match s.split_once('-') {
        Some((lo, hi)) => (lo.trim(), hi.trim()),
        None => (s, s),
    };
    let lo: u16 = lo.parse().with_context(|| format!("invalid vlan: {s}"))?;
    let hi: u16 = hi.parse().with_context(|| format!("invalid vlan: {s}"))?;
    if lo > hi || hi as usize >= VLAN_COUNT {
        return Err(anyhow::anyhow!("vlan range out of bounds: {}", s));
    }
    Ok((lo, hi))
}

/// Comma separated ids and ranges: `"1,7,100-110"`. An empty string is the empty set.
impl FromStr for VlanBitmap {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bitmap = Self::new();
        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            let (lo, hi) = parse_vlan_range(part)?;
            (lo..=hi).for_each(|vlan| {
                bitmap.insert(vlan);
            });
        }
        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains() {
        let mut bitmap = VlanBitmap::new();
        assert!(bitmap.is_empty());
        assert!(bitmap.insert(7));
        assert!(bitmap.insert(4095));
        assert!(!bitmap.insert(4096));
        assert!(bitmap.contains(7));
        assert!(bitmap.contains(4095));
        assert!(!bitmap.contains(8));
        assert!(!bitmap.contains(u16::MAX));
        bitmap.remove(7);
        assert!(!bitmap.contains(7));
        assert_eq!(bitmap.len(), 1);
    }

    #[test]
    fn test_parse() {
        let bitmap: VlanBitmap = "1, 7,100-102".parse().unwrap();
        assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![1, 7, 100, 101, 102]);
        assert!("".parse::<VlanBitmap>().unwrap().is_empty());
        assert!("5-2".parse::<VlanBitmap>().is_err());
        assert!("4096".parse::<VlanBitmap>().is_err());
        assert!("x".parse::<VlanBitmap>().is_err());
    }

    #[test]
    fn test_equality() {
        let a: VlanBitmap = [3, 9].into_iter().collect();
        let b: VlanBitmap = "9,3".parse().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, VlanBitmap::new());
    }
}
