use std::fs;

use anyhow::Context;

use crate::vlan::{parse_vlan_range, VLAN_COUNT};
use crate::{AddressTable, PortHandle, VlanBitmap, DEFAULT_IDLE_TIME, DEFAULT_MAX_ENTRIES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningConfig {
    pub idle_time: u32,
    pub max_entries: usize,
    pub flooded_vlans: VlanBitmap,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            idle_time: DEFAULT_IDLE_TIME,
            max_entries: DEFAULT_MAX_ENTRIES,
            flooded_vlans: VlanBitmap::new(),
        }
    }
}

fn non_negative(value: &toml::Value, key: &str) -> anyhow::Result<u64> {
    let value = value
        .as_integer()
        .with_context(|| format!("{key} must be an integer"))?;
    u64::try_from(value).with_context(|| format!("{key} must not be negative"))
}

impl LearningConfig {
    /// Parse the `[mac_learning]` section of a toml document.
    /// The toml file should be like:
    /// ```toml
    /// [mac_learning]
    /// idle_time = 300
    /// max_entries = 8192
    /// flooded_vlans = [7, "100-110"]
    /// ```
    /// Missing keys keep their defaults. Values outside the table's limits are
    /// clamped when applied.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let table: toml::Table = toml::from_str(s)?;
        let mut config = Self::default();
        let Some(section) = table.get("mac_learning") else {
            return Ok(config);
        };
        let section = section
            .as_table()
            .context("mac_learning must be a table")?;

        if let Some(v) = section.get("idle_time") {
            config.idle_time = non_negative(v, "idle_time")?.min(u32::MAX as u64) as u32;
        }
        if let Some(v) = section.get("max_entries") {
            config.max_entries = non_negative(v, "max_entries")?.min(usize::MAX as u64) as usize;
        }
        if let Some(v) = section.get("flooded_vlans") {
            let list = v.as_array().context("flooded_vlans must be an array")?;
            for item in list {
                let (lo, hi) = match item {
                    toml::Value::String(range) => parse_vlan_range(range)?,
                    other => {
                        let vlan = non_negative(other, "flooded_vlans")?;
                        let vlan = u16::try_from(vlan)
                            .ok()
                            .filter(|vlan| (*vlan as usize) < VLAN_COUNT)
                            .with_context(|| format!("vlan out of range: {vlan}"))?;
                        (vlan, vlan)
                    }
                };
                (lo..=hi).for_each(|vlan| {
                    config.flooded_vlans.insert(vlan);
                });
            }
        }
        Ok(config)
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
        Self::from_toml_str(&content).with_context(|| format!("failed to parse config: {path}"))
    }

    /// Applies every setting. Returns whether the flooded VLAN set changed.
    pub fn apply<P: PortHandle>(&self, table: &mut AddressTable<P>) -> bool {
        table.set_idle_time(self.idle_time);
        table.set_max_entries(self.max_entries);
        table.set_flooded_vlans(self.flooded_vlans.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let config = LearningConfig::from_toml_str(
            r#"
            [mac_learning]
            idle_time = 60
            max_entries = 100
            flooded_vlans = [7, "100-102"]
            "#,
        )
        .unwrap();
        assert_eq!(config.idle_time, 60);
        assert_eq!(config.max_entries, 100);
        assert_eq!(
            config.flooded_vlans.iter().collect::<Vec<_>>(),
            vec![7, 100, 101, 102]
        );
    }

    #[test]
    fn test_defaults() {
        assert_eq!(
            LearningConfig::from_toml_str("").unwrap(),
            LearningConfig::default()
        );
        let config = LearningConfig::from_toml_str("[mac_learning]\nidle_time = 20\n").unwrap();
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
    }

    #[test]
    fn test_invalid() {
        assert!(LearningConfig::from_toml_str("[mac_learning]\nidle_time = -1\n").is_err());
        assert!(LearningConfig::from_toml_str("[mac_learning]\nidle_time = \"x\"\n").is_err());
        assert!(LearningConfig::from_toml_str("[mac_learning]\nflooded_vlans = [5000]\n").is_err());
        assert!(LearningConfig::from_toml_str("[mac_learning]\nflooded_vlans = 3\n").is_err());
        assert!(LearningConfig::from_toml_str("mac_learning = 3\n").is_err());
        assert!(LearningConfig::from_file("/nonexistent/learning.toml").is_err());
    }

    #[test]
    fn test_apply_clamps() {
        let config = LearningConfig::from_toml_str(
            "[mac_learning]\nidle_time = 1\nmax_entries = 5000000\nflooded_vlans = [3]\n",
        )
        .unwrap();
        let mut table: AddressTable<u32> = AddressTable::new(300);
        assert!(config.apply(&mut table));
        assert_eq!(table.idle_time(), crate::MIN_IDLE_TIME);
        assert_eq!(table.max_entries(), crate::MAX_MAX_ENTRIES);
        assert!(table.flooded_vlans().contains(3));
        assert!(!config.apply(&mut table));
    }
}
