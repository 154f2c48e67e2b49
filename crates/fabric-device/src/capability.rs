//! Per-device-type feature flags.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::error;

use crate::version::split_model;

/// A named feature a device type may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityFlag {
    /// Multi-chassis trunking.
    Mct,
}

impl CapabilityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityFlag::Mct => "MCT",
        }
    }
}

impl fmt::Display for CapabilityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only map from device type code to its capability flags.
///
/// Every known type carries an entry for every flag, so a missing flag means
/// the table itself is incomplete and is logged as such.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    entries: HashMap<String, HashMap<CapabilityFlag, bool>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        let with_mct: HashSet<&str> = ["4000", "3000", "3001", "3006", "3007"].into();
        let entries = ["4000", "2000", "3000", "3001", "3006", "3007"]
            .into_iter()
            .map(|code| {
                let flags = HashMap::from([(CapabilityFlag::Mct, with_mct.contains(code))]);
                (code.to_string(), flags)
            })
            .collect();
        Self { entries }
    }

    /// Returns whether `device_type` supports `flag`.
    ///
    /// Accepts a bare type code (`4000`) or a full model string
    /// (`4000_18r.1.01a`). Unknown types and flags are unsupported.
    pub fn is_capability_supported(&self, device_type: &str, flag: CapabilityFlag) -> bool {
        let (code, _) = split_model(device_type);
        let Some(flags) = self.entries.get(code) else {
            error!(device_type, "Capability map not defined for {}", device_type);
            return false;
        };
        match flags.get(&flag) {
            Some(supported) => *supported,
            None => {
                error!(device_type, capability = %flag, "Capability {} not defined for {}", flag, device_type);
                false
            }
        }
    }

    /// Type codes with an entry, sorted.
    pub fn device_types(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mct_support_per_type() {
        let table = CapabilityTable::new();
        for code in ["4000", "3000", "3001", "3006", "3007"] {
            assert!(table.is_capability_supported(code, CapabilityFlag::Mct), "{}", code);
        }
        assert!(!table.is_capability_supported("2000", CapabilityFlag::Mct));
    }

    #[test]
    fn test_full_model_string_accepted() {
        let table = CapabilityTable::new();
        assert!(table.is_capability_supported("3006_18x.1.00", CapabilityFlag::Mct));
        assert!(!table.is_capability_supported("2000_18r.1.01", CapabilityFlag::Mct));
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let table = CapabilityTable::new();
        assert!(!table.is_capability_supported("9999", CapabilityFlag::Mct));
        assert!(!table.is_capability_supported("", CapabilityFlag::Mct));
    }

    #[test]
    fn test_missing_flag_is_unsupported() {
        let mut table = CapabilityTable::new();
        table.entries.insert("5000".to_string(), HashMap::new());
        assert!(!table.is_capability_supported("5000", CapabilityFlag::Mct));
    }

    #[test]
    fn test_device_types_sorted() {
        assert_eq!(
            CapabilityTable::new().device_types(),
            vec!["2000", "3000", "3001", "3006", "3007", "4000"]
        );
    }
}
