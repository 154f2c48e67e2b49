//! Model and firmware to adapter resolution.
//!
//! The registry is built once at startup and shared read-only. Keys are
//! `<code>_<version key>` or `<code>_base`; adapter instances are shared
//! between every key of the same family or generation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::adapter::{Avalanche, Avalanche18r2, Cedar, DeviceAdapter, Orca, PlatformBase, SwitchingBase};
use crate::error::{DeviceError, DeviceResult};
use crate::version::{adapter_key, split_model, DeviceVersion};

pub const AVALANCHE_TYPE: &str = "4000";
pub const FUSION_TYPE: &str = "2000";
pub const CEDAR_TYPE: &str = "3000";
pub const FREEDOM_TYPE: &str = "3001";
pub const ORCA_TYPE: &str = "3006";
pub const ORCA_T_TYPE: &str = "3007";

const BASE_KEY: &str = "base";

/// Legacy model strings carrying this SKU predate the `<code>_<firmware>` form.
const LEGACY_CEDAR_SKU: &str = "SLX9240";

const SKUS: [(&str, &str); 6] = [
    (AVALANCHE_TYPE, "BR-SLX9540"),
    (FUSION_TYPE, "BR-SLX9850"),
    (CEDAR_TYPE, "BR-SLX9240"),
    (FREEDOM_TYPE, "BR-SLX9140"),
    (ORCA_TYPE, "EN-SLX-9030-48S"),
    (ORCA_T_TYPE, "EN-SLX-9030-48T"),
];

/// One registry entry, as listed by [`AdapterRegistry::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub key: String,
    pub sku: String,
    pub adapter: &'static str,
}

/// Read-only table from adapter key to driver.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn DeviceAdapter>>,
    platform: Arc<dyn DeviceAdapter>,
    switching: Arc<dyn DeviceAdapter>,
    cedar: Arc<dyn DeviceAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        let platform: Arc<dyn DeviceAdapter> = Arc::new(PlatformBase::new());
        let switching: Arc<dyn DeviceAdapter> = Arc::new(SwitchingBase::new());
        let cedar: Arc<dyn DeviceAdapter> = Arc::new(Cedar::new());
        let avalanche: Arc<dyn DeviceAdapter> = Arc::new(Avalanche::new());
        let avalanche_18r2: Arc<dyn DeviceAdapter> = Arc::new(Avalanche18r2::new());
        let orca: Arc<dyn DeviceAdapter> = Arc::new(Orca::new());

        let mut registry = Self {
            adapters: HashMap::new(),
            platform,
            switching: switching.clone(),
            cedar: cedar.clone(),
        };

        registry.register(AVALANCHE_TYPE, &[BASE_KEY, "18r.1", "18.1"], &avalanche);
        registry.register(AVALANCHE_TYPE, &["18r.2", "18.2"], &avalanche_18r2);
        registry.register(
            FUSION_TYPE,
            &[BASE_KEY, "18r.1", "18.1", "18r.2", "18.2"],
            &switching,
        );
        registry.register(CEDAR_TYPE, &[BASE_KEY, "17s.1", "17.1", "18s.1", "18.1"], &cedar);
        registry.register(
            FREEDOM_TYPE,
            &[BASE_KEY, "17s.1", "17.1", "18s.1", "18.1"],
            &switching,
        );
        registry.register(ORCA_TYPE, &[BASE_KEY, "18x.1", "18.1"], &orca);
        registry.register(ORCA_T_TYPE, &[BASE_KEY, "18x.1", "18.1"], &orca);

        debug!(entries = registry.adapters.len(), "Adapter registry initialised");
        registry
    }

    fn register(&mut self, code: &str, version_keys: &[&str], adapter: &Arc<dyn DeviceAdapter>) {
        for version_key in version_keys {
            self.adapters
                .insert(adapter_key(code, version_key), Arc::clone(adapter));
        }
    }

    /// Keys tried for `model`, in lookup order: patch, minor, major, then base.
    pub fn lookup_keys(model: &str) -> Vec<String> {
        let (code, version) = split_model(model);
        let mut keys = Vec::with_capacity(4);
        if let Some(version) = version.and_then(DeviceVersion::parse) {
            keys.extend(
                version
                    .keys()
                    .iter()
                    .map(|version_key| adapter_key(code, version_key)),
            );
        }
        keys.push(adapter_key(code, BASE_KEY));
        keys
    }

    fn lookup(&self, model: &str) -> Option<(&str, &Arc<dyn DeviceAdapter>)> {
        Self::lookup_keys(model).into_iter().find_map(|key| {
            self.adapters
                .get_key_value(&key)
                .map(|(key, adapter)| (key.as_str(), adapter))
        })
    }

    /// Resolves the driver for a `<code>_<firmware>` model string.
    ///
    /// Never fails: an unregistered model falls back to Cedar when it names
    /// the legacy 9240 SKU and to the switching base otherwise.
    pub fn resolve(&self, model: &str) -> Arc<dyn DeviceAdapter> {
        if let Some((key, adapter)) = self.lookup(model) {
            debug!(model, key, adapter = adapter.name(), "Resolved adapter");
            return Arc::clone(adapter);
        }
        if model.contains(LEGACY_CEDAR_SKU) {
            debug!(model, adapter = self.cedar.name(), "Resolved legacy model");
            return Arc::clone(&self.cedar);
        }
        warn!(model, adapter = self.switching.name(), "No adapter registered, using default");
        Arc::clone(&self.switching)
    }

    /// Fails with [`DeviceError::Unsupported`] when no registered entry,
    /// including the model's base entry, matches.
    pub fn check_supported(&self, model: &str) -> DeviceResult<()> {
        match self.lookup(model) {
            Some(_) => Ok(()),
            None => Err(DeviceError::unsupported(model)),
        }
    }

    /// Root adapter used to read device identity before the model is known.
    pub fn platform(&self) -> Arc<dyn DeviceAdapter> {
        Arc::clone(&self.platform)
    }

    /// Every registered key with its SKU and adapter, sorted by key.
    pub fn entries(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<RegistryEntry> = self
            .adapters
            .iter()
            .map(|(key, adapter)| {
                let (code, _) = split_model(key);
                RegistryEntry {
                    key: key.clone(),
                    sku: sku_for(code).unwrap_or(code).to_string(),
                    adapter: adapter.name(),
                }
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("entries", &self.adapters.len())
            .finish()
    }
}

fn sku_for(code: &str) -> Option<&'static str> {
    SKUS.iter()
        .find(|(known, _)| *known == code)
        .map(|(_, sku)| *sku)
}

/// Maps `<code>_<firmware>` to the marketing SKU; anything else is returned
/// unchanged.
pub fn translate_model_string(model: &str) -> String {
    match split_model(model) {
        (code, Some(_)) => sku_for(code).unwrap_or(model).to_string(),
        (_, None) => model.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_keys_order() {
        assert_eq!(
            AdapterRegistry::lookup_keys("4000_18r.1.01a"),
            vec![
                "4000_18r.1.01a".to_string(),
                "4000_18r.1.01".to_string(),
                "4000_18r.1".to_string(),
                "4000_base".to_string(),
            ]
        );
        assert_eq!(AdapterRegistry::lookup_keys("4000"), vec!["4000_base".to_string()]);
        assert_eq!(
            AdapterRegistry::lookup_keys("4000_garbage"),
            vec!["4000_base".to_string()]
        );
    }

    #[test]
    fn test_patch_resolves_to_major_entry() {
        let registry = AdapterRegistry::new();
        let patch = registry.resolve("4000_18r.1.01a");
        let major = registry.resolve("4000_18r.1");
        assert!(Arc::ptr_eq(&patch, &major));
        assert_eq!(patch.name(), "slx-avalanche");
    }

    #[test]
    fn test_generations() {
        let registry = AdapterRegistry::new();
        assert_eq!(registry.resolve("4000_18r.2.00").name(), "slx-avalanche-18r2");
        assert_eq!(registry.resolve("4000_18.2.00b").name(), "slx-avalanche-18r2");
        assert_eq!(registry.resolve("2000_18r.2.00").name(), "slx-switching");
        assert_eq!(registry.resolve("3000_17s.1.02").name(), "slx-cedar");
        assert_eq!(registry.resolve("3001_18s.1.01").name(), "slx-switching");
        assert_eq!(registry.resolve("3006_18x.1.00").name(), "slx-orca");
        assert_eq!(registry.resolve("3007_18x.1.00").name(), "slx-orca");
    }

    #[test]
    fn test_shared_instances() {
        let registry = AdapterRegistry::new();
        assert!(Arc::ptr_eq(
            &registry.resolve("3006_18x.1.00"),
            &registry.resolve("3007_18.1.00")
        ));
        assert!(Arc::ptr_eq(
            &registry.resolve("2000_18r.1.00"),
            &registry.resolve("3001_17s.1.00")
        ));
    }

    #[test]
    fn test_unregistered_version_falls_back_to_base() {
        let registry = AdapterRegistry::new();
        assert!(Arc::ptr_eq(
            &registry.resolve("4000_20r.1.00"),
            &registry.resolve("4000")
        ));
        assert!(registry.check_supported("4000_20r.1.00").is_ok());
    }

    #[test]
    fn test_unknown_model_degrades() {
        let registry = AdapterRegistry::new();
        assert_eq!(registry.resolve("9999_0.0.0").name(), "slx-switching");
        assert_eq!(registry.resolve("BR-SLX9240").name(), "slx-cedar");
        assert_eq!(registry.resolve("").name(), "slx-switching");
    }

    #[test]
    fn test_check_supported_names_model() {
        let registry = AdapterRegistry::new();
        let err = registry.check_supported("9999_0.0.0").unwrap_err();
        assert!(err.to_string().contains("9999_0.0.0"));
        assert!(matches!(err, DeviceError::Unsupported { .. }));
        // the legacy heuristic only applies to resolve
        assert!(registry.check_supported("BR-SLX9240").is_err());
    }

    #[test]
    fn test_platform_is_root() {
        assert_eq!(AdapterRegistry::new().platform().name(), "slx-base");
    }

    #[test]
    fn test_translate_model_string() {
        assert_eq!(translate_model_string("4000_18r.1.01a"), "BR-SLX9540");
        assert_eq!(translate_model_string("3007_18x.1.00"), "EN-SLX-9030-48T");
        assert_eq!(translate_model_string("9999_0.0.0"), "9999_0.0.0");
        assert_eq!(translate_model_string("4000"), "4000");
    }

    #[test]
    fn test_entries_listing() {
        let entries = AdapterRegistry::new().entries();
        assert_eq!(entries.len(), 26);
        assert_eq!(
            entries[0],
            RegistryEntry {
                key: "2000_18.1".to_string(),
                sku: "BR-SLX9850".to_string(),
                adapter: "slx-switching",
            }
        );
    }
}
