//! Firmware version parsing and lookup keys.
//!
//! Firmware strings such as `18r.1.01a` are parsed into a [`DeviceVersion`]
//! from which three progressively coarser lookup keys are derived:
//!
//! | key   | example     |
//! |-------|-------------|
//! | patch | `18r.1.01a` |
//! | minor | `18r.1.01`  |
//! | major | `18r.1`     |

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DeviceError;

/// `<digits><optional r/s/x>.<digits>.<digits><optional letters>`; any single
/// character separates the numeric parts.
static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+[rsx]?).([0-9]+).([0-9]+)([a-z]*)").expect("Invalid regex pattern")
});

/// A parsed firmware version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceVersion {
    pub year: String,
    pub major: String,
    pub minor: String,
    pub patch: String,
}

impl DeviceVersion {
    /// Parses `raw`, returning `None` when it does not follow the version
    /// grammar. Callers fall back to the base adapter in that case.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(raw)?;
        Some(Self {
            year: caps.get(1)?.as_str().to_string(),
            major: caps.get(2)?.as_str().to_string(),
            minor: caps.get(3)?.as_str().to_string(),
            patch: caps.get(4).map(|m| m.as_str()).unwrap_or_default().to_string(),
        })
    }

    pub fn patch_key(&self) -> String {
        format!("{}.{}.{}{}", self.year, self.major, self.minor, self.patch)
    }

    pub fn minor_key(&self) -> String {
        format!("{}.{}.{}", self.year, self.major, self.minor)
    }

    pub fn major_key(&self) -> String {
        format!("{}.{}", self.year, self.major)
    }

    /// Lookup keys ordered most specific first.
    pub fn keys(&self) -> [String; 3] {
        [self.patch_key(), self.minor_key(), self.major_key()]
    }
}

impl FromStr for DeviceVersion {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DeviceError::unsupported(s))
    }
}

impl fmt::Display for DeviceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.patch_key())
    }
}

/// Splits `<code>_<firmware>` into its parts. A model without `_` carries
/// no version.
pub fn split_model(model: &str) -> (&str, Option<&str>) {
    match model.split_once('_') {
        Some((code, version)) => (code, Some(version)),
        None => (model, None),
    }
}

/// Joins a model code and a version key into a registry key.
pub fn adapter_key(code: &str, version_key: &str) -> String {
    format!("{}_{}", code, version_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_version() {
        let v = DeviceVersion::parse("18r.1.01a").unwrap();
        assert_eq!(v.year, "18r");
        assert_eq!(v.major, "1");
        assert_eq!(v.minor, "01");
        assert_eq!(v.patch, "a");
    }

    #[test]
    fn test_keys_most_specific_first() {
        let v: DeviceVersion = "18r.1.01a".parse().unwrap();
        assert_eq!(
            v.keys(),
            [
                "18r.1.01a".to_string(),
                "18r.1.01".to_string(),
                "18r.1".to_string()
            ]
        );
    }

    #[test]
    fn test_version_without_patch_letters() {
        let v = DeviceVersion::parse("17s.1.02").unwrap();
        assert_eq!(v.patch, "");
        assert_eq!(v.patch_key(), v.minor_key());
        assert_eq!(v.to_string(), "17s.1.02");
    }

    #[test]
    fn test_unparseable_version_is_unsupported() {
        assert_eq!(DeviceVersion::parse("18r.1"), None);
        assert_eq!(DeviceVersion::parse("base"), None);
        assert!(matches!(
            "garbage".parse::<DeviceVersion>(),
            Err(DeviceError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_split_model() {
        assert_eq!(split_model("4000_18r.1.01a"), ("4000", Some("18r.1.01a")));
        assert_eq!(split_model("4000"), ("4000", None));
        assert_eq!(adapter_key("4000", "base"), "4000_base");
    }
}
