//! Identity and credentials of a managed switch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// Topological role of a device within a fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    SuperSpine,
    Spine,
    Leaf,
    Rack,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperSpine => "super-spine",
            Role::Spine => "spine",
            Role::Leaf => "leaf",
            Role::Rack => "rack",
        }
    }

    /// Leaf and rack devices carry overlay and MCT configuration.
    pub fn is_edge(&self) -> bool {
        matches!(self, Role::Leaf | Role::Rack)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "super-spine" | "superspine" => Ok(Role::SuperSpine),
            "spine" => Ok(Role::Spine),
            "leaf" => Ok(Role::Leaf),
            "rack" => Ok(Role::Rack),
            other => Err(DeviceError::invalid_param(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

/// A device the orchestrator talks to.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub host: String,
    pub user: String,
    pub password: String,
    /// `<code>_<firmware>` model string, e.g. `4000_18r.1.01a`.
    pub model: String,
    pub role: Role,
}

impl DeviceTarget {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        model: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            model: model.into(),
            role,
        }
    }
}

impl fmt::Debug for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTarget")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("model", &self.model)
            .field("role", &self.role)
            .finish()
    }
}
