//! Error types for fabricd

use std::path::PathBuf;

use fabric_device::DeviceError;
use thiserror::Error;

/// Inventory and configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but is not valid TOML for the inventory
    #[error("Failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// A value is out of range or inconsistent with another
    #[error("Invalid configuration: {field}: {message}")]
    Invalid { field: String, message: String },

    /// A value was rejected by the device parameter checks
    #[error("Invalid configuration for {host}: {source}")]
    Device {
        host: String,
        #[source]
        source: DeviceError,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn device(host: impl Into<String>, source: DeviceError) -> Self {
        Self::Device {
            host: host.into(),
            source,
        }
    }
}

/// Result type for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;
