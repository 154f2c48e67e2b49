//! Switch drivers for fabric automation.
//!
//! This crate resolves a device's `<code>_<firmware>` model string to the
//! adapter that knows its configuration surface, and carries the NETCONF
//! transport those adapters speak through.
//!
//! # Modules
//!
//! - [`version`]: firmware version grammar and lookup keys
//! - [`registry`]: model to adapter resolution
//! - [`capability`]: per-device-type feature flags
//! - [`adapter`]: the layered operation surface and request builders
//! - [`transport`] and [`netconf`]: the session contract and its NETCONF
//!   implementation

pub mod adapter;
pub mod capability;
pub mod error;
pub mod netconf;
pub mod registry;
pub mod target;
pub mod transport;
pub mod version;
pub mod xml;

pub use adapter::DeviceAdapter;
pub use capability::{CapabilityFlag, CapabilityTable};
pub use error::{DeviceError, DeviceResult, NOT_AUTHORIZED_MESSAGE};
pub use netconf::{NetconfSession, NetconfSettings, NetconfTransportFactory};
pub use registry::{translate_model_string, AdapterRegistry, RegistryEntry};
pub use target::{DeviceTarget, Role};
pub use transport::{classify_reply, classify_transport_message, Transport, TransportFactory};
pub use version::{split_model, DeviceVersion};
