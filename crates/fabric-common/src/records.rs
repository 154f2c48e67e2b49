//! Fabric entities that are reconciled between snapshots.
//!
//! Each record knows its own key and equality rule through
//! [`Reconcilable`]; identity fields are the numeric ids a persistence layer
//! assigns and are carried over on update.

use serde::{Deserialize, Serialize};

use crate::reconcile::{Identified, Reconcilable};

/// A physical, loopback or VE interface discovered on a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub device_id: u64,
    pub int_type: String,
    pub int_name: String,
    #[serde(default)]
    pub speed: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub mac: String,
}

impl InterfaceRecord {
    pub fn new(int_type: impl Into<String>, int_name: impl Into<String>) -> Self {
        Self {
            int_type: int_type.into(),
            int_name: int_name.into(),
            ..Self::default()
        }
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = ip_address.into();
        self
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = mac.into();
        self
    }
}

impl Identified for InterfaceRecord {
    fn adopt_identity(&mut self, from: &Self) {
        self.id = from.id;
        self.device_id = from.device_id;
    }
}

impl Reconcilable for InterfaceRecord {
    fn reconcile_key(&self) -> String {
        format!("{} {}", self.int_name, self.int_type)
    }

    fn same_config(&self, other: &Self) -> bool {
        self.ip_address == other.ip_address && self.mac == other.mac
    }
}

/// An LLDP adjacency between two interfaces of two devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LldpNeighborRecord {
    #[serde(default)]
    pub id: u64,
    pub device_one_id: u64,
    pub device_two_id: u64,
    pub interface_one_id: u64,
    pub interface_two_id: u64,
    #[serde(default)]
    pub interface_one_name: String,
    #[serde(default)]
    pub interface_two_name: String,
    #[serde(default)]
    pub interface_one_ip: String,
    #[serde(default)]
    pub interface_two_ip: String,
}

impl Identified for LldpNeighborRecord {
    fn adopt_identity(&mut self, from: &Self) {
        self.id = from.id;
    }
}

impl Reconcilable for LldpNeighborRecord {
    fn reconcile_key(&self) -> String {
        format!(
            "{} {} {} {}",
            self.device_one_id, self.device_two_id, self.interface_one_id, self.interface_two_id
        )
    }

    fn same_config(&self, other: &Self) -> bool {
        self.interface_one_ip == other.interface_one_ip
            && self.interface_two_ip == other.interface_two_ip
    }
}

/// A BGP session towards a remote device's interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNeighborRecord {
    #[serde(default)]
    pub id: u64,
    pub device_id: u64,
    pub remote_device_id: u64,
    pub remote_interface_id: u64,
    pub remote_ip_address: String,
    pub remote_as: String,
    #[serde(default)]
    pub encapsulation_type: String,
}

impl Identified for RemoteNeighborRecord {
    fn adopt_identity(&mut self, from: &Self) {
        self.id = from.id;
    }
}

impl Reconcilable for RemoteNeighborRecord {
    fn reconcile_key(&self) -> String {
        format!(
            "{} {} {}",
            self.device_id, self.remote_device_id, self.remote_interface_id
        )
    }

    fn same_config(&self, other: &Self) -> bool {
        self.remote_ip_address == other.remote_ip_address && self.remote_as == other.remote_as
    }
}

/// A member port of the MCT peer interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MctMemberPortRecord {
    #[serde(default)]
    pub id: u64,
    pub cluster_id: u16,
    pub device_id: u64,
    pub remote_device_id: u64,
    pub interface_type: String,
    pub interface_name: String,
    #[serde(default)]
    pub interface_speed: u32,
    #[serde(default)]
    pub remote_interface_type: String,
    #[serde(default)]
    pub remote_interface_name: String,
    #[serde(default)]
    pub remote_interface_speed: u32,
}

impl Identified for MctMemberPortRecord {
    fn adopt_identity(&mut self, from: &Self) {
        self.id = from.id;
    }
}

impl Reconcilable for MctMemberPortRecord {
    fn reconcile_key(&self) -> String {
        format!(
            "{} {} {}",
            self.device_id, self.interface_type, self.interface_name
        )
    }

    fn same_config(&self, other: &Self) -> bool {
        self.interface_speed == other.interface_speed
            && self.remote_interface_type == other.remote_interface_type
            && self.remote_interface_name == other.remote_interface_name
            && self.remote_interface_speed == other.remote_interface_speed
    }
}
