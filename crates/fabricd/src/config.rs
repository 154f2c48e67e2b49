//! Fabric inventory file
//!
//! Loads the TOML inventory describing the NETCONF session settings, the
//! cluster poll window, fabric-wide BGP, system and overlay defaults, and
//! every managed switch.

use std::collections::HashSet;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use fabric_actions::{
    Addressing, BgpSettings, ClusterIntent, EvpnPeerIntent, InterfaceIntent, LoopbackIntent, MacArpIntent,
    NeighborIntent, OverlayIntent, SwitchIntent, SystemIntent,
};
use fabric_common::PollPolicy;
use fabric_device::adapter::BfdTimers;
use fabric_device::{DeviceTarget, NetconfSettings, Role};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};

/// Default inventory location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fabricd/fabric.toml";

/// Where `discover` keeps the recorded topology by default
pub const DEFAULT_STATE_PATH: &str = "/var/lib/fabricd/topology.json";

/// NETCONF session settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetconfConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Client program plus leading arguments, split on whitespace
    #[serde(default = "default_ssh_command")]
    pub ssh_command: String,
}

fn default_port() -> u16 {
    830
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    120
}

fn default_ssh_command() -> String {
    "ssh".to_string()
}

impl Default for NetconfConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            ssh_command: default_ssh_command(),
        }
    }
}

/// Management cluster status poll window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollConfig {
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

fn default_poll_timeout() -> u64 {
    90
}

fn default_poll_interval() -> u64 {
    15
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout(),
            interval_secs: default_poll_interval(),
        }
    }
}

/// Fabric-wide BGP defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BgpConfig {
    #[serde(default = "default_local_as")]
    pub local_as: u32,

    #[serde(default = "default_max_paths")]
    pub max_paths: u32,

    #[serde(default = "default_peer_group")]
    pub peer_group: String,

    #[serde(default = "default_allowas_in")]
    pub allowas_in: u32,

    #[serde(default)]
    pub multihop: Option<u8>,

    /// BFD is enabled only when all three timers are set
    #[serde(default)]
    pub bfd_tx: Option<u32>,

    #[serde(default)]
    pub bfd_rx: Option<u32>,

    #[serde(default)]
    pub bfd_multiplier: Option<u32>,
}

fn default_local_as() -> u32 {
    64512
}

fn default_max_paths() -> u32 {
    8
}

fn default_peer_group() -> String {
    "spine-group".to_string()
}

fn default_allowas_in() -> u32 {
    1
}

impl Default for BgpConfig {
    fn default() -> Self {
        Self {
            local_as: default_local_as(),
            max_paths: default_max_paths(),
            peer_group: default_peer_group(),
            allowas_in: default_allowas_in(),
            multihop: None,
            bfd_tx: None,
            bfd_rx: None,
            bfd_multiplier: None,
        }
    }
}

/// Fabric-wide system properties; unset MTUs are left alone
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SystemConfig {
    #[serde(default)]
    pub l2_mtu: Option<u32>,

    #[serde(default)]
    pub ip_mtu: Option<u32>,
}

/// VXLAN overlay pushed to every leaf and rack switch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlayConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Overlay gateway and EVPN instance name
    #[serde(default = "default_overlay_name")]
    pub name: String,

    #[serde(default = "default_vtep_loopback_id")]
    pub vtep_loopback_id: u32,

    #[serde(default = "default_true")]
    pub map_vni_auto: bool,

    #[serde(default)]
    pub anycast_mac: Option<String>,

    #[serde(default)]
    pub ipv6_anycast_mac: Option<String>,

    #[serde(default = "default_arp_aging_timeout")]
    pub arp_aging_timeout: u32,

    #[serde(default = "default_mac_aging_timeout")]
    pub mac_aging_timeout: u32,

    #[serde(default = "default_mac_conversational_timeout")]
    pub mac_conversational_timeout: u32,

    #[serde(default = "default_mac_move_limit")]
    pub mac_move_limit: u32,

    #[serde(default = "default_duplicate_mac_timer")]
    pub duplicate_mac_timer: u32,

    #[serde(default = "default_duplicate_mac_max_count")]
    pub duplicate_mac_max_count: u32,
}

fn default_overlay_name() -> String {
    "fabric".to_string()
}

fn default_vtep_loopback_id() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_arp_aging_timeout() -> u32 {
    300
}

fn default_mac_aging_timeout() -> u32 {
    1800
}

fn default_mac_conversational_timeout() -> u32 {
    300
}

fn default_mac_move_limit() -> u32 {
    20
}

fn default_duplicate_mac_timer() -> u32 {
    5
}

fn default_duplicate_mac_max_count() -> u32 {
    3
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: default_overlay_name(),
            vtep_loopback_id: default_vtep_loopback_id(),
            map_vni_auto: default_true(),
            anycast_mac: None,
            ipv6_anycast_mac: None,
            arp_aging_timeout: default_arp_aging_timeout(),
            mac_aging_timeout: default_mac_aging_timeout(),
            mac_conversational_timeout: default_mac_conversational_timeout(),
            mac_move_limit: default_mac_move_limit(),
            duplicate_mac_timer: default_duplicate_mac_timer(),
            duplicate_mac_max_count: default_duplicate_mac_max_count(),
        }
    }
}

impl OverlayConfig {
    /// The overlay of one edge switch, `None` while disabled.
    pub fn intent(&self, mct_secondary: bool) -> Option<OverlayIntent> {
        if !self.enabled {
            return None;
        }
        let mut overlay = OverlayIntent::new(self.name.clone(), self.vtep_loopback_id);
        overlay.map_vni_auto = self.map_vni_auto;
        overlay.anycast_mac = self.anycast_mac.clone();
        overlay.ipv6_anycast_mac = self.ipv6_anycast_mac.clone();
        overlay.mac_arp = MacArpIntent {
            arp_aging_timeout: self.arp_aging_timeout,
            mac_aging_timeout: self.mac_aging_timeout,
            mac_conversational_timeout: self.mac_conversational_timeout,
            mac_move_limit: self.mac_move_limit,
        };
        overlay.duplicate_mac_timer = self.duplicate_mac_timer;
        overlay.duplicate_mac_max_count = self.duplicate_mac_max_count;
        overlay.mct_secondary = mct_secondary;
        Some(overlay)
    }
}

/// MCT data-plane cluster membership of one switch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MctClusterConfig {
    pub name: String,

    #[serde(default = "default_cluster_id")]
    pub id: u16,

    #[serde(default = "default_control_vlan")]
    pub control_vlan: u16,

    #[serde(default = "default_control_vlan")]
    pub control_ve: u16,

    #[serde(default = "default_peer_interface_type")]
    pub peer_interface_type: String,

    pub peer_interface_name: String,

    pub peer_ip: Ipv4Addr,

    /// This node's control VE address, e.g. `10.20.20.0/31`
    pub local_ip: String,

    #[serde(default)]
    pub peer_loopback: Option<Ipv4Addr>,

    /// Receives the overlay gateway through its principal
    #[serde(default)]
    pub secondary: bool,
}

fn default_cluster_id() -> u16 {
    1
}

fn default_control_vlan() -> u16 {
    4090
}

fn default_peer_interface_type() -> String {
    "Port-channel".to_string()
}

impl MctClusterConfig {
    pub fn intent(&self) -> ClusterIntent {
        ClusterIntent {
            name: self.name.clone(),
            id: self.id,
            control_vlan: self.control_vlan,
            control_ve: self.control_ve,
            peer_interface_type: self.peer_interface_type.clone(),
            peer_interface_name: self.peer_interface_name.clone(),
            peer_ip: self.peer_ip,
            local_ip: self.local_ip.clone(),
            peer_loopback: self.peer_loopback,
        }
    }
}

/// EVPN peering of one switch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvpnPeerConfig {
    pub address: Ipv4Addr,
    pub remote_as: u32,

    /// Remote loopback, for platforms that peer over it
    #[serde(default)]
    pub loopback_id: Option<u32>,

    #[serde(default)]
    pub loopback_ip: Option<Ipv4Addr>,
}

/// A fabric link interface; either `ip_address` or both donor fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceConfig {
    #[serde(default = "default_interface_type")]
    pub int_type: String,

    pub int_name: String,

    #[serde(default)]
    pub ip_address: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub donor_type: Option<String>,

    #[serde(default)]
    pub donor_name: Option<String>,
}

fn default_interface_type() -> String {
    "ethernet".to_string()
}

impl InterfaceConfig {
    pub fn intent(&self, host: &str) -> ConfigResult<InterfaceIntent> {
        match (&self.ip_address, &self.donor_type, &self.donor_name) {
            (Some(ip_address), None, None) => Ok(InterfaceIntent {
                int_type: self.int_type.clone(),
                int_name: self.int_name.clone(),
                addressing: Addressing::Numbered {
                    ip_address: ip_address.clone(),
                    description: self.description.clone(),
                },
            }),
            (None, Some(donor_type), Some(donor_name)) => Ok(InterfaceIntent::unnumbered(
                &self.int_type,
                &self.int_name,
                donor_type,
                donor_name,
            )),
            _ => Err(ConfigError::invalid(
                format!("devices[{}].interfaces[{}]", host, self.int_name),
                "set either ip_address or donor_type and donor_name",
            )),
        }
    }
}

/// One managed switch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub host: String,
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// `<code>_<firmware>`, e.g. `4000_18r.1.01a`
    pub model: String,

    /// `super-spine`, `spine`, `leaf` or `rack`
    pub role: String,

    #[serde(default)]
    pub loopback_ip: Option<Ipv4Addr>,

    #[serde(default = "default_loopback_id")]
    pub loopback_id: u32,

    #[serde(default)]
    pub router_id: Option<Ipv4Addr>,

    /// Overrides `[bgp] local_as`
    #[serde(default)]
    pub local_as: Option<u32>,

    #[serde(default)]
    pub network: Option<String>,

    #[serde(default)]
    pub neighbors: Vec<NeighborIntent>,

    #[serde(default)]
    pub evpn_peers: Vec<EvpnPeerConfig>,

    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,

    #[serde(default)]
    pub cluster: Option<MctClusterConfig>,
}

fn default_loopback_id() -> u32 {
    1
}

impl DeviceConfig {
    pub fn role(&self) -> ConfigResult<Role> {
        self.role
            .parse()
            .map_err(|e| ConfigError::device(self.host.clone(), e))
    }

    pub fn target(&self) -> ConfigResult<DeviceTarget> {
        Ok(DeviceTarget::new(
            self.host.clone(),
            self.user.clone(),
            self.password.clone(),
            self.model.clone(),
            self.role()?,
        ))
    }

    /// Desired state of this switch; `local_as` falls back to `default_as`.
    pub fn intent(
        &self,
        default_as: u32,
        system: &SystemConfig,
        overlay: &OverlayConfig,
    ) -> ConfigResult<SwitchIntent> {
        let mut intent = SwitchIntent::new(self.target()?, self.local_as.unwrap_or(default_as));
        intent.loopback = self.loopback_ip.map(|address| LoopbackIntent {
            id: self.loopback_id,
            address,
        });
        intent.router_id = self.router_id;
        intent.network = self.network.clone();
        intent.neighbors = self.neighbors.clone();
        intent.evpn_peers = self
            .evpn_peers
            .iter()
            .map(|peer| {
                let loopback = match (peer.loopback_id, peer.loopback_ip) {
                    (Some(id), Some(ip)) => Some((id, ip)),
                    (None, None) => None,
                    _ => {
                        return Err(ConfigError::invalid(
                            format!("devices[{}].evpn_peers", self.host),
                            "loopback_id and loopback_ip must be set together",
                        ))
                    }
                };
                Ok(EvpnPeerIntent {
                    address: peer.address,
                    remote_as: peer.remote_as,
                    loopback,
                })
            })
            .collect::<ConfigResult<_>>()?;
        intent.interfaces = self
            .interfaces
            .iter()
            .map(|interface| interface.intent(&self.host))
            .collect::<ConfigResult<_>>()?;
        intent.system = SystemIntent {
            l2_mtu: system.l2_mtu,
            ip_mtu: system.ip_mtu,
        };
        let secondary = self.cluster.as_ref().is_some_and(|c| c.secondary);
        intent.overlay = overlay.intent(secondary);
        intent.cluster = self.cluster.as_ref().map(MctClusterConfig::intent);
        Ok(intent)
    }
}

/// Complete fabricd configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FabricConfig {
    #[serde(default)]
    pub netconf: NetconfConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub bgp: BgpConfig,

    #[serde(default)]
    pub system: SystemConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl FabricConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::parse(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Load from the default location or defaults
    pub fn load() -> ConfigResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    fn parse(path: &Path, content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid("config", format!("Failed to serialize: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.netconf.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.netconf.request_timeout_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.netconf.port == 0 {
            return Err(ConfigError::invalid("netconf.port", "must be > 0"));
        }

        if self.netconf.ssh_command.split_whitespace().next().is_none() {
            return Err(ConfigError::invalid("netconf.ssh_command", "must not be empty"));
        }

        if self.poll.interval_secs == 0 {
            return Err(ConfigError::invalid("poll.interval_secs", "must be > 0"));
        }

        if self.poll.interval_secs > self.poll.timeout_secs {
            return Err(ConfigError::invalid(
                "poll.interval_secs",
                format!(
                    "{} exceeds poll.timeout_secs {}",
                    self.poll.interval_secs, self.poll.timeout_secs
                ),
            ));
        }

        self.bfd_timers()?;

        let system = SystemIntent {
            l2_mtu: self.system.l2_mtu,
            ip_mtu: self.system.ip_mtu,
        };
        system
            .l2_mtu()
            .and_then(|_| system.ip_mtu())
            .map_err(|e| ConfigError::device("system", e))?;

        if let Some(overlay) = self.overlay.intent(false) {
            overlay
                .gateway_params()
                .and_then(|_| overlay.evpn_instance_params())
                .and_then(|_| overlay.anycast_params())
                .and_then(|_| overlay.mac_arp.params())
                .map_err(|e| ConfigError::device("overlay", e))?;
        }

        let mut hosts = HashSet::new();
        for device in &self.devices {
            if device.host.trim().is_empty() {
                return Err(ConfigError::invalid("devices.host", "must not be empty"));
            }
            if device.user.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("devices[{}].user", device.host),
                    "must not be empty",
                ));
            }
            if !hosts.insert(device.host.as_str()) {
                return Err(ConfigError::invalid(
                    "devices.host",
                    format!("duplicate host {}", device.host),
                ));
            }
            device.role()?;
            for interface in &device.interfaces {
                interface
                    .intent(&device.host)?
                    .params()
                    .map_err(|e| ConfigError::device(device.host.clone(), e))?;
            }
            if let Some(cluster) = &device.cluster {
                let cluster = cluster.intent();
                cluster
                    .params()
                    .and_then(|_| cluster.ve_params(None))
                    .map_err(|e| ConfigError::device(device.host.clone(), e))?;
            }
        }

        Ok(())
    }

    fn bfd_timers(&self) -> ConfigResult<Option<BfdTimers>> {
        match (self.bgp.bfd_tx, self.bgp.bfd_rx, self.bgp.bfd_multiplier) {
            (Some(tx), Some(rx), Some(multiplier)) => BfdTimers::new(tx, rx, multiplier)
                .map(Some)
                .map_err(|e| ConfigError::device("bgp", e)),
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::invalid(
                "bgp.bfd",
                "bfd_tx, bfd_rx and bfd_multiplier must be set together",
            )),
        }
    }

    pub fn netconf_settings(&self) -> NetconfSettings {
        NetconfSettings {
            port: self.netconf.port,
            connect_timeout: self.connect_timeout(),
            request_timeout: self.request_timeout(),
            ssh_command: self
                .netconf
                .ssh_command
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_interval(), self.poll_timeout())
    }

    pub fn bgp_settings(&self) -> ConfigResult<BgpSettings> {
        Ok(BgpSettings {
            peer_group: self.bgp.peer_group.clone(),
            max_paths: self.bgp.max_paths,
            bfd: self.bfd_timers()?,
            multihop: self.bgp.multihop,
            allowas_in: self.bgp.allowas_in,
        })
    }

    /// Every device, in inventory order.
    pub fn targets(&self) -> ConfigResult<Vec<DeviceTarget>> {
        self.devices.iter().map(DeviceConfig::target).collect()
    }

    pub fn intents(&self) -> ConfigResult<Vec<SwitchIntent>> {
        self.devices
            .iter()
            .map(|device| device.intent(self.bgp.local_as, &self.system, &self.overlay))
            .collect()
    }
}
