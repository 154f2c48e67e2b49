//! Typed, validated parameters for device operations.
//!
//! Every struct is built through a constructor that checks its values, so a
//! request builder never sees an out-of-range number or a malformed address.

use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceResult};

/// Smallest system-wide L2 MTU a switch accepts.
pub const L2_MTU_MIN: u32 = 1548;
/// Largest system-wide L2 MTU a switch accepts.
pub const L2_MTU_MAX: u32 = 9216;
/// Smallest system-wide IPv4/IPv6 MTU.
pub const IP_MTU_MIN: u32 = 1300;
/// Largest system-wide IPv4/IPv6 MTU.
pub const IP_MTU_MAX: u32 = 9194;
/// Highest VLAN id usable for control VLANs and VE interfaces.
pub const VLAN_MAX: u16 = 4090;

static DOTTED_MAC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{4}\.[0-9A-Fa-f]{4}\.[0-9A-Fa-f]{4}$").expect("Invalid regex pattern")
});

static INTERFACE_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*$").expect("Invalid regex pattern")
});

static COLON_MAC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("Invalid regex pattern")
});

pub(crate) fn parse_ipv4(field: &str, value: &str) -> DeviceResult<Ipv4Addr> {
    value
        .trim()
        .parse()
        .map_err(|_| DeviceError::invalid_param(field, format!("'{}' is not an IPv4 address", value)))
}

/// Checks `a.b.c.d/len` and returns it normalised.
pub(crate) fn parse_cidr(field: &str, value: &str) -> DeviceResult<String> {
    let invalid = || DeviceError::invalid_param(field, format!("'{}' is not an IPv4 prefix", value));
    let (addr, len) = value.trim().split_once('/').ok_or_else(invalid)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let len: u8 = len.parse().map_err(|_| invalid())?;
    if len > 32 {
        return Err(invalid());
    }
    Ok(format!("{}/{}", addr, len))
}

fn check_asn(field: &str, asn: u32) -> DeviceResult<u32> {
    if asn == 0 {
        return Err(DeviceError::invalid_param(
            field,
            "must be between 1 and 4294967295",
        ));
    }
    Ok(asn)
}

fn check_name(field: &str, value: &str) -> DeviceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DeviceError::invalid_param(field, "must not be empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(DeviceError::invalid_param(field, "must not contain whitespace"));
    }
    Ok(value.to_string())
}

fn check_range(field: &str, value: u32, min: u32, max: u32) -> DeviceResult<u32> {
    if value < min || value > max {
        return Err(DeviceError::invalid_param(
            field,
            format!("{} is outside {}..={}", value, min, max),
        ));
    }
    Ok(value)
}

fn check_vlan(field: &str, vlan: u16) -> DeviceResult<u16> {
    if vlan == 0 || vlan > VLAN_MAX {
        return Err(DeviceError::invalid_param(
            field,
            format!("{} is outside 1..={}", vlan, VLAN_MAX),
        ));
    }
    Ok(vlan)
}

/// Interface types become element names, so only lowercase tokens pass.
fn check_interface_type(field: &str, value: &str) -> DeviceResult<String> {
    let value = value.trim().to_ascii_lowercase();
    if !INTERFACE_TYPE_RE.is_match(&value) {
        return Err(DeviceError::invalid_param(
            field,
            format!("'{}' is not an interface type", value),
        ));
    }
    Ok(value)
}

pub(crate) fn check_mac(field: &str, value: &str) -> DeviceResult<String> {
    let value = value.trim();
    if DOTTED_MAC_RE.is_match(value) || COLON_MAC_RE.is_match(value) {
        Ok(value.to_ascii_lowercase())
    } else {
        Err(DeviceError::invalid_param(
            field,
            format!("'{}' is not a MAC address", value),
        ))
    }
}

/// BFD session timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BfdTimers {
    pub min_tx: u32,
    pub min_rx: u32,
    pub multiplier: u32,
}

impl BfdTimers {
    pub fn new(min_tx: u32, min_rx: u32, multiplier: u32) -> DeviceResult<Self> {
        Ok(Self {
            min_tx: check_range("bfd_min_tx", min_tx, 50, 30000)?,
            min_rx: check_range("bfd_min_rx", min_rx, 50, 30000)?,
            multiplier: check_range("bfd_multiplier", multiplier, 3, 50)?,
        })
    }
}

/// How connected routes reach BGP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redistribution {
    /// Advertise one network statement.
    Network(String),
    /// `redistribute connected`.
    Connected,
    /// `redistribute connected route-map <name>`.
    ConnectedWithRouteMap(String),
    None,
}

/// EVPN peer group settings under `address-family l2vpn evpn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvpnPeerGroup {
    pub retain_route_target_all: bool,
    pub next_hop_unchanged: bool,
    /// `0` leaves `allowas-in` unset.
    pub allowas_in: u32,
}

/// Parameters for `router bgp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterBgpParams {
    pub local_as: u32,
    pub peer_group: String,
    pub peer_group_description: String,
    pub max_paths: u32,
    pub bfd: Option<BfdTimers>,
    pub redistribution: Redistribution,
    pub evpn: Option<EvpnPeerGroup>,
}

impl RouterBgpParams {
    pub fn new(local_as: u32, peer_group: &str, max_paths: u32) -> DeviceResult<Self> {
        Ok(Self {
            local_as: check_asn("local_as", local_as)?,
            peer_group: check_name("peer_group", peer_group)?,
            peer_group_description: String::new(),
            max_paths: check_range("max_paths", max_paths, 1, 64)?,
            bfd: None,
            redistribution: Redistribution::None,
            evpn: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.peer_group_description = description.into();
        self
    }

    pub fn with_bfd(mut self, bfd: BfdTimers) -> Self {
        self.bfd = Some(bfd);
        self
    }

    pub fn with_network(mut self, network: &str) -> DeviceResult<Self> {
        self.redistribution = Redistribution::Network(parse_cidr("network", network)?);
        Ok(self)
    }

    pub fn with_redistribute_connected(mut self, route_map: Option<&str>) -> DeviceResult<Self> {
        self.redistribution = match route_map {
            Some(name) => Redistribution::ConnectedWithRouteMap(check_name("route_map", name)?),
            None => Redistribution::Connected,
        };
        Ok(self)
    }

    pub fn with_evpn(mut self, evpn: EvpnPeerGroup) -> Self {
        self.evpn = Some(evpn);
        self
    }
}

/// Parameters for a BGP underlay neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpNeighborParams {
    pub address: Ipv4Addr,
    pub remote_as: u32,
    pub peer_group: String,
    /// Leaves set `remote-as` on the peer group instead of the neighbor.
    pub is_leaf: bool,
    pub multihop: Option<u8>,
    /// Unnumbered neighbors advertise themselves as next hop.
    pub next_hop_self: bool,
}

impl BgpNeighborParams {
    pub fn new(address: &str, remote_as: u32, peer_group: &str) -> DeviceResult<Self> {
        Ok(Self {
            address: parse_ipv4("neighbor_address", address)?,
            remote_as: check_asn("remote_as", remote_as)?,
            peer_group: check_name("peer_group", peer_group)?,
            is_leaf: false,
            multihop: None,
            next_hop_self: false,
        })
    }

    pub fn leaf(mut self, is_leaf: bool) -> Self {
        self.is_leaf = is_leaf;
        self
    }

    pub fn with_multihop(mut self, hops: u8, next_hop_self: bool) -> DeviceResult<Self> {
        if hops == 0 {
            return Err(DeviceError::invalid_param("multihop", "must be at least 1"));
        }
        self.multihop = Some(hops);
        self.next_hop_self = next_hop_self;
        Ok(self)
    }
}

/// Parameters for the EVPN neighbor towards an MCT peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvpnNeighborParams {
    pub address: Ipv4Addr,
    pub remote_as: u32,
    pub bfd: bool,
    /// EVPN encapsulation; empty leaves the device default.
    pub encapsulation: String,
    /// Loopback interface number used as update source.
    pub loopback_number: Option<u32>,
    /// Peer loopback address, used by platforms that peer over loopbacks.
    pub loopback_address: Option<Ipv4Addr>,
}

impl EvpnNeighborParams {
    pub fn new(address: &str, remote_as: u32) -> DeviceResult<Self> {
        Ok(Self {
            address: parse_ipv4("neighbor_address", address)?,
            remote_as: check_asn("remote_as", remote_as)?,
            bfd: false,
            encapsulation: String::new(),
            loopback_number: None,
            loopback_address: None,
        })
    }

    pub fn with_bfd(mut self, bfd: bool) -> Self {
        self.bfd = bfd;
        self
    }

    /// Usually the adapter's [`evpn_neighbor_encap_type`].
    ///
    /// [`evpn_neighbor_encap_type`]: crate::adapter::DeviceAdapter::evpn_neighbor_encap_type
    pub fn with_encapsulation(mut self, encapsulation: &str) -> Self {
        self.encapsulation = encapsulation.trim().to_string();
        self
    }

    pub fn with_loopback(mut self, number: u32, address: &str) -> DeviceResult<Self> {
        self.loopback_number = Some(check_range("loopback_number", number, 1, 255)?);
        self.loopback_address = Some(parse_ipv4("loopback_address", address)?);
        Ok(self)
    }
}

/// Parameters for an MCT cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterParams {
    pub name: String,
    pub id: u16,
    pub control_vlan: u16,
    pub peer_interface_type: String,
    pub peer_interface_name: String,
    pub peer_ip: Ipv4Addr,
    pub source_ip: Option<Ipv4Addr>,
}

impl ClusterParams {
    pub fn new(
        name: &str,
        id: u16,
        control_vlan: u16,
        peer_interface_type: &str,
        peer_interface_name: &str,
        peer_ip: &str,
    ) -> DeviceResult<Self> {
        if id == 0 {
            return Err(DeviceError::invalid_param("cluster_id", "must be at least 1"));
        }
        Ok(Self {
            name: check_name("cluster_name", name)?,
            id,
            control_vlan: check_vlan("control_vlan", control_vlan)?,
            peer_interface_type: check_name("peer_interface_type", peer_interface_type)?,
            peer_interface_name: check_name("peer_interface_name", peer_interface_name)?,
            peer_ip: parse_ipv4("peer_ip", peer_ip)?,
            source_ip: None,
        })
    }

    pub fn with_source_ip(mut self, source_ip: &str) -> DeviceResult<Self> {
        self.source_ip = Some(parse_ipv4("source_ip", source_ip)?);
        Ok(self)
    }
}

/// Parameters for a loopback interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackParams {
    pub id: u32,
    pub ip_address: String,
}

impl LoopbackParams {
    pub fn new(id: u32, ip_address: &str) -> DeviceResult<Self> {
        Ok(Self {
            id: check_range("loopback_id", id, 1, 255)?,
            ip_address: parse_cidr("ip_address", ip_address)?,
        })
    }
}

/// Parameters for a routed VE interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VeInterfaceParams {
    pub name: u16,
    pub ip_address: String,
    pub bfd: Option<BfdTimers>,
}

impl VeInterfaceParams {
    pub fn new(name: u16, ip_address: &str) -> DeviceResult<Self> {
        Ok(Self {
            name: check_vlan("ve", name)?,
            ip_address: parse_cidr("ip_address", ip_address)?,
            bfd: None,
        })
    }

    pub fn with_bfd(mut self, bfd: BfdTimers) -> Self {
        self.bfd = Some(bfd);
        self
    }
}

/// MAC and ARP aging parameters, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacArpParams {
    pub arp_aging_timeout: u32,
    pub mac_aging_timeout: u32,
    pub mac_legacy_aging_timeout: u32,
    pub mac_move_limit: u32,
}

impl MacArpParams {
    pub fn new(
        arp_aging_timeout: u32,
        mac_aging_timeout: u32,
        mac_legacy_aging_timeout: u32,
        mac_move_limit: u32,
    ) -> DeviceResult<Self> {
        Ok(Self {
            arp_aging_timeout: check_range("arp_aging_timeout", arp_aging_timeout, 60, 100000)?,
            mac_aging_timeout: check_range("mac_aging_timeout", mac_aging_timeout, 0, 86400)?,
            mac_legacy_aging_timeout: check_range(
                "mac_legacy_aging_timeout",
                mac_legacy_aging_timeout,
                0,
                86400,
            )?,
            mac_move_limit: check_range("mac_move_limit", mac_move_limit, 5, 500)?,
        })
    }
}

/// Anycast gateway MACs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnycastGatewayParams {
    pub ipv4_mac: String,
    pub ipv6_mac: Option<String>,
}

impl AnycastGatewayParams {
    pub fn new(ipv4_mac: &str, ipv6_mac: Option<&str>) -> DeviceResult<Self> {
        Ok(Self {
            ipv4_mac: check_mac("ipv4_anycast_mac", ipv4_mac)?,
            ipv6_mac: ipv6_mac
                .map(|mac| check_mac("ipv6_anycast_mac", mac))
                .transpose()?,
        })
    }
}

/// A physical interface addressed with its own IPv4 prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedInterfaceParams {
    pub int_type: String,
    pub int_name: String,
    pub ip_address: String,
    pub description: Option<String>,
}

impl NumberedInterfaceParams {
    pub fn new(int_type: &str, int_name: &str, ip_address: &str) -> DeviceResult<Self> {
        Ok(Self {
            int_type: check_interface_type("int_type", int_type)?,
            int_name: check_name("int_name", int_name)?,
            ip_address: parse_cidr("ip_address", ip_address)?,
            description: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A physical interface borrowing the address of a donor interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnnumberedInterfaceParams {
    pub int_type: String,
    pub int_name: String,
    pub donor_type: String,
    pub donor_name: String,
}

impl UnnumberedInterfaceParams {
    pub fn new(
        int_type: &str,
        int_name: &str,
        donor_type: &str,
        donor_name: &str,
    ) -> DeviceResult<Self> {
        Ok(Self {
            int_type: check_interface_type("int_type", int_type)?,
            int_name: check_name("int_name", int_name)?,
            donor_type: check_interface_type("donor_type", donor_type)?,
            donor_name: check_name("donor_name", donor_name)?,
        })
    }
}

/// A static IPv4 route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRouteParams {
    pub destination: String,
    pub next_hop: Ipv4Addr,
}

impl StaticRouteParams {
    pub fn new(destination: &str, next_hop: &str) -> DeviceResult<Self> {
        Ok(Self {
            destination: parse_cidr("destination", destination)?,
            next_hop: parse_ipv4("next_hop", next_hop)?,
        })
    }
}

/// A system-wide MTU value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MtuParams {
    pub mtu: u32,
}

impl MtuParams {
    pub fn l2(mtu: u32) -> DeviceResult<Self> {
        Ok(Self {
            mtu: check_range("l2_mtu", mtu, L2_MTU_MIN, L2_MTU_MAX)?,
        })
    }

    pub fn ip(mtu: u32) -> DeviceResult<Self> {
        Ok(Self {
            mtu: check_range("ip_mtu", mtu, IP_MTU_MIN, IP_MTU_MAX)?,
        })
    }
}

/// Parameters for the VXLAN overlay gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayGatewayParams {
    pub name: String,
    pub gw_type: String,
    pub loopback_id: u32,
    pub map_vni_auto: bool,
}

impl OverlayGatewayParams {
    pub fn new(name: &str, gw_type: &str, loopback_id: u32, map_vni_auto: bool) -> DeviceResult<Self> {
        Ok(Self {
            name: check_name("gateway_name", name)?,
            gw_type: check_name("gateway_type", gw_type)?,
            loopback_id: check_range("loopback_id", loopback_id, 1, 255)?,
            map_vni_auto,
        })
    }
}

/// Parameters for an EVPN instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvpnInstanceParams {
    pub name: String,
    pub duplicate_mac_timer: u32,
    pub duplicate_mac_max_count: u32,
}

impl EvpnInstanceParams {
    pub fn new(name: &str, duplicate_mac_timer: u32, duplicate_mac_max_count: u32) -> DeviceResult<Self> {
        Ok(Self {
            name: check_name("evpn_instance", name)?,
            duplicate_mac_timer: check_range("duplicate_mac_timer", duplicate_mac_timer, 5, 300)?,
            duplicate_mac_max_count: check_range(
                "duplicate_mac_max_count",
                duplicate_mac_max_count,
                3,
                10,
            )?,
        })
    }
}

/// Parameters for the switch host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostNameParams {
    pub host_name: String,
}

impl HostNameParams {
    pub fn new(host_name: &str) -> DeviceResult<Self> {
        let host_name = check_name("host_name", host_name)?;
        if host_name.len() > 63 {
            return Err(DeviceError::invalid_param(
                "host_name",
                "must be at most 63 characters",
            ));
        }
        Ok(Self { host_name })
    }
}
