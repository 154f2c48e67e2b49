//! Read-back records parsed from device replies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceResult};
use crate::xml::XmlElement;

fn text(node: &XmlElement, name: &str) -> Option<String> {
    node.find_text(name)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Identity of a switch as reported by the switch itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDetail {
    /// `<switch-type>_<os-version>`, directly usable for adapter resolution.
    pub model: String,
    pub firmware_version: String,
}

impl DeviceDetail {
    /// Combines the chassis and firmware replies.
    pub fn from_replies(chassis: &str, firmware: &str) -> DeviceResult<Self> {
        let chassis = XmlElement::parse(chassis)?;
        let firmware = XmlElement::parse(firmware)?;
        let switch_type = text(&chassis, "switch-type")
            .ok_or_else(|| DeviceError::parse("chassis reply", "missing switch-type"))?;
        let os_version = text(&firmware, "os-version").unwrap_or_default();
        Ok(Self {
            model: format!("{}_{}", switch_type, os_version),
            firmware_version: text(&firmware, "firmware-full-version").unwrap_or_default(),
        })
    }
}

/// `bfd interval` timers as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BfdConfig {
    pub min_tx: String,
    pub min_rx: String,
    pub multiplier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpPeerGroupConfig {
    pub name: String,
    pub description: Option<String>,
    pub bfd: bool,
    pub remote_as: Option<String>,
    pub multihop: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpNeighborConfig {
    pub address: String,
    pub remote_as: Option<String>,
    pub peer_group: Option<String>,
    pub multihop: Option<String>,
    pub next_hop_self: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvpnNeighborConfig {
    /// Neighbor address, or the peer group name for group entries.
    pub name: String,
    pub is_peer_group: bool,
    pub encapsulation: Option<String>,
    pub allowas_in: Option<String>,
    pub next_hop_unchanged: bool,
    pub activate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvpnConfig {
    pub graceful_restart: bool,
    pub retain_route_target_all: bool,
    pub neighbors: Vec<EvpnNeighborConfig>,
}

/// Running `router bgp` configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpConfig {
    pub local_as: Option<String>,
    pub networks: Vec<String>,
    pub ipv4_peer_groups: Vec<String>,
    pub max_paths: Option<String>,
    pub bfd: Option<BfdConfig>,
    pub peer_groups: Vec<BgpPeerGroupConfig>,
    pub neighbors: Vec<BgpNeighborConfig>,
    pub evpn: Option<EvpnConfig>,
}

impl BgpConfig {
    pub fn from_reply(reply: &str) -> DeviceResult<Self> {
        let doc = XmlElement::parse(reply)?;
        let Some(bgp) = doc.find("router-bgp") else {
            return Ok(Self::default());
        };

        let bfd = bgp
            .path(&["router-bgp-attributes", "bfd", "interval"])
            .map(|interval| BfdConfig {
                min_tx: interval.find_text_or_empty("min-tx"),
                min_rx: interval.find_text_or_empty("min-rx"),
                multiplier: interval.find_text_or_empty("multiplier"),
            });

        let peer_groups = bgp
            .find_all("neighbor-peer-grp")
            .into_iter()
            .map(|grp| BgpPeerGroupConfig {
                name: grp.find_text_or_empty("router-bgp-neighbor-peer-grp"),
                description: text(grp, "description"),
                bfd: grp.find("bfd-enable").is_some(),
                remote_as: text(grp, "remote-as"),
                multihop: text(grp, "ebgp-multihop-count"),
            })
            .collect();

        let neighbors = bgp
            .find_all("neighbor-addr")
            .into_iter()
            .map(|addr| BgpNeighborConfig {
                address: addr.find_text_or_empty("router-bgp-neighbor-address"),
                remote_as: text(addr, "remote-as"),
                peer_group: text(addr, "associate-peer-group"),
                multihop: text(addr, "ebgp-multihop-count"),
                next_hop_self: addr.find("next-hop-self-status").is_some(),
            })
            .collect();

        let evpn = bgp
            .path(&["address-family", "l2vpn", "evpn"])
            .map(|evpn| {
                let groups = evpn.find_all("evpn-peer-group").into_iter().map(|grp| {
                    EvpnNeighborConfig {
                        name: grp.find_text_or_empty("evpn-neighbor-peergroup-name"),
                        is_peer_group: true,
                        encapsulation: text(grp, "encapsulation"),
                        allowas_in: text(grp, "allowas-in"),
                        next_hop_unchanged: grp.find("next-hop-unchanged").is_some(),
                        activate: grp.find("activate").is_some(),
                    }
                });
                let addresses = evpn.find_all("evpn-neighbor-ipv4").into_iter().map(|nbr| {
                    EvpnNeighborConfig {
                        name: nbr.find_text_or_empty("evpn-neighbor-ipv4-address"),
                        is_peer_group: false,
                        encapsulation: text(nbr, "encapsulation"),
                        allowas_in: text(nbr, "allowas-in"),
                        next_hop_unchanged: nbr.find("next-hop-unchanged").is_some(),
                        activate: nbr.find("activate").is_some(),
                    }
                });
                EvpnConfig {
                    graceful_restart: evpn.child("graceful-restart").is_some(),
                    retain_route_target_all: evpn.path(&["retain", "route-target", "all"]).is_some(),
                    neighbors: groups.chain(addresses).collect(),
                }
            });

        Ok(Self {
            local_as: text(bgp, "local-as"),
            networks: bgp
                .find_all("network-ipv4-address")
                .into_iter()
                .map(|n| n.text.trim().to_string())
                .collect(),
            ipv4_peer_groups: bgp
                .find_all("af-ipv4-neighbor-peergroup-name")
                .into_iter()
                .map(|n| n.text.trim().to_string())
                .collect(),
            max_paths: text(bgp, "load-sharing-value"),
            bfd,
            peer_groups,
            neighbors,
            evpn,
        })
    }

    /// Configured underlay neighbor addresses.
    pub fn neighbor_addresses(&self) -> Vec<&str> {
        self.neighbors.iter().map(|n| n.address.as_str()).collect()
    }
}

/// A loopback interface and its address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopbackConfig {
    pub id: u32,
    pub ip_address: Option<String>,
}

impl LoopbackConfig {
    /// Parses every loopback in the reply, keeping the ids in `wanted`
    /// (all of them when `wanted` is empty).
    pub fn from_reply(reply: &str, wanted: &[u32]) -> DeviceResult<Vec<Self>> {
        let doc = XmlElement::parse(reply)?;
        let mut out = Vec::new();
        for lo in doc.find_all("loopback") {
            let Some(id) = lo.child_text("id").and_then(|id| id.trim().parse::<u32>().ok()) else {
                continue;
            };
            if !wanted.is_empty() && !wanted.contains(&id) {
                continue;
            }
            let ip_address = lo
                .find("address")
                .and_then(|outer| outer.child_text("address"))
                .map(|a| a.trim().to_string());
            out.push(Self { id, ip_address });
        }
        Ok(out)
    }
}

/// A routed VE interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VeInterfaceConfig {
    pub name: u16,
    pub ip_address: Option<String>,
    pub shutdown: bool,
}

impl VeInterfaceConfig {
    pub fn from_reply(reply: &str, name: u16) -> DeviceResult<Self> {
        let doc = XmlElement::parse(reply)?;
        let ip_address = doc
            .find("address")
            .and_then(|outer| outer.child_text("address"))
            .map(|a| a.trim().to_string());
        Ok(Self {
            name,
            ip_address,
            shutdown: doc.find("shutdown").is_some(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnycastGatewayConfig {
    pub ipv4_mac: Option<String>,
    pub ipv6_mac: Option<String>,
}

impl AnycastGatewayConfig {
    pub fn from_reply(reply: &str) -> DeviceResult<Self> {
        let doc = XmlElement::parse(reply)?;
        Ok(Self {
            ipv4_mac: text(&doc, "ip-anycast-gateway-mac"),
            ipv6_mac: text(&doc, "ipv6-anycast-gateway-mac"),
        })
    }
}

/// ARP aging as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpConfig {
    pub conversational: bool,
    pub conversational_timeout: Option<String>,
}

impl ArpConfig {
    pub fn from_reply(reply: &str) -> DeviceResult<Self> {
        let doc = XmlElement::parse(reply)?;
        Ok(Self {
            conversational: doc
                .find("aging-mode")
                .and_then(|mode| mode.child("conversational"))
                .is_some(),
            conversational_timeout: text(&doc, "conversational-timeout"),
        })
    }
}

/// MAC aging and learning as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacConfig {
    pub learning_mode: Option<String>,
    pub conversational_timeout: Option<String>,
    pub legacy_timeout: Option<String>,
    pub move_limit: Option<String>,
}

impl MacConfig {
    pub fn from_reply(reply: &str) -> DeviceResult<Self> {
        let doc = XmlElement::parse(reply)?;
        Ok(Self {
            learning_mode: text(&doc, "learning-mode"),
            conversational_timeout: text(&doc, "conversational-time-out"),
            legacy_timeout: text(&doc, "legacy-time-out"),
            move_limit: text(&doc, "mac-move-limit"),
        })
    }
}

/// Static routes keyed by destination prefix.
pub fn parse_static_routes(reply: &str) -> DeviceResult<BTreeMap<String, String>> {
    let doc = XmlElement::parse(reply)?;
    Ok(doc
        .find_all("static-route-nh")
        .into_iter()
        .filter_map(|nh| {
            let dest = nh.child_text("static-route-dest")?.trim().to_string();
            let next_hop = nh.child_text("static-route-next-hop")?.trim().to_string();
            Some((dest, next_hop))
        })
        .collect())
}

/// The configured MCT cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub id: String,
    pub control_vlan: Option<String>,
    pub peer_interface_type: Option<String>,
    pub peer_interface_name: Option<String>,
    pub peer_ip: Option<String>,
    pub source_ip: Option<String>,
    pub df_load_balance: bool,
    pub client_isolation_loose: bool,
    pub deploy: bool,
}

impl ClusterConfig {
    /// Returns `None` when no cluster is configured.
    pub fn from_reply(reply: &str) -> DeviceResult<Option<Self>> {
        let doc = XmlElement::parse(reply)?;
        let Some(cluster) = doc.find("cluster") else {
            return Ok(None);
        };
        let Some(name) = text(cluster, "cluster-name") else {
            return Ok(None);
        };
        Ok(Some(Self {
            name,
            id: cluster.find_text_or_empty("cluster-id").trim().to_string(),
            control_vlan: text(cluster, "cluster-control-vlan"),
            peer_interface_type: text(cluster, "peer-if-type"),
            peer_interface_name: text(cluster, "peer-if-name"),
            peer_ip: text(cluster, "peer-ip"),
            source_ip: text(cluster, "source_ip"),
            df_load_balance: cluster.find("df-load-balance").is_some(),
            client_isolation_loose: cluster
                .find("client-isolation")
                .and_then(|c| c.child("loose"))
                .is_some(),
            deploy: cluster.find("deploy").is_some(),
        }))
    }
}

/// One node of the management cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub serial_number: String,
    pub switch_mac: String,
    pub mgmt_ip: String,
    pub internal_ip: String,
    pub node_id: String,
    pub condition: String,
    pub status: String,
    pub is_principal: bool,
    pub is_local: bool,
    pub switch_type: String,
    pub firmware_version: String,
}

/// Output of `show cluster management`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementClusterStatus {
    pub principal_switch_mac: String,
    /// Raw node count as reported; see [`ManagementClusterStatus::total_nodes`].
    pub total_nodes_in_cluster: String,
    pub nodes_disconnected: String,
    pub members: Vec<ClusterMember>,
}

impl ManagementClusterStatus {
    pub fn from_reply(reply: &str) -> DeviceResult<Self> {
        let doc = XmlElement::parse(reply)?;
        let members = doc
            .find_all("cluster-node-info")
            .into_iter()
            .map(|node| ClusterMember {
                serial_number: node.find_text_or_empty("node-serial-num"),
                switch_mac: node.find_text_or_empty("node-switch-mac"),
                mgmt_ip: node.find_text_or_empty("node-public-ip-address"),
                internal_ip: node.find_text_or_empty("node-internal-ip-address"),
                node_id: node.find_text_or_empty("node-id"),
                condition: node.find_text_or_empty("node-condition"),
                status: node.find_text_or_empty("node-status"),
                is_principal: node.find_text("node-is-principal").map(str::trim) == Some("true"),
                is_local: node.find_text("node-is-local").map(str::trim) == Some("true"),
                switch_type: node.find_text_or_empty("node-switchtype"),
                firmware_version: node.find_text_or_empty("firmware-version"),
            })
            .collect();

        Ok(Self {
            principal_switch_mac: doc.find_text_or_empty("principal-switch-mac"),
            total_nodes_in_cluster: text(&doc, "total-nodes-in-cluster")
                .unwrap_or_else(|| "0".to_string()),
            nodes_disconnected: doc.find_text_or_empty("nodes-disconnected-from-cluster"),
            members,
        })
    }

    /// Node count; an unparsable count is an error rather than zero.
    pub fn total_nodes(&self) -> DeviceResult<usize> {
        self.total_nodes_in_cluster.trim().parse().map_err(|_| {
            DeviceError::parse(
                "total-nodes-in-cluster",
                format!("'{}' is not a number", self.total_nodes_in_cluster),
            )
        })
    }

    pub fn principal(&self) -> Option<&ClusterMember> {
        self.members.iter().find(|m| m.is_principal)
    }

    /// Management addresses of the operational members.
    pub fn member_ips(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.mgmt_ip.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayGatewayConfig {
    pub name: String,
    pub gw_type: Option<String>,
    pub loopback_id: Option<String>,
    pub vni_auto: bool,
    pub activate: bool,
}

impl OverlayGatewayConfig {
    pub fn from_reply(reply: &str) -> DeviceResult<Option<Self>> {
        let doc = XmlElement::parse(reply)?;
        let Some(gw) = doc.find("overlay-gateway") else {
            return Ok(None);
        };
        let Some(name) = text(gw, "name") else {
            return Ok(None);
        };
        Ok(Some(Self {
            name,
            gw_type: text(gw, "gw-type"),
            loopback_id: text(gw, "loopback-id"),
            vni_auto: gw.find("auto").is_some(),
            activate: gw.find("activate").is_some(),
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvpnInstanceConfig {
    pub name: String,
    pub duplicate_mac_timer: Option<String>,
    pub max_count: Option<String>,
    pub target_community: Option<String>,
    pub route_target_both: bool,
    pub ignore_as: bool,
}

impl EvpnInstanceConfig {
    pub fn from_reply(reply: &str) -> DeviceResult<Option<Self>> {
        let doc = XmlElement::parse(reply)?;
        let Some(name) = text(&doc, "instance-name") else {
            return Ok(None);
        };
        Ok(Some(Self {
            name,
            duplicate_mac_timer: text(&doc, "duplicate-mac-timer-value"),
            max_count: text(&doc, "max-count"),
            target_community: text(&doc, "target-community"),
            route_target_both: doc
                .find("route-target")
                .and_then(|rt| rt.child("both"))
                .is_some(),
            ignore_as: doc.find("ignore-as").is_some(),
        }))
    }
}

/// Normalises `0027.f8ca.7a01`, `00-27-F8-CA-7A-01` and colon forms to
/// lowercase colon-separated octets.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '.' | ':' | '-'))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let hex = hex.to_ascii_lowercase();
    let octets: Vec<&str> = (0..12).step_by(2).map(|i| &hex[i..i + 2]).collect();
    Some(octets.join(":"))
}

/// Line speed in Mbps; 0 when the device reports none.
pub fn parse_line_speed(raw: &str) -> u32 {
    let raw = raw.trim();
    let (digits, scale) = if let Some(g) = raw.strip_suffix("Gbps") {
        (g, 1000)
    } else if let Some(m) = raw.strip_suffix("Mbps") {
        (m, 1)
    } else {
        return 0;
    };
    digits.trim().parse::<u32>().map(|n| n * scale).unwrap_or(0)
}

fn has_more(doc: &XmlElement) -> bool {
    doc.find_text("has-more").map(str::trim) == Some("true")
}

/// Hardware address and line speed of one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceHardware {
    pub int_type: String,
    pub int_name: String,
    pub mac: Option<String>,
    pub speed_mbps: u32,
}

impl InterfaceHardware {
    /// Parses one page of the interface detail listing and whether another
    /// page follows.
    pub fn from_page(reply: &str) -> DeviceResult<(Vec<Self>, bool)> {
        let doc = XmlElement::parse(reply)?;
        let interfaces = doc
            .find_all("interface")
            .into_iter()
            .filter_map(|intf| {
                Some(Self {
                    int_type: text(intf, "interface-type")?.to_ascii_lowercase(),
                    int_name: text(intf, "interface-name")?,
                    mac: intf
                        .find_text("current-hardware-address")
                        .and_then(normalize_mac),
                    speed_mbps: intf
                        .find_text("actual-line-speed")
                        .map(parse_line_speed)
                        .unwrap_or(0),
                })
            })
            .collect();
        Ok((interfaces, has_more(&doc)))
    }
}

/// An ethernet, loopback or VE interface with its operational address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStatus {
    pub int_type: String,
    pub int_name: String,
    pub ip_address: Option<String>,
    pub mac: Option<String>,
    pub speed_mbps: u32,
    pub state: Option<String>,
}

impl InterfaceStatus {
    /// Joins the IP interface summary with the hardware listing.
    ///
    /// Only ethernet and loopback interfaces are kept, plus the VE named
    /// `control_ve` when given.
    pub fn from_reply(
        reply: &str,
        hardware: &[InterfaceHardware],
        control_ve: Option<u16>,
    ) -> DeviceResult<Vec<Self>> {
        let doc = XmlElement::parse(reply)?;
        let control_ve = control_ve.map(|ve| ve.to_string());
        let mut out = Vec::new();
        for intf in doc.find_all("interface") {
            let (Some(int_type), Some(int_name)) =
                (text(intf, "interface-type"), text(intf, "interface-name"))
            else {
                continue;
            };
            let int_type = int_type.to_ascii_lowercase();
            let wanted = match int_type.as_str() {
                "ethernet" | "loopback" => true,
                "ve" => control_ve.as_deref() == Some(int_name.as_str()),
                _ => false,
            };
            if !wanted {
                continue;
            }
            let hw = hardware
                .iter()
                .find(|hw| hw.int_type == int_type && hw.int_name == int_name);
            out.push(Self {
                ip_address: text(intf, "ipv4").filter(|ip| ip != "unassigned"),
                mac: hw.and_then(|hw| hw.mac.clone()),
                speed_mbps: hw.map(|hw| hw.speed_mbps).unwrap_or(0),
                state: text(intf, "if-state"),
                int_type,
                int_name,
            });
        }
        Ok(out)
    }
}

/// One LLDP adjacency as seen from the local switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LldpNeighbor {
    pub local_int_type: String,
    pub local_int_name: String,
    pub local_mac: Option<String>,
    pub remote_int_type: String,
    pub remote_int_name: String,
    pub remote_mac: Option<String>,
}

/// Expands the abbreviated interface type LLDP reports.
fn lldp_interface_type(short: &str) -> String {
    let full = if short.contains("Te") {
        "TenGigabitEthernet"
    } else if short.contains("Fo") {
        "FortyGigabitEthernet"
    } else if short.contains("Hu") {
        "HundredGigabitEthernet"
    } else if short.contains("Eth") {
        "Ethernet"
    } else {
        short
    };
    full.to_string()
}

impl LldpNeighbor {
    /// Parses one page of LLDP neighbors, the ifindex to resume after and
    /// whether another page follows.
    ///
    /// Entries whose remote port is not an `<type> <name>` pair, such as
    /// servers announcing a bare MAC, are skipped.
    pub fn from_page(reply: &str) -> DeviceResult<(Vec<Self>, Option<String>, bool)> {
        let doc = XmlElement::parse(reply)?;
        let mut last_ifindex = None;
        let mut out = Vec::new();
        for entry in doc.find_all("lldp-neighbor-detail") {
            if let Some(index) = text(entry, "local-interface-ifindex") {
                last_ifindex = Some(index);
            }
            let Some((local_type, local_name)) = text(entry, "local-interface-name")
                .and_then(|n| n.split_once(' ').map(|(t, n)| (t.to_string(), n.to_string())))
            else {
                continue;
            };
            let Some((remote_type, remote_name)) = text(entry, "remote-interface-name")
                .and_then(|n| n.split_once(' ').map(|(t, n)| (t.to_string(), n.to_string())))
            else {
                continue;
            };
            out.push(Self {
                local_int_type: lldp_interface_type(&local_type),
                local_int_name: local_name,
                local_mac: entry.find_text("local-interface-mac").and_then(normalize_mac),
                remote_int_type: remote_type,
                remote_int_name: remote_name,
                remote_mac: entry.find_text("remote-interface-mac").and_then(normalize_mac),
            });
        }
        Ok((out, last_ifindex, has_more(&doc)))
    }
}
