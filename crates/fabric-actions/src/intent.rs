//! Desired per-switch state fed into the workflows.

use std::net::Ipv4Addr;

use fabric_common::Identified;
use fabric_device::adapter::{
    AnycastGatewayParams, BfdTimers, ClusterParams, EvpnInstanceParams, EvpnNeighborParams,
    MacArpParams, MtuParams, NumberedInterfaceParams, OverlayGatewayParams, StaticRouteParams,
    UnnumberedInterfaceParams, VeInterfaceParams,
};
use fabric_device::{DeviceResult, DeviceTarget};
use serde::{Deserialize, Serialize};

/// A BGP session as intended, or as read back from a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborIntent {
    pub address: Ipv4Addr,
    pub remote_as: u32,
}

impl NeighborIntent {
    pub fn new(address: Ipv4Addr, remote_as: u32) -> Self {
        Self { address, remote_as }
    }

    pub fn key(&self) -> String {
        self.address.to_string()
    }
}

// Neighbors read from a switch carry no persistent identity.
impl Identified for NeighborIntent {
    fn adopt_identity(&mut self, _from: &Self) {}
}

/// An EVPN peering, optionally sourced from a loopback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvpnPeerIntent {
    pub address: Ipv4Addr,
    pub remote_as: u32,
    /// Remote loopback `(number, address)` for platforms that peer over it.
    #[serde(default)]
    pub loopback: Option<(u32, Ipv4Addr)>,
}

impl EvpnPeerIntent {
    /// Builds adapter parameters with the platform's encapsulation.
    pub fn params(&self, encapsulation: &str, bfd: bool) -> DeviceResult<EvpnNeighborParams> {
        let params = EvpnNeighborParams::new(&self.address.to_string(), self.remote_as)?
            .with_bfd(bfd)
            .with_encapsulation(encapsulation);
        match self.loopback {
            Some((number, address)) => params.with_loopback(number, &address.to_string()),
            None => Ok(params),
        }
    }
}

/// Loopback interface carrying the router id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopbackIntent {
    pub id: u32,
    pub address: Ipv4Addr,
}

/// Fabric-wide BGP settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgpSettings {
    pub peer_group: String,
    pub max_paths: u32,
    pub bfd: Option<BfdTimers>,
    /// Hop count for unnumbered underlay sessions.
    pub multihop: Option<u8>,
    /// `allowas-in` on the EVPN peer group; `0` leaves it unset.
    pub allowas_in: u32,
}

impl Default for BgpSettings {
    fn default() -> Self {
        Self {
            peer_group: "spine-group".to_string(),
            max_paths: 8,
            bfd: None,
            multihop: None,
            allowas_in: 1,
        }
    }
}

/// System-wide MTUs; unset values are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemIntent {
    pub l2_mtu: Option<u32>,
    pub ip_mtu: Option<u32>,
}

impl SystemIntent {
    pub fn l2_mtu(&self) -> DeviceResult<Option<MtuParams>> {
        self.l2_mtu.map(MtuParams::l2).transpose()
    }

    pub fn ip_mtu(&self) -> DeviceResult<Option<MtuParams>> {
        self.ip_mtu.map(MtuParams::ip).transpose()
    }
}

/// MAC and ARP aging on a leaf, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacArpIntent {
    pub arp_aging_timeout: u32,
    /// Legacy MAC aging.
    pub mac_aging_timeout: u32,
    pub mac_conversational_timeout: u32,
    pub mac_move_limit: u32,
}

impl Default for MacArpIntent {
    fn default() -> Self {
        Self {
            arp_aging_timeout: 300,
            mac_aging_timeout: 1800,
            mac_conversational_timeout: 300,
            mac_move_limit: 20,
        }
    }
}

impl MacArpIntent {
    pub fn params(&self) -> DeviceResult<MacArpParams> {
        MacArpParams::new(
            self.arp_aging_timeout,
            self.mac_conversational_timeout,
            self.mac_aging_timeout,
            self.mac_move_limit,
        )
    }
}

/// VXLAN overlay of a leaf: gateway, EVPN instance, anycast gateway MACs
/// and MAC/ARP aging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayIntent {
    /// Names both the overlay gateway and the EVPN instance.
    pub name: String,
    pub vtep_loopback_id: u32,
    pub map_vni_auto: bool,
    pub anycast_mac: Option<String>,
    pub ipv6_anycast_mac: Option<String>,
    pub mac_arp: MacArpIntent,
    pub duplicate_mac_timer: u32,
    pub duplicate_mac_max_count: u32,
    /// The secondary node of an MCT pair receives the gateway through its
    /// principal and never gets one pushed directly.
    pub mct_secondary: bool,
}

impl OverlayIntent {
    /// Gateway type for a layer-2 extension overlay.
    pub const GATEWAY_TYPE: &'static str = "layer2-extension";

    pub fn new(name: impl Into<String>, vtep_loopback_id: u32) -> Self {
        Self {
            name: name.into(),
            vtep_loopback_id,
            map_vni_auto: true,
            anycast_mac: None,
            ipv6_anycast_mac: None,
            mac_arp: MacArpIntent::default(),
            duplicate_mac_timer: 5,
            duplicate_mac_max_count: 3,
            mct_secondary: false,
        }
    }

    pub fn gateway_params(&self) -> DeviceResult<OverlayGatewayParams> {
        OverlayGatewayParams::new(
            &self.name,
            Self::GATEWAY_TYPE,
            self.vtep_loopback_id,
            self.map_vni_auto,
        )
    }

    pub fn evpn_instance_params(&self) -> DeviceResult<EvpnInstanceParams> {
        EvpnInstanceParams::new(
            &self.name,
            self.duplicate_mac_timer,
            self.duplicate_mac_max_count,
        )
    }

    pub fn anycast_params(&self) -> DeviceResult<Option<AnycastGatewayParams>> {
        self.anycast_mac
            .as_deref()
            .map(|mac| AnycastGatewayParams::new(mac, self.ipv6_anycast_mac.as_deref()))
            .transpose()
    }
}

/// One side of an MCT data-plane cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIntent {
    pub name: String,
    pub id: u16,
    pub control_vlan: u16,
    pub control_ve: u16,
    pub peer_interface_type: String,
    pub peer_interface_name: String,
    /// Address of the peer on the control VE.
    pub peer_ip: Ipv4Addr,
    /// This node's control VE address, in CIDR form.
    pub local_ip: String,
    /// Reached through `peer_ip` with a host route when set.
    pub peer_loopback: Option<Ipv4Addr>,
}

impl ClusterIntent {
    /// Cluster parameters sourced from this node's control VE address.
    pub fn params(&self) -> DeviceResult<ClusterParams> {
        let source = self.local_ip.split('/').next().unwrap_or_default();
        ClusterParams::new(
            &self.name,
            self.id,
            self.control_vlan,
            &self.peer_interface_type,
            &self.peer_interface_name,
            &self.peer_ip.to_string(),
        )?
        .with_source_ip(source)
    }

    pub fn ve_params(&self, bfd: Option<BfdTimers>) -> DeviceResult<VeInterfaceParams> {
        let params = VeInterfaceParams::new(self.control_ve, &self.local_ip)?;
        Ok(match bfd {
            Some(bfd) => params.with_bfd(bfd),
            None => params,
        })
    }

    pub fn peer_route(&self) -> DeviceResult<Option<StaticRouteParams>> {
        self.peer_loopback
            .map(|lo| StaticRouteParams::new(&format!("{}/32", lo), &self.peer_ip.to_string()))
            .transpose()
    }
}

/// How a fabric link interface gets its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    Numbered {
        ip_address: String,
        description: Option<String>,
    },
    /// Borrows the address of `donor_type donor_name`, usually a loopback.
    Unnumbered {
        donor_type: String,
        donor_name: String,
    },
}

/// Validated parameters of one [`InterfaceIntent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceParams {
    Numbered(NumberedInterfaceParams),
    Unnumbered(UnnumberedInterfaceParams),
}

/// A physical fabric link interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceIntent {
    pub int_type: String,
    pub int_name: String,
    pub addressing: Addressing,
}

impl InterfaceIntent {
    pub fn numbered(int_type: &str, int_name: &str, ip_address: &str) -> Self {
        Self {
            int_type: int_type.to_string(),
            int_name: int_name.to_string(),
            addressing: Addressing::Numbered {
                ip_address: ip_address.to_string(),
                description: None,
            },
        }
    }

    pub fn unnumbered(int_type: &str, int_name: &str, donor_type: &str, donor_name: &str) -> Self {
        Self {
            int_type: int_type.to_string(),
            int_name: int_name.to_string(),
            addressing: Addressing::Unnumbered {
                donor_type: donor_type.to_string(),
                donor_name: donor_name.to_string(),
            },
        }
    }

    pub fn params(&self) -> DeviceResult<InterfaceParams> {
        Ok(match &self.addressing {
            Addressing::Numbered {
                ip_address,
                description,
            } => {
                let params = NumberedInterfaceParams::new(&self.int_type, &self.int_name, ip_address)?;
                InterfaceParams::Numbered(match description {
                    Some(description) => params.with_description(description.clone()),
                    None => params,
                })
            }
            Addressing::Unnumbered {
                donor_type,
                donor_name,
            } => InterfaceParams::Unnumbered(UnnumberedInterfaceParams::new(
                &self.int_type,
                &self.int_name,
                donor_type,
                donor_name,
            )?),
        })
    }
}

/// Everything the configure workflow should leave on one switch.
#[derive(Debug, Clone)]
pub struct SwitchIntent {
    pub target: DeviceTarget,
    pub local_as: u32,
    pub loopback: Option<LoopbackIntent>,
    /// Explicit router id; defaults to the loopback address.
    pub router_id: Option<Ipv4Addr>,
    /// Network statement advertised instead of redistributing connected routes.
    pub network: Option<String>,
    pub neighbors: Vec<NeighborIntent>,
    pub evpn_peers: Vec<EvpnPeerIntent>,
    pub system: SystemIntent,
    /// Link interfaces, addressed before BGP comes up.
    pub interfaces: Vec<InterfaceIntent>,
    /// Only applied to edge roles.
    pub overlay: Option<OverlayIntent>,
    pub cluster: Option<ClusterIntent>,
}

impl SwitchIntent {
    pub fn new(target: DeviceTarget, local_as: u32) -> Self {
        Self {
            target,
            local_as,
            loopback: None,
            router_id: None,
            network: None,
            neighbors: Vec::new(),
            evpn_peers: Vec::new(),
            system: SystemIntent::default(),
            interfaces: Vec::new(),
            overlay: None,
            cluster: None,
        }
    }

    /// The overlay, when this switch's role carries one.
    pub fn edge_overlay(&self) -> Option<&OverlayIntent> {
        self.overlay
            .as_ref()
            .filter(|_| self.target.role.is_edge())
    }

    pub fn effective_router_id(&self) -> Option<Ipv4Addr> {
        self.router_id
            .or_else(|| self.loopback.as_ref().map(|lo| lo.address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_device::Role;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_router_id_defaults_to_loopback() {
        let target = DeviceTarget::new("10.24.39.1", "admin", "pw", "4000_18r.1.01a", Role::Spine);
        let mut intent = SwitchIntent::new(target, 64512);
        assert_eq!(intent.effective_router_id(), None);

        intent.loopback = Some(LoopbackIntent {
            id: 1,
            address: Ipv4Addr::new(172, 31, 254, 1),
        });
        assert_eq!(
            intent.effective_router_id(),
            Some(Ipv4Addr::new(172, 31, 254, 1))
        );

        intent.router_id = Some(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(intent.effective_router_id(), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_evpn_peer_params() {
        let peer = EvpnPeerIntent {
            address: Ipv4Addr::new(10, 20, 20, 2),
            remote_as: 65000,
            loopback: Some((2, Ipv4Addr::new(172, 31, 254, 2))),
        };
        let params = peer.params("mpls", true).unwrap();
        assert_eq!(params.encapsulation, "mpls");
        assert_eq!(params.loopback_number, Some(2));
        assert!(params.bfd);
    }

    #[test]
    fn test_mac_arp_maps_legacy_and_conversational() {
        let params = MacArpIntent::default().params().unwrap();
        assert_eq!(params.arp_aging_timeout, 300);
        assert_eq!(params.mac_aging_timeout, 300);
        assert_eq!(params.mac_legacy_aging_timeout, 1800);
        assert_eq!(params.mac_move_limit, 20);
    }

    #[test]
    fn test_overlay_only_on_edge_roles() {
        let spine = DeviceTarget::new("10.24.39.1", "admin", "pw", "4000_18r.1.01a", Role::Spine);
        let mut intent = SwitchIntent::new(spine, 64512);
        intent.overlay = Some(OverlayIntent::new("fabric1", 2));
        assert!(intent.edge_overlay().is_none());

        intent.target.role = Role::Leaf;
        let overlay = intent.edge_overlay().unwrap();
        let gateway = overlay.gateway_params().unwrap();
        assert_eq!(gateway.gw_type, "layer2-extension");
        assert_eq!(gateway.loopback_id, 2);
        assert!(gateway.map_vni_auto);
        assert_eq!(overlay.anycast_params().unwrap(), None);
    }

    #[test]
    fn test_cluster_params_source_from_control_ve() {
        let cluster = ClusterIntent {
            name: "fabric1-cluster-1".to_string(),
            id: 1,
            control_vlan: 4090,
            control_ve: 4090,
            peer_interface_type: "Port-channel".to_string(),
            peer_interface_name: "1024".to_string(),
            peer_ip: Ipv4Addr::new(10, 20, 20, 1),
            local_ip: "10.20.20.0/31".to_string(),
            peer_loopback: Some(Ipv4Addr::new(172, 31, 254, 12)),
        };
        let params = cluster.params().unwrap();
        assert_eq!(params.source_ip, Some(Ipv4Addr::new(10, 20, 20, 0)));
        assert_eq!(params.peer_ip, Ipv4Addr::new(10, 20, 20, 1));

        let route = cluster.peer_route().unwrap().unwrap();
        assert_eq!(route.destination, "172.31.254.12/32");
        assert_eq!(route.next_hop, Ipv4Addr::new(10, 20, 20, 1));

        let ve = cluster.ve_params(None).unwrap();
        assert_eq!(ve.name, 4090);
        assert_eq!(ve.ip_address, "10.20.20.0/31");
    }

    #[test]
    fn test_interface_params_by_addressing() {
        let numbered = InterfaceIntent::numbered("ethernet", "0/1", "10.10.10.0/31");
        assert!(matches!(
            numbered.params().unwrap(),
            InterfaceParams::Numbered(p) if p.ip_address == "10.10.10.0/31"
        ));

        let unnumbered = InterfaceIntent::unnumbered("ethernet", "0/2", "loopback", "1");
        assert!(matches!(
            unnumbered.params().unwrap(),
            InterfaceParams::Unnumbered(p) if p.donor_name == "1"
        ));

        let bad = InterfaceIntent::numbered("ethernet", "0/1", "10.10.10.0");
        assert!(bad.params().is_err());
    }
}
