//! Device adapters: the operation surface a resolved driver exposes.
//!
//! Adapters are layered by explicit delegation. Each adapter holds its parent
//! and returns it from [`DeviceAdapter::delegate`]; every trait method it does
//! not override forwards there. The chain ends at [`PlatformBase`], whose
//! parent is `None`, so an operation nobody implements fails with
//! [`DeviceError::OperationUnsupported`] instead of silently doing nothing.
//!
//! ```text
//! PlatformBase
//! ├── RoutingBase
//! │   ├── Avalanche ── Avalanche18r2
//! │   └── Orca
//! └── SwitchingBase
//!     └── Cedar
//! ```

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DeviceError, DeviceResult};
use crate::transport::Transport;

pub mod params;
pub mod records;
pub mod templates;

mod avalanche;
mod cedar;
mod orca;
mod platform;
mod routing;
mod switching;

pub use avalanche::{Avalanche, Avalanche18r2};
pub use cedar::Cedar;
pub use orca::Orca;
pub use platform::PlatformBase;
pub use routing::RoutingBase;
pub use switching::SwitchingBase;

pub use params::{
    AnycastGatewayParams, BfdTimers, BgpNeighborParams, ClusterParams, EvpnInstanceParams,
    EvpnNeighborParams, EvpnPeerGroup, HostNameParams, LoopbackParams, MacArpParams, MtuParams,
    NumberedInterfaceParams, OverlayGatewayParams, Redistribution, RouterBgpParams,
    StaticRouteParams, UnnumberedInterfaceParams, VeInterfaceParams,
};
pub use records::{
    normalize_mac, AnycastGatewayConfig, ArpConfig, BfdConfig, BgpConfig, BgpNeighborConfig,
    BgpPeerGroupConfig, ClusterConfig, ClusterMember, DeviceDetail, EvpnConfig,
    EvpnInstanceConfig, EvpnNeighborConfig, InterfaceHardware, InterfaceStatus, LldpNeighbor,
    LoopbackConfig, MacConfig, ManagementClusterStatus, OverlayGatewayConfig, VeInterfaceConfig,
};

/// Sends edit-config requests in order, stopping at the first failure.
///
/// Returns the reply to the last request.
pub(crate) async fn apply_steps(
    transport: &mut dyn Transport,
    operation: &str,
    steps: Vec<String>,
) -> DeviceResult<String> {
    let total = steps.len();
    let mut reply = String::new();
    for (index, step) in steps.iter().enumerate() {
        debug!(
            host = %transport.host(),
            operation,
            step = index + 1,
            total,
            "Applying configuration step"
        );
        reply = transport.edit_config(step).await?;
    }
    Ok(reply)
}

fn parent<'a, A>(adapter: &'a A, operation: &str) -> DeviceResult<&'a dyn DeviceAdapter>
where
    A: DeviceAdapter + ?Sized,
{
    adapter
        .delegate()
        .ok_or_else(|| DeviceError::operation_unsupported(operation))
}

/// The full operation set of a switch driver.
///
/// Mutating operations return the reply body of their last request. Reads
/// re-query the device on every call and return typed records.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;

    /// The adapter this one inherits unimplemented operations from.
    fn delegate(&self) -> Option<&dyn DeviceAdapter> {
        None
    }

    // Identity and system

    async fn get_device_detail(&self, transport: &mut dyn Transport) -> DeviceResult<DeviceDetail> {
        parent(self, "get_device_detail")?
            .get_device_detail(transport)
            .await
    }

    async fn configure_router_id(
        &self,
        transport: &mut dyn Transport,
        router_id: Ipv4Addr,
    ) -> DeviceResult<String> {
        parent(self, "configure_router_id")?
            .configure_router_id(transport, router_id)
            .await
    }

    async fn unconfigure_router_id(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        parent(self, "unconfigure_router_id")?
            .unconfigure_router_id(transport)
            .await
    }

    async fn get_router_id(&self, transport: &mut dyn Transport) -> DeviceResult<Option<Ipv4Addr>> {
        parent(self, "get_router_id")?.get_router_id(transport).await
    }

    async fn configure_host_name(
        &self,
        transport: &mut dyn Transport,
        params: &HostNameParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_host_name")?
            .configure_host_name(transport, params)
            .await
    }

    async fn unconfigure_host_name(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        parent(self, "unconfigure_host_name")?
            .unconfigure_host_name(transport)
            .await
    }

    async fn configure_system_l2_mtu(
        &self,
        transport: &mut dyn Transport,
        params: &MtuParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_system_l2_mtu")?
            .configure_system_l2_mtu(transport, params)
            .await
    }

    async fn unconfigure_system_l2_mtu(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<String> {
        parent(self, "unconfigure_system_l2_mtu")?
            .unconfigure_system_l2_mtu(transport)
            .await
    }

    async fn configure_system_ip_mtu(
        &self,
        transport: &mut dyn Transport,
        params: &MtuParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_system_ip_mtu")?
            .configure_system_ip_mtu(transport, params)
            .await
    }

    async fn unconfigure_system_ip_mtu(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<String> {
        parent(self, "unconfigure_system_ip_mtu")?
            .unconfigure_system_ip_mtu(transport)
            .await
    }

    /// Copies running configuration to startup configuration.
    async fn persist_config(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        parent(self, "persist_config")?.persist_config(transport).await
    }

    // MAC and ARP

    async fn configure_mac_and_arp(
        &self,
        transport: &mut dyn Transport,
        params: &MacArpParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_mac_and_arp")?
            .configure_mac_and_arp(transport, params)
            .await
    }

    async fn unconfigure_mac_and_arp(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        parent(self, "unconfigure_mac_and_arp")?
            .unconfigure_mac_and_arp(transport)
            .await
    }

    async fn get_arp(&self, transport: &mut dyn Transport) -> DeviceResult<ArpConfig> {
        parent(self, "get_arp")?.get_arp(transport).await
    }

    async fn get_mac(&self, transport: &mut dyn Transport) -> DeviceResult<MacConfig> {
        parent(self, "get_mac")?.get_mac(transport).await
    }

    // Anycast gateway

    async fn configure_anycast_gateway(
        &self,
        transport: &mut dyn Transport,
        params: &AnycastGatewayParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_anycast_gateway")?
            .configure_anycast_gateway(transport, params)
            .await
    }

    async fn unconfigure_anycast_gateway(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<String> {
        parent(self, "unconfigure_anycast_gateway")?
            .unconfigure_anycast_gateway(transport)
            .await
    }

    async fn get_anycast_gateway(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<AnycastGatewayConfig> {
        parent(self, "get_anycast_gateway")?
            .get_anycast_gateway(transport)
            .await
    }

    // Static routes

    async fn configure_ip_route(
        &self,
        transport: &mut dyn Transport,
        params: &StaticRouteParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_ip_route")?
            .configure_ip_route(transport, params)
            .await
    }

    async fn deconfigure_ip_route(
        &self,
        transport: &mut dyn Transport,
        params: &StaticRouteParams,
    ) -> DeviceResult<String> {
        parent(self, "deconfigure_ip_route")?
            .deconfigure_ip_route(transport, params)
            .await
    }

    /// Static routes keyed by destination prefix.
    async fn get_ip_routes(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<BTreeMap<String, String>> {
        parent(self, "get_ip_routes")?.get_ip_routes(transport).await
    }

    // BGP and EVPN

    async fn configure_router_bgp(
        &self,
        transport: &mut dyn Transport,
        params: &RouterBgpParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_router_bgp")?
            .configure_router_bgp(transport, params)
            .await
    }

    async fn unconfigure_router_bgp(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        parent(self, "unconfigure_router_bgp")?
            .unconfigure_router_bgp(transport)
            .await
    }

    async fn get_router_bgp(&self, transport: &mut dyn Transport) -> DeviceResult<BgpConfig> {
        parent(self, "get_router_bgp")?.get_router_bgp(transport).await
    }

    async fn configure_bgp_neighbor(
        &self,
        transport: &mut dyn Transport,
        params: &BgpNeighborParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_bgp_neighbor")?
            .configure_bgp_neighbor(transport, params)
            .await
    }

    async fn unconfigure_bgp_neighbor(
        &self,
        transport: &mut dyn Transport,
        address: Ipv4Addr,
    ) -> DeviceResult<String> {
        parent(self, "unconfigure_bgp_neighbor")?
            .unconfigure_bgp_neighbor(transport, address)
            .await
    }

    /// Encapsulation this platform puts on EVPN neighbors.
    fn evpn_neighbor_encap_type(&self) -> &'static str {
        self.delegate()
            .map(|parent| parent.evpn_neighbor_encap_type())
            .unwrap_or_default()
    }

    async fn configure_evpn_neighbor(
        &self,
        transport: &mut dyn Transport,
        params: &EvpnNeighborParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_evpn_neighbor")?
            .configure_evpn_neighbor(transport, params)
            .await
    }

    async fn unconfigure_evpn_neighbor(
        &self,
        transport: &mut dyn Transport,
        params: &EvpnNeighborParams,
    ) -> DeviceResult<String> {
        parent(self, "unconfigure_evpn_neighbor")?
            .unconfigure_evpn_neighbor(transport, params)
            .await
    }

    // Interfaces

    async fn configure_loopback(
        &self,
        transport: &mut dyn Transport,
        params: &LoopbackParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_loopback")?
            .configure_loopback(transport, params)
            .await
    }

    async fn delete_loopback(&self, transport: &mut dyn Transport, id: u32) -> DeviceResult<String> {
        parent(self, "delete_loopback")?
            .delete_loopback(transport, id)
            .await
    }

    /// Loopbacks with the given ids; every loopback when `ids` is empty.
    async fn get_loopbacks(
        &self,
        transport: &mut dyn Transport,
        ids: &[u32],
    ) -> DeviceResult<Vec<LoopbackConfig>> {
        parent(self, "get_loopbacks")?
            .get_loopbacks(transport, ids)
            .await
    }

    async fn configure_interface_ve(
        &self,
        transport: &mut dyn Transport,
        params: &VeInterfaceParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_interface_ve")?
            .configure_interface_ve(transport, params)
            .await
    }

    async fn delete_interface_ve(
        &self,
        transport: &mut dyn Transport,
        name: u16,
    ) -> DeviceResult<String> {
        parent(self, "delete_interface_ve")?
            .delete_interface_ve(transport, name)
            .await
    }

    async fn get_interface_ve(
        &self,
        transport: &mut dyn Transport,
        name: u16,
    ) -> DeviceResult<VeInterfaceConfig> {
        parent(self, "get_interface_ve")?
            .get_interface_ve(transport, name)
            .await
    }

    // Physical interfaces and discovery

    async fn configure_interface_numbered(
        &self,
        transport: &mut dyn Transport,
        params: &NumberedInterfaceParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_interface_numbered")?
            .configure_interface_numbered(transport, params)
            .await
    }

    async fn unconfigure_interface_numbered(
        &self,
        transport: &mut dyn Transport,
        params: &NumberedInterfaceParams,
    ) -> DeviceResult<String> {
        parent(self, "unconfigure_interface_numbered")?
            .unconfigure_interface_numbered(transport, params)
            .await
    }

    async fn configure_interface_unnumbered(
        &self,
        transport: &mut dyn Transport,
        params: &UnnumberedInterfaceParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_interface_unnumbered")?
            .configure_interface_unnumbered(transport, params)
            .await
    }

    async fn unconfigure_interface_unnumbered(
        &self,
        transport: &mut dyn Transport,
        params: &UnnumberedInterfaceParams,
    ) -> DeviceResult<String> {
        parent(self, "unconfigure_interface_unnumbered")?
            .unconfigure_interface_unnumbered(transport, params)
            .await
    }

    /// Ethernet and loopback interfaces with address, MAC and speed; the
    /// VE named `control_ve` is included when given.
    async fn get_interfaces(
        &self,
        transport: &mut dyn Transport,
        control_ve: Option<u16>,
    ) -> DeviceResult<Vec<InterfaceStatus>> {
        parent(self, "get_interfaces")?
            .get_interfaces(transport, control_ve)
            .await
    }

    async fn get_lldp_neighbors(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<Vec<LldpNeighbor>> {
        parent(self, "get_lldp_neighbors")?
            .get_lldp_neighbors(transport)
            .await
    }

    // MCT cluster

    async fn configure_cluster(
        &self,
        transport: &mut dyn Transport,
        params: &ClusterParams,
    ) -> DeviceResult<String> {
        parent(self, "configure_cluster")?
            .configure_cluster(transport, params)
            .await
    }

    async fn delete_cluster(
        &self,
        transport: &mut dyn Transport,
        params: &ClusterParams,
    ) -> DeviceResult<String> {
        parent(self, "delete_cluster")?
            .delete_cluster(transport, params)
            .await
    }

    async fn get_cluster(&self, transport: &mut dyn Transport) -> DeviceResult<Option<ClusterConfig>> {
        parent(self, "get_cluster")?.get_cluster(transport).await
    }

    async fn get_management_cluster_status(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<ManagementClusterStatus> {
        parent(self, "get_management_cluster_status")?
            .get_management_cluster_status(transport)
            .await
    }

    // Overlay

    async fn create_overlay_gateway(
        &self,
        transport: &mut dyn Transport,
        params: &OverlayGatewayParams,
    ) -> DeviceResult<String> {
        parent(self, "create_overlay_gateway")?
            .create_overlay_gateway(transport, params)
            .await
    }

    async fn delete_overlay_gateway(
        &self,
        transport: &mut dyn Transport,
        name: &str,
    ) -> DeviceResult<String> {
        parent(self, "delete_overlay_gateway")?
            .delete_overlay_gateway(transport, name)
            .await
    }

    async fn get_overlay_gateway(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<Option<OverlayGatewayConfig>> {
        parent(self, "get_overlay_gateway")?
            .get_overlay_gateway(transport)
            .await
    }

    async fn create_evpn_instance(
        &self,
        transport: &mut dyn Transport,
        params: &EvpnInstanceParams,
    ) -> DeviceResult<String> {
        parent(self, "create_evpn_instance")?
            .create_evpn_instance(transport, params)
            .await
    }

    async fn delete_evpn_instance(
        &self,
        transport: &mut dyn Transport,
        name: &str,
    ) -> DeviceResult<String> {
        parent(self, "delete_evpn_instance")?
            .delete_evpn_instance(transport, name)
            .await
    }

    async fn get_evpn_instance(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<Option<EvpnInstanceConfig>> {
        parent(self, "get_evpn_instance")?
            .get_evpn_instance(transport)
            .await
    }
}

impl std::fmt::Debug for dyn DeviceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAdapter")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use async_trait::async_trait;

    use crate::error::DeviceResult;
    use crate::transport::Transport;

    /// Request kinds seen by [`RecordingTransport`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Kind {
        Get,
        Edit,
        Rpc,
    }

    /// Records every request and answers from a reply queue, `<ok/>` once empty.
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        pub requests: Vec<(Kind, String)>,
        pub replies: VecDeque<String>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_replies(replies: &[&str]) -> Self {
            Self {
                requests: Vec::new(),
                replies: replies.iter().map(|r| r.to_string()).collect(),
            }
        }

        pub fn edits(&self) -> Vec<&str> {
            self.requests
                .iter()
                .filter(|(kind, _)| *kind == Kind::Edit)
                .map(|(_, body)| body.as_str())
                .collect()
        }

        fn answer(&mut self, kind: Kind, body: &str) -> DeviceResult<String> {
            self.requests.push((kind, body.to_string()));
            Ok(self
                .replies
                .pop_front()
                .unwrap_or_else(|| "<ok/>".to_string()))
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn host(&self) -> &str {
            "10.24.39.1"
        }

        async fn login(&mut self) -> DeviceResult<()> {
            Ok(())
        }

        async fn get_config(&mut self, filter: &str) -> DeviceResult<String> {
            self.answer(Kind::Get, filter)
        }

        async fn edit_config(&mut self, fragment: &str) -> DeviceResult<String> {
            self.answer(Kind::Edit, fragment)
        }

        async fn execute_rpc(&mut self, request: &str) -> DeviceResult<String> {
            self.answer(Kind::Rpc, request)
        }

        async fn close(&mut self) -> DeviceResult<()> {
            Ok(())
        }
    }
}
