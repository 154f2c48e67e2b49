//! SLX 9030 (Orca) generation.

use async_trait::async_trait;

use crate::error::DeviceResult;
use crate::transport::Transport;

use super::templates::{self, ClusterPeerStyle};
use super::{
    apply_steps, ClusterParams, DeviceAdapter, MacArpParams, MtuParams, RoutingBase,
    VeInterfaceParams,
};

/// Orca runs MCT without MPLS, carries BFD timers on VE interfaces and uses
/// VXLAN for EVPN neighbors.
#[derive(Debug, Clone, Default)]
pub struct Orca {
    routing: RoutingBase,
}

impl Orca {
    pub fn new() -> Self {
        Self {
            routing: RoutingBase::new(),
        }
    }
}

#[async_trait]
impl DeviceAdapter for Orca {
    fn name(&self) -> &'static str {
        "slx-orca"
    }

    fn delegate(&self) -> Option<&dyn DeviceAdapter> {
        Some(&self.routing)
    }

    fn evpn_neighbor_encap_type(&self) -> &'static str {
        "vxlan"
    }

    async fn configure_mac_and_arp(
        &self,
        transport: &mut dyn Transport,
        params: &MacArpParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "configure_mac_and_arp",
            vec![
                templates::build_conversation_properties(params, false),
                templates::build_legacy_mac_timeout(params),
            ],
        )
        .await
    }

    async fn unconfigure_mac_and_arp(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        apply_steps(
            transport,
            "unconfigure_mac_and_arp",
            vec![
                templates::build_mac_config_delete(false, false),
                templates::build_conversation_mac_delete(),
                templates::build_conversation_arp_delete(),
            ],
        )
        .await
    }

    async fn configure_system_ip_mtu(
        &self,
        transport: &mut dyn Transport,
        params: &MtuParams,
    ) -> DeviceResult<String> {
        transport.edit_config(&templates::build_ip_mtu(params)).await
    }

    async fn unconfigure_system_ip_mtu(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<String> {
        transport.edit_config(&templates::build_ip_mtu_delete()).await
    }

    async fn configure_interface_ve(
        &self,
        transport: &mut dyn Transport,
        params: &VeInterfaceParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "configure_interface_ve",
            vec![
                templates::build_interface_ve(params),
                templates::build_interface_ve_activate(params.name),
            ],
        )
        .await
    }

    async fn configure_cluster(
        &self,
        transport: &mut dyn Transport,
        params: &ClusterParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_cluster_peer(
                params,
                ClusterPeerStyle::SourcedClientIsolation,
            ))
            .await
    }

    async fn delete_cluster(
        &self,
        transport: &mut dyn Transport,
        params: &ClusterParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_cluster_delete(params))
            .await
    }
}
