//! Routing family base (SLX 9540 and SLX 9030 generations).

use async_trait::async_trait;

use crate::error::DeviceResult;
use crate::transport::Transport;

use super::templates::{self, ClusterPeerStyle, SystemContainer};
use super::{apply_steps, ClusterParams, DeviceAdapter, HostNameParams, MacArpParams, PlatformBase};

/// Routing platforms keep switch attributes under `system-ras`, run MCT over
/// MPLS, and only age MACs the legacy way.
#[derive(Debug, Clone, Default)]
pub struct RoutingBase {
    root: PlatformBase,
}

impl RoutingBase {
    pub fn new() -> Self {
        Self {
            root: PlatformBase::new(),
        }
    }
}

#[async_trait]
impl DeviceAdapter for RoutingBase {
    fn name(&self) -> &'static str {
        "slx-routing"
    }

    fn delegate(&self) -> Option<&dyn DeviceAdapter> {
        Some(&self.root)
    }

    async fn configure_host_name(
        &self,
        transport: &mut dyn Transport,
        params: &HostNameParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_host_name(params, SystemContainer::SystemRas))
            .await
    }

    async fn unconfigure_host_name(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_host_name_delete(SystemContainer::SystemRas))
            .await
    }

    async fn configure_mac_and_arp(
        &self,
        transport: &mut dyn Transport,
        params: &MacArpParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_legacy_mac_timeout(params))
            .await
    }

    async fn unconfigure_mac_and_arp(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_mac_config_delete(true, false))
            .await
    }

    async fn configure_cluster(
        &self,
        transport: &mut dyn Transport,
        params: &ClusterParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "configure_cluster",
            vec![
                templates::build_cluster_peer(params, ClusterPeerStyle::ClientIsolation),
                templates::build_mpls_router(),
            ],
        )
        .await
    }

    async fn delete_cluster(
        &self,
        transport: &mut dyn Transport,
        params: &ClusterParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "delete_cluster",
            vec![
                templates::build_cluster_delete(params),
                templates::build_mpls_router_delete(),
            ],
        )
        .await
    }
}
