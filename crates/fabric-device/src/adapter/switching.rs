//! Switching family base (SLX 9850, 9240 and 9140).

use async_trait::async_trait;

use crate::error::DeviceResult;
use crate::transport::Transport;

use super::templates::{self, ClusterPeerStyle, SystemContainer};
use super::{apply_steps, ClusterParams, DeviceAdapter, HostNameParams, MacArpParams, PlatformBase};

/// Switching platforms keep switch attributes under `system`, age MACs and
/// ARP entries conversationally, and bind MCT to a control VLAN.
#[derive(Debug, Clone, Default)]
pub struct SwitchingBase {
    root: PlatformBase,
}

impl SwitchingBase {
    pub fn new() -> Self {
        Self {
            root: PlatformBase::new(),
        }
    }
}

#[async_trait]
impl DeviceAdapter for SwitchingBase {
    fn name(&self) -> &'static str {
        "slx-switching"
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
            .edit_config(&templates::build_host_name(params, SystemContainer::System))
            .await
    }

    async fn unconfigure_host_name(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_host_name_delete(SystemContainer::System))
            .await
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
                templates::build_mac_move_detect(),
                templates::build_conversation_properties(params, true),
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
                templates::build_mac_config_delete(true, true),
                templates::build_mac_move_detect_delete(),
                templates::build_conversation_mac_delete(),
                templates::build_conversation_arp_delete(),
            ],
        )
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
                templates::build_cluster_control_vlan(params),
                templates::build_cluster_peer(params, ClusterPeerStyle::DfLoadBalance),
            ],
        )
        .await
    }
}
