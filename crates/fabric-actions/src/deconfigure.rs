//! Remove what the configure workflow put on every switch.
//!
//! Teardown runs in reverse of configuration: overlay gateway and anycast
//! gateway, MCT cluster, EVPN instance and MAC/ARP aging, EVPN neighbors,
//! `router bgp`, router-id, link interface addresses, loopback, and finally
//! the system MTUs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fabric_device::{DeviceAdapter, DeviceTarget, Transport};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::{ActionError, ActionResult, StepContext, StepFailure};
use crate::intent::{ClusterIntent, InterfaceParams, OverlayIntent, SwitchIntent};
use crate::orchestrator::{DeviceContext, DeviceOperation, FanOut, Orchestrator};

pub const DECONFIGURE_OPERATION: &str = "UnConfigure Switch";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeconfigureSummary {
    pub overlay_gateway_deleted: Option<String>,
    pub cluster_deleted: Option<String>,
    pub evpn_instance_deleted: Option<String>,
    pub evpn_neighbors: usize,
    pub interfaces_cleared: Vec<String>,
    pub loopback_deleted: Option<u32>,
    pub mtu_reset: bool,
    pub persisted: bool,
}

/// Unwinds everything [`crate::ConfigureSwitch`] applies.
#[derive(Debug, Clone)]
pub struct DeconfigureSwitch {
    intents: HashMap<String, SwitchIntent>,
    persist: bool,
}

impl DeconfigureSwitch {
    pub fn new(intents: Vec<SwitchIntent>) -> Self {
        Self {
            intents: intents
                .into_iter()
                .map(|intent| (intent.target.host.clone(), intent))
                .collect(),
            persist: false,
        }
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn targets(&self) -> Vec<DeviceTarget> {
        let mut targets: Vec<DeviceTarget> =
            self.intents.values().map(|i| i.target.clone()).collect();
        targets.sort_by(|a, b| a.host.cmp(&b.host));
        targets
    }

    async fn unconfigure_overlay_gateway(
        &self,
        adapter: &dyn DeviceAdapter,
        transport: &mut dyn Transport,
        overlay: &OverlayIntent,
    ) -> Result<(), StepFailure> {
        if !overlay.mct_secondary {
            adapter
                .delete_overlay_gateway(transport, &overlay.name)
                .await
                .step("Unconfigure Overlay Gateway")?;
        }
        if overlay.anycast_mac.is_some() {
            adapter
                .unconfigure_anycast_gateway(transport)
                .await
                .step("Unconfigure Anycast Gateway")?;
        }
        Ok(())
    }

    async fn unconfigure_cluster(
        &self,
        adapter: &dyn DeviceAdapter,
        transport: &mut dyn Transport,
        cluster: &ClusterIntent,
    ) -> Result<(), StepFailure> {
        let params = cluster.params().step("Delete Cluster")?;
        adapter
            .delete_cluster(transport, &params)
            .await
            .step("Delete Cluster")?;
        adapter
            .delete_interface_ve(transport, cluster.control_ve)
            .await
            .step("Delete Cluster Control VE")?;
        if let Some(route) = cluster.peer_route().step("Deconfigure IP Route")? {
            adapter
                .deconfigure_ip_route(transport, &route)
                .await
                .step("Deconfigure IP Route")?;
        }
        Ok(())
    }

    async fn unconfigure_evpn(
        &self,
        adapter: &dyn DeviceAdapter,
        transport: &mut dyn Transport,
        overlay: &OverlayIntent,
    ) -> Result<(), StepFailure> {
        adapter
            .delete_evpn_instance(transport, &overlay.name)
            .await
            .step("Unconfigure EVPN Instance")?;
        adapter
            .unconfigure_mac_and_arp(transport)
            .await
            .step("Unconfigure Mac And Arp")?;
        Ok(())
    }
}

#[async_trait]
impl DeviceOperation for DeconfigureSwitch {
    type Output = DeconfigureSummary;

    async fn run(&self, ctx: DeviceContext<'_>) -> Result<DeconfigureSummary, StepFailure> {
        let DeviceContext {
            target,
            adapter,
            transport,
            ..
        } = ctx;
        let intent = self.intents.get(&target.host).ok_or_else(|| {
            ActionError::task_failed(format!("no intent for {}", target.host))
        })?;
        let mut summary = DeconfigureSummary::default();

        let overlay = intent.edge_overlay();
        if let Some(overlay) = overlay {
            self.unconfigure_overlay_gateway(adapter, transport, overlay)
                .await?;
            if !overlay.mct_secondary {
                summary.overlay_gateway_deleted = Some(overlay.name.clone());
            }
        }

        if let Some(cluster) = &intent.cluster {
            self.unconfigure_cluster(adapter, transport, cluster).await?;
            summary.cluster_deleted = Some(cluster.name.clone());
        }

        if let Some(overlay) = overlay {
            self.unconfigure_evpn(adapter, transport, overlay).await?;
            summary.evpn_instance_deleted = Some(overlay.name.clone());
        }

        let encapsulation = adapter.evpn_neighbor_encap_type();
        for peer in &intent.evpn_peers {
            let params = peer
                .params(encapsulation, false)
                .step("Unconfigure EVPN Neighbor")?;
            adapter
                .unconfigure_evpn_neighbor(transport, &params)
                .await
                .step("Unconfigure EVPN Neighbor")?;
            summary.evpn_neighbors += 1;
        }

        adapter
            .unconfigure_router_bgp(transport)
            .await
            .step("Unconfigure Router BGP")?;
        adapter
            .unconfigure_router_id(transport)
            .await
            .step("Unconfigure Router ID")?;

        // Unnumbered interfaces borrow the loopback address, so they go first.
        for interface in &intent.interfaces {
            match interface.params().step("Unconfigure Interface")? {
                InterfaceParams::Numbered(params) => adapter
                    .unconfigure_interface_numbered(transport, &params)
                    .await
                    .step("Unconfigure Interface")?,
                InterfaceParams::Unnumbered(params) => adapter
                    .unconfigure_interface_unnumbered(transport, &params)
                    .await
                    .step("Unconfigure Interface")?,
            };
            summary
                .interfaces_cleared
                .push(format!("{} {}", interface.int_type, interface.int_name));
        }

        if let Some(loopback) = &intent.loopback {
            adapter
                .delete_loopback(transport, loopback.id)
                .await
                .step("Delete Loopback")?;
            summary.loopback_deleted = Some(loopback.id);
        }

        if intent.system.l2_mtu.is_some() {
            adapter
                .unconfigure_system_l2_mtu(transport)
                .await
                .step("UnConfigure System L2 MTU")?;
            summary.mtu_reset = true;
        }
        if intent.system.ip_mtu.is_some() {
            adapter
                .unconfigure_system_ip_mtu(transport)
                .await
                .step("Unconfigure System IP MTU")?;
            summary.mtu_reset = true;
        }

        if self.persist {
            adapter
                .persist_config(transport)
                .await
                .step("Persist Config")?;
            summary.persisted = true;
        }
        info!(host = %target.host, "Switch deconfigured");
        Ok(summary)
    }
}

/// Deconfigures every switch after the pre-flight check passes.
#[instrument(skip_all)]
pub async fn deconfigure_fabric(
    orchestrator: &Orchestrator,
    cancel: &CancellationToken,
    deconfigure: DeconfigureSwitch,
) -> ActionResult<FanOut<DeconfigureSummary>> {
    let targets = deconfigure.targets();
    orchestrator.preflight(&targets)?;
    Ok(orchestrator
        .run_fan_out(cancel, &targets, DECONFIGURE_OPERATION, Arc::new(deconfigure))
        .await)
}
