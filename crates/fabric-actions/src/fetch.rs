//! Read back the running fabric configuration of every switch.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use fabric_device::adapter::{
    BgpConfig, ClusterConfig, EvpnInstanceConfig, LoopbackConfig, OverlayGatewayConfig,
};
use fabric_device::{DeviceError, DeviceResult, DeviceTarget, Role};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::error::{ActionResult, StepContext, StepFailure};
use crate::orchestrator::{DeviceContext, DeviceOperation, FanOut, Orchestrator};

pub const FETCH_OPERATION: &str = "Fetch Switch Config";

/// What one switch is running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchSnapshot {
    pub host: String,
    pub model: String,
    pub role: Role,
    pub bgp: BgpConfig,
    pub router_id: Option<Ipv4Addr>,
    pub loopbacks: Vec<LoopbackConfig>,
    /// Edge roles only.
    pub overlay_gateway: Option<OverlayGatewayConfig>,
    pub evpn_instance: Option<EvpnInstanceConfig>,
    pub cluster: Option<ClusterConfig>,
}

/// A read the device family may not implement counts as absent.
fn optional<T>(result: DeviceResult<Option<T>>) -> DeviceResult<Option<T>> {
    match result {
        Err(DeviceError::OperationUnsupported { operation }) => {
            debug!(operation = %operation, "Read not supported, treating as absent");
            Ok(None)
        }
        other => other,
    }
}

/// Reads one switch; loopback ids filter the loopback read, empty reads all.
#[derive(Debug, Clone, Default)]
pub struct FetchSwitch {
    pub loopback_ids: Vec<u32>,
}

#[async_trait]
impl DeviceOperation for FetchSwitch {
    type Output = SwitchSnapshot;

    async fn run(&self, ctx: DeviceContext<'_>) -> Result<SwitchSnapshot, StepFailure> {
        let DeviceContext {
            target,
            adapter,
            transport,
            ..
        } = ctx;

        let bgp = adapter
            .get_router_bgp(transport)
            .await
            .step("Fetch Router BGP")?;
        let router_id = adapter
            .get_router_id(transport)
            .await
            .step("Fetch Router ID")?;
        let loopbacks = adapter
            .get_loopbacks(transport, &self.loopback_ids)
            .await
            .step("Fetch Loopbacks")?;

        let mut snapshot = SwitchSnapshot {
            host: target.host.clone(),
            model: target.model.clone(),
            role: target.role,
            bgp,
            router_id,
            loopbacks,
            overlay_gateway: None,
            evpn_instance: None,
            cluster: None,
        };

        if target.role.is_edge() {
            snapshot.overlay_gateway = optional(adapter.get_overlay_gateway(transport).await)
                .step("Fetch Overlay Gateway")?;
            snapshot.evpn_instance = optional(adapter.get_evpn_instance(transport).await)
                .step("Fetch EVPN Instance")?;
            snapshot.cluster = optional(adapter.get_cluster(transport).await)
                .step("Fetch Cluster")?;
        }

        debug!(
            host = %target.host,
            neighbors = snapshot.bgp.neighbors.len(),
            loopbacks = snapshot.loopbacks.len(),
            "Fetched switch config"
        );
        Ok(snapshot)
    }
}

/// Fetches every target after the pre-flight check passes.
#[instrument(skip_all, fields(devices = targets.len()))]
pub async fn fetch_fabric(
    orchestrator: &Orchestrator,
    cancel: &CancellationToken,
    targets: &[DeviceTarget],
    fetch: FetchSwitch,
) -> ActionResult<FanOut<SwitchSnapshot>> {
    orchestrator.preflight(targets)?;
    Ok(orchestrator
        .run_fan_out(cancel, targets, FETCH_OPERATION, Arc::new(fetch))
        .await)
}
