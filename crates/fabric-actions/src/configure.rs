//! Bring every switch to its intended underlay, overlay and MCT cluster.
//!
//! Per switch, in order:
//!
//! 1. system L2 and IP MTU, then the anycast gateway MACs of an edge overlay
//! 2. link interfaces; a numbered one holding another address loses it first
//! 3. loopback
//! 4. read `router bgp` and reconcile its neighbors against the intent
//! 5. `router bgp` itself
//! 6. removed and changed neighbors are deleted
//! 7. new and changed neighbors are created
//! 8. EVPN neighbors
//! 9. router-id, defaulting to the loopback address
//! 10. MAC/ARP aging and the EVPN instance of an edge overlay
//! 11. MCT cluster: control VE, host route to the peer loopback, cluster
//! 12. overlay gateway, except on an MCT secondary
//! 13. optionally, persist the running config
//!
//! An EVPN instance or overlay gateway already present under another name
//! fails the switch, unless `force` is set, in which case it is replaced.
//!
//! A switch stops at its first failing step. Changes already applied on it,
//! or on any other switch, stay in place.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use fabric_common::{compare, Reconciliation};
use fabric_device::adapter::{
    BgpConfig, BgpNeighborParams, EvpnPeerGroup, LoopbackParams, NumberedInterfaceParams,
    RouterBgpParams,
};
use fabric_device::{DeviceAdapter, DeviceResult, DeviceTarget, Role, Transport};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{ActionError, ActionResult, StepContext, StepFailure};
use crate::intent::{
    BgpSettings, ClusterIntent, InterfaceParams, NeighborIntent, OverlayIntent, SwitchIntent,
};
use crate::orchestrator::{DeviceContext, DeviceOperation, FanOut, Orchestrator};

pub const CONFIGURE_OPERATION: &str = "Configure Switch";

/// What configuring one switch changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigureSummary {
    pub neighbors_created: Vec<Ipv4Addr>,
    pub neighbors_deleted: Vec<Ipv4Addr>,
    pub neighbors_updated: Vec<Ipv4Addr>,
    pub interfaces: Vec<String>,
    pub evpn_neighbors: usize,
    pub router_id: Option<Ipv4Addr>,
    pub l2_mtu: Option<u32>,
    pub ip_mtu: Option<u32>,
    pub evpn_instance: Option<String>,
    pub cluster: Option<String>,
    pub overlay_gateway: Option<String>,
    pub persisted: bool,
}

/// Neighbors currently in `group`, as intents.
///
/// Members that inherit `remote-as` from the group get the group's value.
/// Entries outside the group, such as MCT peers, are left alone.
pub fn recorded_neighbors(bgp: &BgpConfig, group: &str) -> Vec<NeighborIntent> {
    let group_as = bgp
        .peer_groups
        .iter()
        .find(|g| g.name == group)
        .and_then(|g| g.remote_as.as_deref());

    bgp.neighbors
        .iter()
        .filter(|n| n.peer_group.as_deref() == Some(group))
        .filter_map(|n| {
            let address = n.address.trim().parse().ok();
            let remote_as = n
                .remote_as
                .as_deref()
                .or(group_as)
                .and_then(|asn| asn.trim().parse().ok());
            match (address, remote_as) {
                (Some(address), Some(remote_as)) => Some(NeighborIntent::new(address, remote_as)),
                _ => {
                    debug!(address = %n.address, "Skipping unparsable BGP neighbor");
                    None
                }
            }
        })
        .collect()
}

/// Delta between the recorded and the intended neighbors, keyed by address.
pub fn reconcile_neighbors(
    recorded: Vec<NeighborIntent>,
    intended: Vec<NeighborIntent>,
) -> Reconciliation<NeighborIntent> {
    compare(
        NeighborIntent::key,
        |a: &NeighborIntent, b: &NeighborIntent| a.remote_as == b.remote_as,
        recorded,
        intended,
    )
}

/// `router bgp` parameters for a role.
pub fn router_bgp_params(
    intent: &SwitchIntent,
    settings: &BgpSettings,
) -> DeviceResult<RouterBgpParams> {
    let spine = matches!(intent.target.role, Role::Spine | Role::SuperSpine);
    let mut params = RouterBgpParams::new(intent.local_as, &settings.peer_group, settings.max_paths)?
        .with_evpn(EvpnPeerGroup {
            retain_route_target_all: spine,
            next_hop_unchanged: spine,
            allowas_in: settings.allowas_in,
        });
    if let Some(bfd) = settings.bfd {
        params = params.with_bfd(bfd);
    }
    params = match (&intent.network, intent.target.role.is_edge()) {
        (Some(network), _) => params.with_network(network)?,
        (None, true) => params.with_redistribute_connected(None)?,
        (None, false) => params,
    };
    Ok(params)
}

/// Configures the switches it has an intent for.
#[derive(Debug, Clone)]
pub struct ConfigureSwitch {
    intents: HashMap<String, SwitchIntent>,
    settings: BgpSettings,
    persist: bool,
    force: bool,
}

impl ConfigureSwitch {
    pub fn new(intents: Vec<SwitchIntent>, settings: BgpSettings) -> Self {
        Self {
            intents: intents
                .into_iter()
                .map(|intent| (intent.target.host.clone(), intent))
                .collect(),
            settings,
            persist: false,
            force: false,
        }
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Replace an EVPN instance or overlay gateway found under another name.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Targets in host order.
    pub fn targets(&self) -> Vec<DeviceTarget> {
        let mut targets: Vec<DeviceTarget> =
            self.intents.values().map(|i| i.target.clone()).collect();
        targets.sort_by(|a, b| a.host.cmp(&b.host));
        targets
    }

    async fn configure_neighbors(
        &self,
        adapter: &dyn DeviceAdapter,
        transport: &mut dyn Transport,
        intent: &SwitchIntent,
        summary: &mut ConfigureSummary,
    ) -> Result<(), StepFailure> {
        let bgp = adapter
            .get_router_bgp(transport)
            .await
            .step("Fetch Router BGP")?;
        let delta = reconcile_neighbors(
            recorded_neighbors(&bgp, &self.settings.peer_group),
            intent.neighbors.clone(),
        );
        debug!(
            host = %intent.target.host,
            created = delta.created.len(),
            deleted = delta.deleted.len(),
            updated = delta.updated.len(),
            "Reconciled BGP neighbors"
        );

        let router_bgp = router_bgp_params(intent, &self.settings).step("Configure Router BGP")?;
        adapter
            .configure_router_bgp(transport, &router_bgp)
            .await
            .step("Configure Router BGP")?;

        let deletes = delta
            .deleted
            .iter()
            .chain(delta.updated.iter().map(|u| &u.old));
        for neighbor in deletes {
            info!(
                host = %intent.target.host,
                address = %neighbor.address,
                remote_as = neighbor.remote_as,
                "Delete BGP Neighbor"
            );
            adapter
                .unconfigure_bgp_neighbor(transport, neighbor.address)
                .await
                .step("Delete BGP Neighbor")?;
        }

        let creates = delta
            .created
            .iter()
            .chain(delta.updated.iter().map(|u| &u.new));
        for neighbor in creates {
            info!(
                host = %intent.target.host,
                address = %neighbor.address,
                remote_as = neighbor.remote_as,
                "Create BGP Neighbor"
            );
            let mut params = BgpNeighborParams::new(
                &neighbor.address.to_string(),
                neighbor.remote_as,
                &self.settings.peer_group,
            )
            .step("Configure BGP Neighbor")?
            .leaf(intent.target.role.is_edge());
            if let Some(hops) = self.settings.multihop {
                params = params
                    .with_multihop(hops, false)
                    .step("Configure BGP Neighbor")?;
            }
            adapter
                .configure_bgp_neighbor(transport, &params)
                .await
                .step("Configure BGP Neighbor")?;
        }

        summary.neighbors_created = delta.created.iter().map(|n| n.address).collect();
        summary.neighbors_deleted = delta.deleted.iter().map(|n| n.address).collect();
        summary.neighbors_updated = delta.updated.iter().map(|u| u.new.address).collect();
        Ok(())
    }

    async fn configure_system(
        &self,
        adapter: &dyn DeviceAdapter,
        transport: &mut dyn Transport,
        intent: &SwitchIntent,
        summary: &mut ConfigureSummary,
    ) -> Result<(), StepFailure> {
        if let Some(params) = intent.system.l2_mtu().step("Configure System L2 MTU")? {
            adapter
                .configure_system_l2_mtu(transport, &params)
                .await
                .step("Configure System L2 MTU")?;
            summary.l2_mtu = Some(params.mtu);
        }
        if let Some(params) = intent.system.ip_mtu().step("Configure System IP MTU")? {
            adapter
                .configure_system_ip_mtu(transport, &params)
                .await
                .step("Configure System IP MTU")?;
            summary.ip_mtu = Some(params.mtu);
        }

        // Anycast MACs are only ever created, never updated.
        let anycast = match intent.edge_overlay() {
            Some(overlay) => overlay.anycast_params().step("Configure Anycast Gateway")?,
            None => None,
        };
        if let Some(params) = anycast {
            info!(host = %intent.target.host, ipv4 = %params.ipv4_mac, "Configure Anycast Gateway");
            adapter
                .configure_anycast_gateway(transport, &params)
                .await
                .step("Configure Anycast Gateway")?;
        }
        Ok(())
    }

    async fn configure_interfaces(
        &self,
        adapter: &dyn DeviceAdapter,
        transport: &mut dyn Transport,
        intent: &SwitchIntent,
        summary: &mut ConfigureSummary,
    ) -> Result<(), StepFailure> {
        if intent.interfaces.is_empty() {
            return Ok(());
        }
        let current = adapter
            .get_interfaces(transport, None)
            .await
            .step("Fetch Interfaces")?;

        for interface in &intent.interfaces {
            let recorded = current.iter().find(|c| {
                c.int_type.eq_ignore_ascii_case(&interface.int_type) && c.int_name == interface.int_name
            });
            let recorded_ip = recorded.and_then(|c| c.ip_address.as_deref());
            match interface.params().step("Configure Interface")? {
                InterfaceParams::Numbered(params) => {
                    if recorded_ip == Some(params.ip_address.as_str()) {
                        debug!(interface = %interface.int_name, "Interface address unchanged");
                        continue;
                    }
                    if let Some(old) = recorded_ip {
                        let old = NumberedInterfaceParams::new(&params.int_type, &params.int_name, old)
                            .step("Unconfigure Interface")?;
                        adapter
                            .unconfigure_interface_numbered(transport, &old)
                            .await
                            .step("Unconfigure Interface")?;
                    }
                    adapter
                        .configure_interface_numbered(transport, &params)
                        .await
                        .step("Configure Interface")?;
                }
                InterfaceParams::Unnumbered(params) => {
                    adapter
                        .configure_interface_unnumbered(transport, &params)
                        .await
                        .step("Configure Interface")?;
                }
            }
            summary
                .interfaces
                .push(format!("{} {}", interface.int_type, interface.int_name));
        }
        Ok(())
    }

    async fn configure_evpn(
        &self,
        adapter: &dyn DeviceAdapter,
        transport: &mut dyn Transport,
        overlay: &OverlayIntent,
    ) -> Result<(), StepFailure> {
        let mac_arp = overlay.mac_arp.params().step("Configure Mac And Arp")?;
        adapter
            .configure_mac_and_arp(transport, &mac_arp)
            .await
            .step("Configure Mac And Arp")?;

        let params = overlay
            .evpn_instance_params()
            .step("Configure EVPN Instance")?;
        let existing = adapter
            .get_evpn_instance(transport)
            .await
            .step("Fetch EVPN Instance")?
            .map(|evpn| evpn.name)
            .filter(|name| !name.is_empty() && *name != params.name);
        if let Some(name) = existing {
            self.replace_or_fail("EVPN", &name)
                .step("Configure EVPN Instance")?;
            adapter
                .delete_evpn_instance(transport, &name)
                .await
                .step("Delete EVPN Instance")?;
        }
        adapter
            .create_evpn_instance(transport, &params)
            .await
            .step("Configure EVPN Instance")?;
        Ok(())
    }

    async fn configure_cluster(
        &self,
        adapter: &dyn DeviceAdapter,
        transport: &mut dyn Transport,
        host: &str,
        cluster: &ClusterIntent,
    ) -> Result<(), StepFailure> {
        let ve = cluster
            .ve_params(self.settings.bfd)
            .step("Configure IRB on Cluster Control VLAN")?;
        info!(host, ve = ve.name, address = %ve.ip_address, "Configure cluster control VE");
        adapter
            .configure_interface_ve(transport, &ve)
            .await
            .step("Configure IRB on Cluster Control VLAN")?;

        if let Some(route) = cluster.peer_route().step("Configure IP Route")? {
            adapter
                .configure_ip_route(transport, &route)
                .await
                .step("Configure IP Route")?;
        }

        let params = cluster.params().step("Configure Cluster")?;
        info!(
            host,
            name = %params.name,
            id = params.id,
            peer = %params.peer_ip,
            "Configure Cluster"
        );
        adapter
            .configure_cluster(transport, &params)
            .await
            .step("Configure Cluster")?;
        Ok(())
    }

    async fn configure_overlay_gateway(
        &self,
        adapter: &dyn DeviceAdapter,
        transport: &mut dyn Transport,
        overlay: &OverlayIntent,
    ) -> Result<(), StepFailure> {
        let params = overlay
            .gateway_params()
            .step("Configure Overlay Gateway")?;
        let existing = adapter
            .get_overlay_gateway(transport)
            .await
            .step("Fetch Overlay Gateway")?
            .map(|gateway| gateway.name)
            .filter(|name| !name.is_empty() && *name != params.name);
        if let Some(name) = existing {
            self.replace_or_fail("Overlay gateway", &name)
                .step("Configure Overlay Gateway")?;
            adapter
                .delete_overlay_gateway(transport, &name)
                .await
                .step("Delete Overlay Gateway")?;
        }
        adapter
            .create_overlay_gateway(transport, &params)
            .await
            .step("Configure Overlay Gateway")?;
        Ok(())
    }

    fn replace_or_fail(&self, what: &'static str, name: &str) -> ActionResult<()> {
        if self.force {
            warn!(existing = name, "{} already configured on switch, replacing it", what);
            Ok(())
        } else {
            Err(ActionError::AlreadyConfigured {
                what,
                name: name.to_string(),
            })
        }
    }
}

#[async_trait]
impl DeviceOperation for ConfigureSwitch {
    type Output = ConfigureSummary;

    async fn run(&self, ctx: DeviceContext<'_>) -> Result<ConfigureSummary, StepFailure> {
        let DeviceContext {
            target,
            adapter,
            transport,
            ..
        } = ctx;
        let intent = self.intents.get(&target.host).ok_or_else(|| {
            ActionError::task_failed(format!("no intent for {}", target.host))
        })?;
        let mut summary = ConfigureSummary::default();

        self.configure_system(adapter, transport, intent, &mut summary)
            .await?;
        self.configure_interfaces(adapter, transport, intent, &mut summary)
            .await?;

        if let Some(loopback) = &intent.loopback {
            let params = LoopbackParams::new(loopback.id, &format!("{}/32", loopback.address))
                .step("Configure Loopback")?;
            adapter
                .configure_loopback(transport, &params)
                .await
                .step("Configure Loopback")?;
        }

        self.configure_neighbors(adapter, transport, intent, &mut summary)
            .await?;

        let encapsulation = adapter.evpn_neighbor_encap_type();
        let bfd = self.settings.bfd.is_some();
        for peer in &intent.evpn_peers {
            let params = peer
                .params(encapsulation, bfd)
                .step("Configure EVPN Neighbor")?;
            adapter
                .configure_evpn_neighbor(transport, &params)
                .await
                .step("Configure EVPN Neighbor")?;
            summary.evpn_neighbors += 1;
        }

        match intent.effective_router_id() {
            Some(router_id) => {
                info!(host = %target.host, router_id = %router_id, "Configure Router ID");
                adapter
                    .configure_router_id(transport, router_id)
                    .await
                    .step("Configure Router ID")?;
                summary.router_id = Some(router_id);
            }
            None => warn!(host = %target.host, "Router ID could not be computed"),
        }

        let overlay = intent.edge_overlay();
        if let Some(overlay) = overlay {
            self.configure_evpn(adapter, transport, overlay).await?;
            summary.evpn_instance = Some(overlay.name.clone());
        }

        if let Some(cluster) = &intent.cluster {
            self.configure_cluster(adapter, transport, &target.host, cluster)
                .await?;
            summary.cluster = Some(cluster.name.clone());
        }

        match overlay {
            Some(overlay) if overlay.mct_secondary => {
                info!(host = %target.host, "MCT secondary, overlay gateway comes from the principal");
            }
            Some(overlay) => {
                self.configure_overlay_gateway(adapter, transport, overlay)
                    .await?;
                summary.overlay_gateway = Some(overlay.name.clone());
            }
            None => {}
        }

        if self.persist {
            adapter
                .persist_config(transport)
                .await
                .step("Persist Config")?;
            summary.persisted = true;
        }
        Ok(summary)
    }
}

/// Configures every switch after the pre-flight check passes.
#[instrument(skip_all)]
pub async fn configure_fabric(
    orchestrator: &Orchestrator,
    cancel: &CancellationToken,
    configure: ConfigureSwitch,
) -> ActionResult<FanOut<ConfigureSummary>> {
    let targets = configure.targets();
    orchestrator.preflight(&targets)?;
    Ok(orchestrator
        .run_fan_out(cancel, &targets, CONFIGURE_OPERATION, Arc::new(configure))
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{EvpnPeerIntent, InterfaceIntent, LoopbackIntent, SystemIntent};
    use fabric_device::adapter::templates;
    use fabric_device::AdapterRegistry;
    use fabric_test::{
        fixtures, replies, DeviceScript, Failure, RequestKind, RequestVerifier,
        ScriptedTransportFactory,
    };
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn spine_intent(host: &str) -> SwitchIntent {
        let mut intent = SwitchIntent::new(fixtures::spine(host), 64512);
        intent.loopback = Some(LoopbackIntent {
            id: 1,
            address: addr("172.31.254.1"),
        });
        intent.neighbors = vec![
            NeighborIntent::new(addr("10.10.10.1"), 65001),
            NeighborIntent::new(addr("10.10.10.3"), 65003),
        ];
        intent
    }

    fn overlay_leaf_intent(host: &str) -> SwitchIntent {
        let mut intent = SwitchIntent::new(fixtures::leaf(host), 65001);
        intent.loopback = Some(LoopbackIntent {
            id: 1,
            address: addr("172.31.254.11"),
        });
        intent.system = SystemIntent {
            l2_mtu: Some(9216),
            ip_mtu: Some(9100),
        };
        intent.interfaces = vec![InterfaceIntent::numbered("ethernet", "0/1", "10.10.10.1/31")];
        let mut overlay = OverlayIntent::new("fabric1", 2);
        overlay.anycast_mac = Some("0201.0101.0101".to_string());
        intent.overlay = Some(overlay);
        intent.cluster = Some(ClusterIntent {
            name: "fabric1-cluster-1".to_string(),
            id: 1,
            control_vlan: 4090,
            control_ve: 4090,
            peer_interface_type: "Port-channel".to_string(),
            peer_interface_name: "1024".to_string(),
            peer_ip: addr("10.20.20.1"),
            local_ip: "10.20.20.0/31".to_string(),
            peer_loopback: Some(addr("172.31.254.12")),
        });
        intent
    }

    fn run(factory: ScriptedTransportFactory) -> (Orchestrator, Arc<ScriptedTransportFactory>) {
        let factory = Arc::new(factory);
        (
            Orchestrator::new(Arc::new(AdapterRegistry::new()), factory.clone()),
            factory,
        )
    }

    #[test]
    fn test_recorded_neighbors_inherit_group_as() {
        let mut bgp = BgpConfig::from_reply(&replies::router_bgp(
            64512,
            "spine-group",
            &[("10.10.10.1", 65001)],
        ))
        .unwrap();
        bgp.peer_groups[0].remote_as = Some("65100".to_string());
        bgp.neighbors[0].remote_as = None;
        bgp.neighbors.push(fabric_device::adapter::BgpNeighborConfig {
            address: "10.20.20.2".to_string(),
            remote_as: Some("65000".to_string()),
            ..Default::default()
        });

        assert_eq!(
            recorded_neighbors(&bgp, "spine-group"),
            vec![NeighborIntent::new(addr("10.10.10.1"), 65100)]
        );
    }

    #[test]
    fn test_reconcile_neighbors() {
        let delta = reconcile_neighbors(
            vec![
                NeighborIntent::new(addr("10.10.10.1"), 65001),
                NeighborIntent::new(addr("10.10.10.2"), 65002),
                NeighborIntent::new(addr("10.10.10.3"), 65000),
            ],
            vec![
                NeighborIntent::new(addr("10.10.10.1"), 65001),
                NeighborIntent::new(addr("10.10.10.3"), 65003),
                NeighborIntent::new(addr("10.10.10.4"), 65004),
            ],
        );
        assert_eq!(delta.created, vec![NeighborIntent::new(addr("10.10.10.4"), 65004)]);
        assert_eq!(delta.deleted, vec![NeighborIntent::new(addr("10.10.10.2"), 65002)]);
        assert_eq!(delta.updated.len(), 1);
        assert_eq!(delta.updated[0].old.remote_as, 65000);
        assert_eq!(delta.updated[0].new.remote_as, 65003);
    }

    #[test]
    fn test_router_bgp_params_per_role() {
        let settings = BgpSettings::default();
        let spine = router_bgp_params(&spine_intent("10.24.39.1"), &settings).unwrap();
        let evpn = spine.evpn.unwrap();
        assert!(evpn.retain_route_target_all && evpn.next_hop_unchanged);

        let leaf = SwitchIntent::new(fixtures::leaf("10.24.39.11"), 65001);
        let leaf = router_bgp_params(&leaf, &settings).unwrap();
        let evpn = leaf.evpn.unwrap();
        assert!(!evpn.retain_route_target_all && !evpn.next_hop_unchanged);
        assert_eq!(leaf.redistribution, fabric_device::adapter::Redistribution::Connected);
    }

    #[tokio::test]
    async fn test_configure_deletes_before_creates() {
        let (orch, factory) = run(ScriptedTransportFactory::new().with_device(
            "10.24.39.1",
            DeviceScript::new().on_get(
                templates::FILTER_ROUTER_BGP,
                replies::router_bgp(
                    64512,
                    "spine-group",
                    &[("10.10.10.1", 65001), ("10.10.10.2", 65002), ("10.10.10.3", 65000)],
                ),
            ),
        ));
        let configure = ConfigureSwitch::new(vec![spine_intent("10.24.39.1")], BgpSettings::default())
            .persist(true);

        let fan_out = configure_fabric(&orch, &CancellationToken::new(), configure)
            .await
            .unwrap();
        assert!(fan_out.is_success(), "{:?}", fan_out.errors);
        let summary = &fan_out.results[0].value;
        assert_eq!(summary.neighbors_created, Vec::<Ipv4Addr>::new());
        assert_eq!(summary.neighbors_deleted, vec![addr("10.10.10.2")]);
        assert_eq!(summary.neighbors_updated, vec![addr("10.10.10.3")]);
        assert_eq!(summary.router_id, Some(addr("172.31.254.1")));
        assert!(summary.persisted);

        let log = factory.log("10.24.39.1");
        let verifier = RequestVerifier::new(&log);
        verifier
            .assert_edit_order(&[
                "172.31.254.1/32",
                "<local-as>64512</local-as>",
                "<router-bgp-neighbor-address>10.10.10.2</router-bgp-neighbor-address><associate-peer-group operation=\"remove\"/>",
                "<router-bgp-neighbor-address>10.10.10.3</router-bgp-neighbor-address><associate-peer-group operation=\"remove\"/>",
                "<router-bgp-neighbor-address>10.10.10.3</router-bgp-neighbor-address><remote-as>65003</remote-as>",
                "<router-id>172.31.254.1</router-id>",
            ])
            .unwrap();
        verifier.assert_no_edit("10.10.10.1</router-bgp-neighbor-address><remote-as>").unwrap();
        verifier.assert_count(RequestKind::Rpc, 1).unwrap();
        verifier.assert_closed().unwrap();
    }

    #[tokio::test]
    async fn test_configure_failure_is_isolated_and_tagged() {
        let (orch, factory) = run(ScriptedTransportFactory::new().with_device(
            "10.24.39.2",
            DeviceScript::new().fail_edit(
                "<local-as>",
                Failure::Protocol("%Error: BGP is being deconfigured".into()),
            ),
        ));
        let configure = ConfigureSwitch::new(
            vec![spine_intent("10.24.39.1"), spine_intent("10.24.39.2")],
            BgpSettings::default(),
        );

        let fan_out = configure_fabric(&orch, &CancellationToken::new(), configure)
            .await
            .unwrap();
        assert_eq!(fan_out.results.len(), 1);
        assert_eq!(fan_out.results[0].host, "10.24.39.1");
        assert_eq!(fan_out.errors.len(), 1);
        assert_eq!(fan_out.errors[0].operation, "Configure Router BGP");
        assert_eq!(
            fan_out.errors[0].to_string(),
            "{Host=10.24.39.2,Operation=Configure Router BGP,Error=%Error: BGP is being deconfigured}"
        );

        let failed = factory.log("10.24.39.2");
        RequestVerifier::new(&failed)
            .assert_no_edit("<router-id>")
            .unwrap();
    }

    #[tokio::test]
    async fn test_configure_evpn_uses_platform_encapsulation() {
        let (orch, factory) = run(ScriptedTransportFactory::new());
        let mut intent = spine_intent("10.24.39.1");
        intent.neighbors.clear();
        intent.evpn_peers = vec![EvpnPeerIntent {
            address: addr("10.20.20.2"),
            remote_as: 65000,
            loopback: Some((2, addr("172.31.254.2"))),
        }];

        let fan_out = configure_fabric(
            &orch,
            &CancellationToken::new(),
            ConfigureSwitch::new(vec![intent], BgpSettings::default()),
        )
        .await
        .unwrap();
        assert!(fan_out.is_success(), "{:?}", fan_out.errors);
        assert_eq!(fan_out.results[0].value.evpn_neighbors, 1);

        let log = factory.log("10.24.39.1");
        assert!(log
            .edits()
            .iter()
            .any(|edit| edit.contains("<encapsulation>mpls</encapsulation>")));
    }

    #[tokio::test]
    async fn test_missing_router_id_is_skipped() {
        let (orch, factory) = run(ScriptedTransportFactory::new());
        let intent = SwitchIntent::new(fixtures::leaf("10.24.39.11"), 65001);

        let fan_out = configure_fabric(
            &orch,
            &CancellationToken::new(),
            ConfigureSwitch::new(vec![intent], BgpSettings::default()),
        )
        .await
        .unwrap();
        assert!(fan_out.is_success());
        assert_eq!(fan_out.results[0].value.router_id, None);
        RequestVerifier::new(&factory.log("10.24.39.11"))
            .assert_no_edit("<router-id>")
            .unwrap();
    }

    #[tokio::test]
    async fn test_configure_leaf_stage_order() {
        let (orch, factory) = run(ScriptedTransportFactory::new());
        let configure = ConfigureSwitch::new(
            vec![overlay_leaf_intent("10.24.39.11")],
            BgpSettings::default(),
        )
        .persist(true);

        let fan_out = configure_fabric(&orch, &CancellationToken::new(), configure)
            .await
            .unwrap();
        assert!(fan_out.is_success(), "{:?}", fan_out.errors);
        let summary = &fan_out.results[0].value;
        assert_eq!(summary.l2_mtu, Some(9216));
        assert_eq!(summary.ip_mtu, Some(9100));
        assert_eq!(summary.evpn_instance.as_deref(), Some("fabric1"));
        assert_eq!(summary.cluster.as_deref(), Some("fabric1-cluster-1"));
        assert_eq!(summary.overlay_gateway.as_deref(), Some("fabric1"));

        let log = factory.log("10.24.39.11");
        let verifier = RequestVerifier::new(&log);
        verifier
            .assert_edit_order(&[
                "<global-l2-mtu>9216</global-l2-mtu>",
                "<global-ip-mtu>9100</global-ip-mtu>",
                "<ip-anycast-gateway-mac>0201.0101.0101</ip-anycast-gateway-mac>",
                "<address>10.10.10.1/31</address>",
                "<shutdown operation=\"remove\"></shutdown>",
                "172.31.254.11/32",
                "<local-as>65001</local-as>",
                "<router-id>172.31.254.11</router-id>",
                "<mac-move-detect-enable/>",
                "<instance-name>fabric1</instance-name>",
                "<address>10.20.20.0/31</address>",
                "<cluster-control-vlan>4090</cluster-control-vlan>",
                "<peer-ip>10.20.20.1</peer-ip>",
                "<gw-type>layer2-extension</gw-type>",
            ])
            .unwrap();
        // interface detail, ip interface, then the copy to startup
        verifier.assert_count(RequestKind::Rpc, 3).unwrap();
    }

    #[tokio::test]
    async fn test_readdressed_interface_loses_old_address_first() {
        let (orch, factory) = run(ScriptedTransportFactory::new().with_device(
            "10.24.39.1",
            DeviceScript::new()
                .on_rpc(
                    "get-interface-detail",
                    replies::interface_detail(&[
                        ("ethernet", "0/1", "0027.f8ca.7a01", "100Gbps"),
                        ("ethernet", "0/2", "0027.f8ca.7a02", "100Gbps"),
                    ]),
                )
                .on_rpc(
                    "get-ip-interface",
                    replies::ip_interfaces(&[
                        ("ethernet", "0/1", "10.10.10.0/31"),
                        ("ethernet", "0/2", "10.10.10.8/31"),
                    ]),
                ),
        ));
        let mut intent = spine_intent("10.24.39.1");
        intent.neighbors.clear();
        intent.interfaces = vec![
            InterfaceIntent::numbered("ethernet", "0/1", "10.10.10.0/31"),
            InterfaceIntent::numbered("ethernet", "0/2", "10.10.10.2/31"),
            InterfaceIntent::unnumbered("ethernet", "0/3", "loopback", "1"),
        ];

        let fan_out = configure_fabric(
            &orch,
            &CancellationToken::new(),
            ConfigureSwitch::new(vec![intent], BgpSettings::default()),
        )
        .await
        .unwrap();
        assert!(fan_out.is_success(), "{:?}", fan_out.errors);
        assert_eq!(
            fan_out.results[0].value.interfaces,
            vec!["ethernet 0/2".to_string(), "ethernet 0/3".to_string()]
        );

        let log = factory.log("10.24.39.1");
        let verifier = RequestVerifier::new(&log);
        verifier
            .assert_edit_order(&[
                "<address operation=\"remove\"><address>10.10.10.8/31</address>",
                "<address><address>10.10.10.2/31</address>",
                "<ip-donor-interface-type>loopback</ip-donor-interface-type>",
                "172.31.254.1/32",
            ])
            .unwrap();
        verifier.assert_no_edit("10.10.10.0/31").unwrap();
    }

    #[tokio::test]
    async fn test_spine_gets_no_overlay() {
        let (orch, factory) = run(ScriptedTransportFactory::new());
        let mut intent = spine_intent("10.24.39.1");
        intent.overlay = Some(OverlayIntent::new("fabric1", 2));

        let fan_out = configure_fabric(
            &orch,
            &CancellationToken::new(),
            ConfigureSwitch::new(vec![intent], BgpSettings::default()),
        )
        .await
        .unwrap();
        assert!(fan_out.is_success(), "{:?}", fan_out.errors);
        assert_eq!(fan_out.results[0].value.overlay_gateway, None);

        let log = factory.log("10.24.39.1");
        let verifier = RequestVerifier::new(&log);
        verifier.assert_no_edit("<overlay-gateway").unwrap();
        verifier.assert_no_edit("<evpn-instance>").unwrap();
        verifier.assert_no_edit("<global-l2-mtu>").unwrap();
    }

    #[tokio::test]
    async fn test_mct_secondary_skips_overlay_gateway() {
        let (orch, factory) = run(ScriptedTransportFactory::new());
        let mut intent = overlay_leaf_intent("10.24.39.12");
        if let Some(overlay) = intent.overlay.as_mut() {
            overlay.mct_secondary = true;
        }

        let fan_out = configure_fabric(
            &orch,
            &CancellationToken::new(),
            ConfigureSwitch::new(vec![intent], BgpSettings::default()),
        )
        .await
        .unwrap();
        assert!(fan_out.is_success(), "{:?}", fan_out.errors);
        assert_eq!(fan_out.results[0].value.overlay_gateway, None);
        assert_eq!(fan_out.results[0].value.evpn_instance.as_deref(), Some("fabric1"));
        RequestVerifier::new(&factory.log("10.24.39.12"))
            .assert_no_edit("<gw-type>")
            .unwrap();
    }

    #[tokio::test]
    async fn test_foreign_overlay_gateway_fails_without_force() {
        let script = || {
            DeviceScript::new().on_get(
                templates::FILTER_OVERLAY_GATEWAY,
                replies::overlay_gateway("old-fabric", 2),
            )
        };
        let (orch, factory) = run(ScriptedTransportFactory::new().with_device("10.24.39.11", script()));

        let fan_out = configure_fabric(
            &orch,
            &CancellationToken::new(),
            ConfigureSwitch::new(vec![overlay_leaf_intent("10.24.39.11")], BgpSettings::default()),
        )
        .await
        .unwrap();
        assert_eq!(fan_out.errors.len(), 1);
        assert_eq!(fan_out.errors[0].operation, "Configure Overlay Gateway");
        assert_eq!(
            fan_out.errors[0].error.to_string(),
            "Overlay gateway old-fabric already configured on switch"
        );
        RequestVerifier::new(&factory.log("10.24.39.11"))
            .assert_no_edit("<gw-type>")
            .unwrap();

        let (orch, factory) = run(ScriptedTransportFactory::new().with_device("10.24.39.11", script()));
        let fan_out = configure_fabric(
            &orch,
            &CancellationToken::new(),
            ConfigureSwitch::new(vec![overlay_leaf_intent("10.24.39.11")], BgpSettings::default())
                .force(true),
        )
        .await
        .unwrap();
        assert!(fan_out.is_success(), "{:?}", fan_out.errors);
        let log = factory.log("10.24.39.11");
        RequestVerifier::new(&log)
            .assert_edit_order(&[
                "operation=\"remove\"><name>old-fabric</name>",
                "<gw-type>layer2-extension</gw-type>",
            ])
            .unwrap();
    }

    #[tokio::test]
    async fn test_matching_evpn_instance_is_kept() {
        let (orch, factory) = run(ScriptedTransportFactory::new().with_device(
            "10.24.39.11",
            DeviceScript::new().on_get(templates::FILTER_EVPN_INSTANCE, replies::evpn_instance("fabric1")),
        ));

        let fan_out = configure_fabric(
            &orch,
            &CancellationToken::new(),
            ConfigureSwitch::new(vec![overlay_leaf_intent("10.24.39.11")], BgpSettings::default()),
        )
        .await
        .unwrap();
        assert!(fan_out.is_success(), "{:?}", fan_out.errors);
        RequestVerifier::new(&factory.log("10.24.39.11"))
            .assert_no_edit("<evpn operation=\"delete\">")
            .unwrap();
    }
}
