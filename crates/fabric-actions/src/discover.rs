//! Discover the physical topology and reconcile it against the recorded one.
//!
//! Every switch reports its interfaces and LLDP neighbors. An interface whose
//! MAC another switch reports as the remote end of an LLDP adjacency is one
//! end of a link. Links between tiers become BGP underlay neighbors; links
//! between two edge switches become MCT member ports.
//!
//! Record ids are carried over from the recorded state by key and allocated
//! past the highest recorded id otherwise, so a state file can be fed back
//! into the next discovery.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use fabric_common::records::{
    InterfaceRecord, LldpNeighborRecord, MctMemberPortRecord, RemoteNeighborRecord,
};
use fabric_common::{reconcile, Reconcilable, Reconciliation};
use fabric_device::adapter::{InterfaceStatus, LldpNeighbor};
use fabric_device::{DeviceTarget, Role};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{ActionError, ActionResult, StepContext, StepFailure};
use crate::intent::SwitchIntent;
use crate::orchestrator::{DeviceContext, DeviceOperation, FanOut, Orchestrator};

pub const DISCOVER_OPERATION: &str = "Discover Switch";

/// Every leaf pair forms a single data-plane cluster.
pub const MCT_CLUSTER_ID: u16 = 1;

/// What one switch reports about its ports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchDiscovery {
    pub host: String,
    pub role: Role,
    pub local_as: u32,
    pub interfaces: Vec<InterfaceStatus>,
    pub lldp: Vec<LldpNeighbor>,
}

/// Reads interfaces and LLDP neighbors of the switches it has an intent for.
#[derive(Debug, Clone)]
pub struct DiscoverSwitch {
    intents: HashMap<String, SwitchIntent>,
}

impl DiscoverSwitch {
    pub fn new(intents: Vec<SwitchIntent>) -> Self {
        Self {
            intents: intents
                .into_iter()
                .map(|intent| (intent.target.host.clone(), intent))
                .collect(),
        }
    }

    pub fn targets(&self) -> Vec<DeviceTarget> {
        let mut targets: Vec<DeviceTarget> =
            self.intents.values().map(|i| i.target.clone()).collect();
        targets.sort_by(|a, b| a.host.cmp(&b.host));
        targets
    }
}

#[async_trait]
impl DeviceOperation for DiscoverSwitch {
    type Output = SwitchDiscovery;

    async fn run(&self, ctx: DeviceContext<'_>) -> Result<SwitchDiscovery, StepFailure> {
        let DeviceContext {
            target,
            adapter,
            transport,
            ..
        } = ctx;
        let intent = self.intents.get(&target.host).ok_or_else(|| {
            ActionError::task_failed(format!("no intent for {}", target.host))
        })?;

        let control_ve = intent.cluster.as_ref().map(|c| c.control_ve);
        let interfaces = adapter
            .get_interfaces(transport, control_ve)
            .await
            .step("Fetch Interfaces")?;
        let lldp = adapter
            .get_lldp_neighbors(transport)
            .await
            .step("Fetch LLDP Neighbors")?;

        debug!(
            host = %target.host,
            interfaces = interfaces.len(),
            lldp = lldp.len(),
            "Discovered switch"
        );
        Ok(SwitchDiscovery {
            host: target.host.clone(),
            role: target.role,
            local_as: intent.local_as,
            interfaces,
            lldp,
        })
    }
}

/// The recorded topology, as kept between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricState {
    /// Host to device id.
    #[serde(default)]
    pub devices: BTreeMap<String, u64>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceRecord>,
    #[serde(default)]
    pub lldp_neighbors: Vec<LldpNeighborRecord>,
    #[serde(default)]
    pub remote_neighbors: Vec<RemoteNeighborRecord>,
    #[serde(default)]
    pub mct_member_ports: Vec<MctMemberPortRecord>,
}

/// Writes that bring the recorded topology to the discovered one.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyDelta {
    pub interfaces: Reconciliation<InterfaceRecord>,
    pub lldp_neighbors: Reconciliation<LldpNeighborRecord>,
    pub remote_neighbors: Reconciliation<RemoteNeighborRecord>,
    pub mct_member_ports: Reconciliation<MctMemberPortRecord>,
}

impl TopologyDelta {
    pub fn change_count(&self) -> usize {
        self.interfaces.change_count()
            + self.lldp_neighbors.change_count()
            + self.remote_neighbors.change_count()
            + self.mct_member_ports.change_count()
    }
}

fn strip_prefix(ip: &str) -> String {
    ip.split('/').next().unwrap_or_default().to_string()
}

fn speed_label(mbps: u32) -> String {
    match mbps {
        0 => String::new(),
        m if m % 1000 == 0 => format!("{}Gbps", m / 1000),
        m => format!("{}Mbps", m),
    }
}

/// Takes identity from the recorded entry with the same key, or the next
/// free id past `last_id`.
fn carry_identity<T: Reconcilable>(
    recorded: &[T],
    records: &mut [T],
    mut last_id: u64,
    id: fn(&mut T) -> &mut u64,
) {
    let by_key: HashMap<String, &T> = recorded.iter().map(|r| (r.reconcile_key(), r)).collect();
    for record in records {
        match by_key.get(&record.reconcile_key()) {
            Some(old) => record.adopt_identity(old),
            None => {
                last_id += 1;
                *id(record) = last_id;
            }
        }
    }
}

struct Port<'a> {
    status: &'a InterfaceStatus,
    id: u64,
}

struct Node<'a> {
    switch: &'a SwitchDiscovery,
    device_id: u64,
    ports: Vec<Port<'a>>,
}

impl Node<'_> {
    /// The local port of an LLDP entry: by MAC, falling back to the name.
    fn port_of(&self, entry: &LldpNeighbor) -> Option<&Port<'_>> {
        self.ports
            .iter()
            .find(|p| p.status.mac.is_some() && p.status.mac == entry.local_mac)
            .or_else(|| {
                self.ports.iter().find(|p| {
                    p.status.int_name == entry.local_int_name
                        && p.status.int_type.eq_ignore_ascii_case(&entry.local_int_type)
                })
            })
    }
}

/// Builds the topology the switches report, keeping recorded ids.
pub fn build_topology(discovered: &[SwitchDiscovery], recorded: &FabricState) -> FabricState {
    let mut state = FabricState::default();

    let mut last_device = recorded.devices.values().copied().max().unwrap_or(0);
    for switch in discovered {
        let id = recorded.devices.get(&switch.host).copied().unwrap_or_else(|| {
            last_device += 1;
            last_device
        });
        state.devices.insert(switch.host.clone(), id);
    }

    let recorded_interfaces: HashMap<(u64, &str, &str), u64> = recorded
        .interfaces
        .iter()
        .map(|r| ((r.device_id, r.int_type.as_str(), r.int_name.as_str()), r.id))
        .collect();
    let mut last_interface = recorded.interfaces.iter().map(|r| r.id).max().unwrap_or(0);

    let mut nodes = Vec::with_capacity(discovered.len());
    for switch in discovered {
        let device_id = state.devices.get(&switch.host).copied().unwrap_or_default();
        let mut ports = Vec::with_capacity(switch.interfaces.len());
        for status in &switch.interfaces {
            let key = (device_id, status.int_type.as_str(), status.int_name.as_str());
            let id = recorded_interfaces.get(&key).copied().unwrap_or_else(|| {
                last_interface += 1;
                last_interface
            });
            state.interfaces.push(InterfaceRecord {
                id,
                device_id,
                int_type: status.int_type.clone(),
                int_name: status.int_name.clone(),
                speed: speed_label(status.speed_mbps),
                ip_address: status.ip_address.clone().unwrap_or_default(),
                mac: status.mac.clone().unwrap_or_default(),
            });
            ports.push(Port { status, id });
        }
        nodes.push(Node {
            switch,
            device_id,
            ports,
        });
    }

    // One entry per link, keyed by its lower end.
    let mut links: BTreeMap<((u64, u64), (u64, u64)), (usize, usize, usize, usize)> = BTreeMap::new();
    for (a, node) in nodes.iter().enumerate() {
        for (p, port) in node.ports.iter().enumerate() {
            let Some(mac) = port.status.mac.as_ref() else {
                continue;
            };
            for (b, peer) in nodes.iter().enumerate().filter(|(b, _)| *b != a) {
                for entry in peer.switch.lldp.iter().filter(|e| e.remote_mac.as_ref() == Some(mac)) {
                    let Some(q) = peer
                        .port_of(entry)
                        .and_then(|found| peer.ports.iter().position(|x| x.id == found.id))
                    else {
                        debug!(
                            host = %peer.switch.host,
                            port = %entry.local_int_name,
                            "LLDP port is not a discovered interface"
                        );
                        continue;
                    };
                    let one = (node.device_id, port.id);
                    let two = (peer.device_id, peer.ports[q].id);
                    let key = if one <= two { (one, two) } else { (two, one) };
                    links.entry(key).or_insert((a, p, b, q));
                }
            }
        }
    }

    for &(a, p, b, q) in links.values() {
        for ((x, xp), (y, yp)) in [((a, p), (b, q)), ((b, q), (a, p))] {
            let (local, remote) = (&nodes[x], &nodes[y]);
            let (local_port, remote_port) = (&local.ports[xp], &remote.ports[yp]);
            let local_ip = local_port.status.ip_address.as_deref().map(strip_prefix);
            let remote_ip = remote_port.status.ip_address.as_deref().map(strip_prefix);

            state.lldp_neighbors.push(LldpNeighborRecord {
                id: 0,
                device_one_id: local.device_id,
                device_two_id: remote.device_id,
                interface_one_id: local_port.id,
                interface_two_id: remote_port.id,
                interface_one_name: local_port.status.int_name.clone(),
                interface_two_name: remote_port.status.int_name.clone(),
                interface_one_ip: local_ip.unwrap_or_default(),
                interface_two_ip: remote_ip.clone().unwrap_or_default(),
            });

            let (local_role, remote_role) = (local.switch.role, remote.switch.role);
            if local_role.is_edge() && remote_role.is_edge() {
                state.mct_member_ports.push(MctMemberPortRecord {
                    id: 0,
                    cluster_id: MCT_CLUSTER_ID,
                    device_id: local.device_id,
                    remote_device_id: remote.device_id,
                    interface_type: local_port.status.int_type.clone(),
                    interface_name: local_port.status.int_name.clone(),
                    interface_speed: local_port.status.speed_mbps,
                    remote_interface_type: remote_port.status.int_type.clone(),
                    remote_interface_name: remote_port.status.int_name.clone(),
                    remote_interface_speed: remote_port.status.speed_mbps,
                });
            } else if local_role != remote_role {
                match remote_ip {
                    Some(remote_ip) => state.remote_neighbors.push(RemoteNeighborRecord {
                        id: 0,
                        device_id: local.device_id,
                        remote_device_id: remote.device_id,
                        remote_interface_id: remote_port.id,
                        remote_ip_address: remote_ip,
                        remote_as: remote.switch.local_as.to_string(),
                        encapsulation_type: String::new(),
                    }),
                    None => warn!(
                        host = %remote.switch.host,
                        interface = %remote_port.status.int_name,
                        "Fabric link has no address, no BGP neighbor recorded"
                    ),
                }
            }
        }
    }

    carry_identity(
        &recorded.lldp_neighbors,
        &mut state.lldp_neighbors,
        recorded.lldp_neighbors.iter().map(|r| r.id).max().unwrap_or(0),
        |r| &mut r.id,
    );
    carry_identity(
        &recorded.remote_neighbors,
        &mut state.remote_neighbors,
        recorded.remote_neighbors.iter().map(|r| r.id).max().unwrap_or(0),
        |r| &mut r.id,
    );
    carry_identity(
        &recorded.mct_member_ports,
        &mut state.mct_member_ports,
        recorded.mct_member_ports.iter().map(|r| r.id).max().unwrap_or(0),
        |r| &mut r.id,
    );
    state
}

/// Interfaces are keyed per device, everything else fabric-wide.
pub fn reconcile_topology(recorded: &FabricState, discovered: &FabricState) -> TopologyDelta {
    let device_ids: BTreeSet<u64> = recorded
        .interfaces
        .iter()
        .chain(&discovered.interfaces)
        .map(|r| r.device_id)
        .collect();
    let mut interfaces = Reconciliation {
        created: Vec::new(),
        deleted: Vec::new(),
        updated: Vec::new(),
    };
    for device_id in device_ids {
        let of = |records: &[InterfaceRecord]| -> Vec<InterfaceRecord> {
            records
                .iter()
                .filter(|r| r.device_id == device_id)
                .cloned()
                .collect()
        };
        let delta = reconcile(of(&recorded.interfaces), of(&discovered.interfaces));
        interfaces.created.extend(delta.created);
        interfaces.deleted.extend(delta.deleted);
        interfaces.updated.extend(delta.updated);
    }

    TopologyDelta {
        interfaces,
        lldp_neighbors: reconcile(
            recorded.lldp_neighbors.clone(),
            discovered.lldp_neighbors.clone(),
        ),
        remote_neighbors: reconcile(
            recorded.remote_neighbors.clone(),
            discovered.remote_neighbors.clone(),
        ),
        mct_member_ports: reconcile(
            recorded.mct_member_ports.clone(),
            discovered.mct_member_ports.clone(),
        ),
    }
}

/// Outcome of [`discover_fabric`].
#[derive(Debug)]
pub struct DiscoveryReport {
    pub fan_out: FanOut<SwitchDiscovery>,
    /// The new state and its delta; `None` when any switch failed, since a
    /// partial view would delete the records of the missing switches.
    pub topology: Option<(FabricState, TopologyDelta)>,
}

/// Discovers every switch after the pre-flight check passes and reconciles
/// the result against `recorded`.
#[instrument(skip_all)]
pub async fn discover_fabric(
    orchestrator: &Orchestrator,
    cancel: &CancellationToken,
    discover: DiscoverSwitch,
    recorded: &FabricState,
) -> ActionResult<DiscoveryReport> {
    let targets = discover.targets();
    orchestrator.preflight(&targets)?;
    let fan_out = orchestrator
        .run_fan_out(cancel, &targets, DISCOVER_OPERATION, Arc::new(discover))
        .await;

    if !fan_out.is_success() {
        warn!(failed = fan_out.errors.len(), "Topology left unreconciled");
        return Ok(DiscoveryReport {
            fan_out,
            topology: None,
        });
    }

    let switches: Vec<SwitchDiscovery> = fan_out.results.iter().map(|c| c.value.clone()).collect();
    let state = build_topology(&switches, recorded);
    let delta = reconcile_topology(recorded, &state);
    info!(
        devices = state.devices.len(),
        links = state.lldp_neighbors.len() / 2,
        changes = delta.change_count(),
        "Topology reconciled"
    );
    Ok(DiscoveryReport {
        fan_out,
        topology: Some((state, delta)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_device::AdapterRegistry;
    use fabric_test::{fixtures, replies, DeviceScript, Failure, ScriptedTransportFactory};
    use pretty_assertions::assert_eq;

    fn port(name: &str, mac: &str, mbps: u32, ip: Option<&str>) -> InterfaceStatus {
        InterfaceStatus {
            int_type: "ethernet".to_string(),
            int_name: name.to_string(),
            ip_address: ip.map(str::to_string),
            mac: Some(mac.to_string()),
            speed_mbps: mbps,
            state: Some("up".to_string()),
        }
    }

    fn seen(local: &str, local_mac: &str, remote: &str, remote_mac: &str) -> LldpNeighbor {
        LldpNeighbor {
            local_int_type: "Ethernet".to_string(),
            local_int_name: local.to_string(),
            local_mac: Some(local_mac.to_string()),
            remote_int_type: "Eth".to_string(),
            remote_int_name: remote.to_string(),
            remote_mac: Some(remote_mac.to_string()),
        }
    }

    /// One spine, two leaves, each leaf uplinked once and cross-linked once.
    fn fabric() -> Vec<SwitchDiscovery> {
        vec![
            SwitchDiscovery {
                host: "10.24.39.1".to_string(),
                role: Role::Spine,
                local_as: 64512,
                interfaces: vec![
                    port("0/1", "00:00:00:00:01:01", 100_000, Some("10.10.10.0/31")),
                    port("0/2", "00:00:00:00:01:02", 100_000, Some("10.10.10.2/31")),
                ],
                lldp: vec![
                    seen("0/1", "00:00:00:00:01:01", "0/49", "00:00:00:00:11:49"),
                    seen("0/2", "00:00:00:00:01:02", "0/49", "00:00:00:00:12:49"),
                ],
            },
            SwitchDiscovery {
                host: "10.24.39.11".to_string(),
                role: Role::Leaf,
                local_as: 65001,
                interfaces: vec![
                    port("0/48", "00:00:00:00:11:48", 100_000, None),
                    port("0/49", "00:00:00:00:11:49", 100_000, Some("10.10.10.1/31")),
                ],
                lldp: vec![
                    seen("0/48", "00:00:00:00:11:48", "0/48", "00:00:00:00:12:48"),
                    seen("0/49", "00:00:00:00:11:49", "0/1", "00:00:00:00:01:01"),
                ],
            },
            SwitchDiscovery {
                host: "10.24.39.12".to_string(),
                role: Role::Leaf,
                local_as: 65002,
                interfaces: vec![
                    port("0/48", "00:00:00:00:12:48", 40_000, None),
                    port("0/49", "00:00:00:00:12:49", 100_000, Some("10.10.10.3/31")),
                ],
                lldp: vec![
                    seen("0/48", "00:00:00:00:12:48", "0/48", "00:00:00:00:11:48"),
                    seen("0/49", "00:00:00:00:12:49", "0/2", "00:00:00:00:01:02"),
                ],
            },
        ]
    }

    #[test]
    fn test_links_become_neighbors_and_member_ports() {
        let state = build_topology(&fabric(), &FabricState::default());
        assert_eq!(state.devices.len(), 3);
        assert_eq!(state.devices.get("10.24.39.1"), Some(&1));
        assert_eq!(state.interfaces.len(), 6);
        assert_eq!(state.interfaces[0].speed, "100Gbps");

        // three links, recorded from both ends
        assert_eq!(state.lldp_neighbors.len(), 6);
        let uplink = state
            .lldp_neighbors
            .iter()
            .find(|n| n.device_one_id == 1 && n.interface_one_name == "0/1")
            .unwrap();
        assert_eq!(uplink.device_two_id, 2);
        assert_eq!(uplink.interface_one_ip, "10.10.10.0");
        assert_eq!(uplink.interface_two_ip, "10.10.10.1");

        let mut remote: Vec<(u64, &str, &str)> = state
            .remote_neighbors
            .iter()
            .map(|n| (n.device_id, n.remote_ip_address.as_str(), n.remote_as.as_str()))
            .collect();
        remote.sort();
        assert_eq!(
            remote,
            vec![
                (1, "10.10.10.1", "65001"),
                (1, "10.10.10.3", "65002"),
                (2, "10.10.10.0", "64512"),
                (3, "10.10.10.2", "64512"),
            ]
        );

        assert_eq!(state.mct_member_ports.len(), 2);
        let member = state
            .mct_member_ports
            .iter()
            .find(|m| m.device_id == 2)
            .unwrap();
        assert_eq!(member.cluster_id, MCT_CLUSTER_ID);
        assert_eq!(member.interface_name, "0/48");
        assert_eq!(member.interface_speed, 100_000);
        assert_eq!(member.remote_interface_speed, 40_000);

        let mut ids: Vec<u64> = state.lldp_neighbors.iter().map(|n| n.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_one_sided_lldp_still_records_both_ends() {
        let mut switches = fabric();
        switches[0].lldp.clear();
        switches[2].lldp.clear();

        let state = build_topology(&switches, &FabricState::default());
        // leaf 1 still sees both its uplink and its MCT peer
        assert_eq!(state.lldp_neighbors.len(), 4);
        assert_eq!(state.mct_member_ports.len(), 2);
    }

    #[test]
    fn test_rediscovery_keeps_ids_and_reports_changes() {
        let recorded = build_topology(&fabric(), &FabricState::default());
        assert_eq!(
            reconcile_topology(&recorded, &build_topology(&fabric(), &recorded)).change_count(),
            0
        );

        let mut switches = fabric();
        switches[2].interfaces[1].ip_address = Some("10.10.10.5/31".to_string());
        switches[2].interfaces[0].speed_mbps = 100_000;
        let state = build_topology(&switches, &recorded);
        assert_eq!(state.devices, recorded.devices);

        let delta = reconcile_topology(&recorded, &state);
        assert_eq!(delta.interfaces.updated.len(), 1);
        let updated = &delta.interfaces.updated[0];
        assert_eq!(updated.new.id, updated.old.id);
        assert_eq!(updated.new.ip_address, "10.10.10.5/31");
        // the spine's view of that link changes too
        assert_eq!(delta.lldp_neighbors.updated.len(), 2);
        assert_eq!(delta.remote_neighbors.updated.len(), 1);
        assert_eq!(delta.remote_neighbors.updated[0].new.remote_ip_address, "10.10.10.5");
        assert_eq!(delta.mct_member_ports.updated.len(), 2);
        assert!(delta.interfaces.created.is_empty() && delta.interfaces.deleted.is_empty());
    }

    #[test]
    fn test_removed_switch_deletes_its_records() {
        let recorded = build_topology(&fabric(), &FabricState::default());
        let mut switches = fabric();
        switches.truncate(2);

        let state = build_topology(&switches, &recorded);
        let delta = reconcile_topology(&recorded, &state);
        assert_eq!(delta.interfaces.deleted.len(), 2);
        assert!(delta.interfaces.deleted.iter().all(|r| r.device_id == 3));
        assert_eq!(delta.mct_member_ports.deleted.len(), 2);
        assert_eq!(delta.lldp_neighbors.deleted.len(), 4);
    }

    #[test]
    fn test_state_file_round_trip_defaults() {
        let state: FabricState = serde_json::from_str(r#"{"devices":{"10.24.39.1":1}}"#).unwrap();
        assert_eq!(state.devices.get("10.24.39.1"), Some(&1));
        assert!(state.interfaces.is_empty());
    }

    fn leaf_script(mac: &str, peer_mac: &str) -> DeviceScript {
        DeviceScript::new()
            .on_rpc(
                "get-interface-detail",
                replies::interface_detail(&[("ethernet", "0/49", mac, "100Gbps")]),
            )
            .on_rpc(
                "get-ip-interface",
                replies::ip_interfaces(&[("ethernet", "0/49", "10.10.10.1/31")]),
            )
            .on_rpc(
                "get-lldp-neighbor-detail",
                replies::lldp_neighbors(&[("Eth 0/49", mac, "Eth 0/1", peer_mac)]),
            )
    }

    #[tokio::test]
    async fn test_discover_fabric_over_the_wire() {
        let factory = Arc::new(
            ScriptedTransportFactory::new()
                .with_device(
                    "10.24.39.1",
                    DeviceScript::new()
                        .on_rpc(
                            "get-interface-detail",
                            replies::interface_detail(&[("ethernet", "0/1", "0027.f8ca.0101", "100Gbps")]),
                        )
                        .on_rpc(
                            "get-ip-interface",
                            replies::ip_interfaces(&[("ethernet", "0/1", "10.10.10.0/31")]),
                        ),
                )
                .with_device("10.24.39.11", leaf_script("0027.f8ca.1149", "0027.f8ca.0101")),
        );
        let orch = Orchestrator::new(Arc::new(AdapterRegistry::new()), factory.clone());
        let discover = DiscoverSwitch::new(vec![
            SwitchIntent::new(fixtures::spine("10.24.39.1"), 64512),
            SwitchIntent::new(fixtures::leaf("10.24.39.11"), 65001),
        ]);

        let report = discover_fabric(&orch, &CancellationToken::new(), discover, &FabricState::default())
            .await
            .unwrap();
        assert!(report.fan_out.is_success(), "{:?}", report.fan_out.errors);
        let (state, delta) = report.topology.unwrap();
        assert_eq!(state.lldp_neighbors.len(), 2);
        assert_eq!(state.remote_neighbors.len(), 2);
        assert_eq!(delta.interfaces.created.len(), 2);
        assert_eq!(delta.remote_neighbors.created.len(), 2);
        assert_eq!(
            state.interfaces[0].mac,
            "00:27:f8:ca:01:01",
        );
    }

    #[tokio::test]
    async fn test_failed_switch_leaves_topology_unreconciled() {
        let factory = Arc::new(
            ScriptedTransportFactory::new()
                .with_device("10.24.39.11", leaf_script("0027.f8ca.1149", "0027.f8ca.0101"))
                .with_device(
                    "10.24.39.12",
                    DeviceScript::new().fail_rpc(
                        "get-lldp-neighbor-detail",
                        Failure::Protocol("%Error: LLDP is disabled".into()),
                    ),
                ),
        );
        let orch = Orchestrator::new(Arc::new(AdapterRegistry::new()), factory);
        let discover = DiscoverSwitch::new(vec![
            SwitchIntent::new(fixtures::leaf("10.24.39.11"), 65001),
            SwitchIntent::new(fixtures::leaf("10.24.39.12"), 65002),
        ]);

        let report = discover_fabric(&orch, &CancellationToken::new(), discover, &FabricState::default())
            .await
            .unwrap();
        assert!(report.topology.is_none());
        assert_eq!(report.fan_out.errors.len(), 1);
        assert_eq!(report.fan_out.errors[0].operation, "Fetch LLDP Neighbors");
    }
}
