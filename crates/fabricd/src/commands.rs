//! Dispatch of fabricd subcommands onto the fabric workflows.

use std::fs;
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use fabric_actions::{
    configure_fabric, deconfigure_fabric, discover_fabric, fetch_fabric, poll_management_cluster,
    ConfigureSummary, ConfigureSwitch, DeconfigureSummary, DeconfigureSwitch, DiscoverSwitch,
    DiscoveryReport, FabricState, FanOut, FetchSwitch, Orchestrator, SwitchDiscovery,
    SwitchSnapshot, TopologyDelta,
};
use fabric_common::Reconciliation;
use fabric_device::adapter::ManagementClusterStatus;
use fabric_device::{translate_model_string, AdapterRegistry, DeviceTarget, TransportFactory};
use itertools::Itertools;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::config::FabricConfig;
use crate::Command;

/// Runs commands against the devices of one inventory.
pub struct Runner {
    config: FabricConfig,
    orchestrator: Orchestrator,
    json: bool,
}

impl Runner {
    pub fn new(config: FabricConfig, factory: Arc<dyn TransportFactory>, json: bool) -> Self {
        Self {
            config,
            orchestrator: Orchestrator::new(Arc::new(AdapterRegistry::new()), factory),
            json,
        }
    }

    /// Runs `command`, writing one summary per device to `out`.
    ///
    /// Returns `false` when any device failed.
    #[instrument(skip(self, cancel, out), fields(devices = self.config.devices.len()))]
    pub async fn execute<W: Write>(
        &self,
        command: &Command,
        cancel: &CancellationToken,
        out: &mut W,
    ) -> Result<bool> {
        match command {
            Command::Check => self.check(out),
            Command::Models => self.models(out),
            Command::Fetch { loopbacks } => {
                let fetch = FetchSwitch {
                    loopback_ids: loopbacks.clone(),
                };
                let fan_out =
                    fetch_fabric(&self.orchestrator, cancel, &self.config.targets()?, fetch).await?;
                self.report(out, fan_out, render_snapshot)
            }
            Command::Configure { persist, force } => {
                let configure =
                    ConfigureSwitch::new(self.config.intents()?, self.config.bgp_settings()?)
                        .persist(*persist)
                        .force(*force);
                let fan_out = configure_fabric(&self.orchestrator, cancel, configure).await?;
                self.report(out, fan_out, render_configure)
            }
            Command::Deconfigure { persist } => {
                let deconfigure = DeconfigureSwitch::new(self.config.intents()?).persist(*persist);
                let fan_out = deconfigure_fabric(&self.orchestrator, cancel, deconfigure).await?;
                self.report(out, fan_out, render_deconfigure)
            }
            Command::Discover { state, dry_run } => {
                let recorded = load_state(state)?;
                let discover = DiscoverSwitch::new(self.config.intents()?);
                let DiscoveryReport { fan_out, topology } =
                    discover_fabric(&self.orchestrator, cancel, discover, &recorded).await?;
                let ok = self.report(out, fan_out, render_discovery)?;
                let Some((discovered, delta)) = topology else {
                    return Ok(ok);
                };
                self.report_topology(out, &delta)?;
                if !*dry_run {
                    save_state(state, &discovered)?;
                    info!(state = %state.display(), "Recorded topology");
                }
                Ok(ok)
            }
            Command::ClusterStatus { hosts } => {
                let members = self.cluster_members(hosts)?;
                let fan_out = poll_management_cluster(
                    &self.orchestrator,
                    cancel,
                    &members,
                    self.config.poll_policy(),
                )
                .await?;
                self.report(out, fan_out, render_cluster)
            }
        }
    }

    fn check<W: Write>(&self, out: &mut W) -> Result<bool> {
        let targets = self.config.targets()?;
        if let Err(e) = self.orchestrator.preflight(&targets) {
            if self.json {
                writeln!(out, "{}", json!({ "status": "failed", "error": e.to_string() }))?;
            } else {
                writeln!(out, "{}", e)?;
            }
            return Ok(false);
        }

        for target in &targets {
            let sku = translate_model_string(&target.model);
            if self.json {
                let line = json!({
                    "host": target.host,
                    "model": target.model,
                    "sku": sku,
                    "status": "supported",
                });
                writeln!(out, "{}", line)?;
            } else {
                writeln!(out, "{}: {} ({}) supported", target.host, target.model, sku)?;
            }
        }
        Ok(true)
    }

    fn models<W: Write>(&self, out: &mut W) -> Result<bool> {
        for entry in self.orchestrator.registry().entries() {
            if self.json {
                let line = json!({ "key": entry.key, "sku": entry.sku, "adapter": entry.adapter });
                writeln!(out, "{}", line)?;
            } else {
                writeln!(out, "{:<16} {:<28} {}", entry.key, entry.sku, entry.adapter)?;
            }
        }
        Ok(true)
    }

    /// The requested hosts, or every edge device when none are named.
    fn cluster_members(&self, hosts: &[String]) -> Result<Vec<DeviceTarget>> {
        let targets = self.config.targets()?;
        let members: Vec<DeviceTarget> = if hosts.is_empty() {
            targets.into_iter().filter(|t| t.role.is_edge()).collect()
        } else {
            hosts
                .iter()
                .map(|host| {
                    targets
                        .iter()
                        .find(|t| &t.host == host)
                        .cloned()
                        .with_context(|| format!("{} is not in the inventory", host))
                })
                .collect::<Result<_>>()?
        };

        if members.is_empty() {
            bail!("no management cluster members: name them with --host or add leaf devices");
        }
        Ok(members)
    }

    fn report_topology<W: Write>(&self, out: &mut W, delta: &TopologyDelta) -> Result<()> {
        let tables = [
            ("interfaces", counts(&delta.interfaces)),
            ("lldp-neighbors", counts(&delta.lldp_neighbors)),
            ("remote-neighbors", counts(&delta.remote_neighbors)),
            ("mct-member-ports", counts(&delta.mct_member_ports)),
        ];
        for (table, (created, deleted, updated)) in tables {
            if self.json {
                let line = json!({
                    "table": table,
                    "created": created,
                    "deleted": deleted,
                    "updated": updated,
                });
                writeln!(out, "{}", line)?;
            } else {
                writeln!(
                    out,
                    "{}: created {} deleted {} updated {}",
                    table, created, deleted, updated
                )?;
            }
        }
        Ok(())
    }

    fn report<W: Write, R: Serialize>(
        &self,
        out: &mut W,
        fan_out: FanOut<R>,
        render: fn(&R) -> String,
    ) -> Result<bool> {
        info!(
            succeeded = fan_out.results.len(),
            failed = fan_out.errors.len(),
            "Command finished"
        );

        if self.json {
            for done in &fan_out.results {
                let line = json!({ "host": done.host, "status": "ok", "result": done.value });
                writeln!(out, "{}", line)?;
            }
            for error in &fan_out.errors {
                let line = json!({
                    "host": error.host,
                    "status": "failed",
                    "operation": error.operation,
                    "error": error.error.to_string(),
                });
                writeln!(out, "{}", line)?;
            }
        } else {
            for done in &fan_out.results {
                writeln!(out, "{}: {}", done.host, render(&done.value))?;
            }
            if let Some(report) = fan_out.report() {
                writeln!(out, "{} device(s) failed:", report.len())?;
                write!(out, "{}", report)?;
            }
        }
        Ok(fan_out.is_success())
    }
}

/// The recorded topology; a missing file is an empty fabric.
fn load_state(path: &Path) -> Result<FabricState> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse state file {}", path.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FabricState::default()),
        Err(e) => Err(e).with_context(|| format!("failed to read state file {}", path.display())),
    }
}

fn save_state(path: &Path, state: &FabricState) -> Result<()> {
    let contents = serde_json::to_string_pretty(state)?;
    fs::write(path, contents)
        .with_context(|| format!("failed to write state file {}", path.display()))
}

fn counts<T>(delta: &Reconciliation<T>) -> (usize, usize, usize) {
    (delta.created.len(), delta.deleted.len(), delta.updated.len())
}

fn join(addresses: &[Ipv4Addr]) -> String {
    addresses.iter().join(",")
}

fn render_snapshot(snapshot: &SwitchSnapshot) -> String {
    let mut line = format!(
        "{} {} local-as {} neighbors {} router-id {}",
        snapshot.role,
        snapshot.model,
        snapshot.bgp.local_as.as_deref().unwrap_or("-"),
        snapshot.bgp.neighbors.len(),
        snapshot
            .router_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    line.push_str(&format!(
        " loopbacks [{}]",
        snapshot.loopbacks.iter().map(|lo| lo.id).join(",")
    ));
    if let Some(gateway) = &snapshot.overlay_gateway {
        line.push_str(&format!(" overlay-gateway {}", gateway.name));
    }
    if let Some(cluster) = &snapshot.cluster {
        line.push_str(&format!(" cluster {}", cluster.name));
    }
    line
}

/// ` key value` for each set field.
fn render_optional(fields: &[(&str, Option<String>)]) -> String {
    fields
        .iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| format!(" {} {}", key, v)))
        .collect()
}

fn listed(items: &[String]) -> Option<String> {
    (!items.is_empty()).then(|| format!("[{}]", items.join(",")))
}

fn render_configure(summary: &ConfigureSummary) -> String {
    format!(
        "created [{}] deleted [{}] updated [{}] evpn {} router-id {}{}{}",
        join(&summary.neighbors_created),
        join(&summary.neighbors_deleted),
        join(&summary.neighbors_updated),
        summary.evpn_neighbors,
        summary
            .router_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string()),
        render_optional(&[
            ("interfaces", listed(&summary.interfaces)),
            ("l2-mtu", summary.l2_mtu.map(|m| m.to_string())),
            ("ip-mtu", summary.ip_mtu.map(|m| m.to_string())),
            ("evpn-instance", summary.evpn_instance.clone()),
            ("cluster", summary.cluster.clone()),
            ("overlay-gateway", summary.overlay_gateway.clone()),
        ]),
        if summary.persisted { " persisted" } else { "" },
    )
}

fn render_deconfigure(summary: &DeconfigureSummary) -> String {
    format!(
        "evpn {} loopback {}{}{}{}",
        summary.evpn_neighbors,
        summary
            .loopback_deleted
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string()),
        render_optional(&[
            ("interfaces", listed(&summary.interfaces_cleared)),
            ("overlay-gateway", summary.overlay_gateway_deleted.clone()),
            ("cluster", summary.cluster_deleted.clone()),
            ("evpn-instance", summary.evpn_instance_deleted.clone()),
        ]),
        if summary.mtu_reset { " mtu-reset" } else { "" },
        if summary.persisted { " persisted" } else { "" },
    )
}

fn render_discovery(discovery: &SwitchDiscovery) -> String {
    format!(
        "{} interfaces {} lldp-neighbors {}",
        discovery.role,
        discovery.interfaces.len(),
        discovery.lldp.len()
    )
}

fn render_cluster(status: &ManagementClusterStatus) -> String {
    format!(
        "operational, {} nodes, principal {}",
        status.total_nodes_in_cluster.trim(),
        status.principal().map(|p| p.mgmt_ip.as_str()).unwrap_or("-"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use fabric_actions::NeighborIntent;
    use fabric_device::adapter::templates;
    use fabric_test::{fixtures, replies, DeviceScript, Failure, ScriptedTransportFactory};
    use pretty_assertions::assert_eq;

    fn device(host: &str, model: &str, role: &str) -> DeviceConfig {
        DeviceConfig {
            host: host.to_string(),
            user: fixtures::USER.to_string(),
            password: fixtures::PASSWORD.to_string(),
            model: model.to_string(),
            role: role.to_string(),
            loopback_ip: None,
            loopback_id: 1,
            router_id: None,
            local_as: None,
            network: None,
            neighbors: Vec::new(),
            evpn_peers: Vec::new(),
            interfaces: Vec::new(),
            cluster: None,
        }
    }

    fn fabric(devices: Vec<DeviceConfig>) -> FabricConfig {
        FabricConfig {
            devices,
            ..FabricConfig::default()
        }
    }

    async fn run(runner: &Runner, command: Command) -> (bool, String) {
        let mut out = Vec::new();
        let ok = runner
            .execute(&command, &CancellationToken::new(), &mut out)
            .await
            .unwrap();
        (ok, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_check_reports_unsupported_model() {
        let factory = Arc::new(ScriptedTransportFactory::new());
        let runner = Runner::new(
            fabric(vec![
                device("10.24.39.1", fixtures::SPINE_MODEL, "spine"),
                device("10.24.39.9", fixtures::UNKNOWN_MODEL, "spine"),
            ]),
            factory.clone(),
            false,
        );

        let (ok, out) = run(&runner, Command::Check).await;
        assert!(!ok);
        assert!(out.contains("10.24.39.9"), "{}", out);
        assert!(factory.connected_hosts().is_empty());
    }

    #[tokio::test]
    async fn test_check_lists_supported_devices() {
        let runner = Runner::new(
            fabric(vec![device("10.24.39.1", fixtures::SPINE_MODEL, "spine")]),
            Arc::new(ScriptedTransportFactory::new()),
            false,
        );

        let (ok, out) = run(&runner, Command::Check).await;
        assert!(ok);
        assert!(out.starts_with("10.24.39.1: 4000_18r.1.01a ("));
        assert!(out.trim_end().ends_with("supported"));
    }

    #[tokio::test]
    async fn test_models_lists_registry() {
        let runner = Runner::new(FabricConfig::default(), Arc::new(ScriptedTransportFactory::new()), true);

        let (ok, out) = run(&runner, Command::Models).await;
        assert!(ok);
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), AdapterRegistry::new().entries().len());
        assert!(lines.iter().all(|line| line["adapter"].is_string()));
    }

    #[tokio::test]
    async fn test_configure_summary_and_failure_report() {
        let mut spine = device("10.24.39.1", fixtures::SPINE_MODEL, "spine");
        spine.loopback_ip = Some(Ipv4Addr::new(172, 31, 254, 1));
        spine.neighbors = vec![NeighborIntent::new(Ipv4Addr::new(10, 10, 10, 2), 65001)];
        let factory = Arc::new(ScriptedTransportFactory::new().with_device(
            "10.24.39.2",
            DeviceScript::new().fail_get(
                templates::FILTER_ROUTER_BGP,
                Failure::Protocol("%Error: bgp busy".into()),
            ),
        ));
        let runner = Runner::new(
            fabric(vec![spine, device("10.24.39.2", fixtures::SPINE_MODEL, "spine")]),
            factory,
            false,
        );

        let (ok, out) = run(
            &runner,
            Command::Configure {
                persist: false,
                force: false,
            },
        )
        .await;
        assert!(!ok);
        assert!(
            out.contains("10.24.39.1: created [10.10.10.2] deleted [] updated [] evpn 0 router-id 172.31.254.1"),
            "{}",
            out
        );
        assert!(out.contains("1 device(s) failed:"));
        assert!(out.contains(
            "\tOn the device[10.24.39.2], the operation[Fetch Router BGP] has failed"
        ));
    }

    #[test]
    fn test_render_overlay_summaries() {
        let summary = ConfigureSummary {
            evpn_neighbors: 2,
            interfaces: vec!["ethernet 0/1".to_string(), "ethernet 0/2".to_string()],
            l2_mtu: Some(9216),
            cluster: Some("fabric1-cluster-1".to_string()),
            overlay_gateway: Some("fabric1".to_string()),
            persisted: true,
            ..Default::default()
        };
        assert_eq!(
            render_configure(&summary),
            "created [] deleted [] updated [] evpn 2 router-id - \
             interfaces [ethernet 0/1,ethernet 0/2] l2-mtu 9216 \
             cluster fabric1-cluster-1 overlay-gateway fabric1 persisted"
        );

        let summary = DeconfigureSummary {
            overlay_gateway_deleted: Some("fabric1".to_string()),
            mtu_reset: true,
            ..Default::default()
        };
        assert_eq!(
            render_deconfigure(&summary),
            "evpn 0 loopback - overlay-gateway fabric1 mtu-reset"
        );
    }

    #[tokio::test]
    async fn test_fetch_json_lines() {
        let factory = Arc::new(ScriptedTransportFactory::new().with_device(
            "10.24.39.1",
            DeviceScript::new().on_get(
                templates::FILTER_ROUTER_BGP,
                replies::router_bgp(64512, "spine-group", &[("10.10.10.2", 65001)]),
            ),
        ));
        let runner = Runner::new(
            fabric(vec![device("10.24.39.1", fixtures::SPINE_MODEL, "spine")]),
            factory,
            true,
        );

        let (ok, out) = run(&runner, Command::Fetch { loopbacks: vec![] }).await;
        assert!(ok);
        let line: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(line["host"], "10.24.39.1");
        assert_eq!(line["status"], "ok");
        assert_eq!(line["result"]["role"], "spine");
    }

    #[tokio::test]
    async fn test_cluster_members_default_to_edge_devices() {
        let runner = Runner::new(
            fabric(vec![
                device("10.24.39.1", fixtures::SPINE_MODEL, "spine"),
                device("10.24.39.11", fixtures::LEAF_MODEL, "leaf"),
                device("10.24.39.12", fixtures::LEAF_MODEL, "rack"),
            ]),
            Arc::new(ScriptedTransportFactory::new()),
            false,
        );

        let members = runner.cluster_members(&[]).unwrap();
        let hosts: Vec<&str> = members.iter().map(|m| m.host.as_str()).collect();
        assert_eq!(hosts, vec!["10.24.39.11", "10.24.39.12"]);

        let err = runner
            .cluster_members(&["10.24.39.99".to_string()])
            .unwrap_err();
        assert_eq!(err.to_string(), "10.24.39.99 is not in the inventory");
    }

    #[tokio::test]
    async fn test_cluster_status_without_members_fails() {
        let runner = Runner::new(
            fabric(vec![device("10.24.39.1", fixtures::SPINE_MODEL, "spine")]),
            Arc::new(ScriptedTransportFactory::new()),
            false,
        );

        let err = runner
            .execute(
                &Command::ClusterStatus { hosts: vec![] },
                &CancellationToken::new(),
                &mut Vec::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("no management cluster members"));
    }

    fn discovery_factory() -> Arc<ScriptedTransportFactory> {
        Arc::new(
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
                .with_device(
                    "10.24.39.11",
                    DeviceScript::new()
                        .on_rpc(
                            "get-interface-detail",
                            replies::interface_detail(&[("ethernet", "0/49", "0027.f8ca.1149", "100Gbps")]),
                        )
                        .on_rpc(
                            "get-ip-interface",
                            replies::ip_interfaces(&[("ethernet", "0/49", "10.10.10.1/31")]),
                        )
                        .on_rpc(
                            "get-lldp-neighbor-detail",
                            replies::lldp_neighbors(&[(
                                "Eth 0/49",
                                "0027.f8ca.1149",
                                "Eth 0/1",
                                "0027.f8ca.0101",
                            )]),
                        ),
                ),
        )
    }

    #[tokio::test]
    async fn test_discover_records_then_reports_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("topology.json");
        let config = fabric(vec![
            device("10.24.39.1", fixtures::SPINE_MODEL, "spine"),
            device("10.24.39.11", fixtures::LEAF_MODEL, "leaf"),
        ]);

        let runner = Runner::new(config.clone(), discovery_factory(), false);
        let command = Command::Discover {
            state: state.clone(),
            dry_run: false,
        };
        let (ok, out) = run(&runner, command.clone()).await;
        assert!(ok);
        assert!(out.contains("10.24.39.11: leaf interfaces 1 lldp-neighbors 1"));
        assert!(out.contains("lldp-neighbors: created 2 deleted 0 updated 0"));
        assert!(out.contains("remote-neighbors: created 2 deleted 0 updated 0"));

        let recorded: FabricState =
            serde_json::from_str(&std::fs::read_to_string(&state).unwrap()).unwrap();
        assert_eq!(recorded.interfaces.len(), 2);

        let runner = Runner::new(config, discovery_factory(), false);
        let (ok, out) = run(&runner, command).await;
        assert!(ok);
        assert!(out.contains("interfaces: created 0 deleted 0 updated 0"));
        assert!(out.contains("lldp-neighbors: created 0 deleted 0 updated 0"));
    }

    #[tokio::test]
    async fn test_discover_dry_run_leaves_state_alone() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("topology.json");
        let runner = Runner::new(
            fabric(vec![device("10.24.39.1", fixtures::SPINE_MODEL, "spine")]),
            discovery_factory(),
            true,
        );

        let (ok, out) = run(
            &runner,
            Command::Discover {
                state: state.clone(),
                dry_run: true,
            },
        )
        .await;
        assert!(ok);
        assert!(out.contains("\"table\":\"interfaces\""));
        assert!(!state.exists());
    }
}
