//! Wait for the management cluster to form.
//!
//! Every intended member polls its own view of the cluster. A member is done
//! once it reports exactly the intended node count and every node it lists is
//! an intended member.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use fabric_common::{poll_until, PollError, PollPolicy};
use fabric_device::adapter::ManagementClusterStatus;
use fabric_device::{DeviceError, DeviceResult, DeviceTarget};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::{ActionError, ActionResult, StepFailure};
use crate::orchestrator::{DeviceContext, DeviceOperation, FanOut, Orchestrator};

pub const POLL_CLUSTER_OPERATION: &str = "Poll for management cluster status";

/// Largest management cluster a fabric may form.
pub const MAX_CLUSTER_MEMBERS: usize = 2;

/// True when `status` lists exactly the `intended` management addresses.
pub fn is_operational(status: &ManagementClusterStatus, intended: &HashSet<String>) -> DeviceResult<bool> {
    let total = status.total_nodes()?;
    if total != intended.len() || status.members.len() < total {
        return Ok(false);
    }
    Ok(status
        .members
        .iter()
        .take(total)
        .all(|member| intended.contains(member.mgmt_ip.trim())))
}

struct PollCluster {
    intended: HashSet<String>,
    policy: PollPolicy,
}

#[async_trait]
impl DeviceOperation for PollCluster {
    type Output = ManagementClusterStatus;

    async fn run(&self, ctx: DeviceContext<'_>) -> Result<ManagementClusterStatus, StepFailure> {
        let DeviceContext {
            target,
            adapter,
            transport,
            cancel,
        } = ctx;

        // Each check borrows the session in turn.
        let session = Mutex::new(transport);
        let outcome = poll_until(&self.policy, cancel, |attempt| {
            let session = &session;
            async move {
                let mut transport = session.lock().await;
                let status = adapter
                    .get_management_cluster_status(&mut **transport)
                    .await?;
                debug!(
                    host = %target.host,
                    attempt,
                    principal = status.principal().map(|p| p.mgmt_ip.as_str()).unwrap_or(""),
                    nodes = %status.total_nodes_in_cluster,
                    "Polled management cluster"
                );
                Ok::<_, DeviceError>(is_operational(&status, &self.intended)?.then_some(status))
            }
        })
        .await;

        match outcome {
            Ok(status) => {
                info!(host = %target.host, "Management cluster is operational");
                Ok(status)
            }
            Err(PollError::TimedOut { elapsed }) => {
                Err(ActionError::ClusterNotOperational { elapsed }.into())
            }
            Err(PollError::Cancelled) => Err(DeviceError::Cancelled.into()),
            Err(PollError::Check(e)) => Err(e.into()),
        }
    }
}

/// Polls every member until each reports the intended cluster.
///
/// More than [`MAX_CLUSTER_MEMBERS`] members is rejected before any device is
/// contacted.
#[instrument(skip_all, fields(members = members.len()))]
pub async fn poll_management_cluster(
    orchestrator: &Orchestrator,
    cancel: &CancellationToken,
    members: &[DeviceTarget],
    policy: PollPolicy,
) -> ActionResult<FanOut<ManagementClusterStatus>> {
    if members.len() > MAX_CLUSTER_MEMBERS {
        return Err(ActionError::ClusterTooLarge {
            requested: members.len(),
            max: MAX_CLUSTER_MEMBERS,
        });
    }
    orchestrator.preflight(members)?;

    let op = PollCluster {
        intended: members.iter().map(|m| m.host.clone()).collect(),
        policy,
    };
    Ok(orchestrator
        .run_fan_out(cancel, members, POLL_CLUSTER_OPERATION, Arc::new(op))
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_device::adapter::templates;
    use fabric_device::AdapterRegistry;
    use fabric_test::{fixtures, replies, DeviceScript, RequestKind, ScriptedTransportFactory};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const RPC: &str = "show-cluster-management";

    fn policy() -> PollPolicy {
        PollPolicy::new(Duration::from_secs(15), Duration::from_secs(90))
    }

    fn intended(hosts: &[&str]) -> HashSet<String> {
        hosts.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn test_is_operational() {
        let members = intended(&["10.24.39.1", "10.24.39.2"]);
        let formed = ManagementClusterStatus::from_reply(&replies::management_cluster(
            2,
            &["10.24.39.2", "10.24.39.1"],
        ))
        .unwrap();
        assert!(is_operational(&formed, &members).unwrap());

        let alone =
            ManagementClusterStatus::from_reply(&replies::management_cluster(1, &["10.24.39.1"])).unwrap();
        assert!(!is_operational(&alone, &members).unwrap());

        let stranger = ManagementClusterStatus::from_reply(&replies::management_cluster(
            2,
            &["10.24.39.1", "10.24.39.9"],
        ))
        .unwrap();
        assert!(!is_operational(&stranger, &members).unwrap());
    }

    #[test]
    fn test_member_list_shorter_than_count_is_not_operational() {
        let members = intended(&["10.24.39.1", "10.24.39.2"]);
        let partial =
            ManagementClusterStatus::from_reply(&replies::management_cluster(2, &["10.24.39.1"])).unwrap();
        assert_eq!(partial.total_nodes().unwrap(), 2);
        assert!(!is_operational(&partial, &members).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_converges() {
        let hosts = ["10.24.39.1", "10.24.39.2"];
        let forming = replies::management_cluster(1, &hosts[..1]);
        let formed = replies::management_cluster(2, &hosts);
        let factory = Arc::new(
            ScriptedTransportFactory::new()
                .with_device(hosts[0], DeviceScript::new().on_rpc(RPC, forming).on_rpc(RPC, formed.clone()))
                .with_device(hosts[1], DeviceScript::new().on_rpc(RPC, formed)),
        );
        let orch = Orchestrator::new(Arc::new(AdapterRegistry::new()), factory.clone());

        let fan_out = poll_management_cluster(&orch, &CancellationToken::new(), &fixtures::spines(2), policy())
            .await
            .unwrap();
        assert!(fan_out.is_success(), "{:?}", fan_out.errors);
        assert_eq!(factory.log(hosts[0]).count(RequestKind::Rpc), 2);
        assert_eq!(factory.log(hosts[1]).count(RequestKind::Rpc), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out() {
        let factory = Arc::new(ScriptedTransportFactory::new().with_device(
            "10.24.39.1",
            DeviceScript::new().on_rpc(RPC, replies::management_cluster(1, &["10.24.39.1"])),
        ));
        let orch = Orchestrator::new(Arc::new(AdapterRegistry::new()), factory.clone());

        let fan_out = poll_management_cluster(
            &orch,
            &CancellationToken::new(),
            &[fixtures::spine("10.24.39.1"), fixtures::spine("10.24.39.5")],
            policy(),
        )
        .await
        .unwrap();
        assert_eq!(fan_out.errors.len(), 2);
        assert!(fan_out
            .errors
            .iter()
            .all(|e| e.operation == POLL_CLUSTER_OPERATION));
        assert_eq!(
            fan_out.errors[0].error.to_string(),
            "Management Cluster is not operational. Polling timed out"
        );
        // Checks land at 15s..75s; the deadline at 90s wins over the sixth tick.
        assert_eq!(factory.log("10.24.39.1").count(RequestKind::Rpc), 5);
    }

    #[tokio::test]
    async fn test_more_than_two_members_rejected() {
        let factory = Arc::new(ScriptedTransportFactory::new());
        let orch = Orchestrator::new(Arc::new(AdapterRegistry::new()), factory.clone());

        let err = poll_management_cluster(&orch, &CancellationToken::new(), &fixtures::spines(3), policy())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Management cluster is supported for a maximum of 2 nodes"
        );
        assert!(factory.connected_hosts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparsable_node_count_aborts() {
        let factory = Arc::new(ScriptedTransportFactory::new().with_device(
            "10.24.39.1",
            DeviceScript::new().on_rpc(
                templates::build_show_cluster_management().as_str(),
                "<rpc-reply><total-nodes-in-cluster>two</total-nodes-in-cluster></rpc-reply>",
            ),
        ));
        let orch = Orchestrator::new(Arc::new(AdapterRegistry::new()), factory.clone());

        let fan_out = poll_management_cluster(&orch, &CancellationToken::new(), &fixtures::spines(1), policy())
            .await
            .unwrap();
        assert_eq!(fan_out.errors.len(), 1);
        assert!(matches!(
            fan_out.errors[0].error,
            ActionError::Device(DeviceError::Parse { .. })
        ));
        assert_eq!(factory.log("10.24.39.1").count(RequestKind::Rpc), 1);
    }
}
