//! Fabric-wide actions over many switches.
//!
//! [`Orchestrator::run_fan_out`] runs one [`DeviceOperation`] per device
//! concurrently and collects every outcome at a single join point. A failing
//! device yields one [`OperationError`] naming the host and the step that
//! failed; its siblings carry on.
//!
//! The workflows built on it:
//!
//! - [`fetch_fabric`]: read back BGP, router-id, loopbacks and edge overlay state
//! - [`configure_fabric`]: reconcile and apply the BGP underlay and EVPN peering
//! - [`deconfigure_fabric`]: remove it again
//! - [`discover_fabric`]: map links from LLDP and reconcile the recorded topology
//! - [`poll_management_cluster`]: wait until the management cluster has formed

pub mod cluster;
pub mod configure;
pub mod deconfigure;
pub mod discover;
pub mod error;
pub mod fetch;
pub mod intent;
pub mod orchestrator;

pub use cluster::{poll_management_cluster, POLL_CLUSTER_OPERATION};
pub use configure::{configure_fabric, ConfigureSummary, ConfigureSwitch, CONFIGURE_OPERATION};
pub use deconfigure::{
    deconfigure_fabric, DeconfigureSummary, DeconfigureSwitch, DECONFIGURE_OPERATION,
};
pub use discover::{
    build_topology, discover_fabric, reconcile_topology, DiscoverSwitch, DiscoveryReport,
    FabricState, SwitchDiscovery, TopologyDelta, DISCOVER_OPERATION, MCT_CLUSTER_ID,
};
pub use error::{ActionError, ActionResult, FanOutReport, OperationError, StepContext, StepFailure};
pub use fetch::{fetch_fabric, FetchSwitch, SwitchSnapshot, FETCH_OPERATION};
pub use intent::{
    Addressing, BgpSettings, ClusterIntent, EvpnPeerIntent, InterfaceIntent, InterfaceParams,
    LoopbackIntent, MacArpIntent, NeighborIntent, OverlayIntent, SwitchIntent, SystemIntent,
};
pub use orchestrator::{preflight, Completed, DeviceContext, DeviceOperation, FanOut, Orchestrator};
