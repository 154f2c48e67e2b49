//! # fabricd
//!
//! Command-line front end for provisioning a switch fabric over NETCONF.
//!
//! ## Commands
//!
//! - `fabricd check` - verify every inventory model has a driver
//! - `fabricd fetch` - read back BGP, router-id, loopbacks and overlay state
//! - `fabricd configure` - apply MTUs, the BGP underlay, EVPN and the overlay
//! - `fabricd deconfigure` - remove it again
//! - `fabricd discover` - map links from LLDP and update the recorded topology
//! - `fabricd cluster-status` - wait for the management cluster to form
//! - `fabricd models` - list the supported models
//!
//! The inventory is read from `/etc/fabricd/fabric.toml` unless `--config`
//! names another file.

pub mod commands;
pub mod config;
pub mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use config::{FabricConfig, DEFAULT_CONFIG_PATH, DEFAULT_STATE_PATH};
pub use error::{ConfigError, ConfigResult};

/// Fabric provisioning over NETCONF.
#[derive(Debug, Parser)]
#[command(name = "fabricd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Inventory file.
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log filter, used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs and summaries as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// fabricd subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check that every device model is supported, without connecting.
    Check,
    /// Read the running fabric configuration of every device.
    Fetch {
        /// Only report these loopback ids.
        #[arg(long = "loopback", value_name = "ID")]
        loopbacks: Vec<u32>,
    },
    /// Configure system MTUs, BGP underlay, EVPN peering, MCT clusters and
    /// the overlay gateway.
    Configure {
        /// Save the running configuration afterwards.
        #[arg(long)]
        persist: bool,
        /// Replace an EVPN instance or overlay gateway with another name.
        #[arg(long)]
        force: bool,
    },
    /// Remove what `configure` applied.
    Deconfigure {
        /// Save the running configuration afterwards.
        #[arg(long)]
        persist: bool,
    },
    /// Discover links over LLDP and reconcile them against the state file.
    Discover {
        /// Recorded topology, created when missing.
        #[arg(long, default_value = DEFAULT_STATE_PATH)]
        state: PathBuf,
        /// Report the changes without writing the state file.
        #[arg(long)]
        dry_run: bool,
    },
    /// Poll until the management cluster lists exactly the intended members.
    ClusterStatus {
        /// Cluster members; defaults to every leaf and rack device.
        #[arg(long = "host", value_name = "HOST")]
        hosts: Vec<String>,
    },
    /// List every supported model and its driver.
    Models,
}
