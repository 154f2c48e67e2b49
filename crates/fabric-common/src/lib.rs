//! Common building blocks for fabric automation.
//!
//! This crate provides the pieces shared by the device layer and the
//! action orchestrator:
//!
//! - [`KeyedSet`]: Unordered collection keyed by a caller-supplied function
//! - [`compare`]: Declarative-state reconciliation producing create/update/delete deltas
//! - [`records`]: The fabric entities that get reconciled (interfaces, LLDP, BGP, MCT)
//! - [`PollPolicy`]: Interval/timeout policy for polling a device until it converges
//!
//! # Example
//!
//! ```
//! use fabric_common::{compare, Identified};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Neighbor {
//!     id: u32,
//!     address: String,
//!     remote_as: u32,
//! }
//!
//! impl Identified for Neighbor {
//!     fn adopt_identity(&mut self, from: &Self) {
//!         self.id = from.id;
//!     }
//! }
//!
//! let old = vec![Neighbor { id: 7, address: "10.0.0.1".into(), remote_as: 65000 }];
//! let new = vec![Neighbor { id: 0, address: "10.0.0.1".into(), remote_as: 65001 }];
//!
//! let delta = compare(
//!     |n: &Neighbor| n.address.clone(),
//!     |a: &Neighbor, b: &Neighbor| a.remote_as == b.remote_as,
//!     old,
//!     new,
//! );
//! assert_eq!(delta.updated.len(), 1);
//! assert_eq!(delta.updated[0].new.id, 7);
//! ```

mod keyed_set;
mod reconcile;
pub mod records;
mod retry;

pub use keyed_set::{difference, intersection, union, KeyFn, KeyedSet};
pub use reconcile::{compare, reconcile, Identified, Reconcilable, Reconciliation, Updated};
pub use retry::{poll_until, PollError, PollPolicy, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
