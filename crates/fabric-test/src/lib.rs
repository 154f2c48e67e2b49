//! Test infrastructure for fabric automation
//!
//! Provides:
//! - An in-memory transport answering from a per-host script
//! - A transport factory handing out scripted sessions by host
//! - Reply fixtures in the shape switches send them
//! - Assertions over the requests a device received

pub mod fixtures;
mod scripted;
mod verification;

pub use fixtures::*;
pub use scripted::{
    DeviceScript, Failure, RequestKind, RecordedRequest, ScriptedTransport,
    ScriptedTransportFactory, SessionLog,
};
pub use verification::*;
