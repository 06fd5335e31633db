//! Network-namespace machinery for the ntpfleet orchestrator
//!
//! This crate owns everything that touches live OS state:
//! - the narrow [`NetnsBackend`] capability trait and its in-memory fake
//! - the production `ip(8)`-backed implementation
//! - deterministic instance naming and filesystem layout
//! - the shared bridge, per-instance provisioning, process supervision,
//!   and state discovery
//! - the [`Fleet`] lifecycle orchestrator composing the above
//!
//! There is no private instance database: the set of live instances and
//! their server pids is re-derived from namespace and process state on
//! every call, so orchestration stays correct across orchestrator restarts.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod backend;
pub mod bridge;
pub mod discovery;
pub mod fleet;
pub mod iproute;
pub mod layout;
pub mod provision;
pub mod supervise;

pub use backend::{MemoryBackend, NetnsBackend};
pub use bridge::SharedBridge;
pub use discovery::StateDiscovery;
pub use fleet::{BatchReport, CleanupReport, CreateReport, Fleet, InstanceStatus, LogsReport};
pub use iproute::Iproute2;
pub use layout::{Instance, BRIDGE_NAME, NAMESPACE_PREFIX};
pub use provision::Provisioner;
pub use supervise::Supervisor;
