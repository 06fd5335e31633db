//! State discovery from live OS facts
//!
//! The authoritative "database": the set of live instances and their server
//! pids is re-derived from namespace and process enumeration on every call.
//! Nothing is cached, so discovery stays correct across orchestrator
//! restarts and after out-of-band changes.

use ntpfleet_core::{ProcessId, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::NetnsBackend;
use crate::layout::{self, Instance};

/// Derives fleet state by querying live namespaces and processes
#[derive(Clone)]
pub struct StateDiscovery {
    backend: Arc<dyn NetnsBackend>,
    state_root: PathBuf,
}

impl StateDiscovery {
    /// Create a discovery view rooted at a state directory
    #[must_use]
    pub fn new(backend: Arc<dyn NetnsBackend>, state_root: PathBuf) -> Self {
        Self {
            backend,
            state_root,
        }
    }

    /// Enumerate live instances, fresh on every call
    ///
    /// Namespaces without the fleet prefix are someone else's and skipped.
    /// Order follows the OS enumeration; callers must not assume sorting.
    pub async fn list_instances(&self) -> Result<Vec<Instance>> {
        let names = self.backend.list_namespaces().await?;

        Ok(names
            .iter()
            .filter_map(|name| layout::instance_from_namespace(name, &self.state_root))
            .collect())
    }

    /// First process id attributed to the instance's namespace
    ///
    /// There should normally be exactly one; when there are more, "first"
    /// is whatever the enumeration yields.
    pub async fn find_pid(&self, instance: &Instance) -> Result<Option<ProcessId>> {
        let pids = self.backend.namespace_pids(&instance.namespace).await?;
        Ok(pids.first().copied())
    }

    /// Command line of a discovered process, best-effort
    pub async fn process_command(&self, pid: ProcessId) -> Option<String> {
        self.backend.process_command(pid).await
    }
}
