//! Fleet lifecycle orchestration
//!
//! Top-level operations over the provisioner, supervisor, and discovery:
//! create one instance, create a contiguous batch, delete one, list all,
//! fetch logs for one, and clean up everything. Creation is fail-fast,
//! teardown is best-effort, and batch isolates failures per instance.

use ntpfleet_core::{BestEffort, Error, InstanceId, ProcessId, Result, ServerParams};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::NetnsBackend;
use crate::bridge::SharedBridge;
use crate::discovery::StateDiscovery;
use crate::layout::{self, Instance};
use crate::provision::Provisioner;
use crate::supervise::{self, Supervisor};

/// Outcome of a successful `create`
#[derive(Debug)]
pub struct CreateReport {
    /// The provisioned instance
    pub instance: Instance,
    /// Address the server is bound to
    pub address: String,
    /// Discovered server process id
    pub pid: ProcessId,
}

/// Per-instance tally of a `batch` run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Instances created successfully
    pub succeeded: usize,
    /// Instances that failed (the batch continued past them)
    pub failed: usize,
}

/// One row of the `list` output
#[derive(Debug)]
pub struct InstanceStatus {
    /// The discovered instance
    pub instance: Instance,
    /// Its server pid, when one is attributed to the namespace
    pub pid: Option<ProcessId>,
}

/// Everything `logs` could observe about an instance
#[derive(Debug)]
pub struct LogsReport {
    /// The instance inspected
    pub instance: Instance,
    /// Discovered server pid, if any
    pub pid: Option<ProcessId>,
    /// Command line of that process, if readable
    pub command: Option<String>,
    /// Full current log content; `None` when no log file exists yet
    pub log: Option<String>,
}

/// Outcome of a `cleanup` sweep
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Live instances that were deleted
    pub instances_removed: usize,
    /// Whether the shared bridge existed and was removed
    pub bridge_removed: bool,
    /// Stale instance directories swept from the state root
    pub directories_removed: usize,
}

/// Top-level lifecycle orchestrator
///
/// Single-operator by design: existence checks and creation are not atomic,
/// so concurrent invocations against overlapping ids are a data race at the
/// OS-resource level.
#[derive(Clone)]
pub struct Fleet {
    backend: Arc<dyn NetnsBackend>,
    state_root: PathBuf,
    startup_grace: Option<Duration>,
    server_override: Option<PathBuf>,
}

impl Fleet {
    /// Create a fleet over a backend, rooted at the default state directory
    #[must_use]
    pub fn new(backend: Arc<dyn NetnsBackend>) -> Self {
        Self {
            backend,
            state_root: layout::default_state_root(),
            startup_grace: None,
            server_override: None,
        }
    }

    /// Root instance directories somewhere else (tests use a scratch dir)
    #[must_use]
    pub fn with_state_root(mut self, root: PathBuf) -> Self {
        self.state_root = root;
        self
    }

    /// Override the server startup grace period
    #[must_use]
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = Some(grace);
        self
    }

    /// Use a fixed server executable instead of the `PATH` search
    #[must_use]
    pub fn with_server(mut self, server: PathBuf) -> Self {
        self.server_override = Some(server);
        self
    }

    /// Create and launch one instance
    pub async fn create(&self, id: InstanceId, params: &ServerParams) -> Result<CreateReport> {
        let instance = self.instance(id);

        if self.backend.namespace_exists(&instance.namespace).await? {
            return Err(Error::ResourceConflict {
                namespace: instance.namespace,
            });
        }

        let server = self.server_path()?;

        self.provisioner().create(&instance, params).await?;
        let pid = self.supervisor().launch(&server, &instance, params).await?;

        let address = instance.address(&params.subnet);
        Ok(CreateReport {
            instance,
            address,
            pid,
        })
    }

    /// Create every instance in the inclusive id range, sequentially
    ///
    /// Individual failures are tallied and never abort the rest. An
    /// inverted range is an empty batch.
    pub async fn batch(&self, start: u32, end: u32, params: &ServerParams) -> BatchReport {
        let mut report = BatchReport::default();

        if start > end {
            tracing::warn!(start, end, "Empty batch range, nothing to create");
            return report;
        }

        for raw in start..=end {
            let outcome = match InstanceId::new(raw) {
                Ok(id) => self.create(id, params).await.map(|r| r.pid),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(pid) => {
                    tracing::info!(id = raw, %pid, "Instance created");
                    report.succeeded += 1;
                }
                Err(e) => {
                    tracing::error!(id = raw, error = %e, "Instance creation failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Delete one instance: stop its server, tear down its network segment,
    /// remove its directory
    ///
    /// The namespace is looked up unconditionally; deleting a nonexistent
    /// instance is a harmless no-op.
    pub async fn delete(&self, id: InstanceId) {
        let instance = self.instance(id);

        tracing::info!(namespace = %instance.namespace, "Deleting instance");

        match self.discovery().find_pid(&instance).await {
            Ok(Some(pid)) => self.supervisor().stop(&instance, pid).await,
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(namespace = %instance.namespace, error = %e, "No process to stop");
            }
        }

        self.provisioner().destroy(&instance).await;

        match tokio::fs::remove_dir_all(&instance.directory).await {
            Ok(()) => {
                tracing::info!(directory = %instance.directory.display(), "Instance directory removed");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    directory = %instance.directory.display(),
                    error = %e,
                    "Could not remove instance directory"
                );
            }
        }
    }

    /// Delete every live instance, remove the shared bridge, and sweep
    /// stale instance directories
    pub async fn cleanup(&self) -> Result<CleanupReport> {
        let instances = self.discovery().list_instances().await?;
        let mut report = CleanupReport::default();

        for instance in &instances {
            self.delete(instance.id).await;
            report.instances_removed += 1;
        }

        let mut policy = BestEffort::new();
        if let Some(removed) = policy.run("remove bridge", self.bridge().remove().await) {
            report.bridge_removed = removed;
        }

        report.directories_removed = self.sweep_directories().await;

        Ok(report)
    }

    /// Status of every live instance
    pub async fn list(&self) -> Result<Vec<InstanceStatus>> {
        let discovery = self.discovery();
        let mut statuses = Vec::new();

        for instance in discovery.list_instances().await? {
            let pid = discovery.find_pid(&instance).await.unwrap_or(None);
            statuses.push(InstanceStatus { instance, pid });
        }

        Ok(statuses)
    }

    /// Process metadata and log content for one instance
    ///
    /// Unlike `delete`, this requires the instance to exist. A missing log
    /// file is reported as `None`, not an error.
    pub async fn logs(&self, id: InstanceId) -> Result<LogsReport> {
        let instance = self.instance(id);

        if !self.backend.namespace_exists(&instance.namespace).await? {
            return Err(Error::InstanceNotFound { id: id.as_u32() });
        }

        let pid = self.discovery().find_pid(&instance).await.unwrap_or(None);
        let command = match pid {
            Some(p) => self.discovery().process_command(p).await,
            None => None,
        };

        let log = match tokio::fs::read_to_string(&instance.log_path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(LogsReport {
            instance,
            pid,
            command,
            log,
        })
    }

    fn instance(&self, id: InstanceId) -> Instance {
        Instance::with_root(id, &self.state_root)
    }

    fn server_path(&self) -> Result<PathBuf> {
        match &self.server_override {
            Some(server) if server.is_file() => Ok(server.clone()),
            Some(server) => Err(Error::DependencyMissing {
                program: server.display().to_string(),
            }),
            None => supervise::locate_server(),
        }
    }

    fn provisioner(&self) -> Provisioner {
        Provisioner::new(Arc::clone(&self.backend))
    }

    fn supervisor(&self) -> Supervisor {
        let supervisor = Supervisor::new(Arc::clone(&self.backend));
        match self.startup_grace {
            Some(grace) => supervisor.with_startup_grace(grace),
            None => supervisor,
        }
    }

    fn discovery(&self) -> StateDiscovery {
        StateDiscovery::new(Arc::clone(&self.backend), self.state_root.clone())
    }

    fn bridge(&self) -> SharedBridge {
        SharedBridge::new(Arc::clone(&self.backend))
    }

    async fn sweep_directories(&self) -> usize {
        let mut removed = 0;

        let Ok(mut entries) = tokio::fs::read_dir(&self.state_root).await else {
            return 0;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            if !layout::is_instance_dir(name) {
                continue;
            }

            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => {
                    tracing::info!(directory = %entry.path().display(), "Removed stale directory");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(directory = %entry.path().display(), error = %e, "Sweep failed");
                }
            }
        }

        removed
    }
}
