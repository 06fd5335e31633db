//! Supervision of the external NTP server process
//!
//! The server is launched detached inside an instance's namespace with its
//! output appended to the instance log. No handle outlives the launch call;
//! the pid observed at spawn time is probed for liveness after a bounded
//! startup grace, and namespace enumeration remains the inspection path for
//! `logs` and `delete`.

use ntpfleet_core::{Error, ProcessId, Result, ServerParams};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::NetnsBackend;
use crate::layout::Instance;

/// Name of the server executable searched for on `PATH`
pub const SERVER_PROGRAM: &str = "ntpserver";

/// Environment variable overriding the server executable location
pub const SERVER_ENV: &str = "NTPFLEET_SERVER";

/// How long the server gets to come up before liveness is judged
///
/// There is no persistent supervising parent to join on, so a bounded wait
/// is the correctness/latency tradeoff; a heavily loaded host can defeat
/// it, which is a known limitation.
const STARTUP_GRACE: Duration = Duration::from_millis(600);

/// Locate the external server executable
///
/// The [`SERVER_ENV`] override wins when set (and must point at a file);
/// otherwise each `PATH` entry is searched for [`SERVER_PROGRAM`].
pub fn locate_server() -> Result<PathBuf> {
    if let Ok(overridden) = std::env::var(SERVER_ENV) {
        let path = PathBuf::from(&overridden);
        if path.is_file() {
            return Ok(path);
        }
        return Err(Error::DependencyMissing { program: overridden });
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(SERVER_PROGRAM);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(Error::DependencyMissing {
        program: SERVER_PROGRAM.to_string(),
    })
}

/// Launches and stops server processes inside instance namespaces
#[derive(Clone)]
pub struct Supervisor {
    backend: Arc<dyn NetnsBackend>,
    startup_grace: Duration,
}

impl Supervisor {
    /// Create a supervisor over a backend
    #[must_use]
    pub fn new(backend: Arc<dyn NetnsBackend>) -> Self {
        Self {
            backend,
            startup_grace: STARTUP_GRACE,
        }
    }

    /// Override the startup grace period (tests use zero)
    #[must_use]
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Launch the server for an instance and confirm it is running
    ///
    /// The fixed argument contract: `--ip --offset --stratum --leap
    /// --log_level`. On failure the accumulated log content is surfaced for
    /// diagnosis; provisioned resources are left for `delete`/`cleanup`.
    pub async fn launch(
        &self,
        server: &std::path::Path,
        instance: &Instance,
        params: &ServerParams,
    ) -> Result<ProcessId> {
        let address = instance.address(&params.subnet);
        let argv: Vec<String> = vec![
            server.display().to_string(),
            "--ip".into(),
            address.clone(),
            "--offset".into(),
            params.offset.to_string(),
            "--stratum".into(),
            params.stratum.to_string(),
            "--leap".into(),
            params.leap.as_u8().to_string(),
            "--log_level".into(),
            "DEBUG".into(),
        ];

        tracing::info!(
            namespace = %instance.namespace,
            address = %address,
            params = %params,
            "Launching NTP server"
        );

        let pid = self
            .backend
            .spawn_in_namespace(&instance.namespace, &argv, &instance.log_path)
            .await?;

        tokio::time::sleep(self.startup_grace).await;

        if self.backend.process_alive(pid).await {
            tracing::info!(namespace = %instance.namespace, %pid, "NTP server running");
            return Ok(pid);
        }

        let log = tokio::fs::read_to_string(&instance.log_path)
            .await
            .unwrap_or_default();

        Err(Error::ProcessStartFailure {
            namespace: instance.namespace.clone(),
            log,
        })
    }

    /// Terminate the server process
    ///
    /// The signal is delivered from inside the namespace, where the pid is
    /// meaningful. An already-gone process is not an error.
    pub async fn stop(&self, instance: &Instance, pid: ProcessId) {
        let argv = vec!["kill".to_string(), pid.to_string()];

        match self.backend.exec(&instance.namespace, &argv).await {
            Ok(()) => tracing::info!(namespace = %instance.namespace, %pid, "NTP server stopped"),
            Err(e) => {
                tracing::debug!(namespace = %instance.namespace, %pid, error = %e, "Process already gone");
            }
        }
    }
}
