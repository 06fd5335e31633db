//! Namespace/network capability trait for pluggable implementations

use async_trait::async_trait;
use ntpfleet_core::{Error, ProcessId, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Narrow interface over the OS facts the orchestrator depends on
///
/// Everything the orchestrator knows about live instances flows through
/// these operations, which allows two implementations:
/// - [`Iproute2`](crate::Iproute2) - production, shelling out to `ip(8)`
/// - [`MemoryBackend`] - in-memory fake for tests without namespace
///   privileges
///
/// # Thread Safety
/// All implementations must be `Send + Sync`.
#[async_trait]
pub trait NetnsBackend: Send + Sync {
    /// Enumerate live network namespace names
    ///
    /// Order is whatever the OS yields (commonly reverse-creation order);
    /// callers must not assume sort order.
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Whether a named namespace currently exists
    async fn namespace_exists(&self, name: &str) -> Result<bool>;

    /// Create a named network namespace
    async fn create_namespace(&self, name: &str) -> Result<()>;

    /// Delete a named network namespace
    ///
    /// Deleting a namespace implicitly destroys every interface inside it,
    /// including the namespace-side veth end (and with it the pair).
    async fn delete_namespace(&self, name: &str) -> Result<()>;

    /// Process ids attributed to a namespace
    async fn namespace_pids(&self, name: &str) -> Result<Vec<ProcessId>>;

    /// Run a command to completion inside a namespace
    async fn exec(&self, namespace: &str, argv: &[String]) -> Result<()>;

    /// Create a veth pair with both ends on the host side
    async fn create_veth(&self, host_end: &str, peer_end: &str) -> Result<()>;

    /// Move a host-side link into a namespace
    async fn move_link(&self, link: &str, namespace: &str) -> Result<()>;

    /// Create a bridge device
    async fn create_bridge(&self, name: &str) -> Result<()>;

    /// Whether a host-side link exists
    async fn link_exists(&self, name: &str) -> Result<bool>;

    /// Attach a host-side link to a bridge
    async fn attach_to_bridge(&self, link: &str, bridge: &str) -> Result<()>;

    /// Assign an address (CIDR notation) to a host-side link
    async fn add_address(&self, link: &str, cidr: &str) -> Result<()>;

    /// Bring a host-side link up
    async fn link_up(&self, name: &str) -> Result<()>;

    /// Bring a host-side link down
    async fn link_down(&self, name: &str) -> Result<()>;

    /// Delete a host-side link
    async fn delete_link(&self, name: &str) -> Result<()>;

    /// Enable IPv4 forwarding host-wide
    ///
    /// Global and deliberately not reverted on teardown, since other
    /// instances may still depend on it.
    async fn enable_ip_forwarding(&self) -> Result<()>;

    /// Spawn a detached process inside a namespace, output appended to a log
    ///
    /// Returns the pid observed at spawn time. The process is not waited on
    /// beyond this call; liveness is probed with [`Self::process_alive`].
    async fn spawn_in_namespace(
        &self,
        namespace: &str,
        argv: &[String],
        log_path: &Path,
    ) -> Result<ProcessId>;

    /// Whether a previously spawned process is still running
    async fn process_alive(&self, pid: ProcessId) -> bool;

    /// Command line of a running process, if readable
    async fn process_command(&self, pid: ProcessId) -> Option<String>;
}

fn command_failed(message: impl Into<String>) -> Error {
    Error::Network {
        message: message.into(),
    }
}

#[derive(Debug, Default, Clone)]
struct LinkState {
    bridge: bool,
    up: bool,
    master: Option<String>,
    addresses: Vec<String>,
    veth_peer: Option<String>,
}

#[derive(Debug, Clone)]
struct ProcState {
    namespace: String,
    command: String,
    alive: bool,
}

#[derive(Default)]
struct MemoryState {
    namespaces: Vec<String>,
    ns_links: HashMap<String, Vec<String>>,
    links: HashMap<String, LinkState>,
    processes: HashMap<i32, ProcState>,
    next_pid: i32,
    ip_forwarding: bool,
    spawn_dies: bool,
    fail_routes: bool,
    exec_history: Vec<(String, Vec<String>)>,
}

/// In-memory backend for testing (no namespace privileges required)
///
/// Models just enough kernel behavior to exercise the orchestrator: name
/// collisions, veth-pair destruction on namespace deletion, pid attribution,
/// and `kill` executed inside a namespace.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Create a new empty backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                next_pid: 4000,
                ..MemoryState::default()
            })),
        }
    }

    /// Make subsequently spawned processes die immediately (for testing)
    pub async fn set_spawn_dies(&self, dies: bool) {
        self.state.lock().await.spawn_dies = dies;
    }

    /// Make in-namespace route commands fail (for testing)
    pub async fn set_route_failure(&self, fail: bool) {
        self.state.lock().await.fail_routes = fail;
    }

    /// Whether a namespace exists right now (for assertions)
    pub async fn has_namespace(&self, name: &str) -> bool {
        self.state.lock().await.namespaces.iter().any(|n| n == name)
    }

    /// Whether a host-side link exists right now (for assertions)
    pub async fn has_link(&self, name: &str) -> bool {
        self.state.lock().await.links.contains_key(name)
    }

    /// Addresses assigned to a host-side link (for assertions)
    pub async fn link_addresses(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .links
            .get(name)
            .map(|l| l.addresses.clone())
            .unwrap_or_default()
    }

    /// Whether a host-side link is up (for assertions)
    pub async fn link_is_up(&self, name: &str) -> bool {
        self.state
            .lock()
            .await
            .links
            .get(name)
            .is_some_and(|l| l.up)
    }

    /// Bridge a host-side link is attached to, if any (for assertions)
    pub async fn link_master(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .links
            .get(name)
            .and_then(|l| l.master.clone())
    }

    /// Every `exec` invocation so far, as (namespace, argv) pairs
    pub async fn exec_history(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().await.exec_history.clone()
    }

    /// Whether IPv4 forwarding was enabled
    pub async fn ip_forwarding_enabled(&self) -> bool {
        self.state.lock().await.ip_forwarding
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl NetnsBackend for MemoryBackend {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;

        // ip netns list reports newest first
        Ok(state.namespaces.iter().rev().cloned().collect())
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool> {
        Ok(self.has_namespace(name).await)
    }

    async fn create_namespace(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.namespaces.iter().any(|n| n == name) {
            return Err(command_failed(format!("ip netns add {name}: File exists")));
        }

        state.namespaces.push(name.to_string());
        state.ns_links.insert(name.to_string(), Vec::new());

        tracing::debug!(namespace = name, "Memory: created namespace");
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        if !state.namespaces.iter().any(|n| n == name) {
            return Err(command_failed(format!(
                "ip netns delete {name}: No such file or directory"
            )));
        }

        state.namespaces.retain(|n| n != name);
        let inner_links = state.ns_links.remove(name).unwrap_or_default();

        // The namespace-side veth end dies with the namespace, and the pair
        // dies with it: drop the host-side end too.
        state
            .links
            .retain(|_, link| !link.veth_peer.as_deref().is_some_and(|p| inner_links.iter().any(|l| l == p)));

        for proc in state.processes.values_mut() {
            if proc.namespace == name {
                proc.alive = false;
            }
        }

        tracing::debug!(namespace = name, "Memory: deleted namespace");
        Ok(())
    }

    async fn namespace_pids(&self, name: &str) -> Result<Vec<ProcessId>> {
        let state = self.state.lock().await;

        if !state.namespaces.iter().any(|n| n == name) {
            return Err(command_failed(format!(
                "ip netns pids {name}: No such file or directory"
            )));
        }

        let mut pids: Vec<i32> = state
            .processes
            .iter()
            .filter(|(_, p)| p.alive && p.namespace == name)
            .map(|(pid, _)| *pid)
            .collect();
        pids.sort_unstable();

        Ok(pids.into_iter().map(ProcessId::from_raw).collect())
    }

    async fn exec(&self, namespace: &str, argv: &[String]) -> Result<()> {
        let mut state = self.state.lock().await;

        if !state.namespaces.iter().any(|n| n == namespace) {
            return Err(command_failed(format!(
                "ip netns exec {namespace}: No such file or directory"
            )));
        }

        state
            .exec_history
            .push((namespace.to_string(), argv.to_vec()));

        if state.fail_routes && argv.first().is_some_and(|a| a == "ip") && argv.get(1).is_some_and(|a| a == "route") {
            return Err(command_failed("ip route add: Network is unreachable"));
        }

        if argv.first().is_some_and(|a| a == "kill") {
            let target = argv
                .last()
                .and_then(|raw| raw.parse::<i32>().ok())
                .ok_or_else(|| command_failed("kill: bad pid"))?;

            match state.processes.get_mut(&target) {
                Some(proc) if proc.alive && proc.namespace == namespace => {
                    proc.alive = false;
                    tracing::debug!(pid = target, namespace, "Memory: killed process");
                }
                _ => return Err(command_failed(format!("kill: ({target}) - No such process"))),
            }
        }

        Ok(())
    }

    async fn create_veth(&self, host_end: &str, peer_end: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.links.contains_key(host_end) || state.links.contains_key(peer_end) {
            return Err(command_failed(format!(
                "ip link add {host_end}: File exists"
            )));
        }

        state.links.insert(
            host_end.to_string(),
            LinkState {
                veth_peer: Some(peer_end.to_string()),
                ..LinkState::default()
            },
        );
        state.links.insert(
            peer_end.to_string(),
            LinkState {
                veth_peer: Some(host_end.to_string()),
                ..LinkState::default()
            },
        );

        Ok(())
    }

    async fn move_link(&self, link: &str, namespace: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        if !state.namespaces.iter().any(|n| n == namespace) {
            return Err(command_failed(format!(
                "ip link set {link} netns: No such file or directory"
            )));
        }

        state
            .links
            .remove(link)
            .ok_or_else(|| command_failed(format!("ip link set {link}: Cannot find device")))?;
        if let Some(inner) = state.ns_links.get_mut(namespace) {
            inner.push(link.to_string());
        }

        Ok(())
    }

    async fn create_bridge(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.links.contains_key(name) {
            return Err(command_failed(format!("ip link add {name}: File exists")));
        }

        state.links.insert(
            name.to_string(),
            LinkState {
                bridge: true,
                ..LinkState::default()
            },
        );

        tracing::debug!(bridge = name, "Memory: created bridge");
        Ok(())
    }

    async fn link_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.lock().await.links.contains_key(name))
    }

    async fn attach_to_bridge(&self, link: &str, bridge: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        if !state.links.get(bridge).is_some_and(|l| l.bridge) {
            return Err(command_failed(format!(
                "ip link set master: bridge {bridge} does not exist"
            )));
        }

        let entry = state
            .links
            .get_mut(link)
            .ok_or_else(|| command_failed(format!("ip link set {link}: Cannot find device")))?;
        entry.master = Some(bridge.to_string());

        Ok(())
    }

    async fn add_address(&self, link: &str, cidr: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        let entry = state
            .links
            .get_mut(link)
            .ok_or_else(|| command_failed(format!("ip addr add: Cannot find device {link}")))?;
        entry.addresses.push(cidr.to_string());

        Ok(())
    }

    async fn link_up(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        let entry = state
            .links
            .get_mut(name)
            .ok_or_else(|| command_failed(format!("ip link set {name} up: Cannot find device")))?;
        entry.up = true;

        Ok(())
    }

    async fn link_down(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        let entry = state
            .links
            .get_mut(name)
            .ok_or_else(|| command_failed(format!("ip link set {name} down: Cannot find device")))?;
        entry.up = false;

        Ok(())
    }

    async fn delete_link(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;

        state
            .links
            .remove(name)
            .ok_or_else(|| command_failed(format!("ip link delete {name}: Cannot find device")))?;

        Ok(())
    }

    async fn enable_ip_forwarding(&self) -> Result<()> {
        self.state.lock().await.ip_forwarding = true;
        Ok(())
    }

    async fn spawn_in_namespace(
        &self,
        namespace: &str,
        argv: &[String],
        _log_path: &Path,
    ) -> Result<ProcessId> {
        let mut state = self.state.lock().await;

        if !state.namespaces.iter().any(|n| n == namespace) {
            return Err(command_failed(format!(
                "ip netns exec {namespace}: No such file or directory"
            )));
        }

        let pid = state.next_pid;
        state.next_pid += 1;
        let alive = !state.spawn_dies;

        state.processes.insert(
            pid,
            ProcState {
                namespace: namespace.to_string(),
                command: argv.join(" "),
                alive,
            },
        );

        tracing::debug!(pid, namespace, alive, "Memory: spawned process");
        Ok(ProcessId::from_raw(pid))
    }

    async fn process_alive(&self, pid: ProcessId) -> bool {
        self.state
            .lock()
            .await
            .processes
            .get(&pid.as_raw())
            .is_some_and(|p| p.alive)
    }

    async fn process_command(&self, pid: ProcessId) -> Option<String> {
        let state = self.state.lock().await;

        state
            .processes
            .get(&pid.as_raw())
            .filter(|p| p.alive)
            .map(|p| p.command.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_namespace_lifecycle() {
        let backend = MemoryBackend::new();

        backend.create_namespace("ntpsrv_1").await.unwrap();
        backend.create_namespace("ntpsrv_2").await.unwrap();

        // Duplicate creation collides
        assert!(backend.create_namespace("ntpsrv_1").await.is_err());

        // Newest first, like ip netns list
        let listed = backend.list_namespaces().await.unwrap();
        assert_eq!(listed, vec!["ntpsrv_2", "ntpsrv_1"]);

        backend.delete_namespace("ntpsrv_1").await.unwrap();
        assert!(!backend.has_namespace("ntpsrv_1").await);
        assert!(backend.delete_namespace("ntpsrv_1").await.is_err());
    }

    #[tokio::test]
    async fn test_spawn_and_pid_attribution() {
        let backend = MemoryBackend::new();
        backend.create_namespace("ntpsrv_1").await.unwrap();

        let pid = backend
            .spawn_in_namespace("ntpsrv_1", &argv(&["ntpserver", "--ip", "10.0.0.1"]), Path::new("/dev/null"))
            .await
            .unwrap();

        assert!(backend.process_alive(pid).await);
        assert_eq!(backend.namespace_pids("ntpsrv_1").await.unwrap(), vec![pid]);
        assert!(
            backend
                .process_command(pid)
                .await
                .unwrap()
                .contains("--ip 10.0.0.1")
        );

        // Kill inside the namespace, then the pid is no longer attributed
        backend
            .exec("ntpsrv_1", &argv(&["kill", &pid.to_string()]))
            .await
            .unwrap();
        assert!(!backend.process_alive(pid).await);
        assert!(backend.namespace_pids("ntpsrv_1").await.unwrap().is_empty());

        // Killing again is an error, like kill(1)
        assert!(
            backend
                .exec("ntpsrv_1", &argv(&["kill", &pid.to_string()]))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_veth_pair_dies_with_namespace() {
        let backend = MemoryBackend::new();
        backend.create_namespace("ntpsrv_1").await.unwrap();
        backend.create_veth("ntpveth1", "ntpeth1").await.unwrap();
        backend.move_link("ntpeth1", "ntpsrv_1").await.unwrap();

        assert!(backend.link_exists("ntpveth1").await.unwrap());

        backend.delete_namespace("ntpsrv_1").await.unwrap();
        assert!(!backend.link_exists("ntpveth1").await.unwrap());
    }

    #[tokio::test]
    async fn test_spawn_into_missing_namespace() {
        let backend = MemoryBackend::new();

        let result = backend
            .spawn_in_namespace("ntpsrv_9", &argv(&["ntpserver"]), Path::new("/dev/null"))
            .await;
        assert!(result.is_err());
    }
}
