//! Production backend shelling out to `ip(8)`
//!
//! Namespace, veth, bridge, address, and route state is manipulated through
//! the `ip` binary; IPv4 forwarding goes through `/proc/sys`. Requires the
//! privileges to manage network namespaces and interfaces.

use async_trait::async_trait;
use ntpfleet_core::{Error, ProcessId, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::backend::NetnsBackend;

const IP_FORWARD_SYSCTL: &str = "/proc/sys/net/ipv4/ip_forward";

/// `ip(8)`-backed implementation of [`NetnsBackend`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Iproute2;

impl Iproute2 {
    /// Create a new backend
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Run `ip` with the given arguments, failing on non-zero exit
    async fn ip(args: &[&str]) -> Result<String> {
        tracing::debug!(command = %format!("ip {}", args.join(" ")), "Running");

        let output = Command::new("ip").args(args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Network {
                message: format!("ip {}: {}", args.join(" "), stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run `ip` and report only whether it succeeded
    async fn ip_status(args: &[&str]) -> Result<bool> {
        let status = Command::new("ip")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        Ok(status.success())
    }
}

#[async_trait]
impl NetnsBackend for Iproute2 {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let output = Self::ip(&["netns", "list"]).await?;

        // Lines look like "ntpsrv_3 (id: 7)"; only the name matters
        Ok(output
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(ToString::to_string)
            .collect())
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_namespaces().await?.iter().any(|n| n == name))
    }

    async fn create_namespace(&self, name: &str) -> Result<()> {
        Self::ip(&["netns", "add", name]).await.map(drop)
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        Self::ip(&["netns", "delete", name]).await.map(drop)
    }

    async fn namespace_pids(&self, name: &str) -> Result<Vec<ProcessId>> {
        let output = Self::ip(&["netns", "pids", name]).await?;

        Ok(output
            .lines()
            .filter_map(|line| line.trim().parse::<i32>().ok())
            .map(ProcessId::from_raw)
            .collect())
    }

    async fn exec(&self, namespace: &str, argv: &[String]) -> Result<()> {
        let mut args = vec!["netns", "exec", namespace];
        args.extend(argv.iter().map(String::as_str));

        Self::ip(&args).await.map(drop)
    }

    async fn create_veth(&self, host_end: &str, peer_end: &str) -> Result<()> {
        Self::ip(&["link", "add", host_end, "type", "veth", "peer", "name", peer_end])
            .await
            .map(drop)
    }

    async fn move_link(&self, link: &str, namespace: &str) -> Result<()> {
        Self::ip(&["link", "set", link, "netns", namespace])
            .await
            .map(drop)
    }

    async fn create_bridge(&self, name: &str) -> Result<()> {
        Self::ip(&["link", "add", "name", name, "type", "bridge"])
            .await
            .map(drop)
    }

    async fn link_exists(&self, name: &str) -> Result<bool> {
        Self::ip_status(&["link", "show", name]).await
    }

    async fn attach_to_bridge(&self, link: &str, bridge: &str) -> Result<()> {
        Self::ip(&["link", "set", link, "master", bridge])
            .await
            .map(drop)
    }

    async fn add_address(&self, link: &str, cidr: &str) -> Result<()> {
        Self::ip(&["addr", "add", cidr, "dev", link]).await.map(drop)
    }

    async fn link_up(&self, name: &str) -> Result<()> {
        Self::ip(&["link", "set", name, "up"]).await.map(drop)
    }

    async fn link_down(&self, name: &str) -> Result<()> {
        Self::ip(&["link", "set", name, "down"]).await.map(drop)
    }

    async fn delete_link(&self, name: &str) -> Result<()> {
        Self::ip(&["link", "delete", name]).await.map(drop)
    }

    async fn enable_ip_forwarding(&self) -> Result<()> {
        tokio::fs::write(IP_FORWARD_SYSCTL, "1\n").await?;
        tracing::debug!("IPv4 forwarding enabled");
        Ok(())
    }

    async fn spawn_in_namespace(
        &self,
        namespace: &str,
        argv: &[String],
        log_path: &Path,
    ) -> Result<ProcessId> {
        // Append semantics: a re-created id inherits its old log content
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        let log_err = log.try_clone()?;

        let mut command = Command::new("ip");
        command
            .arg("netns")
            .arg("exec")
            .arg(namespace)
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        let child = command.spawn()?;

        // ip netns exec setns()s and then execs in place, so the child pid
        // IS the server pid. The handle is dropped without killing; the
        // server keeps running detached.
        let pid = child.id().ok_or_else(|| Error::Network {
            message: format!("server exited inside {namespace} before a pid could be read"),
        })?;

        #[allow(clippy::cast_possible_wrap)]
        let pid = pid as i32;
        Ok(ProcessId::from_raw(pid))
    }

    async fn process_alive(&self, pid: ProcessId) -> bool {
        // Signal 0 probes existence without disturbing the process
        nix::sys::signal::kill(pid.as_nix_pid(), None).is_ok()
    }

    async fn process_command(&self, pid: ProcessId) -> Option<String> {
        let cmdline = tokio::fs::read_to_string(format!("/proc/{pid}/cmdline"))
            .await
            .ok()?;

        let command = cmdline.replace('\0', " ").trim().to_string();
        (!command.is_empty()).then_some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_is_cheap_to_copy() {
        let backend = Iproute2::new();
        let _other = backend;
        let _still_usable = backend;
    }

    #[tokio::test]
    #[ignore] // Requires the ip binary and namespace privileges
    async fn test_namespace_round_trip() {
        let backend = Iproute2::new();

        backend.create_namespace("ntpfleet_selftest").await.unwrap();
        assert!(backend.namespace_exists("ntpfleet_selftest").await.unwrap());

        let pids = backend.namespace_pids("ntpfleet_selftest").await.unwrap();
        assert!(pids.is_empty());

        backend.delete_namespace("ntpfleet_selftest").await.unwrap();
        assert!(!backend.namespace_exists("ntpfleet_selftest").await.unwrap());
    }
}
