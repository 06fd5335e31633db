//! Per-instance network segment provisioning
//!
//! Creation is fail-fast with no rollback: a failure partway leaves the
//! namespace and veth in a half-configured state that a later `delete` or
//! `cleanup` reclaims. Teardown is the mirror image, best-effort all the
//! way down.

use ntpfleet_core::{BestEffort, Error, Result, ServerParams};
use std::sync::Arc;

use crate::backend::NetnsBackend;
use crate::bridge::SharedBridge;
use crate::layout::{Instance, BRIDGE_NAME};

/// Creates and destroys one isolated network segment per instance
#[derive(Clone)]
pub struct Provisioner {
    backend: Arc<dyn NetnsBackend>,
    bridge: SharedBridge,
}

impl Provisioner {
    /// Create a provisioner over a backend
    #[must_use]
    pub fn new(backend: Arc<dyn NetnsBackend>) -> Self {
        let bridge = SharedBridge::new(Arc::clone(&backend));
        Self { backend, bridge }
    }

    /// Provision the namespace, veth pair, addressing, and default route
    ///
    /// Ordering matters: the namespace and veth must exist before the
    /// addressing and route steps, and the bridge before the host end can
    /// be attached. The default route is non-fatal; already-routed
    /// environments are tolerated.
    pub async fn create(&self, instance: &Instance, params: &ServerParams) -> Result<()> {
        if self.backend.namespace_exists(&instance.namespace).await? {
            return Err(Error::ResourceConflict {
                namespace: instance.namespace.clone(),
            });
        }

        tokio::fs::create_dir_all(&instance.directory).await?;

        self.bridge.ensure(&params.subnet).await?;

        tracing::info!(
            namespace = %instance.namespace,
            address = %instance.address(&params.subnet),
            "Provisioning instance network"
        );

        self.backend.create_namespace(&instance.namespace).await?;
        self.backend
            .create_veth(&instance.veth_host, &instance.veth_peer)
            .await?;
        self.backend
            .move_link(&instance.veth_peer, &instance.namespace)
            .await?;
        self.backend
            .attach_to_bridge(&instance.veth_host, BRIDGE_NAME)
            .await?;

        self.exec_ip(instance, &["addr", "add", &instance.address_cidr(&params.subnet), "dev", &instance.veth_peer])
            .await?;
        self.backend.link_up(&instance.veth_host).await?;
        self.exec_ip(instance, &["link", "set", &instance.veth_peer, "up"])
            .await?;
        self.exec_ip(instance, &["link", "set", "lo", "up"]).await?;

        let gateway = params.subnet.host_address();
        if let Err(e) = self
            .exec_ip(instance, &["route", "add", "default", "via", &gateway])
            .await
        {
            tracing::warn!(
                namespace = %instance.namespace,
                error = %e,
                "Default route not installed, assuming environment routes already"
            );
        }

        Ok(())
    }

    /// Tear down the instance's network resources
    ///
    /// Never raises: already-absent resources are treated as success so
    /// teardown stays idempotent. Deleting the namespace implicitly
    /// destroys the veth pair; a stray host-side end is only present after
    /// a half-configured creation and is swept here too.
    pub async fn destroy(&self, instance: &Instance) {
        let mut policy = BestEffort::new();

        match self.backend.namespace_exists(&instance.namespace).await {
            Ok(true) => {
                policy.run(
                    "delete namespace",
                    self.backend.delete_namespace(&instance.namespace).await,
                );
            }
            Ok(false) => {
                tracing::debug!(namespace = %instance.namespace, "Namespace already absent");
            }
            Err(e) => {
                tracing::warn!(namespace = %instance.namespace, error = %e, "Could not query namespace");
            }
        }

        if let Ok(true) = self.backend.link_exists(&instance.veth_host).await {
            policy.run(
                "delete stray veth",
                self.backend.delete_link(&instance.veth_host).await,
            );
        }

        if policy.is_clean() {
            tracing::info!(namespace = %instance.namespace, "Instance network removed");
        }
    }

    async fn exec_ip(&self, instance: &Instance, args: &[&str]) -> Result<()> {
        let mut argv = vec!["ip".to_string()];
        argv.extend(args.iter().map(ToString::to_string));

        self.backend.exec(&instance.namespace, &argv).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use ntpfleet_core::{InstanceId, LeapIndicator, SubnetBase};

    fn params(subnet: &str) -> ServerParams {
        ServerParams {
            subnet: SubnetBase::new(subnet).unwrap(),
            offset: 0,
            stratum: 2,
            leap: LeapIndicator::NoWarning,
        }
    }

    fn instance(raw: u32) -> Instance {
        let root = std::env::temp_dir().join(format!("ntpfleet-provision-{}", std::process::id()));
        Instance::with_root(InstanceId::new(raw).unwrap(), &root)
    }

    #[tokio::test]
    async fn test_create_wires_segment() {
        let memory = MemoryBackend::new();
        let provisioner = Provisioner::new(Arc::new(memory.clone()));
        let inst = instance(1);

        provisioner.create(&inst, &params("10.0.0")).await.unwrap();

        assert!(memory.has_namespace("ntpsrv_1").await);
        assert!(memory.has_link("ntpveth1").await);
        assert!(memory.link_is_up("ntpveth1").await);
        assert_eq!(memory.link_master("ntpveth1").await.as_deref(), Some(BRIDGE_NAME));
        assert!(inst.directory.is_dir());

        // Address and route were configured inside the namespace
        let history = memory.exec_history().await;
        assert!(history.iter().any(|(ns, argv)| {
            ns == "ntpsrv_1" && argv.join(" ").contains("addr add 10.0.0.1/24")
        }));
        assert!(history.iter().any(|(ns, argv)| {
            ns == "ntpsrv_1" && argv.join(" ").contains("route add default via 10.0.0.254")
        }));

        let _ = std::fs::remove_dir_all(&inst.directory);
    }

    #[tokio::test]
    async fn test_create_rejects_existing_namespace() {
        let memory = MemoryBackend::new();
        let provisioner = Provisioner::new(Arc::new(memory.clone()));
        let inst = instance(2);

        provisioner.create(&inst, &params("10.0.0")).await.unwrap();
        let second = provisioner.create(&inst, &params("10.0.0")).await;

        assert!(matches!(second, Err(Error::ResourceConflict { .. })));

        let _ = std::fs::remove_dir_all(&inst.directory);
    }

    #[tokio::test]
    async fn test_route_failure_is_tolerated() {
        let memory = MemoryBackend::new();
        memory.set_route_failure(true).await;
        let provisioner = Provisioner::new(Arc::new(memory.clone()));
        let inst = instance(3);

        provisioner.create(&inst, &params("10.0.0")).await.unwrap();
        assert!(memory.has_namespace("ntpsrv_3").await);

        let _ = std::fs::remove_dir_all(&inst.directory);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let memory = MemoryBackend::new();
        let provisioner = Provisioner::new(Arc::new(memory.clone()));
        let inst = instance(4);

        provisioner.create(&inst, &params("10.0.0")).await.unwrap();
        provisioner.destroy(&inst).await;

        assert!(!memory.has_namespace("ntpsrv_4").await);
        assert!(!memory.has_link("ntpveth4").await);

        // Destroying again finds nothing and stays quiet
        provisioner.destroy(&inst).await;

        let _ = std::fs::remove_dir_all(&inst.directory);
    }

    #[tokio::test]
    async fn test_destroy_sweeps_stray_veth() {
        let memory = MemoryBackend::new();
        let provisioner = Provisioner::new(Arc::new(memory.clone()));
        let inst = instance(5);

        // Half-configured creation: veth pair exists, namespace does not
        memory.create_veth("ntpveth5", "ntpeth5").await.unwrap();
        provisioner.destroy(&inst).await;

        assert!(!memory.has_link("ntpveth5").await);
    }
}
