//! Shared bridge network
//!
//! All instances attach to one layer-2 bridge, lazily created the first
//! time an instance needs it.
//!
//! Configuration hazard: the bridge host address is fixed by whichever
//! subnet the FIRST instance was created with. Later `ensure` calls with a
//! different subnet are silent no-ops, so mixing subnets puts instances in
//! one broadcast domain behind a host address from another prefix. This
//! mirrors the source behavior and is deliberate.

use ntpfleet_core::{Result, SubnetBase};
use std::sync::Arc;

use crate::backend::NetnsBackend;
use crate::layout::BRIDGE_NAME;

/// Singleton shared bridge, identified by [`BRIDGE_NAME`]
#[derive(Clone)]
pub struct SharedBridge {
    backend: Arc<dyn NetnsBackend>,
}

impl SharedBridge {
    /// Create a handle on the shared bridge
    #[must_use]
    pub fn new(backend: Arc<dyn NetnsBackend>) -> Self {
        Self { backend }
    }

    /// Ensure the bridge exists, is addressed, and is up
    ///
    /// A no-op when the bridge already exists; the requested subnet is then
    /// silently ignored (see the module docs). Enables IPv4 forwarding
    /// host-wide on first creation, which is global and not reverted on
    /// teardown.
    pub async fn ensure(&self, subnet: &SubnetBase) -> Result<()> {
        if self.backend.link_exists(BRIDGE_NAME).await? {
            tracing::debug!(
                bridge = BRIDGE_NAME,
                "Bridge already present, requested address ignored"
            );
            return Ok(());
        }

        tracing::info!(
            bridge = BRIDGE_NAME,
            address = %subnet.host_cidr(),
            "Creating shared bridge"
        );

        self.backend.create_bridge(BRIDGE_NAME).await?;
        self.backend
            .add_address(BRIDGE_NAME, &subnet.host_cidr())
            .await?;
        self.backend.link_up(BRIDGE_NAME).await?;
        self.backend.enable_ip_forwarding().await?;

        Ok(())
    }

    /// Remove the bridge, bringing it down first
    ///
    /// An absent bridge is success.
    pub async fn remove(&self) -> Result<bool> {
        if !self.backend.link_exists(BRIDGE_NAME).await? {
            return Ok(false);
        }

        if let Err(e) = self.backend.link_down(BRIDGE_NAME).await {
            tracing::warn!(bridge = BRIDGE_NAME, error = %e, "Could not bring bridge down");
        }
        self.backend.delete_link(BRIDGE_NAME).await?;

        tracing::info!(bridge = BRIDGE_NAME, "Shared bridge removed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn test_ensure_creates_once() {
        let memory = MemoryBackend::new();
        let bridge = SharedBridge::new(Arc::new(memory.clone()));

        let first = SubnetBase::new("192.168.100").unwrap();
        bridge.ensure(&first).await.unwrap();

        assert!(memory.has_link(BRIDGE_NAME).await);
        assert!(memory.link_is_up(BRIDGE_NAME).await);
        assert!(memory.ip_forwarding_enabled().await);
        assert_eq!(
            memory.link_addresses(BRIDGE_NAME).await,
            vec!["192.168.100.254/24"]
        );

        // A second subnet is silently ignored
        let second = SubnetBase::new("10.9.8").unwrap();
        bridge.ensure(&second).await.unwrap();
        assert_eq!(
            memory.link_addresses(BRIDGE_NAME).await,
            vec!["192.168.100.254/24"]
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let memory = MemoryBackend::new();
        let bridge = SharedBridge::new(Arc::new(memory.clone()));

        // Absent bridge: nothing to do
        assert!(!bridge.remove().await.unwrap());

        bridge
            .ensure(&SubnetBase::new("192.168.100").unwrap())
            .await
            .unwrap();
        assert!(bridge.remove().await.unwrap());
        assert!(!memory.has_link(BRIDGE_NAME).await);
        assert!(!bridge.remove().await.unwrap());
    }
}
