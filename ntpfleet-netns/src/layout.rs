//! Deterministic instance naming and filesystem layout
//!
//! Every per-instance resource name is a pure function of the instance id,
//! and the namespace name is reversible back to the id. That reversibility
//! is what lets discovery reconstruct the fleet from live OS state alone.

use ntpfleet_core::{InstanceId, SubnetBase};
use std::path::{Path, PathBuf};

/// Prefix shared by every instance namespace (and instance directory)
pub const NAMESPACE_PREFIX: &str = "ntpsrv";

/// Name of the shared bridge device
pub const BRIDGE_NAME: &str = "ntpbr0";

/// Log file name inside each instance directory
pub const LOG_FILE: &str = "ntpserver.log";

/// Default root for per-instance directories
#[must_use]
pub fn default_state_root() -> PathBuf {
    PathBuf::from("/tmp")
}

/// A live (or about-to-be-created) instance, viewed through its derived names
///
/// Nothing here is persisted: an `Instance` is reconstructed from an id (or
/// from an observed namespace name) whenever it is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Instance id
    pub id: InstanceId,
    /// Network namespace name, `ntpsrv_<id>`
    pub namespace: String,
    /// Host-side veth end name
    pub veth_host: String,
    /// Namespace-side veth end name
    pub veth_peer: String,
    /// Per-instance directory holding the server log
    pub directory: PathBuf,
    /// Server log file path
    pub log_path: PathBuf,
}

impl Instance {
    /// Derive an instance view rooted at the default state directory
    #[must_use]
    pub fn new(id: InstanceId) -> Self {
        Self::with_root(id, &default_state_root())
    }

    /// Derive an instance view rooted at a custom state directory
    #[must_use]
    pub fn with_root(id: InstanceId, root: &Path) -> Self {
        let namespace = namespace_name(id);
        let directory = root.join(&namespace);
        let log_path = directory.join(LOG_FILE);

        Self {
            id,
            namespace,
            veth_host: format!("ntpveth{id}"),
            veth_peer: format!("ntpeth{id}"),
            directory,
            log_path,
        }
    }

    /// Address of this instance within the given subnet
    #[must_use]
    pub fn address(&self, subnet: &SubnetBase) -> String {
        subnet.instance_address(self.id)
    }

    /// Address of this instance in CIDR notation (/24)
    #[must_use]
    pub fn address_cidr(&self, subnet: &SubnetBase) -> String {
        format!("{}/24", self.address(subnet))
    }
}

/// Namespace name for an instance id
#[must_use]
pub fn namespace_name(id: InstanceId) -> String {
    format!("{NAMESPACE_PREFIX}_{id}")
}

/// Map an observed namespace name back to an instance view
///
/// Names that do not carry the fleet prefix, or whose suffix is not a valid
/// instance id, belong to someone else and yield `None`.
#[must_use]
pub fn instance_from_namespace(name: &str, root: &Path) -> Option<Instance> {
    let suffix = name.strip_prefix(NAMESPACE_PREFIX)?.strip_prefix('_')?;
    let id = suffix.parse::<InstanceId>().ok()?;
    Some(Instance::with_root(id, root))
}

/// Whether a directory entry name follows the instance-directory convention
#[must_use]
pub fn is_instance_dir(name: &str) -> bool {
    name.strip_prefix(NAMESPACE_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|suffix| suffix.chars().all(|c| c.is_ascii_digit()) && !suffix.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> InstanceId {
        InstanceId::new(raw).unwrap()
    }

    #[test]
    fn test_derived_names() {
        let instance = Instance::with_root(id(7), Path::new("/tmp"));

        assert_eq!(instance.namespace, "ntpsrv_7");
        assert_eq!(instance.veth_host, "ntpveth7");
        assert_eq!(instance.veth_peer, "ntpeth7");
        assert_eq!(instance.directory, PathBuf::from("/tmp/ntpsrv_7"));
        assert_eq!(instance.log_path, PathBuf::from("/tmp/ntpsrv_7/ntpserver.log"));
    }

    #[test]
    fn test_veth_names_fit_ifnamsiz() {
        // Interface names are capped at 15 chars by the kernel
        let instance = Instance::new(id(254));
        assert!(instance.veth_host.len() <= 15);
        assert!(instance.veth_peer.len() <= 15);
    }

    #[test]
    fn test_namespace_name_round_trip() {
        let root = default_state_root();

        for raw in [0, 1, 42, 254] {
            let name = namespace_name(id(raw));
            let recovered = instance_from_namespace(&name, &root).unwrap();
            assert_eq!(recovered.id.as_u32(), raw);
        }
    }

    #[test]
    fn test_foreign_namespaces_ignored() {
        let root = default_state_root();

        assert!(instance_from_namespace("ntpsrv_abc", &root).is_none());
        assert!(instance_from_namespace("ntpsrv_", &root).is_none());
        assert!(instance_from_namespace("ntpsrv_999", &root).is_none());
        assert!(instance_from_namespace("other_1", &root).is_none());
        assert!(instance_from_namespace("ntpsrv", &root).is_none());
    }

    #[test]
    fn test_instance_dir_convention() {
        assert!(is_instance_dir("ntpsrv_1"));
        assert!(is_instance_dir("ntpsrv_204"));
        assert!(!is_instance_dir("ntpsrv_"));
        assert!(!is_instance_dir("ntpsrv_1a"));
        assert!(!is_instance_dir("systemd-private-xyz"));
    }

    #[test]
    fn test_address_derivation() {
        let subnet = SubnetBase::new("10.0.0").unwrap();
        let instance = Instance::new(id(3));

        assert_eq!(instance.address(&subnet), "10.0.0.3");
        assert_eq!(instance.address_cidr(&subnet), "10.0.0.3/24");
    }
}
