use std::{collections::HashMap, fmt, net::IpAddr};

use crate::ShimResult;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The name of the CNI network plugin.
pub const CNI_PLUGIN_NAME: &str = "cni";

/// The name of the kubenet network plugin.
pub const KUBENET_PLUGIN_NAME: &str = "kubenet";

/// The event sent to a plugin when the pod CIDR of the node changes.
pub const POD_CIDR_CHANGE_EVENT: &str = "pod-cidr-change";

/// The detail key carrying the new pod CIDR of a [`POD_CIDR_CHANGE_EVENT`].
pub const POD_CIDR_DETAIL: &str = "pod-cidr";

/// The runtime type prefix of sandbox container ids passed to plugins.
pub const DOCKER_RUNTIME_TYPE: &str = "docker";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A container id qualified by its runtime, rendered as `type://id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId {
    /// The runtime type.
    pub runtime_type: String,

    /// The runtime specific id.
    pub id: String,
}

/// The network status of a pod as reported by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodNetworkStatus {
    /// The primary address of the pod.
    pub ip: Option<IpAddr>,

    /// Every address of the pod, the primary one first.
    pub ips: Vec<IpAddr>,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A network backend that wires sandboxes into the pod network.
#[async_trait::async_trait]
pub trait NetworkPlugin: Send + Sync {
    /// Returns the plugin name.
    fn name(&self) -> &str;

    /// Sets up the network of a sandbox.
    async fn set_up_pod(
        &self,
        namespace: &str,
        name: &str,
        id: &ContainerId,
        annotations: &HashMap<String, String>,
        options: &HashMap<String, String>,
    ) -> ShimResult<()>;

    /// Tears down the network of a sandbox.
    async fn tear_down_pod(&self, namespace: &str, name: &str, id: &ContainerId) -> ShimResult<()>;

    /// Returns the network status of a sandbox, if the plugin tracks one.
    async fn get_pod_network_status(
        &self,
        namespace: &str,
        name: &str,
        id: &ContainerId,
    ) -> ShimResult<Option<PodNetworkStatus>>;

    /// Checks that the plugin is ready to set up pods.
    async fn status(&self) -> ShimResult<()>;

    /// Delivers a node level event such as [`POD_CIDR_CHANGE_EVENT`].
    async fn event(&self, name: &str, details: &HashMap<String, String>);
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContainerId {
    /// Qualifies an engine container id.
    pub fn docker(id: impl Into<String>) -> Self {
        Self {
            runtime_type: DOCKER_RUNTIME_TYPE.to_string(),
            id: id.into(),
        }
    }
}

impl PodNetworkStatus {
    /// Creates a status from a list of addresses, the primary one first.
    pub fn from_ips(ips: Vec<IpAddr>) -> Self {
        Self {
            ip: ips.first().copied(),
            ips,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns true if sandboxes managed by `plugin_name` start without engine networking.
pub fn plugin_manages_networking(plugin_name: &str) -> bool {
    matches!(plugin_name, CNI_PLUGIN_NAME | KUBENET_PLUGIN_NAME)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.runtime_type, self.id)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_id_display() {
        assert_eq!(ContainerId::docker("abc").to_string(), "docker://abc");
    }

    #[test]
    fn test_plugin_manages_networking() {
        assert!(plugin_manages_networking("cni"));
        assert!(plugin_manages_networking("kubenet"));
        assert!(!plugin_manages_networking("kubernetes.io/no-op"));
    }
}
