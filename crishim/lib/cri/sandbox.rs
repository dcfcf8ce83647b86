use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::ShimError;

use super::{LinuxSandboxSecurityContext, NamespaceOption};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Identifies a pod sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSandboxMetadata {
    /// The pod name.
    pub name: String,

    /// The pod UID.
    pub uid: String,

    /// The pod namespace.
    pub namespace: String,

    /// The attempt number of the sandbox.
    pub attempt: u32,
}

/// The transport protocol of a port mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP.
    #[default]
    Tcp,

    /// UDP.
    Udp,

    /// SCTP.
    Sctp,
}

/// A port exposed by the pod on the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct PortMapping {
    /// The protocol of the port.
    #[builder(default)]
    pub protocol: Protocol,

    /// The port inside the pod.
    pub container_port: i32,

    /// The port on the node. Zero means the port is not published.
    #[builder(default)]
    pub host_port: i32,

    /// The node address to bind to. Empty binds to every address.
    #[builder(default, setter(into))]
    pub host_ip: String,
}

/// The DNS configuration of a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct DnsConfig {
    /// Name servers.
    #[builder(default)]
    pub servers: Vec<String>,

    /// Search domains.
    #[builder(default)]
    pub searches: Vec<String>,

    /// Resolver options.
    #[builder(default)]
    pub options: Vec<String>,
}

/// Linux specific sandbox configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct LinuxPodSandboxConfig {
    /// The cgroup parent of the sandbox.
    #[builder(default, setter(into))]
    pub cgroup_parent: String,

    /// The security context of the sandbox.
    #[builder(default, setter(strip_option))]
    pub security_context: Option<LinuxSandboxSecurityContext>,

    /// Kernel parameters of the sandbox.
    #[builder(default)]
    pub sysctls: HashMap<String, String>,
}

/// The configuration of a pod sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct PodSandboxConfig {
    /// The sandbox identity.
    pub metadata: PodSandboxMetadata,

    /// The hostname of the sandbox.
    #[builder(default, setter(into))]
    pub hostname: String,

    /// The directory under which container logs of the pod are stored.
    #[builder(default, setter(into))]
    pub log_directory: String,

    /// The DNS configuration.
    #[builder(default, setter(strip_option))]
    pub dns_config: Option<DnsConfig>,

    /// Ports published on the node.
    #[builder(default)]
    pub port_mappings: Vec<PortMapping>,

    /// Labels identifying the sandbox.
    #[builder(default)]
    pub labels: HashMap<String, String>,

    /// Opaque annotations of the sandbox.
    #[builder(default)]
    pub annotations: HashMap<String, String>,

    /// Linux specific configuration.
    #[builder(default, setter(strip_option))]
    pub linux: Option<LinuxPodSandboxConfig>,
}

/// The state of a pod sandbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PodSandboxState {
    /// The sandbox is running with its network set up.
    SandboxReady,

    /// The sandbox is stopped, gone or has no network.
    #[default]
    SandboxNotReady,
}

/// Criteria for listing pod sandboxes. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct PodSandboxFilter {
    /// The sandbox id.
    #[builder(default, setter(strip_option, into))]
    pub id: Option<String>,

    /// The sandbox state.
    #[builder(default, setter(strip_option))]
    pub state: Option<PodSandboxState>,

    /// Labels every matching sandbox must carry.
    #[builder(default)]
    pub label_selector: HashMap<String, String>,
}

/// A pod sandbox as reported by `ListPodSandbox`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSandbox {
    /// The sandbox id.
    pub id: String,

    /// The sandbox identity.
    pub metadata: PodSandboxMetadata,

    /// The sandbox state.
    pub state: PodSandboxState,

    /// Creation time in nanoseconds since the epoch.
    pub created_at: i64,

    /// Labels of the sandbox.
    pub labels: HashMap<String, String>,

    /// Annotations of the sandbox.
    pub annotations: HashMap<String, String>,

    /// The runtime handler of the sandbox.
    pub runtime_handler: String,
}

/// The addresses of a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSandboxNetworkStatus {
    /// The primary address.
    pub ip: String,

    /// Further addresses, for example the other IP family.
    pub additional_ips: Vec<String>,
}

/// The detailed status of a pod sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSandboxStatus {
    /// The sandbox id.
    pub id: String,

    /// The sandbox identity.
    pub metadata: PodSandboxMetadata,

    /// The sandbox state.
    pub state: PodSandboxState,

    /// Creation time in nanoseconds since the epoch.
    pub created_at: i64,

    /// The pod addresses. Unset for host network sandboxes and sandboxes without network.
    pub network: Option<PodSandboxNetworkStatus>,

    /// The namespace modes derived from the engine record.
    pub namespace_options: NamespaceOption,

    /// Labels of the sandbox.
    pub labels: HashMap<String, String>,

    /// Annotations of the sandbox.
    pub annotations: HashMap<String, String>,

    /// The runtime handler of the sandbox.
    pub runtime_handler: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PodSandboxMetadata {
    /// Creates sandbox metadata.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        uid: impl Into<String>,
        attempt: u32,
    ) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
            namespace: namespace.into(),
            attempt,
        }
    }
}

impl Protocol {
    /// Returns the lowercase name the engine uses in port specifications.
    pub fn engine_name(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        }
    }
}

impl PodSandboxConfig {
    /// Returns the namespace modes of the sandbox, if any were requested.
    pub fn namespace_options(&self) -> Option<&NamespaceOption> {
        self.linux
            .as_ref()
            .and_then(|l| l.security_context.as_ref())
            .and_then(|s| s.namespace_options.as_ref())
    }

    /// Returns true if the sandbox shares the network namespace of the node.
    pub fn is_host_network(&self) -> bool {
        self.namespace_options()
            .map(NamespaceOption::is_host_network)
            .unwrap_or(false)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for Protocol {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "sctp" => Ok(Self::Sctp),
            _ => Err(ShimError::UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
            Self::Sctp => write!(f, "SCTP"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cri::NamespaceMode;

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("TCP".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("udp".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("Sctp".parse::<Protocol>().unwrap(), Protocol::Sctp);
        assert!(matches!(
            "icmp".parse::<Protocol>(),
            Err(ShimError::UnknownProtocol(p)) if p == "icmp"
        ));
    }

    #[test]
    fn test_protocol_serde_uses_uppercase() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Protocol::Sctp)?, "\"SCTP\"");
        assert_eq!(serde_json::from_str::<Protocol>("\"UDP\"")?, Protocol::Udp);
        Ok(())
    }

    #[test]
    fn test_pod_sandbox_config_host_network() {
        let config = PodSandboxConfig::builder()
            .metadata(PodSandboxMetadata::new("web", "default", "uid", 0))
            .build();
        assert!(!config.is_host_network());

        let config = PodSandboxConfig::builder()
            .metadata(PodSandboxMetadata::new("web", "default", "uid", 0))
            .linux(
                LinuxPodSandboxConfig::builder()
                    .security_context(
                        LinuxSandboxSecurityContext::builder()
                            .namespace_options(
                                NamespaceOption::builder()
                                    .network(NamespaceMode::Node)
                                    .build(),
                            )
                            .build(),
                    )
                    .build(),
            )
            .build();
        assert!(config.is_host_network());
    }
}
