use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::LinuxContainerSecurityContext;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Identifies a container within its pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// The container name.
    pub name: String,

    /// The attempt number of the container.
    pub attempt: u32,
}

/// An image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ImageSpec {
    /// The image name, tag or digest.
    #[builder(setter(into))]
    pub image: String,

    /// Annotations of the image reference.
    #[builder(default)]
    pub annotations: HashMap<String, String>,
}

/// An environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// The variable name.
    pub key: String,

    /// The variable value.
    pub value: String,
}

/// How mounts propagate between the host and the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MountPropagation {
    /// No propagation.
    #[default]
    PropagationPrivate,

    /// Host mounts propagate into the container.
    PropagationHostToContainer,

    /// Mounts propagate both ways.
    PropagationBidirectional,
}

/// A host path mounted into a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct Mount {
    /// The path inside the container.
    #[builder(setter(into))]
    pub container_path: String,

    /// The path on the host.
    #[builder(setter(into))]
    pub host_path: String,

    /// Whether the mount is read only.
    #[builder(default)]
    pub readonly: bool,

    /// Whether the host path is relabeled for SELinux before mounting.
    #[builder(default)]
    pub selinux_relabel: bool,

    /// The mount propagation.
    #[builder(default)]
    pub propagation: MountPropagation,

    /// Whether the read only flag applies to every sub mount.
    #[builder(default)]
    pub recursive_read_only: bool,
}

/// A host device exposed to a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct Device {
    /// The device path inside the container.
    #[builder(setter(into))]
    pub container_path: String,

    /// The device path on the host.
    #[builder(setter(into))]
    pub host_path: String,

    /// The cgroup permissions, a combination of `r`, `w` and `m`.
    #[builder(default = "rwm".to_string(), setter(into))]
    pub permissions: String,
}

/// Linux resource constraints of a container. Zero values are not applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct LinuxContainerResources {
    /// CFS period in microseconds.
    #[builder(default)]
    pub cpu_period: i64,

    /// CFS quota in microseconds.
    #[builder(default)]
    pub cpu_quota: i64,

    /// Relative CPU weight.
    #[builder(default)]
    pub cpu_shares: i64,

    /// Memory limit in bytes.
    #[builder(default)]
    pub memory_limit_in_bytes: i64,

    /// OOM score adjustment.
    #[builder(default)]
    pub oom_score_adj: i64,

    /// CPUs the container may run on.
    #[builder(default, setter(into))]
    pub cpuset_cpus: String,

    /// Memory nodes the container may use.
    #[builder(default, setter(into))]
    pub cpuset_mems: String,
}

/// Linux specific container configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct LinuxContainerConfig {
    /// Resource constraints.
    #[builder(default, setter(strip_option))]
    pub resources: Option<LinuxContainerResources>,

    /// The security context.
    #[builder(default, setter(strip_option))]
    pub security_context: Option<LinuxContainerSecurityContext>,
}

/// The configuration of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ContainerConfig {
    /// The container identity.
    pub metadata: ContainerMetadata,

    /// The image to run.
    pub image: ImageSpec,

    /// The entrypoint.
    #[builder(default)]
    pub command: Vec<String>,

    /// The arguments of the entrypoint.
    #[builder(default)]
    pub args: Vec<String>,

    /// The working directory.
    #[builder(default, setter(into))]
    pub working_dir: String,

    /// Environment variables.
    #[builder(default)]
    pub envs: Vec<KeyValue>,

    /// Host paths to mount.
    #[builder(default)]
    pub mounts: Vec<Mount>,

    /// Host devices to expose.
    #[builder(default)]
    pub devices: Vec<Device>,

    /// Labels identifying the container.
    #[builder(default)]
    pub labels: HashMap<String, String>,

    /// Opaque annotations of the container.
    #[builder(default)]
    pub annotations: HashMap<String, String>,

    /// The log path relative to the sandbox log directory.
    #[builder(default, setter(into))]
    pub log_path: String,

    /// Whether stdin is kept open.
    #[builder(default)]
    pub stdin: bool,

    /// Whether stdin is closed after the first attach disconnects.
    #[builder(default)]
    pub stdin_once: bool,

    /// Whether a TTY is allocated.
    #[builder(default)]
    pub tty: bool,

    /// Linux specific configuration.
    #[builder(default, setter(strip_option))]
    pub linux: Option<LinuxContainerConfig>,
}

/// The state of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerState {
    /// Created but never started.
    ContainerCreated,

    /// Running.
    ContainerRunning,

    /// Exited.
    ContainerExited,

    /// Unknown.
    #[default]
    ContainerUnknown,
}

/// Criteria for listing containers. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ContainerFilter {
    /// The container id.
    #[builder(default, setter(strip_option, into))]
    pub id: Option<String>,

    /// The container state.
    #[builder(default, setter(strip_option))]
    pub state: Option<ContainerState>,

    /// The owning sandbox id.
    #[builder(default, setter(strip_option, into))]
    pub pod_sandbox_id: Option<String>,

    /// Labels every matching container must carry.
    #[builder(default)]
    pub label_selector: HashMap<String, String>,
}

/// A container as reported by `ListContainers`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// The container id.
    pub id: String,

    /// The owning sandbox id.
    pub pod_sandbox_id: String,

    /// The container identity.
    pub metadata: ContainerMetadata,

    /// The image as requested.
    pub image: ImageSpec,

    /// The image id the container runs.
    pub image_ref: String,

    /// The container state.
    pub state: ContainerState,

    /// Creation time in nanoseconds since the epoch.
    pub created_at: i64,

    /// Labels of the container.
    pub labels: HashMap<String, String>,

    /// Annotations of the container.
    pub annotations: HashMap<String, String>,
}

/// The detailed status of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    /// The container id.
    pub id: String,

    /// The container identity.
    pub metadata: ContainerMetadata,

    /// The container state.
    pub state: ContainerState,

    /// Creation time in nanoseconds since the epoch.
    pub created_at: i64,

    /// Start time in nanoseconds since the epoch.
    pub started_at: i64,

    /// Finish time in nanoseconds since the epoch.
    pub finished_at: i64,

    /// The exit code of the container process.
    pub exit_code: i32,

    /// The image the container runs.
    pub image: ImageSpec,

    /// The resolved image reference.
    pub image_ref: String,

    /// A brief machine readable reason for the state.
    pub reason: String,

    /// A human readable message for the state.
    pub message: String,

    /// Labels of the container.
    pub labels: HashMap<String, String>,

    /// Annotations of the container.
    pub annotations: HashMap<String, String>,

    /// Mounts of the container.
    pub mounts: Vec<Mount>,

    /// The absolute path of the container log.
    pub log_path: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContainerMetadata {
    /// Creates container metadata.
    pub fn new(name: impl Into<String>, attempt: u32) -> Self {
        Self {
            name: name.into(),
            attempt,
        }
    }
}

impl KeyValue {
    /// Creates an environment variable.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl ContainerConfig {
    /// Returns the security context, if any.
    pub fn security_context(&self) -> Option<&LinuxContainerSecurityContext> {
        self.linux.as_ref().and_then(|l| l.security_context.as_ref())
    }

    /// Returns true if the container runs privileged.
    pub fn is_privileged(&self) -> bool {
        self.security_context()
            .map(|s| s.privileged)
            .unwrap_or(false)
    }
}
