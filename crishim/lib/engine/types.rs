use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use typed_builder::TypedBuilder;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The namespace mode string sharing a namespace with the host.
pub const NAMESPACE_MODE_HOST: &str = "host";

/// The prefix of a namespace mode string sharing a namespace with another container.
pub const NAMESPACE_MODE_CONTAINER_PREFIX: &str = "container:";

/// The IPC mode that lets other containers join the IPC namespace.
pub const IPC_MODE_SHAREABLE: &str = "shareable";

/// The network mode without any network interface but loopback.
pub const NETWORK_MODE_NONE: &str = "none";

/// The default network mode of the engine.
pub const NETWORK_MODE_DEFAULT: &str = "default";

/// The timestamp the engine reports for times that never happened.
const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

//--------------------------------------------------------------------------------------------------
// Types: Containers
//--------------------------------------------------------------------------------------------------

/// The health check of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthConfig {
    /// The check to run. `["NONE"]` disables any check inherited from the image.
    pub test: Vec<String>,
}

/// The portable part of a container configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerCreateConfig {
    /// The container hostname.
    pub hostname: String,

    /// The user the process runs as, `user[:group]`.
    pub user: String,

    /// Environment variables as `KEY=value`.
    pub env: Vec<String>,

    /// The command arguments.
    pub cmd: Vec<String>,

    /// The entrypoint.
    pub entrypoint: Vec<String>,

    /// The image reference.
    pub image: String,

    /// Labels of the container.
    pub labels: HashMap<String, String>,

    /// The working directory.
    pub working_dir: String,

    /// Exposed ports as `port/protocol`.
    pub exposed_ports: BTreeMap<String, HashMap<String, String>>,

    /// Whether stdin is kept open.
    pub open_stdin: bool,

    /// Whether stdin is closed after the first attach disconnects.
    pub stdin_once: bool,

    /// Whether a TTY is allocated.
    pub tty: bool,

    /// The health check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthConfig>,
}

/// Resource limits of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Resources {
    /// Memory limit in bytes.
    pub memory: i64,

    /// Memory plus swap limit in bytes.
    pub memory_swap: i64,

    /// Relative CPU weight.
    pub cpu_shares: i64,

    /// CFS quota in microseconds.
    pub cpu_quota: i64,

    /// CFS period in microseconds.
    pub cpu_period: i64,

    /// CPUs the container may run on.
    pub cpuset_cpus: String,

    /// Memory nodes the container may use.
    pub cpuset_mems: String,

    /// Host devices exposed to the container.
    pub devices: Vec<DeviceMapping>,
}

/// A host device exposed to a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceMapping {
    /// The device path on the host.
    pub path_on_host: String,

    /// The device path inside the container.
    pub path_in_container: String,

    /// The cgroup permissions.
    pub cgroup_permissions: String,
}

/// A published port on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    /// The host address.
    #[serde(rename = "HostIp")]
    pub host_ip: String,

    /// The host port.
    pub host_port: String,
}

/// The restart policy of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicy {
    /// The policy name, for example `no`.
    pub name: String,

    /// The maximum number of restarts.
    pub maximum_retry_count: i64,
}

/// Options of a bind mount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BindOptions {
    /// The mount propagation, for example `rprivate`.
    pub propagation: String,

    /// Whether the read only flag is applied to the top mount only.
    pub read_only_non_recursive: bool,

    /// Whether a recursive read only mount is required.
    pub read_only_force_recursive: bool,
}

/// A typed mount of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EngineMount {
    /// The mount type, for example `bind`.
    #[serde(rename = "Type")]
    pub mount_type: String,

    /// The source on the host.
    pub source: String,

    /// The target inside the container.
    pub target: String,

    /// Whether the mount is read only.
    pub read_only: bool,

    /// Bind specific options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_options: Option<BindOptions>,
}

/// The host specific part of a container configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostConfig {
    /// Bind mounts as `host:container[:options]`.
    pub binds: Vec<String>,

    /// Typed mounts.
    pub mounts: Vec<EngineMount>,

    /// Published ports keyed by `port/protocol`.
    pub port_bindings: BTreeMap<String, Vec<PortBinding>>,

    /// The network mode.
    pub network_mode: String,

    /// The IPC mode.
    pub ipc_mode: String,

    /// The PID mode.
    pub pid_mode: String,

    /// The UTS mode.
    #[serde(rename = "UTSMode")]
    pub uts_mode: String,

    /// The cgroup parent.
    pub cgroup_parent: String,

    /// Security options such as `seccomp=unconfined`.
    pub security_opt: Vec<String>,

    /// Additional groups of the container process.
    pub group_add: Vec<String>,

    /// Whether the container is privileged.
    pub privileged: bool,

    /// Whether the root filesystem is read only.
    pub readonly_rootfs: bool,

    /// Capabilities to add.
    pub cap_add: Vec<String>,

    /// Capabilities to drop.
    pub cap_drop: Vec<String>,

    /// OOM score adjustment.
    pub oom_score_adj: i64,

    /// Kernel parameters.
    pub sysctls: HashMap<String, String>,

    /// The restart policy.
    pub restart_policy: RestartPolicy,

    /// Paths masked inside the container.
    pub masked_paths: Vec<String>,

    /// Paths made read only inside the container.
    pub readonly_paths: Vec<String>,

    /// Resource limits.
    #[serde(flatten)]
    pub resources: Resources,
}

/// A request to create a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct CreateContainerRequest {
    /// The container name.
    #[builder(setter(into))]
    pub name: String,

    /// The portable configuration.
    #[builder(default)]
    pub config: ContainerCreateConfig,

    /// The host specific configuration.
    #[builder(default)]
    pub host_config: HostConfig,
}

/// The response of a container create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreateResponse {
    /// The id of the new container.
    pub id: String,

    /// Warnings raised while creating the container.
    pub warnings: Vec<String>,
}

/// The runtime state of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerStateJson {
    /// The state name: `created`, `running`, `exited` or `dead`.
    pub status: String,

    /// Whether the container is running.
    pub running: bool,

    /// Whether the container is paused.
    pub paused: bool,

    /// Whether the kernel killed the container for exceeding its memory limit.
    #[serde(rename = "OOMKilled")]
    pub oom_killed: bool,

    /// Whether the container is dead.
    pub dead: bool,

    /// The process id of the container.
    pub pid: i64,

    /// The exit code of the container process.
    pub exit_code: i32,

    /// The error that prevented the container from running.
    pub error: String,

    /// When the container last started.
    #[serde(
        deserialize_with = "deserialize_engine_time",
        serialize_with = "serialize_engine_time"
    )]
    pub started_at: Option<DateTime<Utc>>,

    /// When the container last finished.
    #[serde(
        deserialize_with = "deserialize_engine_time",
        serialize_with = "serialize_engine_time"
    )]
    pub finished_at: Option<DateTime<Utc>>,
}

/// The network settings of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// The IPv4 address on the default network.
    #[serde(rename = "IPAddress")]
    pub ip_address: String,

    /// The IPv6 address on the default network.
    #[serde(rename = "GlobalIPv6Address")]
    pub global_ipv6_address: String,
}

/// A mount as reported by inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MountPoint {
    /// The source on the host.
    pub source: String,

    /// The target inside the container.
    pub destination: String,

    /// Whether the mount is writable.
    #[serde(rename = "RW")]
    pub rw: bool,

    /// The mount propagation.
    pub propagation: String,
}

/// The full engine record of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerJson {
    /// The container id.
    pub id: String,

    /// The container name with a leading `/`.
    pub name: String,

    /// The creation time.
    #[serde(
        deserialize_with = "deserialize_engine_time",
        serialize_with = "serialize_engine_time"
    )]
    pub created: Option<DateTime<Utc>>,

    /// The runtime state.
    pub state: ContainerStateJson,

    /// The image id.
    pub image: String,

    /// The path of the log file the engine writes.
    pub log_path: String,

    /// The portable configuration.
    pub config: ContainerCreateConfig,

    /// The host specific configuration.
    pub host_config: HostConfig,

    /// The network settings.
    pub network_settings: NetworkSettings,

    /// The mounts.
    pub mounts: Vec<MountPoint>,
}

/// A container as returned by the list operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerSummary {
    /// The container id.
    pub id: String,

    /// The container names with a leading `/`.
    pub names: Vec<String>,

    /// The image reference the container was created from.
    pub image: String,

    /// The image id.
    #[serde(rename = "ImageID")]
    pub image_id: String,

    /// Creation time in seconds since the epoch.
    pub created: i64,

    /// The state name.
    pub state: String,

    /// A human readable status.
    pub status: String,

    /// Labels of the container.
    pub labels: HashMap<String, String>,
}

/// Filters of a list operation, as `key -> values`.
///
/// Supported keys for containers are `id`, `name`, `label` (`key` or `key=value`) and `status`.
/// Images support `reference`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListFilters(BTreeMap<String, Vec<String>>);

/// Options of the container list operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListContainersOptions {
    /// Whether stopped containers are included.
    pub all: bool,

    /// Filters every listed container must match.
    pub filters: ListFilters,
}

/// Options of the container remove operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveContainerOptions {
    /// Whether a running container is killed first.
    pub force: bool,

    /// Whether anonymous volumes are removed.
    pub remove_volumes: bool,
}

/// A resource update of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// The new resource limits. Zero values are left unchanged.
    pub resources: Resources,
}

//--------------------------------------------------------------------------------------------------
// Types: Images
//--------------------------------------------------------------------------------------------------

/// An image as returned by the list operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageSummary {
    /// The image id.
    pub id: String,

    /// Tags referring to the image.
    pub repo_tags: Vec<String>,

    /// Digests referring to the image.
    pub repo_digests: Vec<String>,

    /// The image size in bytes.
    pub size: i64,

    /// Creation time in seconds since the epoch.
    pub created: i64,
}

/// The portable configuration of an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageConfig {
    /// The user the image runs as.
    pub user: String,
}

/// The full engine record of an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageInspect {
    /// The image id.
    pub id: String,

    /// Tags referring to the image.
    pub repo_tags: Vec<String>,

    /// Digests referring to the image.
    pub repo_digests: Vec<String>,

    /// The image size in bytes.
    pub size: i64,

    /// The image configuration.
    pub config: ImageConfig,
}

/// A layer of an image history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageHistory {
    /// The layer id.
    pub id: String,

    /// The instruction that created the layer.
    pub created_by: String,

    /// The layer size in bytes.
    pub size: i64,

    /// Tags of the layer.
    pub tags: Vec<String>,
}

/// Options of the image list operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListImagesOptions {
    /// Whether intermediate images are included.
    pub all: bool,

    /// Filters every listed image must match.
    pub filters: ListFilters,
}

/// Options of the image remove operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveImageOptions {
    /// Whether the image is removed even when in use.
    pub force: bool,

    /// Whether untagged parents are removed.
    pub prune_children: bool,
}

/// One item of an image remove response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageDeleteResponse {
    /// A reference that was untagged.
    pub untagged: String,

    /// An image that was deleted.
    pub deleted: String,
}

/// Registry credentials passed to a pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    /// The user name.
    pub username: String,

    /// The password.
    pub password: String,

    /// Base64 encoded `user:password`.
    pub auth: String,

    /// The registry address.
    pub server_address: String,

    /// An identity token.
    pub identity_token: String,

    /// A registry bearer token.
    pub registry_token: String,
}

//--------------------------------------------------------------------------------------------------
// Types: Exec, Attach, Stats, System
//--------------------------------------------------------------------------------------------------

/// The configuration of an exec instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecConfig {
    /// The command to run.
    pub cmd: Vec<String>,

    /// Whether stdin is attached.
    pub attach_stdin: bool,

    /// Whether stdout is attached.
    pub attach_stdout: bool,

    /// Whether stderr is attached.
    pub attach_stderr: bool,

    /// Whether a TTY is allocated.
    pub tty: bool,
}

/// Options of the exec start operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStartOptions {
    /// Whether the exec runs detached.
    pub detach: bool,

    /// Whether a TTY is allocated.
    pub tty: bool,

    /// Bytes written to stdin.
    pub stdin: Option<Vec<u8>>,
}

/// Output captured from an exec instance or an attach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Captured standard output.
    pub stdout: Vec<u8>,

    /// Captured standard error.
    pub stderr: Vec<u8>,
}

/// The state of an exec instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExecInspect {
    /// The exec id.
    #[serde(rename = "ID")]
    pub id: String,

    /// The container the exec runs in.
    #[serde(rename = "ContainerID")]
    pub container_id: String,

    /// Whether the exec is running.
    pub running: bool,

    /// The exit code, once the exec finished.
    pub exit_code: Option<i32>,

    /// The process id of the exec.
    pub pid: i64,
}

/// The size of a terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    /// Rows.
    pub height: u16,

    /// Columns.
    pub width: u16,
}

/// Options of the attach operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachOptions {
    /// Whether stdin is attached.
    pub stdin: bool,

    /// Whether stdout is attached.
    pub stdout: bool,

    /// Whether stderr is attached.
    pub stderr: bool,

    /// Whether the stream is a TTY.
    pub tty: bool,
}

/// A raw resource usage sample of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStats {
    /// When the sample was taken.
    pub read_at: Option<DateTime<Utc>>,

    /// Total CPU time consumed in nanoseconds.
    pub cpu_usage_nanos: u64,

    /// Memory usage in bytes.
    pub memory_usage_bytes: u64,

    /// Memory limit in bytes.
    pub memory_limit_bytes: u64,
}

/// The version of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VersionInfo {
    /// The engine version.
    pub version: String,

    /// The highest API version the engine serves.
    pub api_version: String,

    /// The lowest API version the engine serves.
    pub min_api_version: String,

    /// The operating system of the engine host.
    pub os: String,

    /// The architecture of the engine host.
    pub arch: String,

    /// The kernel version of the engine host.
    pub kernel_version: String,
}

/// System wide information reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemInfo {
    /// The engine host id.
    #[serde(rename = "ID")]
    pub id: String,

    /// The engine host name.
    pub name: String,

    /// The storage driver.
    pub driver: String,

    /// The cgroup driver.
    pub cgroup_driver: String,

    /// Enabled security features such as `name=seccomp`.
    pub security_options: Vec<String>,

    /// The number of running containers.
    pub containers_running: i64,

    /// The engine version.
    pub server_version: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ListFilters {
    /// Creates an empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value for a key.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    /// Adds a label filter matching `key=value`.
    pub fn add_label(&mut self, key: &str, value: &str) {
        self.add("label", format!("{}={}", key, value));
    }

    /// Returns the values of a key.
    pub fn get(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns true if no filter is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if every label filter matches `labels`.
    pub fn match_labels(&self, labels: &HashMap<String, String>) -> bool {
        self.get("label").iter().all(|filter| match filter.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(filter.as_str()),
        })
    }
}

impl ContainerJson {
    /// Returns the container name without its leading `/`.
    pub fn trimmed_name(&self) -> &str {
        self.name.trim_start_matches('/')
    }
}

impl ContainerSummary {
    /// Returns the first name without its leading `/`.
    pub fn first_name(&self) -> Option<&str> {
        self.names.first().map(|n| n.trim_start_matches('/'))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Deserializes an engine timestamp, mapping the engine's zero time and empty strings to `None`.
fn deserialize_engine_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => {
            let time = DateTime::parse_from_rfc3339(s)
                .map_err(serde::de::Error::custom)?
                .with_timezone(&Utc);
            Ok((time.year() > 1).then_some(time))
        }
    }
}

fn serialize_engine_time<S>(time: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match time {
        Some(time) => serializer.serialize_str(&time.to_rfc3339()),
        None => serializer.serialize_str(ZERO_TIME),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
