use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The condition reporting whether the runtime can serve requests.
pub const RUNTIME_READY: &str = "RuntimeReady";

/// The condition reporting whether the pod network is usable.
pub const NETWORK_READY: &str = "NetworkReady";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The response of `Version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    /// The version of the kubelet runtime API.
    pub version: String,

    /// The runtime name.
    pub runtime_name: String,

    /// The runtime version.
    pub runtime_version: String,

    /// The API version of the runtime.
    pub runtime_api_version: String,
}

/// A condition of the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCondition {
    /// The condition type, for example [`RUNTIME_READY`].
    pub condition_type: String,

    /// Whether the condition holds.
    pub status: bool,

    /// A brief reason when the condition does not hold.
    pub reason: String,

    /// A human readable message when the condition does not hold.
    pub message: String,
}

/// Optional features a runtime handler supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeHandlerFeatures {
    /// Whether recursive read only mounts are supported.
    pub recursive_read_only_mounts: bool,

    /// Whether user namespaces are supported.
    pub user_namespaces: bool,
}

/// A runtime handler and its features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeHandler {
    /// The handler name. Empty for the default handler.
    pub name: String,

    /// The handler features.
    pub features: RuntimeHandlerFeatures,
}

/// The response of `Status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// The runtime conditions.
    pub conditions: Vec<RuntimeCondition>,

    /// The runtime handlers.
    pub runtime_handlers: Vec<RuntimeHandler>,
}

/// The result of a command run synchronously in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecSyncResponse {
    /// Captured standard output.
    pub stdout: Vec<u8>,

    /// Captured standard error.
    pub stderr: Vec<u8>,

    /// The exit code of the command.
    pub exit_code: i32,
}

/// A request to run a streaming command in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ExecRequest {
    /// The target container.
    #[builder(setter(into))]
    pub container_id: String,

    /// The command to run.
    pub cmd: Vec<String>,

    /// Whether a TTY is allocated.
    #[builder(default)]
    pub tty: bool,

    /// Whether stdin is streamed.
    #[builder(default)]
    pub stdin: bool,

    /// Whether stdout is streamed.
    #[builder(default = true)]
    pub stdout: bool,

    /// Whether stderr is streamed.
    #[builder(default = true)]
    pub stderr: bool,
}

/// A request to attach to a running container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct AttachRequest {
    /// The target container.
    #[builder(setter(into))]
    pub container_id: String,

    /// Whether stdin is streamed.
    #[builder(default)]
    pub stdin: bool,

    /// Whether a TTY is used.
    #[builder(default)]
    pub tty: bool,

    /// Whether stdout is streamed.
    #[builder(default = true)]
    pub stdout: bool,

    /// Whether stderr is streamed.
    #[builder(default = true)]
    pub stderr: bool,
}

/// A request to forward ports of a pod sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct PortForwardRequest {
    /// The target sandbox.
    #[builder(setter(into))]
    pub pod_sandbox_id: String,

    /// The ports to forward.
    #[builder(default)]
    pub port: Vec<i32>,
}

/// The URL where a streaming request is served.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingResponse {
    /// The URL of the streaming endpoint.
    pub url: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RuntimeCondition {
    /// Creates a condition that holds.
    pub fn ready(condition_type: impl Into<String>) -> Self {
        Self {
            condition_type: condition_type.into(),
            status: true,
            ..Default::default()
        }
    }

    /// Creates a condition that does not hold.
    pub fn not_ready(
        condition_type: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: condition_type.into(),
            status: false,
            reason: reason.into(),
            message: message.into(),
        }
    }
}

impl StatusResponse {
    /// Returns the condition of the given type.
    pub fn condition(&self, condition_type: &str) -> Option<&RuntimeCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}
