use crate::{
    cri::{NamespaceMode, NamespaceOption},
    engine::{
        HostConfig, IPC_MODE_SHAREABLE, NAMESPACE_MODE_CONTAINER_PREFIX, NAMESPACE_MODE_HOST,
        NETWORK_MODE_DEFAULT, NETWORK_MODE_NONE,
    },
    network::plugin_manages_networking,
    ShimError, ShimResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The engine namespace mode strings of a sandbox or container.
///
/// An empty string leaves the choice to the engine, which gives the container a private namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceModes {
    /// The network mode.
    pub network: String,

    /// The PID mode.
    pub pid: String,

    /// The IPC mode.
    pub ipc: String,

    /// The UTS mode.
    pub uts: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl NamespaceModes {
    /// Writes the modes into a host configuration.
    pub fn apply(self, host_config: &mut HostConfig) {
        host_config.network_mode = self.network;
        host_config.pid_mode = self.pid;
        host_config.ipc_mode = self.ipc;
        host_config.uts_mode = self.uts;
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Derives the namespace modes of a sandbox container.
///
/// The sandbox owns the pod namespaces, so only NODE changes anything for PID and IPC. Without
/// host networking the network mode is `none` when `plugin_name` wires the pod network itself
/// and the engine default otherwise.
pub fn sandbox_namespace_modes(
    options: Option<&NamespaceOption>,
    plugin_name: &str,
) -> NamespaceModes {
    let options = options.cloned().unwrap_or_default();

    let network = if options.network == NamespaceMode::Node {
        NAMESPACE_MODE_HOST
    } else if plugin_manages_networking(plugin_name) {
        NETWORK_MODE_NONE
    } else {
        NETWORK_MODE_DEFAULT
    };

    let pid = match options.pid {
        NamespaceMode::Node => NAMESPACE_MODE_HOST,
        _ => "",
    };

    let ipc = match options.ipc {
        NamespaceMode::Node => NAMESPACE_MODE_HOST,
        _ => IPC_MODE_SHAREABLE,
    };

    NamespaceModes {
        network: network.to_string(),
        pid: pid.to_string(),
        ipc: ipc.to_string(),
        uts: host_uts(&options),
    }
}

/// Derives the namespace modes of a container of the sandbox `sandbox_id`.
///
/// Network and IPC always join the sandbox, which already carries any host sharing. PID follows
/// the requested mode: the host, the sandbox, a target container or a private namespace.
pub fn container_namespace_modes(
    options: Option<&NamespaceOption>,
    sandbox_id: &str,
) -> ShimResult<NamespaceModes> {
    let options = options.cloned().unwrap_or_default();
    let sandbox = join_container(sandbox_id);

    let pid = match options.pid {
        NamespaceMode::Node => NAMESPACE_MODE_HOST.to_string(),
        NamespaceMode::Pod => sandbox.clone(),
        NamespaceMode::Container => String::new(),
        NamespaceMode::Target => {
            if options.target_id.is_empty() {
                return Err(ShimError::InvalidArgument(
                    "target PID namespace requires a target container id".to_string(),
                ));
            }
            join_container(&options.target_id)
        }
    };

    Ok(NamespaceModes {
        network: sandbox.clone(),
        pid,
        ipc: sandbox,
        uts: host_uts(&options),
    })
}

/// Recovers the namespace options from an inspected host configuration.
///
/// A PID mode joining `sandbox_id` reads back as POD and one joining any other container as
/// TARGET.
pub fn namespace_options_from_host_config(
    host_config: &HostConfig,
    sandbox_id: Option<&str>,
) -> NamespaceOption {
    let shared = |mode: &str| {
        if mode == NAMESPACE_MODE_HOST {
            NamespaceMode::Node
        } else {
            NamespaceMode::Pod
        }
    };

    let (pid, target_id) = match host_config.pid_mode.as_str() {
        NAMESPACE_MODE_HOST => (NamespaceMode::Node, String::new()),
        mode => match mode.strip_prefix(NAMESPACE_MODE_CONTAINER_PREFIX) {
            Some(id) if Some(id) == sandbox_id => (NamespaceMode::Pod, String::new()),
            Some(id) => (NamespaceMode::Target, id.to_string()),
            None => (NamespaceMode::Container, String::new()),
        },
    };

    NamespaceOption {
        network: shared(&host_config.network_mode),
        pid,
        ipc: shared(&host_config.ipc_mode),
        target_id,
    }
}

fn join_container(id: &str) -> String {
    format!("{}{}", NAMESPACE_MODE_CONTAINER_PREFIX, id)
}

fn host_uts(options: &NamespaceOption) -> String {
    if options.is_host_network() {
        NAMESPACE_MODE_HOST.to_string()
    } else {
        String::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
