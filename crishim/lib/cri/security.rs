use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{ShimError, ShimResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Legacy profile reference selecting the runtime default profile.
pub const PROFILE_RUNTIME_DEFAULT: &str = "runtime/default";

/// Deprecated spelling of [`PROFILE_RUNTIME_DEFAULT`] for seccomp.
pub const PROFILE_DOCKER_DEFAULT: &str = "docker/default";

/// Legacy profile reference disabling confinement.
pub const PROFILE_UNCONFINED: &str = "unconfined";

/// Legacy prefix of a profile stored on the node.
pub const PROFILE_LOCALHOST_PREFIX: &str = "localhost/";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Which namespace a container or sandbox shares.
///
/// The mode applies independently to the network, PID and IPC namespaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NamespaceMode {
    /// Share the namespace of the pod sandbox.
    #[default]
    Pod,

    /// Use a namespace private to the container.
    Container,

    /// Share the namespace of the node.
    Node,

    /// Share the namespace of another container of the pod.
    Target,
}

/// The namespace configuration of a sandbox or container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct NamespaceOption {
    /// The network namespace mode.
    #[builder(default)]
    pub network: NamespaceMode,

    /// The PID namespace mode.
    #[builder(default)]
    pub pid: NamespaceMode,

    /// The IPC namespace mode.
    #[builder(default)]
    pub ipc: NamespaceMode,

    /// The container whose namespace is shared when a mode is [`NamespaceMode::Target`].
    #[builder(default, setter(into))]
    pub target_id: String,
}

/// SELinux label fields. Empty fields are not applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct SELinuxOption {
    /// The SELinux user.
    #[builder(default, setter(into))]
    pub user: String,

    /// The SELinux role.
    #[builder(default, setter(into))]
    pub role: String,

    /// The SELinux type.
    #[serde(rename = "type")]
    #[builder(default, setter(into))]
    pub type_: String,

    /// The SELinux level.
    #[builder(default, setter(into))]
    pub level: String,
}

/// The kind of a seccomp or AppArmor profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ProfileType {
    /// The default profile of the container runtime.
    #[default]
    RuntimeDefault,

    /// No confinement.
    Unconfined,

    /// A profile stored on the node.
    Localhost,
}

/// A seccomp or AppArmor profile reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityProfile {
    /// The kind of profile.
    pub profile_type: ProfileType,

    /// The node local profile reference, only meaningful for [`ProfileType::Localhost`].
    pub localhost_ref: String,
}

/// Capabilities to add to and drop from the default set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct Capability {
    /// Capabilities to add.
    #[builder(default)]
    pub add_capabilities: Vec<String>,

    /// Capabilities to drop.
    #[builder(default)]
    pub drop_capabilities: Vec<String>,
}

/// The Linux security context of a pod sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct LinuxSandboxSecurityContext {
    /// The namespace modes of the sandbox.
    #[builder(default, setter(strip_option))]
    pub namespace_options: Option<NamespaceOption>,

    /// The SELinux label of the sandbox.
    #[builder(default, setter(strip_option))]
    pub selinux_options: Option<SELinuxOption>,

    /// The UID the sandbox process runs as.
    #[builder(default, setter(strip_option))]
    pub run_as_user: Option<i64>,

    /// The GID the sandbox process runs as.
    #[builder(default, setter(strip_option))]
    pub run_as_group: Option<i64>,

    /// Whether the sandbox root filesystem is read only.
    #[builder(default)]
    pub readonly_rootfs: bool,

    /// Additional groups of the sandbox process.
    #[builder(default)]
    pub supplemental_groups: Vec<i64>,

    /// Whether the sandbox is privileged.
    #[builder(default)]
    pub privileged: bool,

    /// The seccomp profile of the sandbox.
    #[builder(default, setter(strip_option))]
    pub seccomp: Option<SecurityProfile>,

    /// The deprecated seccomp profile reference, used when `seccomp` is unset.
    #[builder(default, setter(into))]
    pub seccomp_profile_path: String,
}

/// The Linux security context of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct LinuxContainerSecurityContext {
    /// Capabilities to add or drop.
    #[builder(default, setter(strip_option))]
    pub capabilities: Option<Capability>,

    /// Whether the container is privileged.
    #[builder(default)]
    pub privileged: bool,

    /// The namespace modes of the container.
    #[builder(default, setter(strip_option))]
    pub namespace_options: Option<NamespaceOption>,

    /// The SELinux label of the container.
    #[builder(default, setter(strip_option))]
    pub selinux_options: Option<SELinuxOption>,

    /// The UID the container process runs as.
    #[builder(default, setter(strip_option))]
    pub run_as_user: Option<i64>,

    /// The user name the container process runs as, used when `run_as_user` is unset.
    #[builder(default, setter(into))]
    pub run_as_username: String,

    /// The GID the container process runs as. Requires a user.
    #[builder(default, setter(strip_option))]
    pub run_as_group: Option<i64>,

    /// Whether the container root filesystem is read only.
    #[builder(default)]
    pub readonly_rootfs: bool,

    /// Additional groups of the container process.
    #[builder(default)]
    pub supplemental_groups: Vec<i64>,

    /// Whether the container process may gain new privileges.
    #[builder(default)]
    pub no_new_privs: bool,

    /// Paths masked inside the container.
    #[builder(default)]
    pub masked_paths: Vec<String>,

    /// Paths made read only inside the container.
    #[builder(default)]
    pub readonly_paths: Vec<String>,

    /// The seccomp profile of the container.
    #[builder(default, setter(strip_option))]
    pub seccomp: Option<SecurityProfile>,

    /// The deprecated seccomp profile reference, used when `seccomp` is unset.
    #[builder(default, setter(into))]
    pub seccomp_profile_path: String,

    /// The AppArmor profile of the container.
    #[builder(default, setter(strip_option))]
    pub apparmor: Option<SecurityProfile>,

    /// The deprecated AppArmor profile reference, used when `apparmor` is unset.
    #[builder(default, setter(into))]
    pub apparmor_profile: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SecurityProfile {
    /// Creates a reference to the runtime default profile.
    pub fn runtime_default() -> Self {
        Self::default()
    }

    /// Creates an unconfined profile reference.
    pub fn unconfined() -> Self {
        Self {
            profile_type: ProfileType::Unconfined,
            localhost_ref: String::new(),
        }
    }

    /// Creates a reference to a profile stored on the node.
    pub fn localhost(reference: impl Into<String>) -> Self {
        Self {
            profile_type: ProfileType::Localhost,
            localhost_ref: reference.into(),
        }
    }

    /// Parses a deprecated string profile reference.
    ///
    /// An empty reference yields `None`. Node local profiles must carry the `localhost/` prefix
    /// and any other reference is rejected.
    pub fn from_legacy(reference: &str) -> ShimResult<Option<Self>> {
        match reference {
            "" => Ok(None),
            PROFILE_RUNTIME_DEFAULT | PROFILE_DOCKER_DEFAULT => Ok(Some(Self::runtime_default())),
            PROFILE_UNCONFINED => Ok(Some(Self::unconfined())),
            other => match other.strip_prefix(PROFILE_LOCALHOST_PREFIX) {
                Some(name) => Ok(Some(Self::localhost(name))),
                None => Err(ShimError::InvalidSecurityProfile(format!(
                    "unknown profile reference {:?}",
                    other
                ))),
            },
        }
    }

    /// Resolves the profile from a structured field, falling back to a legacy reference.
    pub fn resolve(structured: Option<&SecurityProfile>, legacy: &str) -> ShimResult<Option<Self>> {
        match structured {
            Some(profile) => Ok(Some(profile.clone())),
            None => Self::from_legacy(legacy),
        }
    }
}

impl NamespaceOption {
    /// Returns true if the network namespace is shared with the node.
    pub fn is_host_network(&self) -> bool {
        self.network == NamespaceMode::Node
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_profile_from_legacy() -> anyhow::Result<()> {
        assert_eq!(SecurityProfile::from_legacy("")?, None);
        assert_eq!(
            SecurityProfile::from_legacy("docker/default")?,
            Some(SecurityProfile::runtime_default())
        );
        assert_eq!(
            SecurityProfile::from_legacy("unconfined")?,
            Some(SecurityProfile::unconfined())
        );
        assert_eq!(
            SecurityProfile::from_legacy("localhost//etc/seccomp/audit.json")?,
            Some(SecurityProfile::localhost("/etc/seccomp/audit.json"))
        );
        assert!(matches!(
            SecurityProfile::from_legacy("custom/profile"),
            Err(ShimError::InvalidSecurityProfile(_))
        ));
        Ok(())
    }

    #[test]
    fn test_security_profile_resolve_prefers_structured() -> anyhow::Result<()> {
        let structured = SecurityProfile::unconfined();
        assert_eq!(
            SecurityProfile::resolve(Some(&structured), "runtime/default")?,
            Some(structured)
        );
        assert_eq!(
            SecurityProfile::resolve(None, "runtime/default")?,
            Some(SecurityProfile::runtime_default())
        );
        Ok(())
    }
}
