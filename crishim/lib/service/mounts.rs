use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    config::RUNTIME_NAME,
    cri::{Mount, MountPropagation, SELinuxOption},
    engine::{BindOptions, EngineMount},
    ShimError, ShimResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The engine mount type of bind mounts.
const MOUNT_TYPE_BIND: &str = "bind";

/// The extended attribute holding the SELinux label of a file.
const SELINUX_XATTR: &str = "security.selinux";

/// Where the SELinux filesystem is mounted on hosts that enforce SELinux.
const DEFAULT_SELINUX_FS: &str = "/sys/fs/selinux";

const DEFAULT_SELINUX_USER: &str = "system_u";
const DEFAULT_SELINUX_ROLE: &str = "object_r";
const DEFAULT_SELINUX_TYPE: &str = "container_file_t";
const DEFAULT_SELINUX_LEVEL: &str = "s0";

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Applies an SELinux label to a host path before it is bind mounted into a container.
#[async_trait]
pub trait MountRelabeler: Send + Sync {
    /// Labels `path` and everything below it with `label`.
    async fn relabel(&self, path: &Path, label: &str) -> ShimResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Labels host paths by writing the `security.selinux` extended attribute.
///
/// Nothing is written when SELinux is not enabled on the host.
#[derive(Debug, Clone)]
pub struct XattrRelabeler {
    selinux_fs: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl XattrRelabeler {
    /// Creates a relabeler that checks for SELinux at `selinux_fs`.
    pub fn new(selinux_fs: impl Into<PathBuf>) -> Self {
        Self {
            selinux_fs: selinux_fs.into(),
        }
    }

    /// Returns true if SELinux is enabled on the host.
    pub fn selinux_enabled(&self) -> bool {
        self.selinux_fs.exists()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for XattrRelabeler {
    fn default() -> Self {
        Self::new(DEFAULT_SELINUX_FS)
    }
}

#[async_trait]
impl MountRelabeler for XattrRelabeler {
    async fn relabel(&self, path: &Path, label: &str) -> ShimResult<()> {
        if !self.selinux_enabled() {
            tracing::trace!("selinux is disabled, not relabeling {}", path.display());
            return Ok(());
        }

        let path = path.to_path_buf();
        let label = label.to_string();
        tokio::task::spawn_blocking(move || set_label_recursive(&path, label.as_bytes()))
            .await
            .map_err(ShimError::custom)??;

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Translates CRI mounts into engine binds and typed mounts.
///
/// Plain mounts become `host:container[:options]` binds. Recursive read only mounts need the
/// typed mount API, must be read only with private propagation and need engine support.
pub fn make_mount_bindings(
    mounts: &[Mount],
    recursive_read_only_supported: bool,
) -> ShimResult<(Vec<String>, Vec<EngineMount>)> {
    let mut binds = Vec::new();
    let mut engine_mounts = Vec::new();

    for mount in mounts {
        if mount.recursive_read_only {
            engine_mounts.push(recursive_read_only_mount(
                mount,
                recursive_read_only_supported,
            )?);
            continue;
        }

        let mut attrs = Vec::new();
        if mount.readonly {
            attrs.push("ro");
        }
        match mount.propagation {
            MountPropagation::PropagationPrivate => {}
            MountPropagation::PropagationBidirectional => attrs.push("rshared"),
            MountPropagation::PropagationHostToContainer => attrs.push("rslave"),
        }

        let mut bind = format!("{}:{}", mount.host_path, mount.container_path);
        if !attrs.is_empty() {
            bind = format!("{}:{}", bind, attrs.join(","));
        }
        binds.push(bind);
    }

    Ok((binds, engine_mounts))
}

/// Builds the SELinux file label for the mounts of a container.
///
/// Fields left empty in `options` fall back to the container file defaults.
pub fn mount_label(options: Option<&SELinuxOption>) -> String {
    let field = |value: Option<&String>, default: &'static str| {
        value
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| default.to_string())
    };

    format!(
        "{}:{}:{}:{}",
        field(options.map(|o| &o.user), DEFAULT_SELINUX_USER),
        field(options.map(|o| &o.role), DEFAULT_SELINUX_ROLE),
        field(options.map(|o| &o.type_), DEFAULT_SELINUX_TYPE),
        field(options.map(|o| &o.level), DEFAULT_SELINUX_LEVEL),
    )
}

fn recursive_read_only_mount(mount: &Mount, supported: bool) -> ShimResult<EngineMount> {
    if !mount.readonly {
        return Err(ShimError::InvalidRecursiveReadOnly(format!(
            "mount {:?} must be read only",
            mount.container_path
        )));
    }
    if mount.propagation != MountPropagation::PropagationPrivate {
        return Err(ShimError::InvalidRecursiveReadOnly(format!(
            "mount {:?} must use private propagation, got {:?}",
            mount.container_path, mount.propagation
        )));
    }
    if !supported {
        return Err(ShimError::RecursiveReadOnlyUnsupported(
            RUNTIME_NAME.to_string(),
        ));
    }

    Ok(EngineMount {
        mount_type: MOUNT_TYPE_BIND.to_string(),
        source: mount.host_path.clone(),
        target: mount.container_path.clone(),
        read_only: true,
        bind_options: Some(BindOptions {
            propagation: "rprivate".to_string(),
            read_only_force_recursive: true,
            ..Default::default()
        }),
    })
}

fn set_label_recursive(path: &Path, label: &[u8]) -> ShimResult<()> {
    xattr::set(path, SELINUX_XATTR, label)?;

    let metadata = std::fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        for entry in std::fs::read_dir(path)? {
            set_label_recursive(&entry?.path(), label)?;
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_mount_bindings() -> anyhow::Result<()> {
        let mounts = vec![
            Mount::builder().host_path("/data").container_path("/data").build(),
            Mount::builder()
                .host_path("/etc/config")
                .container_path("/config")
                .readonly(true)
                .propagation(MountPropagation::PropagationHostToContainer)
                .build(),
            Mount::builder()
                .host_path("/var/lib/kubelet")
                .container_path("/kubelet")
                .propagation(MountPropagation::PropagationBidirectional)
                .build(),
        ];

        let (binds, engine_mounts) = make_mount_bindings(&mounts, false)?;
        assert_eq!(
            binds,
            vec![
                "/data:/data",
                "/etc/config:/config:ro,rslave",
                "/var/lib/kubelet:/kubelet:rshared"
            ]
        );
        assert!(engine_mounts.is_empty());

        Ok(())
    }

    #[test]
    fn test_recursive_read_only_mounts() -> anyhow::Result<()> {
        let rro = Mount::builder()
            .host_path("/secrets")
            .container_path("/secrets")
            .readonly(true)
            .recursive_read_only(true)
            .build();

        let (binds, engine_mounts) = make_mount_bindings(std::slice::from_ref(&rro), true)?;
        assert!(binds.is_empty());
        assert_eq!(engine_mounts.len(), 1);
        assert_eq!(engine_mounts[0].mount_type, "bind");
        assert!(engine_mounts[0].read_only);
        assert!(engine_mounts[0]
            .bind_options
            .as_ref()
            .is_some_and(|b| b.read_only_force_recursive));

        assert!(matches!(
            make_mount_bindings(std::slice::from_ref(&rro), false),
            Err(ShimError::RecursiveReadOnlyUnsupported(name)) if name == "docker"
        ));

        let writable = Mount {
            readonly: false,
            ..rro.clone()
        };
        assert!(matches!(
            make_mount_bindings(&[writable], true),
            Err(ShimError::InvalidRecursiveReadOnly(_))
        ));

        let shared = Mount {
            propagation: MountPropagation::PropagationBidirectional,
            ..rro
        };
        assert!(matches!(
            make_mount_bindings(&[shared], true),
            Err(ShimError::InvalidRecursiveReadOnly(_))
        ));

        Ok(())
    }

    #[test]
    fn test_mount_label() {
        assert_eq!(mount_label(None), "system_u:object_r:container_file_t:s0");

        let options = SELinuxOption::builder().level("s0:c1,c2").build();
        assert_eq!(
            mount_label(Some(&options)),
            "system_u:object_r:container_file_t:s0:c1,c2"
        );
    }

    #[tokio::test]
    async fn test_xattr_relabeler_skips_without_selinux() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let relabeler = XattrRelabeler::new(dir.path().join("no-selinux"));
        assert!(!relabeler.selinux_enabled());

        relabeler
            .relabel(&dir.path().join("missing"), "system_u:object_r:container_file_t:s0")
            .await?;

        Ok(())
    }
}
