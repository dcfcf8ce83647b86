use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use crishim_utils::{atomic_write, ensure_dir, remove_file_if_exists};
use tokio::sync::Mutex;

use crate::{cri::ContainerConfig, engine::HostConfig, ShimResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The container annotation carrying an inline credential spec document.
pub const CREDENTIAL_SPEC_ANNOTATION: &str =
    "container.alpha.windows.kubernetes.io/gmsa-credential-spec";

/// The prefix of credential spec files written by the shim.
const CREDENTIAL_SPEC_FILE_PREFIX: &str = "crishim-credspec-";

/// The engine security option key that points at a credential spec.
const CREDENTIAL_SPEC_OPT: &str = "credentialspec";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Platform artifacts created for a container that must be removed with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupInfo {
    /// Files to delete when the container goes away.
    pub files: Vec<PathBuf>,
}

/// Cleanup info of every container created by this shim instance, keyed by container id.
#[derive(Debug, Default)]
pub struct ContainerCleanupTable {
    entries: Mutex<HashMap<String, CleanupInfo>>,
}

/// Materializes credential spec annotations into files the engine reads.
#[derive(Debug, Clone)]
pub struct CredentialSpecHooks {
    dir: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Platform specific steps around container creation and removal.
#[async_trait]
pub trait PlatformHooks: Send + Sync {
    /// Prepares platform artifacts for a container about to be created.
    ///
    /// Returns what must be cleaned up once the container is gone.
    async fn prepare(
        &self,
        config: &ContainerConfig,
        host_config: &mut HostConfig,
    ) -> ShimResult<Option<CleanupInfo>>;

    /// Removes the artifacts of a container.
    async fn cleanup(&self, info: &CleanupInfo) -> ShimResult<()>;

    /// Removes artifacts left behind by an earlier run of the shim.
    async fn sweep(&self) -> ShimResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ContainerCleanupTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the cleanup info of a container.
    pub async fn insert(&self, container_id: &str, info: CleanupInfo) {
        self.entries
            .lock()
            .await
            .insert(container_id.to_string(), info);
    }

    /// Takes the cleanup info of a container out of the table.
    pub async fn remove(&self, container_id: &str) -> Option<CleanupInfo> {
        self.entries.lock().await.remove(container_id)
    }
}

impl CredentialSpecHooks {
    /// Creates hooks that keep credential spec files in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the credential spec directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl PlatformHooks for CredentialSpecHooks {
    async fn prepare(
        &self,
        config: &ContainerConfig,
        host_config: &mut HostConfig,
    ) -> ShimResult<Option<CleanupInfo>> {
        let Some(spec) = config.annotations.get(CREDENTIAL_SPEC_ANNOTATION) else {
            return Ok(None);
        };

        ensure_dir(&self.dir).await?;
        let name = format!(
            "{}{}.json",
            CREDENTIAL_SPEC_FILE_PREFIX,
            hex::encode(rand::random::<[u8; 8]>())
        );
        let path = self.dir.join(&name);
        atomic_write(&path, spec.as_bytes().to_vec()).await?;

        host_config
            .security_opt
            .push(format!("{}=file://{}", CREDENTIAL_SPEC_OPT, name));

        tracing::debug!(
            "wrote credential spec of container {} to {}",
            config.metadata.name,
            path.display()
        );
        Ok(Some(CleanupInfo { files: vec![path] }))
    }

    async fn cleanup(&self, info: &CleanupInfo) -> ShimResult<()> {
        for file in &info.files {
            if remove_file_if_exists(file).await? {
                tracing::debug!("removed credential spec {}", file.display());
            }
        }
        Ok(())
    }

    async fn sweep(&self) -> ShimResult<()> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(CREDENTIAL_SPEC_FILE_PREFIX) {
                remove_file_if_exists(entry.path()).await?;
                tracing::info!("removed leftover credential spec {}", entry.path().display());
            }
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cri::{ContainerMetadata, ImageSpec};

    fn config(annotations: &[(&str, &str)]) -> ContainerConfig {
        ContainerConfig::builder()
            .metadata(ContainerMetadata::new("app", 0))
            .image(ImageSpec::builder().image("busybox").build())
            .annotations(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
            .build()
    }

    #[test_log::test(tokio::test)]
    async fn test_credential_spec_hooks_lifecycle() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let hooks = CredentialSpecHooks::new(dir.path().join("credspecs"));

        let mut host_config = HostConfig::default();
        let info = hooks
            .prepare(
                &config(&[(CREDENTIAL_SPEC_ANNOTATION, r#"{"CmsPlugins":["ActiveDirectory"]}"#)]),
                &mut host_config,
            )
            .await?
            .expect("cleanup info");

        assert_eq!(info.files.len(), 1);
        let path = &info.files[0];
        assert_eq!(
            tokio::fs::read_to_string(path).await?,
            r#"{"CmsPlugins":["ActiveDirectory"]}"#
        );

        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(
            host_config.security_opt,
            vec![format!("credentialspec=file://{}", file_name)]
        );

        hooks.cleanup(&info).await?;
        assert!(!path.exists());
        hooks.cleanup(&info).await?;

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_credential_spec_hooks_without_annotation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let hooks = CredentialSpecHooks::new(dir.path());

        let mut host_config = HostConfig::default();
        assert!(hooks.prepare(&config(&[]), &mut host_config).await?.is_none());
        assert!(host_config.security_opt.is_empty());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_credential_spec_sweep() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let hooks = CredentialSpecHooks::new(dir.path());

        let leftover = dir.path().join(format!("{}stale.json", CREDENTIAL_SPEC_FILE_PREFIX));
        let unrelated = dir.path().join("keep.json");
        tokio::fs::write(&leftover, b"{}").await?;
        tokio::fs::write(&unrelated, b"{}").await?;

        hooks.sweep().await?;
        assert!(!leftover.exists());
        assert!(unrelated.exists());

        CredentialSpecHooks::new(dir.path().join("missing")).sweep().await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_cleanup_table() {
        let table = ContainerCleanupTable::new();
        let info = CleanupInfo {
            files: vec![PathBuf::from("/tmp/a")],
        };

        table.insert("c1", info.clone()).await;
        assert_eq!(table.remove("c1").await, Some(info));
        assert!(table.remove("c1").await.is_none());
    }
}
