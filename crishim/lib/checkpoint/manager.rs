use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::ShimResult;

use super::{FileStore, PodSandboxCheckpoint};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Creates, reads and removes sandbox checkpoints.
///
/// A single lock serializes every checkpoint operation.
#[derive(Debug)]
pub struct CheckpointManager {
    store: Mutex<FileStore>,
    dir: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CheckpointManager {
    /// Opens the checkpoints stored in `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> ShimResult<Self> {
        let store = FileStore::open(dir).await?;
        let dir = store.dir().to_path_buf();
        Ok(Self {
            store: Mutex::new(store),
            dir,
        })
    }

    /// Returns the checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists `checkpoint` under `key`, computing and embedding its checksum.
    pub async fn create_checkpoint(
        &self,
        key: &str,
        checkpoint: &PodSandboxCheckpoint,
    ) -> ShimResult<()> {
        let store = self.store.lock().await;
        let bytes = checkpoint.marshal()?;
        store.write(key, &bytes).await?;

        tracing::debug!("wrote checkpoint for sandbox {}", key);
        Ok(())
    }

    /// Reads and verifies the checkpoint under `key`.
    ///
    /// Fails with [`ShimError::CheckpointNotFound`](crate::ShimError::CheckpointNotFound) if it
    /// is absent and with [`ShimError::CorruptCheckpoint`](crate::ShimError::CorruptCheckpoint)
    /// if it does not verify. Corrupt checkpoints are left in place for the caller to remove.
    pub async fn get_checkpoint(&self, key: &str) -> ShimResult<PodSandboxCheckpoint> {
        let store = self.store.lock().await;
        let bytes = store.read(key).await?;
        PodSandboxCheckpoint::unmarshal(&bytes).inspect_err(|e| {
            tracing::warn!("checkpoint for sandbox {} is corrupted: {}", key, e);
        })
    }

    /// Removes the checkpoint under `key`. Removing an absent checkpoint succeeds.
    pub async fn remove_checkpoint(&self, key: &str) -> ShimResult<()> {
        let store = self.store.lock().await;
        store.delete(key).await?;

        tracing::debug!("removed checkpoint for sandbox {}", key);
        Ok(())
    }

    /// Lists the keys of every stored checkpoint.
    pub async fn list_checkpoints(&self) -> ShimResult<Vec<String>> {
        let store = self.store.lock().await;
        store.list().await
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
