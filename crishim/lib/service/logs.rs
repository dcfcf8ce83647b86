use std::path::Path;

use crishim_utils::remove_file_if_exists;

use crate::{ShimError, ShimResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Points the kubelet log path of a container at the log file the engine writes.
///
/// Containers without a kubelet log path or without an engine log file get no symlink. A stale
/// entry at `path` is replaced.
pub async fn create_log_symlink(path: &str, real_path: &str) -> ShimResult<()> {
    if path.is_empty() {
        tracing::trace!("container has no log path, not creating a log symlink");
        return Ok(());
    }
    if real_path.is_empty() {
        tracing::warn!("engine reported no log file for {}, not creating a log symlink", path);
        return Ok(());
    }

    remove_file_if_exists(path)
        .await
        .map_err(|e| ShimError::LogSymlink(format!("failed to replace {:?}: {}", path, e)))?;

    tokio::fs::symlink(real_path, path).await.map_err(|e| {
        ShimError::LogSymlink(format!(
            "failed to link {:?} to {:?}: {}",
            path, real_path, e
        ))
    })?;

    tracing::debug!("linked container log {} to {}", path, real_path);
    Ok(())
}

/// Removes the kubelet log symlink of a container. A missing symlink is not an error.
pub async fn remove_log_symlink(path: &str) -> ShimResult<()> {
    if path.is_empty() {
        return Ok(());
    }

    let removed = remove_file_if_exists(Path::new(path))
        .await
        .map_err(|e| ShimError::LogSymlink(format!("failed to remove {:?}: {}", path, e)))?;

    if removed {
        tracing::debug!("removed container log symlink {}", path);
    }
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
