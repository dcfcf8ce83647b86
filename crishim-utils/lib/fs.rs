//! `crishim_utils::fs` contains file helpers shared by the crishim stores.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tokio::fs;

use crate::{UtilsError, UtilsResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Writes `contents` to `path` so that readers only ever observe the old or the new bytes.
///
/// The data goes to a temporary file in the destination directory, is flushed to disk and is
/// then renamed over the destination.
pub async fn atomic_write(path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> UtilsResult<()> {
    let path = path.as_ref().to_path_buf();
    let contents = contents.into();

    tokio::task::spawn_blocking(move || write_and_persist(&path, &contents))
        .await
        .map_err(UtilsError::custom)?
}

/// Creates `dir` and its parents if missing.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> UtilsResult<()> {
    fs::create_dir_all(dir.as_ref()).await?;
    Ok(())
}

/// Removes the file at `path`, treating a missing file as success.
///
/// Returns whether a file was actually removed.
pub async fn remove_file_if_exists(path: impl AsRef<Path>) -> UtilsResult<bool> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn write_and_persist(path: &PathBuf, contents: &[u8]) -> UtilsResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| UtilsError::Persist {
        path: path.clone(),
        source: e.error,
    })?;

    tracing::trace!("atomically wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
