use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use crishim_utils::{atomic_write, ensure_dir, remove_file_if_exists};
use regex::Regex;
use tokio::fs;

use crate::{ShimError, ShimResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The characters a store key may consist of.
static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.\-_]+$").unwrap());

/// The prefix of temporary files written by an atomic write.
const TEMP_FILE_PREFIX: &str = ".tmp";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A flat directory of files, one per key.
///
/// Writes go through a temporary file and a rename so that readers never observe a torn
/// entry. The store does no locking of its own.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FileStore {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> ShimResult<Self> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    /// Returns the directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `data` under `key`, replacing any previous value.
    pub async fn write(&self, key: &str, data: &[u8]) -> ShimResult<()> {
        let path = self.path_for(key)?;
        atomic_write(&path, data.to_vec()).await?;
        Ok(())
    }

    /// Reads the value under `key`. An absent key yields [`ShimError::CheckpointNotFound`].
    pub async fn read(&self, key: &str) -> ShimResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ShimError::CheckpointNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the value under `key`. An absent key is not an error.
    pub async fn delete(&self, key: &str) -> ShimResult<()> {
        let path = self.path_for(key)?;
        if !remove_file_if_exists(&path).await? {
            tracing::trace!("store key {} was already absent", key);
        }
        Ok(())
    }

    /// Lists every key in the store, in no particular order.
    pub async fn list(&self) -> ShimResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            if name.starts_with(TEMP_FILE_PREFIX) || !KEY_PATTERN.is_match(name) {
                continue;
            }

            keys.push(name.to_string());
        }
        Ok(keys)
    }

    fn path_for(&self, key: &str) -> ShimResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Checks that `key` can be used as a store key.
pub fn validate_key(key: &str) -> ShimResult<()> {
    if key.starts_with(TEMP_FILE_PREFIX) || !KEY_PATTERN.is_match(key) {
        return Err(ShimError::InvalidArgument(format!(
            "checkpoint key {:?} must consist of alphanumerics, '.', '-' or '_'",
            key
        )));
    }
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_write_read_delete() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::open(dir.path().join("sandbox")).await?;

        store.write("abc123", b"one").await?;
        store.write("abc123", b"two").await?;
        assert_eq!(store.read("abc123").await?, b"two");

        store.delete("abc123").await?;
        store.delete("abc123").await?;
        assert!(matches!(
            store.read("abc123").await,
            Err(ShimError::CheckpointNotFound(k)) if k == "abc123"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_list() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::open(dir.path()).await?;

        store.write("a", b"1").await?;
        store.write("b.c_d-e", b"2").await?;
        fs::create_dir(dir.path().join("nested")).await?;
        fs::write(dir.path().join(".tmpXYZ"), b"partial").await?;

        let mut keys = store.list().await?;
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b.c_d-e".to_string()]);

        Ok(())
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("0123abcd").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key(".tmp123").is_err());
    }
}
