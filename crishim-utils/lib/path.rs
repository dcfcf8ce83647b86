//! `crishim_utils::path` is a module containing path utilities for the crishim project.

use typed_path::{Utf8UnixComponent, Utf8UnixPathBuf};

use crate::{UtilsError, UtilsResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The type of a supported path.
pub enum SupportedPathType {
    /// Any path type.
    Any,

    /// An absolute path.
    Absolute,

    /// A relative path.
    Relative,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Normalizes a unix path string.
///
/// Rules:
/// - Resolves . and .. components where possible
/// - Prevents path traversal that would escape the root
/// - Removes redundant separators and trailing slashes
/// - Can enforce path type requirements (absolute, relative, or any)
///
/// # Arguments
/// * `path` - The path to normalize
/// * `path_type` - The required path type (absolute, relative, or any)
///
/// # Returns
/// An error if the path is invalid, would escape root, or doesn't meet path type requirement
pub fn normalize_path(path: &str, path_type: SupportedPathType) -> UtilsResult<String> {
    if path.is_empty() {
        return Err(UtilsError::PathValidation(
            "Path cannot be empty".to_string(),
        ));
    }

    let path = Utf8UnixPathBuf::from(path);
    let mut normalized: Vec<&str> = Vec::new();
    let mut is_absolute = false;

    for component in path.components() {
        match component {
            Utf8UnixComponent::RootDir => is_absolute = true,
            Utf8UnixComponent::ParentDir => {
                if normalized.pop().is_none() {
                    return Err(UtilsError::PathValidation(
                        "Invalid path: cannot traverse above root directory".to_string(),
                    ));
                }
            }
            Utf8UnixComponent::CurDir => continue,
            Utf8UnixComponent::Normal(c) => {
                if !c.is_empty() {
                    normalized.push(c);
                }
            }
        }
    }

    match path_type {
        SupportedPathType::Absolute if !is_absolute => {
            return Err(UtilsError::PathValidation(
                "Path must be absolute (start with '/')".to_string(),
            ));
        }
        SupportedPathType::Relative if is_absolute => {
            return Err(UtilsError::PathValidation(
                "Path must be relative (must not start with '/')".to_string(),
            ));
        }
        _ => {}
    }

    if is_absolute {
        Ok(format!("/{}", normalized.join("/")))
    } else {
        Ok(normalized.join("/"))
    }
}

/// Joins a per-container relative log path onto a sandbox log directory.
///
/// Returns an empty string when either side is empty, since a container without a log
/// directory or log path gets no log symlink. The relative part may not escape the
/// log directory.
pub fn join_log_path(log_directory: &str, relative: &str) -> UtilsResult<String> {
    if log_directory.is_empty() || relative.is_empty() {
        return Ok(String::new());
    }

    let relative = normalize_path(relative, SupportedPathType::Relative)?;
    let base = Utf8UnixPathBuf::from(log_directory);

    Ok(base.join(relative).to_string())
}

/// Returns the last element of a slash separated path.
///
/// Trailing slashes are removed first. An empty path yields an empty string and a path of
/// only slashes yields `/`.
pub fn base_name(path: &str) -> &str {
    if path.is_empty() {
        return "";
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }

    match trimmed.rsplit_once('/') {
        Some((_, last)) => last,
        None => trimmed,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
