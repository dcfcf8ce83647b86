//! The shim configuration.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use getset::Getters;
use serde::{Deserialize, Serialize};
use tokio::fs;
use typed_builder::TypedBuilder;

use crate::{ShimError, ShimResult};

use super::{
    CgroupDriver, CHECKPOINT_SUBDIR, CREDENTIAL_SPEC_SUBDIR, DEFAULT_CONFIG_PATH,
    DEFAULT_ENGINE_INFO_REFRESH, DEFAULT_MEMORY_SWAP, DEFAULT_POD_SANDBOX_IMAGE,
    DEFAULT_ROOT_DIR, DEFAULT_RUNTIME_REQUEST_TIMEOUT, DEFAULT_SANDBOX_GRACE_PERIOD,
    DEFAULT_STATS_INTERVAL, ROOT_DIR_ENV_VAR,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The crishim configuration.
///
/// ## Example
///
/// ```
/// use crishim::config::{CgroupDriver, ShimConfig};
///
/// let config = ShimConfig::builder()
///     .root_dir("/tmp/crishim")
///     .cgroup_driver(CgroupDriver::Systemd)
///     .build();
///
/// assert_eq!(config.checkpoint_dir().to_str(), Some("/tmp/crishim/sandbox"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
#[serde(default)]
pub struct ShimConfig {
    /// The directory where the shim keeps its durable state.
    #[builder(default = DEFAULT_ROOT_DIR.clone(), setter(into))]
    root_dir: PathBuf,

    /// Overrides the checkpoint directory, which defaults to `<root_dir>/sandbox`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    checkpoint_dir: Option<PathBuf>,

    /// Overrides the credential spec directory, which defaults to `<root_dir>/credentialspecs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    credential_spec_dir: Option<PathBuf>,

    /// The cgroup driver the engine uses.
    #[builder(default)]
    cgroup_driver: CgroupDriver,

    /// The image used for sandbox containers.
    #[builder(default = DEFAULT_POD_SANDBOX_IMAGE.to_string(), setter(into))]
    pod_sandbox_image: String,

    /// Timeout in seconds for short engine operations.
    #[builder(default = DEFAULT_RUNTIME_REQUEST_TIMEOUT.as_secs())]
    runtime_request_timeout_secs: u64,

    /// Grace period in seconds given to sandbox containers on stop.
    #[builder(default = DEFAULT_SANDBOX_GRACE_PERIOD.as_secs())]
    sandbox_grace_period_secs: u64,

    /// Minimum interval in seconds between two engine version/info refreshes.
    #[builder(default = DEFAULT_ENGINE_INFO_REFRESH.as_secs())]
    engine_info_refresh_secs: u64,

    /// Interval in seconds between two resource usage samples of a running container.
    #[builder(default = DEFAULT_STATS_INTERVAL.as_secs())]
    stats_interval_secs: u64,

    /// The memory-swap value applied to sandbox containers.
    #[builder(default = DEFAULT_MEMORY_SWAP)]
    default_memory_swap: i64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShimConfig {
    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one the per-user default location is tried
    /// and the built-in defaults are used when nothing is found there. The root directory
    /// can be overridden through `CRISHIM_ROOT_DIR`.
    pub async fn load(path: Option<&Path>) -> ShimResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path).await?,
            None => match DEFAULT_CONFIG_PATH.as_ref() {
                Some(path) if fs::try_exists(path).await.unwrap_or(false) => {
                    Self::from_file(path).await?
                }
                _ => Self::default(),
            },
        };

        if let Ok(root_dir) = env::var(ROOT_DIR_ENV_VAR) {
            tracing::debug!("using root directory from {}: {}", ROOT_DIR_ENV_VAR, root_dir);
            config.root_dir = PathBuf::from(root_dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses the configuration from a TOML file.
    pub async fn from_file(path: impl AsRef<Path>) -> ShimResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).await.map_err(|e| {
            ShimError::InvalidConfig(format!(
                "failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&contents)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Checks the configuration for values the shim cannot run with.
    pub fn validate(&self) -> ShimResult<()> {
        if self.pod_sandbox_image.trim().is_empty() {
            return Err(ShimError::InvalidConfig(
                "pod sandbox image must not be empty".to_string(),
            ));
        }

        if self.runtime_request_timeout_secs == 0 {
            return Err(ShimError::InvalidConfig(
                "runtime request timeout must be greater than zero".to_string(),
            ));
        }

        if self.engine_info_refresh_secs == 0 {
            return Err(ShimError::InvalidConfig(
                "engine info refresh interval must be greater than zero".to_string(),
            ));
        }

        if self.stats_interval_secs == 0 {
            return Err(ShimError::InvalidConfig(
                "stats interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the directory holding sandbox checkpoints.
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.checkpoint_dir
            .clone()
            .unwrap_or_else(|| self.root_dir.join(CHECKPOINT_SUBDIR))
    }

    /// Returns the directory holding credential spec files.
    pub fn credential_spec_dir(&self) -> PathBuf {
        self.credential_spec_dir
            .clone()
            .unwrap_or_else(|| self.root_dir.join(CREDENTIAL_SPEC_SUBDIR))
    }

    /// Returns the timeout for short engine operations.
    pub fn runtime_request_timeout(&self) -> Duration {
        Duration::from_secs(self.runtime_request_timeout_secs)
    }

    /// Returns the grace period for stopping sandbox containers.
    pub fn sandbox_grace_period(&self) -> Duration {
        Duration::from_secs(self.sandbox_grace_period_secs)
    }

    /// Returns the minimum refresh interval of cached engine version/info.
    pub fn engine_info_refresh(&self) -> Duration {
        Duration::from_secs(self.engine_info_refresh_secs)
    }

    /// Returns the interval between two resource usage samples.
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// Replaces the root directory, keeping any explicit directory overrides.
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for ShimConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
