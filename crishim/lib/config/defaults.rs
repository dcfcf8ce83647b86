use std::{path::PathBuf, sync::LazyLock, time::Duration};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The name this runtime reports through `Version`.
pub const RUNTIME_NAME: &str = "docker";

/// The CRI API version implemented by the shim.
pub const CRI_API_VERSION: &str = "v1";

/// The environment variable that overrides the shim root directory.
pub const ROOT_DIR_ENV_VAR: &str = "CRISHIM_ROOT_DIR";

/// The sub directory of the root directory holding sandbox checkpoints.
pub const CHECKPOINT_SUBDIR: &str = "sandbox";

/// The sub directory of the root directory holding credential spec files.
pub const CREDENTIAL_SPEC_SUBDIR: &str = "credentialspecs";

/// The default sandbox (pause) image.
pub const DEFAULT_POD_SANDBOX_IMAGE: &str = "registry.k8s.io/pause:3.9";

/// The default timeout applied to every short engine operation.
pub const DEFAULT_RUNTIME_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The grace period given to the sandbox container when it is stopped.
pub const DEFAULT_SANDBOX_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// The minimum time between two refreshes of cached engine version or info.
pub const DEFAULT_ENGINE_INFO_REFRESH: Duration = Duration::from_secs(60);

/// The interval between two resource usage samples of a running container.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

/// The OOM score adjustment of sandbox containers. Sandboxes are the last thing to be killed.
pub const DEFAULT_SANDBOX_OOM_SCORE_ADJ: i64 = -998;

/// The CPU shares given to sandbox containers.
pub const DEFAULT_SANDBOX_CPU_SHARES: i64 = 2;

/// The memory-swap value for sandboxes. Zero leaves the engine default in place.
pub const DEFAULT_MEMORY_SWAP: i64 = 0;

/// The engine API version from which the security option separator is `=`.
pub const SECURITY_OPT_SEPARATOR_CHANGE_VERSION: &str = "1.23.0";

/// The engine API version from which recursive read-only bind mounts are available.
pub const RECURSIVE_READ_ONLY_MIN_VERSION: &str = "1.44.0";

/// The path where crishim keeps its state when no root directory is configured.
pub static DEFAULT_ROOT_DIR: LazyLock<PathBuf> =
    LazyLock::new(|| PathBuf::from("/var/lib/crishim"));

/// The per-user fallback configuration file location.
pub static DEFAULT_CONFIG_PATH: LazyLock<Option<PathBuf>> =
    LazyLock::new(|| dirs::config_dir().map(|d| d.join("crishim").join("config.toml")));
