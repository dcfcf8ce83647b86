use std::{
    error::Error,
    fmt::{self, Display},
};

use crishim_utils::UtilsError;
use thiserror::Error;

use crate::engine::EngineError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a crishim-related operation.
pub type ShimResult<T> = Result<T, ShimError>;

/// An error that occurred while serving a runtime or image request.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ShimError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML configuration parse error.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// An error from the utilities crate.
    #[error(transparent)]
    Utils(#[from] UtilsError),

    /// An error reported by the container engine.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// No checkpoint is stored under the key.
    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    /// The stored checkpoint failed checksum verification or could not be decoded.
    #[error("checkpoint is corrupted: {0}")]
    CorruptCheckpoint(String),

    /// The sandbox could not be resolved.
    #[error("pod sandbox not found: {0}")]
    SandboxNotFound(String),

    /// A required configuration value is missing or invalid.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A request argument is missing or invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A port mapping protocol that the engine cannot express.
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// A seccomp or apparmor profile reference that cannot be honoured.
    #[error("invalid security profile: {0}")]
    InvalidSecurityProfile(String),

    /// A recursive read-only mount was requested but the runtime handler cannot provide one.
    #[error("recursive read-only mounts are not supported by runtime handler {0:?}")]
    RecursiveReadOnlyUnsupported(String),

    /// A recursive read-only mount was requested without its preconditions.
    #[error("invalid recursive read-only mount: {0}")]
    InvalidRecursiveReadOnly(String),

    /// The network plugin failed.
    #[error("network plugin {plugin} failed to {operation}: {message}")]
    NetworkPlugin {
        /// The plugin name.
        plugin: String,

        /// The plugin operation.
        operation: &'static str,

        /// The failure message.
        message: String,
    },

    /// The container must be running for the requested operation.
    #[error("container {0} is not running")]
    ContainerNotRunning(String),

    /// The container failed to start.
    #[error("failed to start container {id:?}: {message}")]
    ContainerStart {
        /// The container id.
        id: String,

        /// The rewritten start failure.
        message: String,
    },

    /// The container log symlink could not be created or removed.
    #[error("container log symlink error: {0}")]
    LogSymlink(String),

    /// An external deadline elapsed before the operation completed.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// A sandbox readiness transition that the lifecycle does not allow.
    #[error("invalid sandbox transition from {from} on {event}")]
    InvalidSandboxTransition {
        /// The state the sandbox was in.
        from: String,

        /// The event that was applied.
        event: &'static str,
    },

    /// No streaming server is configured for exec, attach or port forward.
    #[error("streaming server is not configured")]
    StreamingUnavailable,

    /// Several independent sub-operations failed.
    #[error(transparent)]
    Aggregate(AggregateError),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),
}

/// A collection of errors from independent sub-operations.
///
/// Each error is kept so the caller can report and retry all of them.
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<ShimError>,
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShimError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> ShimError {
        ShimError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Returns true if the error reports an absent container, image, sandbox or checkpoint.
    pub fn is_not_found(&self) -> bool {
        match self {
            ShimError::Engine(e) => e.is_not_found(),
            ShimError::CheckpointNotFound(_) | ShimError::SandboxNotFound(_) => true,
            _ => false,
        }
    }

    /// Returns true if the error reports an absent container.
    pub fn is_container_not_found(&self) -> bool {
        matches!(self, ShimError::Engine(e) if e.is_container_not_found())
    }

    /// Returns true if the error reports an elapsed timeout or deadline.
    pub fn is_timeout(&self) -> bool {
        match self {
            ShimError::Engine(e) => e.is_timeout(),
            ShimError::DeadlineExceeded(_) => true,
            _ => false,
        }
    }

    /// Returns true if the error reports a corrupted checkpoint.
    pub fn is_corrupt_checkpoint(&self) -> bool {
        matches!(self, ShimError::CorruptCheckpoint(_))
    }
}

impl AggregateError {
    /// Creates an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error.
    pub fn push(&mut self, error: impl Into<ShimError>) {
        self.errors.push(error.into());
    }

    /// Returns true if no error was recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the recorded errors.
    pub fn errors(&self) -> &[ShimError] {
        &self.errors
    }

    /// Converts the aggregate into a result.
    ///
    /// No errors yields `Ok(())` and a single error is returned as is, so that
    /// classification helpers like [`ShimError::is_not_found`] keep working.
    pub fn into_result(mut self) -> ShimResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ShimError::Aggregate(self)),
        }
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `ShimResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> ShimResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", error)?;
        }
        write!(f, "]")
    }
}

impl Error for AggregateError {}

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_error_into_result() {
        assert!(AggregateError::new().into_result().is_ok());

        let mut single = AggregateError::new();
        single.push(ShimError::CheckpointNotFound("abc".into()));
        let err = single.into_result().unwrap_err();
        assert!(err.is_not_found());

        let mut many = AggregateError::new();
        many.push(ShimError::InvalidArgument("one".into()));
        many.push(ShimError::InvalidArgument("two".into()));
        let err = many.into_result().unwrap_err();
        assert!(matches!(&err, ShimError::Aggregate(a) if a.errors().len() == 2));
        assert_eq!(
            err.to_string(),
            "[invalid argument: one, invalid argument: two]"
        );
    }

    #[test]
    fn test_error_classification() {
        let timeout = ShimError::Engine(EngineError::Timeout {
            operation: "inspect_container",
            timeout: std::time::Duration::from_secs(2),
        });
        assert!(timeout.is_timeout());
        assert!(!timeout.is_not_found());

        let missing = ShimError::Engine(EngineError::ContainerNotFound("c1".into()));
        assert!(missing.is_not_found());
        assert!(missing.is_container_not_found());

        assert!(ShimError::DeadlineExceeded("exec".into()).is_timeout());
        assert!(ShimError::CorruptCheckpoint("x".into()).is_corrupt_checkpoint());
    }
}
