use std::time::Duration;

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of an engine operation.
pub type EngineResult<T> = Result<T, EngineError>;

/// An error reported by the container engine.
#[derive(pretty_error_debug::Debug, Error, Clone)]
pub enum EngineError {
    /// The container does not exist.
    #[error("No such container: {0}")]
    ContainerNotFound(String),

    /// The image does not exist.
    #[error("No such image: {0}")]
    ImageNotFound(String),

    /// The exec instance does not exist.
    #[error("No such exec instance: {0}")]
    ExecNotFound(String),

    /// The request conflicts with existing engine state, for example a duplicate name.
    #[error("{0}")]
    Conflict(String),

    /// The container is not running.
    #[error("Container {0} is not running")]
    NotRunning(String),

    /// The request was rejected as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The operation did not complete within its timeout.
    #[error("operation {operation} timed out after {timeout:?}")]
    Timeout {
        /// The engine operation.
        operation: &'static str,

        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The engine could not be reached.
    #[error("cannot connect to the engine: {0}")]
    Connection(String),

    /// Any other error response of the engine API.
    #[error("engine api error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,

        /// The error message.
        message: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EngineError {
    /// Returns true if a container, image or exec instance was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ContainerNotFound(_) | Self::ImageNotFound(_) | Self::ExecNotFound(_)
        )
    }

    /// Returns true if a container was not found.
    pub fn is_container_not_found(&self) -> bool {
        matches!(self, Self::ContainerNotFound(_))
    }

    /// Returns true if an image was not found.
    pub fn is_image_not_found(&self) -> bool {
        matches!(self, Self::ImageNotFound(_))
    }

    /// Returns true if the operation timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the request conflicted with existing state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
