use std::fmt;

use crate::{cri::PodSandboxState, engine::ContainerStateJson, ShimError, ShimResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The engine status of a container that was created but never started.
const ENGINE_STATUS_CREATED: &str = "created";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The readiness of a pod sandbox.
///
/// ```text
///   Absent --created--> Created --network_up--> Ready
///                          |                      |
///                          +---network_down---> NotReady
///
///   any --removed--> Removed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxState {
    /// Nothing is known about the sandbox.
    Absent,

    /// The sandbox container exists but its network is not set up yet.
    Created,

    /// The sandbox container runs and its network is set up.
    Ready,

    /// The sandbox is stopped, lost its container or had its network torn down.
    NotReady,

    /// The sandbox and its checkpoint were removed.
    Removed,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandboxState {
    /// Derives the state from what the engine, the network-ready map and the checkpoint store know.
    ///
    /// A running container counts as ready unless its network is recorded as not ready. A missing
    /// readiness entry means the shim restarted and keeps the sandbox ready.
    pub fn observe(
        container: Option<&ContainerStateJson>,
        network_ready: Option<bool>,
        has_checkpoint: bool,
    ) -> Self {
        match container {
            Some(state) if state.status == ENGINE_STATUS_CREATED => Self::Created,
            Some(state) if state.running && network_ready != Some(false) => Self::Ready,
            Some(_) => Self::NotReady,
            None if has_checkpoint => Self::NotReady,
            None => Self::Absent,
        }
    }

    /// The sandbox container was created.
    pub fn created(self) -> ShimResult<Self> {
        match self {
            Self::Absent => Ok(Self::Created),
            from => Err(from.invalid("created")),
        }
    }

    /// The sandbox network was set up.
    pub fn network_up(self) -> ShimResult<Self> {
        match self {
            Self::Created => Ok(Self::Ready),
            from => Err(from.invalid("network_up")),
        }
    }

    /// The sandbox network was torn down or failed to come up.
    pub fn network_down(self) -> ShimResult<Self> {
        match self {
            Self::Created | Self::Ready | Self::NotReady => Ok(Self::NotReady),
            from => Err(from.invalid("network_down")),
        }
    }

    /// The sandbox was removed. Removal converges from every state.
    pub fn removed(self) -> Self {
        Self::Removed
    }

    /// Returns true if the sandbox reports READY.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns the CRI state of the sandbox.
    pub fn to_cri(self) -> PodSandboxState {
        if self.is_ready() {
            PodSandboxState::SandboxReady
        } else {
            PodSandboxState::SandboxNotReady
        }
    }

    fn invalid(self, event: &'static str) -> ShimError {
        ShimError::InvalidSandboxTransition {
            from: self.to_string(),
            event,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Created => write!(f, "created"),
            Self::Ready => write!(f, "ready"),
            Self::NotReady => write!(f, "not-ready"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_state(status: &str, running: bool) -> ContainerStateJson {
        ContainerStateJson {
            status: status.to_string(),
            running,
            ..Default::default()
        }
    }

    #[test]
    fn test_sandbox_state_observe() {
        let running = engine_state("running", true);
        let exited = engine_state("exited", false);
        let created = engine_state("created", false);

        assert_eq!(SandboxState::observe(Some(&running), Some(true), true), SandboxState::Ready);
        assert_eq!(SandboxState::observe(Some(&running), None, true), SandboxState::Ready);
        assert_eq!(
            SandboxState::observe(Some(&running), Some(false), true),
            SandboxState::NotReady
        );
        assert_eq!(SandboxState::observe(Some(&exited), Some(true), true), SandboxState::NotReady);
        assert_eq!(SandboxState::observe(Some(&created), None, true), SandboxState::Created);
        assert_eq!(SandboxState::observe(None, None, true), SandboxState::NotReady);
        assert_eq!(SandboxState::observe(None, None, false), SandboxState::Absent);
    }

    #[test]
    fn test_sandbox_state_transitions() -> anyhow::Result<()> {
        let state = SandboxState::Absent.created()?;
        assert_eq!(state, SandboxState::Created);
        assert_eq!(state.to_cri(), PodSandboxState::SandboxNotReady);

        let state = state.network_up()?;
        assert!(state.is_ready());
        assert_eq!(state.to_cri(), PodSandboxState::SandboxReady);

        let state = state.network_down()?;
        assert_eq!(state, SandboxState::NotReady);
        assert_eq!(state.network_down()?, SandboxState::NotReady);
        assert_eq!(state.removed(), SandboxState::Removed);

        Ok(())
    }

    #[test]
    fn test_sandbox_state_rejects_invalid_transitions() {
        assert!(matches!(
            SandboxState::Ready.created(),
            Err(ShimError::InvalidSandboxTransition { event: "created", .. })
        ));
        assert!(SandboxState::NotReady.network_up().is_err());
        assert!(SandboxState::Removed.network_down().is_err());
        assert!(SandboxState::Absent.network_down().is_err());
    }
}
