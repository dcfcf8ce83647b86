use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ShimError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The cgroup driver the engine was configured with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CgroupDriver {
    /// Plain cgroupfs hierarchy paths.
    #[default]
    Cgroupfs,

    /// systemd slices.
    Systemd,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CgroupDriver {
    /// Converts a CRI cgroup parent into the form the engine expects.
    ///
    /// With the systemd driver the engine only accepts a slice name, so a path-like parent
    /// is reduced to its last component. Anything else passes through unchanged.
    pub fn expected_cgroup_parent(&self, cgroup_parent: &str) -> String {
        if cgroup_parent.is_empty() {
            return String::new();
        }

        let parent = match self {
            CgroupDriver::Systemd => crishim_utils::base_name(cgroup_parent),
            CgroupDriver::Cgroupfs => cgroup_parent,
        };

        tracing::trace!(cgroup_parent = parent, "setting cgroup parent");
        parent.to_string()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for CgroupDriver {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cgroupfs" => Ok(Self::Cgroupfs),
            "systemd" => Ok(Self::Systemd),
            other => Err(ShimError::InvalidConfig(format!(
                "unknown cgroup driver: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for CgroupDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cgroupfs => write!(f, "cgroupfs"),
            Self::Systemd => write!(f, "systemd"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
