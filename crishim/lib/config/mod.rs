//! Configuration types and helpers.

mod cgroup;
mod defaults;
mod shim;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use cgroup::*;
pub use defaults::*;
pub use shim::*;
