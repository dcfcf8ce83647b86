//! The network plugin capability and network readiness tracking.

mod noop;
mod plugin;
mod ready;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use noop::*;
pub use plugin::*;
pub use ready::*;
