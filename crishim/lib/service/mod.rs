//! The CRI runtime and image service.
//!
//! [`ShimService`] owns every piece of state the shim keeps: the checkpoint store, the
//! network-ready map, the container cleanup table, the engine info cache and the stats
//! collector. Its methods are spread over the modules of this directory by concern.

mod cleanup;
mod conflict;
mod container;
mod image;
mod labels;
mod logs;
mod mounts;
mod naming;
mod runtime;
mod sandbox;
mod shim;
mod state;
mod stats;
mod streaming;
mod time;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use cleanup::*;
pub use conflict::*;
pub use container::*;
pub use labels::*;
pub use logs::*;
pub use mounts::*;
pub use naming::*;
pub use sandbox::*;
pub use shim::*;
pub use state::*;
pub use stats::*;
pub use streaming::*;
pub use time::*;
