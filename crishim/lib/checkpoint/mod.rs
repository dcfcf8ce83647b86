//! Checksummed sandbox checkpoints and the store that keeps them.
//!
//! A checkpoint records the pod identity and port mappings of a sandbox independently of the
//! engine's record of the sandbox container, so that the shim can still tear down networking
//! and report the pod after the container vanished.

mod checksum;
mod codec;
mod manager;
mod store;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use checksum::*;
pub use codec::*;
pub use manager::*;
pub use store::*;
