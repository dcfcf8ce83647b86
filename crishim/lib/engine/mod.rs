//! The container engine capability consumed by the shim.
//!
//! [`EngineClient`] exposes the container, image, exec and system operations of the engine API.
//! [`TimeoutEngine`] bounds every short operation and [`MemoryEngine`] is a deterministic
//! in-memory engine.

mod errors;
mod implementations;
mod info;
mod timeout;
mod traits;
mod types;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use errors::*;
pub use implementations::*;
pub use info::*;
pub use timeout::*;
pub use traits::*;
pub use types::*;
