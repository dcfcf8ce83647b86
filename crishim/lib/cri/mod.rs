//! Request and response types of the Container Runtime Interface.
//!
//! These mirror the CRI v1 messages the shim serves. Field names follow the protocol so that a
//! transport layer can map them one to one.

mod container;
mod image;
mod runtime;
mod sandbox;
mod security;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use container::*;
pub use image::*;
pub use runtime::*;
pub use sandbox::*;
pub use security::*;
