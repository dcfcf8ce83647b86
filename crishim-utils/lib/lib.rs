//! `crishim-utils` is a library containing general utilities for the crishim project.

#![warn(missing_docs)]

pub mod error;
pub mod fs;
pub mod path;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use error::*;
pub use fs::*;
pub use path::*;
