//! Translation of CRI security contexts and namespace modes into engine host configuration.
//!
//! Every function here is deterministic in its inputs. The only I/O is reading a node local
//! seccomp profile, which [`load_seccomp_security_opts`] does before handing the bytes to the
//! pure [`localhost_seccomp_opt`].

mod apparmor;
mod context;
mod namespace;
mod opts;
mod seccomp;
mod selinux;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use apparmor::*;
pub use context::*;
pub use namespace::*;
pub use opts::*;
pub use seccomp::*;
pub use selinux::*;
