//! `crishim` translates the Kubernetes Container Runtime Interface (CRI) onto a container engine API.
//!
//! # Overview
//!
//! crishim lets a kubelet manage pod sandboxes and containers on an engine that does not speak CRI
//! natively. It handles:
//! - Sandbox lifecycle (run, stop, remove, list, status)
//! - Container lifecycle (create, start, stop, remove, list, status, resource updates)
//! - Translation of CRI security contexts and namespace modes into engine host configuration
//! - Checksummed on-disk checkpoints of sandbox identity and port mappings
//! - Network readiness tracking around a pluggable network backend
//!
//! # Architecture
//!
//! - **Engine**: the [`engine::EngineClient`] capability with a timeout wrapper and an in-memory engine
//! - **Checkpoint**: the checksummed sandbox checkpoint codec and its file-backed store
//! - **Network**: the [`network::NetworkPlugin`] capability and the network-ready map
//! - **Security**: pure translators for seccomp, AppArmor, SELinux and namespace modes
//! - **Service**: the [`service::ShimService`] orchestrating every CRI request
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use crishim::{
//!     config::ShimConfig,
//!     cri::{PodSandboxConfig, PodSandboxMetadata},
//!     engine::MemoryEngine,
//!     network::NoopNetworkPlugin,
//!     service::ShimService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ShimConfig::builder().root_dir("/tmp/crishim").build();
//!     let service = ShimService::builder(config)
//!         .engine(Arc::new(MemoryEngine::new()))
//!         .network(Arc::new(NoopNetworkPlugin::default()))
//!         .build()
//!         .await?;
//!
//!     let sandbox = PodSandboxConfig::builder()
//!         .metadata(PodSandboxMetadata::new("nginx", "default", "uid-1", 0))
//!         .build();
//!
//!     let id = service.run_pod_sandbox(&sandbox, "").await?;
//!     service.stop_pod_sandbox(&id).await?;
//!     service.remove_pod_sandbox(&id).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`checkpoint`] - Sandbox checkpoints and their store
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration types and defaults
//! - [`cri`] - CRI request and response types
//! - [`engine`] - Container engine capability
//! - [`network`] - Network plugin capability and readiness tracking
//! - [`security`] - Security and namespace translation
//! - [`service`] - The CRI runtime and image service

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod cri;
pub mod engine;
pub mod network;
pub mod security;
pub mod service;

pub use error::*;
