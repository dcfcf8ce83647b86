use std::{sync::Arc, time::Duration};

use semver::Version;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    config::{RECURSIVE_READ_ONLY_MIN_VERSION, SECURITY_OPT_SEPARATOR_CHANGE_VERSION},
    ShimError, ShimResult,
};

use super::{EngineClient, EngineResult, SystemInfo, VersionInfo};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Caches the engine version and system info.
///
/// Each value is refreshed independently and at most once per minimum refresh interval.
/// A background poller can keep both warm.
pub struct EngineInfoCache {
    engine: Arc<dyn EngineClient>,
    min_refresh: Duration,
    version: Mutex<Option<Cached<VersionInfo>>>,
    info: Mutex<Option<Cached<SystemInfo>>>,
    shutdown_tx: broadcast::Sender<()>,
}

struct Cached<T> {
    value: T,
    fetched_at: Instant,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EngineInfoCache {
    /// Creates an empty cache over `engine`.
    pub fn new(engine: Arc<dyn EngineClient>, min_refresh: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            engine,
            min_refresh,
            version: Mutex::new(None),
            info: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Returns the engine version, fetching it if the cached value is missing or stale.
    pub async fn version(&self) -> EngineResult<VersionInfo> {
        let mut cached = self.version.lock().await;
        if let Some(c) = cached.as_ref().filter(|c| c.fetched_at.elapsed() < self.min_refresh) {
            return Ok(c.value.clone());
        }

        let value = self.engine.version().await?;
        *cached = Some(Cached {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    /// Returns the engine system info, fetching it if the cached value is missing or stale.
    pub async fn info(&self) -> EngineResult<SystemInfo> {
        let mut cached = self.info.lock().await;
        if let Some(c) = cached.as_ref().filter(|c| c.fetched_at.elapsed() < self.min_refresh) {
            return Ok(c.value.clone());
        }

        let value = self.engine.info().await?;
        *cached = Some(Cached {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    /// Returns the engine API version.
    pub async fn api_version(&self) -> ShimResult<Version> {
        parse_api_version(&self.version().await?.api_version)
    }

    /// Returns the separator between a security option key and its value.
    ///
    /// Engines before API 1.23 expect `:`, later ones `=`.
    pub async fn security_opt_separator(&self) -> ShimResult<char> {
        let api_version = self.api_version().await?;
        Ok(separator_for(&api_version))
    }

    /// Returns true if the engine can create recursive read only bind mounts.
    pub async fn supports_recursive_read_only(&self) -> ShimResult<bool> {
        let api_version = self.api_version().await?;
        Ok(api_version >= min_version(RECURSIVE_READ_ONLY_MIN_VERSION)?)
    }

    /// Spawns a task refreshing both values every `interval` until [`shutdown`](Self::shutdown).
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("engine info poller shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = cache.version().await {
                            tracing::warn!("failed to refresh engine version: {}", e);
                        }
                        if let Err(e) = cache.info().await {
                            tracing::warn!("failed to refresh engine info: {}", e);
                        }
                    }
                }
            }
        })
    }

    /// Stops every running poller.
    pub fn shutdown(&self) {
        if self.shutdown_tx.send(()).is_err() {
            tracing::trace!("no engine info poller to stop");
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Parses an engine API version such as `1.43` into a semantic version.
pub fn parse_api_version(api_version: &str) -> ShimResult<Version> {
    let padded = match api_version.matches('.').count() {
        0 => format!("{}.0.0", api_version),
        1 => format!("{}.0", api_version),
        _ => api_version.to_string(),
    };

    Version::parse(&padded).map_err(|e| {
        ShimError::InvalidArgument(format!("invalid engine api version {:?}: {}", api_version, e))
    })
}

/// Returns the security option separator for an engine API version.
pub fn separator_for(api_version: &Version) -> char {
    match min_version(SECURITY_OPT_SEPARATOR_CHANGE_VERSION) {
        Ok(change) if *api_version < change => ':',
        _ => '=',
    }
}

fn min_version(version: &str) -> ShimResult<Version> {
    Version::parse(version).map_err(ShimError::custom)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
