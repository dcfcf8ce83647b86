use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    checkpoint::CheckpointManager,
    config::ShimConfig,
    engine::{EngineClient, EngineInfoCache, TimeoutEngine},
    network::{NetworkPlugin, NetworkReadyMap, NoopNetworkPlugin},
    ShimError, ShimResult,
};

use super::{
    ContainerCleanupTable, CredentialSpecHooks, MountRelabeler, PlatformHooks, StatsCollector,
    StreamingServer, XattrRelabeler,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The CRI runtime and image service.
///
/// It translates every CRI request into engine calls, drives the network plugin around the
/// sandbox lifecycle and keeps sandbox checkpoints so that sandboxes whose container vanished
/// can still be stopped, listed and removed.
///
/// The lifecycle operations live in their own modules:
/// - sandboxes: [`run_pod_sandbox`](Self::run_pod_sandbox) and friends
/// - containers: [`create_container`](Self::create_container) and friends
/// - runtime: [`version`](Self::version), [`status`](Self::status) and exec
/// - images: [`pull_image`](Self::pull_image) and friends
pub struct ShimService {
    pub(super) config: ShimConfig,
    pub(super) engine: Arc<dyn EngineClient>,
    pub(super) network: Arc<dyn NetworkPlugin>,
    pub(super) checkpoints: CheckpointManager,
    pub(super) network_ready: NetworkReadyMap,
    pub(super) cleanup: ContainerCleanupTable,
    pub(super) engine_info: Arc<EngineInfoCache>,
    pub(super) hooks: Arc<dyn PlatformHooks>,
    pub(super) relabeler: Arc<dyn MountRelabeler>,
    pub(super) streaming: Option<Arc<dyn StreamingServer>>,
    pub(super) stats: Arc<StatsCollector>,
}

/// Builds a [`ShimService`].
///
/// Only the engine is required. The network plugin defaults to [`NoopNetworkPlugin`], the
/// platform hooks to [`CredentialSpecHooks`] and the relabeler to [`XattrRelabeler`].
pub struct ShimServiceBuilder {
    config: ShimConfig,
    engine: Option<Arc<dyn EngineClient>>,
    network: Option<Arc<dyn NetworkPlugin>>,
    hooks: Option<Arc<dyn PlatformHooks>>,
    relabeler: Option<Arc<dyn MountRelabeler>>,
    streaming: Option<Arc<dyn StreamingServer>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShimService {
    /// Starts building a service with `config`.
    pub fn builder(config: ShimConfig) -> ShimServiceBuilder {
        ShimServiceBuilder {
            config,
            engine: None,
            network: None,
            hooks: None,
            relabeler: None,
            streaming: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    /// Returns the checkpoint manager.
    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// Returns the network readiness of every sandbox this instance set up.
    pub fn network_ready(&self) -> &NetworkReadyMap {
        &self.network_ready
    }

    /// Returns the cached engine version and info.
    pub fn engine_info(&self) -> &Arc<EngineInfoCache> {
        &self.engine_info
    }

    /// Returns the container stats collector.
    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    /// Spawns the engine info poller and the stats collector.
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        tracing::info!("starting background tasks");
        vec![
            self.engine_info
                .spawn_poller(self.config.engine_info_refresh()),
            self.stats.spawn(),
        ]
    }

    /// Stops every background task.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down background tasks");
        self.engine_info.shutdown();
        self.stats.shutdown().await;
    }
}

impl ShimServiceBuilder {
    /// Sets the container engine.
    pub fn engine(mut self, engine: Arc<dyn EngineClient>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sets the network plugin.
    pub fn network(mut self, network: Arc<dyn NetworkPlugin>) -> Self {
        self.network = Some(network);
        self
    }

    /// Sets the platform hooks run around container creation and removal.
    pub fn hooks(mut self, hooks: Arc<dyn PlatformHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Sets the SELinux mount relabeler.
    pub fn relabeler(mut self, relabeler: Arc<dyn MountRelabeler>) -> Self {
        self.relabeler = Some(relabeler);
        self
    }

    /// Sets the streaming server serving exec, attach and port forward.
    pub fn streaming(mut self, streaming: Arc<dyn StreamingServer>) -> Self {
        self.streaming = Some(streaming);
        self
    }

    /// Validates the configuration, opens the checkpoint store and builds the service.
    ///
    /// Leftover platform artifacts of an earlier run are swept. A failed sweep is logged.
    pub async fn build(self) -> ShimResult<ShimService> {
        self.config.validate()?;

        let engine = self
            .engine
            .ok_or_else(|| ShimError::InvalidConfig("no container engine configured".to_string()))?;
        let engine: Arc<dyn EngineClient> = Arc::new(TimeoutEngine::new(
            engine,
            self.config.runtime_request_timeout(),
        ));

        let network = self
            .network
            .unwrap_or_else(|| Arc::new(NoopNetworkPlugin));
        let hooks = self.hooks.unwrap_or_else(|| {
            Arc::new(CredentialSpecHooks::new(self.config.credential_spec_dir()))
        });
        let relabeler = self
            .relabeler
            .unwrap_or_else(|| Arc::new(XattrRelabeler::default()));

        if let Err(e) = hooks.sweep().await {
            tracing::warn!("failed to sweep leftover platform artifacts: {}", e);
        }

        let checkpoints = CheckpointManager::open(self.config.checkpoint_dir()).await?;
        let engine_info = Arc::new(EngineInfoCache::new(
            Arc::clone(&engine),
            self.config.engine_info_refresh(),
        ));
        let stats = Arc::new(StatsCollector::new(
            Arc::clone(&engine),
            self.config.stats_interval(),
        ));

        tracing::info!(
            "crishim service ready (network plugin: {}, checkpoints: {})",
            network.name(),
            checkpoints.dir().display()
        );

        Ok(ShimService {
            config: self.config,
            engine,
            network,
            checkpoints,
            network_ready: NetworkReadyMap::new(),
            cleanup: ContainerCleanupTable::new(),
            engine_info,
            hooks,
            relabeler,
            streaming: self.streaming,
            stats,
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;

    #[test_log::test(tokio::test)]
    async fn test_builder_requires_engine() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = ShimConfig::builder().root_dir(dir.path()).build();

        let result = ShimService::builder(config).build().await;
        assert!(matches!(result, Err(ShimError::InvalidConfig(_))));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_builder_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = ShimConfig::builder().root_dir(dir.path()).build();

        let service = ShimService::builder(config)
            .engine(Arc::new(MemoryEngine::new()))
            .build()
            .await?;

        assert_eq!(service.network.name(), "kubernetes.io/no-op");
        assert_eq!(service.checkpoints().dir(), dir.path().join("sandbox"));
        assert!(service.checkpoints().list_checkpoints().await?.is_empty());

        let handles = service.spawn_background_tasks();
        service.shutdown().await;
        for handle in handles {
            handle.await?;
        }

        Ok(())
    }
}
