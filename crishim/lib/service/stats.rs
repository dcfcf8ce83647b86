use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
};

use crate::{
    engine::{ContainerStats, EngineClient, ListContainersOptions, ListFilters},
    ShimResult,
};

use super::{CONTAINER_TYPE_LABEL_CONTAINER, CONTAINER_TYPE_LABEL_KEY};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Keeps the latest resource usage sample of every running container.
///
/// Each [`sync`](Self::sync) lists the running containers, starts one poller per new container
/// and retires the pollers of containers that went away.
pub struct StatsCollector {
    engine: Arc<dyn EngineClient>,
    interval: Duration,
    samples: Arc<RwLock<HashMap<String, ContainerStats>>>,
    pollers: Mutex<HashMap<String, JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl StatsCollector {
    /// Creates a collector sampling every `interval`.
    pub fn new(engine: Arc<dyn EngineClient>, interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            engine,
            interval,
            samples: Arc::new(RwLock::new(HashMap::new())),
            pollers: Mutex::new(HashMap::new()),
            shutdown_tx,
        }
    }

    /// Reconciles the pollers with the running containers.
    pub async fn sync(&self) -> ShimResult<()> {
        let mut filters = ListFilters::new();
        filters.add_label(CONTAINER_TYPE_LABEL_KEY, CONTAINER_TYPE_LABEL_CONTAINER);
        let running = self
            .engine
            .list_containers(&ListContainersOptions {
                all: false,
                filters,
            })
            .await?;

        let mut pollers = self.pollers.lock().await;
        pollers.retain(|id, handle| {
            let keep = !handle.is_finished() && running.iter().any(|c| c.id == *id);
            if !keep {
                tracing::debug!("retiring stats poller of container {}", id);
                handle.abort();
            }
            keep
        });

        {
            let mut samples = self.samples.write().await;
            samples.retain(|id, _| pollers.contains_key(id) || running.iter().any(|c| c.id == *id));
        }

        for container in running {
            if pollers.contains_key(&container.id) {
                continue;
            }

            tracing::debug!("starting stats poller of container {}", container.id);
            let handle = self.spawn_poller(container.id.clone());
            pollers.insert(container.id, handle);
        }

        Ok(())
    }

    /// Spawns a task that calls [`sync`](Self::sync) every interval until
    /// [`shutdown`](Self::shutdown).
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(collector.interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("stats collector shutting down");
                        collector.abort_pollers().await;
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = collector.sync().await {
                            tracing::warn!("failed to sync stats pollers: {}", e);
                        }
                    }
                }
            }
        })
    }

    /// Returns the latest sample of a container.
    pub async fn sample(&self, container_id: &str) -> Option<ContainerStats> {
        self.samples.read().await.get(container_id).cloned()
    }

    /// Returns the ids of the containers being polled.
    pub async fn tracked(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pollers.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops the sync task and every poller.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).is_err() {
            tracing::trace!("no stats collector task to stop");
        }
        self.abort_pollers().await;
    }

    async fn abort_pollers(&self) {
        for (_, handle) in self.pollers.lock().await.drain() {
            handle.abort();
        }
    }

    fn spawn_poller(&self, container_id: String) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let samples = Arc::clone(&self.samples);
        let interval = self.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match engine.container_stats(&container_id).await {
                    Ok(stats) => {
                        samples.write().await.insert(container_id.clone(), stats);
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::debug!("container {} is gone, stopping its stats poller", container_id);
                        samples.write().await.remove(&container_id);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("failed to sample stats of container {}: {}", container_id, e);
                    }
                }
            }
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        ContainerCreateConfig, CreateContainerRequest, MemoryEngine, RemoveContainerOptions,
    };

    async fn running_container(engine: &MemoryEngine, name: &str) -> anyhow::Result<String> {
        engine.add_image("busybox").await;
        let mut config = ContainerCreateConfig {
            image: "busybox".to_string(),
            ..Default::default()
        };
        config.labels.insert(
            CONTAINER_TYPE_LABEL_KEY.to_string(),
            CONTAINER_TYPE_LABEL_CONTAINER.to_string(),
        );

        let response = engine
            .create_container(&CreateContainerRequest::builder().name(name).config(config).build())
            .await?;
        engine.start_container(&response.id).await?;
        Ok(response.id)
    }

    #[test_log::test(tokio::test)]
    async fn test_stats_collector_tracks_running_containers() -> anyhow::Result<()> {
        let engine = MemoryEngine::new();
        let first = running_container(&engine, "first").await?;
        let second = running_container(&engine, "second").await?;

        let collector = StatsCollector::new(Arc::new(engine.clone()), Duration::from_millis(10));
        collector.sync().await?;

        let mut expected = vec![first.clone(), second.clone()];
        expected.sort();
        assert_eq!(collector.tracked().await, expected);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(collector.sample(&first).await.is_some());

        engine.stop_container(&second, Duration::ZERO).await?;
        engine
            .remove_container(&second, &RemoveContainerOptions::default())
            .await?;
        collector.sync().await?;

        assert_eq!(collector.tracked().await, vec![first.clone()]);
        assert!(collector.sample(&second).await.is_none());

        collector.shutdown().await;
        assert!(collector.tracked().await.is_empty());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_stats_collector_ignores_sandboxes() -> anyhow::Result<()> {
        let engine = MemoryEngine::new();
        engine.add_image("pause").await;
        let sandbox = engine
            .create_container(
                &CreateContainerRequest::builder()
                    .name("sandbox")
                    .config(ContainerCreateConfig {
                        image: "pause".to_string(),
                        ..Default::default()
                    })
                    .build(),
            )
            .await?;
        engine.start_container(&sandbox.id).await?;

        let collector = StatsCollector::new(Arc::new(engine), Duration::from_secs(1));
        collector.sync().await?;
        assert!(collector.tracked().await.is_empty());

        Ok(())
    }
}
