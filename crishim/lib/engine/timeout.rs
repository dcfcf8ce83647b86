use std::{future::Future, sync::Arc, time::Duration};

use super::{
    AttachOptions, ContainerCreateResponse, ContainerJson, ContainerStats, ContainerSummary,
    CreateContainerRequest, EngineClient, EngineError, EngineResult, ExecConfig, ExecInspect,
    ExecOutput, ExecStartOptions, ImageDeleteResponse, ImageHistory, ImageInspect, ImageSummary,
    ListContainersOptions, ListImagesOptions, RegistryAuth, RemoveContainerOptions,
    RemoveImageOptions, SystemInfo, TerminalSize, UpdateConfig, VersionInfo,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An engine wrapper that bounds every short operation with a timeout.
///
/// Image pulls, exec starts and attaches run for as long as they need. Every other call that
/// outlives the timeout fails with [`EngineError::Timeout`].
#[derive(Clone)]
pub struct TimeoutEngine {
    inner: Arc<dyn EngineClient>,
    timeout: Duration,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TimeoutEngine {
    /// Wraps `inner`, bounding its short operations by `timeout`.
    pub fn new(inner: Arc<dyn EngineClient>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Returns the timeout of short operations.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = EngineResult<T>> + Send,
    ) -> EngineResult<T> {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "engine operation {} timed out after {:?}",
                    operation,
                    self.timeout
                );
                Err(EngineError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait::async_trait]
impl EngineClient for TimeoutEngine {
    async fn list_containers(
        &self,
        options: &ListContainersOptions,
    ) -> EngineResult<Vec<ContainerSummary>> {
        self.bounded("list_containers", self.inner.list_containers(options))
            .await
    }

    async fn inspect_container(&self, id: &str) -> EngineResult<ContainerJson> {
        self.bounded("inspect_container", self.inner.inspect_container(id))
            .await
    }

    async fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> EngineResult<ContainerCreateResponse> {
        self.bounded("create_container", self.inner.create_container(request))
            .await
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        self.bounded("start_container", self.inner.start_container(id))
            .await
    }

    async fn stop_container(&self, id: &str, timeout: Duration) -> EngineResult<()> {
        // The stop itself may legitimately take the whole grace period.
        let bound = self.timeout + timeout;
        match tokio::time::timeout(bound, self.inner.stop_container(id, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                operation: "stop_container",
                timeout: bound,
            }),
        }
    }

    async fn update_container(&self, id: &str, update: &UpdateConfig) -> EngineResult<()> {
        self.bounded("update_container", self.inner.update_container(id, update))
            .await
    }

    async fn remove_container(
        &self,
        id: &str,
        options: &RemoveContainerOptions,
    ) -> EngineResult<()> {
        self.bounded("remove_container", self.inner.remove_container(id, options))
            .await
    }

    async fn inspect_image_by_ref(&self, reference: &str) -> EngineResult<ImageInspect> {
        self.bounded(
            "inspect_image_by_ref",
            self.inner.inspect_image_by_ref(reference),
        )
        .await
    }

    async fn inspect_image_by_id(&self, id: &str) -> EngineResult<ImageInspect> {
        self.bounded("inspect_image_by_id", self.inner.inspect_image_by_id(id))
            .await
    }

    async fn list_images(&self, options: &ListImagesOptions) -> EngineResult<Vec<ImageSummary>> {
        self.bounded("list_images", self.inner.list_images(options))
            .await
    }

    async fn pull_image(&self, reference: &str, auth: Option<&RegistryAuth>) -> EngineResult<()> {
        self.inner.pull_image(reference, auth).await
    }

    async fn remove_image(
        &self,
        image: &str,
        options: &RemoveImageOptions,
    ) -> EngineResult<Vec<ImageDeleteResponse>> {
        self.bounded("remove_image", self.inner.remove_image(image, options))
            .await
    }

    async fn image_history(&self, id: &str) -> EngineResult<Vec<ImageHistory>> {
        self.bounded("image_history", self.inner.image_history(id))
            .await
    }

    async fn create_exec(&self, container_id: &str, config: &ExecConfig) -> EngineResult<String> {
        self.bounded("create_exec", self.inner.create_exec(container_id, config))
            .await
    }

    async fn start_exec(
        &self,
        exec_id: &str,
        options: &ExecStartOptions,
    ) -> EngineResult<ExecOutput> {
        self.inner.start_exec(exec_id, options).await
    }

    async fn inspect_exec(&self, exec_id: &str) -> EngineResult<ExecInspect> {
        self.bounded("inspect_exec", self.inner.inspect_exec(exec_id))
            .await
    }

    async fn resize_exec(&self, exec_id: &str, size: TerminalSize) -> EngineResult<()> {
        self.bounded("resize_exec", self.inner.resize_exec(exec_id, size))
            .await
    }

    async fn attach_container(
        &self,
        id: &str,
        options: &AttachOptions,
    ) -> EngineResult<ExecOutput> {
        self.inner.attach_container(id, options).await
    }

    async fn container_stats(&self, id: &str) -> EngineResult<ContainerStats> {
        self.bounded("container_stats", self.inner.container_stats(id))
            .await
    }

    async fn version(&self) -> EngineResult<VersionInfo> {
        self.bounded("version", self.inner.version()).await
    }

    async fn info(&self) -> EngineResult<SystemInfo> {
        self.bounded("info", self.inner.info()).await
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MemoryEngine, Operation};

    #[tokio::test]
    async fn test_timeout_engine_bounds_short_operations() {
        let memory = Arc::new(MemoryEngine::new());
        memory
            .delay(Operation::InspectContainer, Duration::from_millis(200))
            .await;

        let engine = TimeoutEngine::new(memory, Duration::from_millis(20));
        let err = engine.inspect_container("missing").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Timeout {
                operation: "inspect_container",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_timeout_engine_exempts_pull() -> anyhow::Result<()> {
        let memory = Arc::new(MemoryEngine::new());
        memory
            .delay(Operation::PullImage, Duration::from_millis(60))
            .await;

        let engine = TimeoutEngine::new(memory.clone(), Duration::from_millis(10));
        engine.pull_image("busybox:latest", None).await?;
        assert!(engine.inspect_image_by_ref("busybox:latest").await.is_ok());

        Ok(())
    }
}
