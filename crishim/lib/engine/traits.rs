use std::time::Duration;

use super::{
    AttachOptions, ContainerCreateResponse, ContainerJson, ContainerStats, ContainerSummary,
    CreateContainerRequest, EngineResult, ExecConfig, ExecInspect, ExecOutput, ExecStartOptions,
    ImageDeleteResponse, ImageHistory, ImageInspect, ImageSummary, ListContainersOptions,
    ListImagesOptions, RegistryAuth, RemoveContainerOptions, RemoveImageOptions, SystemInfo,
    TerminalSize, UpdateConfig, VersionInfo,
};

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// The operations of a container engine the shim depends on.
///
/// Every operation returns an [`EngineError`](super::EngineError) that distinguishes "not found"
/// from other failures.
#[async_trait::async_trait]
pub trait EngineClient: Send + Sync {
    /// Lists containers.
    async fn list_containers(
        &self,
        options: &ListContainersOptions,
    ) -> EngineResult<Vec<ContainerSummary>>;

    /// Returns the full record of a container.
    async fn inspect_container(&self, id: &str) -> EngineResult<ContainerJson>;

    /// Creates a container.
    async fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> EngineResult<ContainerCreateResponse>;

    /// Starts a container.
    async fn start_container(&self, id: &str) -> EngineResult<()>;

    /// Stops a container, killing it after `timeout`.
    async fn stop_container(&self, id: &str, timeout: Duration) -> EngineResult<()>;

    /// Updates the resource limits of a container.
    async fn update_container(&self, id: &str, update: &UpdateConfig) -> EngineResult<()>;

    /// Removes a container.
    async fn remove_container(&self, id: &str, options: &RemoveContainerOptions)
        -> EngineResult<()>;

    /// Returns the record of an image by reference, tag or digest.
    async fn inspect_image_by_ref(&self, reference: &str) -> EngineResult<ImageInspect>;

    /// Returns the record of an image by id.
    async fn inspect_image_by_id(&self, id: &str) -> EngineResult<ImageInspect>;

    /// Lists images.
    async fn list_images(&self, options: &ListImagesOptions) -> EngineResult<Vec<ImageSummary>>;

    /// Pulls an image. This is a long running operation.
    async fn pull_image(&self, reference: &str, auth: Option<&RegistryAuth>) -> EngineResult<()>;

    /// Removes an image.
    async fn remove_image(
        &self,
        image: &str,
        options: &RemoveImageOptions,
    ) -> EngineResult<Vec<ImageDeleteResponse>>;

    /// Returns the layer history of an image.
    async fn image_history(&self, id: &str) -> EngineResult<Vec<ImageHistory>>;

    /// Creates an exec instance in a container and returns its id.
    async fn create_exec(&self, container_id: &str, config: &ExecConfig) -> EngineResult<String>;

    /// Starts an exec instance and waits for its output. This is a long running operation.
    async fn start_exec(&self, exec_id: &str, options: &ExecStartOptions)
        -> EngineResult<ExecOutput>;

    /// Returns the state of an exec instance.
    async fn inspect_exec(&self, exec_id: &str) -> EngineResult<ExecInspect>;

    /// Resizes the TTY of an exec instance.
    async fn resize_exec(&self, exec_id: &str, size: TerminalSize) -> EngineResult<()>;

    /// Attaches to a container and returns what it wrote. This is a long running operation.
    async fn attach_container(&self, id: &str, options: &AttachOptions)
        -> EngineResult<ExecOutput>;

    /// Returns a single raw resource usage sample of a container.
    async fn container_stats(&self, id: &str) -> EngineResult<ContainerStats>;

    /// Returns the engine version.
    async fn version(&self) -> EngineResult<VersionInfo>;

    /// Returns system wide engine information.
    async fn info(&self) -> EngineResult<SystemInfo>;
}
