use std::{
    collections::{HashMap, VecDeque},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::engine::{
    AttachOptions, ContainerCreateResponse, ContainerJson, ContainerStateJson, ContainerStats,
    ContainerSummary, CreateContainerRequest, EngineClient, EngineError, EngineResult, ExecConfig,
    ExecInspect, ExecOutput, ExecStartOptions, ImageDeleteResponse, ImageHistory, ImageInspect,
    ImageSummary, ListContainersOptions, ListImagesOptions, MountPoint, RegistryAuth,
    RemoveContainerOptions, RemoveImageOptions, SystemInfo, TerminalSize, UpdateConfig,
    VersionInfo,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The directory under which the in-memory engine pretends to write container logs.
const DEFAULT_LOG_ROOT: &str = "/var/lib/docker/containers";

/// The API version the in-memory engine reports by default.
const DEFAULT_API_VERSION: &str = "1.43";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An engine operation, used to inject failures and delays into a [`MemoryEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list_containers`.
    ListContainers,

    /// `inspect_container`.
    InspectContainer,

    /// `create_container`.
    CreateContainer,

    /// `start_container`.
    StartContainer,

    /// `stop_container`.
    StopContainer,

    /// `update_container`.
    UpdateContainer,

    /// `remove_container`.
    RemoveContainer,

    /// `inspect_image_by_ref` and `inspect_image_by_id`.
    InspectImage,

    /// `list_images`.
    ListImages,

    /// `pull_image`.
    PullImage,

    /// `remove_image`.
    RemoveImage,

    /// `image_history`.
    ImageHistory,

    /// `create_exec`.
    CreateExec,

    /// `start_exec`.
    StartExec,

    /// `inspect_exec`.
    InspectExec,

    /// `resize_exec`.
    ResizeExec,

    /// `attach_container`.
    Attach,

    /// `container_stats`.
    Stats,

    /// `version`.
    Version,

    /// `info`.
    Info,
}

/// The scripted behaviour of an exec command in a [`MemoryEngine`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecScript {
    /// Written to stdout.
    pub stdout: Vec<u8>,

    /// Written to stderr.
    pub stderr: Vec<u8>,

    /// The exit code.
    pub exit_code: i32,

    /// How long the command runs.
    pub duration: Duration,
}

/// A deterministic in-memory container engine.
///
/// It keeps containers, images and exec instances in memory and follows the engine's
/// semantics for names, states and errors closely enough to drive the shim in tests.
/// Failures and delays can be injected per [`Operation`].
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug)]
struct MemoryState {
    /// Containers in creation order.
    containers: Vec<ContainerJson>,
    images: Vec<ImageInspect>,
    execs: HashMap<String, ExecRecord>,
    exec_scripts: HashMap<String, ExecScript>,
    failures: HashMap<Operation, VecDeque<EngineError>>,
    delays: HashMap<Operation, Duration>,
    calls: Vec<(Operation, String)>,
    version: VersionInfo,
    info: SystemInfo,
    log_root: PathBuf,
}

#[derive(Debug, Clone)]
struct ExecRecord {
    container_id: String,
    cmd: Vec<String>,
    running: bool,
    exit_code: Option<i32>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::with_log_root(DEFAULT_LOG_ROOT)
    }

    /// Creates an empty engine that reports container logs under `log_root`.
    pub fn with_log_root(log_root: impl Into<PathBuf>) -> Self {
        let state = MemoryState {
            containers: Vec::new(),
            images: Vec::new(),
            execs: HashMap::new(),
            exec_scripts: HashMap::new(),
            failures: HashMap::new(),
            delays: HashMap::new(),
            calls: Vec::new(),
            version: VersionInfo {
                version: "24.0.7".to_string(),
                api_version: DEFAULT_API_VERSION.to_string(),
                min_api_version: "1.12".to_string(),
                os: "linux".to_string(),
                arch: "amd64".to_string(),
                kernel_version: "6.1.0".to_string(),
            },
            info: SystemInfo {
                id: "memory".to_string(),
                name: "memory-engine".to_string(),
                driver: "overlay2".to_string(),
                cgroup_driver: "cgroupfs".to_string(),
                security_options: vec!["name=seccomp,profile=builtin".to_string()],
                containers_running: 0,
                server_version: "24.0.7".to_string(),
            },
            log_root: log_root.into(),
        };

        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Makes the next call of `operation` fail with `error`. Queued errors are used in order.
    pub async fn fail(&self, operation: Operation, error: EngineError) {
        self.state
            .write()
            .await
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Delays every call of `operation` by `delay`.
    pub async fn delay(&self, operation: Operation, delay: Duration) {
        self.state.write().await.delays.insert(operation, delay);
    }

    /// Scripts the behaviour of exec commands whose first argument is `program`.
    pub async fn script_exec(&self, program: impl Into<String>, script: ExecScript) {
        self.state
            .write()
            .await
            .exec_scripts
            .insert(program.into(), script);
    }

    /// Replaces the reported engine version.
    pub async fn set_version(&self, version: VersionInfo) {
        self.state.write().await.version = version;
    }

    /// Replaces the reported API version.
    pub async fn set_api_version(&self, api_version: impl Into<String>) {
        self.state.write().await.version.api_version = api_version.into();
    }

    /// Adds an image tagged `reference` and returns its id.
    pub async fn add_image(&self, reference: &str) -> String {
        let id = format!("sha256:{}", random_id());
        let image = ImageInspect {
            id: id.clone(),
            repo_tags: vec![normalize_tag(reference)],
            repo_digests: Vec::new(),
            size: 1024,
            ..Default::default()
        };

        self.state.write().await.images.push(image);
        id
    }

    /// Adds a fully described image.
    pub async fn insert_image(&self, image: ImageInspect) {
        self.state.write().await.images.push(image);
    }

    /// Returns a snapshot of a container record.
    pub async fn container(&self, id: &str) -> Option<ContainerJson> {
        let state = self.state.read().await;
        state.find_container(id).cloned()
    }

    /// Returns the ids of every container, oldest first.
    pub async fn container_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.containers.iter().map(|c| c.id.clone()).collect()
    }

    /// Mutates a container record in place.
    pub async fn update_record(
        &self,
        id: &str,
        update: impl FnOnce(&mut ContainerJson),
    ) -> EngineResult<()> {
        let mut state = self.state.write().await;
        let container = state.find_container_mut(id)?;
        update(container);
        Ok(())
    }

    /// Returns how often `operation` was called.
    pub async fn calls(&self, operation: Operation) -> usize {
        let state = self.state.read().await;
        state.calls.iter().filter(|(op, _)| *op == operation).count()
    }

    /// Returns the targets `operation` was called with, in order.
    pub async fn call_targets(&self, operation: Operation) -> Vec<String> {
        let state = self.state.read().await;
        state
            .calls
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, target)| target.clone())
            .collect()
    }

    /// Records the call, applies any delay and returns any injected failure.
    async fn enter(&self, operation: Operation, target: &str) -> EngineResult<()> {
        let delay = {
            let mut state = self.state.write().await;
            state.calls.push((operation, target.to_string()));
            state.delays.get(&operation).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        match state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => {
                tracing::debug!("injected failure for {:?}({}): {}", operation, target, error);
                Err(error)
            }
            None => Ok(()),
        }
    }
}

impl MemoryState {
    /// Finds a container by full id, unique id prefix or name.
    fn find_container(&self, id: &str) -> Option<&ContainerJson> {
        let name = format!("/{}", id.trim_start_matches('/'));
        self.containers
            .iter()
            .find(|c| c.id == id || c.name == name)
            .or_else(|| {
                let mut matches = self.containers.iter().filter(|c| c.id.starts_with(id));
                match (matches.next(), matches.next()) {
                    (Some(c), None) if !id.is_empty() => Some(c),
                    _ => None,
                }
            })
    }

    fn find_container_mut(&mut self, id: &str) -> EngineResult<&mut ContainerJson> {
        let full_id = self
            .find_container(id)
            .map(|c| c.id.clone())
            .ok_or_else(|| EngineError::ContainerNotFound(id.to_string()))?;

        self.containers
            .iter_mut()
            .find(|c| c.id == full_id)
            .ok_or(EngineError::ContainerNotFound(full_id))
    }

    /// Finds an image by id, tag or digest.
    fn find_image(&self, reference: &str) -> Option<&ImageInspect> {
        let tag = normalize_tag(reference);
        self.images.iter().find(|image| {
            image.id == reference
                || image.id.strip_prefix("sha256:") == Some(reference)
                || image.repo_tags.iter().any(|t| *t == tag)
                || image.repo_digests.iter().any(|d| d == reference)
        })
    }

    fn summarize(&self, container: &ContainerJson) -> ContainerSummary {
        ContainerSummary {
            id: container.id.clone(),
            names: vec![container.name.clone()],
            image: container.config.image.clone(),
            image_id: container.image.clone(),
            created: container.created.map(|t| t.timestamp()).unwrap_or_default(),
            state: container.state.status.clone(),
            status: container.state.status.clone(),
            labels: container.config.labels.clone(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EngineClient for MemoryEngine {
    async fn list_containers(
        &self,
        options: &ListContainersOptions,
    ) -> EngineResult<Vec<ContainerSummary>> {
        self.enter(Operation::ListContainers, "").await?;

        let state = self.state.read().await;
        let filters = &options.filters;
        let listed = state
            .containers
            .iter()
            .rev()
            .filter(|c| options.all || c.state.running)
            .filter(|c| {
                filters.get("id").is_empty() || filters.get("id").iter().any(|id| c.id.starts_with(id))
            })
            .filter(|c| {
                filters.get("name").is_empty()
                    || filters.get("name").iter().any(|n| c.trimmed_name().contains(n.as_str()))
            })
            .filter(|c| {
                filters.get("status").is_empty()
                    || filters.get("status").iter().any(|s| *s == c.state.status)
            })
            .filter(|c| filters.match_labels(&c.config.labels))
            .map(|c| state.summarize(c))
            .collect();

        Ok(listed)
    }

    async fn inspect_container(&self, id: &str) -> EngineResult<ContainerJson> {
        self.enter(Operation::InspectContainer, id).await?;

        let state = self.state.read().await;
        state
            .find_container(id)
            .cloned()
            .ok_or_else(|| EngineError::ContainerNotFound(id.to_string()))
    }

    async fn create_container(
        &self,
        request: &CreateContainerRequest,
    ) -> EngineResult<ContainerCreateResponse> {
        self.enter(Operation::CreateContainer, &request.name).await?;

        let mut state = self.state.write().await;
        let name = format!("/{}", request.name);
        if let Some(existing) = state.containers.iter().find(|c| c.name == name) {
            return Err(EngineError::Conflict(format!(
                "Conflict. The container name \"{}\" is already in use by container \"{}\". \
                 You have to remove (or rename) that container to be able to reuse that name.",
                name, existing.id
            )));
        }

        let image_id = state
            .find_image(&request.config.image)
            .map(|i| i.id.clone())
            .ok_or_else(|| EngineError::ImageNotFound(request.config.image.clone()))?;

        let id = random_id();
        let mounts = request
            .host_config
            .binds
            .iter()
            .filter_map(|bind| parse_bind(bind))
            .chain(request.host_config.mounts.iter().map(|m| MountPoint {
                source: m.source.clone(),
                destination: m.target.clone(),
                rw: !m.read_only,
                propagation: m
                    .bind_options
                    .as_ref()
                    .map(|b| b.propagation.clone())
                    .unwrap_or_default(),
            }))
            .collect();

        let log_path = state
            .log_root
            .join(&id)
            .join(format!("{}-json.log", id))
            .to_string_lossy()
            .into_owned();

        state.containers.push(ContainerJson {
            id: id.clone(),
            name,
            created: Some(Utc::now()),
            state: ContainerStateJson {
                status: "created".to_string(),
                ..Default::default()
            },
            image: image_id,
            log_path,
            config: request.config.clone(),
            host_config: request.host_config.clone(),
            mounts,
            ..Default::default()
        });

        tracing::trace!("memory engine created container {} ({})", request.name, id);
        Ok(ContainerCreateResponse {
            id,
            warnings: Vec::new(),
        })
    }

    async fn start_container(&self, id: &str) -> EngineResult<()> {
        self.enter(Operation::StartContainer, id).await?;

        let mut state = self.state.write().await;
        let container = state.find_container_mut(id)?;
        if container.state.running {
            return Ok(());
        }

        container.state = ContainerStateJson {
            status: "running".to_string(),
            running: true,
            pid: 4242,
            started_at: Some(Utc::now()),
            ..Default::default()
        };
        Ok(())
    }

    async fn stop_container(&self, id: &str, _timeout: Duration) -> EngineResult<()> {
        self.enter(Operation::StopContainer, id).await?;

        let mut state = self.state.write().await;
        let container = state.find_container_mut(id)?;
        if container.state.running {
            container.state.running = false;
            container.state.status = "exited".to_string();
            container.state.pid = 0;
            container.state.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_container(&self, id: &str, update: &UpdateConfig) -> EngineResult<()> {
        self.enter(Operation::UpdateContainer, id).await?;

        let mut state = self.state.write().await;
        let resources = &mut state.find_container_mut(id)?.host_config.resources;
        let new = &update.resources;
        if new.memory != 0 {
            resources.memory = new.memory;
        }
        if new.memory_swap != 0 {
            resources.memory_swap = new.memory_swap;
        }
        if new.cpu_shares != 0 {
            resources.cpu_shares = new.cpu_shares;
        }
        if new.cpu_quota != 0 {
            resources.cpu_quota = new.cpu_quota;
        }
        if new.cpu_period != 0 {
            resources.cpu_period = new.cpu_period;
        }
        if !new.cpuset_cpus.is_empty() {
            resources.cpuset_cpus = new.cpuset_cpus.clone();
        }
        if !new.cpuset_mems.is_empty() {
            resources.cpuset_mems = new.cpuset_mems.clone();
        }
        Ok(())
    }

    async fn remove_container(
        &self,
        id: &str,
        options: &RemoveContainerOptions,
    ) -> EngineResult<()> {
        self.enter(Operation::RemoveContainer, id).await?;

        let mut state = self.state.write().await;
        let container = state
            .find_container(id)
            .ok_or_else(|| EngineError::ContainerNotFound(id.to_string()))?;

        if container.state.running && !options.force {
            return Err(EngineError::Conflict(format!(
                "You cannot remove a running container {}. Stop the container before attempting removal or force remove",
                container.id
            )));
        }

        let full_id = container.id.clone();
        state.containers.retain(|c| c.id != full_id);
        state.execs.retain(|_, e| e.container_id != full_id);
        Ok(())
    }

    async fn inspect_image_by_ref(&self, reference: &str) -> EngineResult<ImageInspect> {
        self.enter(Operation::InspectImage, reference).await?;

        let state = self.state.read().await;
        state
            .find_image(reference)
            .cloned()
            .ok_or_else(|| EngineError::ImageNotFound(reference.to_string()))
    }

    async fn inspect_image_by_id(&self, id: &str) -> EngineResult<ImageInspect> {
        self.enter(Operation::InspectImage, id).await?;

        let state = self.state.read().await;
        state
            .images
            .iter()
            .find(|i| i.id == id || i.id.strip_prefix("sha256:") == Some(id))
            .cloned()
            .ok_or_else(|| EngineError::ImageNotFound(id.to_string()))
    }

    async fn list_images(&self, options: &ListImagesOptions) -> EngineResult<Vec<ImageSummary>> {
        self.enter(Operation::ListImages, "").await?;

        let state = self.state.read().await;
        let references = options.filters.get("reference");
        let listed = state
            .images
            .iter()
            .filter(|image| {
                references.is_empty()
                    || references.iter().any(|r| {
                        let tag = normalize_tag(r);
                        image.repo_tags.iter().any(|t| *t == tag)
                    })
            })
            .map(|image| ImageSummary {
                id: image.id.clone(),
                repo_tags: image.repo_tags.clone(),
                repo_digests: image.repo_digests.clone(),
                size: image.size,
                created: 0,
            })
            .collect();

        Ok(listed)
    }

    async fn pull_image(&self, reference: &str, _auth: Option<&RegistryAuth>) -> EngineResult<()> {
        self.enter(Operation::PullImage, reference).await?;

        let exists = self.state.read().await.find_image(reference).is_some();
        if !exists {
            self.add_image(reference).await;
        }
        Ok(())
    }

    async fn remove_image(
        &self,
        image: &str,
        _options: &RemoveImageOptions,
    ) -> EngineResult<Vec<ImageDeleteResponse>> {
        self.enter(Operation::RemoveImage, image).await?;

        let mut state = self.state.write().await;
        let found = state
            .find_image(image)
            .cloned()
            .ok_or_else(|| EngineError::ImageNotFound(image.to_string()))?;

        let tag = normalize_tag(image);
        let by_tag = found.repo_tags.iter().any(|t| *t == tag);
        if by_tag && found.repo_tags.len() > 1 {
            if let Some(record) = state.images.iter_mut().find(|i| i.id == found.id) {
                record.repo_tags.retain(|t| *t != tag);
            }
            return Ok(vec![ImageDeleteResponse {
                untagged: tag,
                ..Default::default()
            }]);
        }

        state.images.retain(|i| i.id != found.id);
        let mut response: Vec<ImageDeleteResponse> = found
            .repo_tags
            .iter()
            .map(|t| ImageDeleteResponse {
                untagged: t.clone(),
                ..Default::default()
            })
            .collect();
        response.push(ImageDeleteResponse {
            deleted: found.id,
            ..Default::default()
        });
        Ok(response)
    }

    async fn image_history(&self, id: &str) -> EngineResult<Vec<ImageHistory>> {
        self.enter(Operation::ImageHistory, id).await?;

        let state = self.state.read().await;
        let image = state
            .find_image(id)
            .ok_or_else(|| EngineError::ImageNotFound(id.to_string()))?;

        Ok(vec![ImageHistory {
            id: image.id.clone(),
            created_by: "/bin/sh -c #(nop) ADD file in /".to_string(),
            size: image.size,
            tags: image.repo_tags.clone(),
        }])
    }

    async fn create_exec(&self, container_id: &str, config: &ExecConfig) -> EngineResult<String> {
        self.enter(Operation::CreateExec, container_id).await?;

        let mut state = self.state.write().await;
        let container = state
            .find_container(container_id)
            .ok_or_else(|| EngineError::ContainerNotFound(container_id.to_string()))?;
        if !container.state.running {
            return Err(EngineError::NotRunning(container.id.clone()));
        }

        let container_id = container.id.clone();
        let exec_id = random_id();
        state.execs.insert(
            exec_id.clone(),
            ExecRecord {
                container_id,
                cmd: config.cmd.clone(),
                running: false,
                exit_code: None,
            },
        );
        Ok(exec_id)
    }

    async fn start_exec(
        &self,
        exec_id: &str,
        _options: &ExecStartOptions,
    ) -> EngineResult<ExecOutput> {
        self.enter(Operation::StartExec, exec_id).await?;

        let script = {
            let mut state = self.state.write().await;
            let program = {
                let record = state
                    .execs
                    .get_mut(exec_id)
                    .ok_or_else(|| EngineError::ExecNotFound(exec_id.to_string()))?;
                record.running = true;
                record.cmd.first().cloned().unwrap_or_default()
            };
            state.exec_scripts.get(&program).cloned().unwrap_or_default()
        };

        if !script.duration.is_zero() {
            tokio::time::sleep(script.duration).await;
        }

        let mut state = self.state.write().await;
        if let Some(record) = state.execs.get_mut(exec_id) {
            record.running = false;
            record.exit_code = Some(script.exit_code);
        }

        Ok(ExecOutput {
            stdout: script.stdout,
            stderr: script.stderr,
        })
    }

    async fn inspect_exec(&self, exec_id: &str) -> EngineResult<ExecInspect> {
        self.enter(Operation::InspectExec, exec_id).await?;

        let state = self.state.read().await;
        let record = state
            .execs
            .get(exec_id)
            .ok_or_else(|| EngineError::ExecNotFound(exec_id.to_string()))?;

        Ok(ExecInspect {
            id: exec_id.to_string(),
            container_id: record.container_id.clone(),
            running: record.running,
            exit_code: record.exit_code,
            pid: if record.running { 4343 } else { 0 },
        })
    }

    async fn resize_exec(&self, exec_id: &str, _size: TerminalSize) -> EngineResult<()> {
        self.enter(Operation::ResizeExec, exec_id).await?;

        let state = self.state.read().await;
        if !state.execs.contains_key(exec_id) {
            return Err(EngineError::ExecNotFound(exec_id.to_string()));
        }
        Ok(())
    }

    async fn attach_container(
        &self,
        id: &str,
        _options: &AttachOptions,
    ) -> EngineResult<ExecOutput> {
        self.enter(Operation::Attach, id).await?;

        let state = self.state.read().await;
        state
            .find_container(id)
            .ok_or_else(|| EngineError::ContainerNotFound(id.to_string()))?;
        Ok(ExecOutput::default())
    }

    async fn container_stats(&self, id: &str) -> EngineResult<ContainerStats> {
        self.enter(Operation::Stats, id).await?;

        let state = self.state.read().await;
        let container = state
            .find_container(id)
            .ok_or_else(|| EngineError::ContainerNotFound(id.to_string()))?;

        Ok(ContainerStats {
            read_at: Some(Utc::now()),
            cpu_usage_nanos: 0,
            memory_usage_bytes: 0,
            memory_limit_bytes: container.host_config.resources.memory.max(0) as u64,
        })
    }

    async fn version(&self) -> EngineResult<VersionInfo> {
        self.enter(Operation::Version, "").await?;
        Ok(self.state.read().await.version.clone())
    }

    async fn info(&self) -> EngineResult<SystemInfo> {
        self.enter(Operation::Info, "").await?;

        let state = self.state.read().await;
        let mut info = state.info.clone();
        info.containers_running = state.containers.iter().filter(|c| c.state.running).count() as i64;
        Ok(info)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn random_id() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// Appends the `latest` tag to references without tag or digest.
fn normalize_tag(reference: &str) -> String {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    if reference.contains('@') || last.contains(':') {
        reference.to_string()
    } else {
        format!("{}:latest", reference)
    }
}

/// Parses a `host:container[:options]` bind.
fn parse_bind(bind: &str) -> Option<MountPoint> {
    let mut parts = bind.splitn(3, ':');
    let source = parts.next()?;
    let destination = parts.next()?;
    let options = parts.next().unwrap_or_default();

    let rw = !options.split(',').any(|o| o == "ro");
    let propagation = options
        .split(',')
        .find(|o| matches!(*o, "rshared" | "rslave" | "rprivate"))
        .unwrap_or("rprivate");

    Some(MountPoint {
        source: source.to_string(),
        destination: destination.to_string(),
        rw,
        propagation: propagation.to_string(),
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ListFilters;

    fn request(name: &str, image: &str) -> CreateContainerRequest {
        CreateContainerRequest::builder()
            .name(name)
            .config(crate::engine::ContainerCreateConfig {
                image: image.to_string(),
                ..Default::default()
            })
            .build()
    }

    #[tokio::test]
    async fn test_memory_engine_reports_name_conflicts() -> anyhow::Result<()> {
        let engine = MemoryEngine::new();
        engine.add_image("busybox").await;

        let first = engine.create_container(&request("web", "busybox")).await?;
        let err = engine
            .create_container(&request("web", "busybox"))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert!(err.to_string().contains(&first.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_engine_requires_image() {
        let engine = MemoryEngine::new();
        let err = engine
            .create_container(&request("web", "nginx"))
            .await
            .unwrap_err();
        assert!(err.is_image_not_found());
    }

    #[tokio::test]
    async fn test_memory_engine_lifecycle_and_filters() -> anyhow::Result<()> {
        let engine = MemoryEngine::new();
        engine.add_image("busybox:1.36").await;

        let id = engine
            .create_container(&request("one", "busybox:1.36"))
            .await?
            .id;
        engine.start_container(&id).await?;

        let running = engine
            .list_containers(&ListContainersOptions::default())
            .await?;
        assert_eq!(running.len(), 1);

        engine.stop_container(&id, Duration::from_secs(1)).await?;
        let running = engine
            .list_containers(&ListContainersOptions::default())
            .await?;
        assert!(running.is_empty());

        let mut filters = ListFilters::new();
        filters.add("status", "exited");
        let exited = engine
            .list_containers(&ListContainersOptions { all: true, filters })
            .await?;
        assert_eq!(exited.len(), 1);
        assert!(engine.inspect_container(&id).await?.state.finished_at.is_some());

        engine
            .remove_container(&id, &RemoveContainerOptions::default())
            .await?;
        assert!(engine
            .inspect_container(&id)
            .await
            .unwrap_err()
            .is_container_not_found());

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_engine_injected_failures_are_consumed() -> anyhow::Result<()> {
        let engine = MemoryEngine::new();
        engine
            .fail(Operation::Version, EngineError::Connection("down".into()))
            .await;

        assert!(engine.version().await.is_err());
        assert_eq!(engine.version().await?.api_version, DEFAULT_API_VERSION);
        assert_eq!(engine.calls(Operation::Version).await, 2);
        Ok(())
    }
}
