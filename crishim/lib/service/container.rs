use std::{path::Path, sync::LazyLock, time::Duration};

use crishim_utils::join_log_path;
use regex::Regex;

use crate::{
    cri::{
        Container, ContainerConfig, ContainerFilter, ContainerState, ContainerStatus, ImageSpec,
        LinuxContainerResources, Mount, MountPropagation, PodSandboxConfig, SecurityProfile,
    },
    engine::{
        ContainerCreateConfig, ContainerJson, ContainerStats, CreateContainerRequest,
        DeviceMapping, EngineError, HealthConfig, HostConfig, ListContainersOptions, ListFilters,
        MountPoint, RemoveContainerOptions, Resources, RestartPolicy, UpdateConfig,
    },
    security::{
        apply_container_security_context, container_namespace_modes, format_security_opts,
        load_seccomp_security_opts,
    },
    ShimError, ShimResult,
};

use super::{
    create_log_symlink, create_with_conflict_recovery, fold_annotations, make_container_name,
    make_mount_bindings, mount_label, parse_container_name, remove_log_symlink,
    split_labels_and_annotations, unix_nanos, ShimService, CONTAINER_LOG_PATH_LABEL_KEY,
    CONTAINER_TYPE_LABEL_CONTAINER, CONTAINER_TYPE_LABEL_KEY, SANDBOX_ID_LABEL_KEY,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Matches the engine error of a start whose entrypoint cannot be found.
static EXECUTABLE_NOT_FOUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\\*"?(.*?)\\*"?: executable file not found"#).unwrap());

/// The message replacing an engine start error about a missing executable.
const EXECUTABLE_NOT_FOUND_MESSAGE: &str = "executable not found in $PATH";

/// The health check disabling any check inherited from the image.
const HEALTHCHECK_NONE: &str = "NONE";

/// Containers are restarted by the kubelet, never by the engine.
const RESTART_POLICY_NO: &str = "no";

/// The reason of a container killed for exceeding its memory limit.
pub const REASON_OOM_KILLED: &str = "OOMKilled";

/// The reason of a container that exited with code zero.
pub const REASON_COMPLETED: &str = "Completed";

/// The reason of a container that exited with a non-zero code.
pub const REASON_ERROR: &str = "Error";

/// The reason of a container that never ran.
pub const REASON_CONTAINER_CANNOT_RUN: &str = "ContainerCannotRun";

/// The image reference prefix of images known by digest.
const PULLABLE_IMAGE_PREFIX: &str = "docker-pullable://";

/// The image reference prefix of images known only by id.
const IMAGE_ID_PREFIX: &str = "docker://";

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShimService {
    /// Creates a container in the sandbox `pod_sandbox_id` and returns its id.
    ///
    /// Mounts flagged for relabeling are relabeled before the create. Platform artifacts are
    /// recorded for removal when the create succeeds and cleaned up at once when it fails.
    pub async fn create_container(
        &self,
        pod_sandbox_id: &str,
        config: &ContainerConfig,
        sandbox_config: &PodSandboxConfig,
    ) -> ShimResult<String> {
        if pod_sandbox_id.is_empty() {
            return Err(ShimError::InvalidArgument(
                "container requires a pod sandbox id".to_string(),
            ));
        }
        if config.image.image.is_empty() {
            return Err(ShimError::InvalidArgument(format!(
                "container {} has no image",
                config.metadata.name
            )));
        }

        tracing::info!(
            "creating container {} in pod sandbox {}",
            config.metadata.name,
            pod_sandbox_id
        );

        let mut request = self
            .make_container_request(pod_sandbox_id, config, sandbox_config)
            .await?;

        for mount in config.mounts.iter().filter(|m| m.selinux_relabel) {
            let label = mount_label(
                config
                    .security_context()
                    .and_then(|s| s.selinux_options.as_ref()),
            );
            self.relabeler
                .relabel(Path::new(&mount.host_path), &label)
                .await?;
        }

        let cleanup = self
            .hooks
            .prepare(config, &mut request.host_config)
            .await?;

        match create_with_conflict_recovery(self.engine.as_ref(), &request).await {
            Ok(response) => {
                for warning in &response.warnings {
                    tracing::warn!("engine warning creating container {}: {}", response.id, warning);
                }
                if let Some(info) = cleanup {
                    self.cleanup.insert(&response.id, info).await;
                }
                Ok(response.id)
            }
            Err(e) => {
                if let Some(info) = cleanup {
                    if let Err(cleanup_error) = self.hooks.cleanup(&info).await {
                        tracing::warn!(
                            "failed to clean up after failed create of {}: {}",
                            request.name,
                            cleanup_error
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Starts a container and links its kubelet log path to the engine log file.
    ///
    /// The symlink is attempted even when the start fails, and its failure is reported first.
    pub async fn start_container(&self, container_id: &str) -> ShimResult<()> {
        tracing::info!("starting container {}", container_id);
        let started = self.engine.start_container(container_id).await;

        self.create_container_log_symlink(container_id).await?;

        started.map_err(|e| rewrite_start_error(container_id, e))
    }

    /// Stops a container, giving it `timeout_secs` seconds before it is killed.
    pub async fn stop_container(&self, container_id: &str, timeout_secs: i64) -> ShimResult<()> {
        tracing::info!("stopping container {} (timeout {}s)", container_id, timeout_secs);
        let timeout = Duration::from_secs(timeout_secs.max(0) as u64);
        self.engine.stop_container(container_id, timeout).await?;
        Ok(())
    }

    /// Removes a container along with its log symlink and platform artifacts.
    ///
    /// The symlink and the artifacts go first so that they do not leak when the engine remove
    /// fails. A container that is already gone counts as removed.
    pub async fn remove_container(&self, container_id: &str) -> ShimResult<()> {
        tracing::info!("removing container {}", container_id);
        self.remove_container_log_symlink(container_id).await?;

        if let Some(info) = self.cleanup.remove(container_id).await {
            if let Err(e) = self.hooks.cleanup(&info).await {
                tracing::warn!("failed to clean up artifacts of container {}: {}", container_id, e);
            }
        }

        let options = RemoveContainerOptions {
            force: true,
            remove_volumes: true,
        };
        match self.engine.remove_container(container_id, &options).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_container_not_found() => {
                tracing::debug!("container {} is already gone", container_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Lists containers matching `filter`. Sandbox containers are never listed.
    pub async fn list_containers(
        &self,
        filter: Option<&ContainerFilter>,
    ) -> ShimResult<Vec<Container>> {
        let mut filters = ListFilters::new();
        filters.add_label(CONTAINER_TYPE_LABEL_KEY, CONTAINER_TYPE_LABEL_CONTAINER);
        if let Some(filter) = filter {
            if let Some(id) = &filter.id {
                filters.add("id", id.as_str());
            }
            if let Some(state) = filter.state {
                filters.add("status", engine_status(state));
            }
            if let Some(sandbox_id) = &filter.pod_sandbox_id {
                filters.add_label(SANDBOX_ID_LABEL_KEY, sandbox_id);
            }
            for (key, value) in &filter.label_selector {
                filters.add_label(key, value);
            }
        }

        let summaries = self
            .engine
            .list_containers(&ListContainersOptions { all: true, filters })
            .await?;

        let mut containers = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(name) = summary.first_name() else {
                continue;
            };
            let metadata = match parse_container_name(name) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("skipping container {}: {}", summary.id, e);
                    continue;
                }
            };

            let pod_sandbox_id = summary
                .labels
                .get(SANDBOX_ID_LABEL_KEY)
                .cloned()
                .unwrap_or_default();
            let (labels, annotations) = split_labels_and_annotations(&summary.labels);

            containers.push(Container {
                id: summary.id,
                pod_sandbox_id,
                metadata,
                image: ImageSpec {
                    image: summary.image,
                    ..Default::default()
                },
                image_ref: summary.image_id,
                state: container_state_from_status(&summary.state),
                created_at: summary.created.saturating_mul(1_000_000_000),
                labels,
                annotations,
            });
        }

        Ok(containers)
    }

    /// Returns the status of a container.
    pub async fn container_status(&self, container_id: &str) -> ShimResult<ContainerStatus> {
        let record = self.engine.inspect_container(container_id).await?;
        let metadata = parse_container_name(record.trimmed_name())?;
        let image_ref = self.image_ref(&record.image).await;

        let (labels, annotations) = split_labels_and_annotations(&record.config.labels);
        let log_path = record
            .config
            .labels
            .get(CONTAINER_LOG_PATH_LABEL_KEY)
            .cloned()
            .unwrap_or_default();

        let mut status = ContainerStatus {
            id: record.id.clone(),
            metadata,
            created_at: unix_nanos(record.created),
            started_at: unix_nanos(record.state.started_at),
            finished_at: unix_nanos(record.state.finished_at),
            exit_code: record.state.exit_code,
            image: ImageSpec {
                image: record.config.image.clone(),
                ..Default::default()
            },
            image_ref,
            labels,
            annotations,
            mounts: record.mounts.iter().map(cri_mount).collect(),
            log_path,
            ..Default::default()
        };
        classify_state(&record, &mut status);

        Ok(status)
    }

    /// Updates the CPU and memory constraints of a running container.
    pub async fn update_container_resources(
        &self,
        container_id: &str,
        resources: &LinuxContainerResources,
    ) -> ShimResult<()> {
        tracing::info!("updating resources of container {}", container_id);
        let update = UpdateConfig {
            resources: engine_resources(resources),
        };
        self.engine.update_container(container_id, &update).await?;
        Ok(())
    }

    /// Returns the latest resource usage of a container.
    ///
    /// A sample from the stats collector is preferred. Without one the engine is asked directly.
    pub async fn container_stats(&self, container_id: &str) -> ShimResult<ContainerStats> {
        if let Some(sample) = self.stats.sample(container_id).await {
            return Ok(sample);
        }

        Ok(self.engine.container_stats(container_id).await?)
    }

    /// Translates a container configuration into an engine create request.
    pub(super) async fn make_container_request(
        &self,
        pod_sandbox_id: &str,
        config: &ContainerConfig,
        sandbox_config: &PodSandboxConfig,
    ) -> ShimResult<CreateContainerRequest> {
        let mut labels = fold_annotations(&config.labels, &config.annotations);
        labels.insert(
            CONTAINER_TYPE_LABEL_KEY.to_string(),
            CONTAINER_TYPE_LABEL_CONTAINER.to_string(),
        );
        labels.insert(SANDBOX_ID_LABEL_KEY.to_string(), pod_sandbox_id.to_string());

        let log_path = join_log_path(&sandbox_config.log_directory, &config.log_path)?;
        if !log_path.is_empty() {
            labels.insert(CONTAINER_LOG_PATH_LABEL_KEY.to_string(), log_path);
        }

        let mut create = ContainerCreateConfig {
            image: config.image.image.clone(),
            entrypoint: config.command.clone(),
            cmd: config.args.clone(),
            env: config
                .envs
                .iter()
                .map(|kv| format!("{}={}", kv.key, kv.value))
                .collect(),
            working_dir: config.working_dir.clone(),
            labels,
            open_stdin: config.stdin,
            stdin_once: config.stdin_once,
            tty: config.tty,
            healthcheck: Some(HealthConfig {
                test: vec![HEALTHCHECK_NONE.to_string()],
            }),
            ..Default::default()
        };

        let recursive_read_only_supported = if config.mounts.iter().any(|m| m.recursive_read_only)
        {
            self.engine_info.supports_recursive_read_only().await?
        } else {
            false
        };
        let (binds, mounts) = make_mount_bindings(&config.mounts, recursive_read_only_supported)?;

        let mut host = HostConfig {
            binds,
            mounts,
            restart_policy: RestartPolicy {
                name: RESTART_POLICY_NO.to_string(),
                maximum_retry_count: 0,
            },
            ..Default::default()
        };

        if let Some(resources) = config.linux.as_ref().and_then(|l| l.resources.as_ref()) {
            host.resources = engine_resources(resources);
            host.oom_score_adj = resources.oom_score_adj;
        }
        host.resources.devices = config
            .devices
            .iter()
            .map(|d| DeviceMapping {
                path_on_host: d.host_path.clone(),
                path_in_container: d.container_path.clone(),
                cgroup_permissions: d.permissions.clone(),
            })
            .collect();

        if let Some(linux) = &sandbox_config.linux {
            host.cgroup_parent = self
                .config
                .get_cgroup_driver()
                .expected_cgroup_parent(&linux.cgroup_parent);
        }

        let context = config.security_context();
        container_namespace_modes(
            context.and_then(|c| c.namespace_options.as_ref()),
            pod_sandbox_id,
        )?
        .apply(&mut host);

        let separator = self.engine_info.security_opt_separator().await?;
        apply_container_security_context(context, &mut create, &mut host, separator)?;

        let seccomp = match context {
            Some(c) => SecurityProfile::resolve(c.seccomp.as_ref(), &c.seccomp_profile_path)?,
            None => None,
        };
        let seccomp_opts = load_seccomp_security_opts(seccomp.as_ref(), config.is_privileged()).await?;
        host.security_opt
            .extend(format_security_opts(&seccomp_opts, separator));

        Ok(CreateContainerRequest::builder()
            .name(make_container_name(sandbox_config, config))
            .config(create)
            .host_config(host)
            .build())
    }

    async fn create_container_log_symlink(&self, container_id: &str) -> ShimResult<()> {
        let record = self.engine.inspect_container(container_id).await?;
        let path = record
            .config
            .labels
            .get(CONTAINER_LOG_PATH_LABEL_KEY)
            .map(String::as_str)
            .unwrap_or_default();

        create_log_symlink(path, &record.log_path).await
    }

    async fn remove_container_log_symlink(&self, container_id: &str) -> ShimResult<()> {
        let record = match self.engine.inspect_container(container_id).await {
            Ok(record) => record,
            Err(e) if e.is_container_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        match record.config.labels.get(CONTAINER_LOG_PATH_LABEL_KEY) {
            Some(path) => remove_log_symlink(path).await,
            None => Ok(()),
        }
    }

    /// Resolves the reference of the image a container runs.
    ///
    /// An image known by digest is reported as pullable. Anything else, including an image
    /// that was removed meanwhile, is reported by id.
    async fn image_ref(&self, image_id: &str) -> String {
        match self.engine.inspect_image_by_id(image_id).await {
            Ok(image) => match image.repo_digests.first() {
                Some(digest) => format!("{}{}", PULLABLE_IMAGE_PREFIX, digest),
                None => format!("{}{}", IMAGE_ID_PREFIX, image.id),
            },
            Err(e) => {
                tracing::debug!("cannot inspect image {}: {}", image_id, e);
                format!("{}{}", IMAGE_ID_PREFIX, image_id)
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Derives the CRI state, reason and message of a container from its engine record.
///
/// - A running container is RUNNING.
/// - A finished container is EXITED with reason OOMKilled, Completed or Error, in that order.
/// - A container that never finished but has an exit code could not run. Its start and finish
///   times are reported as its creation time.
/// - Anything else is CREATED.
fn classify_state(record: &ContainerJson, status: &mut ContainerStatus) {
    let state = &record.state;

    if state.running {
        status.state = ContainerState::ContainerRunning;
        return;
    }

    if state.finished_at.is_some() {
        status.state = ContainerState::ContainerExited;
        status.reason = if state.oom_killed {
            REASON_OOM_KILLED
        } else if state.exit_code == 0 {
            REASON_COMPLETED
        } else {
            REASON_ERROR
        }
        .to_string();
        status.message = state.error.clone();
        return;
    }

    if state.exit_code != 0 {
        status.state = ContainerState::ContainerExited;
        status.reason = REASON_CONTAINER_CANNOT_RUN.to_string();
        status.message = state.error.clone();
        status.started_at = status.created_at;
        status.finished_at = status.created_at;
        return;
    }

    status.state = ContainerState::ContainerCreated;
}

fn container_state_from_status(status: &str) -> ContainerState {
    match status {
        "created" => ContainerState::ContainerCreated,
        "running" | "restarting" | "paused" => ContainerState::ContainerRunning,
        "exited" | "dead" => ContainerState::ContainerExited,
        _ => ContainerState::ContainerUnknown,
    }
}

fn engine_status(state: ContainerState) -> &'static str {
    match state {
        ContainerState::ContainerCreated => "created",
        ContainerState::ContainerRunning => "running",
        ContainerState::ContainerExited => "exited",
        ContainerState::ContainerUnknown => "unknown",
    }
}

/// Maps CRI resource constraints onto engine resources. The swap limit equals the memory limit.
fn engine_resources(resources: &LinuxContainerResources) -> Resources {
    Resources {
        memory: resources.memory_limit_in_bytes,
        memory_swap: resources.memory_limit_in_bytes,
        cpu_shares: resources.cpu_shares,
        cpu_quota: resources.cpu_quota,
        cpu_period: resources.cpu_period,
        cpuset_cpus: resources.cpuset_cpus.clone(),
        cpuset_mems: resources.cpuset_mems.clone(),
        ..Default::default()
    }
}

fn cri_mount(mount: &MountPoint) -> Mount {
    let propagation = match mount.propagation.as_str() {
        "rshared" | "shared" => MountPropagation::PropagationBidirectional,
        "rslave" | "slave" => MountPropagation::PropagationHostToContainer,
        _ => MountPropagation::PropagationPrivate,
    };

    Mount {
        container_path: mount.destination.clone(),
        host_path: mount.source.clone(),
        readonly: !mount.rw,
        propagation,
        ..Default::default()
    }
}

fn rewrite_start_error(container_id: &str, error: EngineError) -> ShimError {
    let message = error.to_string();
    if EXECUTABLE_NOT_FOUND_RE.is_match(&message) {
        tracing::warn!("container {} failed to start: {}", container_id, message);
        return ShimError::ContainerStart {
            id: container_id.to_string(),
            message: EXECUTABLE_NOT_FOUND_MESSAGE.to_string(),
        };
    }

    error.into()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
