use std::{
    collections::{BTreeMap, HashMap, HashSet},
    net::IpAddr,
};

use futures::future;

use crate::{
    checkpoint::{CheckpointData, PodSandboxCheckpoint},
    config::{DEFAULT_SANDBOX_CPU_SHARES, DEFAULT_SANDBOX_OOM_SCORE_ADJ, RUNTIME_NAME},
    cri::{
        PodSandbox, PodSandboxConfig, PodSandboxFilter, PodSandboxMetadata,
        PodSandboxNetworkStatus, PodSandboxState, PodSandboxStatus, PortMapping, SecurityProfile,
    },
    engine::{
        ContainerCreateConfig, ContainerJson, ContainerStateJson, CreateContainerRequest,
        HostConfig, ListContainersOptions, ListFilters, PortBinding, RemoveContainerOptions,
        NAMESPACE_MODE_HOST,
    },
    network::ContainerId,
    security::{
        apply_container_security_context, format_security_opts, load_seccomp_security_opts,
        namespace_options_from_host_config, sandbox_container_context, sandbox_namespace_modes,
    },
    AggregateError, ShimError, ShimResult,
};

use super::{
    create_with_conflict_recovery, fold_annotations, make_sandbox_name, parse_sandbox_name,
    split_labels_and_annotations, unix_nanos, SandboxState, ShimService,
    CONTAINER_TYPE_LABEL_KEY, CONTAINER_TYPE_LABEL_SANDBOX, KUBERNETES_CONTAINER_NAME_LABEL,
    POD_INFRA_CONTAINER_NAME, SANDBOX_ID_LABEL_KEY,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The network plugin option carrying the JSON encoded DNS configuration of the pod.
pub const DNS_OPTION_KEY: &str = "dns";

/// The engine status of a running container.
const ENGINE_STATUS_RUNNING: &str = "running";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What is known about a sandbox when it is stopped.
#[derive(Debug, Default)]
struct SandboxIdentity {
    name: String,
    namespace: String,
    host_network: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShimService {
    /// Creates and starts a pod sandbox and sets up its network.
    ///
    /// The checkpoint is written right after the sandbox container is created. If the network
    /// cannot be set up it is torn down again and the sandbox container is stopped. The setup
    /// error is then returned aggregated with every error of that cleanup, and the sandbox is
    /// left behind as not ready for the caller to remove.
    pub async fn run_pod_sandbox(
        &self,
        config: &PodSandboxConfig,
        runtime_handler: &str,
    ) -> ShimResult<String> {
        if !runtime_handler.is_empty() && runtime_handler != RUNTIME_NAME {
            return Err(ShimError::InvalidArgument(format!(
                "runtime handler {:?} is not supported",
                runtime_handler
            )));
        }

        let metadata = &config.metadata;
        tracing::info!(
            "running pod sandbox {}/{} (attempt {})",
            metadata.namespace,
            metadata.name,
            metadata.attempt
        );

        self.ensure_sandbox_image().await?;

        let request = self.make_sandbox_request(config).await?;
        let id = create_with_conflict_recovery(self.engine.as_ref(), &request)
            .await?
            .id;
        let mut state = SandboxState::Absent.created()?;

        let checkpoint = PodSandboxCheckpoint::new(
            &metadata.name,
            &metadata.namespace,
            CheckpointData::new(&config.port_mappings, config.is_host_network()),
        );
        self.checkpoints.create_checkpoint(&id, &checkpoint).await?;

        self.engine.start_container(&id).await.inspect_err(|e| {
            tracing::error!("failed to start sandbox container {}: {}", id, e);
        })?;

        self.network_ready.set(&id, false).await;

        if config.is_host_network() {
            state = state.network_up()?;
            self.network_ready.set(&id, true).await;
            tracing::info!("pod sandbox {} uses the host network, state {}", id, state);
            return Ok(id);
        }

        let mut options = HashMap::new();
        if let Some(dns) = &config.dns_config {
            options.insert(DNS_OPTION_KEY.to_string(), serde_json::to_string(dns)?);
        }

        let container_id = ContainerId::docker(&id);
        let setup = self
            .network
            .set_up_pod(
                &metadata.namespace,
                &metadata.name,
                &container_id,
                &config.annotations,
                &options,
            )
            .await;

        match setup {
            Ok(()) => {
                state = state.network_up()?;
                self.network_ready.set(&id, true).await;
                tracing::info!("pod sandbox {} is {}", id, state);
                Ok(id)
            }
            Err(e) => {
                tracing::error!("failed to set up network of pod sandbox {}: {}", id, e);
                let mut errors = AggregateError::new();
                errors.push(e);

                if let Err(e) = self
                    .network
                    .tear_down_pod(&metadata.namespace, &metadata.name, &container_id)
                    .await
                {
                    errors.push(e);
                }

                if let Err(e) = self
                    .engine
                    .stop_container(&id, self.config.sandbox_grace_period())
                    .await
                {
                    errors.push(e);
                }

                state = state.network_down()?;
                tracing::warn!("pod sandbox {} is {} after a failed network setup", id, state);
                errors.into_result().map(|()| id)
            }
        }
    }

    /// Tears down the sandbox network and stops the sandbox container.
    ///
    /// The sandbox identity comes from the engine record or, if that is gone, from the
    /// checkpoint. If both are gone the stop proceeds with the id alone so that retries
    /// converge. Teardown and stop are both attempted and their errors aggregated.
    pub async fn stop_pod_sandbox(&self, sandbox_id: &str) -> ShimResult<()> {
        tracing::info!("stopping pod sandbox {}", sandbox_id);

        let identity = match self.inspect_sandbox_identity(sandbox_id).await {
            Ok(identity) => identity,
            Err(inspect_error) => self.checkpoint_identity(sandbox_id, inspect_error).await?,
        };

        let mut errors = AggregateError::new();

        let ready = self.network_ready.get(sandbox_id).await;
        if !identity.host_network && ready != Some(false) {
            let teardown = self
                .network
                .tear_down_pod(
                    &identity.namespace,
                    &identity.name,
                    &ContainerId::docker(sandbox_id),
                )
                .await;

            match teardown {
                Ok(()) => self.network_ready.set(sandbox_id, false).await,
                Err(e) => {
                    tracing::error!("failed to tear down network of pod sandbox {}: {}", sandbox_id, e);
                    errors.push(e);
                }
            }
        }

        match self
            .engine
            .stop_container(sandbox_id, self.config.sandbox_grace_period())
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_container_not_found() => {
                tracing::debug!("sandbox container {} is already gone", sandbox_id);
                if let Err(e) = self.checkpoints.remove_checkpoint(sandbox_id).await {
                    tracing::warn!("failed to remove checkpoint of sandbox {}: {}", sandbox_id, e);
                }
            }
            Err(e) => {
                tracing::error!("failed to stop sandbox container {}: {}", sandbox_id, e);
                errors.push(e);
            }
        }

        errors.into_result()
    }

    /// Removes every container of a sandbox, the sandbox container and its checkpoint.
    ///
    /// Each phase runs regardless of the others and every error is aggregated.
    pub async fn remove_pod_sandbox(&self, sandbox_id: &str) -> ShimResult<()> {
        tracing::info!("removing pod sandbox {}", sandbox_id);
        let mut errors = AggregateError::new();

        let mut filters = ListFilters::new();
        filters.add_label(SANDBOX_ID_LABEL_KEY, sandbox_id);
        let listed = self
            .engine
            .list_containers(&ListContainersOptions { all: true, filters })
            .await;

        match listed {
            Ok(containers) => {
                let removals = containers.iter().map(|c| self.remove_container(&c.id));
                for result in future::join_all(removals).await {
                    match result {
                        Ok(()) => {}
                        Err(e) if e.is_not_found() => {}
                        Err(e) => errors.push(e),
                    }
                }
            }
            Err(e) => errors.push(e),
        }

        let options = RemoveContainerOptions {
            force: true,
            remove_volumes: true,
        };
        match self.engine.remove_container(sandbox_id, &options).await {
            Ok(()) => self.network_ready.clear(sandbox_id).await,
            Err(e) if e.is_container_not_found() => self.network_ready.clear(sandbox_id).await,
            Err(e) => {
                tracing::error!("failed to remove sandbox container {}: {}", sandbox_id, e);
                errors.push(e);
            }
        }

        if let Err(e) = self.checkpoints.remove_checkpoint(sandbox_id).await {
            errors.push(e);
        }

        let state = SandboxState::Absent.removed();
        tracing::debug!("pod sandbox {} is {}", sandbox_id, state);
        errors.into_result()
    }

    /// Returns the status of a sandbox.
    pub async fn pod_sandbox_status(&self, sandbox_id: &str) -> ShimResult<PodSandboxStatus> {
        let record = self.engine.inspect_container(sandbox_id).await?;
        let metadata = parse_sandbox_name(record.trimmed_name())?;

        let ready = self.network_ready.get(&record.id).await;
        let state = SandboxState::observe(Some(&record.state), ready, true);
        let network = self.pod_network_status(&record, &metadata, ready).await;
        let (labels, annotations) = split_labels_and_annotations(&record.config.labels);

        Ok(PodSandboxStatus {
            id: record.id.clone(),
            metadata,
            state: state.to_cri(),
            created_at: unix_nanos(record.created),
            network,
            namespace_options: namespace_options_from_host_config(&record.host_config, None),
            labels,
            annotations,
            runtime_handler: String::new(),
        })
    }

    /// Lists sandboxes matching `filter`.
    ///
    /// Sandboxes whose container is gone but whose checkpoint survives are listed as not
    /// ready, unless the filter asks for ready sandboxes or selects labels.
    pub async fn list_pod_sandbox(
        &self,
        filter: Option<&PodSandboxFilter>,
    ) -> ShimResult<Vec<PodSandbox>> {
        let mut filters = ListFilters::new();
        filters.add_label(CONTAINER_TYPE_LABEL_KEY, CONTAINER_TYPE_LABEL_SANDBOX);
        if let Some(filter) = filter {
            if let Some(id) = &filter.id {
                filters.add("id", id.as_str());
            }
            if filter.state == Some(PodSandboxState::SandboxReady) {
                filters.add("status", ENGINE_STATUS_RUNNING);
            }
            for (key, value) in &filter.label_selector {
                filters.add_label(key, value);
            }
        }

        let containers = self
            .engine
            .list_containers(&ListContainersOptions { all: true, filters })
            .await?;

        let mut sandboxes = Vec::with_capacity(containers.len());
        let mut seen = HashSet::new();
        for container in containers {
            seen.insert(container.id.clone());

            let Some(name) = container.first_name() else {
                continue;
            };
            let metadata = match parse_sandbox_name(name) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("skipping sandbox container {}: {}", container.id, e);
                    continue;
                }
            };

            let engine_state = ContainerStateJson {
                status: container.state.clone(),
                running: container.state == ENGINE_STATUS_RUNNING,
                ..Default::default()
            };
            let ready = self.network_ready.get(&container.id).await;
            let state = SandboxState::observe(Some(&engine_state), ready, true);
            let (labels, annotations) = split_labels_and_annotations(&container.labels);

            sandboxes.push(PodSandbox {
                id: container.id,
                metadata,
                state: state.to_cri(),
                created_at: container.created.saturating_mul(1_000_000_000),
                labels,
                annotations,
                runtime_handler: String::new(),
            });
        }

        let include_checkpoints = filter.is_none_or(|f| {
            f.state != Some(PodSandboxState::SandboxReady) && f.label_selector.is_empty()
        });
        if include_checkpoints {
            let id_filter = filter.and_then(|f| f.id.as_deref());
            sandboxes.extend(self.checkpointed_sandboxes(&seen, id_filter).await?);
        }

        if let Some(wanted) = filter.and_then(|f| f.state) {
            sandboxes.retain(|s| s.state == wanted);
        }

        Ok(sandboxes)
    }

    /// Returns the port mappings recorded for a sandbox.
    ///
    /// A corrupted checkpoint is removed and reported.
    pub async fn get_pod_port_mappings(&self, sandbox_id: &str) -> ShimResult<Vec<PortMapping>> {
        match self.checkpoints.get_checkpoint(sandbox_id).await {
            Ok(checkpoint) => Ok(checkpoint.port_mappings()),
            Err(e) if e.is_corrupt_checkpoint() => {
                if let Err(remove_error) = self.checkpoints.remove_checkpoint(sandbox_id).await {
                    tracing::warn!(
                        "failed to remove corrupted checkpoint of sandbox {}: {}",
                        sandbox_id,
                        remove_error
                    );
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_sandbox_image(&self) -> ShimResult<()> {
        let image = self.config.get_pod_sandbox_image();
        match self.engine.inspect_image_by_ref(image).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_image_not_found() => {
                tracing::info!("sandbox image {} is not present, pulling it", image);
                self.engine.pull_image(image, None).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Translates a sandbox configuration into an engine create request.
    pub(super) async fn make_sandbox_request(
        &self,
        config: &PodSandboxConfig,
    ) -> ShimResult<CreateContainerRequest> {
        let mut labels = fold_annotations(&config.labels, &config.annotations);
        labels.insert(
            CONTAINER_TYPE_LABEL_KEY.to_string(),
            CONTAINER_TYPE_LABEL_SANDBOX.to_string(),
        );
        labels.insert(
            KUBERNETES_CONTAINER_NAME_LABEL.to_string(),
            POD_INFRA_CONTAINER_NAME.to_string(),
        );

        let mut create = ContainerCreateConfig {
            hostname: config.hostname.clone(),
            image: self.config.get_pod_sandbox_image().clone(),
            labels,
            ..Default::default()
        };

        let mut host = HostConfig::default();
        sandbox_namespace_modes(config.namespace_options(), self.network.name()).apply(&mut host);

        let separator = self.engine_info.security_opt_separator().await?;
        let mut seccomp = None;
        let mut privileged = false;

        if let Some(linux) = &config.linux {
            host.cgroup_parent = self
                .config
                .get_cgroup_driver()
                .expected_cgroup_parent(&linux.cgroup_parent);
            host.sysctls = linux.sysctls.clone();

            if let Some(context) = &linux.security_context {
                let container_context = sandbox_container_context(context);
                apply_container_security_context(
                    Some(&container_context),
                    &mut create,
                    &mut host,
                    separator,
                )?;
                seccomp = SecurityProfile::resolve(
                    context.seccomp.as_ref(),
                    &context.seccomp_profile_path,
                )?;
                privileged = context.privileged;
            }
        }

        let seccomp_opts = load_seccomp_security_opts(seccomp.as_ref(), privileged).await?;
        host.security_opt
            .extend(format_security_opts(&seccomp_opts, separator));

        let (exposed_ports, port_bindings) = make_port_bindings(&config.port_mappings);
        create.exposed_ports = exposed_ports;
        host.port_bindings = port_bindings;

        host.oom_score_adj = DEFAULT_SANDBOX_OOM_SCORE_ADJ;
        host.resources.cpu_shares = DEFAULT_SANDBOX_CPU_SHARES;
        host.resources.memory_swap = *self.config.get_default_memory_swap();

        Ok(CreateContainerRequest::builder()
            .name(make_sandbox_name(&config.metadata))
            .config(create)
            .host_config(host)
            .build())
    }

    async fn inspect_sandbox_identity(&self, sandbox_id: &str) -> ShimResult<SandboxIdentity> {
        let record = self.engine.inspect_container(sandbox_id).await?;
        let metadata = parse_sandbox_name(record.trimmed_name())?;

        Ok(SandboxIdentity {
            name: metadata.name,
            namespace: metadata.namespace,
            host_network: record.host_config.network_mode == NAMESPACE_MODE_HOST,
        })
    }

    /// Falls back to the checkpoint for the identity of a sandbox whose record is unavailable.
    async fn checkpoint_identity(
        &self,
        sandbox_id: &str,
        inspect_error: ShimError,
    ) -> ShimResult<SandboxIdentity> {
        let checkpoint_error = match self.checkpoints.get_checkpoint(sandbox_id).await {
            Ok(checkpoint) => {
                return Ok(SandboxIdentity {
                    name: checkpoint.get_name().clone(),
                    namespace: checkpoint.get_namespace().clone(),
                    host_network: checkpoint.is_host_network(),
                });
            }
            Err(e) => e,
        };

        if !checkpoint_error.is_not_found() {
            tracing::warn!(
                "removing unusable checkpoint of sandbox {}: {}",
                sandbox_id,
                checkpoint_error
            );
            if let Err(e) = self.checkpoints.remove_checkpoint(sandbox_id).await {
                tracing::warn!("failed to remove checkpoint of sandbox {}: {}", sandbox_id, e);
            }
        }

        if inspect_error.is_container_not_found() {
            tracing::warn!(
                "both sandbox container and checkpoint of {} are gone, stopping by id only",
                sandbox_id
            );
            return Ok(SandboxIdentity::default());
        }

        let mut errors = AggregateError::new();
        errors.push(inspect_error);
        errors.push(checkpoint_error);
        Err(ShimError::Aggregate(errors))
    }

    async fn pod_network_status(
        &self,
        record: &ContainerJson,
        metadata: &PodSandboxMetadata,
        ready: Option<bool>,
    ) -> Option<PodSandboxNetworkStatus> {
        if record.host_config.network_mode == NAMESPACE_MODE_HOST || ready == Some(false) {
            return None;
        }

        let plugin_status = self
            .network
            .get_pod_network_status(
                &metadata.namespace,
                &metadata.name,
                &ContainerId::docker(&record.id),
            )
            .await;

        let ips: Vec<String> = match plugin_status {
            Ok(Some(status)) if !status.ips.is_empty() => {
                status.ips.iter().map(IpAddr::to_string).collect()
            }
            Ok(_) => engine_ips(record),
            Err(e) => {
                tracing::warn!("failed to read network status of sandbox {}: {}", record.id, e);
                engine_ips(record)
            }
        };

        let mut ips = ips.into_iter();
        let ip = ips.next()?;
        Some(PodSandboxNetworkStatus {
            ip,
            additional_ips: ips.collect(),
        })
    }

    async fn checkpointed_sandboxes(
        &self,
        seen: &HashSet<String>,
        id_filter: Option<&str>,
    ) -> ShimResult<Vec<PodSandbox>> {
        let mut sandboxes = Vec::new();
        for key in self.checkpoints.list_checkpoints().await? {
            if seen.contains(&key) || id_filter.is_some_and(|id| !key.starts_with(id)) {
                continue;
            }

            let checkpoint = match self.checkpoints.get_checkpoint(&key).await {
                Ok(checkpoint) => checkpoint,
                Err(e) => {
                    tracing::warn!("skipping checkpoint of sandbox {}: {}", key, e);
                    if e.is_corrupt_checkpoint() {
                        if let Err(e) = self.checkpoints.remove_checkpoint(&key).await {
                            tracing::warn!("failed to remove checkpoint of sandbox {}: {}", key, e);
                        }
                    }
                    continue;
                }
            };

            let state = SandboxState::observe(None, self.network_ready.get(&key).await, true);
            sandboxes.push(PodSandbox {
                id: key,
                metadata: PodSandboxMetadata {
                    name: checkpoint.get_name().clone(),
                    namespace: checkpoint.get_namespace().clone(),
                    ..Default::default()
                },
                state: state.to_cri(),
                ..Default::default()
            });
        }

        Ok(sandboxes)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Translates port mappings into exposed ports and host port bindings.
///
/// Mappings without a host port are not published. Several host ports may map to one
/// container port.
fn make_port_bindings(
    mappings: &[PortMapping],
) -> (
    BTreeMap<String, HashMap<String, String>>,
    BTreeMap<String, Vec<PortBinding>>,
) {
    let mut exposed = BTreeMap::new();
    let mut bindings: BTreeMap<String, Vec<PortBinding>> = BTreeMap::new();

    for mapping in mappings.iter().filter(|m| m.host_port != 0) {
        let port = format!("{}/{}", mapping.container_port, mapping.protocol.engine_name());
        exposed.insert(port.clone(), HashMap::new());
        bindings.entry(port).or_default().push(PortBinding {
            host_ip: mapping.host_ip.clone(),
            host_port: mapping.host_port.to_string(),
        });
    }

    (exposed, bindings)
}

fn engine_ips(record: &ContainerJson) -> Vec<String> {
    [
        &record.network_settings.ip_address,
        &record.network_settings.global_ipv6_address,
    ]
    .into_iter()
    .filter(|ip| !ip.is_empty())
    .cloned()
    .collect()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::{CgroupDriver, ShimConfig},
        cri::{
            LinuxPodSandboxConfig, LinuxSandboxSecurityContext, NamespaceMode, NamespaceOption,
            Protocol,
        },
        engine::MemoryEngine,
    };

    async fn service(dir: &std::path::Path, driver: CgroupDriver) -> anyhow::Result<ShimService> {
        let config = ShimConfig::builder()
            .root_dir(dir)
            .cgroup_driver(driver)
            .build();
        Ok(ShimService::builder(config)
            .engine(Arc::new(MemoryEngine::new()))
            .build()
            .await?)
    }

    #[test]
    fn test_make_port_bindings() {
        let mappings = vec![
            PortMapping::builder().container_port(80).host_port(8080).build(),
            PortMapping::builder().container_port(80).host_port(8081).build(),
            PortMapping::builder()
                .protocol(Protocol::Udp)
                .container_port(53)
                .host_port(5353)
                .host_ip("127.0.0.1")
                .build(),
            PortMapping::builder().container_port(9090).build(),
        ];

        let (exposed, bindings) = make_port_bindings(&mappings);
        assert_eq!(
            exposed.keys().collect::<Vec<_>>(),
            vec!["53/udp", "80/tcp"]
        );
        assert_eq!(bindings["80/tcp"].len(), 2);
        assert_eq!(bindings["80/tcp"][1].host_port, "8081");
        assert_eq!(bindings["53/udp"][0].host_ip, "127.0.0.1");
    }

    #[test_log::test(tokio::test)]
    async fn test_make_sandbox_request() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = service(dir.path(), CgroupDriver::Systemd).await?;

        let config = PodSandboxConfig::builder()
            .metadata(PodSandboxMetadata::new("web", "prod", "uid-7", 1))
            .hostname("web-0")
            .labels(HashMap::from([("app".to_string(), "web".to_string())]))
            .annotations(HashMap::from([("owner".to_string(), "team".to_string())]))
            .linux(
                LinuxPodSandboxConfig::builder()
                    .cgroup_parent("/kubepods.slice/kubepods-besteffort.slice")
                    .sysctls(HashMap::from([(
                        "net.ipv4.ip_forward".to_string(),
                        "1".to_string(),
                    )]))
                    .security_context(
                        LinuxSandboxSecurityContext::builder()
                            .namespace_options(
                                NamespaceOption::builder().pid(NamespaceMode::Node).build(),
                            )
                            .seccomp(SecurityProfile::runtime_default())
                            .build(),
                    )
                    .build(),
            )
            .build();

        let request = service.make_sandbox_request(&config).await?;
        assert_eq!(request.name, "k8s_POD_web_prod_uid-7_1");
        assert_eq!(request.config.hostname, "web-0");
        assert_eq!(request.config.image, "registry.k8s.io/pause:3.9");
        assert_eq!(request.config.labels["io.kubernetes.docker.type"], "podsandbox");
        assert_eq!(request.config.labels["io.kubernetes.container.name"], "POD");
        assert_eq!(request.config.labels["annotation.owner"], "team");
        assert_eq!(request.config.labels["app"], "web");

        let host = &request.host_config;
        assert_eq!(host.cgroup_parent, "kubepods-besteffort.slice");
        assert_eq!(host.sysctls["net.ipv4.ip_forward"], "1");
        assert_eq!(host.network_mode, "default");
        assert_eq!(host.pid_mode, "host");
        assert_eq!(host.ipc_mode, "shareable");
        assert_eq!(host.oom_score_adj, -998);
        assert_eq!(host.resources.cpu_shares, 2);
        assert!(host.security_opt.is_empty());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_sandbox_without_security_context_is_unconfined() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = service(dir.path(), CgroupDriver::Cgroupfs).await?;

        let config = PodSandboxConfig::builder()
            .metadata(PodSandboxMetadata::new("web", "prod", "uid-7", 0))
            .build();

        let request = service.make_sandbox_request(&config).await?;
        assert_eq!(request.host_config.security_opt, vec!["seccomp=unconfined"]);
        assert_eq!(request.host_config.cgroup_parent, "");

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_run_pod_sandbox_rejects_unknown_runtime_handler() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = service(dir.path(), CgroupDriver::Cgroupfs).await?;

        let config = PodSandboxConfig::builder()
            .metadata(PodSandboxMetadata::new("web", "prod", "uid-7", 0))
            .build();

        assert!(matches!(
            service.run_pod_sandbox(&config, "kata").await,
            Err(ShimError::InvalidArgument(_))
        ));
        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_run_pod_sandbox_pulls_missing_image() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = service(dir.path(), CgroupDriver::Cgroupfs).await?;

        let config = PodSandboxConfig::builder()
            .metadata(PodSandboxMetadata::new("web", "prod", "uid-7", 0))
            .build();

        let id = service.run_pod_sandbox(&config, "").await?;
        assert_eq!(service.network_ready().get(&id).await, Some(true));

        let status = service.pod_sandbox_status(&id).await?;
        assert_eq!(status.state, PodSandboxState::SandboxReady);
        assert_eq!(status.metadata, config.metadata);

        Ok(())
    }
}
