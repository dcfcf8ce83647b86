use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    config::{CRI_API_VERSION, RUNTIME_NAME},
    cri::{
        AttachRequest, ExecRequest, ExecSyncResponse, PortForwardRequest, RuntimeCondition,
        RuntimeHandler, RuntimeHandlerFeatures, StatusResponse, StreamingResponse,
        VersionResponse, NETWORK_READY, RUNTIME_READY,
    },
    engine::{ContainerJson, ExecConfig, ExecStartOptions},
    network::{POD_CIDR_CHANGE_EVENT, POD_CIDR_DETAIL},
    ShimError, ShimResult,
};

use super::{ShimService, StreamingServer};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// How often a finished exec is inspected before its exit code is given up on.
const EXEC_INSPECT_ATTEMPTS: usize = 5;

/// The pause between two inspections of a finished exec.
const EXEC_INSPECT_INTERVAL: Duration = Duration::from_millis(100);

/// The reason reported when the engine does not answer.
const REASON_ENGINE_NOT_READY: &str = "DockerDaemonNotReady";

/// The reason reported when the network plugin is not ready.
const REASON_NETWORK_PLUGIN_NOT_READY: &str = "NetworkPluginNotReady";

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ShimService {
    /// Returns the runtime name and version along with the engine API version.
    pub async fn version(&self) -> ShimResult<VersionResponse> {
        let version = self.engine_info.version().await?;
        Ok(VersionResponse {
            version: CRI_API_VERSION.to_string(),
            runtime_name: RUNTIME_NAME.to_string(),
            runtime_version: version.version,
            runtime_api_version: version.api_version,
        })
    }

    /// Reports whether the engine and the network plugin are ready.
    ///
    /// Failures are reported as unmet conditions, never as errors.
    pub async fn status(&self) -> ShimResult<StatusResponse> {
        let runtime = match self.engine_info.version().await {
            Ok(_) => RuntimeCondition::ready(RUNTIME_READY),
            Err(e) => {
                tracing::warn!("engine is not ready: {}", e);
                RuntimeCondition::not_ready(
                    RUNTIME_READY,
                    REASON_ENGINE_NOT_READY,
                    format!("engine is not responding: {}", e),
                )
            }
        };

        let network = match self.network.status().await {
            Ok(()) => RuntimeCondition::ready(NETWORK_READY),
            Err(e) => {
                tracing::warn!("network plugin {} is not ready: {}", self.network.name(), e);
                RuntimeCondition::not_ready(
                    NETWORK_READY,
                    REASON_NETWORK_PLUGIN_NOT_READY,
                    format!("network plugin returned error: {}", e),
                )
            }
        };

        let recursive_read_only_mounts = self
            .engine_info
            .supports_recursive_read_only()
            .await
            .unwrap_or_else(|e| {
                tracing::debug!("cannot determine recursive read only support: {}", e);
                false
            });

        Ok(StatusResponse {
            conditions: vec![runtime, network],
            runtime_handlers: vec![RuntimeHandler {
                name: String::new(),
                features: RuntimeHandlerFeatures {
                    recursive_read_only_mounts,
                    user_namespaces: false,
                },
            }],
        })
    }

    /// Forwards a pod CIDR change to the network plugin. An empty CIDR is ignored.
    pub async fn update_runtime_config(&self, pod_cidr: &str) -> ShimResult<()> {
        if pod_cidr.is_empty() {
            return Ok(());
        }

        tracing::info!("pod cidr changed to {}", pod_cidr);
        let details = HashMap::from([(POD_CIDR_DETAIL.to_string(), pod_cidr.to_string())]);
        self.network.event(POD_CIDR_CHANGE_EVENT, &details).await;
        Ok(())
    }

    /// Runs a command in a container and waits for it to finish.
    ///
    /// A command still running when `timeout` elapses fails with
    /// [`ShimError::DeadlineExceeded`], which callers must not confuse with a non-zero exit.
    pub async fn exec_sync(
        &self,
        container_id: &str,
        cmd: &[String],
        timeout: Option<Duration>,
    ) -> ShimResult<ExecSyncResponse> {
        if cmd.is_empty() {
            return Err(ShimError::InvalidArgument("exec requires a command".to_string()));
        }
        self.running_container(container_id).await?;

        let config = ExecConfig {
            cmd: cmd.to_vec(),
            attach_stdout: true,
            attach_stderr: true,
            ..Default::default()
        };
        let exec_id = self.engine.create_exec(container_id, &config).await?;
        tracing::debug!("created exec {} in container {}: {:?}", exec_id, container_id, cmd);

        let start_options = ExecStartOptions::default();
        let start = self.engine.start_exec(&exec_id, &start_options);
        let output = match timeout.filter(|t| !t.is_zero()) {
            Some(timeout) => tokio::time::timeout(timeout, start).await.map_err(|_| {
                ShimError::DeadlineExceeded(format!(
                    "command {:?} in container {} timed out after {:?}",
                    cmd, container_id, timeout
                ))
            })??,
            None => start.await?,
        };

        let exit_code = self.wait_exec_exit(&exec_id).await?;
        Ok(ExecSyncResponse {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
        })
    }

    /// Prepares a streaming exec session in a running container.
    pub async fn exec(&self, request: &ExecRequest) -> ShimResult<StreamingResponse> {
        let streaming = self.streaming_server()?;
        if request.cmd.is_empty() {
            return Err(ShimError::InvalidArgument("exec requires a command".to_string()));
        }
        if !(request.stdin || request.stdout || request.stderr) {
            return Err(ShimError::InvalidArgument(
                "exec requires one of stdin, stdout or stderr".to_string(),
            ));
        }

        self.running_container(&request.container_id).await?;
        streaming.get_exec(request).await
    }

    /// Prepares a streaming attach session to a running container.
    pub async fn attach(&self, request: &AttachRequest) -> ShimResult<StreamingResponse> {
        let streaming = self.streaming_server()?;
        if !(request.stdin || request.stdout || request.stderr) {
            return Err(ShimError::InvalidArgument(
                "attach requires one of stdin, stdout or stderr".to_string(),
            ));
        }

        self.running_container(&request.container_id).await?;
        streaming.get_attach(request).await
    }

    /// Prepares a port forward session into a sandbox.
    pub async fn port_forward(&self, request: &PortForwardRequest) -> ShimResult<StreamingResponse> {
        let streaming = self.streaming_server()?;
        if let Some(port) = request.port.iter().find(|p| !(1..=65535).contains(*p)) {
            return Err(ShimError::InvalidArgument(format!("invalid port {}", port)));
        }

        self.engine.inspect_container(&request.pod_sandbox_id).await?;
        streaming.get_port_forward(request).await
    }

    fn streaming_server(&self) -> ShimResult<&Arc<dyn StreamingServer>> {
        self.streaming.as_ref().ok_or(ShimError::StreamingUnavailable)
    }

    async fn running_container(&self, container_id: &str) -> ShimResult<ContainerJson> {
        let record = self.engine.inspect_container(container_id).await?;
        if !record.state.running {
            return Err(ShimError::ContainerNotRunning(container_id.to_string()));
        }
        Ok(record)
    }

    /// Waits for the engine to publish the exit code of a finished exec.
    async fn wait_exec_exit(&self, exec_id: &str) -> ShimResult<i32> {
        for attempt in 1..=EXEC_INSPECT_ATTEMPTS {
            let inspect = self.engine.inspect_exec(exec_id).await?;
            if let (false, Some(exit_code)) = (inspect.running, inspect.exit_code) {
                return Ok(exit_code);
            }

            tracing::trace!("exec {} has not exited yet (attempt {})", exec_id, attempt);
            tokio::time::sleep(EXEC_INSPECT_INTERVAL).await;
        }

        Err(ShimError::custom(anyhow::anyhow!(
            "exec {} did not report an exit code after {} attempts",
            exec_id,
            EXEC_INSPECT_ATTEMPTS
        )))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ShimConfig,
        engine::{
            ContainerCreateConfig, CreateContainerRequest, EngineClient, EngineError, ExecScript,
            MemoryEngine, Operation,
        },
        service::TokenStreamingServer,
    };

    async fn service_with(
        dir: &std::path::Path,
        engine: &MemoryEngine,
        streaming: bool,
    ) -> anyhow::Result<ShimService> {
        let config = ShimConfig::builder().root_dir(dir).build();
        let mut builder = ShimService::builder(config).engine(Arc::new(engine.clone()));
        if streaming {
            builder = builder.streaming(Arc::new(TokenStreamingServer::new("http://127.0.0.1:10010")?));
        }
        Ok(builder.build().await?)
    }

    async fn running(engine: &MemoryEngine) -> anyhow::Result<String> {
        engine.add_image("busybox").await;
        let response = engine
            .create_container(
                &CreateContainerRequest::builder()
                    .name("app")
                    .config(ContainerCreateConfig {
                        image: "busybox".to_string(),
                        ..Default::default()
                    })
                    .build(),
            )
            .await?;
        engine.start_container(&response.id).await?;
        Ok(response.id)
    }

    #[test_log::test(tokio::test)]
    async fn test_version_and_status() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = MemoryEngine::new();
        let service = service_with(dir.path(), &engine, false).await?;

        let version = service.version().await?;
        assert_eq!(version.runtime_name, "docker");
        assert_eq!(version.runtime_version, "24.0.7");
        assert_eq!(version.runtime_api_version, "1.43");

        let status = service.status().await?;
        assert!(status.condition(RUNTIME_READY).is_some_and(|c| c.status));
        assert!(status.condition(NETWORK_READY).is_some_and(|c| c.status));
        assert!(!status.runtime_handlers[0].features.recursive_read_only_mounts);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_status_reports_engine_failure() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = MemoryEngine::new();
        engine
            .fail(Operation::Version, EngineError::Connection("refused".to_string()))
            .await;
        let service = service_with(dir.path(), &engine, false).await?;

        let status = service.status().await?;
        let runtime = status.condition(RUNTIME_READY).expect("runtime condition");
        assert!(!runtime.status);
        assert_eq!(runtime.reason, "DockerDaemonNotReady");

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_exec_sync() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = MemoryEngine::new();
        let id = running(&engine).await?;
        engine
            .script_exec(
                "false",
                ExecScript {
                    stderr: b"nope".to_vec(),
                    exit_code: 1,
                    ..Default::default()
                },
            )
            .await;
        let service = service_with(dir.path(), &engine, false).await?;

        let response = service
            .exec_sync(&id, &["false".to_string()], Some(Duration::from_secs(5)))
            .await?;
        assert_eq!(response.exit_code, 1);
        assert_eq!(response.stderr, b"nope");

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_exec_sync_deadline_exceeded() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = MemoryEngine::new();
        let id = running(&engine).await?;
        engine
            .script_exec(
                "sleep",
                ExecScript {
                    duration: Duration::from_secs(10),
                    ..Default::default()
                },
            )
            .await;
        let service = service_with(dir.path(), &engine, false).await?;

        let error = service
            .exec_sync(&id, &["sleep".to_string()], Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(error, ShimError::DeadlineExceeded(_)));
        assert!(error.is_timeout());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_streaming_requests() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = MemoryEngine::new();
        let id = running(&engine).await?;

        let without = service_with(dir.path(), &engine, false).await?;
        let request = ExecRequest::builder()
            .container_id(id.as_str())
            .cmd(vec!["sh".to_string()])
            .build();
        assert!(matches!(
            without.exec(&request).await,
            Err(ShimError::StreamingUnavailable)
        ));

        let service = service_with(dir.path(), &engine, true).await?;
        let response = service.exec(&request).await?;
        assert!(response.url.starts_with("http://127.0.0.1:10010/exec/"));

        let response = service
            .attach(&AttachRequest::builder().container_id(id.as_str()).build())
            .await?;
        assert!(response.url.contains("/attach/"));

        engine.stop_container(&id, Duration::ZERO).await?;
        assert!(matches!(
            service.exec(&request).await,
            Err(ShimError::ContainerNotRunning(_))
        ));

        let error = service
            .port_forward(&PortForwardRequest::builder().pod_sandbox_id("missing").port(vec![80]).build())
            .await
            .unwrap_err();
        assert!(error.is_not_found());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_update_runtime_config_ignores_empty_cidr() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let service = service_with(dir.path(), &MemoryEngine::new(), false).await?;

        service.update_runtime_config("").await?;
        service.update_runtime_config("10.244.0.0/24").await?;

        Ok(())
    }
}
