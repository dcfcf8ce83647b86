use std::{collections::HashMap, path::Path, sync::Arc};

use chrono::Utc;
use crishim::{
    config::ShimConfig,
    cri::{
        ContainerConfig, ContainerFilter, ContainerMetadata, ContainerState, ImageSpec,
        LinuxContainerConfig, LinuxContainerResources, LinuxContainerSecurityContext,
        NamespaceMode, NamespaceOption, PodSandboxConfig, PodSandboxMetadata, SecurityProfile,
    },
    engine::{EngineError, MemoryEngine, Operation},
    service::{ShimService, CREDENTIAL_SPEC_ANNOTATION},
    ShimError,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const SECCOMP_PROFILE: &str = r#"{
    "defaultAction": "SCMP_ACT_ERRNO",
    "architectures": ["SCMP_ARCH_X86_64"],
    "syscalls": [
        {"names": ["sethostname", "setdomainname"], "action": "SCMP_ACT_ERRNO"},
        {"names": ["sethostname"], "action": "SCMP_ACT_KILL"},
        {"names": ["read", "write", "sethostname"], "action": "SCMP_ACT_ALLOW"}
    ]
}"#;

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test_log::test(tokio::test)]
async fn test_container_create_start_remove() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log_dir = dir.path().join("pods");
    tokio::fs::create_dir_all(&log_dir).await?;

    let engine = MemoryEngine::with_log_root(dir.path().join("engine"));
    engine.add_image("busybox").await;
    let service = service(dir.path(), &engine).await?;

    let mut sandbox = sandbox_config();
    sandbox.log_directory = log_dir.to_string_lossy().into_owned();
    let sandbox_id = service.run_pod_sandbox(&sandbox, "").await?;

    let mut config = container_config("app");
    config.log_path = "app_0.log".to_string();
    config
        .annotations
        .insert(CREDENTIAL_SPEC_ANNOTATION.to_string(), r#"{"CmsPlugins":["ActiveDirectory"]}"#.to_string());

    let id = service.create_container(&sandbox_id, &config, &sandbox).await?;
    let record = engine.container(&id).await.expect("container");
    assert_eq!(record.name, "/k8s_app_web_prod_uid-web_0");
    assert!(record
        .host_config
        .security_opt
        .iter()
        .any(|opt| opt.starts_with("credentialspec=file://")));
    assert_eq!(credential_specs(&service).await?, 1);

    let status = service.container_status(&id).await?;
    assert_eq!(status.state, ContainerState::ContainerCreated);
    assert_eq!(status.metadata, config.metadata);
    assert!(status.image_ref.starts_with("docker://sha256:"));

    service.start_container(&id).await?;
    let link = log_dir.join("app_0.log");
    assert_eq!(tokio::fs::read_link(&link).await?, Path::new(&record.log_path));

    let status = service.container_status(&id).await?;
    assert_eq!(status.state, ContainerState::ContainerRunning);
    assert_eq!(status.log_path, link.to_string_lossy());
    assert_ne!(status.started_at, 0);

    service.stop_container(&id, 10).await?;
    let status = service.container_status(&id).await?;
    assert_eq!(status.state, ContainerState::ContainerExited);
    assert_eq!(status.reason, "Completed");

    service.remove_container(&id).await?;
    assert!(engine.container(&id).await.is_none());
    assert!(tokio::fs::symlink_metadata(&link).await.is_err());
    assert_eq!(credential_specs(&service).await?, 0);

    // Removing a container that is already gone succeeds.
    service.remove_container(&id).await?;

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_container_status_reports_oom_kill() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = MemoryEngine::new();
    engine.add_image("busybox").await;
    let service = service(dir.path(), &engine).await?;

    let sandbox = sandbox_config();
    let sandbox_id = service.run_pod_sandbox(&sandbox, "").await?;
    let id = service
        .create_container(&sandbox_id, &container_config("app"), &sandbox)
        .await?;
    service.start_container(&id).await?;

    engine
        .update_record(&id, |record| {
            record.state.running = false;
            record.state.status = "exited".to_string();
            record.state.oom_killed = true;
            record.state.exit_code = 137;
            record.state.error = "container ran out of memory".to_string();
            record.state.finished_at = Some(Utc::now());
        })
        .await?;

    let status = service.container_status(&id).await?;
    assert_eq!(status.state, ContainerState::ContainerExited);
    assert_eq!(status.exit_code, 137);
    assert_eq!(status.reason, "OOMKilled");
    assert_ne!(status.finished_at, 0);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_container_namespaces_join_sandbox() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = MemoryEngine::new();
    engine.add_image("busybox").await;
    let service = service(dir.path(), &engine).await?;

    let sandbox = sandbox_config();
    let sandbox_id = service.run_pod_sandbox(&sandbox, "").await?;
    let joined = format!("container:{}", sandbox_id);

    let id = service
        .create_container(&sandbox_id, &container_config("shared"), &sandbox)
        .await?;
    let host = engine.container(&id).await.expect("container").host_config;
    assert_eq!(host.network_mode, joined);
    assert_eq!(host.ipc_mode, joined);
    assert_eq!(host.pid_mode, joined);
    assert_eq!(host.uts_mode, "");

    let mut config = container_config("private");
    config.linux = Some(
        LinuxContainerConfig::builder()
            .security_context(
                LinuxContainerSecurityContext::builder()
                    .namespace_options(
                        NamespaceOption::builder()
                            .pid(NamespaceMode::Target)
                            .target_id("debuggee")
                            .build(),
                    )
                    .build(),
            )
            .build(),
    );
    let id = service.create_container(&sandbox_id, &config, &sandbox).await?;
    let host = engine.container(&id).await.expect("container").host_config;
    assert_eq!(host.network_mode, joined);
    assert_eq!(host.pid_mode, "container:debuggee");

    let mut config = container_config("broken");
    config.linux = Some(
        LinuxContainerConfig::builder()
            .security_context(
                LinuxContainerSecurityContext::builder()
                    .namespace_options(NamespaceOption::builder().pid(NamespaceMode::Target).build())
                    .build(),
            )
            .build(),
    );
    assert!(matches!(
        service.create_container(&sandbox_id, &config, &sandbox).await,
        Err(ShimError::InvalidArgument(_))
    ));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_privileged_container_may_set_hostname() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let profile_path = dir.path().join("profile.json");
    tokio::fs::write(&profile_path, SECCOMP_PROFILE).await?;
    let profile = SecurityProfile::localhost(profile_path.to_string_lossy());

    let engine = MemoryEngine::new();
    engine.add_image("busybox").await;
    let service = service(dir.path(), &engine).await?;

    let sandbox = sandbox_config();
    let sandbox_id = service.run_pod_sandbox(&sandbox, "").await?;

    for privileged in [false, true] {
        let mut config = container_config(if privileged { "privileged" } else { "confined" });
        config.linux = Some(
            LinuxContainerConfig::builder()
                .security_context(
                    LinuxContainerSecurityContext::builder()
                        .privileged(privileged)
                        .seccomp(profile.clone())
                        .build(),
                )
                .build(),
        );

        let id = service.create_container(&sandbox_id, &config, &sandbox).await?;
        let host = engine.container(&id).await.expect("container").host_config;
        assert_eq!(host.privileged, privileged);

        let seccomp = host
            .security_opt
            .iter()
            .find_map(|opt| opt.strip_prefix("seccomp="))
            .expect("seccomp option");
        let document: serde_json::Value = serde_json::from_str(seccomp)?;
        let rules = document["syscalls"].as_array().expect("syscall rules");

        if privileged {
            assert_eq!(rules.len(), 2);
            assert_eq!(rules[0]["names"], serde_json::json!(["setdomainname"]));
            assert_eq!(rules[1]["action"], "SCMP_ACT_ALLOW");
            assert_eq!(
                rules[1]["names"],
                serde_json::json!(["read", "write", "sethostname"])
            );
        } else {
            assert_eq!(rules.len(), 3);
        }
        assert_eq!(document["architectures"], serde_json::json!(["SCMP_ARCH_X86_64"]));
    }

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_list_containers_and_update_resources() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = MemoryEngine::new();
    engine.add_image("busybox").await;
    let service = service(dir.path(), &engine).await?;

    let sandbox = sandbox_config();
    let sandbox_id = service.run_pod_sandbox(&sandbox, "").await?;
    let running = service
        .create_container(&sandbox_id, &container_config("running"), &sandbox)
        .await?;
    service.start_container(&running).await?;
    let created = service
        .create_container(&sandbox_id, &container_config("created"), &sandbox)
        .await?;

    let all = service.list_containers(None).await?;
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|c| c.pod_sandbox_id == sandbox_id));

    let filter = ContainerFilter::builder()
        .state(ContainerState::ContainerRunning)
        .build();
    let listed = service.list_containers(Some(&filter)).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, running);
    assert_eq!(listed[0].metadata.name, "running");

    let filter = ContainerFilter::builder().pod_sandbox_id("elsewhere").build();
    assert!(service.list_containers(Some(&filter)).await?.is_empty());

    let resources = LinuxContainerResources::builder()
        .memory_limit_in_bytes(128 << 20)
        .cpu_shares(256)
        .build();
    service.update_container_resources(&created, &resources).await?;
    let record = engine.container(&created).await.expect("container");
    assert_eq!(record.host_config.resources.memory, 128 << 20);
    assert_eq!(record.host_config.resources.memory_swap, 128 << 20);
    assert_eq!(record.host_config.resources.cpu_shares, 256);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_container_create_failure_removes_credential_spec() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = MemoryEngine::new();
    engine.add_image("busybox").await;
    let service = service(dir.path(), &engine).await?;

    let sandbox = sandbox_config();
    let sandbox_id = service.run_pod_sandbox(&sandbox, "").await?;

    let mut config = container_config("app");
    config
        .annotations
        .insert(CREDENTIAL_SPEC_ANNOTATION.to_string(), r#"{"CmsPlugins":["ActiveDirectory"]}"#.to_string());

    engine
        .fail(
            Operation::CreateContainer,
            EngineError::Api {
                status: 500,
                message: "disk full".to_string(),
            },
        )
        .await;

    let error = service
        .create_container(&sandbox_id, &config, &sandbox)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        ShimError::Engine(EngineError::Api { status: 500, .. })
    ));
    assert_eq!(credential_specs(&service).await?, 0);

    // The next create writes a fresh credential spec and keeps it.
    let id = service.create_container(&sandbox_id, &config, &sandbox).await?;
    assert_eq!(credential_specs(&service).await?, 1);
    service.remove_container(&id).await?;
    assert_eq!(credential_specs(&service).await?, 0);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_container_start_failure_still_links_log() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let log_dir = dir.path().join("pods");
    tokio::fs::create_dir_all(&log_dir).await?;

    let engine = MemoryEngine::with_log_root(dir.path().join("engine"));
    engine.add_image("busybox").await;
    let service = service(dir.path(), &engine).await?;

    let mut sandbox = sandbox_config();
    sandbox.log_directory = log_dir.to_string_lossy().into_owned();
    let sandbox_id = service.run_pod_sandbox(&sandbox, "").await?;

    let mut config = container_config("app");
    config.log_path = "app_0.log".to_string();
    let id = service.create_container(&sandbox_id, &config, &sandbox).await?;

    engine
        .fail(
            Operation::StartContainer,
            EngineError::Api {
                status: 500,
                message: "oci runtime error".to_string(),
            },
        )
        .await;

    let error = service.start_container(&id).await.unwrap_err();
    assert!(matches!(
        error,
        ShimError::Engine(EngineError::Api { status: 500, .. })
    ));

    let record = engine.container(&id).await.expect("container");
    let link = log_dir.join("app_0.log");
    assert_eq!(tokio::fs::read_link(&link).await?, Path::new(&record.log_path));
    assert_eq!(
        service.container_status(&id).await?.state,
        ContainerState::ContainerCreated
    );

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_container_log_symlink_error_comes_before_start_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = MemoryEngine::with_log_root(dir.path().join("engine"));
    engine.add_image("busybox").await;
    let service = service(dir.path(), &engine).await?;

    // The log directory is never created, so the symlink cannot be made.
    let mut sandbox = sandbox_config();
    sandbox.log_directory = dir.path().join("missing").to_string_lossy().into_owned();
    let sandbox_id = service.run_pod_sandbox(&sandbox, "").await?;

    let mut config = container_config("app");
    config.log_path = "app_0.log".to_string();
    let id = service.create_container(&sandbox_id, &config, &sandbox).await?;

    engine
        .fail(
            Operation::StartContainer,
            EngineError::Api {
                status: 500,
                message: "oci runtime error".to_string(),
            },
        )
        .await;

    let error = service.start_container(&id).await.unwrap_err();
    assert!(matches!(error, ShimError::LogSymlink(_)));

    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_container_name_conflict_recovery() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = MemoryEngine::new();
    engine.add_image("busybox").await;
    let service = service(dir.path(), &engine).await?;

    let sandbox = sandbox_config();
    let sandbox_id = service.run_pod_sandbox(&sandbox, "").await?;
    let config = container_config("app");

    let first = service.create_container(&sandbox_id, &config, &sandbox).await?;

    // A created leftover holding the name is removed and the create retried under a new name.
    let second = service.create_container(&sandbox_id, &config, &sandbox).await?;
    assert_ne!(first, second);
    assert!(engine.container(&first).await.is_none());
    let record = engine.container(&second).await.expect("container");
    assert!(record.name.starts_with("/k8s_app_web_prod_uid-web_0_"));
    assert_eq!(service.container_status(&second).await?.metadata, config.metadata);

    // A running holder cannot be removed, so the conflict is returned.
    let third_config = container_config("worker");
    let running = service
        .create_container(&sandbox_id, &third_config, &sandbox)
        .await?;
    service.start_container(&running).await?;

    let error = service
        .create_container(&sandbox_id, &third_config, &sandbox)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        ShimError::Engine(EngineError::Conflict(ref message)) if message.contains(&running)
    ));
    assert!(engine.container(&running).await.is_some());

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

async fn service(dir: &Path, engine: &MemoryEngine) -> anyhow::Result<ShimService> {
    let config = ShimConfig::builder().root_dir(dir.join("state")).build();
    Ok(ShimService::builder(config)
        .engine(Arc::new(engine.clone()))
        .build()
        .await?)
}

fn sandbox_config() -> PodSandboxConfig {
    PodSandboxConfig::builder()
        .metadata(PodSandboxMetadata::new("web", "prod", "uid-web", 0))
        .build()
}

fn container_config(name: &str) -> ContainerConfig {
    ContainerConfig::builder()
        .metadata(ContainerMetadata::new(name, 0))
        .image(ImageSpec::builder().image("busybox").build())
        .command(vec!["sleep".to_string()])
        .args(vec!["3600".to_string()])
        .labels(HashMap::from([("tier".to_string(), "backend".to_string())]))
        .build()
}

async fn credential_specs(service: &ShimService) -> anyhow::Result<usize> {
    let dir = service.config().credential_spec_dir();
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut count = 0;
    while entries.next_entry().await?.is_some() {
        count += 1;
    }
    Ok(count)
}
