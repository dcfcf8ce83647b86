use std::sync::LazyLock;

use regex::Regex;

use crate::{
    engine::{
        ContainerCreateResponse, CreateContainerRequest, EngineClient, EngineError,
        RemoveContainerOptions,
    },
    ShimResult,
};

use super::randomize_name;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Matches the engine error of a create whose name is taken, capturing the id of the holder.
static CONFLICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Conflict\. (?:.)+ is already in use by container "?([0-9a-z]+)"?"#).unwrap()
});

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the id of the container holding the requested name, if `error` is a name conflict.
pub fn conflicting_container_id(error: &EngineError) -> Option<String> {
    let EngineError::Conflict(message) = error else {
        return None;
    };

    CONFLICT_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Creates a container, recovering once from a name conflict.
///
/// A leftover container holding the name is removed and the create is retried under a
/// randomized name. If the leftover cannot be removed the original conflict is returned.
pub async fn create_with_conflict_recovery(
    engine: &dyn EngineClient,
    request: &CreateContainerRequest,
) -> ShimResult<ContainerCreateResponse> {
    let error = match engine.create_container(request).await {
        Ok(response) => return Ok(response),
        Err(error) => error,
    };

    let Some(conflicting_id) = conflicting_container_id(&error) else {
        return Err(error.into());
    };

    tracing::warn!(
        "container name {} is already in use by {}, removing it",
        request.name,
        conflicting_id
    );

    let options = RemoveContainerOptions {
        force: false,
        remove_volumes: true,
    };
    match engine.remove_container(&conflicting_id, &options).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => {
            tracing::error!(
                "failed to remove conflicting container {}: {}",
                conflicting_id,
                e
            );
            return Err(error.into());
        }
    }

    let mut retry = request.clone();
    retry.name = randomize_name(&request.name);
    tracing::info!("retrying create of {} as {}", request.name, retry.name);

    Ok(engine.create_container(&retry).await?)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{ContainerCreateConfig, MemoryEngine, Operation},
        ShimError,
    };

    async fn request(engine: &MemoryEngine, name: &str) -> CreateContainerRequest {
        engine.add_image("busybox").await;
        CreateContainerRequest::builder()
            .name(name)
            .config(ContainerCreateConfig {
                image: "busybox".to_string(),
                ..Default::default()
            })
            .build()
    }

    #[test]
    fn test_conflicting_container_id() {
        let error = EngineError::Conflict(
            "Conflict. The container name \"/k8s_POD_a_b_c_0\" is already in use by container \
             \"8f3c9a\". You have to remove (or rename) that container."
                .to_string(),
        );
        assert_eq!(conflicting_container_id(&error), Some("8f3c9a".to_string()));

        let unquoted = EngineError::Conflict(
            "Conflict. The name k8s_x is already in use by container 1234abcd".to_string(),
        );
        assert_eq!(conflicting_container_id(&unquoted), Some("1234abcd".to_string()));

        assert_eq!(
            conflicting_container_id(&EngineError::Conflict("removal in progress".into())),
            None
        );
        assert_eq!(
            conflicting_container_id(&EngineError::ContainerNotFound("x".into())),
            None
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_conflict_recovery_retries_with_random_name() -> anyhow::Result<()> {
        let engine = MemoryEngine::new();
        let request = request(&engine, "k8s_app_pod_ns_uid_0").await;

        let first = create_with_conflict_recovery(&engine, &request).await?;
        let second = create_with_conflict_recovery(&engine, &request).await?;

        assert_ne!(first.id, second.id);
        assert!(engine.container(&first.id).await.is_none());

        let record = engine.container(&second.id).await.unwrap();
        assert!(record.trimmed_name().starts_with("k8s_app_pod_ns_uid_0_"));
        assert_eq!(engine.call_targets(Operation::RemoveContainer).await, vec![first.id]);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_conflict_recovery_returns_original_error() -> anyhow::Result<()> {
        let engine = MemoryEngine::new();
        let request = request(&engine, "k8s_app_pod_ns_uid_0").await;
        create_with_conflict_recovery(&engine, &request).await?;

        engine
            .fail(
                Operation::RemoveContainer,
                EngineError::Api {
                    status: 500,
                    message: "device busy".into(),
                },
            )
            .await;

        let err = create_with_conflict_recovery(&engine, &request).await.unwrap_err();
        assert!(matches!(err, ShimError::Engine(EngineError::Conflict(_))));
        assert_eq!(engine.container_ids().await.len(), 1);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_conflict_recovery_tolerates_vanished_holder() -> anyhow::Result<()> {
        let engine = MemoryEngine::new();
        let request = request(&engine, "k8s_app_pod_ns_uid_0").await;
        create_with_conflict_recovery(&engine, &request).await?;

        engine
            .fail(
                Operation::RemoveContainer,
                EngineError::ContainerNotFound("gone".into()),
            )
            .await;

        create_with_conflict_recovery(&engine, &request).await?;
        assert_eq!(engine.container_ids().await.len(), 2);

        Ok(())
    }
}
