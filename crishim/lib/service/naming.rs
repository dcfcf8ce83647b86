use crate::{
    cri::{ContainerConfig, ContainerMetadata, PodSandboxConfig, PodSandboxMetadata},
    ShimError, ShimResult,
};

use super::POD_INFRA_CONTAINER_NAME;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The prefix of every engine container name the shim creates.
const KUBE_PREFIX: &str = "k8s";

/// The separator between the fields of an engine container name.
const NAME_DELIMITER: char = '_';

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the engine name of a sandbox, `k8s_POD_<name>_<namespace>_<uid>_<attempt>`.
pub fn make_sandbox_name(metadata: &PodSandboxMetadata) -> String {
    join_name(&[
        KUBE_PREFIX,
        POD_INFRA_CONTAINER_NAME,
        &metadata.name,
        &metadata.namespace,
        &metadata.uid,
        &metadata.attempt.to_string(),
    ])
}

/// Returns the engine name of a container,
/// `k8s_<container>_<pod>_<namespace>_<uid>_<attempt>`.
pub fn make_container_name(sandbox: &PodSandboxConfig, container: &ContainerConfig) -> String {
    join_name(&[
        KUBE_PREFIX,
        &container.metadata.name,
        &sandbox.metadata.name,
        &sandbox.metadata.namespace,
        &sandbox.metadata.uid,
        &container.metadata.attempt.to_string(),
    ])
}

/// Appends a random suffix so the name no longer collides with a leftover container.
pub fn randomize_name(name: &str) -> String {
    format!("{}{}{:08x}", name, NAME_DELIMITER, rand::random::<u32>())
}

/// Parses an engine sandbox name back into sandbox metadata.
pub fn parse_sandbox_name(name: &str) -> ShimResult<PodSandboxMetadata> {
    let parts = split_name(name)?;
    Ok(PodSandboxMetadata::new(
        parts[2],
        parts[3],
        parts[4],
        parse_attempt(name, parts[5])?,
    ))
}

/// Parses an engine container name back into container metadata.
pub fn parse_container_name(name: &str) -> ShimResult<ContainerMetadata> {
    let parts = split_name(name)?;
    Ok(ContainerMetadata::new(parts[1], parse_attempt(name, parts[5])?))
}

fn join_name(parts: &[&str]) -> String {
    parts.join(&NAME_DELIMITER.to_string())
}

/// Splits a name into its six fields, tolerating a random suffix and a leading `/`.
fn split_name(name: &str) -> ShimResult<Vec<&str>> {
    let parts: Vec<&str> = name
        .trim_start_matches('/')
        .split(NAME_DELIMITER)
        .collect();

    if !(parts.len() == 6 || parts.len() == 7) || parts[0] != KUBE_PREFIX {
        return Err(ShimError::InvalidArgument(format!(
            "failed to parse container name {:?}",
            name
        )));
    }

    Ok(parts)
}

fn parse_attempt(name: &str, attempt: &str) -> ShimResult<u32> {
    attempt.parse().map_err(|_| {
        ShimError::InvalidArgument(format!(
            "failed to parse attempt count {:?} of container name {:?}",
            attempt, name
        ))
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
