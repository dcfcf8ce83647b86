use std::collections::HashMap;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The label telling sandbox containers apart from workload containers.
pub const CONTAINER_TYPE_LABEL_KEY: &str = "io.kubernetes.docker.type";

/// The [`CONTAINER_TYPE_LABEL_KEY`] value of sandbox containers.
pub const CONTAINER_TYPE_LABEL_SANDBOX: &str = "podsandbox";

/// The [`CONTAINER_TYPE_LABEL_KEY`] value of workload containers.
pub const CONTAINER_TYPE_LABEL_CONTAINER: &str = "container";

/// The label carrying the log path the kubelet expects for a container.
pub const CONTAINER_LOG_PATH_LABEL_KEY: &str = "io.kubernetes.container.logpath";

/// The label carrying the id of the sandbox a container belongs to.
pub const SANDBOX_ID_LABEL_KEY: &str = "io.kubernetes.sandbox.id";

/// The label carrying the container name.
pub const KUBERNETES_CONTAINER_NAME_LABEL: &str = "io.kubernetes.container.name";

/// The container name of sandbox containers.
pub const POD_INFRA_CONTAINER_NAME: &str = "POD";

/// The prefix under which annotations are folded into labels.
pub const ANNOTATION_PREFIX: &str = "annotation.";

/// Labels the shim sets for itself, hidden from CRI labels and annotations.
const INTERNAL_LABEL_KEYS: [&str; 3] = [
    CONTAINER_TYPE_LABEL_KEY,
    CONTAINER_LOG_PATH_LABEL_KEY,
    SANDBOX_ID_LABEL_KEY,
];

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Folds CRI annotations into engine labels under [`ANNOTATION_PREFIX`].
pub fn fold_annotations(
    labels: &HashMap<String, String>,
    annotations: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut folded = labels.clone();
    for (key, value) in annotations {
        folded.insert(format!("{}{}", ANNOTATION_PREFIX, key), value.clone());
    }
    folded
}

/// Splits engine labels back into CRI labels and annotations, dropping internal labels.
///
/// The container name label is internal to sandbox containers only.
pub fn split_labels_and_annotations(
    engine_labels: &HashMap<String, String>,
) -> (HashMap<String, String>, HashMap<String, String>) {
    let mut labels = HashMap::new();
    let mut annotations = HashMap::new();
    let is_sandbox = engine_labels
        .get(CONTAINER_TYPE_LABEL_KEY)
        .is_some_and(|t| t == CONTAINER_TYPE_LABEL_SANDBOX);

    for (key, value) in engine_labels {
        if INTERNAL_LABEL_KEYS.contains(&key.as_str())
            || (is_sandbox && key == KUBERNETES_CONTAINER_NAME_LABEL)
        {
            continue;
        }

        match key.strip_prefix(ANNOTATION_PREFIX) {
            Some(annotation) => annotations.insert(annotation.to_string(), value.clone()),
            None => labels.insert(key.clone(), value.clone()),
        };
    }

    (labels, annotations)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
