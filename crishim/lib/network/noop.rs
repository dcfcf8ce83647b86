use std::collections::HashMap;

use crate::ShimResult;

use super::{ContainerId, NetworkPlugin, PodNetworkStatus};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The name of the no-op network plugin.
pub const NOOP_PLUGIN_NAME: &str = "kubernetes.io/no-op";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A network plugin that leaves networking to the engine.
///
/// Sandboxes get the engine's default network and their address is read from the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNetworkPlugin;

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait::async_trait]
impl NetworkPlugin for NoopNetworkPlugin {
    fn name(&self) -> &str {
        NOOP_PLUGIN_NAME
    }

    async fn set_up_pod(
        &self,
        _namespace: &str,
        _name: &str,
        _id: &ContainerId,
        _annotations: &HashMap<String, String>,
        _options: &HashMap<String, String>,
    ) -> ShimResult<()> {
        Ok(())
    }

    async fn tear_down_pod(
        &self,
        _namespace: &str,
        _name: &str,
        _id: &ContainerId,
    ) -> ShimResult<()> {
        Ok(())
    }

    async fn get_pod_network_status(
        &self,
        _namespace: &str,
        _name: &str,
        _id: &ContainerId,
    ) -> ShimResult<Option<PodNetworkStatus>> {
        Ok(None)
    }

    async fn status(&self) -> ShimResult<()> {
        Ok(())
    }

    async fn event(&self, name: &str, _details: &HashMap<String, String>) {
        tracing::trace!("no-op network plugin ignored event {}", name);
    }
}
