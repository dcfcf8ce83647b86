use std::collections::HashMap;

use tokio::sync::Mutex;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Records, per sandbox id, whether the network plugin finished setting up the sandbox network.
///
/// An entry is set to `false` after a teardown and only removed once the sandbox container is
/// confirmed gone. A missing entry means nothing is known, for example after a restart.
#[derive(Debug, Default)]
pub struct NetworkReadyMap {
    entries: Mutex<HashMap<String, bool>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl NetworkReadyMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the network readiness of a sandbox.
    pub async fn set(&self, sandbox_id: &str, ready: bool) {
        self.entries
            .lock()
            .await
            .insert(sandbox_id.to_string(), ready);
    }

    /// Returns the recorded readiness, or `None` if nothing is recorded.
    pub async fn get(&self, sandbox_id: &str) -> Option<bool> {
        self.entries.lock().await.get(sandbox_id).copied()
    }

    /// Forgets a sandbox.
    pub async fn clear(&self, sandbox_id: &str) {
        self.entries.lock().await.remove(sandbox_id);
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_network_ready_map() {
        let map = NetworkReadyMap::new();
        assert_eq!(map.get("s1").await, None);

        map.set("s1", true).await;
        assert_eq!(map.get("s1").await, Some(true));

        map.set("s1", false).await;
        assert_eq!(map.get("s1").await, Some(false));

        map.clear("s1").await;
        assert_eq!(map.get("s1").await, None);
    }
}
