use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    cri::{AttachRequest, ExecRequest, PortForwardRequest, StreamingResponse},
    ShimError, ShimResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A request parked by a [`TokenStreamingServer`] until its client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingStream {
    /// An exec session.
    Exec(ExecRequest),

    /// An attach session.
    Attach(AttachRequest),

    /// A port forward session.
    PortForward(PortForwardRequest),
}

/// Hands out single use URLs for streaming requests.
///
/// Each request is parked under a random token and served at `<base_url>/<kind>/<token>` by the
/// HTTP endpoint that calls [`take`](Self::take).
#[derive(Debug)]
pub struct TokenStreamingServer {
    base_url: String,
    pending: Mutex<HashMap<String, PendingStream>>,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Serves exec, attach and port forward sessions outside the request/response cycle.
#[async_trait]
pub trait StreamingServer: Send + Sync {
    /// Prepares an exec session and returns where to connect.
    async fn get_exec(&self, request: &ExecRequest) -> ShimResult<StreamingResponse>;

    /// Prepares an attach session and returns where to connect.
    async fn get_attach(&self, request: &AttachRequest) -> ShimResult<StreamingResponse>;

    /// Prepares a port forward session and returns where to connect.
    async fn get_port_forward(&self, request: &PortForwardRequest)
        -> ShimResult<StreamingResponse>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TokenStreamingServer {
    /// Creates a server that issues URLs below `base_url`.
    pub fn new(base_url: impl Into<String>) -> ShimResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ShimError::InvalidConfig(
                "streaming base url must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            pending: Mutex::new(HashMap::new()),
        })
    }

    /// Claims the request parked under `token`. Each token can be claimed once.
    pub async fn take(&self, token: &str) -> Option<PendingStream> {
        self.pending.lock().await.remove(token)
    }

    async fn park(&self, kind: &str, stream: PendingStream) -> StreamingResponse {
        let token = hex::encode(rand::random::<[u8; 16]>());
        self.pending.lock().await.insert(token.clone(), stream);

        StreamingResponse {
            url: format!("{}/{}/{}", self.base_url, kind, token),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl StreamingServer for TokenStreamingServer {
    async fn get_exec(&self, request: &ExecRequest) -> ShimResult<StreamingResponse> {
        Ok(self.park("exec", PendingStream::Exec(request.clone())).await)
    }

    async fn get_attach(&self, request: &AttachRequest) -> ShimResult<StreamingResponse> {
        Ok(self
            .park("attach", PendingStream::Attach(request.clone()))
            .await)
    }

    async fn get_port_forward(
        &self,
        request: &PortForwardRequest,
    ) -> ShimResult<StreamingResponse> {
        Ok(self
            .park("portforward", PendingStream::PortForward(request.clone()))
            .await)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
