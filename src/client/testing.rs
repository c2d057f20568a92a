//! Scripted provider for gateway and orchestrator tests.

use crate::client::{Provider, ProviderRequest, ProviderResponse};
use crate::models::GenerationError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Script =
    dyn Fn(usize, &ProviderRequest) -> Result<ProviderResponse, GenerationError> + Send + Sync;

/// Provider whose replies come from a closure of (1-based call number, request).
pub(crate) struct ScriptedProvider {
    script: Box<Script>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub(crate) fn new<F>(script: F) -> Self
    where
        F: Fn(usize, &ProviderRequest) -> Result<ProviderResponse, GenerationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before every reply.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub(crate) fn ok_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        text: text.to_string(),
        usage: None,
        latency_ms: 5,
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)(call, request)
    }
}
