//! CompletionClient trait definition

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::ProviderError;

/// A completion request - everything needed for one streamed call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Fully substituted prompt text
    pub prompt: String,

    /// Max tokens for the response (capped by client configuration)
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

/// Stateless streaming completion client - each call is independent
///
/// One call issues one completion and delivers its text fragments, in
/// arrival order, to `chunk_tx`. The fragment stream is finite and
/// represents the whole completion. Implementations must return early
/// (with `Ok`) when the receiver has been dropped, so an abandoned call
/// never keeps a request in flight.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn stream(&self, request: CompletionRequest, chunk_tx: mpsc::Sender<String>) -> Result<(), ProviderError>;
}
