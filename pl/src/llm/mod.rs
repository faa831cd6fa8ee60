//! Completion provider layer
//!
//! One streamed completion call per request, provider-agnostic behind the
//! [`CompletionClient`] trait.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod openai;

pub use anthropic::AnthropicClient;
pub use client::{CompletionClient, CompletionRequest};
pub use error::ProviderError;
pub use openai::OpenAIClient;

use crate::config::ProviderConfig;

/// Create a completion client for the provider named in the configuration.
pub fn create_client(config: &ProviderConfig) -> Result<Arc<dyn CompletionClient>, ProviderError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        "openai" => {
            debug!("create_client: creating OpenAI client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(ProviderError::UnknownProvider(other.to_string()))
        }
    }
}
