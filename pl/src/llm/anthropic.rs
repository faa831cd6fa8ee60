//! Anthropic Claude API client implementation
//!
//! Implements the CompletionClient trait for Anthropic's Messages API,
//! streaming `content_block_delta` text over SSE.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use tokio::sync::mpsc;
use tracing::debug;

use super::{CompletionClient, CompletionRequest, ProviderError};
use crate::config::ProviderConfig;

/// Anthropic Claude API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Create a new client from configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::MissingApiKey("ANTHROPIC_API_KEY".to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http: Client::new(),
            max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the Messages API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "stream": true,
            "messages": [{
                "role": "user",
                "content": request.prompt,
            }],
        })
    }
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn stream(&self, request: CompletionRequest, chunk_tx: mpsc::Sender<String>) -> Result<(), ProviderError> {
        debug!(%self.model, prompt_len = request.prompt.len(), "stream: called");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let http_request = self
            .http
            .post(url)
            .header("x-api-key", self.api_key.clone())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body);

        let mut es = EventSource::new(http_request).map_err(|e| ProviderError::Stream(e.to_string()))?;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("stream: Event::Open");
                }
                Ok(Event::Message(msg)) => {
                    let data: serde_json::Value = serde_json::from_str(&msg.data)?;
                    match data["type"].as_str() {
                        Some("content_block_delta") => {
                            if let Some(text) = data["delta"]["text"].as_str()
                                && chunk_tx.send(text.to_string()).await.is_err()
                            {
                                debug!("stream: receiver dropped, cancelling completion");
                                return Ok(());
                            }
                        }
                        Some("message_stop") => {
                            debug!("stream: message_stop");
                            break;
                        }
                        Some("error") => {
                            let message = data["error"]["message"].as_str().unwrap_or("unknown error").to_string();
                            debug!(%message, "stream: error event");
                            return Err(ProviderError::Stream(message));
                        }
                        _ => {
                            debug!("stream: ignoring event type");
                        }
                    }
                }
                Err(EventSourceError::StreamEnded) => {
                    debug!("stream: ended");
                    break;
                }
                Err(EventSourceError::InvalidStatusCode(status, response)) => {
                    let message = response.text().await.unwrap_or_default();
                    debug!(status = status.as_u16(), "stream: invalid status");
                    return Err(ProviderError::ApiError {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(EventSourceError::Transport(e)) => {
                    debug!(error = %e, "stream: transport error");
                    return Err(ProviderError::Network(e));
                }
                Err(e) => {
                    debug!(error = %e, "stream: event error");
                    return Err(ProviderError::Stream(e.to_string()));
                }
            }
        }

        debug!("stream: complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_TOKENS;

    fn test_client() -> AnthropicClient {
        AnthropicClient {
            model: "claude-sonnet-4".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            http: Client::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[test]
    fn test_build_request_body() {
        let client = test_client();
        let request = CompletionRequest::new("Say hi", 1000);
        let body = client.build_request_body(&request);

        assert_eq!(body["model"], "claude-sonnet-4");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Say hi");
    }

    #[test]
    fn test_max_tokens_capped() {
        let mut client = test_client();
        client.max_tokens = 1000;
        let request = CompletionRequest::new("Test", 5000);
        let body = client.build_request_body(&request);
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = ProviderConfig {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4".to_string(),
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        };
        assert!(matches!(
            AnthropicClient::from_config(&config),
            Err(ProviderError::MissingApiKey(_))
        ));
    }
}
