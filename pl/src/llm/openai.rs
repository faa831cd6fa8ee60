//! OpenAI API client implementation
//!
//! Implements the CompletionClient trait for OpenAI's Chat Completions API,
//! streaming `choices[0].delta.content` over SSE until the `[DONE]` sentinel.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use super::{CompletionClient, CompletionRequest, ProviderError};
use crate::config::ProviderConfig;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl OpenAIClient {
    /// Create a new client from configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::MissingApiKey("OPENAI_API_KEY".to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.clone(),
            http: Client::new(),
            max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the Chat Completions API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        let max_tokens = request.max_tokens.min(self.max_tokens);

        // GPT-5.x and o1/o3 models use max_completion_tokens instead of max_tokens
        let uses_completion_tokens =
            self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3");

        let mut body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "messages": [{
                "role": "user",
                "content": request.prompt,
            }],
        });

        if uses_completion_tokens {
            body["max_completion_tokens"] = serde_json::json!(max_tokens);
        } else {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn stream(&self, request: CompletionRequest, chunk_tx: mpsc::Sender<String>) -> Result<(), ProviderError> {
        debug!(%self.model, prompt_len = request.prompt.len(), "stream: called");
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let http_request = self
            .http
            .post(url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body);

        let mut es = EventSource::new(http_request).map_err(|e| ProviderError::Stream(e.to_string()))?;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("stream: Event::Open");
                }
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        debug!("stream: [DONE]");
                        break;
                    }
                    let chunk: ChatCompletionChunk = serde_json::from_str(&msg.data)?;
                    if let Some(text) = chunk.choices.first().and_then(|c| c.delta.content.as_deref())
                        && !text.is_empty()
                        && chunk_tx.send(text.to_string()).await.is_err()
                    {
                        debug!("stream: receiver dropped, cancelling completion");
                        return Ok(());
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

// Chat Completions streaming response types

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    delta: ChatDelta,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_TOKENS;

    fn test_client(model: &str) -> OpenAIClient {
        OpenAIClient {
            model: model.to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.openai.com".to_string(),
            http: Client::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[test]
    fn test_build_request_body() {
        let client = test_client("gpt-4o");
        let body = client.build_request_body(&CompletionRequest::new("Say hi", 1000));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        assert!(body.get("max_completion_tokens").is_none());
        assert_eq!(body["messages"][0]["content"], "Say hi");
    }

    #[test]
    fn test_newer_models_use_completion_tokens() {
        let client = test_client("gpt-5-mini");
        let body = client.build_request_body(&CompletionRequest::new("Say hi", 1000));
        assert_eq!(body["max_completion_tokens"], 1000);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_chunk() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(data).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));

        let done = r#"{"choices":[{"delta":{}}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(done).unwrap();
        assert!(chunk.choices[0].delta.content.is_none());
    }
}
