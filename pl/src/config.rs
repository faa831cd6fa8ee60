//! Provider configuration
//!
//! Resolved once at startup from CLI flags with environment fallback,
//! then handed to the provider clients.

use std::env;

use eyre::{Result, eyre};
use tracing::debug;

/// Default Anthropic API endpoint
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default OpenAI API endpoint
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default response budget per completion
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Everything needed to construct a completion client
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,
    /// Model identifier passed through to the API
    pub model: String,
    /// API key, if the environment supplied one
    pub api_key: Option<String>,
    /// API endpoint base URL
    pub base_url: String,
    /// Max tokens per completion
    pub max_tokens: u32,
}

impl ProviderConfig {
    /// Resolve configuration from CLI values with environment fallback.
    ///
    /// Priority: CLI flag > `PROVIDER` / `MODEL` environment variables.
    /// The API key comes from `ANTHROPIC_API_KEY` or `OPENAI_API_KEY`,
    /// the base URL may be overridden with `ANTHROPIC_BASE_URL` or
    /// `OPENAI_BASE_URL`.
    pub fn resolve(provider: Option<String>, model: Option<String>) -> Result<Self> {
        let provider = provider
            .or_else(|| env::var("PROVIDER").ok())
            .ok_or_else(|| eyre!("a provider must be given via --provider or PROVIDER"))?;
        let model = model
            .or_else(|| env::var("MODEL").ok())
            .ok_or_else(|| eyre!("a model must be given via --model or MODEL"))?;

        let (key_var, base_var, default_base) = match provider.as_str() {
            "anthropic" => ("ANTHROPIC_API_KEY", "ANTHROPIC_BASE_URL", DEFAULT_ANTHROPIC_BASE_URL),
            "openai" => ("OPENAI_API_KEY", "OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            other => {
                return Err(eyre!("unknown provider \"{other}\", expected \"anthropic\" or \"openai\""));
            }
        };

        let api_key = env::var(key_var).ok();
        let base_url = env::var(base_var).ok().unwrap_or_else(|| default_base.to_string());
        debug!(%provider, %model, %base_url, has_key = api_key.is_some(), "ProviderConfig::resolve");

        Ok(Self {
            provider,
            model,
            api_key,
            base_url,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }
}
