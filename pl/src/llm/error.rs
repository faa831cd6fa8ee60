//! Provider error types

use thiserror::Error;

/// Errors surfaced by a completion provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("event stream error: {0}")]
    Stream(String),

    #[error("missing API key: set {0}")]
    MissingApiKey(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown provider: \"{0}\", expected \"anthropic\" or \"openai\"")]
    UnknownProvider(String),
}

impl ProviderError {
    /// True when the failure came from the provider rejecting the request
    /// rather than from the transport.
    pub fn is_api_error(&self) -> bool {
        matches!(self, ProviderError::ApiError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_api_error() {
        let err = ProviderError::ApiError {
            status: 401,
            message: "bad key".to_string(),
        };
        assert!(err.is_api_error());
        assert!(!ProviderError::Stream("eof".to_string()).is_api_error());
    }

    #[test]
    fn test_display_includes_status() {
        let err = ProviderError::ApiError {
            status: 529,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error 529: overloaded");
    }
}
