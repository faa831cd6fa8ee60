//! Engine error types

use thiserror::Error;

use crate::llm::ProviderError;

/// Errors that terminate a weaving run
///
/// None of these are recoverable: each ends the nearest enclosing output
/// abnormally and bubbles, through every ancestor's merge, to the process
/// boundary. Output already flushed before the failure stays delivered.
#[derive(Debug, Error)]
pub enum WeaveError {
    #[error("template not found: \"{0}\"")]
    TemplateNotFound(String),

    #[error("close tag without a matching open tag")]
    MalformedMarkup,

    #[error("completion stream failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("stream invariant violated: {0}")]
    Structural(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            WeaveError::TemplateNotFound("greet".to_string()).to_string(),
            "template not found: \"greet\""
        );
        assert_eq!(
            WeaveError::MalformedMarkup.to_string(),
            "close tag without a matching open tag"
        );
    }

    #[test]
    fn test_provider_error_converts() {
        let err: WeaveError = ProviderError::Stream("eof".to_string()).into();
        assert!(matches!(err, WeaveError::Provider(_)));
    }
}
