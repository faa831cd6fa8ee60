//! promptloom - recursive prompt template weaver
//!
//! Resolves a tree of named prompt templates into one linear text stream.
//! Each template resolves into a prompt, the prompt is answered by a
//! streamed completion, and tags embedded in the completion output trigger
//! nested resolutions whose output is spliced back in at the tag's
//! position, in order, while everything downstream keeps streaming.

pub mod cli;
pub mod config;
pub mod llm;
pub mod metrics;
pub mod pace;
pub mod stream;
pub mod templates;
pub mod weave;

pub use llm::{CompletionClient, CompletionRequest, ProviderError, create_client};
pub use metrics::RunMetrics;
pub use templates::TemplateStore;
pub use weave::{Chunk, Invocation, WeaveError, WeaveOptions, Weaver};
