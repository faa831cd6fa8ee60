//! Recursive template weaving engine
//!
//! A weaving run turns a root invocation into a single linear stream of
//! text fragments. Each invocation resolves a named template into a prompt,
//! issues one streamed completion, and scans the completion output for
//! embedded tags. Every tag spawns a nested invocation whose full output is
//! spliced, in order, into the position the tag occupied. The recursion
//! bottoms out when a completion contains no tags.

pub mod agent;
pub mod error;
pub mod parser;
pub mod resolver;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{Stream, StreamExt};
use tracing::debug;

pub use agent::Agent;
pub use error::WeaveError;
pub use parser::{TagEvent, TagParser};
pub use resolver::Resolver;

use crate::llm::CompletionClient;
use crate::metrics::RunMetrics;
use crate::stream::{Conductor, SequencerStream};
use crate::templates::TemplateStore;

/// Unit flowing through every stream in a run. Errors travel in-band so a
/// failure deep in the recursion surfaces through the merged output.
pub type Chunk = Result<String, WeaveError>;

/// One request to resolve a template with concrete arguments.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Template to resolve, or `None` for pass-through mode where the body
    /// itself becomes the prompt.
    pub template: Option<String>,
    /// Lowercased key plus literal value, in appearance order.
    pub attributes: Vec<(String, String)>,
    /// Transcript of output preceding this invocation in the parent agent.
    pub context: String,
}

impl Invocation {
    /// Root invocation, driven by caller input rather than a parent agent.
    pub fn root(template: Option<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            template,
            attributes,
            context: String::new(),
        }
    }

    /// Invocation triggered by a tag inside an agent's completion output.
    pub fn tag(name: String, attributes: Vec<(String, String)>, context: String) -> Self {
        Self {
            template: Some(name),
            attributes,
            context,
        }
    }
}

/// Run-wide behavior switches.
#[derive(Debug, Clone)]
pub struct WeaveOptions {
    /// Give each nested invocation the transcript of output that preceded
    /// it, for the `{{_context_}}` placeholder.
    pub context_enabled: bool,
    /// Completion token ceiling passed to the provider.
    pub max_tokens: u32,
}

/// Shared state every resolver and agent in a run hangs off of.
pub struct WeaveContext {
    pub client: Arc<dyn CompletionClient>,
    pub store: Arc<TemplateStore>,
    pub context_enabled: bool,
    pub max_tokens: u32,
    pub metrics: Arc<RunMetrics>,
    agent_seq: AtomicU64,
}

impl WeaveContext {
    pub fn next_agent_id(&self) -> u64 {
        self.agent_seq.fetch_add(1, Ordering::Relaxed)
    }
}

/// Entry point for weaving runs.
pub struct Weaver {
    ctx: Arc<WeaveContext>,
}

impl Weaver {
    pub fn new(client: Arc<dyn CompletionClient>, store: Arc<TemplateStore>, options: WeaveOptions) -> Self {
        Self {
            ctx: Arc::new(WeaveContext {
                client,
                store,
                context_enabled: options.context_enabled,
                max_tokens: options.max_tokens,
                metrics: Arc::new(RunMetrics::new()),
                agent_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn metrics(&self) -> Arc<RunMetrics> {
        self.ctx.metrics.clone()
    }

    /// Start a run: feed `input` as the root invocation's body and return
    /// the fully merged output stream.
    ///
    /// A missing root template fails here rather than in-band, before any
    /// completion has been issued.
    pub fn run<S>(&self, invocation: Invocation, input: S) -> Result<SequencerStream<Chunk>, WeaveError>
    where
        S: Stream<Item = String> + Send + 'static,
    {
        debug!(template = ?invocation.template, "Weaver::run: called");
        let resolver = Resolver::new(invocation, self.ctx.clone())?;
        let conductor = Conductor::spawn(resolver);
        let root_input = conductor.input;
        tokio::spawn(async move {
            let mut input = Box::pin(input);
            while let Some(text) = input.next().await {
                if root_input.send(Ok(text)).await.is_err() {
                    break;
                }
            }
        });
        Ok(conductor.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_root_has_no_context() {
        let inv = Invocation::root(Some("greet".to_string()), vec![]);
        assert_eq!(inv.template.as_deref(), Some("greet"));
        assert!(inv.context.is_empty());
    }

    #[test]
    fn test_invocation_tag_carries_context() {
        let inv = Invocation::tag("step".to_string(), vec![], "before".to_string());
        assert_eq!(inv.template.as_deref(), Some("step"));
        assert_eq!(inv.context, "before");
    }
}
