//! Completion agent
//!
//! An agent owns one streamed completion call and incrementally parses its
//! own output as tag markup. Text passes through; each tag spawns a child
//! resolver whose entire eventual output is spliced back into the merge at
//! the tag's original position. A stack of body-feed sequencers tracks the
//! currently open tags; depth zero emits straight to the agent's root.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::parser::{TagEvent, TagParser};
use super::resolver::Resolver;
use super::{Chunk, Invocation, WeaveContext, WeaveError};
use crate::llm::CompletionRequest;
use crate::stream::{Conductor, SequencerHandle, SequencerStream, Stage, sequencer};

/// Buffer between the provider task and the parsing stage.
const FRAGMENT_BUFFER: usize = 64;

/// One open tag inside an agent's own completion text.
struct Scope {
    name: String,
    /// Push side of this tag's body feed; its merged output is pumped into
    /// the child resolver's input.
    feed: SequencerHandle<Chunk>,
    /// Text and tag markers that appeared directly inside this scope, kept
    /// only when context propagation is enabled.
    transcript: String,
}

pub struct Agent;

impl Agent {
    /// Issue the completion for a finished prompt and return its merged,
    /// fully resolved output.
    ///
    /// The output ends only after every nested resolution has drained.
    /// Dropping the output aborts the completion call and everything
    /// spawned beneath it.
    pub fn spawn(prompt: String, ctx: Arc<WeaveContext>, label: &str) -> SequencerStream<Chunk> {
        let id = ctx.next_agent_id();
        let agent = format!("agent[{id}]({label})");
        ctx.metrics.agent_spawned();
        debug!(%agent, prompt_len = prompt.len(), "Agent::spawn: called");

        let request = CompletionRequest::new(prompt, ctx.max_tokens);
        let stage = AgentStage::new(ctx.clone(), agent.clone());
        let conductor = Conductor::spawn(stage);
        let input = conductor.input;
        let client = ctx.client.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(FRAGMENT_BUFFER);
            let call = tokio::spawn(async move { client.stream(request, chunk_tx).await });

            while let Some(fragment) = chunk_rx.recv().await {
                if input.send(Ok(fragment)).await.is_err() {
                    debug!(%agent, "Agent: consumer gone, aborting completion");
                    call.abort();
                    let _ = call.await;
                    return;
                }
            }

            match call.await {
                Ok(Ok(())) => {
                    debug!(%agent, elapsed = ?started.elapsed(), "Agent: completion finished");
                }
                Ok(Err(e)) => {
                    debug!(%agent, error = %e, "Agent: completion failed");
                    let _ = input.send(Err(WeaveError::Provider(e))).await;
                }
                Err(e) => {
                    let _ = input
                        .send(Err(WeaveError::Structural(format!("completion task failed: {e}"))))
                        .await;
                }
            }
            ctx.metrics.record_completion(started.elapsed());
        });

        conductor.output
    }
}

/// Parsing stage for one agent: maintains the scope stack and routes text
/// and child resolutions into the right feed.
struct AgentStage {
    ctx: Arc<WeaveContext>,
    agent: String,
    parser: TagParser,
    scopes: Vec<Scope>,
    /// Transcript of the agent's root scope, outside any open tag. Kept
    /// only when context propagation is enabled.
    transcript: String,
    failed: bool,
}

impl AgentStage {
    fn new(ctx: Arc<WeaveContext>, agent: String) -> Self {
        Self {
            ctx,
            agent,
            parser: TagParser::new(),
            scopes: Vec::new(),
            transcript: String::new(),
            failed: false,
        }
    }

    fn apply(&mut self, event: TagEvent, chain: &SequencerHandle<Chunk>) {
        match event {
            TagEvent::Open { name, attributes } => self.open_tag(name, attributes, chain),
            TagEvent::Text(text) => self.text(text, chain),
            TagEvent::Close { name } => self.close_tag(name, chain),
        }
    }

    fn open_tag(&mut self, name: String, attributes: Vec<(String, String)>, chain: &SequencerHandle<Chunk>) {
        debug!(agent = %self.agent, depth = self.scopes.len(), tag = %name, "AgentStage: open tag");
        self.ctx.metrics.tag_opened();

        // A child sees only the text and tag markers that preceded it
        // inside its enclosing scope, not the whole agent output.
        let context = if self.ctx.context_enabled {
            let enclosing = self.transcript_mut();
            let context = enclosing.clone();
            enclosing.push_str(&render_open_tag(&name, &attributes));
            context
        } else {
            String::new()
        };

        let invocation = Invocation::tag(name.clone(), attributes, context);
        let resolver = match Resolver::new(invocation, self.ctx.clone()) {
            Ok(resolver) => resolver,
            Err(e) => {
                self.fail(e, chain);
                return;
            }
        };

        let conductor = Conductor::spawn(resolver);
        let target = self.scopes.last().map(|s| &s.feed).unwrap_or(chain);
        if !target.push(Box::pin(conductor.output)) {
            self.cancel();
            return;
        }

        // Fresh body feed for this tag, pumped into the child's input as an
        // independently terminated stream.
        let (feed, mut feed_stream) = sequencer::<Chunk>();
        let child_input = conductor.input;
        tokio::spawn(async move {
            while let Some(chunk) = feed_stream.next().await {
                if child_input.send(chunk).await.is_err() {
                    break;
                }
            }
        });

        self.scopes.push(Scope {
            name,
            feed,
            transcript: String::new(),
        });
    }

    fn text(&mut self, text: String, chain: &SequencerHandle<Chunk>) {
        if self.ctx.context_enabled {
            self.transcript_mut().push_str(&text);
        }
        let delivered = match self.scopes.last() {
            Some(scope) => scope.feed.push_item(Ok(text)),
            None => chain.push_item(Ok(text)),
        };
        if !delivered {
            self.cancel();
        }
    }

    fn close_tag(&mut self, name: String, chain: &SequencerHandle<Chunk>) {
        match self.scopes.pop() {
            Some(scope) => {
                debug!(agent = %self.agent, depth = self.scopes.len(), tag = %scope.name, "AgentStage: close tag");
                // End of body: this is what finalizes the child resolver.
                // The scope's own transcript dies with it; the enclosing
                // scope only ever saw the tag markers.
                scope.feed.close();
                if self.ctx.context_enabled {
                    self.transcript_mut().push_str(&format!("</{name}>"));
                }
            }
            None => {
                debug!(agent = %self.agent, tag = %name, "AgentStage: close tag with empty stack");
                self.fail(WeaveError::MalformedMarkup, chain);
            }
        }
    }

    /// Terminal failure: emit the error in-band and end the output.
    ///
    /// With scopes open, the error rides the innermost feed: each enclosing
    /// resolver forwards it instead of spawning its completion, and the
    /// consumer sees the actual failure in document order rather than a
    /// teardown artifact.
    fn fail(&mut self, error: WeaveError, chain: &SequencerHandle<Chunk>) {
        debug!(agent = %self.agent, error = %error, "AgentStage: failing");
        self.failed = true;
        match self.scopes.last() {
            Some(scope) => {
                scope.feed.push_item(Err(error));
                while let Some(scope) = self.scopes.pop() {
                    scope.feed.close();
                }
            }
            None => {
                chain.push_item(Err(error));
            }
        }
        chain.close();
    }

    /// The consumer is gone: stop quietly and tear down open children.
    fn cancel(&mut self) {
        debug!(agent = %self.agent, "AgentStage: cancelled by consumer");
        self.failed = true;
        self.abort_scopes();
    }

    fn abort_scopes(&mut self) {
        while let Some(scope) = self.scopes.pop() {
            scope
                .feed
                .push_item(Err(WeaveError::Structural(format!(
                    "tag \"{}\" aborted by enclosing agent",
                    scope.name
                ))));
            scope.feed.close();
        }
    }

    /// Transcript of the innermost open scope, or the agent root.
    fn transcript_mut(&mut self) -> &mut String {
        match self.scopes.last_mut() {
            Some(scope) => &mut scope.transcript,
            None => &mut self.transcript,
        }
    }
}

impl Stage<Chunk, Chunk> for AgentStage {
    fn on_input(&mut self, input: Chunk, chain: &SequencerHandle<Chunk>) -> bool {
        if self.failed {
            return false;
        }
        match input {
            Ok(fragment) => {
                self.ctx.metrics.fragment_parsed();
                for event in self.parser.feed(&fragment) {
                    self.apply(event, chain);
                    if self.failed {
                        return false;
                    }
                }
                true
            }
            Err(e) => {
                self.fail(e, chain);
                false
            }
        }
    }

    fn on_close(&mut self, chain: &SequencerHandle<Chunk>) {
        if self.failed {
            return;
        }
        for event in self.parser.finish() {
            self.apply(event, chain);
            if self.failed {
                return;
            }
        }
        // Unterminated tags at stream end are repaired, innermost first,
        // instead of failing the run.
        while let Some(scope) = self.scopes.pop() {
            warn!(agent = %self.agent, tag = %scope.name, "AgentStage: force-closing unterminated tag");
            scope.feed.close();
        }
        chain.close();
    }
}

fn render_open_tag(name: &str, attributes: &[(String, String)]) -> String {
    let mut out = format!("<{name}");
    for (key, value) in attributes {
        out.push_str(&format!(" {key}=\"{value}\""));
    }
    out.push('>');
    out
}
