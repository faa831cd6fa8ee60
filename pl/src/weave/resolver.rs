//! Invocation resolver
//!
//! Turns one invocation plus its fully accumulated body into a finished
//! prompt and spawns the agent that answers it. Attribute substitution
//! happens once, eagerly, at construction; the body and context tokens are
//! substituted only when the input ends, because the body placeholder needs
//! the entire, possibly recursively resolved, body.

use std::sync::Arc;

use regex::{NoExpand, Regex};
use tracing::debug;

use super::agent::Agent;
use super::{Chunk, Invocation, WeaveContext, WeaveError};
use crate::stream::{SequencerHandle, Stage};

/// Placeholder token for the accumulated body content.
pub const CONTENT_TOKEN: &str = "_content_";

/// Placeholder token for the preceding-sibling transcript.
pub const CONTEXT_TOKEN: &str = "_context_";

/// Replace every case-insensitive occurrence of `{{token}}` in `text` with
/// `value`, literally. Unmatched placeholders stay verbatim.
pub fn substitute(text: &str, token: &str, value: &str) -> String {
    let placeholder = format!("{{{{{token}}}}}");
    let pattern = format!("(?i){}", regex::escape(&placeholder));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(text, NoExpand(value)).into_owned(),
        // The pattern is escaped, so this cannot fail; keep the text as-is
        // rather than panicking in a stream callback.
        Err(_) => text.to_string(),
    }
}

/// Resolver for one invocation.
///
/// Driven as a conductor stage: inputs are body chunks, the output is the
/// spawned agent's entire merged stream, emitted as a single segment once
/// the body closes. Nothing is emitted before that.
pub struct Resolver {
    ctx: Arc<WeaveContext>,
    /// Template name, or "stream" for the pass-through root
    label: String,
    /// Template text with attributes already substituted
    prompt: String,
    body: String,
    context: String,
    failed: bool,
}

impl Resolver {
    /// Resolve template text for the invocation and apply its attributes.
    ///
    /// `template == None` is the pass-through mode: the prompt is the body
    /// content, unchanged.
    pub fn new(invocation: Invocation, ctx: Arc<WeaveContext>) -> Result<Self, WeaveError> {
        let label = invocation.template.clone().unwrap_or_else(|| "stream".to_string());
        debug!(template = %label, attrs = invocation.attributes.len(), "Resolver::new: called");

        let mut prompt = match &invocation.template {
            Some(name) => ctx
                .store
                .resolve(name)
                .ok_or_else(|| WeaveError::TemplateNotFound(name.clone()))?
                .to_string(),
            None => format!("{{{{{CONTENT_TOKEN}}}}}"),
        };

        // Attribute substitution happens exactly once, before any body
        // content exists.
        for (key, value) in &invocation.attributes {
            prompt = substitute(&prompt, key, value);
        }

        Ok(Self {
            ctx,
            label,
            prompt,
            body: String::new(),
            context: invocation.context,
            failed: false,
        })
    }
}

impl Stage<Chunk, Chunk> for Resolver {
    fn on_input(&mut self, input: Chunk, chain: &SequencerHandle<Chunk>) -> bool {
        if self.failed {
            return false;
        }
        match input {
            Ok(text) => {
                self.body.push_str(&text);
                true
            }
            Err(e) => {
                debug!(template = %self.label, error = %e, "Resolver::on_input: forwarding branch failure");
                self.failed = true;
                chain.push_item(Err(e));
                chain.close();
                false
            }
        }
    }

    fn on_close(&mut self, chain: &SequencerHandle<Chunk>) {
        if self.failed {
            return;
        }
        if chain.is_closed() {
            debug!(template = %self.label, "Resolver::on_close: consumer gone, not spawning agent");
            return;
        }
        let body = std::mem::take(&mut self.body);
        let prompt = substitute(&self.prompt, CONTENT_TOKEN, &body);
        let prompt = substitute(&prompt, CONTEXT_TOKEN, &self.context);
        debug!(template = %self.label, prompt_len = prompt.len(), "Resolver::on_close: prompt ready");

        let output = Agent::spawn(prompt, self.ctx.clone(), &self.label);
        chain.push(Box::pin(output));
        chain.close();
    }
}
