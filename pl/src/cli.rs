//! CLI argument definitions

use std::path::PathBuf;

use clap::Parser;
use eyre::{Result, bail};

/// promptloom - recursive prompt template weaver
#[derive(Parser, Debug)]
#[command(
    name = "pl",
    about = "Weave a tree of prompt templates into one streamed completion",
    version,
    after_help = "Body content for the root template is read from stdin when piped."
)]
pub struct Cli {
    /// Template files to load; each registers under its file name and stem.
    /// Pass-through mode needs none.
    #[arg(value_name = "TEMPLATE")]
    pub templates: Vec<PathBuf>,

    /// Completion provider (anthropic, openai)
    #[arg(short, long, env = "PROVIDER")]
    pub provider: Option<String>,

    /// Model identifier passed to the provider
    #[arg(short, long, env = "MODEL")]
    pub model: Option<String>,

    /// Root template name; omit to use stdin as the prompt directly
    #[arg(short, long)]
    pub root: Option<String>,

    /// Root attribute as KEY=VALUE, repeatable
    #[arg(short, long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Suppress the resolved output stream
    #[arg(short, long)]
    pub quiet: bool,

    /// Give nested invocations the transcript preceding their tag
    #[arg(long)]
    pub context: bool,

    /// Delay between emitted fragments, in milliseconds
    #[arg(long, default_value = "0")]
    pub pace_ms: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,
}

/// Parse repeated `--attr KEY=VALUE` arguments into lowercased key pairs.
///
/// An `attr-` key prefix is accepted and stripped, so shell invocations can
/// mirror the attribute names templates use in tags.
pub fn parse_attrs(raw: &[String]) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("invalid attribute \"{entry}\": expected KEY=VALUE");
        };
        let key = key.trim().to_lowercase();
        let key = key.strip_prefix("attr-").unwrap_or(&key).to_string();
        if key.is_empty() {
            bail!("invalid attribute \"{entry}\": empty key");
        }
        attrs.push((key, value.to_string()));
    }
    Ok(attrs)
}
