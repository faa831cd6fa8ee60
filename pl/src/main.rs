//! promptloom - recursive prompt template weaver
//!
//! CLI entry point: load templates, start a weaving run for the root
//! template, and stream the merged output to stdout or a file.

use std::io::{IsTerminal, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result, eyre};
use futures::StreamExt;
use tracing::{info, warn};

use promptloom::cli::{Cli, parse_attrs};
use promptloom::config::ProviderConfig;
use promptloom::llm::create_client;
use promptloom::pace::paced;
use promptloom::templates::TemplateStore;
use promptloom::weave::{Invocation, WeaveOptions, Weaver};

fn setup_logging(log_level: &str) -> Result<()> {
    let level = match log_level {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        other => return Err(eyre!("unknown log level: {other}")),
    };

    // Logs go to stderr; stdout carries the resolved output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

/// Read the root body from stdin when it is piped; an attached terminal
/// means there is no body.
fn read_stdin_body() -> Result<Option<String>> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut body = String::new();
    stdin.lock().read_to_string(&mut body).context("Failed to read stdin")?;
    Ok(Some(body))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level).context("Failed to setup logging")?;

    let config = ProviderConfig::resolve(cli.provider.clone(), cli.model.clone())
        .context("Failed to resolve provider configuration")?;
    info!(provider = %config.provider, model = %config.model, "promptloom starting");

    let store = TemplateStore::load_paths(&cli.templates);
    if !cli.templates.is_empty() && store.is_empty() {
        return Err(eyre!("no templates could be loaded"));
    }
    info!(templates = store.len(), "templates loaded");

    // No --root means pass-through mode: stdin becomes the prompt directly,
    // with loaded templates still available to tags.
    let root = cli.root.clone();
    if let Some(name) = &root
        && store.resolve(name).is_none()
    {
        return Err(eyre!("root template not found: \"{name}\""));
    }

    let attrs = parse_attrs(&cli.attrs)?;
    let client = create_client(&config).context("Failed to create completion client")?;
    let weaver = Weaver::new(
        client,
        Arc::new(store),
        WeaveOptions {
            context_enabled: cli.context,
            max_tokens: config.max_tokens,
        },
    );

    let body = read_stdin_body()?;
    let input = futures::stream::iter(body);
    let output = weaver
        .run(Invocation::root(root, attrs), input)
        .map_err(|e| eyre!(e))?;

    let mut sink: Box<dyn Write> = if cli.quiet {
        Box::new(std::io::sink())
    } else if let Some(path) = &cli.output {
        Box::new(std::fs::File::create(path).context("Failed to create output file")?)
    } else {
        Box::new(std::io::stdout())
    };

    let mut paced_output = Box::pin(paced(output, Duration::from_millis(cli.pace_ms)));
    let mut wrote = false;
    while let Some(chunk) = paced_output.next().await {
        let fragment = chunk.map_err(|e| eyre!(e))?;
        sink.write_all(fragment.as_bytes()).context("Failed to write output")?;
        sink.flush().context("Failed to flush output")?;
        wrote = !fragment.is_empty() || wrote;
    }
    if wrote && !cli.quiet && cli.output.is_none() {
        // Leave the shell prompt on its own line.
        sink.write_all(b"\n").ok();
    }

    let metrics = weaver.metrics();
    if metrics.agents() > 0 {
        info!("run complete: {}", metrics.summary());
    } else {
        warn!("run complete without spawning any completions");
    }
    Ok(())
}
