//! Binary entrypoint for prego.
//!
//! Reads JSON lines from stdin, evaluates each with the loaded Rego policy
//! and writes one formatted line per result to stdout. Logs go to stderr.
use anyhow::{Context, Result};
use clap::Parser;
use prego_core::config::{DEFAULT_OUTPUT, DEFAULT_PACKAGE, DEFAULT_QUERY};
use prego_core::{
    EventSource, ParseMode, PipelineRunner, RunConfig, RunSummary, Shutdown, StagedConfig,
    PREGO_VERSION,
};
use prego_out::Formatter;
use prego_policy::{prepare_controller, PolicySources};
use prego_stages::{Session, StagedPipeline};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "prego")]
#[command(
    about = "Pipe into Rego: take JSON lines from stdin and evaluate them with a loaded policy",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Rego policy file (repeatable)
    #[arg(short, long)]
    policy: Vec<PathBuf>,

    /// JSON or YAML data file (repeatable)
    #[arg(short, long)]
    data: Vec<PathBuf>,

    /// Query evaluated for every event; each result is printed
    #[arg(short, long, default_value = DEFAULT_QUERY)]
    query: String,

    /// Feed `data.prego.nextstate` back to the next evaluation as `data.prego_state`
    #[arg(long)]
    stateful: bool,

    /// json | regogo=<selector> | gotemplate=<template> (also extract=, template=)
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: String,

    /// Abort on the first line that is not a JSON object
    #[arg(long)]
    strict: bool,

    /// Policy/data file or directory for staged BEGIN/MAIN/END mode (repeatable)
    #[arg(short, long)]
    load: Vec<PathBuf>,

    /// Package holding the BEGIN, MAIN and END rules
    #[arg(long, default_value = DEFAULT_PACKAGE)]
    package: String,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        let mut config = RunConfig::new()
            .with_query(self.query)
            .stateful(self.stateful)
            .with_output(self.output)
            .with_parse_mode(if self.strict {
                ParseMode::Strict
            } else {
                ParseMode::Lenient
            });
        config.policy_paths = self.policy;
        config.data_paths = self.data;

        if !self.load.is_empty() {
            config = config.staged(StagedConfig::new(self.load).with_package(self.package));
        }
        config
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let config = Cli::parse().into_config();

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let span = info_span!("run", run_id = %config.run_id);
    let code = match run(config, &shutdown).instrument(span).await {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };

    // stdin reads may still be parked on a blocking thread
    std::process::exit(code);
}

async fn run(config: RunConfig, shutdown: &Shutdown) -> Result<RunSummary> {
    info!(version = PREGO_VERSION, "prego starting");
    config.validate()?;
    let formatter = Formatter::from_spec(&config.output)?;
    let mut source = EventSource::new(BufReader::new(tokio::io::stdin()), config.parse_mode);
    let mut sink = tokio::io::stdout();

    match &config.staged {
        Some(staged) => {
            let sources = PolicySources::discover(&staged.paths)
                .context("failed to load staged policies")?;
            let session = Session::resolve(&sources, &staged.package, config.stateful)?;
            info!(package = %staged.package, "starting staged session");
            Ok(StagedPipeline::new(session, formatter)
                .run(source, sink, shutdown)
                .await?)
        }
        None => {
            let controller = prepare_controller(&config)?;
            info!(query = %config.query, "starting event loop");
            Ok(PipelineRunner::new(controller, formatter)
                .run(&mut source, &mut sink, shutdown)
                .await?)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

/// SIGINT and SIGTERM request the same graceful stop as end of input.
fn spawn_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, draining...");
        shutdown.trigger();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
