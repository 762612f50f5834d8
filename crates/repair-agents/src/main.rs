use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use coordination::events::{FanoutObserver, TracingObserver};
use repair_agents::config::{
    check_endpoint, ConfigOverrides, EnvSource, ProviderKind, RepairConfig,
};
use repair_agents::orchestrator::RepairOrchestrator;
use repair_agents::provider::RigProvider;
use repair_agents::telemetry::JsonlEventLog;

/// Repair execution-blocking bugs in a source file with a model-backed swarm.
#[derive(Debug, Parser)]
#[command(name = "repair-agents", version)]
struct Cli {
    /// Source file to repair; reads stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the repaired code here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Outer repair iterations.
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Execute/retry attempts per planned agent.
    #[arg(long)]
    max_review_attempts: Option<u32>,

    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    #[arg(long)]
    model: Option<String>,

    /// TOML config file.
    #[arg(long, env = "REPAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Read credentials and `REPAIR_*` settings from this file instead of `./.env`.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Append structured run events to this JSONL file.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Wall-clock budget for the whole run.
    #[arg(long)]
    deadline_secs: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider,
            model: self.model.clone(),
            max_iterations: self.max_iterations,
            max_review_attempts: self.max_review_attempts,
            run_deadline_secs: self.deadline_secs,
        }
    }

    fn read_source(&self) -> Result<String> {
        match &self.input {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            None => {
                let mut source = String::new();
                std::io::stdin()
                    .read_to_string(&mut source)
                    .context("Failed to read source from stdin")?;
                Ok(source)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let env = match &cli.env_file {
        Some(path) => EnvSource::from_file(path)?,
        None => EnvSource::discover()?,
    };
    debug!(entries = env.file_entries(), "Environment file loaded");

    let mut config = RepairConfig::load(cli.config.as_deref(), &env)?;
    config.apply_overrides(&cli.overrides());
    config.validate()?;
    let endpoint = config.provider.resolve(&env)?;

    info!(
        provider = %endpoint.kind,
        base_url = %endpoint.base_url,
        model = %endpoint.model,
        max_iterations = config.max_iterations,
        max_review_attempts = config.max_review_attempts,
        "Repair swarm starting"
    );
    if endpoint.kind.is_self_hosted() && !check_endpoint(&endpoint.base_url).await {
        warn!(base_url = %endpoint.base_url, "Local endpoint did not answer a model listing; continuing");
    }

    let source = cli.read_source()?;

    let mut observers = FanoutObserver::new().with(Arc::new(TracingObserver));
    if let Some(path) = &cli.events {
        let log = JsonlEventLog::open(path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?;
        observers.push(Arc::new(log));
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let provider = RigProvider::new(endpoint)?;
    let orchestrator = RepairOrchestrator::from_config(Arc::new(provider), &config)
        .with_observer(Arc::new(observers))
        .with_cancellation(cancel);

    let outcome = orchestrator
        .run_detailed(&source, config.max_iterations)
        .await?;

    info!(
        run_id = %outcome.run_id,
        status = %outcome.status,
        iterations = outcome.iterations,
        provider_calls = outcome.provider_calls,
        "Repair finished"
    );

    match &cli.output {
        Some(path) => std::fs::write(path, &outcome.code)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", outcome.code),
    }

    Ok(())
}
