//! Oathkeeper metrics - travel statistics for group meetups
//!
//! A CLI that records per-visit travel metrics into an append-only log per
//! plan, summarizes plans and groups of plans, and writes short narratives
//! with rules, randomized templates or an Ollama backend.
//!
//! Every data command prints a JSON envelope on stdout.
//!
//! Exit codes:
//!   0 - Success
//!   1 - The envelope carries an error, or a runtime error occurred

mod analysis;
mod cli;
mod commands;
mod config;
mod error;
mod models;
mod narrative;
mod service;
mod store;

use anyhow::{Context, Result};
use cli::{Args, Command};
use config::{Config, DEFAULT_CONFIG_FILE};
use narrative::{OllamaBackend, Synthesizer};
use service::MetricsService;
use std::path::Path;
use store::MetricStore;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // init-config runs before anything else reads the file
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    let (mut config, source) = load_config(&args)?;
    config.merge_with_args(&args);

    init_logging(&args, &config)?;

    debug!("Arguments: {:?}", args);
    match source {
        Some(path) => info!("Loaded config from {}", path),
        None => debug!("No config file found, using defaults"),
    }

    match run(args.command, config).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Write a default configuration file, refusing to overwrite.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Logs go to stderr so stdout only carries the envelope.
fn init_logging(args: &Args, config: &Config) -> Result<()> {
    let level = if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Build the service, run one command and print its envelope.
///
/// Returns whether the envelope reports success.
async fn run(command: Command, config: Config) -> Result<bool> {
    let store = MetricStore::new(&config.storage.data_root);
    let backend = OllamaBackend::new(&config.backend)?;
    let synthesizer = Synthesizer::new(backend, &config.backend);
    let service = MetricsService::new(store, synthesizer);

    debug!(
        "Data root {}, backend {} ({})",
        config.storage.data_root.display(),
        config.backend.url,
        config.backend.model
    );

    let envelope = commands::dispatch(&service, command).await?;
    let output =
        serde_json::to_string_pretty(&envelope).context("Failed to serialize response")?;
    println!("{}", output);

    Ok(envelope.success)
}

/// Load configuration from the given file, the default file, or defaults.
///
/// Also returns the path the configuration came from.
fn load_config(args: &Args) -> Result<(Config, Option<String>)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, Some(config_path.display().to_string())));
    }

    match Config::load_default()? {
        Some(config) => Ok((config, Some(DEFAULT_CONFIG_FILE.to_string()))),
        None => Ok((Config::default(), None)),
    }
}
