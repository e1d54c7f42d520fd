//! Somnus Daemon - function lifecycle and sleep-mode orchestrator
//!
//! - `run`: periodic monitoring until SIGINT/SIGTERM
//! - `check`: validate the registry file
//! - `analyze`: print risk findings and sleep candidates as JSON

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use somnus_daemon::{commands, DaemonConfig, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Somnus Daemon CLI
#[derive(Parser)]
#[command(name = "somnusd")]
#[command(about = "Somnus - function lifecycle and sleep-mode orchestrator", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short, long, env = "SOMNUS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Registry file, overrides the configured path
    #[arg(short, long, env = "SOMNUS_REGISTRY_PATH", global = true)]
    registry: Option<PathBuf>,

    /// Log level, overrides the configured level
    #[arg(long, env = "SOMNUS_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "SOMNUS_LOG_JSON", global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor the registry until interrupted
    Run,
    /// Load and validate the registry, exiting non-zero on corruption
    Check,
    /// Print findings, classifications and sleep candidates as JSON
    Analyze {
        /// Maximum candidates to propose
        #[arg(long, default_value_t = 20)]
        max_batch: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        DaemonConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(registry) = cli.registry {
        config.registry_path = registry;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }

    init_tracing(&config);

    match cli.command {
        Command::Run => {
            let server = Server::new(config)
                .await
                .context("failed to start daemon")?;
            server.run().await?;
        }
        Command::Check => {
            let summary = commands::check(&config)
                .await
                .context("registry check failed")?;
            println!(
                "Registry OK: {} functions, {} sleeping",
                summary.functions, summary.sleeping
            );
        }
        Command::Analyze { max_batch } => {
            let report = commands::analyze(&config, max_batch).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing(config: &DaemonConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
