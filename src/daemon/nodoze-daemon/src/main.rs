//! nodoze - keep disks from spinning down
//!
//! Periodically touches a sentinel file in each watched directory, gated by
//! a time window, recent block-device I/O or a reachable service.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use nodoze_daemon::config::{default_config_path, ConfigManager, DaemonConfig, LogFormat, LoggingConfig};
use nodoze_daemon::GatingEngine;
use nodoze_system::{BlockDevices, SECTOR_SIZE};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// nodoze - keep watched directories awake
#[derive(Parser)]
#[command(name = "nodoze")]
#[command(about = "Keeps disks awake by touching a sentinel file under a gating policy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start(StartArgs),
    /// Validate configuration
    Validate(ValidateArgs),
    /// Generate an example configuration
    Config(ConfigArgs),
    /// Show the block device and counters behind a path or device
    Inspect(InspectArgs),
}

#[derive(Args)]
struct StartArgs {
    /// Configuration file path (default: <config dir>/nodoze/conf)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Args)]
struct ValidateArgs {
    /// Configuration file to validate
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Output file for generated config (`.toml` for TOML, JSON otherwise)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Mount point, directory, `/dev/...` path or block device name
    target: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => start_daemon(args).await,
        Commands::Validate(args) => validate_config(args).await,
        Commands::Config(args) => generate_config(args).await,
        Commands::Inspect(args) => inspect(args),
    }
}

fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    explicit
        .or_else(default_config_path)
        .context("No config path given and no user config directory found")
}

/// Load the config file and start tracing with its logging settings.
/// A file that cannot be loaded is reported through default tracing.
async fn load_config(path: &Path, debug: bool) -> Result<ConfigManager> {
    let mut config_manager = ConfigManager::new();
    match config_manager.load_from_file(path).await {
        Ok(()) => {
            init_tracing(&config_manager.get_config().logging, debug)?;
            info!("Starting nodoze v{}", env!("CARGO_PKG_VERSION"));
            info!("Loaded configuration from: {}", path.display());
            Ok(config_manager)
        }
        Err(e) => {
            init_tracing(&LoggingConfig::default(), debug)?;
            error!("Failed to load configuration {}: {:#}", path.display(), e);
            Err(e)
        }
    }
}

async fn start_daemon(args: StartArgs) -> Result<()> {
    let path = config_path(args.config)?;
    let config_manager = load_config(&path, args.debug).await?;
    let config = config_manager.get_config();

    let gate = match ConfigManager::validate(config) {
        Ok(gate) => gate,
        Err(e) => {
            error!("Invalid configuration {}: {:#}", path.display(), e);
            return Err(e);
        }
    };

    if config.metrics.enabled {
        init_metrics(config)?;
    }

    GatingEngine::new(gate).run().await
}

async fn validate_config(args: ValidateArgs) -> Result<()> {
    let path = config_path(args.config)?;
    let mut config_manager = ConfigManager::new();
    config_manager.load_from_file(&path).await?;

    let gate = ConfigManager::validate(config_manager.get_config())?;
    println!("✓ Configuration is valid: {}", path.display());
    println!("  directories: {}", gate.dirs.len());
    println!("  interval:    {:?}", gate.interval);
    println!("  policy:      {:?}", gate.policy);
    Ok(())
}

async fn generate_config(args: ConfigArgs) -> Result<()> {
    let output = config_path(args.output)?;
    if output.exists() && !args.force {
        anyhow::bail!("Configuration file already exists: {}", output.display());
    }

    ConfigManager::with_config(DaemonConfig::example())
        .save_to_file(&output)
        .await?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let devices = BlockDevices::new();
    let counters = devices
        .resolve(&args.target)
        .with_context(|| format!("Cannot resolve {}", args.target))?;
    let totals = counters.read_totals()?;

    println!("{}", args.target);
    println!("  device:    {}", counters.device());
    println!("  stat file: {}", counters.stat_file().display());
    println!(
        "  reads:     {} ({} bytes)",
        totals.reads,
        totals.reads.saturating_mul(SECTOR_SIZE)
    );
    println!(
        "  writes:    {} ({} bytes)",
        totals.writes,
        totals.writes.saturating_mul(SECTOR_SIZE)
    );
    Ok(())
}

/// Initialize tracing/logging. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig, debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { logging.level.as_str() };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?,
    }

    if EnvFilter::try_new(level).is_err() {
        warn!("Unknown log level {:?}, using info", level);
    }
    Ok(())
}

/// Initialize Prometheus metrics
fn init_metrics(config: &DaemonConfig) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics.port))
        .install()?;

    info!("Metrics endpoint started on port {}", config.metrics.port);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_failure_is_returned_after_tracing_starts() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("conf");

        let err = load_config(&missing, false)
            .await
            .err()
            .expect("missing config must fail to load");
        assert!(err.to_string().contains("Failed to read config file"));
        // the subscriber is in place, so a second init is refused
        assert!(init_tracing(&LoggingConfig::default(), false).is_err());
    }
}
