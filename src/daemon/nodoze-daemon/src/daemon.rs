//! Gating engine
//! Sanitizes the watched directories, builds the configured policy and runs
//! it until a shutdown signal arrives

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use nodoze_system::{Actuator, BlockDevices};
use tracing::{error, info, warn};

use crate::config::GateConfig;
use crate::metrics::MetricsCollector;
use crate::policy::Policy;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Main daemon orchestrator
pub struct GatingEngine {
    config: GateConfig,
    devices: BlockDevices,
    metrics: Arc<MetricsCollector>,
}

impl GatingEngine {
    pub fn new(config: GateConfig) -> Self {
        Self::with_devices(config, BlockDevices::new())
    }

    /// Use a custom mount table and `/sys/block` root
    pub fn with_devices(config: GateConfig, devices: BlockDevices) -> Self {
        Self {
            config,
            devices,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// Keep the directories that exist and can hold a sentinel file.
    /// Dropped ones are logged and never retried.
    pub fn sanitize(&self) -> Vec<PathBuf> {
        self.config
            .dirs
            .iter()
            .filter(|dir| {
                if !dir.is_dir() {
                    warn!("{}: not a directory, ignored", dir.display());
                    return false;
                }
                match Actuator::prepare(dir) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("{}: {}, ignored", dir.display(), e);
                        false
                    }
                }
            })
            .cloned()
            .collect()
    }

    /// Sanitize and build the policy without starting it
    pub fn prepare(&self) -> Result<Policy> {
        let dirs = self.sanitize();
        if dirs.is_empty() {
            error!("No dirs to proceed");
            anyhow::bail!("no dirs to proceed");
        }

        let policy = Policy::build(&self.config, dirs, &self.devices)
            .inspect_err(|e| error!("{:#}", e))?;
        self.metrics.set_watched_directories(policy.len());
        info!(
            "{} policy over {} director{}",
            policy.name(),
            policy.len(),
            if policy.len() == 1 { "y" } else { "ies" }
        );
        Ok(policy)
    }

    /// Run until SIGINT/SIGTERM. Fails before looping if nothing is left to watch.
    pub async fn run(self) -> Result<()> {
        let policy = self.prepare()?;
        let mut actuator = Actuator::new();

        tokio::select! {
            _ = policy.run(&mut actuator, &self.metrics) => {},
            _ = shutdown_signal() => {},
        }

        let stats = self.metrics.get_stats();
        info!(
            "Stopped after {}s: {} ticks, {} tocks, {} idle cycles",
            stats.uptime_seconds, stats.ticks, stats.tocks, stats.idle_cycles
        );
        Ok(())
    }
}
