//! Configuration loading and validation
//! Follows SRP: Only handles configuration loading and validation

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use nodoze_core::{TimeOfDay, TimeRange};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_SCAN_FREQUENCY_SECS: u64 = 1;
pub const DEFAULT_KEEP_AWAKE_SECS: u64 = 300;
pub const DEFAULT_SERVICE_TIMEOUT_MS: u64 = 1000;

/// Main daemon configuration, as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directories to keep awake
    pub dirs: Vec<PathBuf>,
    /// Seconds between actuations
    pub interval: u64,
    /// Which gate decides whether to actuate
    pub policy: PolicyKind,
    /// Seconds between I/O scans (monitor_io)
    pub scan_frequency: u64,
    /// Seconds to keep actuating after the last detected I/O (monitor_io)
    pub keep_awake: u64,
    /// `host:port` to probe (service_available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Connect timeout for the probe in milliseconds (service_available)
    pub service_timeout_ms: u64,
    /// Active window (time_range). Omitted bounds match every time.
    pub time_range: TimeRange,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    TimeRange,
    MonitorIo,
    ServiceAvailable,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            dirs: vec![],
            interval: DEFAULT_INTERVAL_SECS,
            policy: PolicyKind::default(),
            scan_frequency: DEFAULT_SCAN_FREQUENCY_SECS,
            keep_awake: DEFAULT_KEEP_AWAKE_SECS,
            service: None,
            service_timeout_ms: DEFAULT_SERVICE_TIMEOUT_MS,
            time_range: TimeRange::ALWAYS,
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9091,
        }
    }
}

impl DaemonConfig {
    /// Starting point written by `nodoze config`
    pub fn example() -> Self {
        let night = TimeOfDay::new(22, 0, 0).ok();
        let morning = TimeOfDay::new(6, 0, 0).ok();
        Self {
            dirs: vec![PathBuf::from("/mnt/storage")],
            time_range: match (night, morning) {
                (Some(start), Some(end)) => TimeRange::new(start, end),
                _ => TimeRange::ALWAYS,
            },
            ..Self::default()
        }
    }
}

/// Validated, immutable configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    pub dirs: BTreeSet<PathBuf>,
    pub interval: Duration,
    pub policy: PolicyConfig,
}

/// Policy selection with its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyConfig {
    TimeRange {
        range: TimeRange,
    },
    MonitorIo {
        scan_frequency: Duration,
        keep_awake: Duration,
    },
    ServiceAvailable {
        endpoint: String,
        timeout: Duration,
    },
}

impl GateConfig {
    /// Timing and endpoint rules every run configuration must satisfy,
    /// however it was built
    pub fn check(&self) -> Result<()> {
        if self.interval.is_zero() {
            anyhow::bail!("`interval` must be > 0");
        }
        match &self.policy {
            PolicyConfig::TimeRange { .. } => {}
            PolicyConfig::MonitorIo { scan_frequency, .. } => {
                if scan_frequency.is_zero() {
                    anyhow::bail!("`scan_frequency` must be > 0");
                }
                if *scan_frequency > self.interval {
                    anyhow::bail!(
                        "`scan_frequency` ({:?}) must not exceed `interval` ({:?})",
                        scan_frequency,
                        self.interval
                    );
                }
            }
            PolicyConfig::ServiceAvailable { endpoint, timeout } => {
                if endpoint.trim().is_empty() {
                    anyhow::bail!("`service` must not be blank");
                }
                if timeout.is_zero() {
                    anyhow::bail!("`service_timeout_ms` must be > 0");
                }
            }
        }
        Ok(())
    }

    pub fn time_range(
        dirs: impl IntoIterator<Item = PathBuf>,
        interval: Duration,
        range: TimeRange,
    ) -> Self {
        Self {
            dirs: dirs.into_iter().collect(),
            interval,
            policy: PolicyConfig::TimeRange { range },
        }
    }

    pub fn monitor_io(
        dirs: impl IntoIterator<Item = PathBuf>,
        interval: Duration,
        scan_frequency: Duration,
        keep_awake: Duration,
    ) -> Self {
        Self {
            dirs: dirs.into_iter().collect(),
            interval,
            policy: PolicyConfig::MonitorIo {
                scan_frequency,
                keep_awake,
            },
        }
    }

    pub fn service_available(
        dirs: impl IntoIterator<Item = PathBuf>,
        interval: Duration,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            dirs: dirs.into_iter().collect(),
            interval,
            policy: PolicyConfig::ServiceAvailable {
                endpoint: endpoint.into(),
                timeout: Duration::from_millis(DEFAULT_SERVICE_TIMEOUT_MS),
            },
        }
    }
}

/// On-disk encoding, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }

    pub fn parse(self, contents: &str) -> Result<DaemonConfig> {
        match self {
            ConfigFormat::Toml => toml::from_str(contents).context("Failed to parse TOML config"),
            ConfigFormat::Json => {
                serde_json::from_str(contents).context("Failed to parse JSON config")
            }
        }
    }

    pub fn render(self, config: &DaemonConfig) -> Result<String> {
        match self {
            ConfigFormat::Toml => Ok(toml::to_string_pretty(config)?),
            ConfigFormat::Json => Ok(serde_json::to_string_pretty(config)?),
        }
    }
}

/// Default config location: `<user config dir>/nodoze/conf`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nodoze").join("conf"))
}

/// Configuration manager
pub struct ConfigManager {
    config: DaemonConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self::with_config(DaemonConfig::default())
    }

    pub fn with_config(config: DaemonConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    /// Load configuration from file
    pub async fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_str = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        self.config = ConfigFormat::from_path(path)
            .parse(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        self.config_path = Some(path.to_path_buf());

        info!("Loaded configuration from: {}", path.display());
        Ok(())
    }

    /// Save current configuration to file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_str = ConfigFormat::from_path(path).render(&self.config)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(path, config_str)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get current configuration
    pub fn get_config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Validate configuration and produce the run configuration
    pub fn validate(config: &DaemonConfig) -> Result<GateConfig> {
        if config.dirs.is_empty() {
            anyhow::bail!("`dirs` must list at least one directory");
        }

        let policy = match config.policy {
            PolicyKind::TimeRange => PolicyConfig::TimeRange {
                range: config.time_range,
            },
            PolicyKind::MonitorIo => PolicyConfig::MonitorIo {
                scan_frequency: Duration::from_secs(config.scan_frequency),
                keep_awake: Duration::from_secs(config.keep_awake),
            },
            PolicyKind::ServiceAvailable => {
                let endpoint = config
                    .service
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        anyhow::anyhow!("`service` is required for the service_available policy")
                    })?;
                PolicyConfig::ServiceAvailable {
                    endpoint: endpoint.to_string(),
                    timeout: Duration::from_millis(config.service_timeout_ms),
                }
            }
        };

        let gate = GateConfig {
            dirs: config.dirs.iter().cloned().collect(),
            interval: Duration::from_secs(config.interval),
            policy,
        };
        gate.check()?;
        Ok(gate)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
