//! nodoze daemon library
//!
//! Keeps directories (and the disks behind them) from spinning down by
//! periodically touching a sentinel file, gated by a time window, recent
//! block-device I/O or the reachability of a network service.

pub mod config;
pub mod daemon;
pub mod metrics;
pub mod policy;

pub use config::{ConfigManager, DaemonConfig, GateConfig, PolicyConfig};
pub use daemon::GatingEngine;
pub use metrics::{MetricsCollector, MetricsStats};
pub use policy::{Cycle, Policy};
