use std::path::PathBuf;
use std::time::Duration;

use nodoze_system::{service_available, Actuator};
use tracing::info;

use super::{actuate_all, Cycle};
use crate::metrics::MetricsCollector;

/// Actuate every directory while a TCP endpoint accepts connections
pub struct ServiceGate {
    dirs: Vec<PathBuf>,
    endpoint: String,
    timeout: Duration,
    interval: Duration,
}

impl ServiceGate {
    pub fn new(dirs: Vec<PathBuf>, endpoint: String, timeout: Duration, interval: Duration) -> Self {
        Self {
            dirs,
            endpoint,
            timeout,
            interval,
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn cycle(&self, actuator: &mut Actuator, metrics: &MetricsCollector) -> Cycle {
        if !service_available(&self.endpoint, self.timeout).await {
            info!("{} unavailable, idle", self.endpoint);
            metrics.record_idle();
            return Cycle::Idle;
        }
        actuate_all(&self.dirs, actuator, metrics)
    }

    pub async fn run(&self, actuator: &mut Actuator, metrics: &MetricsCollector) {
        loop {
            self.cycle(actuator, metrics).await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodoze_system::SENTINEL_FILE_NAME;
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_acts_only_while_reachable() {
        let dir = tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let gate = ServiceGate::new(
            vec![dir.path().to_path_buf()],
            endpoint,
            Duration::from_millis(500),
            Duration::from_secs(30),
        );
        let metrics = MetricsCollector::new();
        let mut actuator = Actuator::new();

        assert_eq!(
            gate.cycle(&mut actuator, &metrics).await,
            Cycle::Active { actuated: 1 }
        );
        assert!(dir.path().join(SENTINEL_FILE_NAME).exists());

        drop(listener);
        assert_eq!(gate.cycle(&mut actuator, &metrics).await, Cycle::Idle);
        assert_eq!(metrics.get_stats().idle_cycles, 1);
    }

    #[tokio::test]
    async fn test_malformed_endpoint_is_idle() {
        let dir = tempdir().unwrap();
        let gate = ServiceGate::new(
            vec![dir.path().to_path_buf()],
            "not an endpoint".to_string(),
            Duration::from_millis(200),
            Duration::from_secs(30),
        );
        let metrics = MetricsCollector::new();
        let mut actuator = Actuator::new();
        assert_eq!(gate.cycle(&mut actuator, &metrics).await, Cycle::Idle);
        assert!(!dir.path().join(SENTINEL_FILE_NAME).exists());
    }
}
