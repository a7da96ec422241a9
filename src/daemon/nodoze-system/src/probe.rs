//! TCP reachability probe

use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

/// Whether a TCP connection to `endpoint` (`"host:port"`) can be opened
/// within `timeout`.
///
/// Malformed endpoints, resolution failures, refused connections and
/// timeouts all report `false`.
pub async fn service_available(endpoint: &str, timeout: Duration) -> bool {
    let attempt = async {
        let addrs = match lookup_host(endpoint).await {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("Failed to resolve {}: {}", endpoint, e);
                return false;
            }
        };
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(_) => return true,
                Err(e) => debug!("Connect to {} failed: {}", addr, e),
            }
        }
        false
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(available) => available,
        Err(_) => {
            debug!("Probe of {} timed out after {:?}", endpoint, timeout);
            false
        }
    }
}
