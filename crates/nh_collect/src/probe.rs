//! Reachability probing

use async_trait::async_trait;
use nh_config::NhConfig;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Decides whether a device is worth running a sequence against
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self, host: &str) -> bool;
}

/// TCP connect probe; any failure or timeout means unreachable
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    #[must_use]
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    #[must_use]
    pub fn from_config(config: &NhConfig) -> Self {
        Self::new(config.probe.port, config.probe_timeout())
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn is_reachable(&self, host: &str) -> bool {
        let target = (host, self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(host, port = self.port, error = %e, "Probe connect failed");
                false
            }
            Err(_) => {
                debug!(host, port = self.port, "Probe timed out");
                false
            }
        }
    }
}
