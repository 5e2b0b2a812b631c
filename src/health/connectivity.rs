//! Connectivity monitoring.
//!
//! # Responsibilities
//! - Periodically probe the API host with a TCP connect
//! - Detect offline → online transitions
//! - Reset all endpoint error state when connectivity comes back

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;
use url::Url;

use crate::api::DataService;
use crate::config::ConnectivityConfig;
use crate::observability::metrics;

/// Last observed reachability of the API host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Unknown,
    Online,
    Offline,
}

impl Reachability {
    /// Next state after a probe, and whether it counts as a restoration.
    pub fn transition(self, online: bool) -> (Reachability, bool) {
        match (self, online) {
            (Reachability::Offline, true) => (Reachability::Online, true),
            (_, true) => (Reachability::Online, false),
            (_, false) => (Reachability::Offline, false),
        }
    }
}

pub struct ConnectivityMonitor {
    service: DataService,
    config: ConnectivityConfig,
    target: String,
    state: Reachability,
}

impl ConnectivityMonitor {
    /// Returns `None` when the base URL has no host to probe.
    pub fn new(service: DataService, config: ConnectivityConfig) -> Option<Self> {
        let url = Url::parse(service.client().base_url()).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        // host_str keeps the brackets around IPv6 literals
        let target = format!("{}:{}", host, port);

        Some(Self {
            service,
            config,
            target,
            state: Reachability::Unknown,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> Reachability {
        self.state
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Connectivity monitor disabled");
            return;
        }

        tracing::info!(
            host = %self.target,
            interval_ms = self.config.interval_ms,
            "Connectivity monitor starting"
        );

        let mut ticker = time::interval(Duration::from_millis(self.config.interval_ms));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let online = self.probe().await;
                    self.observe(online);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Connectivity monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Single TCP connect attempt against the API host.
    pub async fn probe(&self) -> bool {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        match time::timeout(timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(host = %self.target, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(host = %self.target, "Connectivity probe timed out");
                false
            }
        }
    }

    /// Feed a probe result. Returns true when connectivity was restored.
    pub fn observe(&mut self, online: bool) -> bool {
        let (next, restored) = self.state.transition(online);
        if next != self.state && next == Reachability::Offline {
            tracing::warn!(host = %self.target, "Network connection lost");
        }
        self.state = next;

        if restored {
            tracing::info!(host = %self.target, "Network connection restored");
            self.service.reset_all_error_status();
            metrics::record_reset("connectivity");
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::http::ResilientClient;

    fn service(base_url: &str) -> DataService {
        let mut config = ClientConfig::default();
        config.api.base_url = base_url.to_string();
        DataService::new(ResilientClient::new(&config).unwrap(), &config)
    }

    #[test]
    fn test_transitions() {
        assert_eq!(Reachability::Unknown.transition(true), (Reachability::Online, false));
        assert_eq!(Reachability::Unknown.transition(false), (Reachability::Offline, false));
        assert_eq!(Reachability::Offline.transition(true), (Reachability::Online, true));
        assert_eq!(Reachability::Online.transition(false), (Reachability::Offline, false));
        assert_eq!(Reachability::Online.transition(true), (Reachability::Online, false));
    }

    #[test]
    fn test_target_from_base_url() {
        let monitor = ConnectivityMonitor::new(service("https://api.example.com"), ConnectivityConfig::default()).unwrap();
        assert_eq!(monitor.target(), "api.example.com:443");

        let monitor = ConnectivityMonitor::new(service("http://127.0.0.1:7000/v1"), ConnectivityConfig::default()).unwrap();
        assert_eq!(monitor.target(), "127.0.0.1:7000");
    }

    #[test]
    fn test_restoration_resets_error_state() {
        let service = service("http://127.0.0.1:7000");
        let endpoint = "http://127.0.0.1:7000/pairs";
        let mut monitor = ConnectivityMonitor::new(service.clone(), ConnectivityConfig::default()).unwrap();

        service.client().registry().register_error(endpoint);
        assert!(!monitor.observe(false));
        assert!(service.client().registry().is_disabled(endpoint));

        assert!(monitor.observe(true));
        assert!(service.client().registry().is_empty());
        assert_eq!(monitor.state(), Reachability::Online);
    }

    #[tokio::test]
    async fn test_probe_reachable_and_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let monitor = ConnectivityMonitor::new(service(&format!("http://{}", addr)), ConnectivityConfig::default()).unwrap();
        assert!(monitor.probe().await);

        drop(listener);
        assert!(!monitor.probe().await);
    }
}
