//! TCP reachability probe
//!
//! Periodically opens a TCP connection to `connectivity.probe_addr` and
//! feeds [`ConnectivityEvent`]s to the connectivity monitor. An event is
//! only sent when reachability changes.

use std::time::Duration;

use syncward_core::config::ConnectivityConfig;
use syncward_sync::ConnectivityEvent;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct ReachabilityProbe {
    addr: String,
    interval: Duration,
    timeout: Duration,
    events_tx: mpsc::Sender<ConnectivityEvent>,
    last_reported: Option<bool>,
}

impl ReachabilityProbe {
    pub fn new(config: &ConnectivityConfig, events_tx: mpsc::Sender<ConnectivityEvent>) -> Self {
        Self {
            addr: config.probe_addr.clone(),
            interval: Duration::from_secs(config.probe_interval_secs.max(1)),
            timeout: Duration::from_secs(config.probe_timeout_secs.max(1)),
            events_tx,
            last_reported: None,
        }
    }

    /// Attempts one connection to the probe address
    pub async fn check(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "Reachability probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, timeout_secs = self.timeout.as_secs(), "Reachability probe timed out");
                false
            }
        }
    }

    /// Sends an event if `online` differs from the last report
    ///
    /// Returns false once the receiving side has gone away.
    pub async fn report(&mut self, online: bool) -> bool {
        if self.last_reported == Some(online) {
            return true;
        }
        self.last_reported = Some(online);

        if self
            .events_tx
            .send(ConnectivityEvent::from_online(online))
            .await
            .is_err()
        {
            debug!("Connectivity channel closed, stopping probe");
            return false;
        }
        true
    }

    /// Probes every `probe_interval_secs` until `shutdown` fires
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            addr = %self.addr,
            interval_secs = self.interval.as_secs(),
            "Starting reachability probe"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let online = self.check().await;
                    if !self.report(online).await {
                        break;
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    fn probe_for(addr: String) -> (ReachabilityProbe, mpsc::Receiver<ConnectivityEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let config = ConnectivityConfig {
            probe_addr: addr,
            probe_interval_secs: 1,
            probe_timeout_secs: 2,
        };
        (ReachabilityProbe::new(&config, tx), rx)
    }

    #[tokio::test]
    async fn test_check_reachable_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (probe, _rx) = probe_for(listener.local_addr().unwrap().to_string());
        assert!(probe.check().await);
    }

    #[tokio::test]
    async fn test_check_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let (probe, _rx) = probe_for(addr);
        assert!(!probe.check().await);
    }

    #[tokio::test]
    async fn test_report_only_sends_changes() {
        let (mut probe, mut rx) = probe_for("127.0.0.1:1".to_string());

        assert!(probe.report(true).await);
        assert!(probe.report(true).await);
        assert!(probe.report(false).await);
        assert!(probe.report(false).await);
        assert!(probe.report(true).await);

        assert_eq!(rx.recv().await, Some(ConnectivityEvent::Online));
        assert_eq!(rx.recv().await, Some(ConnectivityEvent::Offline));
        assert_eq!(rx.recv().await, Some(ConnectivityEvent::Online));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_report_detects_closed_channel() {
        let (mut probe, rx) = probe_for("127.0.0.1:1".to_string());
        drop(rx);
        assert!(!probe.report(false).await);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (probe, mut rx) = probe_for(listener.local_addr().unwrap().to_string());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(probe.run(shutdown.clone()));

        assert_eq!(rx.recv().await, Some(ConnectivityEvent::Online));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("probe should stop on shutdown")
            .unwrap();
    }
}
