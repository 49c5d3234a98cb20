//! Connectivity monitor - forwards online/offline transitions to the orchestrator
//!
//! The platform signal source (a reachability probe, a network-manager
//! listener, a test) sends [`ConnectivityEvent`]s into an `mpsc` channel.
//! [`ConnectivityMonitor::run`] consumes them and forwards each one to
//! [`Orchestrator::set_online`], which ignores events matching its current
//! state.
//!
//! ```text
//! event source ──→ mpsc::Receiver ──→ ConnectivityMonitor ──→ Orchestrator::set_online
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::orchestrator::Orchestrator;

/// A platform-level connectivity signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl ConnectivityEvent {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityEvent::Online)
    }
}

/// Consumes connectivity events and drives the orchestrator's online gate
pub struct ConnectivityMonitor {
    events_rx: mpsc::Receiver<ConnectivityEvent>,
    orchestrator: Arc<Orchestrator>,
}

impl ConnectivityMonitor {
    pub fn new(events_rx: mpsc::Receiver<ConnectivityEvent>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            events_rx,
            orchestrator,
        }
    }

    /// Current online flag of the orchestrator
    pub fn is_online(&self) -> bool {
        self.orchestrator.is_online()
    }

    /// Applies one event; returns true if it was a transition
    pub fn handle(&mut self, event: ConnectivityEvent) -> bool {
        let changed = self.orchestrator.set_online(event.is_online());
        if !changed {
            debug!(?event, "Ignoring repeated connectivity event");
        }
        changed
    }

    /// Processes events until the sending side is dropped
    pub async fn run(&mut self) {
        info!(online = self.is_online(), "Connectivity monitor starting");

        while let Some(event) = self.events_rx.recv().await {
            self.handle(event);
        }

        info!("Connectivity event channel closed, monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use syncward_core::ports::SyncToggle;

    use super::*;
    use crate::orchestrator::OrchestratorConfig;

    fn orchestrator() -> Arc<Orchestrator> {
        Orchestrator::new(OrchestratorConfig::default(), Arc::new(SyncToggle::default()))
    }

    #[test]
    fn test_event_from_online() {
        assert_eq!(ConnectivityEvent::from_online(true), ConnectivityEvent::Online);
        assert_eq!(ConnectivityEvent::from_online(false), ConnectivityEvent::Offline);
        assert!(!ConnectivityEvent::Offline.is_online());
    }

    #[test]
    fn test_handle_ignores_repeats() {
        let orch = orchestrator();
        let (_tx, rx) = mpsc::channel(4);
        let mut monitor = ConnectivityMonitor::new(rx, Arc::clone(&orch));

        assert!(!monitor.handle(ConnectivityEvent::Online));
        assert!(monitor.handle(ConnectivityEvent::Offline));
        assert!(!monitor.handle(ConnectivityEvent::Offline));
        assert!(!orch.is_online());
        assert!(!monitor.is_online());

        assert!(monitor.handle(ConnectivityEvent::Online));
        assert!(orch.is_online());
    }

    #[test]
    fn test_handle_follows_direct_set_online() {
        let orch = orchestrator();
        let (_tx, rx) = mpsc::channel(4);
        let mut monitor = ConnectivityMonitor::new(rx, Arc::clone(&orch));

        orch.set_online(false);
        assert!(!monitor.is_online());

        assert!(monitor.handle(ConnectivityEvent::Online));
        assert!(orch.is_online());
        assert!(orch.state().is_online);

        orch.set_online(false);
        assert!(!monitor.handle(ConnectivityEvent::Offline));
        assert!(monitor.handle(ConnectivityEvent::Online));
        assert!(orch.is_online());
    }

    #[tokio::test]
    async fn test_run_forwards_events_and_exits_on_close() {
        let orch = orchestrator();
        let (tx, rx) = mpsc::channel(4);
        let mut monitor = ConnectivityMonitor::new(rx, Arc::clone(&orch));

        tx.send(ConnectivityEvent::Offline).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), monitor.run())
            .await
            .expect("monitor should exit when the channel closes");

        assert!(!orch.is_online());
        assert!(!orch.state().is_online);
    }
}
