//! Syncward Daemon - background sync orchestration service
//!
//! This binary runs as a user service and handles:
//! - Serialized execution of configured sync jobs through one orchestrator
//! - Connectivity tracking via a TCP reachability probe
//! - Logging of every sync status transition
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon builds a single [`Orchestrator`], starts its worker, and wires
//! the connectivity probe and one scheduler per configured job to it. Every
//! task listens on a shared `CancellationToken` that is triggered on receipt
//! of SIGTERM or SIGINT.

mod jobs;
mod probe;

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use syncward_core::config::{Config, LoggingConfig, ValidationError};
use syncward_core::domain::{OrchestratorState, SyncStatus};
use syncward_core::ports::SyncToggle;
use syncward_sync::{ConnectivityMonitor, Orchestrator, OrchestratorConfig, Subscription};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::jobs::JobScheduler;
use crate::probe::ReachabilityProbe;

/// Capacity of the probe → monitor channel
const CONNECTIVITY_CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the orchestrator and every task feeding it
struct DaemonService {
    config: Config,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, shutdown: CancellationToken) -> Self {
        let gate = Arc::new(SyncToggle::new(config.sync.enabled));
        if !config.sync.enabled {
            warn!("Sync is disabled in configuration, submissions will be dropped");
        }

        let orchestrator = Orchestrator::new(OrchestratorConfig::from(&config), gate);

        Self {
            config,
            orchestrator,
            shutdown,
        }
    }

    /// Runs until shutdown is requested, then waits for the worker to stop
    async fn run(&self) -> Result<()> {
        let _status_log = log_transitions(&self.orchestrator);

        let worker = self.orchestrator.spawn(self.shutdown.clone());

        let (events_tx, events_rx) = mpsc::channel(CONNECTIVITY_CHANNEL_CAPACITY);
        let mut monitor = ConnectivityMonitor::new(events_rx, Arc::clone(&self.orchestrator));
        tokio::spawn(async move { monitor.run().await });

        let probe = ReachabilityProbe::new(&self.config.connectivity, events_tx);
        tokio::spawn(probe.run(self.shutdown.clone()));

        if self.config.jobs.is_empty() {
            info!("No jobs configured, orchestrator is idle");
        }
        for job in &self.config.jobs {
            let scheduler = JobScheduler::new(job.clone(), Arc::clone(&self.orchestrator));
            tokio::spawn(scheduler.run(self.shutdown.clone()));
        }

        self.shutdown.cancelled().await;
        info!("Shutdown requested, stopping orchestrator");

        worker.await.context("Orchestrator worker panicked")?;

        let pending = self.orchestrator.queue_info().len();
        if pending > 0 {
            warn!(pending, "Discarding queued operations at shutdown");
        }
        Ok(())
    }
}

/// Subscribes a listener that logs each status change
fn log_transitions(orchestrator: &Orchestrator) -> Subscription {
    let previous = Mutex::new(None::<SyncStatus>);
    orchestrator.subscribe(move |state: &OrchestratorState| {
        let mut previous = previous
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if *previous == Some(state.status) {
            return;
        }
        *previous = Some(state.status);

        match state.status {
            SyncStatus::Error | SyncStatus::Conflict => warn!(
                status = %state.status,
                error = state.last_error.as_deref().unwrap_or(""),
                queue_length = state.queue_length,
                online = state.is_online,
                "Sync status changed"
            ),
            _ => info!(
                status = %state.status,
                kind = ?state.current_operation_kind.as_ref().or(state.last_sync_kind.as_ref()),
                queue_length = state.queue_length,
                "Sync status changed"
            ),
        }
    })
}

// ============================================================================
// Startup helpers
// ============================================================================

/// Loads the configuration file, keeping the load error for later logging
///
/// A missing file is not an error; the defaults are used silently.
fn load_config(path: &Path) -> (Config, Option<anyhow::Error>) {
    if !path.exists() {
        return (Config::default(), None);
    }
    match Config::load(path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    }
}

/// Rejects a configuration that fails validation in favour of the defaults
fn validated(config: Config) -> (Config, Vec<ValidationError>) {
    let problems = config.validate();
    if problems.is_empty() {
        (config, problems)
    } else {
        (Config::default(), problems)
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Waits for SIGINT or SIGTERM, then cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_path();
    let (config, load_error) = load_config(&config_path);
    let (config, problems) = validated(config);

    init_tracing(&config.logging);

    info!(config_path = %config_path.display(), "Syncward daemon starting (syncwardd)");
    if let Some(e) = load_error {
        warn!(error = %e, "Failed to load configuration, using defaults");
    }
    if !problems.is_empty() {
        for problem in &problems {
            warn!(field = %problem.field, "Invalid configuration: {}", problem.message);
        }
        warn!(errors = problems.len(), "Configuration rejected, using defaults");
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token);
    let result = service.run().await;

    match &result {
        Ok(()) => info!("Syncward daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Syncward daemon exiting with error"),
    }

    result
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use syncward_core::config::{ConfigBuilder, JobConfig};
    use syncward_core::domain::{Priority, SyncKind};

    use super::*;

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, err) = load_config(&dir.path().join("absent.yaml"));
        assert!(err.is_none());
        assert!(config.sync.enabled);
        assert!(config.jobs.is_empty());
    }

    #[test]
    fn test_load_config_keeps_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sync: [not, a, mapping]").unwrap();

        let (config, err) = load_config(file.path());
        assert!(err.is_some());
        assert_eq!(config.sync.default_priority, Config::default().sync.default_priority);
    }

    #[test]
    fn test_load_config_reads_jobs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "jobs:\n  - kind: backup\n    priority: 9\n    interval_secs: 300\n    command: [\"true\"]"
        )
        .unwrap();

        let (config, err) = load_config(file.path());
        assert!(err.is_none(), "{err:?}");
        assert_eq!(config.jobs.len(), 1);
        assert_eq!(config.jobs[0].kind, SyncKind::Backup);
        assert_eq!(config.jobs[0].priority, Some(Priority::new(9)));
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let config = ConfigBuilder::new()
            .retry_base_delay_ms(0)
            .sync_default_priority(9)
            .build();

        let (config, problems) = validated(config);
        assert!(problems.iter().any(|p| p.field == "retry.base_delay_ms"));
        assert_eq!(config.retry.base_delay_ms, Config::default().retry.base_delay_ms);
        assert_eq!(config.sync.default_priority, Config::default().sync.default_priority);
    }

    #[test]
    fn test_valid_config_is_kept() {
        let config = ConfigBuilder::new().sync_default_priority(9).build();
        let (config, problems) = validated(config);
        assert!(problems.is_empty());
        assert_eq!(config.sync.default_priority, 9);
    }

    #[test]
    fn test_disabled_config_drops_submissions() {
        let config = ConfigBuilder::new().sync_enabled(false).build();
        let service = DaemonService::new(config, CancellationToken::new());
        let submitted = service.orchestrator.submit(
            SyncKind::Tasks,
            || async { Ok::<(), syncward_core::domain::ExecutorError>(()) },
            Default::default(),
        );
        assert!(submitted.is_none());
    }

    #[test]
    fn test_log_transitions_subscribes() {
        let config = Config::default();
        let service = DaemonService::new(config, CancellationToken::new());
        let subscription = log_transitions(&service.orchestrator);
        service.orchestrator.clear_queue();
        subscription.unsubscribe();
    }

    #[tokio::test]
    async fn test_run_returns_after_shutdown() {
        let config = ConfigBuilder::new()
            .connectivity_probe_addr("127.0.0.1:1")
            .job(JobConfig {
                kind: SyncKind::Settings,
                priority: None,
                max_attempts: Some(0),
                interval_secs: 3600,
                command: vec!["true".to_string()],
            })
            .build();
        let shutdown = CancellationToken::new();
        let service = DaemonService::new(config, shutdown.clone());

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        tokio::time::timeout(Duration::from_secs(10), service.run())
            .await
            .expect("daemon should stop after shutdown")
            .unwrap();
    }
}
