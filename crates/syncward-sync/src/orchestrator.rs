//! Single-flight sync orchestrator
//!
//! The [`Orchestrator`] accepts operations from any task, keeps them in an
//! [`OperationQueue`], and drains that queue from one dedicated worker task.
//!
//! ## Flow
//!
//! ```text
//! submit() ──→ OperationQueue ──→ wake (Notify) ──→ worker ──→ drain()
//!                                                      │
//!                        ConnectivityMonitor ──→ set_online()
//!                                                      │
//!                                    RetryPolicy ←─────┤
//!                                                      ↓
//!                                               StatePublisher ──→ listeners
//! ```
//!
//! Only `drain()` invokes executors, and it runs under `drain_lock`, so at
//! most one executor is in flight no matter how many submissions race it.
//! A submission made while a drain is running leaves a wake permit behind;
//! the worker re-checks the queue as soon as the current pass ends, so no
//! work is missed.
//!
//! Submission is fire-and-forget: failures are never returned to the caller,
//! only published through [`OrchestratorState`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use syncward_core::config::Config;
use syncward_core::domain::{
    ExecutorError, OperationId, OrchestratorState, Priority, QueueEntryInfo, SyncKind,
    SyncOperation, SyncStatus,
};
use syncward_core::ports::{ISyncGate, SyncExecutor};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::publisher::{StatePublisher, Subscription};
use crate::queue::OperationQueue;
use crate::retry::{FailureClass, RetryDecision, RetryPolicy};

/// `last_error` published when the loop pauses for lack of connectivity
pub const OFFLINE_ERROR: &str = "offline";

// ============================================================================
// Configuration and submission options
// ============================================================================

/// Orchestrator tuning derived from [`Config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Priority for submissions that do not specify one
    pub default_priority: Priority,
    /// Retry budget for submissions that do not specify one
    pub default_max_attempts: u32,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            default_priority: Priority::new(config.sync.default_priority),
            default_max_attempts: config.sync.default_max_attempts,
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// Per-submission overrides; `None` falls back to [`OrchestratorConfig`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub priority: Option<Priority>,
    pub max_attempts: Option<u32>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(Priority::new(priority));
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Coordinates sync operations so that they never run concurrently
///
/// Construct one per application with [`Orchestrator::new`] and start its
/// worker with [`Orchestrator::spawn`]. Operations submitted before the
/// worker starts are kept and drained once it does.
pub struct Orchestrator {
    config: OrchestratorConfig,
    gate: Arc<dyn ISyncGate>,
    queue: Mutex<OperationQueue>,
    publisher: Arc<StatePublisher>,
    online: AtomicBool,
    wake: Notify,
    drain_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    /// Creates an orchestrator that starts online, idle and empty
    pub fn new(config: OrchestratorConfig, gate: Arc<dyn ISyncGate>) -> Arc<Self> {
        info!(
            default_priority = %config.default_priority,
            default_max_attempts = config.default_max_attempts,
            base_delay_ms = config.retry.base_delay().as_millis() as u64,
            max_delay_ms = config.retry.max_delay().as_millis() as u64,
            "Creating sync orchestrator"
        );

        Arc::new(Self {
            config,
            gate,
            queue: Mutex::new(OperationQueue::new()),
            publisher: StatePublisher::new(OrchestratorState::default()),
            online: AtomicBool::new(true),
            wake: Notify::new(),
            drain_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn queue(&self) -> MutexGuard<'_, OperationQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Enqueues `executor` as a new operation and wakes the worker
    ///
    /// Returns the new operation's id, or `None` when the sync gate reports
    /// synchronization disabled (nothing is queued in that case). The
    /// outcome of the operation is only visible through published state.
    pub fn submit<E>(
        &self,
        kind: SyncKind,
        executor: E,
        options: SubmitOptions,
    ) -> Option<OperationId>
    where
        E: SyncExecutor + 'static,
    {
        if !self.gate.is_sync_enabled() {
            debug!(kind = %kind, "Sync disabled, dropping submission");
            return None;
        }

        let priority = options.priority.unwrap_or(self.config.default_priority);
        let max_attempts = options
            .max_attempts
            .unwrap_or(self.config.default_max_attempts);
        let op = SyncOperation::new(kind, priority, max_attempts, Arc::new(executor));
        let id = op.id();

        debug!(
            op_id = %id,
            kind = %op.kind(),
            priority = %priority,
            max_attempts,
            "Submitting sync operation"
        );

        {
            let mut queue = self.queue();
            queue.enqueue(op);
            let len = queue.len();
            self.publisher.update(|s| s.queue_length = len);
        }
        self.publisher.notify();
        self.wake.notify_one();

        Some(id)
    }

    /// Registers a state listener; it is called with the current state first
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&OrchestratorState) + Send + Sync + 'static,
    {
        self.publisher.subscribe(listener)
    }

    /// Returns the current state snapshot
    pub fn state(&self) -> OrchestratorState {
        self.publisher.state()
    }

    /// Drops every queued operation and resets the status to idle
    ///
    /// An executor already in flight is not interrupted; its result is
    /// discarded when it returns.
    pub fn clear_queue(&self) {
        let dropped = {
            let mut queue = self.queue();
            let dropped = queue.clear();
            self.publisher.update(|s| {
                s.status = SyncStatus::Idle;
                s.current_operation_kind = None;
                s.queue_length = 0;
            });
            dropped
        };
        self.publisher.notify();
        info!(dropped, "Sync queue cleared");
    }

    /// Lists queued operations in execution order
    pub fn queue_info(&self) -> Vec<QueueEntryInfo> {
        self.queue().info()
    }

    /// Returns the last connectivity state reported to [`set_online`](Self::set_online)
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Records a connectivity transition; returns false if `online` was already current
    ///
    /// Going offline pauses the worker before its next operation. Coming
    /// back online wakes it if work is pending.
    pub fn set_online(&self, online: bool) -> bool {
        if self.online.swap(online, Ordering::AcqRel) == online {
            return false;
        }

        self.publisher.publish(|s| s.is_online = online);

        if online {
            let pending = self.queue().len();
            info!(pending, "Connectivity restored");
            if pending > 0 {
                self.wake.notify_one();
            }
        } else {
            warn!("Connectivity lost, sync paused");
        }
        true
    }

    // ========================================================================
    // Worker
    // ========================================================================

    /// Spawns the worker task that drains the queue until `shutdown` fires
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(shutdown).await })
    }

    /// Worker loop: wait for a wake-up, drain, repeat
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Sync orchestrator worker started");

        loop {
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = shutdown.cancelled() => break,
            }

            if !self.drain(&shutdown).await {
                break;
            }
        }

        info!(
            pending = self.queue().len(),
            "Sync orchestrator worker stopped"
        );
    }

    /// Executes queued operations until the queue is empty or the loop pauses
    ///
    /// Returns false if `shutdown` fired.
    #[tracing::instrument(skip_all)]
    async fn drain(&self, shutdown: &CancellationToken) -> bool {
        let _flight = self.drain_lock.lock().await;

        loop {
            if shutdown.is_cancelled() {
                return false;
            }

            if !self.is_online() {
                let pending = self.queue().len();
                if pending > 0 {
                    warn!(pending, "Offline, pausing sync with work still queued");
                    self.publisher.publish(|s| {
                        s.status = SyncStatus::Error;
                        s.current_operation_kind = None;
                        s.last_error = Some(OFFLINE_ERROR.to_string());
                    });
                }
                return true;
            }

            let op = {
                let mut queue = self.queue();
                match queue.start_head() {
                    Some(op) => op,
                    None => break,
                }
            };

            info!(
                op_id = %op.id(),
                kind = %op.kind(),
                priority = %op.priority(),
                attempt = op.attempt(),
                "Executing sync operation"
            );
            self.publisher.publish(|s| {
                s.status = SyncStatus::Syncing;
                s.current_operation_kind = Some(op.kind().clone());
            });

            match op.executor().execute().await {
                Ok(()) => self.complete(&op),
                Err(err) => {
                    if let Some(delay) = self.fail(&op, err) {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown.cancelled() => return false,
                        }
                    }
                }
            }
        }

        self.publisher.publish(|s| {
            s.status = SyncStatus::Idle;
            s.current_operation_kind = None;
        });
        true
    }

    /// Removes a succeeded operation and publishes the success
    fn complete(&self, op: &SyncOperation) {
        {
            let mut queue = self.queue();
            let Some(mut done) = queue.remove(op.id()) else {
                debug!(op_id = %op.id(), "Operation was cleared while running, dropping result");
                return;
            };
            done.mark_completed();

            info!(
                op_id = %done.id(),
                kind = %done.kind(),
                attempts = done.attempt() + 1,
                "Sync operation succeeded"
            );

            let len = queue.len();
            self.publisher.update(|s| {
                s.status = SyncStatus::Success;
                s.current_operation_kind = None;
                s.last_sync_time = done.completed_at();
                s.last_sync_kind = Some(done.kind().clone());
                s.last_error = None;
                s.queue_length = len;
            });
        }
        self.publisher.notify();
    }

    /// Handles a failed attempt; returns the backoff to wait if it will be retried
    fn fail(&self, op: &SyncOperation, err: ExecutorError) -> Option<Duration> {
        let delay = {
            let mut queue = self.queue();
            let Some(mut failed) = queue.remove(op.id()) else {
                debug!(op_id = %op.id(), error = %err, "Operation was cleared while running, dropping failure");
                return None;
            };

            let decision = self.config.retry.decide(&failed, &err);
            let message = err.message().to_string();
            let error_kind = err.kind();
            failed.record_failure(err);

            match decision {
                RetryDecision::Retry { delay } => {
                    warn!(
                        op_id = %failed.id(),
                        kind = %failed.kind(),
                        attempt = failed.attempt(),
                        max_attempts = failed.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error_kind = %error_kind,
                        error = %message,
                        "Transient sync failure, retrying"
                    );
                    queue.enqueue(failed);
                    Some(delay)
                }
                RetryDecision::GiveUp(class) => {
                    failed.mark_completed();
                    match class {
                        FailureClass::Exhausted => error!(
                            op_id = %failed.id(),
                            kind = %failed.kind(),
                            attempts = failed.attempt(),
                            error = %message,
                            "Sync operation failed after exhausting retries"
                        ),
                        _ => error!(
                            op_id = %failed.id(),
                            kind = %failed.kind(),
                            error_kind = %error_kind,
                            error = %message,
                            "Sync operation failed permanently"
                        ),
                    }

                    let len = queue.len();
                    self.publisher.update(|s| {
                        s.status = SyncStatus::Error;
                        s.current_operation_kind = None;
                        s.last_error = Some(message);
                        s.queue_length = len;
                    });
                    None
                }
            }
        };
        self.publisher.notify();
        delay
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("online", &self.is_online())
            .field("queue_length", &self.queue().len())
            .finish_non_exhaustive()
    }
}
