//! Configured command jobs
//!
//! Each `jobs:` entry in the configuration becomes a [`JobScheduler`] that
//! submits a [`CommandExecutor`] to the orchestrator every `interval_secs`.
//! The command's exit status is mapped onto [`ErrorKind`] following the BSD
//! sysexits conventions, so scripts can ask for a retry by exiting with
//! `EX_TEMPFAIL`.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use syncward_core::config::JobConfig;
use syncward_core::domain::{ErrorKind, ExecutorError, OperationId, SyncKind};
use syncward_core::ports::SyncExecutor;
use syncward_sync::{Orchestrator, SubmitOptions};
use tokio::process::Command;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Input data was incorrect
pub const EX_DATAERR: i32 = 65;
/// A required service is unavailable
pub const EX_UNAVAILABLE: i32 = 69;
/// Temporary failure; the caller should retry later
pub const EX_TEMPFAIL: i32 = 75;
/// Insufficient permission
pub const EX_NOPERM: i32 = 77;

// ============================================================================
// CommandExecutor
// ============================================================================

/// Runs an external program as one sync attempt
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    kind: SyncKind,
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    /// Builds an executor from `[program, args...]`; `None` if `command` is empty
    pub fn new(kind: SyncKind, command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            kind,
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl SyncExecutor for CommandExecutor {
    async fn execute(&self) -> Result<(), ExecutorError> {
        debug!(kind = %self.kind, program = %self.program, "Running job command");

        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                ExecutorError::not_found(format!("failed to spawn {}: {e}", self.program))
            })?;

        classify_exit(&self.program, status)
    }
}

/// Maps a finished process onto the executor result
pub fn classify_exit(program: &str, status: ExitStatus) -> Result<(), ExecutorError> {
    if status.success() {
        return Ok(());
    }

    let Some(code) = status.code() else {
        return Err(ExecutorError::transient(format!(
            "{program} was terminated by a signal"
        )));
    };

    let kind = match code {
        EX_TEMPFAIL => ErrorKind::Transient,
        EX_UNAVAILABLE => ErrorKind::Server,
        EX_NOPERM => ErrorKind::Unauthorized,
        EX_DATAERR => ErrorKind::InvalidRequest,
        _ => ErrorKind::InvalidRequest,
    };
    Err(ExecutorError::new(
        kind,
        format!("{program} exited with status {code}"),
    ))
}

// ============================================================================
// JobScheduler
// ============================================================================

/// Periodically submits one configured job
pub struct JobScheduler {
    job: JobConfig,
    orchestrator: Arc<Orchestrator>,
    last_submission: Option<OperationId>,
}

impl JobScheduler {
    pub fn new(job: JobConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            job,
            orchestrator,
            last_submission: None,
        }
    }

    /// Submits the job unless its previous submission is still queued
    ///
    /// Returns true if a new operation was queued.
    pub fn tick(&mut self) -> bool {
        if let Some(previous) = self.last_submission {
            let pending = self
                .orchestrator
                .queue_info()
                .iter()
                .any(|entry| entry.id == previous);
            if pending {
                debug!(kind = %self.job.kind, op_id = %previous, "Previous run still queued, skipping");
                return false;
            }
        }

        let Some(executor) = CommandExecutor::new(self.job.kind.clone(), &self.job.command) else {
            warn!(kind = %self.job.kind, "Job has no command, skipping");
            return false;
        };

        let options = SubmitOptions {
            priority: self.job.priority,
            max_attempts: self.job.max_attempts,
        };
        self.last_submission = self
            .orchestrator
            .submit(self.job.kind.clone(), executor, options);
        self.last_submission.is_some()
    }

    /// Ticks every `interval_secs` until `shutdown` fires
    pub async fn run(mut self, shutdown: CancellationToken) {
        let period = Duration::from_secs(self.job.interval_secs.max(1));
        info!(kind = %self.job.kind, interval_secs = period.as_secs(), "Starting job schedule");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                _ = shutdown.cancelled() => break,
            }
        }

        debug!(kind = %self.job.kind, "Job schedule stopped");
    }
}
