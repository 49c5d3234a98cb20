//! SyncOperation domain entity
//!
//! A [`SyncOperation`] is one unit of sync work: a kind tag for reporting, a
//! priority, a retry budget, and the executor that actually talks to the
//! remote service. Lifecycle timestamps are stamped by the processing loop.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ExecutorError;
use super::newtypes::{OperationId, Priority};
use crate::ports::executor::SyncExecutor;

// ============================================================================
// SyncKind
// ============================================================================

/// Logical slice of user data an operation synchronizes
///
/// Used for reporting and debugging only; the orchestrator never branches
/// on it. Unknown names round-trip through [`SyncKind::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncKind {
    /// Full data backup
    Backup,
    /// User preferences
    Settings,
    /// Task list
    Tasks,
    /// Habit tracking records
    Habits,
    /// Journal entries
    Journal,
    /// Account profile
    Profile,
    /// Caller-defined kind
    Custom(String),
}

impl SyncKind {
    /// Returns the canonical lowercase name
    pub fn as_str(&self) -> &str {
        match self {
            SyncKind::Backup => "backup",
            SyncKind::Settings => "settings",
            SyncKind::Tasks => "tasks",
            SyncKind::Habits => "habits",
            SyncKind::Journal => "journal",
            SyncKind::Profile => "profile",
            SyncKind::Custom(name) => name,
        }
    }
}

impl From<String> for SyncKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "backup" => SyncKind::Backup,
            "settings" => SyncKind::Settings,
            "tasks" => SyncKind::Tasks,
            "habits" => SyncKind::Habits,
            "journal" => SyncKind::Journal,
            "profile" => SyncKind::Profile,
            _ => SyncKind::Custom(value),
        }
    }
}

impl From<&str> for SyncKind {
    fn from(value: &str) -> Self {
        SyncKind::from(value.to_string())
    }
}

impl From<SyncKind> for String {
    fn from(kind: SyncKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SyncOperation
// ============================================================================

/// A pending unit of sync work
///
/// `attempt` counts attempts already made. `max_attempts` bounds the
/// retries after the first try, so an operation runs at most
/// `max_attempts + 1` times.
#[derive(Clone)]
pub struct SyncOperation {
    id: OperationId,
    kind: SyncKind,
    priority: Priority,
    executor: Arc<dyn SyncExecutor>,
    attempt: u32,
    max_attempts: u32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    last_error: Option<ExecutorError>,
}

impl SyncOperation {
    /// Creates a new operation with a fresh id and `created_at = now`
    pub fn new(
        kind: SyncKind,
        priority: Priority,
        max_attempts: u32,
        executor: Arc<dyn SyncExecutor>,
    ) -> Self {
        Self {
            id: OperationId::new(),
            kind,
            priority,
            executor,
            attempt: 0,
            max_attempts,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn kind(&self) -> &SyncKind {
        &self.kind
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns a shared handle to the executor
    pub fn executor(&self) -> Arc<dyn SyncExecutor> {
        Arc::clone(&self.executor)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn last_error(&self) -> Option<&ExecutorError> {
        self.last_error.as_ref()
    }

    /// Returns true if another attempt fits in the retry budget
    pub fn has_retries_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Stamps `started_at` on the first attempt only
    pub fn mark_started(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Records a failed attempt and bumps the attempt counter
    pub fn record_failure(&mut self, error: ExecutorError) {
        self.attempt += 1;
        self.last_error = Some(error);
    }

    /// Stamps `completed_at`
    pub fn mark_completed(&mut self) {
        self.completed_at = Some(Utc::now());
    }
}

impl fmt::Debug for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOperation")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("attempt", &self.attempt)
            .field("max_attempts", &self.max_attempts)
            .field("created_at", &self.created_at)
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}
