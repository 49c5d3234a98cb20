//! Orchestrator state snapshot
//!
//! [`OrchestratorState`] is the single observable summary of the sync
//! subsystem. The publisher replaces it wholesale on every change; observers
//! only ever receive owned copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{OperationId, Priority};
use super::operation::SyncKind;

/// Coarse orchestrator status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing queued, nothing running
    Idle,
    /// An executor is in flight
    Syncing,
    /// The most recent operation succeeded
    Success,
    /// The most recent operation failed terminally, or the loop paused offline
    Error,
    /// Reserved for observers that surface merge conflicts
    Conflict,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Idle
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
            SyncStatus::Conflict => "conflict",
        };
        write!(f, "{}", s)
    }
}

/// Immutable snapshot of the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorState {
    pub status: SyncStatus,
    /// Kind of the operation currently executing
    pub current_operation_kind: Option<SyncKind>,
    /// Completion time of the most recent successful operation
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Kind of the most recent successful operation
    pub last_sync_kind: Option<SyncKind>,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// Number of operations still queued (including one in flight)
    pub queue_length: usize,
    pub is_online: bool,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            current_operation_kind: None,
            last_sync_time: None,
            last_sync_kind: None,
            last_error: None,
            queue_length: 0,
            is_online: true,
        }
    }
}

/// Diagnostic view of one queued operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntryInfo {
    pub id: OperationId,
    pub kind: SyncKind,
    pub priority: Priority,
    pub attempt: u32,
}
