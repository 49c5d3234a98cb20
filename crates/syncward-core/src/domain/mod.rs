//! Domain entities and business rules
//!
//! This module contains the core domain types for Syncward:
//! - Newtypes for operation identifiers and priorities
//! - Sync operations and their lifecycle markers
//! - The orchestrator state snapshot published to observers
//! - Domain-specific error types, including the executor failure taxonomy

pub mod errors;
pub mod newtypes;
pub mod operation;
pub mod state;

// Re-export commonly used types
pub use errors::{DomainError, ErrorKind, ExecutorError};
pub use newtypes::{OperationId, Priority};
pub use operation::{SyncKind, SyncOperation};
pub use state::{OrchestratorState, QueueEntryInfo, SyncStatus};
