//! Port definitions
//!
//! Traits implemented by the embedding application and consumed by the
//! orchestrator.
//!
//! ## Ports Overview
//!
//! - [`SyncExecutor`] - One unit of sync work (serialize and transmit a data slice)
//! - [`ISyncGate`] - Whether synchronization is currently enabled

pub mod executor;
pub mod sync_gate;

pub use executor::SyncExecutor;
pub use sync_gate::{ISyncGate, SyncToggle};
