//! Syncward Sync - single-flight orchestration of background sync work
//!
//! Provides:
//! - A priority-ordered, in-memory operation queue
//! - A processing loop that runs at most one executor at a time
//! - Retry with exponential backoff and jitter for transient failures
//! - An online/offline gate that pauses and resumes draining
//! - An observable state snapshot with replay-on-subscribe
//!
//! ## Modules
//!
//! - [`orchestrator`] - Public entry point and the draining worker
//! - [`queue`] - Priority queue with tail-of-band insertion
//! - [`retry`] - Failure classification and backoff computation
//! - [`publisher`] - State snapshot and listener delivery
//! - [`connectivity`] - Connectivity event consumer

pub mod connectivity;
pub mod orchestrator;
pub mod publisher;
pub mod queue;
pub mod retry;

pub use connectivity::{ConnectivityEvent, ConnectivityMonitor};
pub use orchestrator::{Orchestrator, OrchestratorConfig, SubmitOptions, OFFLINE_ERROR};
pub use publisher::{StatePublisher, Subscription};
pub use queue::OperationQueue;
pub use retry::{is_retryable, FailureClass, RetryDecision, RetryPolicy};
