//! Sync executor port
//!
//! An executor is the opaque unit of work behind a sync operation. It owns
//! serialization, transport and its own timeouts; the orchestrator only
//! awaits it and reads the [`ErrorKind`](crate::domain::ErrorKind) of a failure.

use std::future::Future;

use async_trait::async_trait;

use crate::domain::errors::ExecutorError;

/// Port trait for a single sync unit of work
///
/// Executors may be invoked several times for one operation (retries), so
/// `execute` takes `&self` and must be safe to call repeatedly.
///
/// Plain async closures are executors:
///
/// ```rust
/// use std::sync::Arc;
/// use syncward_core::domain::ExecutorError;
/// use syncward_core::ports::SyncExecutor;
///
/// let executor: Arc<dyn SyncExecutor> = Arc::new(|| async {
///     Err::<(), _>(ExecutorError::timeout("upload timed out"))
/// });
/// ```
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    /// Runs the unit of work once
    async fn execute(&self) -> Result<(), ExecutorError>;
}

#[async_trait]
impl<F, Fut> SyncExecutor for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ExecutorError>> + Send + 'static,
{
    async fn execute(&self) -> Result<(), ExecutorError> {
        (self)().await
    }
}
