//! "Sync enabled" gate port
//!
//! The orchestrator asks the gate once per `submit`. When it reports
//! disabled, the submission is dropped silently.

use std::sync::atomic::{AtomicBool, Ordering};

/// Port trait answering whether synchronization is currently enabled
pub trait ISyncGate: Send + Sync {
    fn is_sync_enabled(&self) -> bool;
}

impl<F> ISyncGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_sync_enabled(&self) -> bool {
        (self)()
    }
}

/// Runtime-switchable gate backed by an atomic flag
#[derive(Debug)]
pub struct SyncToggle {
    enabled: AtomicBool,
}

impl SyncToggle {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl Default for SyncToggle {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ISyncGate for SyncToggle {
    fn is_sync_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
