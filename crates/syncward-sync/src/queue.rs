//! Priority-ordered operation queue
//!
//! The queue is a plain `Vec` kept sorted by non-increasing priority. New
//! entries go to the tail of their priority band, so equal priorities run in
//! submission order. A retried operation is re-inserted the same way, which
//! lets same-priority work submitted after its failure overtake it.
//!
//! The queue itself is not synchronized; the orchestrator owns it behind a
//! mutex and is the only writer.

use syncward_core::domain::{OperationId, QueueEntryInfo, SyncOperation};

/// In-memory queue of pending sync operations
#[derive(Debug, Default)]
pub struct OperationQueue {
    items: Vec<SyncOperation>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `op` at the tail of its priority band
    pub fn enqueue(&mut self, op: SyncOperation) {
        let priority = op.priority();
        let index = self.items.partition_point(|queued| queued.priority() >= priority);
        self.items.insert(index, op);
    }

    /// Returns the highest-priority operation without removing it
    pub fn peek_head(&self) -> Option<&SyncOperation> {
        self.items.first()
    }

    /// Removes and returns the highest-priority operation
    pub fn remove_head(&mut self) -> Option<SyncOperation> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    /// Marks the head as started and returns a copy of it for execution
    ///
    /// The head stays queued while it runs; higher-priority submissions that
    /// arrive meanwhile are inserted in front of it.
    pub fn start_head(&mut self) -> Option<SyncOperation> {
        let head = self.items.first_mut()?;
        head.mark_started();
        Some(head.clone())
    }

    /// Removes the operation with the given id, wherever it sits
    pub fn remove(&mut self, id: OperationId) -> Option<SyncOperation> {
        let index = self.items.iter().position(|op| op.id() == id)?;
        Some(self.items.remove(index))
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.items.iter().any(|op| op.id() == id)
    }

    /// Drops every queued operation and returns how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Diagnostic listing in execution order
    pub fn info(&self) -> Vec<QueueEntryInfo> {
        self.items
            .iter()
            .map(|op| QueueEntryInfo {
                id: op.id(),
                kind: op.kind().clone(),
                priority: op.priority(),
                attempt: op.attempt(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use syncward_core::domain::{ExecutorError, Priority, SyncKind};

    use super::*;

    fn op(kind: &str, priority: u8) -> SyncOperation {
        SyncOperation::new(
            SyncKind::from(kind),
            Priority::new(priority),
            3,
            Arc::new(|| async { Ok::<(), ExecutorError>(()) }),
        )
    }

    fn kinds(queue: &OperationQueue) -> Vec<String> {
        queue.info().into_iter().map(|e| e.kind.to_string()).collect()
    }

    #[test]
    fn test_enqueue_orders_by_priority() {
        let mut queue = OperationQueue::new();
        queue.enqueue(op("low", 1));
        queue.enqueue(op("high", 9));
        queue.enqueue(op("mid", 5));

        assert_eq!(kinds(&queue), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let mut queue = OperationQueue::new();
        queue.enqueue(op("first", 5));
        queue.enqueue(op("second", 5));
        queue.enqueue(op("urgent", 8));
        queue.enqueue(op("third", 5));

        assert_eq!(kinds(&queue), vec!["urgent", "first", "second", "third"]);
    }

    #[test]
    fn test_requeue_goes_to_tail_of_band() {
        let mut queue = OperationQueue::new();
        queue.enqueue(op("retrying", 5));
        queue.enqueue(op("other", 5));
        queue.enqueue(op("background", 2));

        let mut head = queue.remove_head().unwrap();
        head.record_failure(ExecutorError::transient("reset"));
        queue.enqueue(head);

        assert_eq!(kinds(&queue), vec!["other", "retrying", "background"]);
        assert_eq!(queue.info()[1].attempt, 1);
    }

    #[test]
    fn test_start_head_keeps_operation_queued() {
        let mut queue = OperationQueue::new();
        queue.enqueue(op("a", 5));

        let started = queue.start_head().unwrap();
        assert!(started.started_at().is_some());
        assert_eq!(queue.len(), 1);
        assert!(queue.peek_head().unwrap().started_at().is_some());
    }

    #[test]
    fn test_higher_priority_overtakes_running_head() {
        let mut queue = OperationQueue::new();
        queue.enqueue(op("running", 5));
        let running = queue.start_head().unwrap();

        queue.enqueue(op("urgent", 9));
        assert_eq!(queue.peek_head().unwrap().kind().as_str(), "urgent");

        let removed = queue.remove(running.id()).unwrap();
        assert_eq!(removed.kind().as_str(), "running");
        assert_eq!(kinds(&queue), vec!["urgent"]);
    }

    #[test]
    fn test_remove_missing_returns_none() {
        let mut queue = OperationQueue::new();
        let stray = op("stray", 5);
        assert!(queue.remove(stray.id()).is_none());
        assert!(!queue.contains(stray.id()));
    }

    #[test]
    fn test_clear_reports_dropped_count() {
        let mut queue = OperationQueue::new();
        queue.enqueue(op("a", 1));
        queue.enqueue(op("b", 2));

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(queue.peek_head().is_none());
        assert!(queue.remove_head().is_none());
    }

    #[test]
    fn test_info_has_no_side_effects() {
        let mut queue = OperationQueue::new();
        queue.enqueue(op("a", 3));
        let before = queue.info();
        let after = queue.info();
        assert_eq!(before, after);
        assert_eq!(before[0].priority, Priority::new(3));
        assert_eq!(before[0].attempt, 0);
    }
}
