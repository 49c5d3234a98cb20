//! Observable orchestrator state
//!
//! [`StatePublisher`] owns the current [`OrchestratorState`] and a list of
//! listener callbacks. Every change replaces the snapshot with a fresh copy
//! and appends it to each listener's mailbox; a listener sees snapshots in
//! the order they were produced.
//!
//! ## Delivery
//!
//! A listener is invoked by at most one thread at a time, and never with the
//! state lock held. Whoever finds a listener idle with mail waiting claims it
//! and drains its mailbox. A listener may therefore call back into the
//! orchestrator (submit, read state, subscribe) without deadlocking; the
//! nested change lands in the mailboxes and is delivered once the current
//! call returns.
//!
//! `subscribe` claims the new listener itself, so the replay of the current
//! snapshot always runs on the subscribing thread before it returns, even
//! while another thread is busy delivering to other listeners.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use syncward_core::domain::OrchestratorState;
use tracing::{trace, warn};

type Listener = Arc<dyn Fn(&OrchestratorState) + Send + Sync>;

struct ListenerSlot {
    id: u64,
    listener: Listener,
    mailbox: VecDeque<Arc<OrchestratorState>>,
    /// Claimed by a thread that is draining the mailbox
    busy: bool,
}

struct PublisherInner {
    state: OrchestratorState,
    listeners: Vec<ListenerSlot>,
    next_listener_id: u64,
}

/// Holder of the current state snapshot and its subscribers
pub struct StatePublisher {
    inner: Mutex<PublisherInner>,
}

impl StatePublisher {
    pub fn new(initial: OrchestratorState) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(PublisherInner {
                state: initial,
                listeners: Vec::new(),
                next_listener_id: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PublisherInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current snapshot
    pub fn state(&self) -> OrchestratorState {
        self.lock().state.clone()
    }

    /// Registers `listener` and invokes it with the current snapshot
    ///
    /// The replay runs on the calling thread before `subscribe` returns.
    /// Changes made meanwhile, from any thread, are delivered right after it.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&OrchestratorState) + Send + Sync + 'static,
    {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            let snapshot = Arc::new(inner.state.clone());
            inner.listeners.push(ListenerSlot {
                id,
                listener: Arc::new(listener),
                mailbox: VecDeque::from([snapshot]),
                busy: true,
            });
            id
        };
        self.drain(id);

        Subscription {
            id,
            publisher: Arc::downgrade(self),
        }
    }

    /// Applies `change` to a copy of the snapshot and stages it for delivery
    ///
    /// Returns false (and stages nothing) when the change is a no-op. Call
    /// [`notify`](Self::notify) afterwards, once any caller-held locks are
    /// released.
    pub fn update<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut OrchestratorState),
    {
        let mut inner = self.lock();
        let mut next = inner.state.clone();
        change(&mut next);
        if next == inner.state {
            return false;
        }

        let snapshot = Arc::new(next.clone());
        inner.state = next;
        for slot in &mut inner.listeners {
            slot.mailbox.push_back(Arc::clone(&snapshot));
        }
        true
    }

    /// Delivers staged snapshots to every listener no other thread is serving
    pub fn notify(&self) {
        loop {
            let id = {
                let mut inner = self.lock();
                let Some(slot) = inner
                    .listeners
                    .iter_mut()
                    .find(|slot| !slot.busy && !slot.mailbox.is_empty())
                else {
                    return;
                };
                slot.busy = true;
                slot.id
            };
            self.drain(id);
        }
    }

    /// `update` followed by `notify`
    pub fn publish<F>(&self, change: F)
    where
        F: FnOnce(&mut OrchestratorState),
    {
        if self.update(change) {
            self.notify();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().listeners.retain(|slot| slot.id != id);
    }

    /// Empties the mailbox of a listener the caller has claimed, then releases it
    fn drain(&self, id: u64) {
        loop {
            let (listener, snapshot) = {
                let mut inner = self.lock();
                let Some(slot) = inner.listeners.iter_mut().find(|slot| slot.id == id) else {
                    return;
                };
                match slot.mailbox.pop_front() {
                    Some(snapshot) => (Arc::clone(&slot.listener), snapshot),
                    None => {
                        slot.busy = false;
                        return;
                    }
                }
            };

            trace!(listener = id, status = %snapshot.status, "Delivering state");
            if catch_unwind(AssertUnwindSafe(|| listener(&snapshot))).is_err() {
                warn!(listener = id, "State listener panicked; continuing with remaining listeners");
            }
        }
    }
}

/// Handle returned by [`StatePublisher::subscribe`]
///
/// Dropping the handle leaves the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    id: u64,
    publisher: Weak<StatePublisher>,
}

impl Subscription {
    /// Removes the listener. Deliveries already in progress may still reach it.
    pub fn unsubscribe(self) {
        if let Some(publisher) = self.publisher.upgrade() {
            publisher.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Mutex};
    use std::thread;
    use std::time::Duration;

    use syncward_core::domain::SyncStatus;

    use super::*;

    fn recorder() -> (
        Arc<Mutex<Vec<OrchestratorState>>>,
        impl Fn(&OrchestratorState) + Send + Sync + 'static,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |s: &OrchestratorState| {
            sink.lock().unwrap().push(s.clone())
        })
    }

    #[test]
    fn test_subscribe_replays_current_state_synchronously() {
        let publisher = StatePublisher::new(OrchestratorState::default());
        publisher.publish(|s| s.queue_length = 4);

        let (seen, listener) = recorder();
        let _sub = publisher.subscribe(listener);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].queue_length, 4);
    }

    #[test]
    fn test_every_change_reaches_every_listener_in_order() {
        let publisher = StatePublisher::new(OrchestratorState::default());
        let (first, l1) = recorder();
        let (second, l2) = recorder();
        let _a = publisher.subscribe(l1);
        let _b = publisher.subscribe(l2);

        publisher.publish(|s| s.status = SyncStatus::Syncing);
        publisher.publish(|s| s.status = SyncStatus::Success);

        for seen in [first, second] {
            let statuses: Vec<_> = seen.lock().unwrap().iter().map(|s| s.status).collect();
            assert_eq!(
                statuses,
                vec![SyncStatus::Idle, SyncStatus::Syncing, SyncStatus::Success]
            );
        }
    }

    #[test]
    fn test_noop_update_is_not_delivered() {
        let publisher = StatePublisher::new(OrchestratorState::default());
        let (seen, listener) = recorder();
        let _sub = publisher.subscribe(listener);

        assert!(!publisher.update(|s| s.status = SyncStatus::Idle));
        publisher.notify();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let publisher = StatePublisher::new(OrchestratorState::default());
        let (seen, listener) = recorder();
        let sub = publisher.subscribe(listener);
        assert_eq!(publisher.listener_count(), 1);

        sub.unsubscribe();
        assert_eq!(publisher.listener_count(), 0);

        publisher.publish(|s| s.queue_length = 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_staged_updates_wait_for_notify() {
        let publisher = StatePublisher::new(OrchestratorState::default());
        let (seen, listener) = recorder();
        let _sub = publisher.subscribe(listener);

        publisher.update(|s| s.queue_length = 1);
        publisher.update(|s| s.queue_length = 2);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(publisher.state().queue_length, 2);

        publisher.notify();
        let lengths: Vec<_> = seen.lock().unwrap().iter().map(|s| s.queue_length).collect();
        assert_eq!(lengths, vec![0, 1, 2]);
    }

    #[test]
    fn test_listener_may_publish_reentrantly() {
        let publisher = StatePublisher::new(OrchestratorState::default());
        let (seen, recorder_listener) = recorder();
        let _rec = publisher.subscribe(recorder_listener);

        let weak = Arc::downgrade(&publisher);
        let _chain = publisher.subscribe(move |s: &OrchestratorState| {
            if s.status == SyncStatus::Success {
                if let Some(p) = weak.upgrade() {
                    p.publish(|next| next.status = SyncStatus::Idle);
                }
            }
        });

        publisher.publish(|s| s.status = SyncStatus::Success);

        let statuses: Vec<_> = seen.lock().unwrap().iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![SyncStatus::Idle, SyncStatus::Success, SyncStatus::Idle]
        );
        assert_eq!(publisher.state().status, SyncStatus::Idle);
    }

    #[test]
    fn test_subscribe_replays_while_another_thread_is_delivering() {
        let publisher = StatePublisher::new(OrchestratorState::default());

        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);
        let _slow = publisher.subscribe(move |s: &OrchestratorState| {
            if s.status == SyncStatus::Syncing {
                let _ = entered_tx.lock().unwrap().send(());
                thread::sleep(Duration::from_millis(300));
            }
        });

        let background = Arc::clone(&publisher);
        let worker = thread::spawn(move || background.publish(|s| s.status = SyncStatus::Syncing));
        entered_rx.recv().unwrap();

        let (seen, listener) = recorder();
        let _sub = publisher.subscribe(listener);
        let calls_on_return = seen.lock().unwrap().len();

        worker.join().unwrap();
        assert_eq!(calls_on_return, 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].status, SyncStatus::Syncing);
    }

    #[test]
    fn test_change_during_replay_is_delivered_after_it() {
        let publisher = StatePublisher::new(OrchestratorState::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let weak = Arc::downgrade(&publisher);

        let _sub = publisher.subscribe(move |s: &OrchestratorState| {
            let first = {
                let mut seen = sink.lock().unwrap();
                seen.push(s.status);
                seen.len() == 1
            };
            if first {
                let Some(p) = weak.upgrade() else { return };
                thread::spawn(move || p.publish(|next| next.status = SyncStatus::Success))
                    .join()
                    .unwrap();
            }
        });

        assert_eq!(
            *seen.lock().unwrap(),
            vec![SyncStatus::Idle, SyncStatus::Success]
        );
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let publisher = StatePublisher::new(OrchestratorState::default());
        let _bad = publisher.subscribe(|s: &OrchestratorState| {
            if s.queue_length > 0 {
                panic!("listener bug");
            }
        });
        let (seen, listener) = recorder();
        let _good = publisher.subscribe(listener);

        publisher.publish(|s| s.queue_length = 3);
        publisher.publish(|s| s.queue_length = 4);

        let lengths: Vec<_> = seen.lock().unwrap().iter().map(|s| s.queue_length).collect();
        assert_eq!(lengths, vec![0, 3, 4]);
    }
}
