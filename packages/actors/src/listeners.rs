//! Listener registry for synchronous change notifications.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use task_core::QueueEvent;

use crate::worker::panic_message;

type Listener = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

struct Entry {
    id: u64,
    /// Cleared by `unsubscribe`; checked again right before each call.
    active: Arc<AtomicBool>,
    listener: Listener,
}

#[derive(Default)]
struct Entries {
    next_id: u64,
    listeners: Vec<Entry>,
}

/// Listeners shared between the queue handle and the manager actor.
#[derive(Clone, Default)]
pub(crate) struct ListenerSet {
    inner: Arc<Mutex<Entries>>,
}

fn lock(entries: &Mutex<Entries>) -> MutexGuard<'_, Entries> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ListenerSet {
    /// Register a listener.
    pub(crate) fn add(&self, listener: Listener) -> Subscription {
        let mut entries = lock(&self.inner);
        entries.next_id += 1;
        let id = entries.next_id;
        let active = Arc::new(AtomicBool::new(true));
        entries.listeners.push(Entry {
            id,
            active: active.clone(),
            listener,
        });

        Subscription {
            id,
            active,
            entries: Arc::downgrade(&self.inner),
        }
    }

    /// Call every registered listener with `event`.
    ///
    /// The lock is released before any listener runs, so listeners may
    /// subscribe or unsubscribe from inside the callback. A listener removed
    /// while earlier ones are still running is skipped.
    pub(crate) fn notify(&self, event: &QueueEvent) {
        let current: Vec<(Arc<AtomicBool>, Listener)> = lock(&self.inner)
            .listeners
            .iter()
            .map(|entry| (entry.active.clone(), entry.listener.clone()))
            .collect();

        for (active, listener) in current {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                tracing::error!(
                    "Queue listener panicked on '{}': {}",
                    event.description(),
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

/// Handle returned by `TaskQueue::subscribe`.
///
/// Dropping it keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    entries: Weak<Mutex<Entries>>,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is a no-op.
    ///
    /// A notification already in progress on another thread skips the
    /// listener unless its call has already begun.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);
        if let Some(entries) = self.entries.upgrade() {
            lock(&entries).listeners.retain(|entry| entry.id != self.id);
        }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.entries.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;

    fn cleared() -> QueueEvent {
        QueueEvent::FinishedCleared {
            job_ids: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn unsubscribe_only_removes_its_own_listener() {
        let set = ListenerSet::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let first_count = first.clone();
        let sub_a = set.add(Arc::new(move |_: &QueueEvent| {
            first_count.fetch_add(1, Ordering::SeqCst);
        }));
        let second_count = second.clone();
        let sub_b = set.add(Arc::new(move |_: &QueueEvent| {
            second_count.fetch_add(1, Ordering::SeqCst);
        }));

        set.notify(&cleared());
        sub_a.unsubscribe();
        sub_a.unsubscribe();
        set.notify(&cleared());

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
        assert!(!sub_a.is_active());
        assert!(sub_b.is_active());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn panicking_listener_does_not_starve_the_rest() {
        let set = ListenerSet::default();
        let reached = Arc::new(AtomicUsize::new(0));

        fn explode(_: &QueueEvent) {
            panic!("listener bug");
        }

        set.add(Arc::new(explode));
        let counter = reached.clone();
        set.add(Arc::new(move |_: &QueueEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        set.notify(&cleared());
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_removed_mid_notify_is_skipped() {
        let set = ListenerSet::default();
        let later = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::default();

        let target = slot.clone();
        set.add(Arc::new(move |_: &QueueEvent| {
            if let Some(sub) = target.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
                sub.unsubscribe();
            }
        }));
        let counter = later.clone();
        let sub = set.add(Arc::new(move |_: &QueueEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(sub);

        set.notify(&cleared());
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn listener_can_subscribe_during_notify() {
        let set = ListenerSet::default();
        let inner = set.clone();
        set.add(Arc::new(move |_: &QueueEvent| {
            inner.add(Arc::new(|_: &QueueEvent| {}));
        }));

        set.notify(&cleared());
        assert_eq!(set.len(), 2);
    }
}
