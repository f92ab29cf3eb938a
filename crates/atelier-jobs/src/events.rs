//! Synchronous publish/subscribe for job lifecycle events.
//!
//! Handlers run on the emitting thread, in subscription order, before
//! [`EventBus::emit`] returns. The subscriber list is copied before
//! delivery, so a handler may subscribe or unsubscribe while an event is
//! being delivered; such changes take effect from the next event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use atelier_core::JobItem;
use tracing::trace;

/// Events exchanged between the job tracking components.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// The backend accepted a submission and created these jobs
    SubmissionSucceeded { items: Vec<JobItem> },
    /// The list should be reloaded from the backend
    RefreshRequested,
    /// The session ended; all job state must be dropped
    LoggedOut,
}

impl JobEvent {
    /// Kind used for subscription.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SubmissionSucceeded { .. } => EventKind::SubmissionSucceeded,
            Self::RefreshRequested => EventKind::RefreshRequested,
            Self::LoggedOut => EventKind::LoggedOut,
        }
    }
}

/// Discriminant of [`JobEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SubmissionSucceeded,
    RefreshRequested,
    LoggedOut,
}

/// Event handler.
pub type Handler = Arc<dyn Fn(&JobEvent) + Send + Sync>;

/// Token returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// In-process event bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe `handler` to events of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&JobEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscriber {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    /// Unsubscribe. Returns false if `id` was not subscribed.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Deliver `event` to every matching handler. Returns the number of
    /// handlers invoked.
    pub fn emit(&self, event: &JobEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        trace!(?kind, handlers = handlers.len(), "emitting job event");
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Number of handlers subscribed to `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|s| s.kind == kind).count()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::JobStatus;

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for n in 1..=3 {
            let log = Arc::clone(&log);
            bus.on(EventKind::LoggedOut, move |_| log.lock().unwrap().push(n));
        }

        assert_eq!(bus.emit(&JobEvent::LoggedOut), 3);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_only_matching_kind_is_delivered() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(EventKind::SubmissionSucceeded, move |event| {
            if let JobEvent::SubmissionSucceeded { items } = event {
                sink.lock().unwrap().extend(items.iter().map(|i| i.id.clone()));
            }
        });

        assert_eq!(bus.emit(&JobEvent::RefreshRequested), 0);
        bus.emit(&JobEvent::SubmissionSucceeded {
            items: vec![JobItem::new(101, JobStatus::Queued)],
        });
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_off_unsubscribes() {
        let bus = EventBus::new();
        let id = bus.on(EventKind::RefreshRequested, |_| {});
        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert_eq!(bus.emit(&JobEvent::RefreshRequested), 0);
    }

    #[test]
    fn test_handler_may_subscribe_during_emit() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.on(EventKind::RefreshRequested, move |_| {
            inner.on(EventKind::RefreshRequested, |_| {});
        });

        assert_eq!(bus.emit(&JobEvent::RefreshRequested), 1);
        assert_eq!(bus.subscriber_count(EventKind::RefreshRequested), 2);
    }
}
