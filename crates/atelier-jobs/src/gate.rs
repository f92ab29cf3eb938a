//! The "generation in progress" flag.
//!
//! The gate is true while any job is pending or a submission is on its way
//! to the backend. Nothing outside this crate can set it directly:
//! - the [`JobRegistry`](crate::registry::JobRegistry) reports whether the
//!   pending set is empty
//! - [`GenerationGate::begin_submission`] raises it optimistically for the
//!   lifetime of the returned guard
//!
//! Observers read it with [`GenerationGate::is_active`] or follow changes
//! through [`GenerationGate::subscribe`].

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Default)]
struct GateState {
    pending: bool,
    submissions: usize,
}

impl GateState {
    fn active(&self) -> bool {
        self.pending || self.submissions > 0
    }
}

/// Observable "generation in progress" flag.
#[derive(Debug)]
pub struct GenerationGate {
    state: Mutex<GateState>,
    tx: watch::Sender<bool>,
}

impl Default for GenerationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationGate {
    /// Create a gate in the idle state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            state: Mutex::new(GateState::default()),
            tx,
        }
    }

    /// Current value.
    pub fn is_active(&self) -> bool {
        *self.tx.borrow()
    }

    /// Follow value changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Raise the gate until the returned guard is dropped.
    ///
    /// Hold the guard across the submit call. If the submission created
    /// pending jobs, the registry keeps the gate up after the guard drops.
    pub fn begin_submission(self: &Arc<Self>) -> SubmissionGuard {
        self.update(|state| state.submissions += 1);
        SubmissionGuard {
            gate: Arc::clone(self),
        }
    }

    /// Number of submissions currently holding the gate.
    pub fn submissions_in_flight(&self) -> usize {
        self.lock().submissions
    }

    pub(crate) fn set_pending(&self, pending: bool) {
        self.update(|state| state.pending = pending);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut GateState)) {
        let mut state = self.lock();
        f(&mut state);
        let active = state.active();
        let changed = self.tx.send_if_modified(|current| {
            if *current == active {
                false
            } else {
                *current = active;
                true
            }
        });
        if changed {
            debug!(active, "generation gate changed");
        }
    }
}

/// Keeps the gate raised while a submission is in flight.
#[derive(Debug)]
#[must_use = "the gate drops back as soon as the guard is dropped"]
pub struct SubmissionGuard {
    gate: Arc<GenerationGate>,
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.gate
            .update(|state| state.submissions = state.submissions.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_starts_idle() {
        let gate = GenerationGate::new();
        assert!(!gate.is_active());
        assert_eq!(gate.submissions_in_flight(), 0);
    }

    #[test]
    fn test_submission_guard_reverts_on_drop() {
        let gate = Arc::new(GenerationGate::new());
        let guard = gate.begin_submission();
        assert!(gate.is_active());

        drop(guard);
        assert!(!gate.is_active());
    }

    #[test]
    fn test_pending_outlives_submission() {
        let gate = Arc::new(GenerationGate::new());
        let guard = gate.begin_submission();
        gate.set_pending(true);
        drop(guard);
        assert!(gate.is_active());

        gate.set_pending(false);
        assert!(!gate.is_active());
    }

    #[test]
    fn test_overlapping_submissions() {
        let gate = Arc::new(GenerationGate::new());
        let first = gate.begin_submission();
        let second = gate.begin_submission();
        drop(first);
        assert!(gate.is_active());
        drop(second);
        assert!(!gate.is_active());
    }

    #[test]
    fn test_subscribers_see_changes_only() {
        let gate = Arc::new(GenerationGate::new());
        let mut rx = gate.subscribe();
        assert!(!rx.has_changed().unwrap());

        gate.set_pending(false);
        assert!(!rx.has_changed().unwrap());

        gate.set_pending(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
    }
}
