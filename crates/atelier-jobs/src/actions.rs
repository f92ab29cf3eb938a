//! Compensating actions for optimistic updates.
//!
//! An optimistic mutation is applied locally before the backend confirms
//! it. The [`Compensation`] captured at that moment either gets committed
//! once the backend agrees, or run to restore the previous state.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use atelier_core::JobId;
use tracing::debug;

/// Undo closure for one optimistic mutation.
///
/// Dropping an uncommitted compensation does nothing; rollback only happens
/// through [`Compensation::compensate`].
pub struct Compensation {
    label: &'static str,
    undo: Box<dyn FnOnce() + Send>,
}

impl Compensation {
    /// Capture `undo` for the mutation described by `label`.
    pub fn new<F>(label: &'static str, undo: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            label,
            undo: Box::new(undo),
        }
    }

    /// The backend confirmed the mutation; discard the undo.
    pub fn commit(self) {}

    /// The backend refused the mutation; restore the previous state.
    pub fn compensate(self) {
        debug!(action = self.label, "rolling back optimistic update");
        (self.undo)();
    }
}

impl fmt::Debug for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compensation")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Ids with an optimistic action still waiting for the backend.
///
/// Overlapping actions on one item would undo each other out of order, so
/// only one may run per id at a time.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: Mutex<HashSet<JobId>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<JobId>> {
        self.ids.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim `id` until the returned guard drops. `None` while another
    /// claim on the same id is held.
    pub fn claim(&self, id: &JobId) -> Option<InFlightClaim<'_>> {
        if !self.lock().insert(id.clone()) {
            return None;
        }
        Some(InFlightClaim {
            owner: self,
            id: id.clone(),
        })
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.lock().contains(id)
    }
}

/// Releases its id on drop.
#[derive(Debug)]
pub struct InFlightClaim<'a> {
    owner: &'a InFlight,
    id: JobId,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.id);
    }
}

/// Result of a user-triggered action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The backend confirmed the action
    Confirmed,
    /// Nothing to do (unknown id or value already set)
    Skipped,
    /// Another action on the same item has not finished yet
    Busy,
    /// The backend refused or could not be reached; local state restored
    RolledBack { message: String },
    /// The backend refused or could not be reached; nothing was changed
    Failed { message: String },
}

impl ActionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// User-facing failure message, if the action failed.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::RolledBack { message } | Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}
