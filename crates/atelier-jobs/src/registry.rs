//! The set of job ids awaiting a terminal status.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use atelier_core::JobId;
use tracing::debug;

use crate::gate::GenerationGate;

/// Pending job ids.
///
/// Ids are kept ordered so the status query is deterministic. Every change
/// is mirrored into the [`GenerationGate`].
#[derive(Debug)]
pub struct JobRegistry {
    ids: Mutex<BTreeSet<JobId>>,
    gate: Arc<GenerationGate>,
}

impl JobRegistry {
    /// Create an empty registry driving `gate`.
    pub fn new(gate: Arc<GenerationGate>) -> Self {
        Self {
            ids: Mutex::new(BTreeSet::new()),
            gate,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<JobId>> {
        self.ids.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add ids. Returns true if the set went from empty to non-empty.
    pub fn add<I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = JobId>,
    {
        let mut set = self.lock();
        let was_empty = set.is_empty();
        set.extend(ids);
        self.gate.set_pending(!set.is_empty());
        debug!(pending = set.len(), "pending jobs added");
        was_empty && !set.is_empty()
    }

    /// Remove ids. Returns true if this call emptied the set.
    pub fn remove<'a, I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a JobId>,
    {
        let mut set = self.lock();
        let was_empty = set.is_empty();
        for id in ids {
            set.remove(id);
        }
        self.gate.set_pending(!set.is_empty());
        !was_empty && set.is_empty()
    }

    /// Drop every pending id.
    pub fn clear(&self) {
        let mut set = self.lock();
        set.clear();
        self.gate.set_pending(false);
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.lock().contains(id)
    }

    /// Pending ids in ascending order.
    pub fn snapshot(&self) -> Vec<JobId> {
        self.lock().iter().cloned().collect()
    }
}
