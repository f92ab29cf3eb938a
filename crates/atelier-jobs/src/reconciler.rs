//! The visible job list and the rules for merging server data into it.
//!
//! All mutations replace whole records or insert/remove whole records, so a
//! reader never observes a half-updated item. Every mutation bumps a
//! revision that observers can follow through [`JobList::subscribe`].

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use atelier_core::{JobId, JobItem};
use tokio::sync::watch;
use tracing::debug;

/// Ordered list of job items shown to the user, newest first.
#[derive(Debug)]
pub struct JobList {
    items: RwLock<Vec<JobItem>>,
    revision: watch::Sender<u64>,
}

impl Default for JobList {
    fn default() -> Self {
        Self::new()
    }
}

impl JobList {
    /// Create an empty list.
    pub fn new() -> Self {
        let (revision, _rx) = watch::channel(0);
        Self {
            items: RwLock::new(Vec::new()),
            revision,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<JobItem>> {
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<JobItem>> {
        self.items.write().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Replace the whole list, e.g. after a full reload.
    pub fn replace_all(&self, items: Vec<JobItem>) {
        let mut list = self.write();
        *list = dedup_batch(items);
        debug!(len = list.len(), "job list replaced");
        drop(list);
        self.bump();
    }

    /// Prepend items whose id is not yet present, keeping the batch's order.
    ///
    /// Duplicates within the batch collapse to their first occurrence and
    /// existing entries are neither moved nor overwritten. Returns the ids of
    /// merged items that still need polling.
    pub fn merge_recent(&self, items: Vec<JobItem>) -> Vec<JobId> {
        let mut list = self.write();
        let present: HashSet<JobId> = list.iter().map(|item| item.id.clone()).collect();
        let fresh: Vec<JobItem> = dedup_batch(items)
            .into_iter()
            .filter(|item| !present.contains(&item.id))
            .collect();

        if fresh.is_empty() {
            return Vec::new();
        }

        let pending = fresh
            .iter()
            .filter(|item| !item.is_terminal())
            .map(|item| item.id.clone())
            .collect();
        debug!(merged = fresh.len(), "recent jobs merged");
        list.splice(0..0, fresh);
        drop(list);
        self.bump();
        pending
    }

    /// Append a later page, skipping ids already shown. Returns how many
    /// items were appended.
    pub fn append_page(&self, items: Vec<JobItem>) -> usize {
        let mut list = self.write();
        let present: HashSet<JobId> = list.iter().map(|item| item.id.clone()).collect();
        let before = list.len();
        list.extend(
            dedup_batch(items)
                .into_iter()
                .filter(|item| !present.contains(&item.id)),
        );
        let appended = list.len() - before;
        drop(list);
        if appended > 0 {
            self.bump();
        }
        appended
    }

    /// Replace the record with the same id. Unknown ids are ignored.
    ///
    /// Returns true if a record was replaced.
    pub fn patch(&self, item: JobItem) -> bool {
        let mut list = self.write();
        let Some(slot) = list.iter_mut().find(|existing| existing.id == item.id) else {
            debug!(job_id = %item.id, "dropping patch for job not in list");
            return false;
        };
        *slot = item;
        drop(list);
        self.bump();
        true
    }

    /// Set the `collected` flag. Returns the previous value, or `None` when
    /// the id is not in the list.
    pub fn set_collected(&self, id: &JobId, value: bool) -> Option<bool> {
        let mut list = self.write();
        let slot = list.iter_mut().find(|existing| &existing.id == id)?;
        let previous = slot.collected;
        slot.collected = value;
        drop(list);
        if previous != value {
            self.bump();
        }
        Some(previous)
    }

    /// Remove the record with `id`.
    pub fn remove(&self, id: &JobId) -> Option<JobItem> {
        let mut list = self.write();
        let position = list.iter().position(|existing| &existing.id == id)?;
        let removed = list.remove(position);
        drop(list);
        self.bump();
        Some(removed)
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.write().clear();
        self.bump();
    }

    /// Copy of the current list.
    pub fn snapshot(&self) -> Vec<JobItem> {
        self.read().clone()
    }

    pub fn get(&self, id: &JobId) -> Option<JobItem> {
        self.read().iter().find(|item| &item.id == id).cloned()
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.read().iter().any(|item| &item.id == id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of mutations applied so far.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Follow mutations.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

fn dedup_batch(items: Vec<JobItem>) -> Vec<JobItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::JobStatus;

    fn ids(list: &JobList) -> Vec<JobId> {
        list.snapshot().into_iter().map(|item| item.id).collect()
    }

    fn queued(id: i64) -> JobItem {
        JobItem::new(id, JobStatus::Queued)
    }

    #[test]
    fn test_merge_prepends_new_ids_only() {
        let list = JobList::new();
        list.merge_recent(vec![queued(5), queued(6)]);
        let pending = list.merge_recent(vec![queued(6), queued(7)]);

        assert_eq!(ids(&list), vec![JobId::Int(7), JobId::Int(5), JobId::Int(6)]);
        assert_eq!(pending, vec![JobId::Int(7)]);
    }

    /// Ids from 1..=6 selected by `mask`, rotated so order is not always ascending.
    fn subset(mask: u32, rotate: usize) -> Vec<i64> {
        let mut ids: Vec<i64> = (1..=6).filter(|id| mask & (1 << (id - 1)) != 0).collect();
        if !ids.is_empty() {
            let len = ids.len();
            ids.rotate_left(rotate % len);
        }
        ids
    }

    #[test]
    fn test_merge_dedup_holds_for_every_small_id_set() {
        for a_mask in 0..64 {
            for b_mask in 0..64 {
                for rotate in 0..3 {
                    let a = subset(a_mask, rotate);
                    let mut b = subset(b_mask, rotate + 1);
                    // Repeat the head of the batch to exercise in-batch duplicates
                    if let Some(&head) = b.first() {
                        b.push(head);
                    }

                    let list = JobList::new();
                    list.replace_all(a.iter().map(|&id| queued(id)).collect());
                    let pending = list.merge_recent(b.iter().map(|&id| queued(id)).collect());
                    let merged = ids(&list);

                    let unique: HashSet<&JobId> = merged.iter().collect();
                    assert_eq!(unique.len(), merged.len(), "duplicates for A={a:?} B={b:?}");

                    let a_ids: Vec<JobId> = a.iter().map(|&id| JobId::Int(id)).collect();
                    let kept: Vec<JobId> = merged
                        .iter()
                        .filter(|id| a_ids.contains(id))
                        .cloned()
                        .collect();
                    assert_eq!(kept, a_ids, "order of A changed for A={a:?} B={b:?}");

                    let mut fresh: Vec<JobId> = Vec::new();
                    for id in b.iter().map(|&id| JobId::Int(id)) {
                        if !a_ids.contains(&id) && !fresh.contains(&id) {
                            fresh.push(id);
                        }
                    }
                    assert_eq!(merged[..fresh.len()], fresh[..]);
                    assert_eq!(merged.len(), fresh.len() + a_ids.len());
                    assert_eq!(pending, fresh);
                }
            }
        }
    }

    #[test]
    fn test_merge_does_not_overwrite_existing() {
        let list = JobList::new();
        list.replace_all(vec![JobItem::new(1, JobStatus::Processing)]);
        list.merge_recent(vec![JobItem::new(1, JobStatus::Failed)]);

        assert_eq!(list.get(&JobId::Int(1)).unwrap().status, JobStatus::Processing);
    }

    #[test]
    fn test_merge_collapses_batch_duplicates() {
        let list = JobList::new();
        let pending = list.merge_recent(vec![
            queued(3),
            JobItem::new(3, JobStatus::Succeeded),
            queued(4),
        ]);

        assert_eq!(list.len(), 2);
        assert_eq!(list.get(&JobId::Int(3)).unwrap().status, JobStatus::Queued);
        assert_eq!(pending, vec![JobId::Int(3), JobId::Int(4)]);
    }

    #[test]
    fn test_merge_skips_terminal_for_polling() {
        let list = JobList::new();
        let pending = list.merge_recent(vec![
            JobItem::new(8, JobStatus::Succeeded).with_result_url("https://x/8.jpg"),
            queued(9),
        ]);
        assert_eq!(pending, vec![JobId::Int(9)]);
    }

    #[test]
    fn test_patch_is_idempotent() {
        let list = JobList::new();
        list.replace_all(vec![queued(1), queued(2)]);
        let done = JobItem::new(1, JobStatus::Succeeded).with_result_url("https://x/y.jpg");

        assert!(list.patch(done.clone()));
        let once = list.snapshot();
        assert!(list.patch(done));
        assert_eq!(list.snapshot(), once);
    }

    #[test]
    fn test_patch_unknown_id_is_dropped() {
        let list = JobList::new();
        list.replace_all(vec![queued(1)]);
        let revision = list.revision();

        assert!(!list.patch(queued(99)));
        assert_eq!(list.len(), 1);
        assert_eq!(list.revision(), revision);
    }

    #[test]
    fn test_set_collected_returns_previous() {
        let list = JobList::new();
        list.replace_all(vec![JobItem::new(1, JobStatus::Succeeded)]);

        assert_eq!(list.set_collected(&JobId::Int(1), true), Some(false));
        assert_eq!(list.set_collected(&JobId::Int(1), true), Some(true));
        assert_eq!(list.set_collected(&JobId::Int(2), true), None);
    }

    #[test]
    fn test_append_page_skips_present() {
        let list = JobList::new();
        list.replace_all(vec![queued(10), queued(9)]);

        assert_eq!(list.append_page(vec![queued(9), queued(8), queued(7)]), 2);
        assert_eq!(
            ids(&list),
            vec![JobId::Int(10), JobId::Int(9), JobId::Int(8), JobId::Int(7)]
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let list = JobList::new();
        list.replace_all(vec![queued(1), queued(2)]);

        assert_eq!(list.remove(&JobId::Int(1)).map(|i| i.id), Some(JobId::Int(1)));
        assert!(list.remove(&JobId::Int(1)).is_none());
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_revision_follows_mutations() {
        let list = JobList::new();
        let mut rx = list.subscribe();

        list.replace_all(vec![queued(1)]);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        list.merge_recent(vec![queued(1)]);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(list.revision(), 1);
    }
}
