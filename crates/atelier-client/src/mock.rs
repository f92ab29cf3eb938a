//! Scripted in-memory [`JobApi`] for tests and offline runs.
//!
//! The mock keeps a server-side item store. Without scripted replies:
//! - `list` pages through the store
//! - `status` returns the stored records for the requested ids
//! - `collect`/`delete` mutate the store and succeed
//! - `submit` fails, since there is nothing sensible to invent
//!
//! Scripted replies (`push_*`) are consumed in order before falling back to
//! the store.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::{JobId, JobItem, JobPage};

use crate::api::{CollectAction, GenerateRequest, JobApi};
use crate::error::{ClientError, Result};

/// A call received by [`MockJobApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `list(page, page_size)`
    List { page: u32, page_size: u32 },
    /// `status(ids)`
    Status { ids: Vec<JobId> },
    /// `collect(id, action)`
    Collect { id: JobId, action: CollectAction },
    /// `delete(id)`
    Delete { id: JobId },
    /// `submit(request)`
    Submit { prompt: String, count: u32 },
}

#[derive(Default)]
struct MockState {
    items: Vec<JobItem>,
    list_replies: VecDeque<Result<JobPage>>,
    status_replies: VecDeque<Result<Vec<JobItem>>>,
    submit_replies: VecDeque<Result<Vec<JobItem>>>,
    collect_replies: VecDeque<Result<()>>,
    delete_replies: VecDeque<Result<()>>,
    calls: Vec<MockCall>,
}

/// Mock backend for testing.
#[derive(Default)]
pub struct MockJobApi {
    state: Mutex<MockState>,
    delay: Option<Duration>,
}

impl MockJobApi {
    /// Create an empty mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the server-side store, newest first.
    pub fn with_items(self, items: Vec<JobItem>) -> Self {
        self.lock().items = items;
        self
    }

    /// Delay every call, to exercise overlapping requests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace a record in the server-side store.
    ///
    /// New records go to the front, as the backend lists newest first.
    pub fn upsert(&self, item: JobItem) {
        let mut state = self.lock();
        match state.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item,
            None => state.items.insert(0, item),
        }
    }

    /// Current server-side store.
    pub fn items(&self) -> Vec<JobItem> {
        self.lock().items.clone()
    }

    /// Queue a reply for the next `list` call.
    pub fn push_list(&self, reply: Result<JobPage>) {
        self.lock().list_replies.push_back(reply);
    }

    /// Queue a reply for the next `status` call.
    pub fn push_status(&self, reply: Result<Vec<JobItem>>) {
        self.lock().status_replies.push_back(reply);
    }

    /// Queue a reply for the next `submit` call.
    pub fn push_submit(&self, reply: Result<Vec<JobItem>>) {
        self.lock().submit_replies.push_back(reply);
    }

    /// Queue a reply for the next `collect` call.
    pub fn push_collect(&self, reply: Result<()>) {
        self.lock().collect_replies.push_back(reply);
    }

    /// Queue a reply for the next `delete` call.
    pub fn push_delete(&self, reply: Result<()>) {
        self.lock().delete_replies.push_back(reply);
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Number of `status` calls received so far.
    pub fn status_calls(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::Status { .. }))
            .count()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl JobApi for MockJobApi {
    async fn list(&self, page: u32, page_size: u32) -> Result<JobPage> {
        self.pause().await;
        let mut state = self.lock();
        state.calls.push(MockCall::List { page, page_size });
        if let Some(reply) = state.list_replies.pop_front() {
            return reply;
        }

        let start = (page.saturating_sub(1) as usize) * page_size as usize;
        let list = state
            .items
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(JobPage {
            list,
            total: state.items.len() as u64,
        })
    }

    async fn status(&self, ids: &[JobId]) -> Result<Vec<JobItem>> {
        self.pause().await;
        let mut state = self.lock();
        state.calls.push(MockCall::Status { ids: ids.to_vec() });
        if let Some(reply) = state.status_replies.pop_front() {
            return reply;
        }

        Ok(state
            .items
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect())
    }

    async fn collect(&self, id: &JobId, action: CollectAction) -> Result<()> {
        self.pause().await;
        let mut state = self.lock();
        state.calls.push(MockCall::Collect {
            id: id.clone(),
            action,
        });
        if let Some(reply) = state.collect_replies.pop_front() {
            return reply;
        }

        if let Some(item) = state.items.iter_mut().find(|i| &i.id == id) {
            item.collected = action == CollectAction::Add;
        }
        Ok(())
    }

    async fn delete(&self, id: &JobId) -> Result<()> {
        self.pause().await;
        let mut state = self.lock();
        state.calls.push(MockCall::Delete { id: id.clone() });
        if let Some(reply) = state.delete_replies.pop_front() {
            return reply;
        }

        state.items.retain(|i| &i.id != id);
        Ok(())
    }

    async fn submit(&self, request: &GenerateRequest) -> Result<Vec<JobItem>> {
        self.pause().await;
        let mut state = self.lock();
        state.calls.push(MockCall::Submit {
            prompt: request.prompt.clone(),
            count: request.count,
        });
        let reply = state
            .submit_replies
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::ConfigError("no scripted submission".into())));

        if let Ok(created) = &reply {
            for item in created.iter().rev() {
                if !state.items.iter().any(|i| i.id == item.id) {
                    state.items.insert(0, item.clone());
                }
            }
        }
        reply
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::JobStatus;

    #[tokio::test]
    async fn test_status_falls_back_to_store() {
        let api = MockJobApi::new().with_items(vec![
            JobItem::new(2, JobStatus::Processing),
            JobItem::new(1, JobStatus::Succeeded),
        ]);

        let items = api.status(&[JobId::Int(2), JobId::Int(99)]).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, JobId::Int(2));
    }

    #[tokio::test]
    async fn test_scripted_replies_come_first() {
        let api = MockJobApi::new().with_items(vec![JobItem::new(1, JobStatus::Queued)]);
        api.push_status(Err(ClientError::ConnectionFailed("down".into())));

        assert!(api.status(&[JobId::Int(1)]).await.is_err());
        assert_eq!(api.status(&[JobId::Int(1)]).await.unwrap().len(), 1);
        assert_eq!(api.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_list_pages_through_store() {
        let items = (1..=5).rev().map(|n| JobItem::new(n, JobStatus::Succeeded)).collect();
        let api = MockJobApi::new().with_items(items);

        let page = api.list(2, 2).await.unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<_> = page.list.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec![JobId::Int(3), JobId::Int(2)]);
    }

    #[tokio::test]
    async fn test_submit_adds_to_store() {
        let api = MockJobApi::new();
        api.push_submit(Ok(vec![JobItem::new(101, JobStatus::Queued)]));

        let created = api.submit(&GenerateRequest::new("red coat")).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(api.items().len(), 1);
        assert!(api.submit(&GenerateRequest::new("again")).await.is_err());
    }

    #[tokio::test]
    async fn test_collect_and_delete_mutate_store() {
        let api = MockJobApi::new().with_items(vec![JobItem::new(1, JobStatus::Succeeded)]);

        api.collect(&JobId::Int(1), CollectAction::Add).await.unwrap();
        assert!(api.items()[0].collected);

        api.delete(&JobId::Int(1)).await.unwrap();
        assert!(api.items().is_empty());
        assert_eq!(api.calls().len(), 2);
    }
}
