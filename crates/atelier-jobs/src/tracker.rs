//! Wiring of the job tracking components.
//!
//! [`JobTracker`] owns one instance of every component, connects them
//! through the [`EventBus`] and exposes the user-facing operations. None of
//! its operations return an error: failures are logged, turned into
//! alerts and reported as outcome values.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use atelier_client::{GenerateRequest, HttpJobApi};
//! use atelier_core::AtelierConfig;
//! use atelier_jobs::{JobTracker, TokioScheduler};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AtelierConfig::load()?;
//! let api = Arc::new(HttpJobApi::from_config(&config.api)?);
//! let tracker = JobTracker::new(api, &config, Arc::new(TokioScheduler));
//!
//! tracker.reload().await;
//! tracker.submit(&GenerateRequest::new("linen blazer")).await;
//!
//! let mut gate = tracker.gate().subscribe();
//! gate.wait_for(|active| !*active).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Weak};

use atelier_client::{CollectAction, GenerateRequest, JobApi};
use atelier_core::recovery::retry_async;
use atelier_core::{AtelierConfig, JobId, JobItem, JobPage};
use tracing::{debug, info, warn};

use crate::actions::{ActionOutcome, Compensation, InFlight};
use crate::alert::{AlertCenter, AlertKind};
use crate::events::{EventBus, EventKind, JobEvent};
use crate::gate::GenerationGate;
use crate::poller::Poller;
use crate::reconciler::JobList;
use crate::registry::JobRegistry;
use crate::scheduler::Scheduler;

/// Result of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The backend created these jobs
    Accepted { jobs: Vec<JobId> },
    /// The backend refused or could not be reached
    Rejected { message: String },
}

/// Result of loading part of the job list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// `count` items received out of `total` on the backend
    Loaded { count: usize, total: u64 },
    /// The list could not be fetched; the visible list is unchanged
    Failed { message: String },
}

struct TrackerInner {
    api: Arc<dyn JobApi>,
    config: AtelierConfig,
    gate: Arc<GenerationGate>,
    registry: Arc<JobRegistry>,
    list: Arc<JobList>,
    poller: Arc<Poller>,
    bus: Arc<EventBus>,
    alerts: Arc<AlertCenter>,
    collecting: InFlight,
}

impl TrackerInner {
    /// Register non-terminal ids and make sure they get polled.
    fn track(&self, ids: Vec<JobId>) {
        if ids.is_empty() {
            return;
        }
        for id in &ids {
            atelier_core::log_job_event!(id, "tracking");
        }
        self.registry.add(ids);
        self.poller.start();
    }
}

/// Job tracking facade.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<TrackerInner>,
}

impl JobTracker {
    /// Build every component and install the event handlers.
    pub fn new(api: Arc<dyn JobApi>, config: &AtelierConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        let gate = Arc::new(GenerationGate::new());
        let registry = Arc::new(JobRegistry::new(Arc::clone(&gate)));
        let list = Arc::new(JobList::new());
        let alerts = Arc::new(AlertCenter::new(config.alerts.max_alerts));
        let poller = Arc::new(Poller::new(
            Arc::clone(&api),
            Arc::clone(&registry),
            Arc::clone(&list),
            Arc::clone(&alerts),
            scheduler,
            &config.polling,
        ));

        let inner = Arc::new(TrackerInner {
            api,
            config: config.clone(),
            gate,
            registry,
            list,
            poller,
            bus: Arc::new(EventBus::new()),
            alerts,
            collecting: InFlight::new(),
        });
        install_handlers(&inner);

        debug!(api = inner.api.name(), "job tracker ready");
        Self { inner }
    }

    pub fn api(&self) -> &Arc<dyn JobApi> {
        &self.inner.api
    }

    pub fn config(&self) -> &AtelierConfig {
        &self.inner.config
    }

    pub fn gate(&self) -> &Arc<GenerationGate> {
        &self.inner.gate
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.inner.registry
    }

    pub fn list(&self) -> &Arc<JobList> {
        &self.inner.list
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.inner.poller
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    pub fn alerts(&self) -> &Arc<AlertCenter> {
        &self.inner.alerts
    }

    /// Submit a generation request.
    ///
    /// The gate is raised for the duration of the call. On success the
    /// created jobs are announced on the bus, which merges and tracks them,
    /// and the most recent page is merged in as well.
    ///
    /// The request is sent exactly once. A timed-out submission may still
    /// have been accepted, and repeating it would create new jobs.
    pub async fn submit(&self, request: &GenerateRequest) -> SubmitOutcome {
        let _submission = self.inner.gate.begin_submission();

        match self.inner.api.submit(request).await {
            Ok(items) => {
                let jobs: Vec<JobId> = items.iter().map(|item| item.id.clone()).collect();
                info!(count = jobs.len(), "generation submitted");
                self.inner
                    .bus
                    .emit(&JobEvent::SubmissionSucceeded { items });
                self.refresh_recent().await;
                SubmitOutcome::Accepted { jobs }
            }
            Err(e) => {
                let message = e.friendly_message();
                warn!(error = %e, "generation rejected");
                self.inner
                    .alerts
                    .raise(AlertKind::SubmissionRejected, message.clone());
                SubmitOutcome::Rejected { message }
            }
        }
    }

    /// Replace the list with the first page and track its unfinished jobs.
    pub async fn reload(&self) -> LoadOutcome {
        let page_size = self.inner.config.polling.page_size;
        self.fetch(1, page_size, |inner, page| {
            let pending = unfinished(&page.list);
            inner.list.replace_all(page.list);
            inner.track(pending);
        })
        .await
    }

    /// Merge the newest items into the list without disturbing it.
    pub async fn refresh_recent(&self) -> LoadOutcome {
        let page_size = self.inner.config.polling.recent_page_size;
        self.fetch(1, page_size, |inner, page| {
            let pending = inner.list.merge_recent(page.list);
            inner.track(pending);
        })
        .await
    }

    /// Append a later page of the list.
    pub async fn load_page(&self, page: u32) -> LoadOutcome {
        let page_size = self.inner.config.polling.page_size;
        self.fetch(page.max(1), page_size, |inner, page| {
            let pending = unfinished(&page.list);
            inner.list.append_page(page.list);
            inner.track(pending);
        })
        .await
    }

    async fn fetch<F>(&self, page: u32, page_size: u32, apply: F) -> LoadOutcome
    where
        F: FnOnce(&TrackerInner, JobPage),
    {
        match self.inner.api.list(page, page_size).await {
            Ok(data) => {
                let count = data.list.len();
                let total = data.total;
                apply(&self.inner, data);
                self.inner.alerts.resolve_kind(AlertKind::ListFailed);
                debug!(page, count, total, "job list page loaded");
                LoadOutcome::Loaded { count, total }
            }
            Err(e) => {
                let message = e.friendly_message();
                warn!(page, error = %e, "failed to load job list");
                self.inner.alerts.raise(AlertKind::ListFailed, message.clone());
                LoadOutcome::Failed { message }
            }
        }
    }

    /// Add to or remove from the album, optimistically.
    ///
    /// The flag flips immediately and is restored if the backend does not
    /// confirm. While one update of an item is in flight, further updates
    /// of the same item return [`ActionOutcome::Busy`].
    pub async fn set_collected(&self, id: &JobId, value: bool) -> ActionOutcome {
        let Some(_claim) = self.inner.collecting.claim(id) else {
            debug!(job_id = %id, "album update already in flight");
            return ActionOutcome::Busy;
        };

        let list = &self.inner.list;
        let previous = match list.set_collected(id, value) {
            None => {
                debug!(job_id = %id, "collect skipped, job not in list");
                return ActionOutcome::Skipped;
            }
            Some(previous) if previous == value => return ActionOutcome::Skipped,
            Some(previous) => previous,
        };

        let undo_list = Arc::clone(list);
        let undo_id = id.clone();
        let compensation = Compensation::new("collect", move || {
            undo_list.set_collected(&undo_id, previous);
        });

        let action = CollectAction::for_value(value);
        let api = &self.inner.api;
        let outcome = retry_async(self.inner.config.actions.retry(), || api.collect(id, action)).await;

        match outcome.result {
            Ok(()) => {
                compensation.commit();
                atelier_core::log_job_event!(id, "collected", value);
                ActionOutcome::Confirmed
            }
            Err(e) => {
                compensation.compensate();
                let message = e.friendly_message();
                warn!(job_id = %id, error = %e, "album update failed, rolled back");
                self.inner.alerts.raise(AlertKind::CollectFailed, message.clone());
                ActionOutcome::RolledBack { message }
            }
        }
    }

    /// Delete an item. The list changes only after the backend confirms.
    pub async fn delete(&self, id: &JobId) -> ActionOutcome {
        let api = &self.inner.api;
        let outcome = retry_async(self.inner.config.actions.retry(), || api.delete(id)).await;

        match outcome.result {
            Ok(()) => {
                self.inner.list.remove(id);
                if self.inner.registry.remove([id]) {
                    self.inner.poller.stop();
                }
                atelier_core::log_job_event!(id, "deleted");
                ActionOutcome::Confirmed
            }
            Err(e) => {
                let message = e.friendly_message();
                warn!(job_id = %id, error = %e, "delete failed");
                self.inner.alerts.raise(AlertKind::DeleteFailed, message.clone());
                ActionOutcome::Failed { message }
            }
        }
    }

    /// Ask for a full reload through the bus.
    pub fn request_refresh(&self) -> usize {
        self.inner.bus.emit(&JobEvent::RefreshRequested)
    }

    /// End the session: drop every job and stop polling.
    pub fn logout(&self) {
        self.inner.bus.emit(&JobEvent::LoggedOut);
    }

    /// Expire alerts older than the configured time to live.
    pub fn expire_alerts(&self) -> usize {
        let ttl = std::time::Duration::from_secs(self.inner.config.alerts.ttl_secs);
        self.inner.alerts.expire(ttl)
    }
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTracker")
            .field("api", &self.inner.api.name())
            .field("jobs", &self.inner.list.len())
            .field("pending", &self.inner.registry.len())
            .finish()
    }
}

fn unfinished(items: &[JobItem]) -> Vec<JobId> {
    items
        .iter()
        .filter(|item| !item.is_terminal())
        .map(|item| item.id.clone())
        .collect()
}

fn install_handlers(inner: &Arc<TrackerInner>) {
    let weak = Arc::downgrade(inner);
    inner.bus.on(EventKind::SubmissionSucceeded, move |event| {
        let (Some(inner), JobEvent::SubmissionSucceeded { items }) = (weak.upgrade(), event) else {
            return;
        };
        let pending = inner.list.merge_recent(items.clone());
        inner.track(pending);
    });

    let weak = Arc::downgrade(inner);
    inner.bus.on(EventKind::LoggedOut, move |_| {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        inner.poller.stop();
        inner.registry.clear();
        inner.list.clear();
        inner.alerts.clear();
        info!("session cleared");
    });

    let weak: Weak<TrackerInner> = Arc::downgrade(inner);
    inner.bus.on(EventKind::RefreshRequested, move |_| {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("refresh requested outside a runtime, ignored");
            return;
        };
        let weak = weak.clone();
        runtime.spawn(async move {
            if let Some(inner) = weak.upgrade() {
                JobTracker { inner }.reload().await;
            }
        });
    });
}
