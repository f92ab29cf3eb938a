//! Periodic status checks for pending jobs.
//!
//! While the [`JobRegistry`] is non-empty the poller asks the backend for
//! the status of every pending id once per interval, patches the returned
//! records into the [`JobList`] and retires ids that reached a terminal
//! status. It stops itself once nothing is pending.
//!
//! ## Failure handling
//!
//! A failed status check changes nothing except raising a
//! [`AlertKind::StatusCheckFailed`] alert. Consecutive failures back off
//! by skipping ticks: after `n` failures the next request waits
//! `min(interval * multiplier^(n-1), max_backoff)`. The first success
//! resets the backoff and resolves the alert.
//!
//! ## Ordering
//!
//! Every request carries a sequence number. A response older than one
//! already applied is discarded, so a slow response can never roll a job
//! back to an earlier status.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use atelier_client::JobApi;
use atelier_core::{JobId, PollingConfig, RetryConfig};
use tracing::{debug, info, warn};

use crate::alert::{AlertCenter, AlertKind};
use crate::reconciler::JobList;
use crate::registry::JobRegistry;
use crate::scheduler::{ScheduleHandle, Scheduler, TickTask};

/// Shortest poll interval; a configured zero is raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing pending; the poller stopped
    Idle,
    /// Skipped while backing off after failures
    Backoff { remaining: u32 },
    /// A response was applied
    Applied {
        /// Records replaced in the list
        patched: usize,
        /// Ids that reached a terminal status
        resolved: Vec<JobId>,
        /// Ids dropped because neither the backend nor the list knows them
        pruned: Vec<JobId>,
    },
    /// The response was older than one already applied
    Stale,
    /// The status request failed
    Failed,
}

#[derive(Debug, Default)]
struct BackoffState {
    consecutive_failures: u32,
    skip_remaining: u32,
}

/// Status poller for pending jobs.
pub struct Poller {
    api: Arc<dyn JobApi>,
    registry: Arc<JobRegistry>,
    list: Arc<JobList>,
    alerts: Arc<AlertCenter>,
    scheduler: Arc<dyn Scheduler>,
    interval: Duration,
    backoff: RetryConfig,
    running: Mutex<Option<ScheduleHandle>>,
    state: Mutex<BackoffState>,
    issued: AtomicU64,
    applied: AtomicU64,
}

impl Poller {
    pub fn new(
        api: Arc<dyn JobApi>,
        registry: Arc<JobRegistry>,
        list: Arc<JobList>,
        alerts: Arc<AlertCenter>,
        scheduler: Arc<dyn Scheduler>,
        config: &PollingConfig,
    ) -> Self {
        let interval = config.interval();
        if interval < MIN_INTERVAL {
            warn!(interval_ms = interval.as_millis() as u64, "poll interval too short, using 1ms");
        }
        Self {
            api,
            registry,
            list,
            alerts,
            scheduler,
            interval: interval.max(MIN_INTERVAL),
            backoff: config.backoff(),
            running: Mutex::new(None),
            state: Mutex::new(BackoffState::default()),
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<ScheduleHandle>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn backoff_state(&self) -> MutexGuard<'_, BackoffState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling: one tick right away, then one per interval.
    ///
    /// Returns false if the poller was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running();
        if running.as_ref().is_some_and(ScheduleHandle::is_active) {
            return false;
        }

        *self.backoff_state() = BackoffState::default();

        let poller = Arc::downgrade(self);
        let task: TickTask = Arc::new(move || {
            let poller = poller.clone();
            Box::pin(async move {
                if let Some(poller) = poller.upgrade() {
                    poller.tick().await;
                }
            })
        });

        info!(interval_ms = self.interval.as_millis() as u64, "polling started");
        *running = Some(self.scheduler.schedule_repeating(self.interval, task));
        true
    }

    /// Cancel the next scheduled tick. A tick already in flight still
    /// applies its response.
    ///
    /// Returns false if the poller was not running.
    pub fn stop(&self) -> bool {
        match self.running().take() {
            Some(handle) if handle.is_active() => {
                handle.cancel();
                info!("polling stopped");
                true
            }
            _ => false,
        }
    }

    /// Returns true while ticks are scheduled.
    pub fn is_running(&self) -> bool {
        self.running().as_ref().is_some_and(ScheduleHandle::is_active)
    }

    /// Stop unless new ids were registered meanwhile.
    ///
    /// The emptiness check happens under the same lock `start` takes, so a
    /// concurrent registration either sees the poller stopped and restarts
    /// it, or keeps it running.
    fn stop_if_idle(&self) {
        let mut running = self.running();
        if !self.registry.is_empty() {
            return;
        }
        if let Some(handle) = running.take() {
            if handle.is_active() {
                handle.cancel();
                info!("no pending jobs, polling stopped");
            }
        }
    }

    /// Number of consecutive failed status checks.
    pub fn consecutive_failures(&self) -> u32 {
        self.backoff_state().consecutive_failures
    }

    /// Run one polling step.
    pub async fn tick(&self) -> TickOutcome {
        let ids = self.registry.snapshot();
        if ids.is_empty() {
            self.stop_if_idle();
            return TickOutcome::Idle;
        }

        {
            let mut state = self.backoff_state();
            if state.skip_remaining > 0 {
                state.skip_remaining -= 1;
                debug!(remaining = state.skip_remaining, "status check deferred by backoff");
                return TickOutcome::Backoff {
                    remaining: state.skip_remaining,
                };
            }
        }

        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(seq, pending = ids.len(), "checking job status");

        let items = match self.api.status(&ids).await {
            Ok(items) => items,
            Err(e) => {
                let (failures, skip) = self.record_failure();
                warn!(
                    seq,
                    failures,
                    skip_ticks = skip,
                    error = %e,
                    "status check failed, pending jobs kept"
                );
                self.alerts
                    .raise(AlertKind::StatusCheckFailed, e.friendly_message());
                return TickOutcome::Failed;
            }
        };

        if self.applied.fetch_max(seq, Ordering::SeqCst) > seq {
            debug!(seq, "discarding stale status response");
            return TickOutcome::Stale;
        }

        *self.backoff_state() = BackoffState::default();
        self.alerts.resolve_kind(AlertKind::StatusCheckFailed);

        let returned: HashSet<JobId> = items.iter().map(|item| item.id.clone()).collect();
        let mut resolved = Vec::new();
        let mut patched = 0;
        for item in items {
            if item.is_terminal() && self.registry.contains(&item.id) {
                atelier_core::log_job_event!(item.id, "completed", status = %item.status);
                resolved.push(item.id.clone());
            }
            if self.list.patch(item) {
                patched += 1;
            }
        }

        let pruned: Vec<JobId> = ids
            .into_iter()
            .filter(|id| !returned.contains(id) && !self.list.contains(id))
            .collect();
        for id in &pruned {
            atelier_core::log_job_event!(id, "pruned");
        }

        let drained = self.registry.remove(resolved.iter().chain(pruned.iter()));
        if drained {
            self.stop_if_idle();
        }

        TickOutcome::Applied {
            patched,
            resolved,
            pruned,
        }
    }

    /// Count a failure and schedule the ticks to skip before the next try.
    fn record_failure(&self) -> (u32, u32) {
        let mut state = self.backoff_state();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.skip_remaining = skip_ticks(
            &self.backoff,
            self.interval,
            state.consecutive_failures,
        );
        (state.consecutive_failures, state.skip_remaining)
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("api", &self.api.name())
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Ticks to skip after `failures` consecutive failures.
///
/// The wait before the next request is `base_delay_for_attempt(failures - 1)`;
/// the next regular tick already accounts for one interval of it.
pub fn skip_ticks(backoff: &RetryConfig, interval: Duration, failures: u32) -> u32 {
    if failures == 0 || interval.is_zero() {
        return 0;
    }
    let wait = backoff.base_delay_for_attempt(failures - 1);
    let ticks = (wait.as_secs_f64() / interval.as_secs_f64() - 1e-9).ceil();
    (ticks as u32).saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> (RetryConfig, Duration) {
        let config = PollingConfig::default();
        (config.backoff(), config.interval())
    }

    #[test]
    fn test_first_failure_retries_on_next_tick() {
        let (backoff, interval) = backoff();
        assert_eq!(skip_ticks(&backoff, interval, 0), 0);
        assert_eq!(skip_ticks(&backoff, interval, 1), 0);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let (backoff, interval) = backoff();
        // 3s interval: waits of 6s, 12s, 24s, then the 30s cap
        assert_eq!(skip_ticks(&backoff, interval, 2), 1);
        assert_eq!(skip_ticks(&backoff, interval, 3), 3);
        assert_eq!(skip_ticks(&backoff, interval, 4), 7);
        assert_eq!(skip_ticks(&backoff, interval, 5), 9);
        assert_eq!(skip_ticks(&backoff, interval, 50), 9);
    }

    #[test]
    fn test_zero_interval_never_skips() {
        let (backoff, _) = backoff();
        assert_eq!(skip_ticks(&backoff, Duration::ZERO, 4), 0);
    }
}
