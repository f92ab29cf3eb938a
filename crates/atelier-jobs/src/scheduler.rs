//! Repeating task scheduling.
//!
//! The poller never sleeps itself; it asks a [`Scheduler`] to run its tick
//! at a fixed interval. [`TokioScheduler`] does this on the tokio runtime,
//! [`ManualScheduler`] lets tests decide when a tick happens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// One tick of a repeating task.
pub type TickTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Runs a task repeatedly until its handle is cancelled.
pub trait Scheduler: Send + Sync {
    /// Run `task` now and then every `interval`.
    fn schedule_repeating(&self, interval: Duration, task: TickTask) -> ScheduleHandle;
}

/// Cancellation handle for a scheduled task.
///
/// Cancelling prevents further ticks. A tick that is already running is
/// allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct ScheduleHandle {
    cancelled: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ScheduleHandle {
    fn new() -> Self {
        Self::default()
    }

    /// Stop scheduling further ticks.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.wake.notify_one();
        }
    }

    /// Returns true until [`cancel`](Self::cancel) is called.
    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduler backed by `tokio::time::interval`.
///
/// The first tick fires immediately; ticks missed while a slow tick was
/// running are delayed rather than bursted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, interval: Duration, task: TickTask) -> ScheduleHandle {
        let handle = ScheduleHandle::new();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime available, task not scheduled");
            handle.cancel();
            return handle;
        };

        let cancelled = Arc::clone(&handle.cancelled);
        let wake = Arc::clone(&handle.wake);
        // tokio::time::interval panics on a zero period
        let period = interval.max(Duration::from_millis(1));
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = wake.notified() => {}
                }
                if cancelled.load(Ordering::SeqCst) {
                    break;
                }
                task().await;
            }
            debug!("scheduled task stopped");
        });

        handle
    }
}

/// Scheduler driven by hand, for deterministic tests.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<(Duration, TickTask, ScheduleHandle)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Duration, TickTask, ScheduleHandle)>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run one tick of every active task, in scheduling order. Returns the
    /// number of ticks run.
    pub async fn fire(&self) -> usize {
        let due: Vec<TickTask> = {
            let mut tasks = self.lock();
            tasks.retain(|(_, _, handle)| handle.is_active());
            tasks.iter().map(|(_, task, _)| Arc::clone(task)).collect()
        };

        for task in &due {
            task().await;
        }
        due.len()
    }

    /// Number of tasks that have not been cancelled.
    pub fn active_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|(_, _, handle)| handle.is_active())
            .count()
    }

    /// Intervals of the active tasks.
    pub fn intervals(&self) -> Vec<Duration> {
        self.lock()
            .iter()
            .filter(|(_, _, handle)| handle.is_active())
            .map(|(interval, _, _)| *interval)
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, interval: Duration, task: TickTask) -> ScheduleHandle {
        let handle = ScheduleHandle::new();
        self.lock().push((interval, task, handle.clone()));
        handle
    }
}
