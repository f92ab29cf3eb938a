//! # atelier-jobs
//!
//! Client-side tracking of asynchronous generation jobs.
//!
//! This crate provides:
//! - [`JobRegistry`] - Ids of jobs still awaiting a terminal status
//! - [`Poller`] - Periodic status checks while anything is pending
//! - [`JobList`] - The visible list and its merge/patch rules
//! - [`GenerationGate`] - Observable "generation in progress" flag
//! - [`EventBus`] - Synchronous job lifecycle events
//! - [`AlertCenter`] - Transient alerts for failed background work
//! - [`JobTracker`] - Everything above wired together
//!
//! ## Flow
//!
//! ```text
//! submit ──► SubmissionSucceeded ──► JobList::merge_recent
//!                                        │ non-terminal ids
//!                                        ▼
//!                  GenerationGate ◄── JobRegistry ──► Poller::start
//!                                        ▲                │ every interval
//!                                        │ terminal ids   ▼
//!                                        └──────── status ─► JobList::patch
//! ```
//!
//! Polling stops by itself once the registry drains, which also lowers the
//! gate.

pub mod actions;
pub mod alert;
pub mod events;
pub mod gate;
pub mod poller;
pub mod reconciler;
pub mod registry;
pub mod scheduler;
pub mod tracker;

pub use actions::{ActionOutcome, Compensation, InFlight, InFlightClaim};
pub use alert::{Alert, AlertCenter, AlertKind, AlertSeverity};
pub use events::{EventBus, EventKind, JobEvent, SubscriptionId};
pub use gate::{GenerationGate, SubmissionGuard};
pub use poller::{Poller, TickOutcome};
pub use reconciler::JobList;
pub use registry::JobRegistry;
pub use scheduler::{ManualScheduler, ScheduleHandle, Scheduler, TickTask, TokioScheduler};
pub use tracker::{JobTracker, LoadOutcome, SubmitOutcome};
