//! Transient user-facing alerts.
//!
//! Failed background work never propagates as an error. It ends up here
//! instead, where a UI can show it until it is dismissed, resolved, or
//! expired.
//!
//! ## Alert Kinds
//!
//! - **Warning**: status check failed, list could not be loaded
//! - **Critical**: submission rejected, collect or delete failed
//!
//! Raising an alert while one of the same kind is active updates the
//! existing alert instead of adding another.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertSeverity {
    /// Informational
    Info = 0,
    /// Something will be retried automatically
    Warning = 1,
    /// A user action failed and was undone
    Critical = 2,
}

impl AlertSeverity {
    /// Get the icon for this severity level.
    pub fn icon(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "ℹ",
            AlertSeverity::Warning => "⚠",
            AlertSeverity::Critical => "✖",
        }
    }
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    /// A poll of pending job status failed
    StatusCheckFailed,
    /// The backend refused a generation request
    SubmissionRejected,
    /// Adding to or removing from the album failed
    CollectFailed,
    /// Deleting an item failed
    DeleteFailed,
    /// Loading the job list failed
    ListFailed,
}

impl AlertKind {
    pub fn severity(&self) -> AlertSeverity {
        match self {
            AlertKind::StatusCheckFailed | AlertKind::ListFailed => AlertSeverity::Warning,
            AlertKind::SubmissionRejected | AlertKind::CollectFailed | AlertKind::DeleteFailed => {
                AlertSeverity::Critical
            }
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::StatusCheckFailed => "Status Check Failed",
            AlertKind::SubmissionRejected => "Generation Rejected",
            AlertKind::CollectFailed => "Album Update Failed",
            AlertKind::DeleteFailed => "Delete Failed",
            AlertKind::ListFailed => "Could Not Load Generations",
        }
    }
}

/// A single alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Unique alert identifier
    pub id: u64,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    /// Detailed message
    pub message: String,
    /// When the alert was first raised
    pub created_at: DateTime<Utc>,
    /// When the alert was last raised again
    pub updated_at: DateTime<Utc>,
    /// Number of times this alert has occurred
    pub occurrence_count: u32,
    /// False once dismissed, resolved or expired
    pub is_active: bool,
}

impl Alert {
    fn new(id: u64, kind: AlertKind, message: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            severity: kind.severity(),
            message,
            created_at: now,
            updated_at: now,
            occurrence_count: 1,
            is_active: true,
        }
    }

    /// Format for display in one line.
    pub fn format_compact(&self) -> String {
        let count_marker = if self.occurrence_count > 1 {
            format!(" (x{})", self.occurrence_count)
        } else {
            String::new()
        };
        format!(
            "{} {}: {}{}",
            self.severity.icon(),
            self.kind.title(),
            self.message,
            count_marker
        )
    }
}

#[derive(Debug)]
struct AlertState {
    alerts: HashMap<u64, Alert>,
    active_by_kind: HashMap<AlertKind, u64>,
    next_id: u64,
    max_alerts: usize,
}

/// Thread-safe alert store.
#[derive(Debug)]
pub struct AlertCenter {
    state: Mutex<AlertState>,
}

impl Default for AlertCenter {
    fn default() -> Self {
        Self::new(50)
    }
}

impl AlertCenter {
    /// Create an alert center keeping at most `max_alerts` alerts.
    pub fn new(max_alerts: usize) -> Self {
        Self {
            state: Mutex::new(AlertState {
                alerts: HashMap::new(),
                active_by_kind: HashMap::new(),
                next_id: 1,
                max_alerts: max_alerts.max(1),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AlertState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Raise an alert, or bump the active alert of the same kind.
    pub fn raise(&self, kind: AlertKind, message: impl Into<String>) -> u64 {
        let message = message.into();
        let mut state = self.lock();

        if let Some(&existing_id) = state.active_by_kind.get(&kind) {
            if let Some(alert) = state.alerts.get_mut(&existing_id) {
                alert.occurrence_count += 1;
                alert.updated_at = Utc::now();
                alert.message = message;
                debug!(alert_id = existing_id, ?kind, count = alert.occurrence_count, "alert repeated");
                return existing_id;
            }
        }

        let id = state.next_id;
        state.next_id += 1;
        info!(alert_id = id, ?kind, %message, "alert raised");
        state.alerts.insert(id, Alert::new(id, kind, message));
        state.active_by_kind.insert(kind, id);

        if state.alerts.len() > state.max_alerts {
            prune(&mut state);
        }
        id
    }

    /// Dismiss one alert. Returns false if it was not active.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut state = self.lock();
        deactivate(&mut state, id)
    }

    /// Dismiss every active alert. Returns how many were dismissed.
    pub fn dismiss_all(&self) -> usize {
        let mut state = self.lock();
        let ids: Vec<u64> = state.active_by_kind.values().copied().collect();
        ids.into_iter().filter(|id| deactivate(&mut state, *id)).count()
    }

    /// Clear the active alert of `kind`, e.g. once polling recovers.
    pub fn resolve_kind(&self, kind: AlertKind) -> bool {
        let mut state = self.lock();
        match state.active_by_kind.get(&kind).copied() {
            Some(id) => deactivate(&mut state, id),
            None => false,
        }
    }

    /// Deactivate alerts not raised again within `ttl`. Returns how many
    /// expired.
    pub fn expire(&self, ttl: std::time::Duration) -> usize {
        let now = Utc::now();
        let mut state = self.lock();
        let stale: Vec<u64> = state
            .alerts
            .values()
            .filter(|a| a.is_active && (now - a.updated_at).to_std().is_ok_and(|age| age >= ttl))
            .map(|a| a.id)
            .collect();
        stale.into_iter().filter(|id| deactivate(&mut state, *id)).count()
    }

    pub fn get(&self, id: u64) -> Option<Alert> {
        self.lock().alerts.get(&id).cloned()
    }

    /// Active alerts, most severe first, then newest first.
    pub fn active(&self) -> Vec<Alert> {
        let state = self.lock();
        let mut alerts: Vec<Alert> = state.alerts.values().filter(|a| a.is_active).cloned().collect();
        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.updated_at.cmp(&a.updated_at))
                .then(b.id.cmp(&a.id))
        });
        alerts
    }

    /// Active alert of `kind`, if any.
    pub fn active_of(&self, kind: AlertKind) -> Option<Alert> {
        let state = self.lock();
        let id = state.active_by_kind.get(&kind)?;
        state.alerts.get(id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.lock().active_by_kind.len()
    }

    pub fn has_alerts(&self) -> bool {
        self.active_count() > 0
    }

    /// Drop all alerts, active or not.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.alerts.clear();
        state.active_by_kind.clear();
    }
}

fn deactivate(state: &mut AlertState, id: u64) -> bool {
    let Some(alert) = state.alerts.get_mut(&id) else {
        return false;
    };
    if !alert.is_active {
        return false;
    }
    alert.is_active = false;
    alert.updated_at = Utc::now();
    let kind = alert.kind;
    if state.active_by_kind.get(&kind) == Some(&id) {
        state.active_by_kind.remove(&kind);
    }
    true
}

/// Drop the oldest inactive alerts until within bounds.
fn prune(state: &mut AlertState) {
    let mut inactive: Vec<(DateTime<Utc>, u64)> = state
        .alerts
        .values()
        .filter(|a| !a.is_active)
        .map(|a| (a.created_at, a.id))
        .collect();
    inactive.sort();

    let excess = state.alerts.len().saturating_sub(state.max_alerts);
    for (_, id) in inactive.into_iter().take(excess) {
        state.alerts.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_alert_kind_severity() {
        assert_eq!(AlertKind::StatusCheckFailed.severity(), AlertSeverity::Warning);
        assert_eq!(AlertKind::CollectFailed.severity(), AlertSeverity::Critical);
        assert!(AlertSeverity::Critical > AlertSeverity::Info);
    }

    #[test]
    fn test_raise_duplicate_bumps_count() {
        let alerts = AlertCenter::default();
        let first = alerts.raise(AlertKind::StatusCheckFailed, "timeout");
        let second = alerts.raise(AlertKind::StatusCheckFailed, "connection refused");

        assert_eq!(first, second);
        let alert = alerts.get(first).unwrap();
        assert_eq!(alert.occurrence_count, 2);
        assert_eq!(alert.message, "connection refused");
        assert!(alert.format_compact().contains("(x2)"));
        assert_eq!(alerts.active_count(), 1);
    }

    #[test]
    fn test_resolve_kind() {
        let alerts = AlertCenter::default();
        alerts.raise(AlertKind::StatusCheckFailed, "timeout");
        alerts.raise(AlertKind::DeleteFailed, "not found");

        assert!(alerts.resolve_kind(AlertKind::StatusCheckFailed));
        assert!(!alerts.resolve_kind(AlertKind::StatusCheckFailed));
        assert_eq!(alerts.active().len(), 1);

        // A fresh failure after recovery is a new alert
        let id = alerts.raise(AlertKind::StatusCheckFailed, "timeout");
        assert_eq!(alerts.get(id).unwrap().occurrence_count, 1);
    }

    #[test]
    fn test_dismiss() {
        let alerts = AlertCenter::default();
        let id = alerts.raise(AlertKind::CollectFailed, "offline");
        assert!(alerts.dismiss(id));
        assert!(!alerts.dismiss(id));
        assert!(!alerts.has_alerts());

        alerts.raise(AlertKind::CollectFailed, "offline");
        alerts.raise(AlertKind::ListFailed, "offline");
        assert_eq!(alerts.dismiss_all(), 2);
    }

    #[test]
    fn test_active_sorted_by_severity() {
        let alerts = AlertCenter::default();
        alerts.raise(AlertKind::ListFailed, "a");
        alerts.raise(AlertKind::SubmissionRejected, "b");

        let active = alerts.active();
        assert_eq!(active[0].kind, AlertKind::SubmissionRejected);
        assert_eq!(active[1].kind, AlertKind::ListFailed);
    }

    #[test]
    fn test_expire() {
        let alerts = AlertCenter::default();
        alerts.raise(AlertKind::ListFailed, "a");

        assert_eq!(alerts.expire(Duration::from_secs(3600)), 0);
        assert_eq!(alerts.expire(Duration::ZERO), 1);
        assert!(alerts.active_of(AlertKind::ListFailed).is_none());
    }

    #[test]
    fn test_prune_keeps_bound() {
        let alerts = AlertCenter::new(2);
        for _ in 0..5 {
            alerts.raise(AlertKind::DeleteFailed, "x");
            alerts.resolve_kind(AlertKind::DeleteFailed);
        }
        alerts.raise(AlertKind::DeleteFailed, "x");
        assert!(alerts.lock().alerts.len() <= 2);
        assert_eq!(alerts.active_count(), 1);
    }
}
