//! Shared type definitions used across Atelier crates.
//!
//! These mirror the JSON records exchanged with the generation backend, so
//! field names follow the backend's camelCase on the wire.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AtelierError;

/// Server-assigned identifier of a generation job.
///
/// The backend hands out integers for most records but some endpoints use
/// string ids, so both are accepted and kept distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    /// Numeric id
    Int(i64),
    /// Opaque string id
    Text(String),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for JobId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl FromStr for JobId {
    type Err = AtelierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.contains(',') {
            return Err(AtelierError::InvalidJobId {
                value: s.to_string(),
            });
        }
        Ok(trimmed
            .parse::<i64>()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::Text(trimmed.to_string())))
    }
}

/// Join ids the way the status endpoint expects them (`1,2,3`).
pub fn join_ids(ids: &[JobId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Lifecycle status of a generation job.
///
/// `Queued -> Processing -> {Succeeded | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobStatus {
    /// Accepted by the backend, waiting for a worker
    #[default]
    #[serde(alias = "queued", alias = "pending")]
    Queued,
    /// A worker is generating the output
    #[serde(alias = "processing", alias = "running")]
    Processing,
    /// Output is available at `result_url`
    #[serde(alias = "succeeded", alias = "success")]
    Succeeded,
    /// Generation failed; no output
    #[serde(alias = "failed", alias = "error")]
    Failed,
}

impl JobStatus {
    /// Returns true once no further transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Short indicator for terminal output.
    pub fn indicator(&self) -> &'static str {
        match self {
            Self::Queued => "…",
            Self::Processing => "◐",
            Self::Succeeded => "✓",
            Self::Failed => "✗",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Processing => write!(f, "processing"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One generation request tracked from submission to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItem {
    /// Server-assigned id, unique within a visible list
    pub id: JobId,

    /// Batch this item belongs to (several outputs from one submission)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    /// Lifecycle status
    pub status: JobStatus,

    /// Output location; only meaningful once `status` is `Succeeded`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,

    /// Creation time reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Whether the user saved this item to their album
    #[serde(default)]
    pub collected: bool,

    /// Prompt the item was generated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl JobItem {
    /// Create an item with the given id and status and no optional fields.
    pub fn new(id: impl Into<JobId>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            group_id: None,
            status,
            result_url: None,
            created_at: None,
            collected: false,
            prompt: None,
        }
    }

    /// Set the result url.
    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }

    /// Set the collected flag.
    pub fn with_collected(mut self, collected: bool) -> Self {
        self.collected = collected;
        self
    }

    /// Set the creation time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Returns true once the item reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Drop a result url reported for an item that has not succeeded.
    pub fn normalized(mut self) -> Self {
        if self.status != JobStatus::Succeeded {
            self.result_url = None;
        }
        self
    }

    /// Format for display in one line.
    pub fn format_compact(&self) -> String {
        let collected = if self.collected { " ★" } else { "" };
        match &self.result_url {
            Some(url) => format!("{} {:>8} {}{}", self.status.indicator(), self.id, url, collected),
            None => format!("{} {:>8} {}{}", self.status.indicator(), self.id, self.status, collected),
        }
    }
}

/// One page of the generation list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPage {
    /// Items on this page, newest first
    #[serde(default)]
    pub list: Vec<JobItem>,

    /// Total number of items across all pages
    #[serde(default)]
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_item_wire_format() {
        let json = r#"{
            "id": 101,
            "groupId": "g-7",
            "status": "Succeeded",
            "resultUrl": "https://x/y.jpg",
            "createdAt": "2026-03-01T12:00:00Z",
            "collected": true
        }"#;

        let item: JobItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, JobId::Int(101));
        assert_eq!(item.group_id.as_deref(), Some("g-7"));
        assert_eq!(item.status, JobStatus::Succeeded);
        assert_eq!(item.result_url.as_deref(), Some("https://x/y.jpg"));
        assert!(item.collected);
        assert!(item.created_at.is_some());
    }

    #[test]
    fn test_job_item_minimal_record() {
        let item: JobItem = serde_json::from_str(r#"{"id":"abc","status":"processing"}"#).unwrap();
        assert_eq!(item.id, JobId::Text("abc".into()));
        assert_eq!(item.status, JobStatus::Processing);
        assert!(!item.collected);
        assert!(item.result_url.is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_normalized_drops_url_before_success() {
        let item = JobItem::new(1, JobStatus::Processing).with_result_url("https://x/partial.jpg");
        assert!(item.normalized().result_url.is_none());

        let done = JobItem::new(1, JobStatus::Succeeded).with_result_url("https://x/y.jpg");
        assert_eq!(done.normalized().result_url.as_deref(), Some("https://x/y.jpg"));
    }

    #[test]
    fn test_job_id_parse_and_join() {
        assert_eq!("42".parse::<JobId>().unwrap(), JobId::Int(42));
        assert_eq!("a-1".parse::<JobId>().unwrap(), JobId::Text("a-1".into()));
        assert!("".parse::<JobId>().is_err());
        assert!("1,2".parse::<JobId>().is_err());

        let ids = vec![JobId::Int(3), JobId::Int(9), JobId::Text("x".into())];
        assert_eq!(join_ids(&ids), "3,9,x");
    }

    #[test]
    fn test_job_page_defaults() {
        let page: JobPage = serde_json::from_str("{}").unwrap();
        assert!(page.list.is_empty());
        assert_eq!(page.total, 0);
    }
}
