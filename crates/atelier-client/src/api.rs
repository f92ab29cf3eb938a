//! The backend contract used by the job tracker.
//!
//! [`JobApi`] is the seam between job tracking and the network:
//! - [`crate::HttpJobApi`] talks to the real backend over HTTP
//! - [`crate::MockJobApi`] serves scripted responses in tests

use async_trait::async_trait;
use atelier_core::{JobId, JobItem, JobPage};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Add or remove an item from the user's album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectAction {
    /// Save to album (`action=1`)
    Add,
    /// Remove from album (`action=2`)
    Remove,
}

impl CollectAction {
    /// Action code on the wire.
    pub fn code(&self) -> u8 {
        match self {
            Self::Add => 1,
            Self::Remove => 2,
        }
    }

    /// Action that makes `collected` equal `value`.
    pub fn for_value(value: bool) -> Self {
        if value { Self::Add } else { Self::Remove }
    }
}

/// A generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Text prompt
    pub prompt: String,

    /// Number of outputs to generate
    pub count: u32,

    /// Source image to edit, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Style preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl GenerateRequest {
    /// Create a request for a single output.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            count: 1,
            image_url: None,
            style: None,
        }
    }

    /// Set the number of outputs.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.max(1);
        self
    }

    /// Set the source image.
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Set the style preset.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }
}

/// Backend operations needed to track generation jobs.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Fetch one page of the user's generations, newest first.
    async fn list(&self, page: u32, page_size: u32) -> Result<JobPage>;

    /// Fetch current records for `ids`. Ids unknown to the backend are
    /// simply absent from the result.
    async fn status(&self, ids: &[JobId]) -> Result<Vec<JobItem>>;

    /// Add or remove an item from the album.
    async fn collect(&self, id: &JobId, action: CollectAction) -> Result<()>;

    /// Delete an item.
    async fn delete(&self, id: &JobId) -> Result<()>;

    /// Submit a generation request; returns the created job records.
    async fn submit(&self, request: &GenerateRequest) -> Result<Vec<JobItem>>;

    /// Name of this implementation, for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_action_codes() {
        assert_eq!(CollectAction::Add.code(), 1);
        assert_eq!(CollectAction::Remove.code(), 2);
        assert_eq!(CollectAction::for_value(true), CollectAction::Add);
        assert_eq!(CollectAction::for_value(false), CollectAction::Remove);
    }

    #[test]
    fn test_generate_request_wire_format() {
        let request = GenerateRequest::new("linen blazer, studio light")
            .with_count(4)
            .with_image_url("https://cdn.example.com/in.png");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["count"], 4);
        assert_eq!(json["imageUrl"], "https://cdn.example.com/in.png");
        assert!(json.get("style").is_none());
    }

    #[test]
    fn test_count_is_at_least_one() {
        assert_eq!(GenerateRequest::new("x").with_count(0).count, 1);
    }
}
