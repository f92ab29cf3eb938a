//! [`JobApi`] over HTTP using reqwest.
//!
//! ## Example
//!
//! ```no_run
//! use atelier_client::{HttpJobApi, JobApi};
//! use atelier_core::ApiConfig;
//!
//! # async fn example() -> atelier_client::Result<()> {
//! let api = HttpJobApi::from_config(&ApiConfig::new("https://api.example.com"))?;
//! let page = api.list(1, 20).await?;
//! println!("{} generations", page.total);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use atelier_core::types::join_ids;
use atelier_core::{ApiConfig, JobId, JobItem, JobPage};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::api::{CollectAction, GenerateRequest, JobApi};
use crate::envelope::{Envelope, ItemList};
use crate::error::{ClientError, Result};

const LIST_PATH: &str = "/generate/list";
const STATUS_PATH: &str = "/generate/status";
const SUBMIT_PATH: &str = "/generate";
const COLLECT_PATH: &str = "/collect";
const DELETE_PATH: &str = "/delete";

/// Backend client using direct HTTP requests.
pub struct HttpJobApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout_secs: u64,
}

impl HttpJobApi {
    /// Create a client from config, reading the bearer token from the
    /// configured environment variable when it is set.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let token = std::env::var(&config.auth_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::with_token(config, token)
    }

    /// Create a client with an explicit token (or none).
    pub fn with_token(config: &ApiConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn classify(&self, error: reqwest::Error) -> ClientError {
        if error.is_timeout() {
            ClientError::Timeout(self.timeout_secs, error.to_string())
        } else if error.is_connect() {
            ClientError::ConnectionFailed(error.to_string())
        } else {
            ClientError::HttpError(error)
        }
    }

    /// Send a request and decode the envelope.
    ///
    /// A non-2xx response still counts as an application failure when its
    /// body parses as an envelope; otherwise it is a network-class error.
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<Envelope<T>> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(envelope) if status.is_success() || !envelope.is_ok() => Ok(envelope),
            Ok(_) => Err(ClientError::from_http_status(status.as_u16(), &body)),
            Err(_) if !status.is_success() => {
                warn!(endpoint, status = status.as_u16(), "backend returned an error status");
                Err(ClientError::from_http_status(status.as_u16(), &body))
            }
            Err(e) => Err(ClientError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn list(&self, page: u32, page_size: u32) -> Result<JobPage> {
        debug!(page, page_size, "fetching generation list");
        let builder = self
            .client
            .get(self.url(LIST_PATH))
            .query(&[("page", page), ("pageSize", page_size)]);

        let mut data: JobPage = self.send(LIST_PATH, builder).await?.into_data(LIST_PATH)?;
        data.list = data.list.into_iter().map(JobItem::normalized).collect();
        Ok(data)
    }

    async fn status(&self, ids: &[JobId]) -> Result<Vec<JobItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = join_ids(ids);
        debug!(ids = %joined, "checking job status");

        let builder = self
            .client
            .get(self.url(STATUS_PATH))
            .query(&[("ids", joined.as_str())]);

        let data: ItemList = self.send(STATUS_PATH, builder).await?.into_data(STATUS_PATH)?;
        Ok(data.list.into_iter().map(JobItem::normalized).collect())
    }

    async fn collect(&self, id: &JobId, action: CollectAction) -> Result<()> {
        debug!(job_id = %id, action = action.code(), "updating album");
        let builder = self
            .client
            .post(self.url(COLLECT_PATH))
            .json(&json!({ "id": id, "action": action.code() }));

        self.send::<serde_json::Value>(COLLECT_PATH, builder)
            .await?
            .into_ack()
    }

    async fn delete(&self, id: &JobId) -> Result<()> {
        debug!(job_id = %id, "deleting generation");
        let builder = self
            .client
            .post(self.url(DELETE_PATH))
            .json(&json!({ "id": id }));

        self.send::<serde_json::Value>(DELETE_PATH, builder)
            .await?
            .into_ack()
    }

    async fn submit(&self, request: &GenerateRequest) -> Result<Vec<JobItem>> {
        debug!(count = request.count, "submitting generation request");
        let builder = self.client.post(self.url(SUBMIT_PATH)).json(request);

        let data: ItemList = self.send(SUBMIT_PATH, builder).await?.into_data(SUBMIT_PATH)?;
        Ok(data.list.into_iter().map(JobItem::normalized).collect())
    }

    fn name(&self) -> &str {
        "http"
    }
}
