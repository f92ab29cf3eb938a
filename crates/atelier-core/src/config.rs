//! Atelier configuration.
//!
//! Loaded from `~/.atelier/config.yaml` (or an explicit path). Every field has
//! a default so a partial file is valid:
//!
//! ```yaml
//! api:
//!   base_url: https://api.example.com
//!   timeout_secs: 30
//!   auth_token_env: ATELIER_API_TOKEN
//! polling:
//!   interval_ms: 3000
//!   max_backoff_ms: 30000
//!   backoff_multiplier: 2.0
//!   recent_page_size: 10
//!   page_size: 20
//! actions:
//!   max_retries: 2
//! alerts:
//!   ttl_secs: 8
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AtelierError, Result};
use crate::logging::atelier_home;
use crate::recovery::RetryConfig;

/// Default status poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

/// Smallest accepted poll interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 250;

/// Config file path (`~/.atelier/config.yaml`).
pub fn default_config_path() -> Result<PathBuf> {
    Ok(atelier_home()?.join("config.yaml"))
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtelierConfig {
    /// Backend connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Status polling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Collect/delete/submit calls
    #[serde(default)]
    pub actions: ActionConfig,

    /// User-visible alerts
    #[serde(default)]
    pub alerts: AlertConfig,
}

impl AtelierConfig {
    /// Load configuration from the default path.
    ///
    /// A missing file yields the defaults; an unreadable or invalid file is an
    /// error.
    pub fn load() -> Result<Self> {
        let path = default_config_path()?;
        if !path.exists() {
            debug!(path = %path.display(), "config file does not exist, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load and validate configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AtelierError::config_not_found_with_source(path, e)
            } else {
                AtelierError::io("reading config", path, e)
            }
        })?;

        let config = Self::parse(&content).map_err(|e| match e {
            AtelierError::YamlParse { message, .. } => AtelierError::ConfigInvalid {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<AtelierConfig>(content).map_err(|e| AtelierError::YamlParse {
            context: "config".into(),
            message: e.to_string(),
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(AtelierError::ConfigMissingField {
                field: "api.base_url".into(),
            });
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(AtelierError::config_validation(format!(
                "api.base_url must start with http:// or https://, got {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(AtelierError::config_validation("api.timeout_secs must be > 0"));
        }

        if self.polling.interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(AtelierError::config_validation(format!(
                "polling.interval_ms must be >= {}, got {}",
                MIN_POLL_INTERVAL_MS, self.polling.interval_ms
            )));
        }

        if self.polling.backoff_multiplier < 1.0 {
            return Err(AtelierError::config_validation(format!(
                "polling.backoff_multiplier must be >= 1.0, got {}",
                self.polling.backoff_multiplier
            )));
        }

        if self.polling.page_size == 0 || self.polling.recent_page_size == 0 {
            return Err(AtelierError::config_validation(
                "polling.page_size and polling.recent_page_size must be > 0",
            ));
        }

        Ok(())
    }
}

/// Backend connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the generation backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Environment variable holding the bearer token
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            auth_token_env: default_auth_token_env(),
        }
    }
}

impl ApiConfig {
    /// Create an API config pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_auth_token_env() -> String {
    "ATELIER_API_TOKEN".to_string()
}

/// Status polling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between status checks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound of the wait after repeated failed checks
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Growth factor of the wait per consecutive failure
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Page size of the "recent" fetch after a submission
    #[serde(default = "default_recent_page_size")]
    pub recent_page_size: u32,

    /// Page size of full list loads
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            recent_page_size: default_recent_page_size(),
            page_size: default_page_size(),
        }
    }
}

impl PollingConfig {
    /// Poll interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Backoff schedule applied after failed status checks.
    pub fn backoff(&self) -> RetryConfig {
        RetryConfig::for_polling(
            self.interval(),
            Duration::from_millis(self.max_backoff_ms),
            self.backoff_multiplier,
        )
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_recent_page_size() -> u32 {
    10
}

fn default_page_size() -> u32 {
    20
}

/// Configuration of user-triggered backend calls.
///
/// Applies to collect and delete. Submissions are never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Retries on transport failures (application errors are never retried)
    #[serde(default = "default_action_retries")]
    pub max_retries: u32,

    /// Initial delay between retries
    #[serde(default = "default_action_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_action_retries(),
            retry_delay_ms: default_action_retry_delay_ms(),
        }
    }
}

impl ActionConfig {
    /// Retry policy for action calls.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.retry_delay_ms),
            ..RetryConfig::for_network()
        }
    }
}

fn default_action_retries() -> u32 {
    2
}

fn default_action_retry_delay_ms() -> u64 {
    500
}

/// Alert configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// How long an alert stays visible before it expires
    #[serde(default = "default_alert_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of alerts kept
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_alert_ttl_secs(),
            max_alerts: default_max_alerts(),
        }
    }
}

fn default_alert_ttl_secs() -> u64 {
    8
}

fn default_max_alerts() -> usize {
    50
}
