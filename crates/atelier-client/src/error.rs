//! Error types for the backend client.

use atelier_core::Retryable;
use thiserror::Error;

/// Backend client errors.
///
/// Two families matter to callers: network-level failures (no parsed
/// envelope) and application failures (`code != 0` in a parsed envelope).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered with a non-zero `code`
    #[error("Request rejected (code {code}): {}", .message.as_deref().unwrap_or("no message"))]
    Application { code: i64, message: Option<String> },

    /// Non-success HTTP status without a usable envelope
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Network timeout
    #[error("Network timeout after {0}s: {1}")]
    Timeout(u64, String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Response body could not be decoded
    #[error("Invalid response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl ClientError {
    /// Create an application error from an envelope.
    pub fn application(code: i64, message: Option<String>) -> Self {
        Self::Application { code, message }
    }

    /// Check if this error is a network-related error.
    pub fn is_network_error(&self) -> bool {
        match self {
            ClientError::Timeout(_, _) | ClientError::ConnectionFailed(_) => true,
            ClientError::HttpStatus { .. } => true,
            ClientError::HttpError(e) => !e.is_decode(),
            _ => false,
        }
    }

    /// Check if the backend rejected the request.
    pub fn is_application_error(&self) -> bool {
        matches!(self, ClientError::Application { .. })
    }

    /// Server-provided message, if the backend sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Application { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Get a user-friendly error message.
    pub fn friendly_message(&self) -> String {
        match self {
            ClientError::Application { message: Some(msg), .. } => msg.clone(),
            ClientError::Application { code, message: None } => {
                format!("The request was rejected (code {}).", code)
            }
            ClientError::Timeout(secs, _) => {
                format!("Request timed out after {}s. Check your connection.", secs)
            }
            ClientError::ConnectionFailed(msg) => {
                format!("Connection failed: {}. Check your network.", msg)
            }
            ClientError::HttpStatus { status, .. } if *status >= 500 => {
                format!("The service is temporarily unavailable ({}). Please try again.", status)
            }
            ClientError::HttpError(e) if e.is_timeout() => {
                "Request timed out. Check your connection.".to_string()
            }
            ClientError::HttpError(e) if e.is_connect() => {
                "Could not connect. Check your network.".to_string()
            }
            ClientError::ConfigError(msg) => format!("Configuration error: {}", msg),
            _ => format!("Error: {}", self),
        }
    }

    /// Get suggested action for this error.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            ClientError::Application { .. } => "Review the request and try again.",
            ClientError::Timeout(_, _) => "Check your internet connection and try again.",
            ClientError::ConnectionFailed(_) => "Verify network connectivity and the api.base_url setting.",
            ClientError::HttpStatus { status: 401 | 403, .. } => "Check the API token environment variable.",
            ClientError::HttpStatus { .. } => "Try again in a few seconds.",
            ClientError::ConfigError(_) => "Check your configuration file at ~/.atelier/config.yaml.",
            _ => "Try again or check the logs for details.",
        }
    }

    /// Classify an HTTP status code into appropriate error type.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            408 | 504 => ClientError::Timeout(0, format!("HTTP {}: {}", status, body)),
            _ => ClientError::HttpStatus {
                status,
                body: body.to_string(),
            },
        }
    }
}

impl Retryable for ClientError {
    /// Transient network failures are retryable; rejections and bad requests are not.
    fn is_retryable(&self) -> bool {
        match self {
            ClientError::Timeout(_, _) | ClientError::ConnectionFailed(_) => true,
            ClientError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            ClientError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
