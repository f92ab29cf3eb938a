//! Error types for Atelier operations.
//!
//! This module defines [`AtelierError`], the error enum shared by every
//! Atelier crate for configuration, filesystem and parsing failures.
//! Network and backend failures live in `atelier-client`, which wraps this
//! type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`AtelierError`].
pub type Result<T> = std::result::Result<T, AtelierError>;

/// Error type for core Atelier operations.
///
/// Errors carry enough context to be shown to the user as-is; callers at a
/// component boundary turn them into alerts instead of propagating them.
#[derive(Debug, Error)]
pub enum AtelierError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// Missing required configuration field
    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    /// YAML parsing error
    #[error("YAML parse error in {context}: {message}")]
    YamlParse { context: String, message: String },

    /// A job identifier could not be parsed
    #[error("Invalid job id: {value:?}")]
    InvalidJobId { value: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in Atelier)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AtelierError {
    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a ConfigNotFound error with source
    pub fn config_not_found_with_source(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: Some(source),
        }
    }

    /// Create a ConfigValidation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if this error is recoverable (user can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::DirectoryCreation { .. })
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigInvalid { .. }
                | Self::ConfigValidation { .. }
                | Self::ConfigMissingField { .. }
        )
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => {
                Some("Create ~/.atelier/config.yaml or pass --config <path>")
            }
            Self::ConfigInvalid { .. } => Some("Check the YAML syntax of the configuration file"),
            Self::ConfigMissingField { field } if field.starts_with("api") => {
                Some("Set api.base_url to the generation backend address")
            }
            Self::DirectoryCreation { .. } => Some("Check permissions on the log directory"),
            Self::InvalidJobId { .. } => Some("Job ids are the numbers shown by 'atelier list'"),
            _ => None,
        }
    }
}
