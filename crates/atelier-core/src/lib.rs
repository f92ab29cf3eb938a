//! # atelier-core
//!
//! Core types, errors, and utilities shared by the Atelier crates.
//!
//! This crate provides:
//! - [`AtelierError`] - Error type for configuration, I/O and parsing
//! - [`logging`] - Tracing setup and the `log_job_event!` macro
//! - [`types`] - Job records exchanged with the generation backend
//! - [`config`] - YAML configuration
//! - [`recovery`] - Retry with exponential backoff
//!
//! ## Example
//!
//! ```no_run
//! use atelier_core::{AtelierConfig, logging};
//!
//! fn main() -> atelier_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!     let config = AtelierConfig::load()?;
//!     tracing::info!(base_url = %config.api.base_url, "configuration loaded");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod recovery;
pub mod types;

pub use config::{ActionConfig, AlertConfig, ApiConfig, AtelierConfig, PollingConfig};
pub use error::{AtelierError, Result};
pub use logging::{LogGuard, init_logging};
pub use recovery::{RetryConfig, Retryable};
pub use types::{JobId, JobItem, JobPage, JobStatus};
