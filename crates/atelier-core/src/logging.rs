//! Logging infrastructure for Atelier.
//!
//! Structured logging uses the `tracing` ecosystem: JSON lines go to a daily
//! rolling file under `~/.atelier/logs/`, a compact human-readable stream goes
//! to stderr.
//!
//! ## Example
//!
//! ```no_run
//! use atelier_core::logging;
//!
//! // Initialize logging (call once at startup)
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("atelier started");
//! tracing::debug!(job_id = 101, "job submitted");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{AtelierError, Result};

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Keep this guard alive for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the Atelier logging system.
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.atelier/logs/`
/// * `verbose` - If true, sets log level to DEBUG. Otherwise uses INFO.
///
/// The `RUST_LOG` environment variable overrides the computed filter.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| AtelierError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "atelier.log");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "atelier={default_level},atelier_core={default_level},atelier_client={default_level},atelier_jobs={default_level}"
        ))
    });

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| AtelierError::internal(format!("logging already initialized: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for testing.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Root of per-user Atelier state: `~/.atelier/`.
pub fn atelier_home() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .ok_or_else(|| AtelierError::internal("HOME environment variable not set"))?;

    Ok(home.join(".atelier"))
}

/// Get the default log directory path (`~/.atelier/logs/`).
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(atelier_home()?.join("logs"))
}

/// Log a job lifecycle event under the `atelier::job` target.
///
/// # Example
///
/// ```ignore
/// log_job_event!(&job_id, "submitted");
/// log_job_event!(&job_id, "resolved", status = %item.status);
/// ```
#[macro_export]
macro_rules! log_job_event {
    ($job_id:expr, $event:expr) => {
        tracing::info!(
            target: "atelier::job",
            job_id = %$job_id,
            event = $event,
            "job event"
        )
    };
    ($job_id:expr, $event:expr, $($field:tt)*) => {
        tracing::info!(
            target: "atelier::job",
            job_id = %$job_id,
            event = $event,
            $($field)*,
            "job event"
        )
    };
}
