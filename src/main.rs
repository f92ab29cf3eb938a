//! Atelier - command-line client for the generation backend
//!
//! Submits generation requests and follows them until they finish.
//!
//! ## Usage
//!
//! ```bash
//! # Show the newest generations
//! atelier list
//!
//! # Submit and wait for the results
//! atelier submit --prompt "linen blazer, studio light" --count 2 --wait
//!
//! # Follow everything still in progress
//! atelier watch
//!
//! # Save to / remove from the album, delete
//! atelier collect 101
//! atelier collect 101 --remove
//! atelier delete 101
//!
//! # With verbose logging and a custom config
//! atelier -v --config ./atelier.yaml list
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use atelier_client::{GenerateRequest, HttpJobApi};
use atelier_core::{AtelierConfig, AtelierError, JobId, JobItem, JobStatus, LogGuard, init_logging};
use atelier_jobs::{ActionOutcome, JobTracker, LoadOutcome, SubmitOutcome, TokioScheduler};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info};

/// Atelier generation client
///
/// Submits image generation requests and tracks them until every job has
/// succeeded or failed.
#[derive(Parser, Debug)]
#[command(name = "atelier")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.atelier/logs/)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Config file (defaults to ~/.atelier/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List generations, newest first
    List {
        /// Page to show
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Print one JSON record per line
        #[arg(long)]
        json: bool,
    },

    /// Follow generations in progress until they finish
    Watch,

    /// Submit a generation request
    Submit {
        /// Text prompt
        #[arg(long)]
        prompt: String,

        /// Number of outputs
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Source image to edit
        #[arg(long)]
        image_url: Option<String>,

        /// Style preset
        #[arg(long)]
        style: Option<String>,

        /// Wait until the new jobs finish
        #[arg(long)]
        wait: bool,
    },

    /// Add a generation to the album
    Collect {
        /// Generation id
        id: JobId,

        /// Remove from the album instead
        #[arg(long)]
        remove: bool,
    },

    /// Delete a generation
    Delete {
        /// Generation id
        id: JobId,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("atelier error: {:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(guidance) = e.downcast_ref::<AtelierError>().and_then(AtelierError::guidance) {
                eprintln!("{}", guidance);
            }
            ExitCode::from(1)
        }
    }
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> atelier_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0)
}

fn load_config(cli: &Cli) -> atelier_core::Result<AtelierConfig> {
    match &cli.config {
        Some(path) => AtelierConfig::load_from(path),
        None => AtelierConfig::load(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(&cli)?;
    let api = HttpJobApi::from_config(&config.api).context("failed to create API client")?;
    info!(base_url = %api.base_url(), "starting atelier");

    let tracker = JobTracker::new(Arc::new(api), &config, Arc::new(TokioScheduler));

    let code = match cli.command {
        Command::List { page, json } => list(&tracker, page, json).await?,
        Command::Watch => watch(&tracker).await?,
        Command::Submit {
            prompt,
            count,
            image_url,
            style,
            wait,
        } => {
            let mut request = GenerateRequest::new(prompt).with_count(count);
            if let Some(url) = image_url {
                request = request.with_image_url(url);
            }
            if let Some(style) = style {
                request = request.with_style(style);
            }
            submit(&tracker, &request, wait).await?
        }
        Command::Collect { id, remove } => collect(&tracker, &id, !remove).await?,
        Command::Delete { id } => report_action(tracker.delete(&id).await, &id, "deleted"),
    };

    tracker.logout();
    Ok(code)
}

async fn list(tracker: &JobTracker, page: u32, json: bool) -> anyhow::Result<ExitCode> {
    let outcome = if page <= 1 {
        tracker.reload().await
    } else {
        tracker.load_page(page).await
    };
    let LoadOutcome::Loaded { count, total } = outcome else {
        return Ok(report_load(outcome));
    };

    let items = tracker.list().snapshot();
    if json {
        for item in &items {
            println!("{}", serde_json::to_string(item)?);
        }
    } else {
        for item in &items {
            print_item(item);
        }
        println!("{} of {} generations (page {})", count, total, page.max(1));
    }
    Ok(ExitCode::SUCCESS)
}

async fn watch(tracker: &JobTracker) -> anyhow::Result<ExitCode> {
    let outcome = tracker.reload().await;
    if matches!(outcome, LoadOutcome::Failed { .. }) {
        return Ok(report_load(outcome));
    }

    let pending: Vec<JobItem> = tracker
        .list()
        .snapshot()
        .into_iter()
        .filter(|item| !item.is_terminal())
        .collect();
    if pending.is_empty() {
        println!("No generations in progress");
        return Ok(ExitCode::SUCCESS);
    }
    for item in &pending {
        print_item(item);
    }

    follow(tracker).await
}

async fn submit(tracker: &JobTracker, request: &GenerateRequest, wait: bool) -> anyhow::Result<ExitCode> {
    match tracker.submit(request).await {
        SubmitOutcome::Accepted { jobs } => {
            let ids: Vec<String> = jobs.iter().map(ToString::to_string).collect();
            println!("Submitted {} job(s): {}", jobs.len(), ids.join(", "));
            if wait {
                follow(tracker).await
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        SubmitOutcome::Rejected { message } => {
            eprintln!("Generation rejected: {}", message);
            Ok(ExitCode::from(2))
        }
    }
}

async fn collect(tracker: &JobTracker, id: &JobId, value: bool) -> anyhow::Result<ExitCode> {
    let items = tracker
        .api()
        .status(std::slice::from_ref(id))
        .await
        .with_context(|| format!("failed to look up generation {}", id))?;
    if items.is_empty() {
        bail!("generation {} not found", id);
    }
    tracker.list().append_page(items);

    let done = if value { "added to album" } else { "removed from album" };
    Ok(report_action(tracker.set_collected(id, value).await, id, done))
}

/// Print status changes until nothing is pending or the user interrupts.
async fn follow(tracker: &JobTracker) -> anyhow::Result<ExitCode> {
    let mut gate = tracker.gate().subscribe();
    let mut revisions = tracker.list().subscribe();
    let mut last: HashMap<JobId, JobStatus> = statuses(&tracker.list().snapshot());

    while *gate.borrow_and_update() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted while following generations");
                println!("Interrupted");
                return Ok(ExitCode::from(130));
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let items = tracker.list().snapshot();
                for item in &items {
                    if last.get(&item.id) != Some(&item.status) {
                        print_item(item);
                    }
                }
                last = statuses(&items);
            }
            changed = gate.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    let failed = tracker
        .list()
        .snapshot()
        .iter()
        .filter(|item| item.status == JobStatus::Failed)
        .count();
    println!("All generations finished ({} failed)", failed);
    Ok(ExitCode::SUCCESS)
}

fn statuses(items: &[JobItem]) -> HashMap<JobId, JobStatus> {
    items.iter().map(|item| (item.id.clone(), item.status)).collect()
}

fn print_item(item: &JobItem) {
    let created = item
        .created_at
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    println!("{:<16} {}", created, item.format_compact());
}

fn report_load(outcome: LoadOutcome) -> ExitCode {
    match outcome {
        LoadOutcome::Loaded { .. } => ExitCode::SUCCESS,
        LoadOutcome::Failed { message } => {
            eprintln!("Could not load generations: {}", message);
            ExitCode::from(1)
        }
    }
}

fn report_action(outcome: ActionOutcome, id: &JobId, done: &str) -> ExitCode {
    match outcome {
        ActionOutcome::Confirmed => {
            println!("Generation {} {}", id, done);
            ExitCode::SUCCESS
        }
        ActionOutcome::Skipped => {
            println!("Nothing to do for generation {}", id);
            ExitCode::SUCCESS
        }
        ActionOutcome::Busy => {
            eprintln!("Generation {} is still being updated, try again", id);
            ExitCode::from(1)
        }
        ActionOutcome::RolledBack { message } | ActionOutcome::Failed { message } => {
            eprintln!("Generation {}: {}", id, message);
            ExitCode::from(1)
        }
    }
}
