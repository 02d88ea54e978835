//! Sync command implementation.

use super::{resolve_group, OutputFormat};
use fsfailover_core::{
    ExtraFilesPolicy, FailoverConfig, InlineBus, MessageBus, QueueBus, Reconciler, SyncEvent,
    SyncObserver, SyncSummary, TracingObserver, TransportKind, Worker, WorkerStats,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of the sync command.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    /// Reconciliation outcome.
    pub summary: SyncSummary,
    /// Worker counters, when messages were queued.
    pub worker: Option<WorkerStats>,
    /// Retry messages still queued when the command finished. The queue
    /// lives in this process, so they are dropped; the next sync schedules
    /// the same repairs again.
    pub discarded: usize,
}

/// Prints reconciliation progress as it happens.
struct ProgressPrinter;

impl SyncObserver for ProgressPrinter {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::ListingStarted { index, .. } => {
                print!("Listing content of storage {index}...");
            }
            SyncEvent::ListingSucceeded { count, .. } => {
                println!(" done ({})", plural(*count, "item", "fetched"));
            }
            SyncEvent::ListingFailed { reason, .. } => {
                println!(" failed ({reason})");
            }
            SyncEvent::SearchStarted { .. } => {
                println!();
                println!("Searching files to replicate...");
                println!();
            }
            SyncEvent::ReplicatePreDispatch(m) => {
                print!(
                    "Dispatching message to replicate file {} from storage {} to {}...",
                    m.path, m.source, m.destination
                );
            }
            SyncEvent::DeletePreDispatch(m) => {
                print!(
                    "Dispatching message to delete file {} from storage {}...",
                    m.path, m.target
                );
            }
            SyncEvent::ReplicateDispatched(_) | SyncEvent::DeleteDispatched(_) => {
                println!(" done");
            }
            SyncEvent::DispatchFailed { reason, .. } => {
                println!(" failed ({reason})");
            }
        }
    }
}

/// Runs the sync command.
pub fn run(
    config_path: &Path,
    group: Option<&str>,
    extra_files: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = OutputFormat::parse(format)?;
    let policy: ExtraFilesPolicy = extra_files.parse()?;
    let config = FailoverConfig::load(config_path)?;
    debug!(config = %config_path.display(), policy = %policy, transport = ?config.transport, "starting sync");

    let report = sync_group(&config, group, policy, format == OutputFormat::Text)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print_text_output(&report),
    }

    Ok(())
}

/// Reconciles one group of `config` and, with the queue transport, handles
/// the messages ready afterwards.
pub fn sync_group(
    config: &FailoverConfig,
    group: Option<&str>,
    policy: ExtraFilesPolicy,
    show_progress: bool,
) -> Result<SyncReport, Box<dyn std::error::Error>> {
    let registry = Arc::new(config.build_registry()?);
    let group = resolve_group(&registry, group)?.name().to_string();

    let queue = match config.transport {
        TransportKind::Queue => Some(Arc::new(QueueBus::new())),
        TransportKind::Sync => None,
    };
    let bus: Arc<dyn MessageBus> = match &queue {
        Some(queue) => Arc::clone(queue) as Arc<dyn MessageBus>,
        None => Arc::new(InlineBus::new(Arc::clone(&registry))),
    };

    let mut reconciler = Reconciler::new(Arc::clone(&registry), bus)
        .with_observer(Arc::new(TracingObserver));
    if show_progress {
        reconciler = reconciler.with_observer(Arc::new(ProgressPrinter));
    }

    let summary = reconciler.sync(&group, policy)?;

    let (worker, discarded) = match queue {
        Some(queue) => {
            let worker = Worker::new(registry, Arc::clone(&queue), config.retry_policy());
            let stats = worker.run_ready();
            let discarded = queue.clear();
            if discarded > 0 {
                warn!(group, discarded, "retry messages dropped on exit, run sync again to reschedule them");
            }
            (Some(stats), discarded)
        }
        None => (None, 0),
    };

    Ok(SyncReport {
        summary,
        worker,
        discarded,
    })
}

fn print_text_output(report: &SyncReport) {
    let summary = &report.summary;
    let show_deleted = summary.policy == ExtraFilesPolicy::Delete;

    println!();
    println!("{}", success_line(summary));

    let rows = table_rows(summary, show_deleted);
    if !rows.is_empty() {
        println!();
        if show_deleted {
            println!("{:>8}  {:>16}  {:>13}", "Storage", "Replicated files", "Deleted files");
        } else {
            println!("{:>8}  {:>16}", "Storage", "Replicated files");
        }
        for row in rows {
            match row.deleted {
                Some(deleted) => println!("{:>8}  {:>16}  {:>13}", row.storage, row.replicated, deleted),
                None => println!("{:>8}  {:>16}", row.storage, row.replicated),
            }
        }
    }

    if !summary.excluded.is_empty() {
        println!();
        println!("Excluded storages (listing failed): {:?}", summary.excluded);
    }
    if summary.failed_dispatches > 0 {
        println!("{} could not be dispatched", plural(summary.failed_dispatches, "message", ""));
    }
    if let Some(stats) = report.worker {
        println!("{}", worker_line(stats, report.discarded));
    }
}

fn worker_line(stats: WorkerStats, discarded: usize) -> String {
    let mut line = format!(
        "Worker handled {} ({} failed).",
        plural(stats.handled, "message", ""),
        stats.failed
    );
    if discarded > 0 {
        line.push_str(&format!(
            " {} discarded, run sync again to redo them.",
            plural(discarded, "retry", "")
        ));
    }
    line
}

#[derive(Debug, PartialEq, Eq)]
struct TableRow {
    storage: usize,
    replicated: usize,
    deleted: Option<usize>,
}

fn table_rows(summary: &SyncSummary, show_deleted: bool) -> Vec<TableRow> {
    summary
        .touched_backends()
        .into_iter()
        .map(|storage| TableRow {
            storage,
            replicated: summary.replicated.get(&storage).copied().unwrap_or(0),
            deleted: show_deleted.then(|| summary.deleted.get(&storage).copied().unwrap_or(0)),
        })
        .filter(|row| row.replicated + row.deleted.unwrap_or(0) > 0)
        .collect()
}

fn success_line(summary: &SyncSummary) -> String {
    let mut line = format!(
        "Storages are synced, {} been replicated",
        files_with_verb(summary.total_replicated())
    );
    if summary.policy == ExtraFilesPolicy::Delete {
        line.push_str(&format!(
            " and {} been deleted",
            files_with_verb(summary.total_deleted())
        ));
    }
    line.push('.');
    line
}

fn files_with_verb(count: usize) -> String {
    match count {
        0 => "no files have".to_string(),
        1 => "1 file has".to_string(),
        n => format!("{n} files have"),
    }
}

fn plural(count: usize, noun: &str, suffix: &str) -> String {
    let s = if count == 1 { "" } else { "s" };
    if suffix.is_empty() {
        format!("{count} {noun}{s}")
    } else {
        format!("{count} {noun}{s} {suffix}")
    }
}
