//! Migration orchestrator — computes the to-do set, drives the bounded
//! worker pool, folds counters, and appends every outcome to the ledger.
//!
//! Completions are processed in arrival order, not submission order; the one
//! correctness-critical shared resource is the ledger file, whose appends the
//! [`Ledger`] serializes internally. A single item's failure never aborts the
//! run — it becomes a `failed` row, retried by the next invocation.

use std::collections::HashSet;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::cloudinary::MediaApi;
use crate::ledger::{EntryStatus, Ledger};
use crate::listing::ResourceLister;
use crate::transfer::{transfer_resource, TransferStatus, ALREADY_MIGRATED};

/// Knobs the CLI exposes for a run.
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    /// Worker-pool size; 1 is the strict sequential baseline.
    pub workers: usize,
    /// Emit a checkpoint summary every N processed items.
    pub checkpoint_every: usize,
    pub no_progress_bar: bool,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            checkpoint_every: 50,
            no_progress_bar: false,
        }
    }
}

/// Aggregate result of one orchestrator run. The process-exit mapping
/// (0 success / 1 failure) lives in `main`, not here.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub success: bool,
    pub migrated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub total_size_mb: f64,
}

pub struct Migrator {
    source: Arc<dyn MediaApi>,
    dest: Arc<dyn MediaApi>,
    ledger: Arc<Ledger>,
    lister: ResourceLister,
    options: MigrateOptions,
}

impl Migrator {
    pub fn new(
        source: Arc<dyn MediaApi>,
        dest: Arc<dyn MediaApi>,
        ledger: Arc<Ledger>,
        lister: ResourceLister,
        options: MigrateOptions,
    ) -> Self {
        Self {
            source,
            dest,
            ledger,
            lister,
            options,
        }
    }

    /// Run the migration for one path prefix.
    pub async fn run(&self, folder_prefix: &str, shutdown: CancellationToken) -> MigrationReport {
        let already_migrated = self.ledger.load();
        tracing::info!(count = already_migrated.len(), "Loaded resume set from ledger");

        let resources = self.lister.list(folder_prefix).await;
        if resources.is_empty() {
            tracing::warn!(prefix = folder_prefix, "No resources found to migrate");
            return MigrationReport::default();
        }

        let todo: Vec<_> = resources
            .iter()
            .filter(|r| !already_migrated.contains(&r.public_id))
            .cloned()
            .collect();
        let prefiltered = (resources.len() - todo.len()) as u64;

        tracing::info!(
            total = resources.len(),
            already_migrated = prefiltered,
            to_migrate = todo.len(),
            "Migration plan"
        );

        if todo.is_empty() {
            tracing::info!("All resources already migrated");
            return MigrationReport {
                success: true,
                skipped: resources.len() as u64,
                ..Default::default()
            };
        }

        let total = todo.len();
        let pb = transfer_progress(self.options.no_progress_bar, total as u64);
        let started = Instant::now();

        let mut migrated = 0u64;
        let mut skipped = prefiltered;
        let mut failed = 0u64;
        let mut total_size_kb = 0.0f64;
        let mut processed = 0usize;

        // Shared so workers see resume extensions made as completions land;
        // duplicate listing entries later in the to-do list skip cleanly.
        let resume: tokio::sync::RwLock<HashSet<String>> =
            tokio::sync::RwLock::new(already_migrated);
        let resume_ref = &resume;

        let source = self.source.clone();
        let dest = self.dest.clone();

        let outcomes = stream::iter(todo)
            .take_while(|_| std::future::ready(!shutdown.is_cancelled()))
            .map(move |resource| {
                let source = source.clone();
                let dest = dest.clone();
                async move {
                    transfer_resource(source.as_ref(), dest.as_ref(), &resource, resume_ref).await
                }
            })
            .buffer_unordered(self.options.workers.max(1));
        tokio::pin!(outcomes);

        while let Some(outcome) = outcomes.next().await {
            if shutdown.is_cancelled() {
                pb.suspend(|| tracing::info!("Shutdown requested, stopping new transfers"));
                break;
            }
            processed += 1;
            pb.set_message(display_name(&outcome.public_id));

            let record_result = match &outcome.status {
                TransferStatus::Migrated => {
                    migrated += 1;
                    total_size_kb += outcome.size_kb;
                    resume.write().await.insert(outcome.public_id.clone());
                    self.ledger
                        .record(&outcome.public_id, &outcome.public_id, EntryStatus::Success, "")
                        .await
                }
                TransferStatus::AlreadyMigrated => {
                    skipped += 1;
                    self.ledger
                        .record(
                            &outcome.public_id,
                            &outcome.public_id,
                            EntryStatus::Skipped,
                            ALREADY_MIGRATED,
                        )
                        .await
                }
                TransferStatus::Failed(error) => {
                    failed += 1;
                    pb.suspend(|| {
                        tracing::error!(
                            "[{}/{}] FAIL {}: {}",
                            processed,
                            total,
                            display_name(&outcome.public_id),
                            truncate(error, 80),
                        );
                    });
                    self.ledger
                        .record(&outcome.public_id, &outcome.public_id, EntryStatus::Failed, error)
                        .await
                }
            };
            if let Err(e) = record_result {
                pb.suspend(|| tracing::warn!("Could not append to ledger: {}", e));
            }

            if processed % self.options.checkpoint_every == 0 {
                let in_run_skipped = skipped - prefiltered;
                pb.suspend(|| {
                    emit_checkpoint(
                        processed,
                        total,
                        migrated,
                        failed,
                        in_run_skipped,
                        started.elapsed(),
                        total_size_kb / 1024.0,
                    )
                });
            }
            pb.inc(1);
        }

        pb.finish_and_clear();

        let total_size_mb = total_size_kb / 1024.0;
        let elapsed = started.elapsed();
        tracing::info!("── Migration Summary ──");
        tracing::info!(
            "  processed: {} | migrated: {} | skipped: {} | failed: {}",
            processed,
            migrated,
            skipped,
            failed,
        );
        tracing::info!(
            "  elapsed: {:.1}m | data: {:.1} MB | avg: {:.1} items/min",
            elapsed.as_secs_f64() / 60.0,
            total_size_mb,
            rate_per_min(migrated as usize, elapsed.as_secs_f64()),
        );
        if failed > 0 {
            tracing::warn!("{} transfers failed and will be retried on the next run", failed);
        }
        tracing::info!("  ledger: {}", self.ledger.path().display());

        MigrationReport {
            success: true,
            migrated,
            skipped,
            failed,
            total_size_mb,
        }
    }
}

/// Periodic progress snapshot for long batches.
fn emit_checkpoint(
    processed: usize,
    total: usize,
    migrated: u64,
    failed: u64,
    skipped: u64,
    elapsed: std::time::Duration,
    total_size_mb: f64,
) {
    let secs = elapsed.as_secs_f64();
    let rate = rate_per_min(processed, secs);
    let eta_min = if rate > 0.0 {
        (total - processed) as f64 / rate
    } else {
        0.0
    };
    tracing::info!(
        "CHECKPOINT {}/{} ({:.1}%)",
        processed,
        total,
        processed as f64 / total as f64 * 100.0,
    );
    tracing::info!(
        "  ok: {} | failed: {} | skipped: {} | elapsed: {:.1}m | rate: {:.1}/min | eta: {:.1}m | data: {:.1} MB",
        migrated,
        failed,
        skipped,
        secs / 60.0,
        rate,
        eta_min,
        total_size_mb,
    );
    let attempted = processed as u64 - skipped;
    if attempted > 0 {
        tracing::info!(
            "  success rate: {:.1}%",
            migrated as f64 / attempted as f64 * 100.0
        );
    }
}

fn rate_per_min(count: usize, elapsed_secs: f64) -> f64 {
    if elapsed_secs > 0.0 {
        count as f64 / elapsed_secs * 60.0
    } else {
        0.0
    }
}

/// Last three path segments of a public_id, for readable console lines.
fn display_name(public_id: &str) -> String {
    let parts: Vec<&str> = public_id.split('/').collect();
    if parts.len() >= 3 {
        parts[parts.len() - 3..].join("/")
    } else {
        public_id.to_string()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Hidden when requested or when stdout is not a TTY, so piped output and
/// cron logs stay clean.
fn transfer_progress(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} transferring {pos}/{len} [{bar:30.green/white.dim}] {percent}% eta {eta} {msg}",
        )
        .expect("valid template")
        .progress_chars("#>-"),
    );
    pb
}
