//! cloudmigrate — migrate media assets between two Cloudinary accounts.
//!
//! Lists resources under a folder prefix on the source account, downloads
//! each original and re-uploads it to the destination under the same
//! public_id. An append-only CSV ledger makes repeated runs resumable, and a
//! JSON listing cache preserves partial listings across rate limits.

#![warn(clippy::all)]

mod cli;
mod cloudinary;
mod config;
mod ledger;
mod listing;
mod migrate;
mod shutdown;
mod transfer;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cloudinary::{CloudinaryClient, MediaApi};
use ledger::Ledger;
use listing::ResourceLister;
use migrate::{MigrateOptions, Migrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    // .env is optional; real environments may export the variables directly.
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    let timeout = Duration::from_secs(cli.request_timeout_secs);
    let source: Arc<dyn MediaApi> = Arc::new(CloudinaryClient::new(config.source, timeout)?);
    let dest: Arc<dyn MediaApi> = Arc::new(CloudinaryClient::new(config.dest, timeout)?);

    let ledger = Arc::new(Ledger::new(cli.ledger.clone()));
    let lister = ResourceLister::new(
        source.clone(),
        cli.cache.clone(),
        Duration::from_millis(cli.page_delay_ms),
    );

    let migrator = Migrator::new(
        source,
        dest,
        ledger,
        lister,
        MigrateOptions {
            workers: cli.workers,
            checkpoint_every: cli.checkpoint_every.max(1),
            no_progress_bar: cli.no_progress_bar,
        },
    );

    let folder_prefix = cli.folder_prefix();
    tracing::info!(
        prefix = %folder_prefix,
        workers = cli.workers,
        "Starting cloudmigrate"
    );

    let shutdown = shutdown::shutdown_token();
    let report = migrator.run(&folder_prefix, shutdown).await;

    // Per-item failures do not fail the run; they are logged, recorded in
    // the ledger, and retried by the next invocation.
    if !report.success {
        anyhow::bail!("no resources found under '{}'", folder_prefix);
    }
    Ok(())
}
