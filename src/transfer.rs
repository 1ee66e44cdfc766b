//! Per-item transfer worker: source download, destination upload.

use std::collections::HashSet;

use tokio::sync::RwLock;

use crate::cloudinary::{MediaApi, Resource};

/// Sentinel error text recorded for resume-set skips.
pub const ALREADY_MIGRATED: &str = "already_migrated";

#[derive(Debug, Clone, PartialEq)]
pub enum TransferStatus {
    /// Bytes fetched from the source and uploaded to the destination.
    Migrated,
    /// Resume fast path — the public_id was already logged as migrated.
    AlreadyMigrated,
    /// Download or upload failed; the error text goes into the ledger.
    Failed(String),
}

/// What one worker reports back to the orchestrator. Failures are data, not
/// `Err` — the run records them and continues.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub public_id: String,
    /// Measured post-download size; 0 for skips and failures.
    pub size_kb: f64,
    pub status: TransferStatus,
}

/// Migrate a single resource from source to destination.
///
/// The resume check must not touch the network: a public_id already in the
/// shared resume set short-circuits immediately. Otherwise the bytes are
/// fetched from the source delivery URL (client-level timeout applies),
/// the destination folder is created best-effort, and the upload goes out
/// under the same public_id with overwrite disabled. Nothing is persisted
/// here — ledger writes are the orchestrator's job.
pub async fn transfer_resource(
    source: &dyn MediaApi,
    dest: &dyn MediaApi,
    resource: &Resource,
    already_migrated: &RwLock<HashSet<String>>,
) -> TransferOutcome {
    let public_id = resource.public_id.clone();

    if already_migrated.read().await.contains(&public_id) {
        return TransferOutcome {
            public_id,
            size_kb: 0.0,
            status: TransferStatus::AlreadyMigrated,
        };
    }

    let data = match source.fetch_bytes(&resource.secure_url).await {
        Ok(data) => data,
        Err(e) => {
            return TransferOutcome {
                public_id,
                size_kb: 0.0,
                status: TransferStatus::Failed(e.to_string()),
            };
        }
    };
    let size_kb = data.len() as f64 / 1024.0;

    // Best-effort: the folder usually exists already and the call is
    // idempotent on the provider side.
    if !resource.folder.is_empty() {
        if let Err(e) = dest.create_folder(&resource.folder).await {
            tracing::debug!(folder = %resource.folder, "create_folder: {}", e);
        }
    }

    match dest.upload(&public_id, data).await {
        Ok(receipt) => {
            if receipt.existing {
                // Destination already held this public_id with overwrite off;
                // the bytes are in place, which is all the migration needs.
                tracing::debug!(public_id = %receipt.public_id, "Destination already had asset");
            }
            TransferOutcome {
                public_id,
                size_kb,
                status: TransferStatus::Migrated,
            }
        }
        Err(e) => TransferOutcome {
            public_id,
            size_kb: 0.0,
            status: TransferStatus::Failed(e.to_string()),
        },
    }
}
