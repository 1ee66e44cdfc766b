//! Migration ledger — append-only CSV of per-item transfer outcomes.
//!
//! The ledger is the resume mechanism: any path with at least one `success`
//! row is skipped on later runs. Rows are never rewritten or deduplicated; a
//! path that failed and later succeeded appears twice. All writers serialize
//! full-row appends through one mutex so no row is ever interleaved or
//! truncated, whatever the worker-pool size.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Column header written when the backing file is first created.
pub const LEDGER_HEADER: &str = "timestamp,source_path,dest_path,status,error";

/// Outcome recorded for one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Success,
    Skipped,
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// File-backed append-only migration log.
pub struct Ledger {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the resume set: every source_path with a recorded success.
    ///
    /// Fails soft — a missing, unreadable, or partially corrupt file yields
    /// whatever parses (possibly nothing) and a warning, never an abort.
    /// Malformed rows are skipped individually.
    pub fn load(&self) -> HashSet<String> {
        let mut migrated = HashSet::new();

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return migrated,
            Err(e) => {
                tracing::warn!(
                    "Could not load migration ledger {}: {}",
                    self.path.display(),
                    e
                );
                return migrated;
            }
        };

        for line in contents.lines().skip(1) {
            if line.is_empty() {
                continue;
            }
            let fields = parse_row(line);
            if fields.len() < 4 {
                tracing::warn!("Skipping malformed ledger row: {}", line);
                continue;
            }
            if EntryStatus::parse(&fields[3]) == Some(EntryStatus::Success) {
                migrated.insert(fields[1].clone());
            }
        }

        migrated
    }

    /// Append one entry with the current timestamp, creating the file with
    /// its header on first use.
    ///
    /// The whole row is written in a single `write_all` while holding the
    /// append lock; the unit of atomicity is one full entry.
    pub async fn record(
        &self,
        source_path: &str,
        dest_path: &str,
        status: EntryStatus,
        error: &str,
    ) -> std::io::Result<()> {
        // Error text can carry HTTP body fragments with newlines; the file
        // format is strictly one entry per line, so flatten them.
        let error = error.replace(['\r', '\n'], " ");
        let row = format!(
            "{},{},{},{},{}\n",
            Utc::now().to_rfc3339(),
            escape_field(source_path),
            escape_field(dest_path),
            status.as_str(),
            escape_field(&error),
        );

        let _guard = self.append_lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        if file.metadata().await?.len() == 0 {
            file.write_all(format!("{}\n", LEDGER_HEADER).as_bytes())
                .await?;
        }
        file.write_all(row.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split one CSV row, honouring quoted fields and doubled quotes.
fn parse_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
