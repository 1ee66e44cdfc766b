use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "cloudmigrate",
    about = "Migrate media assets between two Cloudinary accounts"
)]
pub struct Cli {
    /// Sub-path under the base folder to migrate (omit for the whole base
    /// folder). Example: "one-piece/chapter-001"
    pub scope: Option<String>,

    /// Top-level folder both accounts share
    #[arg(long, default_value = "media")]
    pub base_folder: String,

    /// Number of concurrent transfer workers
    #[arg(short = 'w', long, default_value_t = 10)]
    pub workers: usize,

    /// Path to the append-only migration ledger
    #[arg(long, default_value = "migration_log.csv")]
    pub ledger: std::path::PathBuf,

    /// Path to the listing cache
    #[arg(long, default_value = "resource_cache.json")]
    pub cache: std::path::PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Delay between listing pages in milliseconds
    #[arg(long, default_value_t = 500)]
    pub page_delay_ms: u64,

    /// Emit a checkpoint summary every N processed items
    #[arg(long, default_value_t = 50)]
    pub checkpoint_every: usize,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

impl Cli {
    /// Full listing prefix: the base folder, optionally narrowed by scope.
    pub fn folder_prefix(&self) -> String {
        match self.scope.as_deref() {
            Some(scope) if !scope.is_empty() => format!("{}/{}", self.base_folder, scope),
            _ => self.base_folder.clone(),
        }
    }
}
