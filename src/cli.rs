use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "photoframe-rs",
    about = "Sync an iCloud shared album and serve a rotating photo-frame image"
)]
pub struct Cli {
    /// Shared-album token, or the full shared-album link containing it
    #[arg(short = 't', long, env = "PHOTOFRAME_TOKEN")]
    pub token: String,

    /// Display name for the album
    #[arg(long, default_value = "My Photo Album")]
    pub album_name: String,

    /// Root directory for per-album caches
    #[arg(long, default_value = "~/.photoframe-rs")]
    pub cache_directory: String,

    /// Seconds each image stays selected before rotating
    #[arg(long, default_value_t = 300)]
    pub rotation_interval: u64,

    /// Seconds after which the cache counts as stale
    #[arg(long, default_value_t = 3600)]
    pub staleness_ttl: u64,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub request_timeout: u64,

    /// Concurrent asset downloads per sync cycle
    #[arg(long, default_value_t = 4)]
    pub concurrent_downloads: usize,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one sync cycle, or keep re-syncing with --watch-with-interval
    Sync {
        /// Run continuously, syncing every N seconds until interrupted
        #[arg(long)]
        watch_with_interval: Option<u64>,
    },
    /// Write the currently selected image to a file, or stdout with `-`
    Show {
        /// Output path; `-` streams raw bytes to stdout
        #[arg(short, long, default_value = "-")]
        output: String,

        /// Advance the rotation before selecting
        #[arg(long)]
        skip: bool,
    },
    /// Print cache statistics for the album
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
