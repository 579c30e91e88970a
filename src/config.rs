use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Application-level constants
pub const APP_NAME: &str = "SympTrack";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_LOG_FILTER: &str = "info,symptrack=debug";
pub const DEFAULT_PASSWORD_MIN_LEN: usize = 8;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 120;

/// Get the application data directory
/// ~/SympTrack/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// SQLite database file inside a data directory.
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("symptrack.db")
}

/// Object storage root inside a data directory.
pub fn storage_dir(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("storage")
}

/// Command line, each flag also readable from a `SYMPTRACK_*` variable.
#[derive(Debug, Parser)]
#[command(name = "symptrack", version, about = "SympTrack patient symptom tracker server")]
pub struct CliArgs {
    /// Address to listen on
    #[arg(long, env = "SYMPTRACK_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Data directory (database and uploaded objects)
    #[arg(long, env = "SYMPTRACK_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log filter; RUST_LOG takes precedence when set
    #[arg(long, env = "SYMPTRACK_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Minimum accepted password length at sign-up
    #[arg(long, env = "SYMPTRACK_PASSWORD_MIN_LEN", default_value_t = DEFAULT_PASSWORD_MIN_LEN)]
    pub password_min_len: usize,

    /// Requests per minute allowed per client
    #[arg(long, env = "SYMPTRACK_RATE_LIMIT", default_value_t = DEFAULT_RATE_LIMIT_PER_MINUTE)]
    pub rate_limit_per_minute: u32,

    /// Allowed CORS origin; repeat or comma-separate. `*` allows any
    #[arg(long = "cors-origin", env = "SYMPTRACK_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub log_filter: String,
    pub password_min_len: usize,
    pub pbkdf2_iterations: u32,
    pub rate_limit_per_minute: u32,
    pub event_capacity: usize,
    /// Empty means same-origin only.
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data_dir: app_data_dir(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            password_min_len: DEFAULT_PASSWORD_MIN_LEN,
            pbkdf2_iterations: crate::crypto::PBKDF2_ITERATIONS,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            event_capacity: crate::events::DEFAULT_CAPACITY,
            cors_origins: Vec::new(),
        }
    }
}

impl From<CliArgs> for AppConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            bind: args.bind,
            data_dir: args.data_dir.unwrap_or_else(app_data_dir),
            log_filter: args.log_filter,
            password_min_len: args.password_min_len,
            rate_limit_per_minute: args.rate_limit_per_minute,
            cors_origins: args.cors_origins,
            ..Self::default()
        }
    }
}
