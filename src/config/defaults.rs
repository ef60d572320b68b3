/// Configuration default values
///
/// Kept in one place so the TOML defaults, the generated default config file
/// and the CLI help agree.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./m3u-sync.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 30;

// Ingestion defaults
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = concat!("m3u-sync/", env!("CARGO_PKG_VERSION"));

// Config file
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
