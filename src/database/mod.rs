use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{
    defaults::{DEFAULT_BUSY_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS},
    DatabaseConfig,
};
use crate::errors::RepositoryResult;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS playlists (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        url TEXT,
        is_custom BOOLEAN NOT NULL DEFAULT FALSE,
        epg_url TEXT,
        last_sync TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS channels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        playlist_id TEXT NOT NULL,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        group_title TEXT,
        logo_url TEXT,
        tvg_id TEXT,
        position INTEGER NOT NULL,
        extra_tags TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        FOREIGN KEY (playlist_id) REFERENCES playlists (id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_channels_playlist_position ON channels (playlist_id, position)",
    "CREATE INDEX IF NOT EXISTS idx_channels_playlist_url ON channels (playlist_id, url)",
];

/// SQLite pool plus the lock every multi-statement write runs under.
///
/// SQLite admits one writer at a time, and a deferred transaction that reads
/// before it writes fails with `SQLITE_BUSY` instead of waiting when another
/// connection is mid-write. Writers therefore queue on `write_lock` in
/// process, while WAL mode lets readers carry on alongside the writer.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    write_lock: Arc<Mutex<()>>,
}

impl Database {
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    /// Shared writer lock, cloned into every repository built on this database
    pub fn write_lock(&self) -> Arc<Mutex<()>> {
        self.write_lock.clone()
    }

    pub async fn new(config: &DatabaseConfig) -> RepositoryResult<Self> {
        let in_memory = config.url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to an in-memory database is a separate database,
        // so those pools are pinned to a single long-lived connection.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
                .connect_with(options)
                .await?
        };

        debug!("Connected to database: {}", config.url);
        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub async fn migrate(&self) -> RepositoryResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }
}
