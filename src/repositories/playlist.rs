//! SQLite playlist repository
//!
//! Channels are stored one row per entry with their extra tags serialised as
//! a JSON object. A channel replace is a single transaction: the delete and
//! every insert commit together or the transaction is rolled back when it
//! is dropped on error.
//!
//! Every write holds the database's shared writer lock for its whole
//! duration, so transactions never contend for SQLite's write lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::traits::PlaylistRepository;
use crate::database::Database;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{
    Channel, ChannelCreateRequest, ChannelMetadata, ChannelUpdateRequest, ExtraTags, Playlist,
    PlaylistCreateRequest,
};

const CHANNEL_COLUMNS: &str = "name, url, group_title, logo_url, tvg_id, position, extra_tags";
const PLAYLIST_COLUMNS: &str = "id, name, url, is_custom, epg_url, last_sync, created_at";

pub struct SqlitePlaylistRepository {
    pool: Pool<Sqlite>,
    write_lock: Arc<Mutex<()>>,
}

impl SqlitePlaylistRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool(),
            write_lock: database.write_lock(),
        }
    }

    fn parse_timestamp(value: &str) -> RepositoryResult<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
    }

    fn row_to_playlist(row: &SqliteRow) -> RepositoryResult<Playlist> {
        let id: String = row.try_get("id")?;
        let last_sync: Option<String> = row.try_get("last_sync")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Playlist {
            id: Uuid::parse_str(&id)?,
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            is_custom: row.try_get("is_custom")?,
            epg_url: row.try_get("epg_url")?,
            last_sync: last_sync
                .as_deref()
                .map(Self::parse_timestamp)
                .transpose()?,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    fn parse_extra_tags(row: &SqliteRow) -> RepositoryResult<ExtraTags> {
        let raw: String = row.try_get("extra_tags")?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn row_to_channel(row: &SqliteRow) -> RepositoryResult<Channel> {
        let position: i64 = row.try_get("position")?;
        let position = u32::try_from(position).map_err(|_| RepositoryError::InvalidData {
            field: "channels.position".to_string(),
            message: format!("{position} is not a valid position"),
        })?;

        Ok(Channel {
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            group: row.try_get("group_title")?,
            logo: row.try_get("logo_url")?,
            tvg_id: row.try_get("tvg_id")?,
            position,
            extra_tags: Self::parse_extra_tags(row)?,
        })
    }

    fn channel_not_found(playlist_id: Uuid, position: u32) -> RepositoryError {
        RepositoryError::record_not_found(
            "channels",
            "playlist_id/position",
            format!("{playlist_id}/{position}"),
        )
    }

    async fn ensure_playlist(conn: &mut SqliteConnection, playlist_key: &str) -> RepositoryResult<()> {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playlists WHERE id = ?")
            .bind(playlist_key)
            .fetch_one(&mut *conn)
            .await?;
        if exists == 0 {
            return Err(RepositoryError::record_not_found(
                "playlists",
                "id",
                playlist_key,
            ));
        }
        Ok(())
    }

    async fn insert_channel(
        conn: &mut SqliteConnection,
        playlist_key: &str,
        channel: &Channel,
        created_at: &str,
    ) -> RepositoryResult<()> {
        let extra_tags = serde_json::to_string(&channel.extra_tags)?;
        sqlx::query(&format!(
            "INSERT INTO channels (playlist_id, {CHANNEL_COLUMNS}, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(playlist_key)
        .bind(&channel.name)
        .bind(&channel.url)
        .bind(&channel.group)
        .bind(&channel.logo)
        .bind(&channel.tvg_id)
        .bind(i64::from(channel.position))
        .bind(extra_tags)
        .bind(created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn create_playlist(&self, request: PlaylistCreateRequest) -> RepositoryResult<Playlist> {
        let playlist = Playlist {
            id: Uuid::new_v4(),
            name: request.name,
            url: request.url,
            is_custom: request.is_custom,
            epg_url: request.epg_url,
            last_sync: None,
            created_at: Utc::now(),
        };

        let _guard = self.write_lock.lock().await;
        sqlx::query(&format!(
            "INSERT INTO playlists ({PLAYLIST_COLUMNS}) VALUES (?, ?, ?, ?, ?, NULL, ?)"
        ))
        .bind(playlist.id.to_string())
        .bind(&playlist.name)
        .bind(&playlist.url)
        .bind(playlist.is_custom)
        .bind(&playlist.epg_url)
        .bind(playlist.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!("Created playlist '{}' ({})", playlist.name, playlist.id);
        Ok(playlist)
    }

    async fn find_playlist(&self, playlist_id: Uuid) -> RepositoryResult<Option<Playlist>> {
        let row = sqlx::query(&format!(
            "SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = ?"
        ))
        .bind(playlist_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_playlist).transpose()
    }

    async fn list_playlists(&self) -> RepositoryResult<Vec<Playlist>> {
        let rows = sqlx::query(&format!(
            "SELECT {PLAYLIST_COLUMNS} FROM playlists ORDER BY created_at, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_playlist).collect()
    }

    async fn delete_playlist(&self, playlist_id: Uuid) -> RepositoryResult<()> {
        let playlist_key = playlist_id.to_string();
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let channels = sqlx::query("DELETE FROM channels WHERE playlist_id = ?")
            .bind(&playlist_key)
            .execute(&mut *tx)
            .await?;
        let playlists = sqlx::query("DELETE FROM playlists WHERE id = ?")
            .bind(&playlist_key)
            .execute(&mut *tx)
            .await?;
        if playlists.rows_affected() == 0 {
            return Err(RepositoryError::record_not_found(
                "playlists",
                "id",
                playlist_key,
            ));
        }

        tx.commit().await?;
        info!(
            "Deleted playlist {} and {} channels",
            playlist_id,
            channels.rows_affected()
        );
        Ok(())
    }

    async fn list_channels(&self, playlist_id: Uuid) -> RepositoryResult<Vec<Channel>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE playlist_id = ? ORDER BY position, id"
        ))
        .bind(playlist_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_channel).collect()
    }

    async fn load_prior_metadata(
        &self,
        playlist_id: Uuid,
    ) -> RepositoryResult<HashMap<String, ChannelMetadata>> {
        let rows = sqlx::query(
            "SELECT url, tvg_id, extra_tags FROM channels
             WHERE playlist_id = ? ORDER BY position, id",
        )
        .bind(playlist_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut prior = HashMap::with_capacity(rows.len());
        for row in &rows {
            let url: String = row.try_get("url")?;
            let metadata = ChannelMetadata {
                tvg_id: row.try_get("tvg_id")?,
                extra_tags: Self::parse_extra_tags(row)?,
            };
            prior.insert(url, metadata);
        }

        debug!(
            "Loaded prior metadata for {} channel URLs of playlist {}",
            prior.len(),
            playlist_id
        );
        Ok(prior)
    }

    async fn replace_channels(
        &self,
        playlist_id: Uuid,
        channels: &[Channel],
    ) -> RepositoryResult<usize> {
        let playlist_key = playlist_id.to_string();
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        Self::ensure_playlist(&mut tx, &playlist_key).await?;

        let deleted = sqlx::query("DELETE FROM channels WHERE playlist_id = ?")
            .bind(&playlist_key)
            .execute(&mut *tx)
            .await?;
        debug!(
            "Deleted {} existing channels for playlist {}",
            deleted.rows_affected(),
            playlist_id
        );

        let now = Utc::now().to_rfc3339();
        for channel in channels {
            Self::insert_channel(&mut tx, &playlist_key, channel, &now)
                .await
                .map_err(|e| {
                    error!(
                        "Failed to insert channel '{}' for playlist {}: {}",
                        channel.name, playlist_id, e
                    );
                    RepositoryError::replace_failed(playlist_id, e.to_string())
                })?;
        }

        tx.commit().await?;

        info!(
            "Replaced channels for playlist {}: {} stored",
            playlist_id,
            channels.len()
        );
        Ok(channels.len())
    }

    async fn mark_synced(
        &self,
        playlist_id: Uuid,
        epg_url: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            "UPDATE playlists SET last_sync = ?, epg_url = COALESCE(?, epg_url) WHERE id = ?",
        )
        .bind(synced_at.to_rfc3339())
        .bind(epg_url)
        .bind(playlist_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::record_not_found(
                "playlists",
                "id",
                playlist_id.to_string(),
            ));
        }
        Ok(())
    }

    async fn add_channel(
        &self,
        playlist_id: Uuid,
        request: ChannelCreateRequest,
    ) -> RepositoryResult<Channel> {
        let playlist_key = playlist_id.to_string();
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        Self::ensure_playlist(&mut tx, &playlist_key).await?;
        let last: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), 0) FROM channels WHERE playlist_id = ?",
        )
        .bind(&playlist_key)
        .fetch_one(&mut *tx)
        .await?;
        let position = u32::try_from(last + 1).map_err(|_| RepositoryError::InvalidData {
            field: "channels.position".to_string(),
            message: format!("{last} is not a valid position"),
        })?;

        let channel = request.into_channel(position);
        Self::insert_channel(&mut tx, &playlist_key, &channel, &Utc::now().to_rfc3339()).await?;
        tx.commit().await?;

        info!(
            "Added channel '{}' to playlist {} at position {}",
            channel.name, playlist_id, position
        );
        Ok(channel)
    }

    async fn update_channel(
        &self,
        playlist_id: Uuid,
        position: u32,
        update: ChannelUpdateRequest,
    ) -> RepositoryResult<Channel> {
        let playlist_key = playlist_id.to_string();
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE playlist_id = ? AND position = ?"
        ))
        .bind(&playlist_key)
        .bind(i64::from(position))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Self::channel_not_found(playlist_id, position))?;

        let mut channel = Self::row_to_channel(&row)?;
        update.apply_to(&mut channel);

        sqlx::query(
            "UPDATE channels
             SET name = ?, group_title = ?, logo_url = ?, tvg_id = ?, extra_tags = ?
             WHERE playlist_id = ? AND position = ?",
        )
        .bind(&channel.name)
        .bind(&channel.group)
        .bind(&channel.logo)
        .bind(&channel.tvg_id)
        .bind(serde_json::to_string(&channel.extra_tags)?)
        .bind(&playlist_key)
        .bind(i64::from(position))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!("Updated channel {} of playlist {}", position, playlist_id);
        Ok(channel)
    }

    async fn delete_channel(&self, playlist_id: Uuid, position: u32) -> RepositoryResult<()> {
        let playlist_key = playlist_id.to_string();
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM channels WHERE playlist_id = ? AND position = ?")
            .bind(&playlist_key)
            .bind(i64::from(position))
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(Self::channel_not_found(playlist_id, position));
        }

        sqlx::query(
            "UPDATE channels SET position = position - 1 WHERE playlist_id = ? AND position > ?",
        )
        .bind(&playlist_key)
        .bind(i64::from(position))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!("Deleted channel {} of playlist {}", position, playlist_id);
        Ok(())
    }
}
