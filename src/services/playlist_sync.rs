//! Playlist synchronisation
//!
//! A sync either replaces the playlist's whole channel set with the
//! reconciled result or leaves the stored set untouched. Fetch failures stop
//! the attempt before anything is read from or written to storage.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::ingestor::reconcile_channels;
use crate::models::{Playlist, SyncOutcome};
use crate::repositories::PlaylistRepository;
use crate::sources::{parse_m3u, PlaylistFetcher};
use crate::utils::obfuscate_credentials;

#[derive(Clone)]
pub struct PlaylistSyncService {
    repository: Arc<dyn PlaylistRepository>,
    fetcher: Arc<dyn PlaylistFetcher>,
}

impl PlaylistSyncService {
    pub fn new(repository: Arc<dyn PlaylistRepository>, fetcher: Arc<dyn PlaylistFetcher>) -> Self {
        Self {
            repository,
            fetcher,
        }
    }

    async fn get_playlist(&self, playlist_id: Uuid) -> AppResult<Playlist> {
        self.repository
            .find_playlist(playlist_id)
            .await?
            .ok_or_else(|| AppError::not_found("playlist", playlist_id.to_string()))
    }

    /// Fetch, parse and reconcile the upstream playlist, then atomically
    /// replace the stored channels with the result.
    pub async fn sync_playlist(&self, playlist_id: Uuid) -> AppResult<SyncOutcome> {
        let playlist = self.get_playlist(playlist_id).await?;
        let source_url = playlist
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::validation("Playlist has no URL"))?;

        info!(
            "Starting sync for playlist '{}' ({}) from {}",
            playlist.name,
            playlist.id,
            obfuscate_credentials(source_url)
        );

        let content = self.fetcher.fetch_text(source_url).await.map_err(|e| {
            error!("Failed to fetch playlist '{}': {}", playlist.name, e);
            AppError::from(e)
        })?;

        let parsed = parse_m3u(&content);
        let prior = self.repository.load_prior_metadata(playlist.id).await?;
        let preserved_metadata_count = parsed
            .channels
            .iter()
            .filter(|channel| prior.contains_key(&channel.url))
            .count();
        let merged = reconcile_channels(&parsed.channels, &prior);

        let channel_count = self
            .repository
            .replace_channels(playlist.id, &merged)
            .await
            .map_err(|e| {
                error!(
                    "Channel replace failed for playlist '{}', stored channels left unchanged: {}",
                    playlist.name, e
                );
                AppError::from(e)
            })?;

        let synced_at = Utc::now();
        if let Err(e) = self
            .repository
            .mark_synced(playlist.id, parsed.epg_url.as_deref(), synced_at)
            .await
        {
            // channels are already committed at this point
            warn!(
                "Failed to record sync time for playlist '{}': {}",
                playlist.name, e
            );
        }

        info!(
            "Synced playlist '{}': {} channels ({} with preserved metadata)",
            playlist.name, channel_count, preserved_metadata_count
        );

        Ok(SyncOutcome {
            playlist_id: playlist.id,
            channel_count,
            preserved_metadata_count,
            epg_url: parsed.epg_url.or(playlist.epg_url),
            synced_at,
        })
    }
}
