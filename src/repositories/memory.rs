//! In-memory playlist repository
//!
//! Useful for one-shot CLI runs and tests. A replace builds the new channel
//! list off to the side and swaps it in under the write lock, so readers
//! never observe a half-written playlist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::locks::PlaylistLocks;
use super::traits::PlaylistRepository;
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{
    Channel, ChannelCreateRequest, ChannelMetadata, ChannelUpdateRequest, Playlist,
    PlaylistCreateRequest,
};

#[derive(Debug, Default)]
struct MemoryState {
    playlists: HashMap<Uuid, Playlist>,
    channels: HashMap<Uuid, Vec<Channel>>,
}

#[derive(Debug, Default)]
pub struct InMemoryPlaylistRepository {
    state: RwLock<MemoryState>,
    locks: PlaylistLocks,
}

impl InMemoryPlaylistRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(playlist_id: Uuid) -> RepositoryError {
        RepositoryError::record_not_found("playlists", "id", playlist_id.to_string())
    }

    fn channel_not_found(playlist_id: Uuid, position: u32) -> RepositoryError {
        RepositoryError::record_not_found(
            "channels",
            "playlist_id/position",
            format!("{playlist_id}/{position}"),
        )
    }
}

#[async_trait]
impl PlaylistRepository for InMemoryPlaylistRepository {
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

        let mut state = self.state.write().await;
        state.playlists.insert(playlist.id, playlist.clone());
        state.channels.insert(playlist.id, Vec::new());
        Ok(playlist)
    }

    async fn find_playlist(&self, playlist_id: Uuid) -> RepositoryResult<Option<Playlist>> {
        Ok(self.state.read().await.playlists.get(&playlist_id).cloned())
    }

    async fn list_playlists(&self) -> RepositoryResult<Vec<Playlist>> {
        let mut playlists: Vec<Playlist> =
            self.state.read().await.playlists.values().cloned().collect();
        playlists.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(playlists)
    }

    async fn delete_playlist(&self, playlist_id: Uuid) -> RepositoryResult<()> {
        let _guard = self.locks.acquire(playlist_id).await;
        let mut state = self.state.write().await;
        state
            .playlists
            .remove(&playlist_id)
            .ok_or_else(|| Self::not_found(playlist_id))?;
        state.channels.remove(&playlist_id);
        info!("Deleted playlist {}", playlist_id);
        Ok(())
    }

    async fn list_channels(&self, playlist_id: Uuid) -> RepositoryResult<Vec<Channel>> {
        let state = self.state.read().await;
        let mut channels = state
            .channels
            .get(&playlist_id)
            .cloned()
            .unwrap_or_default();
        channels.sort_by_key(|channel| channel.position);
        Ok(channels)
    }

    async fn load_prior_metadata(
        &self,
        playlist_id: Uuid,
    ) -> RepositoryResult<HashMap<String, ChannelMetadata>> {
        Ok(self
            .list_channels(playlist_id)
            .await?
            .iter()
            .map(|channel| (channel.url.clone(), ChannelMetadata::from(channel)))
            .collect())
    }

    async fn replace_channels(
        &self,
        playlist_id: Uuid,
        channels: &[Channel],
    ) -> RepositoryResult<usize> {
        let _guard = self.locks.acquire(playlist_id).await;

        let staged = channels.to_vec();
        let mut state = self.state.write().await;
        if !state.playlists.contains_key(&playlist_id) {
            return Err(Self::not_found(playlist_id));
        }
        state.channels.insert(playlist_id, staged);

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
        let mut state = self.state.write().await;
        let playlist = state
            .playlists
            .get_mut(&playlist_id)
            .ok_or_else(|| Self::not_found(playlist_id))?;
        playlist.last_sync = Some(synced_at);
        if let Some(epg_url) = epg_url {
            playlist.epg_url = Some(epg_url.to_string());
        }
        Ok(())
    }

    async fn add_channel(
        &self,
        playlist_id: Uuid,
        request: ChannelCreateRequest,
    ) -> RepositoryResult<Channel> {
        let _guard = self.locks.acquire(playlist_id).await;
        let mut state = self.state.write().await;
        let channels = state
            .channels
            .get_mut(&playlist_id)
            .ok_or_else(|| Self::not_found(playlist_id))?;

        let position = channels.iter().map(|c| c.position).max().unwrap_or(0) + 1;
        let channel = request.into_channel(position);
        channels.push(channel.clone());
        Ok(channel)
    }

    async fn update_channel(
        &self,
        playlist_id: Uuid,
        position: u32,
        update: ChannelUpdateRequest,
    ) -> RepositoryResult<Channel> {
        let _guard = self.locks.acquire(playlist_id).await;
        let mut state = self.state.write().await;
        let channel = state
            .channels
            .get_mut(&playlist_id)
            .and_then(|channels| channels.iter_mut().find(|c| c.position == position))
            .ok_or_else(|| Self::channel_not_found(playlist_id, position))?;

        update.apply_to(channel);
        Ok(channel.clone())
    }

    async fn delete_channel(&self, playlist_id: Uuid, position: u32) -> RepositoryResult<()> {
        let _guard = self.locks.acquire(playlist_id).await;
        let mut state = self.state.write().await;
        let channels = state
            .channels
            .get_mut(&playlist_id)
            .ok_or_else(|| Self::channel_not_found(playlist_id, position))?;

        let before = channels.len();
        channels.retain(|c| c.position != position);
        if channels.len() == before {
            return Err(Self::channel_not_found(playlist_id, position));
        }
        for channel in channels.iter_mut().filter(|c| c.position > position) {
            channel.position -= 1;
        }
        Ok(())
    }
}
