//! Repository trait definitions
//!
//! [`PlaylistRepository`] is the storage collaborator used by the sync
//! service. Implementations must make [`PlaylistRepository::replace_channels`]
//! atomic: after it returns, a reader sees either the complete new channel
//! set or, on error, exactly the set that was stored before the call.
//!
//! Channels are addressed by their 1-based position within a playlist.
//! Adding appends after the last position and deleting closes the gap, so
//! positions stay dense.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::RepositoryResult;
use crate::models::{
    Channel, ChannelCreateRequest, ChannelMetadata, ChannelUpdateRequest, Playlist,
    PlaylistCreateRequest,
};

#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Create a playlist with a generated id and creation timestamp
    async fn create_playlist(&self, request: PlaylistCreateRequest) -> RepositoryResult<Playlist>;

    /// Find a playlist by id
    ///
    /// * `Ok(None)` - no such playlist
    async fn find_playlist(&self, playlist_id: Uuid) -> RepositoryResult<Option<Playlist>>;

    /// All playlists, oldest first
    async fn list_playlists(&self) -> RepositoryResult<Vec<Playlist>>;

    /// Delete a playlist together with its channels
    ///
    /// * `Err(RecordNotFound)` - no such playlist
    async fn delete_playlist(&self, playlist_id: Uuid) -> RepositoryResult<()>;

    /// Stored channels ordered by position
    async fn list_channels(&self, playlist_id: Uuid) -> RepositoryResult<Vec<Channel>>;

    /// User-editable metadata of the stored channels, keyed by stream URL.
    /// When a URL occurs more than once the last channel (by position) wins.
    async fn load_prior_metadata(
        &self,
        playlist_id: Uuid,
    ) -> RepositoryResult<HashMap<String, ChannelMetadata>>;

    /// Replace every stored channel of the playlist with `channels` as one
    /// atomic operation. Replaces of the same playlist never interleave.
    ///
    /// Returns the number of channels stored.
    async fn replace_channels(
        &self,
        playlist_id: Uuid,
        channels: &[Channel],
    ) -> RepositoryResult<usize>;

    /// Record a completed sync. A `None` EPG URL keeps the stored one.
    async fn mark_synced(
        &self,
        playlist_id: Uuid,
        epg_url: Option<&str>,
        synced_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// Append a channel after the last stored position
    async fn add_channel(
        &self,
        playlist_id: Uuid,
        request: ChannelCreateRequest,
    ) -> RepositoryResult<Channel>;

    /// Apply a partial update to the channel at `position`
    ///
    /// * `Err(RecordNotFound)` - no such playlist or position
    async fn update_channel(
        &self,
        playlist_id: Uuid,
        position: u32,
        update: ChannelUpdateRequest,
    ) -> RepositoryResult<Channel>;

    /// Remove the channel at `position`; later channels move up by one
    async fn delete_channel(&self, playlist_id: Uuid, position: u32) -> RepositoryResult<()>;
}
