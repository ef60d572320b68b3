//! Playlist and channel management
//!
//! Work on stored playlists outside of a sync, including hand edits of
//! single channels and M3U export. Edits are checked so that whatever is
//! stored can be written out and read back unchanged.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, AppResult, RepositoryError};
use crate::models::{
    Channel, ChannelCreateRequest, ChannelUpdateRequest, ExtraTags, Playlist,
    PlaylistCreateRequest,
};
use crate::proxy::generate_m3u;
use crate::repositories::PlaylistRepository;
use crate::sources::m3u::is_reserved_tag_name;

#[derive(Clone)]
pub struct PlaylistService {
    repository: Arc<dyn PlaylistRepository>,
}

fn single_line(field: &str, value: &str) -> AppResult<()> {
    if value.contains(['\n', '\r']) {
        return Err(AppError::validation(format!("{field} must be a single line")));
    }
    Ok(())
}

/// Attribute values are written inside double quotes
fn attribute_value(field: &str, value: Option<&str>) -> AppResult<()> {
    if let Some(value) = value {
        single_line(field, value)?;
        if value.contains('"') {
            return Err(AppError::validation(format!(
                "{field} must not contain double quotes"
            )));
        }
    }
    Ok(())
}

fn channel_name(name: &str) -> AppResult<()> {
    single_line("Channel name", name)?;
    if name.trim().is_empty() || name.trim() != name {
        return Err(AppError::validation(
            "Channel name must be non-empty without surrounding whitespace",
        ));
    }
    Ok(())
}

fn extra_tags(tags: &ExtraTags) -> AppResult<()> {
    for (name, value) in tags {
        if is_reserved_tag_name(name) {
            return Err(AppError::validation(format!(
                "'{name}' cannot be used as a tag name"
            )));
        }
        single_line("Tag value", value)?;
        if value.trim().is_empty() || value.trim() != value {
            return Err(AppError::validation(format!(
                "Tag '{name}' needs a value without surrounding whitespace"
            )));
        }
    }
    Ok(())
}

impl PlaylistService {
    pub fn new(repository: Arc<dyn PlaylistRepository>) -> Self {
        Self { repository }
    }

    fn channel_error(playlist_id: Uuid, position: u32) -> impl FnOnce(RepositoryError) -> AppError {
        move |e| match e {
            RepositoryError::RecordNotFound { .. } => {
                AppError::not_found("channel", format!("{playlist_id}/{position}"))
            }
            other => AppError::from(other),
        }
    }

    /// Create a playlist. Remote playlists need a source URL and custom ones
    /// must not have one.
    pub async fn create_playlist(&self, mut request: PlaylistCreateRequest) -> AppResult<Playlist> {
        if request.name.trim().is_empty() {
            return Err(AppError::validation("Playlist name must not be empty"));
        }
        request.url = request.url.filter(|url| !url.trim().is_empty());
        match (request.is_custom, request.url.is_some()) {
            (false, false) => return Err(AppError::validation("Playlist needs a source URL")),
            (true, true) => {
                return Err(AppError::validation("Custom playlists have no source URL"))
            }
            _ => {}
        }
        attribute_value("EPG URL", request.epg_url.as_deref())?;

        Ok(self.repository.create_playlist(request).await?)
    }

    pub async fn list_playlists(&self) -> AppResult<Vec<Playlist>> {
        Ok(self.repository.list_playlists().await?)
    }

    pub async fn get_playlist(&self, playlist_id: Uuid) -> AppResult<Playlist> {
        self.repository
            .find_playlist(playlist_id)
            .await?
            .ok_or_else(|| AppError::not_found("playlist", playlist_id.to_string()))
    }

    pub async fn delete_playlist(&self, playlist_id: Uuid) -> AppResult<()> {
        self.repository
            .delete_playlist(playlist_id)
            .await
            .map_err(|e| match e {
                RepositoryError::RecordNotFound { .. } => {
                    AppError::not_found("playlist", playlist_id.to_string())
                }
                other => AppError::from(other),
            })?;
        info!("Deleted playlist {}", playlist_id);
        Ok(())
    }

    pub async fn list_channels(&self, playlist_id: Uuid) -> AppResult<Vec<Channel>> {
        let playlist = self.get_playlist(playlist_id).await?;
        Ok(self.repository.list_channels(playlist.id).await?)
    }

    /// Append a hand-made channel to the end of a playlist
    pub async fn add_channel(
        &self,
        playlist_id: Uuid,
        request: ChannelCreateRequest,
    ) -> AppResult<Channel> {
        channel_name(&request.name)?;
        single_line("Channel URL", &request.url)?;
        if request.url.trim().is_empty()
            || request.url.trim() != request.url
            || request.url.starts_with('#')
        {
            return Err(AppError::validation(
                "Channel URL must be non-empty, trimmed and must not start with '#'",
            ));
        }
        attribute_value("Group", request.group.as_deref())?;
        attribute_value("Logo", request.logo.as_deref())?;
        attribute_value("Guide id", request.tvg_id.as_deref())?;
        extra_tags(&request.extra_tags)?;

        let playlist = self.get_playlist(playlist_id).await?;
        Ok(self.repository.add_channel(playlist.id, request).await?)
    }

    /// Edit the channel at `position`. Guide id and extra tag edits are kept
    /// by later syncs as long as the upstream stream URL does not change.
    pub async fn update_channel(
        &self,
        playlist_id: Uuid,
        position: u32,
        update: ChannelUpdateRequest,
    ) -> AppResult<Channel> {
        if update.is_empty() {
            return Err(AppError::validation("Nothing to update"));
        }
        if let Some(name) = update.name.as_deref() {
            channel_name(name)?;
        }
        attribute_value("Group", update.group.as_deref())?;
        attribute_value("Logo", update.logo.as_deref())?;
        attribute_value("Guide id", update.tvg_id.as_deref())?;
        if let Some(tags) = &update.extra_tags {
            extra_tags(tags)?;
        }

        let playlist = self.get_playlist(playlist_id).await?;
        let channel = self
            .repository
            .update_channel(playlist.id, position, update)
            .await
            .map_err(Self::channel_error(playlist.id, position))?;
        info!(
            "Updated channel {} ('{}') of playlist '{}'",
            position, channel.name, playlist.name
        );
        Ok(channel)
    }

    pub async fn delete_channel(&self, playlist_id: Uuid, position: u32) -> AppResult<()> {
        let playlist = self.get_playlist(playlist_id).await?;
        self.repository
            .delete_channel(playlist.id, position)
            .await
            .map_err(Self::channel_error(playlist.id, position))
    }

    /// Render the stored channels of a playlist as M3U text
    pub async fn export_m3u(&self, playlist_id: Uuid) -> AppResult<String> {
        let playlist = self.get_playlist(playlist_id).await?;
        let channels = self.repository.list_channels(playlist.id).await?;
        Ok(generate_m3u(&channels, playlist.epg_url.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryPlaylistRepository;
    use crate::sources::parse_m3u;

    async fn service_with_custom() -> (PlaylistService, Uuid) {
        let service = PlaylistService::new(Arc::new(InMemoryPlaylistRepository::new()));
        let playlist = service
            .create_playlist(PlaylistCreateRequest {
                name: "Mine".to_string(),
                is_custom: true,
                epg_url: Some("http://epg/guide.xml".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        (service, playlist.id)
    }

    fn create(name: &str, url: &str) -> ChannelCreateRequest {
        ChannelCreateRequest {
            name: name.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_playlist_validation() {
        let service = PlaylistService::new(Arc::new(InMemoryPlaylistRepository::new()));
        let remote_without_url = service
            .create_playlist(PlaylistCreateRequest {
                name: "Remote".to_string(),
                url: Some("  ".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(remote_without_url, Err(AppError::Validation { .. })));

        let custom_with_url = service
            .create_playlist(PlaylistCreateRequest {
                name: "Custom".to_string(),
                url: Some("http://x".to_string()),
                is_custom: true,
                ..Default::default()
            })
            .await;
        assert!(matches!(custom_with_url, Err(AppError::Validation { .. })));
        assert!(service.list_playlists().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edited_channels_export_and_parse_back() {
        let (service, id) = service_with_custom().await;
        service.add_channel(id, create("One", "http://a/1")).await.unwrap();
        service.add_channel(id, create("Two", "http://a/2")).await.unwrap();

        service
            .update_channel(
                id,
                2,
                ChannelUpdateRequest {
                    tvg_id: Some("two.mine".to_string()),
                    extra_tags: Some(ExtraTags::from([(
                        "EXTVLCOPT".to_string(),
                        "http-user-agent=Mine".to_string(),
                    )])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let exported = service.export_m3u(id).await.unwrap();
        assert_eq!(
            exported,
            "#EXTM3U x-tvg-url=\"http://epg/guide.xml\"\n\
             #EXTINF:-1,One\n\
             http://a/1\n\
             #EXTVLCOPT:http-user-agent=Mine\n\
             #EXTINF:-1 tvg-id=\"two.mine\",Two\n\
             http://a/2"
        );
        let parsed = parse_m3u(&exported);
        assert_eq!(parsed.channels, service.list_channels(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_edits_that_cannot_round_trip_are_rejected() {
        let (service, id) = service_with_custom().await;
        service.add_channel(id, create("One", "http://a/1")).await.unwrap();

        for name in ["EXTINF", "EXTGRP", "EXTM3U", "epg_url", "a:b"] {
            let result = service
                .update_channel(
                    id,
                    1,
                    ChannelUpdateRequest {
                        extra_tags: Some(ExtraTags::from([(name.to_string(), "x".to_string())])),
                        ..Default::default()
                    },
                )
                .await;
            assert!(
                matches!(result, Err(AppError::Validation { .. })),
                "tag {name:?} accepted"
            );
        }

        let quoted = service
            .update_channel(
                id,
                1,
                ChannelUpdateRequest {
                    group: Some("a\"b".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(quoted, Err(AppError::Validation { .. })));

        let comment_url = service.add_channel(id, create("Two", "#not-a-url")).await;
        assert!(matches!(comment_url, Err(AppError::Validation { .. })));

        assert!(matches!(
            service.update_channel(id, 1, ChannelUpdateRequest::default()).await,
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_targets_are_not_found() {
        let (service, id) = service_with_custom().await;
        let rename = ChannelUpdateRequest {
            name: "Renamed".to_string().into(),
            ..Default::default()
        };

        assert!(matches!(
            service.update_channel(id, 5, rename.clone()).await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            service.update_channel(Uuid::new_v4(), 1, rename).await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            service.delete_channel(id, 1).await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            service.export_m3u(Uuid::new_v4()).await,
            Err(AppError::NotFound { .. })
        ));

        service.delete_playlist(id).await.unwrap();
        assert!(matches!(
            service.delete_playlist(id).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
