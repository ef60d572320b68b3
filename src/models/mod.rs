use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Extra tag key reserved for the playlist level EPG URL.
///
/// It is promoted to the `#EXTM3U` header and never stored on a channel.
/// Names that would be read back as a directive (`EXTINF`, `EXTGRP`,
/// `EXTM3U...`) are reserved as well, see
/// [`crate::sources::m3u::is_reserved_tag_name`].
pub const EPG_URL_TAG: &str = "epg_url";

/// Ordered mapping of non-standard directive lines (`#name:value`) attached to a channel.
pub type ExtraTags = BTreeMap<String, String>;

/// A single playlist entry.
///
/// The stream `url` is the identity key used when reconciling a fresh sync
/// against previously stored metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub url: String,
    pub group: Option<String>,
    pub logo: Option<String>,
    pub tvg_id: Option<String>,
    /// 1-based, dense within a playlist
    pub position: u32,
    #[serde(default)]
    pub extra_tags: ExtraTags,
}

/// Per-channel metadata that survives a resync, keyed by stream URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    pub tvg_id: Option<String>,
    #[serde(default)]
    pub extra_tags: ExtraTags,
}

impl From<&Channel> for ChannelMetadata {
    fn from(channel: &Channel) -> Self {
        Self {
            tvg_id: channel.tvg_id.clone(),
            extra_tags: channel.extra_tags.clone(),
        }
    }
}

/// Result of parsing M3U text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPlaylist {
    pub channels: Vec<Channel>,
    pub epg_url: Option<String>,
}

/// A stored playlist. Custom playlists have no upstream `url` and are never synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub url: Option<String>,
    pub is_custom: bool,
    pub epg_url: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaylistCreateRequest {
    pub name: String,
    pub url: Option<String>,
    #[serde(default)]
    pub is_custom: bool,
    pub epg_url: Option<String>,
}

/// A channel added by hand, appended after the last stored position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelCreateRequest {
    pub name: String,
    pub url: String,
    pub group: Option<String>,
    pub logo: Option<String>,
    pub tvg_id: Option<String>,
    #[serde(default)]
    pub extra_tags: ExtraTags,
}

impl ChannelCreateRequest {
    pub fn into_channel(self, position: u32) -> Channel {
        Channel {
            name: self.name,
            url: self.url,
            group: self.group.filter(|v| !v.is_empty()),
            logo: self.logo.filter(|v| !v.is_empty()),
            tvg_id: self.tvg_id.filter(|v| !v.is_empty()),
            position,
            extra_tags: self.extra_tags,
        }
    }
}

/// Partial update of a stored channel. `None` leaves a field unchanged and an
/// empty string clears an optional one. `extra_tags` replaces the whole map.
///
/// The stream URL is not editable: it is the key a resync matches on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelUpdateRequest {
    pub name: Option<String>,
    pub group: Option<String>,
    pub logo: Option<String>,
    pub tvg_id: Option<String>,
    pub extra_tags: Option<ExtraTags>,
}

impl ChannelUpdateRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.group.is_none()
            && self.logo.is_none()
            && self.tvg_id.is_none()
            && self.extra_tags.is_none()
    }

    pub fn apply_to(self, channel: &mut Channel) {
        fn optional(value: String) -> Option<String> {
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        }

        if let Some(name) = self.name {
            channel.name = name;
        }
        if let Some(group) = self.group {
            channel.group = optional(group);
        }
        if let Some(logo) = self.logo {
            channel.logo = optional(logo);
        }
        if let Some(tvg_id) = self.tvg_id {
            channel.tvg_id = optional(tvg_id);
        }
        if let Some(extra_tags) = self.extra_tags {
            channel.extra_tags = extra_tags;
        }
    }
}

/// Summary of a completed synchronisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub playlist_id: Uuid,
    pub channel_count: usize,
    /// Channels whose URL matched previously stored metadata
    pub preserved_metadata_count: usize,
    pub epg_url: Option<String>,
    pub synced_at: DateTime<Utc>,
}
