pub mod playlist;
pub mod playlist_sync;

pub use playlist::PlaylistService;
pub use playlist_sync::PlaylistSyncService;
