//! Storage collaborators for playlists and their channels.

pub mod locks;
pub mod memory;
pub mod playlist;
pub mod traits;

pub use locks::PlaylistLocks;
pub use memory::InMemoryPlaylistRepository;
pub use playlist::SqlitePlaylistRepository;
pub use traits::PlaylistRepository;
