//! Playlist sources: the M3U parser and the fetch abstraction that feeds it.

pub mod m3u;
pub mod traits;

pub use m3u::parse_m3u;
pub use traits::PlaylistFetcher;
