//! # m3u-sync
//!
//! Parse extended M3U playlists, regenerate them, and resynchronise stored
//! playlists from their upstream source without losing per-channel
//! metadata users have added (program guide ids and extra directive tags).
//!
//! ```rust
//! use m3u_sync::{proxy::generate_m3u, sources::parse_m3u};
//!
//! let parsed = parse_m3u("#EXTM3U x-tvg-url=\"http://epg\"\n#EXTINF:-1 tvg-id=\"a\",A\nhttp://example.com/a.m3u8");
//! assert_eq!(parsed.channels[0].name, "A");
//!
//! let text = generate_m3u(&parsed.channels, parsed.epg_url.as_deref());
//! assert_eq!(parse_m3u(&text), parsed);
//! ```

pub mod config;
pub mod database;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod proxy;
pub mod repositories;
pub mod services;
pub mod sources;
pub mod utils;
