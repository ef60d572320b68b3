//! Playlist output: regenerating M3U text from stored or reconciled channels.

pub mod generator;

pub use generator::generate_m3u;
