pub mod http_client;
pub mod url;

pub use http_client::HttpPlaylistFetcher;
pub use url::obfuscate_credentials;
