//! Source collaborator trait definitions

use async_trait::async_trait;

use crate::errors::SourceResult;

/// Fetches the raw text of an upstream playlist.
///
/// Implementations own transport concerns: timeouts, redirects and text
/// decoding. A failed fetch is terminal for the synchronisation attempt that
/// requested it; callers do not retry.
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> SourceResult<String>;
}
