use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::url::obfuscate_credentials;
use crate::config::IngestionConfig;
use crate::errors::{SourceError, SourceResult};
use crate::sources::PlaylistFetcher;

/// `reqwest` backed [`PlaylistFetcher`].
///
/// Every request is bounded by the configured connect and total timeouts.
/// No retries are attempted.
#[derive(Debug, Clone)]
pub struct HttpPlaylistFetcher {
    client: Client,
}

impl HttpPlaylistFetcher {
    pub fn new(config: &IngestionConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::InvalidConfig {
                field: "ingestion".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }

    fn map_request_error(url: &str, error: reqwest::Error) -> SourceError {
        let url = obfuscate_credentials(url);
        if error.is_timeout() {
            SourceError::Timeout { url }
        } else {
            SourceError::connection_failed(url, error.to_string())
        }
    }
}

#[async_trait]
impl PlaylistFetcher for HttpPlaylistFetcher {
    async fn fetch_text(&self, url: &str) -> SourceResult<String> {
        debug!("Fetching playlist from {}", obfuscate_credentials(url));

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::map_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "Playlist fetch from {} returned {}",
                obfuscate_credentials(url),
                status
            );
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("Unknown")
                    .to_string(),
            });
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout {
                    url: obfuscate_credentials(url),
                }
            } else {
                SourceError::InvalidBody {
                    url: obfuscate_credentials(url),
                    message: e.to_string(),
                }
            }
        })?;

        debug!(
            "Fetched {} bytes from {}",
            text.len(),
            obfuscate_credentials(url)
        );
        Ok(text)
    }
}
