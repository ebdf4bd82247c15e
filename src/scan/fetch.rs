//! Downloads image bytes with the embedded view's login session.

use crate::error::{PhaiError, Result};
use crate::view::{BrowsingSession, EmbeddedView};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// Upper bound on the buffer reserved from a response's `Content-Length`.
pub const PREALLOCATE_LIMIT: u64 = 16 << 20;

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the whole body of `locator`. Non-success status and body errors
    /// are [`PhaiError::Fetch`].
    async fn fetch(&self, locator: &str, session: &BrowsingSession) -> Result<Vec<u8>>;
}

/// Plain HTTP GET replaying the browser's cookies and user agent.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, locator: &str, session: &BrowsingSession) -> Result<Vec<u8>> {
        let mut request = self.client.get(locator);
        if let Some(cookies) = &session.cookie_header {
            request = request.header(reqwest::header::COOKIE, cookies);
        }
        if let Some(agent) = &session.user_agent {
            request = request.header(reqwest::header::USER_AGENT, agent);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PhaiError::Fetch(format!("{}: {}", locator, e)))?
            .error_for_status()
            .map_err(|e| PhaiError::Fetch(format!("{}: {}", locator, e)))?;

        let expected = response.content_length().unwrap_or(0).min(PREALLOCATE_LIMIT);
        let mut buffer = Vec::with_capacity(expected as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PhaiError::Fetch(format!("{}: {}", locator, e)))?;
            buffer.extend_from_slice(&chunk);
        }

        tracing::debug!("Fetched {} bytes from {}", buffer.len(), locator);
        Ok(buffer)
    }
}

/// Resolve the view's session for `locator` and fetch it. Any failure, including
/// not being able to read the session, is a [`PhaiError::Fetch`].
pub async fn fetch_with_view_session(
    view: &dyn EmbeddedView,
    fetcher: &dyn ImageFetcher,
    locator: &str,
) -> Result<Vec<u8>> {
    let session = view
        .session_context(locator)
        .await
        .map_err(|e| PhaiError::Fetch(format!("No browsing session: {}", e)))?;
    fetcher.fetch(locator, &session).await
}
