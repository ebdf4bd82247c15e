//! Bulk download of every thumbnail on the current page.

use crate::error::{PhaiError, Result};
use crate::scan::extract::{image_locator, jitter_dimensions, parse_dimension, MAX_JITTER};
use crate::scan::fetch::ImageFetcher;
use crate::view::{scripts, BrowsingSession, EmbeddedView};
use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[async_trait]
pub trait ImageSink: Send + Sync {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// Saves images as `<dir>/<name>.jpg`.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", name))
    }
}

#[async_trait]
impl ImageSink for DirectorySink {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(name), bytes).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
    pub index: usize,
    pub href: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub url: Option<String>,
}

impl Thumbnail {
    /// Last path segment of the link (the photo id), else the page position.
    pub fn name(&self) -> String {
        self.href
            .as_deref()
            .and_then(|h| h.split(['?', '#']).next())
            .and_then(|h| h.trim_end_matches('/').rsplit('/').next())
            .filter(|s| !s.is_empty() && *s != ".")
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("thumb-{}", self.index))
    }

    /// Sized locator for this thumbnail, `None` when the node is incomplete.
    pub fn locator(&self, extra: u32) -> Option<String> {
        let width = parse_dimension(self.width.as_deref())?;
        let height = parse_dimension(self.height.as_deref())?;
        let base = self.url.as_deref().filter(|u| !u.is_empty())?;
        let (width, height) = jitter_dimensions(width, height, extra)?;
        Some(image_locator(base, width, height))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub saved: usize,
    pub failed: usize,
}

/// Fetch and save every thumbnail concurrently. Individual failures are logged
/// and counted; they never cancel the others.
pub async fn harvest(
    view: &dyn EmbeddedView,
    fetcher: &dyn ImageFetcher,
    sink: &dyn ImageSink,
    jitter: bool,
) -> Result<HarvestReport> {
    let value = view.execute_script(&scripts::thumbnails()).await?;
    let thumbnails: Vec<Thumbnail> = serde_json::from_value(value)
        .map_err(|e| PhaiError::Script(format!("Unexpected thumbnail list: {}", e)))?;

    let mut report = HarvestReport::default();
    let mut jobs = Vec::new();
    {
        let mut rng = rand::thread_rng();
        for thumb in &thumbnails {
            let extra = if jitter { rng.gen_range(0..=MAX_JITTER) } else { 0 };
            match thumb.locator(extra) {
                Some(locator) => jobs.push((thumb.name(), locator)),
                None => {
                    tracing::warn!("Thumbnail {} has no usable size or URL", thumb.index);
                    report.failed += 1;
                }
            }
        }
    }

    if jobs.is_empty() {
        tracing::info!("No thumbnails to harvest");
        return Ok(report);
    }

    let session = match view.session_context(&jobs[0].1).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("No browsing session, fetching anonymously: {}", e);
            BrowsingSession::default()
        }
    };

    tracing::info!("Harvesting {} thumbnail(s)", jobs.len());
    let results = join_all(jobs.iter().map(|(name, locator)| {
        let session = &session;
        async move {
            let bytes = fetcher.fetch(locator, session).await?;
            sink.save(name, &bytes).await
        }
    }))
    .await;

    for ((name, _), result) in jobs.iter().zip(results) {
        match result {
            Ok(()) => report.saved += 1,
            Err(e) => {
                tracing::warn!("Thumbnail {} failed: {}", name, e);
                report.failed += 1;
            }
        }
    }

    tracing::info!("Harvest done: {} saved, {} failed", report.saved, report.failed);
    Ok(report)
}
