//! Turns the focused detail panel into a [`PhotoRecord`].

use crate::error::{PhaiError, Result};
use crate::scan::record::{DetailGroup, ImageInfo, MapLocation, PhotoRecord};
use crate::view::{scripts, EmbeddedView};
use rand::Rng;
use serde::Deserialize;

/// Upper bound (inclusive) of the random pixels added to the requested width.
pub const MAX_JITTER: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSnapshot {
    #[serde(default)]
    pub panel_found: bool,
    pub photo_id: Option<String>,
    pub data_node: Option<DataNode>,
    #[serde(default)]
    pub groups: Vec<Vec<DetailEntry>>,
    pub map_url: Option<String>,
}

/// Attributes of the element that carries the photo's base URL and size.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataNode {
    pub width: Option<String>,
    pub height: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailEntry {
    pub aria_label: Option<String>,
    pub child: usize,
    pub grandchild: Option<usize>,
    #[serde(default)]
    pub text: String,
}

/// Label from the accessible name (text before ':'), else a positional fallback.
pub fn derive_label(aria_label: Option<&str>, child: usize, grandchild: Option<usize>) -> String {
    if let Some(label) = aria_label.filter(|l| !l.is_empty()) {
        return label.split(':').next().unwrap_or(label).trim().to_string();
    }
    match grandchild {
        Some(j) => format!("detail-{}-{}", child, j),
        None => format!("detail-{}", child),
    }
}

/// Add `extra` pixels to the width and derive the height from the original ratio,
/// rounding down. `None` when either side no longer fits a `u32`.
pub fn jitter_dimensions(width: u32, height: u32, extra: u32) -> Option<(u32, u32)> {
    let new_width = width.checked_add(extra)?;
    let new_height = u32::try_from(new_width as u64 * height as u64 / width.max(1) as u64).ok()?;
    Some((new_width, new_height))
}

/// Sized, uncropped request locator for a base image URL.
pub fn image_locator(base_url: &str, width: u32, height: u32) -> String {
    format!("{}=w{}-h{}-no?authuser=0", base_url, width, height)
}

/// Same leniency as the page's own integer parsing: leading digits only.
pub(crate) fn parse_dimension(raw: Option<&str>) -> Option<u32> {
    let raw = raw?.trim();
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|v| *v > 0)
}

/// Build the record for a snapshot, using `extra` as the size jitter.
pub fn build_record(snapshot: &PanelSnapshot, extra: u32) -> PhotoRecord {
    let mut record = PhotoRecord::default();
    if !snapshot.panel_found {
        return record;
    }

    if let (Some(id), Some(node)) = (&snapshot.photo_id, &snapshot.data_node) {
        let width = parse_dimension(node.width.as_deref());
        let height = parse_dimension(node.height.as_deref());
        let sized = match (width, height) {
            (Some(width), Some(height)) => jitter_dimensions(width, height, extra),
            _ => None,
        };
        match (sized, node.url.as_deref()) {
            (Some((width, height)), Some(base)) => {
                record.image = Some(ImageInfo {
                    source_url: image_locator(base, width, height),
                    width,
                    height,
                    id: id.clone(),
                    bytes: None,
                    description: None,
                });
            }
            _ => tracing::warn!("Data node for photo {} has unusable attributes", id),
        }
    }

    record.details = snapshot
        .groups
        .iter()
        .map(|entries| {
            entries
                .iter()
                .map(|e| {
                    (
                        derive_label(e.aria_label.as_deref(), e.child, e.grandchild),
                        e.text.trim().to_string(),
                    )
                })
                .collect::<DetailGroup>()
        })
        .collect();

    record.location = snapshot.map_url.as_ref().map(|url| MapLocation {
        map_url: url.clone(),
    });

    record
}

pub struct MetadataExtractor<'a> {
    view: &'a dyn EmbeddedView,
    link_pattern: &'a str,
}

impl<'a> MetadataExtractor<'a> {
    pub fn new(view: &'a dyn EmbeddedView, link_pattern: &'a str) -> Self {
        Self { view, link_pattern }
    }

    /// Read the focused panel. A missing panel or data node gives a sparser
    /// record, never an error; only a failing page query is.
    pub async fn extract(&self) -> Result<PhotoRecord> {
        let value = self
            .view
            .execute_script(&scripts::extract_snapshot(self.link_pattern))
            .await?;
        let snapshot: PanelSnapshot = serde_json::from_value(value)
            .map_err(|e| PhaiError::Script(format!("Unexpected panel snapshot: {}", e)))?;

        if !snapshot.panel_found {
            tracing::warn!("No focused detail panel during extraction");
        }

        let extra = rand::thread_rng().gen_range(0..=MAX_JITTER);
        Ok(build_record(&snapshot, extra))
    }
}
