//! Per-photo result record.

use base64::Engine as _;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// One `dd` block of the detail panel: label → text, in page order.
/// A repeated label overwrites the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailGroup {
    entries: Vec<(String, String)>,
}

impl DetailGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Into<String>, V: Into<String>> FromIterator<(L, V)> for DetailGroup {
    fn from_iter<I: IntoIterator<Item = (L, V)>>(iter: I) -> Self {
        let mut group = DetailGroup::new();
        for (label, value) in iter {
            group.insert(label, value);
        }
        group
    }
}

impl Serialize for DetailGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MapLocation {
    pub map_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageInfo {
    /// Locator actually fetched, with jittered size parameters
    pub source_url: String,
    pub width: u32,
    pub height: u32,
    pub id: String,
    /// Raw image bytes, base64 on the wire
    #[serde(rename = "data64", serialize_with = "serialize_base64")]
    pub bytes: Option<Vec<u8>>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PhotoRecord {
    pub details: Vec<DetailGroup>,
    pub location: Option<MapLocation>,
    pub image: Option<ImageInfo>,
    /// 1-based, assigned when the record is handed to rendering
    pub sequence_number: u32,
    /// JSON object found in the description, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
}

impl PhotoRecord {
    /// The model asked for this photo to be left out (`"include": false`).
    pub fn is_suppressed(&self) -> bool {
        self.structured
            .as_ref()
            .and_then(|v| v.get("include"))
            .and_then(|v| v.as_bool())
            == Some(false)
    }

    pub fn description(&self) -> Option<&str> {
        self.image.as_ref()?.description.as_deref()
    }
}

fn serialize_base64<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(b) => serializer.serialize_some(&base64::engine::general_purpose::STANDARD.encode(b)),
        None => serializer.serialize_none(),
    }
}
