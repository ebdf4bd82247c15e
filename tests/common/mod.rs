//! Scripted stand-in for the browser page.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use phai_lib::config::{PollPolicy, ScanConfig};
use phai_lib::error::{PhaiError, Result};
use phai_lib::scan::{DescriptionService, ImageFetcher};
use phai_lib::view::{scripts, BrowsingSession, EmbeddedView, InputEvent};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};

pub const ORIGIN: &str = "https://photos.google.com";

#[derive(Debug, Clone)]
pub struct MockPhoto {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub url: String,
    pub details: Vec<(String, String)>,
    pub map_url: Option<String>,
}

impl MockPhoto {
    pub fn new(id: &str, image_base: &str) -> Self {
        Self {
            id: id.to_string(),
            width: 1000,
            height: 500,
            url: format!("{}/img/{}", image_base, id),
            details: vec![("Taken".into(), format!("Photo {}", id))],
            map_url: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Page {
    pub photos: Vec<MockPhoto>,
    pub current: usize,
    /// Start on the grid instead of a photo
    pub on_grid: bool,
    /// Tab presses needed on the grid before a photo link has focus
    pub tabs_to_link: u32,
    pub grid_tabs: u32,
    pub panel_focused: bool,
    /// The info panel never opens
    pub no_panel: bool,
    /// Index of a photo whose panel cannot be focused again
    pub lose_panel_at: Option<usize>,
    /// After opening a photo, the address bar shows the grid until the panel opens
    pub slow_address: bool,
    pub stale_address: bool,
    pub markers: Vec<String>,
    pub session: BrowsingSession,
    pub thumbnails: Value,
}

#[derive(Default)]
pub struct MockView {
    pub page: Mutex<Page>,
    pub events: Mutex<Vec<InputEvent>>,
    pub scripts: Mutex<Vec<String>>,
    pub closed: AtomicBool,
}

impl MockView {
    pub fn with_photos(photos: Vec<MockPhoto>) -> Self {
        let view = Self::default();
        view.page.lock().photos = photos;
        view
    }

    pub fn location(&self) -> String {
        let page = self.page.lock();
        if page.on_grid || page.stale_address {
            format!("{}/", ORIGIN)
        } else {
            format!("{}/photo/{}", ORIGIN, page.photos[page.current].id)
        }
    }

    pub fn script_count(&self, tag: &str) -> usize {
        self.scripts.lock().iter().filter(|t| *t == tag).count()
    }

    pub fn char_count(&self, key: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, InputEvent::Char { key: k } if k == key))
            .count()
    }

    fn snapshot(&self) -> Value {
        let page = self.page.lock();
        if !page.panel_focused || page.on_grid {
            return json!({ "panelFound": false });
        }
        let photo = &page.photos[page.current];
        let group: Vec<Value> = photo
            .details
            .iter()
            .enumerate()
            .map(|(i, (label, text))| {
                json!({ "ariaLabel": label, "child": i, "grandchild": null, "text": text })
            })
            .collect();
        json!({
            "panelFound": true,
            "photoId": photo.id,
            "dataNode": {
                "width": photo.width.to_string(),
                "height": photo.height.to_string(),
                "url": photo.url,
            },
            "groups": [group],
            "mapUrl": photo.map_url,
        })
    }

    fn refocus_allowed(page: &Page) -> bool {
        !page.no_panel && page.lose_panel_at != Some(page.current)
    }
}

#[async_trait]
impl EmbeddedView for MockView {
    async fn execute_script(&self, script: &str) -> Result<Value> {
        let tag = scripts::tag_of(script)
            .ok_or_else(|| PhaiError::Script("untagged script".into()))?
            .to_string();
        self.scripts.lock().push(tag.clone());

        let value = match tag.as_str() {
            "location" => json!(self.location()),
            "init_marker" => {
                let mut page = self.page.lock();
                let marker = script
                    .split('"')
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                if page.markers.contains(&marker) {
                    json!(false)
                } else {
                    page.markers.push(marker);
                    json!(true)
                }
            }
            "focused_detail_link" => {
                let page = self.page.lock();
                if page.on_grid && page.grid_tabs >= page.tabs_to_link {
                    json!(format!("{}/photo/{}", ORIGIN, page.photos[0].id))
                } else {
                    Value::Null
                }
            }
            "locate_panel" => {
                let page = self.page.lock();
                if page.panel_focused && !page.on_grid {
                    json!({ "x": 640.0, "y": 105.0 })
                } else {
                    Value::Null
                }
            }
            "extract" => self.snapshot(),
            "thumbnails" => self.page.lock().thumbnails.clone(),
            other => return Err(PhaiError::Script(format!("unexpected script {}", other))),
        };
        Ok(value)
    }

    async fn send_input_event(&self, event: &InputEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        let mut page = self.page.lock();
        match event {
            InputEvent::KeyDown { key } if key == "Tab" => {
                if page.on_grid {
                    page.grid_tabs += 1;
                } else if Self::refocus_allowed(&page) {
                    page.panel_focused = true;
                }
            }
            InputEvent::KeyDown { key } if key == "Enter" => {
                if page.on_grid && page.grid_tabs >= page.tabs_to_link {
                    page.on_grid = false;
                    page.current = 0;
                    page.stale_address = page.slow_address;
                }
            }
            InputEvent::Char { key } if key == "i" => {
                if !page.on_grid && !page.no_panel {
                    page.panel_focused = true;
                    page.stale_address = false;
                }
            }
            InputEvent::Char { key } if key == "j" => {
                if !page.on_grid && page.current + 1 < page.photos.len() {
                    page.current += 1;
                    page.panel_focused = false;
                }
            }
            InputEvent::MouseDown { .. } => {
                if Self::refocus_allowed(&page) {
                    page.panel_focused = true;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn session_context(&self, _url: &str) -> Result<BrowsingSession> {
        Ok(self.page.lock().session.clone())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Short polling so tests run in milliseconds.
pub fn fast_scan_config(max_items: u32) -> ScanConfig {
    ScanConfig {
        max_items,
        first_locate: PollPolicy::new(3, 1),
        relocate: PollPolicy::new(5, 1),
        navigation: PollPolicy::new(3, 1),
        traversal_delay_ms: 1,
        activate_settle_ms: 1,
        relocate_settle_ms: 1,
        ..Default::default()
    }
}

/// Returns the same bytes for every locator and remembers what was asked.
#[derive(Default)]
pub struct StaticFetcher {
    pub requested: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
    async fn fetch(&self, locator: &str, _session: &BrowsingSession) -> Result<Vec<u8>> {
        self.requested.lock().push(locator.to_string());
        Ok(b"jpeg-bytes".to_vec())
    }
}

pub struct FailingFetcher;

#[async_trait]
impl ImageFetcher for FailingFetcher {
    async fn fetch(&self, locator: &str, _session: &BrowsingSession) -> Result<Vec<u8>> {
        Err(PhaiError::Fetch(format!("{}: 404 Not Found", locator)))
    }
}

/// Answers every request with a fixed text.
pub struct CannedDescriber(pub String);

#[async_trait]
impl DescriptionService for CannedDescriber {
    async fn describe(&self, _image: &[u8], _reference: Option<&[u8]>, _prompt: &str) -> String {
        self.0.clone()
    }
}
