use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Prompt used when neither the config nor a prompt file provides one.
pub const DEFAULT_PROMPT: &str = "Describe this image in detail, including: the main subject(s), setting/location, colors, mood, and any visible text or writing (spell out exactly what it says). Note any interesting or unique elements.";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Browser the scanner drives
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Control loop tuning
    #[serde(default)]
    pub scan: ScanConfig,

    /// Local vision model settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Local HTTP control API
    #[serde(default)]
    pub api: ApiConfig,

    /// Bulk thumbnail download
    #[serde(default)]
    pub harvest: HarvestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Remote debugging port of the Chrome instance holding the logged-in session
    #[serde(default = "default_cdp_port")]
    pub cdp_port: u16,

    /// Launch Chrome ourselves instead of attaching to a running one
    #[serde(default)]
    pub launch: bool,

    /// Chrome executable used when `launch` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,

    /// Persistent profile directory so the site login survives restarts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,

    /// Page opened on launch
    #[serde(default = "default_start_url")]
    pub start_url: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            cdp_port: default_cdp_port(),
            launch: false,
            chrome_path: None,
            user_data_dir: None,
            start_url: default_start_url(),
        }
    }
}

impl BrowserConfig {
    /// Get default Chrome path based on platform
    pub fn default_chrome_path() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            PathBuf::from("C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe")
        }
        #[cfg(target_os = "macos")]
        {
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            PathBuf::from("/usr/bin/google-chrome")
        }
    }

    pub fn effective_chrome_path(&self) -> PathBuf {
        self.chrome_path
            .clone()
            .unwrap_or_else(Self::default_chrome_path)
    }
}

/// Bounded polling: try `max_attempts` times, waiting `delay_ms` each time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl PollPolicy {
    pub const fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Maximum number of photos processed per run
    #[serde(default = "default_max_items")]
    pub max_items: u32,

    /// First panel lookup, right after opening a photo (slow page load)
    #[serde(default = "default_first_locate")]
    pub first_locate: PollPolicy,

    /// Panel re-focus after each advance (fast poll)
    #[serde(default = "default_relocate")]
    pub relocate: PollPolicy,

    /// Location-change polling after pressing "next"
    #[serde(default = "default_navigation")]
    pub navigation: PollPolicy,

    /// Pause between Tab presses while looking for the first photo link
    #[serde(default = "default_traversal_delay_ms")]
    pub traversal_delay_ms: u64,

    /// Pause after opening the first photo
    #[serde(default = "default_settle_ms")]
    pub activate_settle_ms: u64,

    /// Pause after the panel is re-focused, before the next extraction
    #[serde(default = "default_settle_ms")]
    pub relocate_settle_ms: u64,

    /// Substring of the location that marks a photo detail view
    #[serde(default = "default_detail_url_pattern")]
    pub detail_url_pattern: String,

    /// Substring of a link target that opens a photo detail view
    #[serde(default = "default_detail_link_pattern")]
    pub detail_link_pattern: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            first_locate: default_first_locate(),
            relocate: default_relocate(),
            navigation: default_navigation(),
            traversal_delay_ms: default_traversal_delay_ms(),
            activate_settle_ms: default_settle_ms(),
            relocate_settle_ms: default_settle_ms(),
            detail_url_pattern: default_detail_url_pattern(),
            detail_link_pattern: default_detail_link_pattern(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Ask the model for descriptions at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ollama endpoint; `http://` is prefixed when no scheme is given
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Replaces `prompt` when the file exists
    #[serde(default = "default_prompt_file")]
    pub prompt_file: Option<PathBuf>,

    /// Image sent ahead of every photo, loaded when the file exists
    #[serde(default = "default_reference_image")]
    pub reference_image: Option<PathBuf>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Write each request body here (pretty JSON) for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_request: Option<PathBuf>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            model: default_model(),
            prompt: default_prompt(),
            prompt_file: default_prompt_file(),
            reference_image: default_reference_image(),
            timeout_seconds: default_timeout(),
            dump_request: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Required as `X-API-Key` on every route except `/api/health`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Apply the same size jitter used for single photos
    #[serde(default)]
    pub jitter: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            jitter: false,
        }
    }
}

fn default_cdp_port() -> u16 {
    9222
}

fn default_start_url() -> String {
    "https://photos.google.com/".to_string()
}

fn default_max_items() -> u32 {
    10
}

fn default_first_locate() -> PollPolicy {
    PollPolicy::new(3, 750)
}

fn default_relocate() -> PollPolicy {
    PollPolicy::new(200, 10)
}

fn default_navigation() -> PollPolicy {
    PollPolicy::new(50, 100)
}

fn default_traversal_delay_ms() -> u64 {
    200
}

fn default_settle_ms() -> u64 {
    500
}

fn default_detail_url_pattern() -> String {
    "photos.google.com/photo/".to_string()
}

fn default_detail_link_pattern() -> String {
    "/photo/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "localhost:11434".to_string()
}

fn default_model() -> String {
    "llava:7b".to_string()
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_prompt_file() -> Option<PathBuf> {
    Some(PathBuf::from("prompt.txt"))
}

fn default_reference_image() -> Option<PathBuf> {
    Some(PathBuf::from("reference_photo.jpg"))
}

fn default_timeout() -> u64 {
    300
}

fn default_api_port() -> u16 {
    38473
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("thumbnails")
}
