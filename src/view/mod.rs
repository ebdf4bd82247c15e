//! The embedded browser surface the scanner drives.
//!
//! The page is externally owned: we can only evaluate expressions against it,
//! feed it synthetic input and borrow its login session for our own requests.

pub mod cdp;
pub mod input;
pub mod scripts;

pub use cdp::CDPClient;
pub use input::{InputEvent, MouseButton};

use crate::error::Result;
use async_trait::async_trait;

/// Credentials of the browsing context, replayed on out-of-page requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowsingSession {
    /// `Cookie` header value for the target URL
    pub cookie_header: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
pub trait EmbeddedView: Send + Sync {
    /// Evaluate `script` in the page and return its JSON-serializable result.
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value>;

    async fn send_input_event(&self, event: &InputEvent) -> Result<()>;

    /// Session credentials that apply to `url`.
    async fn session_context(&self, url: &str) -> Result<BrowsingSession>;

    async fn send_input_events(&self, events: &[InputEvent]) -> Result<()> {
        for event in events {
            self.send_input_event(event).await?;
        }
        Ok(())
    }

    /// Release the connection to the page.
    async fn close(&self) {}

    /// Current location, used as an opaque change-detection token.
    async fn current_location(&self) -> Result<String> {
        let value = self.execute_script(&scripts::location_href()).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}
