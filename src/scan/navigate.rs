//! Moves the page to the next photo and waits for the location to change.

use crate::config::PollPolicy;
use crate::error::Result;
use crate::view::{EmbeddedView, InputEvent};

/// Key the photo viewer binds to "next item".
pub const NEXT_ITEM_KEY: char = 'j';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The page moved on; carries the new location.
    Moved(String),
    /// The location never changed, usually the end of the collection.
    Stuck,
}

pub struct Navigator<'a> {
    view: &'a dyn EmbeddedView,
    policy: PollPolicy,
}

impl<'a> Navigator<'a> {
    pub fn new(view: &'a dyn EmbeddedView, policy: PollPolicy) -> Self {
        Self { view, policy }
    }

    /// Send the next-item key once, then poll until the location differs from
    /// `current`.
    pub async fn advance(&self, current: &str) -> Result<Advance> {
        self.view
            .send_input_event(&InputEvent::char(NEXT_ITEM_KEY))
            .await?;

        for attempt in 1..=self.policy.max_attempts {
            tokio::time::sleep(self.policy.delay()).await;
            let location = self.view.current_location().await?;
            if location != current {
                tracing::debug!("Moved to {} after {} poll(s)", location, attempt);
                return Ok(Advance::Moved(location));
            }
        }

        tracing::warn!(
            "Location stayed at {} after {} polls",
            current,
            self.policy.max_attempts
        );
        Ok(Advance::Stuck)
    }
}
