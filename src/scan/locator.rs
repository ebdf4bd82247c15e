//! Finds the focused detail panel by nudging focus and polling the page.

use crate::config::PollPolicy;
use crate::error::Result;
use crate::scan::session::{PanelAnchor, ScanState, SessionContext};
use crate::view::{scripts, EmbeddedView, InputEvent, MouseButton};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocateOutcome {
    Found(PanelAnchor),
    NotFound,
}

pub struct PanelLocator<'a> {
    view: &'a dyn EmbeddedView,
    ctx: &'a SessionContext,
    state: &'a ScanState,
}

impl<'a> PanelLocator<'a> {
    pub fn new(view: &'a dyn EmbeddedView, ctx: &'a SessionContext, state: &'a ScanState) -> Self {
        Self { view, ctx, state }
    }

    /// Send `events`, wait, check focus; repeat up to `policy.max_attempts` times.
    /// Only `update_anchor` calls overwrite the cached anchor.
    pub async fn locate(
        &self,
        events: &[InputEvent],
        update_anchor: bool,
        policy: PollPolicy,
    ) -> Result<LocateOutcome> {
        let script = scripts::locate_panel(&self.ctx.marker, update_anchor);

        for attempt in 1..=policy.max_attempts {
            self.view.send_input_events(events).await?;
            tokio::time::sleep(policy.delay()).await;

            let value = self.view.execute_script(&script).await?;
            if let Some(anchor) = parse_anchor(&value) {
                tracing::debug!(
                    "Detail panel focused after {} attempt(s) at ({:.0}, {:.0})",
                    attempt,
                    anchor.x,
                    anchor.y
                );
                if update_anchor {
                    self.state.set_panel_anchor(anchor);
                }
                return Ok(LocateOutcome::Found(anchor));
            }
            tracing::trace!("Panel not focused yet ({}/{})", attempt, policy.max_attempts);
        }

        Ok(LocateOutcome::NotFound)
    }

    /// Click the cached panel anchor to pull focus back into the panel.
    /// Returns false when no anchor has been cached yet.
    pub async fn click_anchor(&self) -> Result<bool> {
        let Some(anchor) = self.state.panel_anchor() else {
            return Ok(false);
        };
        self.view
            .send_input_events(&InputEvent::click(anchor.x, anchor.y, MouseButton::Left))
            .await?;
        Ok(true)
    }
}

fn parse_anchor(value: &serde_json::Value) -> Option<PanelAnchor> {
    Some(PanelAnchor {
        x: value.get("x")?.as_f64()?,
        y: value.get("y")?.as_f64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_anchor() {
        assert_eq!(
            parse_anchor(&json!({ "x": 120.5, "y": 45 })),
            Some(PanelAnchor { x: 120.5, y: 45.0 })
        );
        assert_eq!(parse_anchor(&json!(null)), None);
        assert_eq!(parse_anchor(&json!(false)), None);
        assert_eq!(parse_anchor(&json!({ "x": 1 })), None);
    }
}
