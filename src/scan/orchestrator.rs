//! Drives one scan: find the first photo, then extract, enrich, render and
//! advance until a stop condition.

use crate::config::ScanConfig;
use crate::error::{PhaiError, Result};
use crate::scan::describe::{extract_json_object, DescriptionService, DESCRIPTION_IMAGE_ERROR};
use crate::scan::extract::MetadataExtractor;
use crate::scan::fetch::{fetch_with_view_session, ImageFetcher};
use crate::scan::locator::{LocateOutcome, PanelLocator};
use crate::scan::navigate::{Advance, Navigator};
use crate::scan::record::PhotoRecord;
use crate::scan::session::{ScanPhase, ScanState, SessionContext};
use crate::scan::sink::RecordSink;
use crate::view::{scripts, EmbeddedView, InputEvent};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Key that opens the info panel of the current photo.
const INFO_PANEL_KEY: char = 'i';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxItems,
    Stuck,
    PanelLost,
    StopRequested,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub reason: StopReason,
    /// Photos visited, suppressed ones included
    pub iterations: u32,
    /// Records handed to rendering
    pub kept: u32,
}

/// Prompt and optional reference image sent with every description request.
#[derive(Debug, Clone, Default)]
pub struct DescribeInputs {
    pub prompt: String,
    pub reference: Option<Vec<u8>>,
}

pub struct Orchestrator {
    view: Arc<dyn EmbeddedView>,
    fetcher: Arc<dyn ImageFetcher>,
    describer: Option<Arc<dyn DescriptionService>>,
    inputs: DescribeInputs,
    state: Arc<ScanState>,
    config: ScanConfig,
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl Orchestrator {
    pub fn new(
        view: Arc<dyn EmbeddedView>,
        fetcher: Arc<dyn ImageFetcher>,
        state: Arc<ScanState>,
        config: ScanConfig,
    ) -> Self {
        Self {
            view,
            fetcher,
            describer: None,
            inputs: DescribeInputs::default(),
            state,
            config,
            sinks: Vec::new(),
        }
    }

    /// Describe fetched images with `describer`. Without one, records keep no
    /// description.
    pub fn with_describer(
        mut self,
        describer: Arc<dyn DescriptionService>,
        inputs: DescribeInputs,
    ) -> Self {
        self.describer = Some(describer);
        self.inputs = inputs;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Run one scan to completion. Setup and initial panel failures are errors;
    /// everything after the first photo ends with a [`RunOutcome`].
    pub async fn run(&self) -> Result<RunOutcome> {
        let _guard = self.state.begin_run()?;
        let ctx = SessionContext::new();
        tracing::info!(
            "Scan {} started (max {} items)",
            ctx.session_id,
            self.config.max_items
        );

        let result = self.drive(&ctx).await;
        match &result {
            Ok(outcome) => {
                let phase = if outcome.reason == StopReason::Stuck {
                    ScanPhase::Stuck
                } else {
                    ScanPhase::Finished
                };
                self.state.set_phase(phase);
                tracing::info!(
                    "Scan {} finished: {:?}, {} of {} photo(s) kept",
                    ctx.session_id,
                    outcome.reason,
                    outcome.kept,
                    outcome.iterations
                );
            }
            Err(e) => {
                self.state.set_phase(ScanPhase::Error);
                tracing::error!("Scan {} aborted: {}", ctx.session_id, e);
            }
        }
        result
    }

    async fn drive(&self, ctx: &SessionContext) -> Result<RunOutcome> {
        let view = self.view.as_ref();
        let locator = PanelLocator::new(view, ctx, &self.state);

        self.state.set_phase(ScanPhase::Initializing);
        let created = view
            .execute_script(&scripts::init_marker(
                &ctx.marker,
                &ctx.session_id.to_string(),
            ))
            .await?;
        if created.as_bool() == Some(true) {
            tracing::debug!("Created page slot {}", ctx.marker);
        } else {
            tracing::debug!("Page slot {} already present", ctx.marker);
        }

        self.state.set_phase(ScanPhase::LocatingFirstItem);
        if !self.locate_first_item().await? {
            return Ok(RunOutcome {
                reason: StopReason::StopRequested,
                iterations: 0,
                kept: 0,
            });
        }

        self.state.set_phase(ScanPhase::LocatingPanel);
        let policy = self.config.first_locate;
        if locator
            .locate(&[InputEvent::char(INFO_PANEL_KEY)], true, policy)
            .await?
            == LocateOutcome::NotFound
        {
            return Err(PhaiError::PanelNotFound {
                attempts: policy.max_attempts,
            });
        }
        // The address bar can lag behind the page until the panel is up
        let mut location = view.current_location().await?;
        self.state.set_location(location.clone());

        let extractor = MetadataExtractor::new(view, &self.config.detail_link_pattern);
        let navigator = Navigator::new(view, self.config.navigation);
        let mut iterations = 0u32;
        let mut kept = 0u32;

        let reason = loop {
            if self.state.stop_requested() {
                tracing::info!("Stop requested");
                break StopReason::StopRequested;
            }
            iterations += 1;

            self.state.set_phase(ScanPhase::Extracting);
            let mut record = extractor.extract().await?;
            record.sequence_number = iterations;

            self.state.set_phase(ScanPhase::Enriching);
            self.enrich(&mut record).await;

            if record.is_suppressed() {
                tracing::info!("Photo #{} suppressed by the model", iterations);
            } else {
                self.state.set_phase(ScanPhase::Rendering);
                self.render(record);
                kept += 1;
            }

            if iterations >= self.config.max_items {
                break StopReason::MaxItems;
            }

            self.state.set_phase(ScanPhase::Advancing);
            match navigator.advance(&location).await? {
                Advance::Moved(next) => {
                    self.state.set_location(next.clone());
                    location = next;
                }
                Advance::Stuck => {
                    tracing::warn!("Navigation stuck after {} photo(s), ending scan", iterations);
                    break StopReason::Stuck;
                }
            }

            self.state.set_phase(ScanPhase::LocatingPanel);
            if !self.relocate(&locator).await? {
                tracing::error!("Lost the detail panel after moving to {}", location);
                break StopReason::PanelLost;
            }
            tokio::time::sleep(Duration::from_millis(self.config.relocate_settle_ms)).await;
        };

        Ok(RunOutcome {
            reason,
            iterations,
            kept,
        })
    }

    /// Make sure a photo is open. From a grid view, Tab through the page until a
    /// photo link has focus and open it. Returns `false` if stopped meanwhile.
    async fn locate_first_item(&self) -> Result<bool> {
        let view = self.view.as_ref();
        let location = view.current_location().await?;
        self.state.set_location(location.clone());
        if location.contains(&self.config.detail_url_pattern) {
            return Ok(true);
        }

        tracing::info!("Not on a photo, tabbing to the first one");
        let link_script = scripts::focused_detail_link(&self.config.detail_link_pattern);
        let delay = Duration::from_millis(self.config.traversal_delay_ms);
        let mut presses = 0u64;
        loop {
            if self.state.stop_requested() {
                return Ok(false);
            }
            view.send_input_events(&InputEvent::press("Tab")).await?;
            presses += 1;
            tokio::time::sleep(delay).await;

            if let Some(href) = view.execute_script(&link_script).await?.as_str() {
                tracing::info!("Focused {} after {} Tab press(es)", href, presses);
                break;
            }
        }

        view.send_input_events(&InputEvent::press("Enter")).await?;
        tokio::time::sleep(Duration::from_millis(self.config.activate_settle_ms)).await;
        Ok(true)
    }

    /// Tab back into the panel; if that fails, click where it last was and check
    /// once more.
    async fn relocate(&self, locator: &PanelLocator<'_>) -> Result<bool> {
        let policy = self.config.relocate;
        if let LocateOutcome::Found(_) = locator.locate(&InputEvent::press("Tab"), false, policy).await? {
            return Ok(true);
        }
        if !locator.click_anchor().await? {
            return Ok(false);
        }
        tracing::debug!("Clicked the cached panel anchor");
        Ok(matches!(
            locator.locate(&[], false, policy).await?,
            LocateOutcome::Found(_)
        ))
    }

    /// Fetch and describe the image, if any. Failures end up in the description.
    async fn enrich(&self, record: &mut PhotoRecord) {
        let Some(image) = record.image.as_mut() else {
            return;
        };

        let bytes = match fetch_with_view_session(
            self.view.as_ref(),
            self.fetcher.as_ref(),
            &image.source_url,
        )
        .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Image {} not fetched: {}", image.id, e);
                image.bytes = None;
                image.description = Some(DESCRIPTION_IMAGE_ERROR.to_string());
                return;
            }
        };

        if let Some(describer) = &self.describer {
            let text = describer
                .describe(&bytes, self.inputs.reference.as_deref(), &self.inputs.prompt)
                .await;
            record.structured = extract_json_object(&text);
            image.description = Some(text);
        }
        image.bytes = Some(bytes);
    }

    fn render(&self, record: PhotoRecord) {
        for sink in &self.sinks {
            sink.render(&record);
        }
        self.state.push_record(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(StopReason::StopRequested).unwrap(),
            serde_json::json!("stop_requested")
        );
        assert_eq!(
            serde_json::to_value(StopReason::PanelLost).unwrap(),
            serde_json::json!("panel_lost")
        );
    }
}
