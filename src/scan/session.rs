//! Run-scoped context and process-wide scan state.

use crate::error::{PhaiError, Result};
use crate::scan::record::PhotoRecord;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identity of one run, threaded through every component that touches the page.
/// `marker` names this run's slot in the page-side side table, so a reloaded or
/// reused page never mixes state between runs.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: uuid::Uuid,
    pub marker: String,
}

impl SessionContext {
    pub fn new() -> Self {
        let session_id = uuid::Uuid::new_v4();
        let simple = session_id.simple().to_string();
        Self {
            session_id,
            marker: format!("phai_{}", &simple[..9]),
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Viewport point just inside the top edge of the detail panel.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PanelAnchor {
    pub x: f64,
    pub y: f64,
}

/// Where the current (or last) run is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    #[default]
    Idle,
    Initializing,
    LocatingFirstItem,
    LocatingPanel,
    Extracting,
    Enriching,
    Rendering,
    Advancing,
    Finished,
    Stuck,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanStatus {
    pub running: bool,
    pub phase: ScanPhase,
    pub stop_requested: bool,
    pub records: usize,
    pub location: Option<String>,
    pub panel_anchor: Option<PanelAnchor>,
}

/// Shared by the running scan and whoever controls it (CLI, HTTP API).
#[derive(Default)]
pub struct ScanState {
    running: AtomicBool,
    stop_requested: AtomicBool,
    phase: Mutex<ScanPhase>,
    current_location: Mutex<Option<String>>,
    panel_anchor: RwLock<Option<PanelAnchor>>,
    records: RwLock<Vec<PhotoRecord>>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a run as started. Fails if one is already running.
    /// The returned guard marks the run finished when dropped, however the run ends.
    pub fn begin_run(&self) -> Result<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| PhaiError::AlreadyRunning)?;
        self.stop_requested.store(false, Ordering::SeqCst);
        Ok(RunGuard { state: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the running scan to stop after its current item.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.lock()
    }

    pub(crate) fn set_phase(&self, phase: ScanPhase) {
        tracing::debug!("Scan phase: {:?}", phase);
        *self.phase.lock() = phase;
    }

    pub fn location(&self) -> Option<String> {
        self.current_location.lock().clone()
    }

    pub(crate) fn set_location(&self, location: String) {
        *self.current_location.lock() = Some(location);
    }

    pub fn panel_anchor(&self) -> Option<PanelAnchor> {
        *self.panel_anchor.read()
    }

    pub(crate) fn set_panel_anchor(&self, anchor: PanelAnchor) {
        *self.panel_anchor.write() = Some(anchor);
    }

    pub(crate) fn push_record(&self, record: PhotoRecord) {
        self.records.write().push(record);
    }

    /// Records in processing order.
    pub fn records(&self) -> Vec<PhotoRecord> {
        self.records.read().clone()
    }

    /// Records newest first, the order they are displayed in.
    pub fn display_order(&self) -> Vec<PhotoRecord> {
        self.records.read().iter().rev().cloned().collect()
    }

    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    pub fn clear_records(&self) {
        self.records.write().clear();
    }

    pub fn status(&self) -> ScanStatus {
        ScanStatus {
            running: self.is_running(),
            phase: self.phase(),
            stop_requested: self.stop_requested(),
            records: self.record_count(),
            location: self.location(),
            panel_anchor: self.panel_anchor(),
        }
    }
}

pub struct RunGuard<'a> {
    state: &'a ScanState,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_is_namespaced_and_unique() {
        let a = SessionContext::new();
        let b = SessionContext::new();
        assert!(a.marker.starts_with("phai_"));
        assert_eq!(a.marker.len(), "phai_".len() + 9);
        assert_ne!(a.marker, b.marker);
    }

    #[test]
    fn test_run_guard_resets_running() {
        let state = ScanState::new();
        {
            let _guard = state.begin_run().unwrap();
            assert!(state.is_running());
            assert!(matches!(state.begin_run(), Err(PhaiError::AlreadyRunning)));
        }
        assert!(!state.is_running());
        assert!(state.begin_run().is_ok());
    }

    #[test]
    fn test_begin_run_clears_stale_stop() {
        let state = ScanState::new();
        state.request_stop();
        let _guard = state.begin_run().unwrap();
        assert!(!state.stop_requested());
    }

    #[test]
    fn test_display_order_is_newest_first() {
        let state = ScanState::new();
        for n in 1..=3 {
            state.push_record(PhotoRecord {
                sequence_number: n,
                ..Default::default()
            });
        }
        let shown: Vec<u32> = state.display_order().iter().map(|r| r.sequence_number).collect();
        assert_eq!(shown, vec![3, 2, 1]);
        state.clear_records();
        assert_eq!(state.record_count(), 0);
    }
}
