use crate::api::ws::{WsBroadcaster, WsEvent};
use crate::config::{AppConfig, ScanConfig};
use crate::inputs::load_describe_inputs;
use crate::scan::{
    DescriptionService, HttpImageFetcher, ImageFetcher, OllamaClient, Orchestrator, ScanState,
    TracingSink,
};
use crate::view::EmbeddedView;
use parking_lot::RwLock;
use std::sync::Arc;

/// Application global state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<AppConfig>>,
    /// Page the scanner drives.
    pub view: Arc<dyn EmbeddedView>,
    pub fetcher: Arc<dyn ImageFetcher>,
    /// `None` when inference is disabled.
    pub describer: Option<Arc<dyn DescriptionService>>,
    pub scan: Arc<ScanState>,
    /// WebSocket broadcaster for real-time events.
    pub ws_broadcaster: WsBroadcaster,
}

impl AppState {
    /// State with the HTTP fetcher and, if enabled, the Ollama client.
    pub fn new(config: AppConfig, view: Arc<dyn EmbeddedView>) -> Self {
        let describer: Option<Arc<dyn DescriptionService>> = if config.inference.enabled {
            Some(Arc::new(OllamaClient::new(&config.inference)))
        } else {
            None
        };
        Self::with_services(config, view, Arc::new(HttpImageFetcher::new()), describer)
    }

    pub fn with_services(
        config: AppConfig,
        view: Arc<dyn EmbeddedView>,
        fetcher: Arc<dyn ImageFetcher>,
        describer: Option<Arc<dyn DescriptionService>>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            view,
            fetcher,
            describer,
            scan: Arc::new(ScanState::new()),
            ws_broadcaster: WsBroadcaster::new(),
        }
    }

    /// Orchestrator for one run, rendering to the log and to WebSocket clients.
    /// Prompt and reference image are re-read from disk on every call.
    pub async fn orchestrator(&self, scan_config: ScanConfig) -> Orchestrator {
        let inference = self.config.read().inference.clone();
        let mut orchestrator = Orchestrator::new(
            self.view.clone(),
            self.fetcher.clone(),
            self.scan.clone(),
            scan_config,
        )
        .with_sink(Arc::new(TracingSink))
        .with_sink(Arc::new(self.ws_broadcaster.clone()));

        if let Some(describer) = &self.describer {
            let inputs = load_describe_inputs(&inference).await;
            orchestrator = orchestrator.with_describer(describer.clone(), inputs);
        }
        orchestrator
    }

    /// Broadcast a WebSocket event to all connected clients.
    pub fn broadcast_ws(&self, event: WsEvent) {
        self.ws_broadcaster.broadcast(event);
    }
}
