pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod inputs;
pub mod scan;
pub mod state;
pub mod view;

use anyhow::Context;
use cli::{Cli, Commands};
use config::AppConfig;
use scan::{harvest, DirectorySink};
use state::AppState;
use std::sync::Arc;
use view::{CDPClient, EmbeddedView};

/// Load configuration (never overwrite an existing file on failure), then apply
/// command-line overrides and validate.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let loaded = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    let mut config = match loaded {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}. Using in-memory defaults (not saving).", e);
            AppConfig::default()
        }
    };
    cli.apply_overrides(&mut config);
    config::validate_config(&config)?;
    Ok(config)
}

/// Attach to (or launch) the browser holding the photo library.
pub async fn connect_view(config: &AppConfig) -> anyhow::Result<Arc<CDPClient>> {
    let browser = &config.browser;
    let client = if browser.launch {
        let chrome = browser.effective_chrome_path();
        tracing::info!("Launching {} on CDP port {}", chrome.display(), browser.cdp_port);
        CDPClient::launch(
            &chrome,
            browser.user_data_dir.as_deref(),
            browser.cdp_port,
            &browser.start_url,
        )
        .await
    } else {
        tracing::info!("Attaching to browser on CDP port {}", browser.cdp_port);
        CDPClient::attach(browser.cdp_port).await
    };
    let client = client.map_err(anyhow::Error::msg).context("Browser connection failed")?;
    Ok(Arc::new(client))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let view = connect_view(&config).await?;
    execute(cli.command, config, view).await
}

/// Run one command against an open view. The view is closed afterwards,
/// whether or not the command succeeded.
pub async fn execute(
    command: Commands,
    config: AppConfig,
    view: Arc<dyn EmbeddedView>,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone(), view.clone()));
    let result = dispatch(command, &config, &state).await;
    view.close().await;
    result
}

async fn dispatch(
    command: Commands,
    config: &AppConfig,
    state: &Arc<AppState>,
) -> anyhow::Result<()> {
    match command {
        Commands::Scan { .. } => {
            let stopper = state.scan.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, stopping after the current photo");
                    stopper.request_stop();
                }
            });

            let orchestrator = state.orchestrator(config.scan.clone()).await;
            let outcome = orchestrator.run().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "outcome": outcome,
                    "records": state.scan.display_order(),
                }))?
            );
        }
        Commands::Serve { .. } => {
            api::run_server(state.clone(), config.api.port, config.api.api_key.clone())
                .await
                .map_err(anyhow::Error::msg)?;
        }
        Commands::Harvest { .. } => {
            let sink = DirectorySink::new(&config.harvest.output_dir);
            let report = harvest(
                state.view.as_ref(),
                state.fetcher.as_ref(),
                &sink,
                config.harvest.jitter,
            )
            .await?;
            println!(
                "Saved {} thumbnail(s) to {} ({} failed)",
                report.saved,
                config.harvest.output_dir.display(),
                report.failed
            );
        }
    }
    Ok(())
}
