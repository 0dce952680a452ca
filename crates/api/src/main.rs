//! FocusForge - Main Entry Point
//!
//! Reads landmark frames as JSON lines on stdin and serves the control API.
//! Usage: `focusforge [config.toml]` (or set `FOCUSFORGE_CONFIG`).

use alerting::AlarmNotifier;
use anyhow::Context;
use api::{init_logging, open_store, run_server, AppConfig, AppState};
use landmarks::JsonLinesSource;
use metrics_exporter_prometheus::PrometheusBuilder;
use monitor::{shared_source, MonitorController, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use storage::UserProfile;
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FOCUSFORGE_CONFIG").ok())
        .map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    init_logging(&config.logging);

    info!("=== FocusForge Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let store = open_store(&config.storage).context("Failed to open user store")?;
    let user_id = config.monitor.user_id.clone();
    let profile = UserProfile {
        name: user_id.clone(),
        age: String::new(),
    };
    if store.register_user(&user_id, profile)? {
        info!("Registered new user {}", user_id);
    }

    let alerts = Arc::new(AlarmNotifier::terminal(config.alarm));
    let source = shared_source(JsonLinesSource::new(BufReader::new(tokio::io::stdin())));
    let controller = MonitorController::new(
        config.monitor.clone(),
        store,
        alerts,
        source,
        Arc::new(SystemClock),
    )?;

    let state = Arc::new(AppState::new(Arc::new(controller), Some(metrics)));
    run_server(&config.server.bind, state).await?;

    Ok(())
}
