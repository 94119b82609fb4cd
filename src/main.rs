//! Headless demo: runs every configured panel through capture, recording
//! and download against the synthetic capture host.
//!
//! Usage: `capture-session [CONFIG.json] [OUTPUT_DIR]`

use anyhow::{Context, Result};
use capture_session_lib::capture::SyntheticProvider;
use capture_session_lib::recorder::SyntheticRecorderFactory;
use capture_session_lib::{
    init_tracing, AppConfig, CaptureSessionController, FileExportSink, Panel, PanelConfig,
    TracingView,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_OUTPUT_DIR: &str = "recordings";
const FRAMES: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    tracing::info!("Starting capture-session v{}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => AppConfig::load(Path::new(&path))
            .with_context(|| format!("failed to load config from {}", path))?,
        None => AppConfig::default(),
    };
    let output_dir = args
        .next()
        .map(PathBuf::from)
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    for panel in &config.panels {
        run_panel(panel, &output_dir)
            .await
            .with_context(|| format!("panel {} failed", panel.name))?;
    }

    tracing::info!("Done; recordings are in {:?}", output_dir);
    Ok(())
}

async fn run_panel(config: &PanelConfig, output_dir: &Path) -> Result<()> {
    let provider = Arc::new(SyntheticProvider::new());
    let recorders = Arc::new(SyntheticRecorderFactory::webm());
    let controller = Arc::new(CaptureSessionController::new(
        config.session.clone(),
        provider,
        recorders.clone(),
    ));
    let panel = Arc::new(Panel::new(
        config.name.clone(),
        controller,
        Arc::new(TracingView::new(config.name.clone())),
        Arc::new(FileExportSink::new(output_dir.join(&config.name))),
    ));

    if !panel.init() {
        tracing::warn!("[{}] capture is not available, skipping", config.name);
        return Ok(());
    }

    panel.on_start_clicked().await?;
    panel.on_record_clicked().await?;

    let recorder = recorders
        .last_recorder()
        .context("recorder was not created")?;
    for frame in 0..FRAMES {
        recorder.feed(format!("{}:frame-{};", config.name, frame).as_bytes());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    panel.on_record_clicked().await?;
    let path = panel.on_download_clicked()?;
    tracing::info!("[{}] saved {:?}", config.name, path);

    panel.on_stop_clicked().await;
    Ok(())
}
