//! Slide Tracker - Main entry point
//!
//! This binary runs the slide tracker as a daemon, printing position change
//! notifications until interrupted.

use slide_tracker::{
    Config, Notification, OcrFallback, SystemWindowSource, Tracker, TrackerSession,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first so its log level applies from the start
    let config = Config::load();

    let filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting Slide Tracker");
    info!("Configuration loaded from {:?}", Config::default_config_path());

    if !config.general.enabled {
        info!("Tracking is disabled in configuration, exiting");
        return Ok(());
    }

    // The daemon ships no recognition backend; embedding hosts build one
    // with `OcrFallback::from_config` and their own engine
    let ocr: Option<OcrFallback> = None;

    let mut session = TrackerSession::new(config.clone(), Arc::new(SystemWindowSource::new()), ocr);

    // Load a document when one is given on the command line
    if let Some(path) = std::env::args().nth(1) {
        session.load(std::path::Path::new(&path))?;
        info!("Loaded presentation document {}", path);
    }

    match session.bind_to_live_window() {
        Ok(()) => info!("Bound to a live presentation window"),
        Err(e) => info!("No presentation window yet ({}), will keep looking", e),
    }

    let (tx, mut rx) = mpsc::channel::<Notification>(100);
    let tracker = Tracker::start(session, tx);

    info!(
        "Tracker running with {}s base interval",
        Duration::from_secs(config.polling.base_interval_seconds).as_secs()
    );

    loop {
        tokio::select! {
            Some(notification) = rx.recv() => {
                let position = notification.result.position;
                info!(
                    "Slide {}{} ({:?}, via {}, confidence {:.2})",
                    position.current,
                    position
                        .total
                        .map(|t| format!(" of {}", t))
                        .unwrap_or_default(),
                    position.mode,
                    notification.result.method.as_str(),
                    notification.result.confidence,
                );
                if let Some(content) = notification.content {
                    if let Some(title) = content.title {
                        info!("  Title: {}", title);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                break;
            }
        }
    }

    if tracker.stop().await.is_some() {
        info!("Tracker stopped");
    }
    Ok(())
}
