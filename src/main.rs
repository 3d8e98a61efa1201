//! `HdrSync` - Rule-driven automatic HDR management for Windows
//!
//! Headless monitoring service: loads the configuration, subscribes to
//! process lifecycle events, and keeps per-display HDR state reconciled
//! with the configured rules. Requires Windows 10 21H2+ (build 19044+).

use anyhow::{Context, Result};
use hdrsync::utils;
use tracing::info;

/// Main entry point for the application
///
/// Performs initialization including logging, single-instance enforcement,
/// and multi-threaded component startup.
fn main() -> Result<()> {
    utils::init_logging().context("Failed to initialize logging system")?;

    info!("HdrSync v{} starting...", env!("CARGO_PKG_VERSION"));

    // Enforce single instance early: two instances would toggle HDR against
    // each other
    let _single_instance_guard =
        utils::SingleInstanceGuard::new().context("Another instance check failed")?;

    run()
}

#[cfg(windows)]
fn run() -> Result<()> {
    use hdrsync::config::ConfigManager;
    use hdrsync::engine::ReconcileEngine;
    use hdrsync::engine::matcher::{RuleMatcher, candidate_strings_for_name};
    use hdrsync::hdr::HdrController;
    use hdrsync::monitor::{
        EventKind, MonitorService, ProcessEventWatcher, ToolhelpProcessSource, WatcherOptions,
        Win32WindowSource, WmiStreamFactory,
    };
    use parking_lot::Mutex;
    use std::sync::{Arc, mpsc};
    use tracing::{debug, warn};

    let config = ConfigManager::load().context("Failed to load configuration")?;
    info!(
        "Loaded {} rule(s), {} ignore entrie(s), {} override(s)",
        config.rules.len(),
        config.ignore_map.len(),
        config.target_overrides.len()
    );
    let config = Arc::new(Mutex::new(config));

    let hdr_controller = HdrController::new().context("Failed to initialize HDR controller")?;
    let engine = ReconcileEngine::new(
        hdr_controller,
        ToolhelpProcessSource::new(),
        Win32WindowSource::new(),
    );

    let (snapshot_tx, snapshot_rx) = mpsc::channel();
    let service = Arc::new(MonitorService::spawn(
        engine,
        Arc::clone(&config),
        Some(snapshot_tx),
    ));

    let (event_tx, event_rx) = mpsc::channel();
    let watcher =
        ProcessEventWatcher::spawn(WmiStreamFactory::new(), event_tx, WatcherOptions::default());
    match watcher.start() {
        Ok(state) => info!("Process event subscription active: {state:?}"),
        Err(e) => warn!("Process events unavailable, relying on periodic polling: {e}"),
    }

    // Event pump: every lifecycle event triggers a cycle; a start event whose
    // name matches an enabled rule gets a burst to absorb launcher-induced
    // secondary spawns
    {
        let service = Arc::clone(&service);
        let config = Arc::clone(&config);
        std::thread::Builder::new()
            .name("event-pump".to_string())
            .spawn(move || {
                let matcher = RuleMatcher::new();
                for event in event_rx {
                    let relevant = event.kind == EventKind::Started && {
                        let config = config.lock();
                        let candidates = candidate_strings_for_name(&event.name);
                        config.rules.iter().any(|rule| {
                            candidates.iter().any(|c| matcher.is_match(c, rule))
                        })
                    };
                    if relevant {
                        service.request_burst_refresh();
                    } else {
                        service.request_refresh();
                    }
                }
            })
            .context("Failed to spawn event pump thread")?;
    }

    // Initial cycle so the first snapshot doesn't wait for the poll timer
    service.request_refresh();

    // The main thread consumes snapshots for the process lifetime
    for snapshot in snapshot_rx {
        debug!(
            "Snapshot: {} processes, {} match(es), {} fullscreen, {} display(s)",
            snapshot.process_count,
            snapshot.matches.len(),
            snapshot.fullscreen.len(),
            snapshot.displays.len()
        );
    }

    watcher.stop();
    Ok(())
}

#[cfg(not(windows))]
fn run() -> Result<()> {
    anyhow::bail!("HdrSync only supports Windows")
}
