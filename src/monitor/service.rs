//! Monitor service: schedules reconciliation cycles
//!
//! Owns the [`ReconcileEngine`] on a dedicated thread and guarantees **at
//! most one concurrent cycle**. Requests arriving while a cycle is in flight
//! queue on the trigger channel and are drained into a single re-run after
//! the cycle completes - overlapping requests collapse to one extra run, not
//! one per request.
//!
//! Cycles run on demand:
//! - on a timer tick, when polling is enabled,
//! - on a process-lifecycle event (burst-refreshed on a short cadence for a
//!   few seconds after a relevant start event, to absorb launcher-induced
//!   secondary spawns),
//! - on explicit caller request (manual toggle, rule edits).
//!
//! There is no mid-cycle cancellation; shutdown stops scheduling and lets an
//! in-flight cycle finish.

use crate::config::{AppConfig, ConfigManager};
use crate::engine::reconciler::{CycleConfig, CycleSettings, ReconcileEngine};
use crate::engine::snapshot::MonitorSnapshot;
use crate::error::{HdrSyncError, Result};
use crate::hdr::DisplayBackend;
use crate::monitor::process_list::ProcessSource;
use crate::monitor::window_resolver::WindowSource;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long a burst window lasts after a relevant process event
const BURST_WINDOW: Duration = Duration::from_secs(5);

/// Cycle cadence inside a burst window
const BURST_CADENCE: Duration = Duration::from_secs(1);

/// Wait bound while idle with polling disabled
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// How long callers wait for a manual toggle acknowledgement
const MANUAL_OP_TIMEOUT: Duration = Duration::from_secs(10);

enum Request {
    /// Run one cycle soon
    Refresh,
    /// Run one cycle and keep re-running on a short cadence for a few seconds
    Burst,
    /// Manual per-display toggle outside the automatic loop
    SetDisplayHdr {
        display_id: String,
        enable: bool,
        ack: mpsc::SyncSender<Result<String>>,
    },
    /// Stop scheduling; the in-flight cycle (if any) finishes first
    Shutdown,
}

/// Handle to the monitor service thread
pub struct MonitorService {
    request_tx: mpsc::Sender<Request>,
    latest: Arc<Mutex<Option<MonitorSnapshot>>>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorService {
    /// Spawn the service thread around an engine and a shared configuration
    ///
    /// Every snapshot is retained for [`MonitorService::latest_snapshot`] and
    /// forwarded to `snapshot_tx` when provided.
    pub fn spawn<D, P, W>(
        engine: ReconcileEngine<D, P, W>,
        config: Arc<Mutex<AppConfig>>,
        snapshot_tx: Option<mpsc::Sender<MonitorSnapshot>>,
    ) -> Self
    where
        D: DisplayBackend + Send + 'static,
        P: ProcessSource + Send + 'static,
        W: WindowSource + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel();
        let latest = Arc::new(Mutex::new(None));
        let latest_for_worker = Arc::clone(&latest);

        let handle = std::thread::Builder::new()
            .name("monitor-service".to_string())
            .spawn(move || {
                ServiceWorker {
                    engine,
                    config,
                    latest: latest_for_worker,
                    snapshot_tx,
                    burst_until: None,
                }
                .run(&request_rx);
            })
            .expect("failed to spawn monitor service thread");

        Self {
            request_tx,
            latest,
            handle: Some(handle),
        }
    }

    /// Request one reconciliation cycle
    pub fn request_refresh(&self) {
        let _ = self.request_tx.send(Request::Refresh);
    }

    /// Request a cycle plus a short burst of follow-up cycles
    pub fn request_burst_refresh(&self) {
        let _ = self.request_tx.send(Request::Burst);
    }

    /// Manually toggle one display's HDR state, flipping it to manual control
    ///
    /// Runs on the service thread like every other engine operation; the
    /// follow-up cycle it schedules rebuilds the snapshot.
    pub fn set_display_hdr(&self, display_id: &str, enable: bool) -> Result<String> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        self.request_tx
            .send(Request::SetDisplayHdr {
                display_id: display_id.to_string(),
                enable,
                ack: ack_tx,
            })
            .map_err(|_| {
                HdrSyncError::WorkerUnavailable("monitor service exited".to_string())
            })?;
        ack_rx.recv_timeout(MANUAL_OP_TIMEOUT).map_err(|_| {
            HdrSyncError::WorkerUnavailable("timed out waiting for monitor service".to_string())
        })?
    }

    /// The most recent snapshot, if any cycle has completed yet
    pub fn latest_snapshot(&self) -> Option<MonitorSnapshot> {
        self.latest.lock().clone()
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        let _ = self.request_tx.send(Request::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct ServiceWorker<D, P, W> {
    engine: ReconcileEngine<D, P, W>,
    config: Arc<Mutex<AppConfig>>,
    latest: Arc<Mutex<Option<MonitorSnapshot>>>,
    snapshot_tx: Option<mpsc::Sender<MonitorSnapshot>>,
    burst_until: Option<Instant>,
}

impl<D, P, W> ServiceWorker<D, P, W>
where
    D: DisplayBackend,
    P: ProcessSource,
    W: WindowSource,
{
    fn run(mut self, request_rx: &mpsc::Receiver<Request>) {
        info!("Monitor service started");
        loop {
            let wait = self.next_wait();
            let first = match request_rx.recv_timeout(wait) {
                Ok(request) => Some(request),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            // Drain everything queued while we slept or cycled; queued
            // refresh requests coalesce into the single run below
            let mut run_cycle = first.is_none(); // timeout = poll/burst tick
            let mut shutdown = false;
            let mut manual_ops = Vec::new();

            let mut pending = first;
            loop {
                match pending.take() {
                    Some(Request::Refresh) => run_cycle = true,
                    Some(Request::Burst) => {
                        run_cycle = true;
                        self.burst_until = Some(Instant::now() + BURST_WINDOW);
                    }
                    Some(Request::SetDisplayHdr {
                        display_id,
                        enable,
                        ack,
                    }) => manual_ops.push((display_id, enable, ack)),
                    Some(Request::Shutdown) => shutdown = true,
                    None => {}
                }
                match request_rx.try_recv() {
                    Ok(request) => pending = Some(request),
                    Err(_) => break,
                }
            }

            if shutdown {
                break;
            }

            for (display_id, enable, ack) in manual_ops {
                let result = self.manual_toggle(&display_id, enable);
                let _ = ack.send(result);
                // Rebuild the snapshot so callers see the manual state
                run_cycle = true;
            }

            if run_cycle {
                self.run_cycle();
            }
        }
        info!("Monitor service exited");
    }

    /// Time to sleep before the next scheduled tick: the burst cadence when
    /// inside a burst window, else the poll interval, else (nearly) forever
    fn next_wait(&mut self) -> Duration {
        if let Some(until) = self.burst_until {
            if Instant::now() < until {
                return BURST_CADENCE;
            }
            self.burst_until = None;
        }

        let preferences = {
            let config = self.config.lock();
            config.preferences.clone()
        };
        if preferences.poll_enabled {
            Duration::from_millis(preferences.poll_interval_ms.max(100))
        } else {
            IDLE_WAIT
        }
    }

    fn manual_toggle(&mut self, display_id: &str, enable: bool) -> Result<String> {
        let mut auto_modes = {
            let config = self.config.lock();
            config.auto_modes.clone()
        };

        let result = self
            .engine
            .try_set_display_hdr(display_id, enable, &mut auto_modes);

        if result.is_ok() {
            let mut config = self.config.lock();
            config.auto_modes = auto_modes;
            let snapshot = config.clone();
            drop(config);
            if let Err(e) = ConfigManager::save(&snapshot) {
                warn!("Failed to persist auto-mode change: {e}");
            }
        }

        result
    }

    /// One reconciliation cycle against a read snapshot of the configuration
    fn run_cycle(&mut self) {
        let (rules, settings, mut ignore_map, target_overrides, auto_modes) = {
            let config = self.config.lock();
            (
                config.rules.clone(),
                CycleSettings {
                    monitor_all_fullscreen: config.preferences.monitor_all_fullscreen,
                    switch_all_displays_together: config
                        .preferences
                        .switch_all_displays_together,
                },
                config.ignore_map.clone(),
                config.target_overrides.clone(),
                config.auto_modes.clone(),
            )
        };
        let entries_before = ignore_map.len();

        let mut cycle_config = CycleConfig {
            rules: &rules,
            settings,
            ignore_map: &mut ignore_map,
            target_overrides: &target_overrides,
            auto_modes: &auto_modes,
        };

        match self.engine.evaluate(&mut cycle_config) {
            Ok(snapshot) => {
                if ignore_map.len() != entries_before {
                    self.persist_new_ignore_defaults(&ignore_map);
                }
                debug!(
                    "Cycle complete: {} processes, {} matches, {} displays",
                    snapshot.process_count,
                    snapshot.matches.len(),
                    snapshot.displays.len()
                );
                *self.latest.lock() = Some(snapshot.clone());
                if let Some(tx) = &self.snapshot_tx {
                    let _ = tx.send(snapshot);
                }
            }
            Err(e) => {
                // A failed cycle is reported and the loop keeps running;
                // the next trigger gets a fresh look at the world
                error!("Reconciliation cycle failed: {e}");
            }
        }
    }

    /// Merge newly-synthesized default-ignore entries into the shared config
    /// and persist them best-effort
    fn persist_new_ignore_defaults(&self, ignore_map: &std::collections::BTreeMap<String, bool>) {
        let snapshot = {
            let mut config = self.config.lock();
            for (key, value) in ignore_map {
                config.ignore_map.entry(key.clone()).or_insert(*value);
            }
            config.clone()
        };
        if let Err(e) = ConfigManager::save(&snapshot) {
            warn!("Failed to persist synthesized ignore entries: {e}");
        }
    }
}
