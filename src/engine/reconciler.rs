//! Per-cycle reconciliation engine
//!
//! Pulls the live process list and window map, applies the rule matcher and
//! ignore/override resolution, computes a desired HDR boolean per display,
//! diffs it against the observed state, and invokes the native toggle where
//! they differ. Each cycle produces an immutable [`MonitorSnapshot`].
//!
//! The only state the engine keeps across cycles is the set of process ids
//! that ever had a resolved window while matched. When such a process loses
//! its window but stays alive, its contribution is suspended ("exiting")
//! instead of falling back to the primary display - a process that
//! legitimately lost its window (minimized to tray, between scene loads)
//! must not redirect HDR system-wide. The set is pruned against the live
//! pid set every cycle.
//!
//! Failure isolation: a single process, display, or rule failing never
//! aborts the cycle. Native toggle failures become the display's
//! `last_action` text; processes that vanished mid-inspection are skipped.

use crate::config::{ALL_DISPLAYS_TARGET, WatchRule};
use crate::engine::matcher::{RuleMatcher, candidate_strings};
use crate::engine::overrides::{resolve_ignore, resolve_override};
use crate::engine::snapshot::{
    DisplayInfo, DisplayResolution, FullscreenProcess, MatchResult, MonitorSnapshot,
    ProcessIdentity, ResolvedWindow,
};
use crate::error::Result;
use crate::hdr::DisplayBackend;
use crate::monitor::process_list::ProcessSource;
use crate::monitor::window_resolver::{WindowSource, resolve_windows};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Global toggles read once per cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleSettings {
    /// Any non-ignored fullscreen process contributes its display
    pub monitor_all_fullscreen: bool,
    /// One contribution switches every HDR-capable display
    pub switch_all_displays_together: bool,
}

/// Caller-supplied configuration for one cycle (read-only snapshot
/// semantics, except the ignore map which receives newly-synthesized
/// default entries)
pub struct CycleConfig<'a> {
    /// Watch rules in declared order
    pub rules: &'a [WatchRule],
    /// Global toggles
    pub settings: CycleSettings,
    /// Ignore entries; default-ignore decisions are recorded back into it
    pub ignore_map: &'a mut BTreeMap<String, bool>,
    /// Target-display overrides
    pub target_overrides: &'a BTreeMap<String, String>,
    /// Per-display auto-mode flags (absent means automatic)
    pub auto_modes: &'a BTreeMap<String, bool>,
}

/// The reconciliation engine
///
/// Generic over its three native collaborators so tests can substitute
/// fixtures; production wires the Win32 implementations.
pub struct ReconcileEngine<D, P, W> {
    displays: D,
    processes: P,
    windows: W,
    matcher: RuleMatcher,
    /// Pids that ever had a resolved window while matched; pruned against
    /// the live pid set each cycle
    seen_window_pids: HashSet<u32>,
}

impl<D: DisplayBackend, P: ProcessSource, W: WindowSource> ReconcileEngine<D, P, W> {
    /// Create an engine over the given collaborators
    pub fn new(displays: D, processes: P, windows: W) -> Self {
        Self {
            displays,
            processes,
            windows,
            matcher: RuleMatcher::new(),
            seen_window_pids: HashSet::new(),
        }
    }

    /// Run one reconciliation cycle
    ///
    /// Running twice with no external change yields an identical snapshot
    /// (aside from the timestamp) and issues no further native toggles.
    pub fn evaluate(&mut self, config: &mut CycleConfig<'_>) -> Result<MonitorSnapshot> {
        let processes = self.processes.list_processes()?;
        let windows = resolve_windows(self.windows.enumerate_visible_windows()?);
        let mut displays = self.displays.list_displays()?;
        displays.sort_by(|a, b| a.display_id.cmp(&b.display_id));

        let live_pids: HashSet<u32> = processes.iter().map(|p| p.pid).collect();
        self.seen_window_pids.retain(|pid| live_pids.contains(pid));

        let display_ids: BTreeSet<String> =
            displays.iter().map(|d| d.display_id.clone()).collect();
        let primary = displays
            .iter()
            .find(|d| d.is_primary)
            .map(|d| d.display_id.clone());

        let (matches, force_all) =
            self.match_processes(&processes, &windows, config, &display_ids, primary.as_deref());

        let matched_pids: HashSet<u32> = matches.iter().map(|m| m.pid).collect();
        let mut matched_displays: BTreeSet<String> = matches
            .iter()
            .filter_map(|m| m.resolution.contributed_display().map(str::to_string))
            .collect();

        let fullscreen = collect_fullscreen(
            &processes,
            &windows,
            &matched_pids,
            config,
            &mut matched_displays,
        );

        let any_contribution = force_all || !matched_displays.is_empty();

        let display_infos = self.apply_displays(
            displays,
            &matched_displays,
            force_all,
            any_contribution,
            config,
        );

        let mut matches = matches;
        matches.sort_by(|a, b| {
            a.process_name
                .cmp(&b.process_name)
                .then(a.pid.cmp(&b.pid))
        });
        let mut fullscreen = fullscreen;
        fullscreen.sort_by(|a, b| a.name.cmp(&b.name).then(a.pid.cmp(&b.pid)));

        Ok(MonitorSnapshot {
            taken_at: SystemTime::now(),
            process_count: processes.len(),
            matches,
            fullscreen,
            displays: display_infos,
        })
    }

    /// Manually toggle one display outside the automatic loop
    ///
    /// Flips the display's auto mode to manual as a side effect, so the next
    /// cycles leave it alone. Returns the human-readable outcome.
    pub fn try_set_display_hdr(
        &mut self,
        display_id: &str,
        enable: bool,
        auto_modes: &mut BTreeMap<String, bool>,
    ) -> Result<String> {
        let displays = self.displays.list_displays()?;
        let display = displays
            .iter()
            .find(|d| d.display_id == display_id)
            .ok_or_else(|| crate::error::HdrSyncError::UnknownDisplay(display_id.to_string()))?;
        if !display.hdr_supported {
            return Err(crate::error::HdrSyncError::HdrNotSupported);
        }

        auto_modes.insert(display_id.to_string(), false);
        info!("Manual HDR {} requested for {display_id}", on_off(enable));

        self.displays.set_hdr(display_id, enable)?;
        Ok(format!("HDR {} (manual)", on_off_past(enable)))
    }

    /// First-match-wins rule evaluation over every live process
    fn match_processes(
        &mut self,
        processes: &[ProcessIdentity],
        windows: &HashMap<u32, ResolvedWindow>,
        config: &CycleConfig<'_>,
        display_ids: &BTreeSet<String>,
        primary: Option<&str>,
    ) -> (Vec<MatchResult>, bool) {
        let mut matches = Vec::new();
        let mut force_all = false;

        for process in processes {
            let candidates = candidate_strings(process);

            let hit = config.rules.iter().enumerate().find_map(|(index, rule)| {
                candidates
                    .iter()
                    .find(|candidate| self.matcher.is_match(candidate, rule))
                    .map(|candidate| (index, rule, candidate.clone()))
            });
            let Some((rule_index, rule, matched_candidate)) = hit else {
                continue;
            };

            // Overrides steer target-display selection only; they never
            // decide whether a process counts as matched
            let override_target = resolve_override(
                &process.bare_name(),
                process.exe_path.as_deref(),
                config.target_overrides,
            )
            .map(|(_, target)| target);
            let effective_target = override_target.or_else(|| rule.target_display.clone());

            if windows.contains_key(&process.pid) {
                self.seen_window_pids.insert(process.pid);
            }

            let default_resolution = self.default_resolution(process.pid, windows, primary);
            let resolution = match &effective_target {
                Some(target) if target == ALL_DISPLAYS_TARGET => {
                    force_all = true;
                    DisplayResolution::AllDisplays
                }
                Some(target) if display_ids.contains(target) => {
                    DisplayResolution::Display(target.clone())
                }
                Some(target) => {
                    debug!(
                        "Target display '{target}' for {} is not enumerable, degrading",
                        process.name
                    );
                    DisplayResolution::Degraded {
                        requested: target.clone(),
                        fallback: Box::new(default_resolution),
                    }
                }
                None => default_resolution,
            };

            matches.push(MatchResult {
                pid: process.pid,
                process_name: process.name.clone(),
                rule_index,
                matched_candidate,
                mode: RuleMatcher::mode_of(rule),
                effective_target,
                resolution,
                fullscreen_like: windows
                    .get(&process.pid)
                    .is_some_and(|w| w.fullscreen_like),
            });
        }

        (matches, force_all)
    }

    /// Default target resolution when no explicit target governs: the
    /// window's display, the exiting suspension, or the primary fallback
    fn default_resolution(
        &self,
        pid: u32,
        windows: &HashMap<u32, ResolvedWindow>,
        primary: Option<&str>,
    ) -> DisplayResolution {
        if let Some(window) = windows.get(&pid) {
            DisplayResolution::Display(window.display_id.clone())
        } else if self.seen_window_pids.contains(&pid) {
            DisplayResolution::Exiting
        } else if let Some(primary) = primary {
            DisplayResolution::PrimaryFallback(primary.to_string())
        } else {
            DisplayResolution::Unresolved
        }
    }

    /// Compute desired state per display, toggle mismatches, and build the
    /// per-display report
    fn apply_displays(
        &mut self,
        displays: Vec<crate::hdr::DisplayState>,
        matched_displays: &BTreeSet<String>,
        force_all: bool,
        any_contribution: bool,
        config: &CycleConfig<'_>,
    ) -> Vec<DisplayInfo> {
        let mut infos = Vec::with_capacity(displays.len());

        // Display-id sort order was established by the caller
        for display in displays {
            let auto_mode = config
                .auto_modes
                .get(&display.display_id)
                .copied()
                .unwrap_or(true);

            let desired = if !display.hdr_supported {
                false
            } else if !auto_mode {
                // Manual control pins the desired state to whatever the
                // user last set
                display.hdr_enabled
            } else {
                force_all
                    || (config.settings.switch_all_displays_together && any_contribution)
                    || matched_displays.contains(&display.display_id)
            };

            let (hdr_enabled, last_action) = if !display.hdr_supported {
                (display.hdr_enabled, "HDR unsupported".to_string())
            } else if !auto_mode {
                (display.hdr_enabled, "Manual control".to_string())
            } else if desired != display.hdr_enabled {
                let display_id = &display.display_id;
                match self.displays.set_hdr(display_id, desired) {
                    Ok(()) => {
                        info!(
                            "HDR {} on {}",
                            on_off_past(desired),
                            display_id
                        );
                        (desired, format!("HDR {}", on_off_past(desired)))
                    }
                    Err(e) => {
                        warn!(
                            "Failed to turn HDR {} on {}: {e}",
                            on_off(desired),
                            display_id
                        );
                        (
                            display.hdr_enabled,
                            format!("HDR {} failed: {e}", on_off(desired)),
                        )
                    }
                }
            } else {
                (
                    display.hdr_enabled,
                    format!("HDR {}", on_off_past(display.hdr_enabled)),
                )
            };

            infos.push(DisplayInfo {
                display_id: display.display_id,
                friendly_name: display.friendly_name,
                is_primary: display.is_primary,
                hdr_supported: display.hdr_supported,
                hdr_enabled,
                desired_hdr: desired,
                auto_mode,
                last_action,
            });
        }

        infos
    }
}

/// Summarize fullscreen-like processes and add the counted ones to the
/// desired set; records synthesized default-ignore entries into the map
fn collect_fullscreen(
    processes: &[ProcessIdentity],
    windows: &HashMap<u32, ResolvedWindow>,
    matched_pids: &HashSet<u32>,
    config: &mut CycleConfig<'_>,
    matched_displays: &mut BTreeSet<String>,
) -> Vec<FullscreenProcess> {
    let by_pid: HashMap<u32, &ProcessIdentity> =
        processes.iter().map(|p| (p.pid, p)).collect();
    let mut fullscreen = Vec::new();

    for (pid, window) in windows {
        if !window.fullscreen_like || matched_pids.contains(pid) {
            continue;
        }
        // Windows whose owner vanished from the process list are stale
        let Some(process) = by_pid.get(pid) else {
            continue;
        };

        let resolution = resolve_ignore(
            &process.bare_name(),
            process.exe_path.as_deref(),
            config.ignore_map,
        );
        if resolution.default_applied {
            if let Some(key) = &resolution.key {
                // Make the synthesized default visible and editable afterward
                config.ignore_map.insert(key.clone(), resolution.ignored);
                debug!("Recorded default ignore entry {key}");
            }
        }

        let counted = config.settings.monitor_all_fullscreen && !resolution.ignored;
        if counted {
            matched_displays.insert(window.display_id.clone());
        }

        fullscreen.push(FullscreenProcess {
            pid: *pid,
            name: process.name.clone(),
            display_id: window.display_id.clone(),
            ignored: resolution.ignored,
            ignore_key: resolution.key,
            counted,
        });
    }

    fullscreen
}

fn on_off(enable: bool) -> &'static str {
    if enable { "on" } else { "off" }
}

fn on_off_past(enable: bool) -> &'static str {
    if enable { "enabled" } else { "disabled" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::snapshot::Rect;
    use crate::hdr::DisplayState;
    use crate::monitor::window_resolver::RawWindow;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Display backend fixture that applies toggles to its own state and
    /// records every call
    #[derive(Clone)]
    pub(crate) struct FakeDisplays {
        pub displays: Arc<Mutex<Vec<DisplayState>>>,
        pub set_calls: Arc<Mutex<Vec<(String, bool)>>>,
        pub fail_set: Arc<Mutex<bool>>,
    }

    impl FakeDisplays {
        pub fn new(displays: Vec<DisplayState>) -> Self {
            Self {
                displays: Arc::new(Mutex::new(displays)),
                set_calls: Arc::new(Mutex::new(Vec::new())),
                fail_set: Arc::new(Mutex::new(false)),
            }
        }
    }

    impl DisplayBackend for FakeDisplays {
        fn list_displays(&mut self) -> Result<Vec<DisplayState>> {
            Ok(self.displays.lock().clone())
        }

        fn set_hdr(&mut self, display_id: &str, enable: bool) -> Result<()> {
            self.set_calls
                .lock()
                .push((display_id.to_string(), enable));
            if *self.fail_set.lock() {
                return Err(crate::error::HdrSyncError::HdrControlFailed(
                    crate::error::StringError::new("driver rejected the request"),
                ));
            }
            let mut displays = self.displays.lock();
            if let Some(d) = displays.iter_mut().find(|d| d.display_id == display_id) {
                d.hdr_enabled = enable;
            }
            Ok(())
        }
    }

    #[derive(Clone)]
    pub(crate) struct FakeProcesses(pub Arc<Mutex<Vec<ProcessIdentity>>>);

    impl ProcessSource for FakeProcesses {
        fn list_processes(&mut self) -> Result<Vec<ProcessIdentity>> {
            Ok(self.0.lock().clone())
        }
    }

    #[derive(Clone)]
    pub(crate) struct FakeWindows(pub Arc<Mutex<Vec<RawWindow>>>);

    impl WindowSource for FakeWindows {
        fn enumerate_visible_windows(&mut self) -> Result<Vec<RawWindow>> {
            Ok(self.0.lock().clone())
        }
    }

    pub(crate) fn display(id: &str, primary: bool, supported: bool, enabled: bool) -> DisplayState {
        DisplayState {
            display_id: id.to_string(),
            friendly_name: format!("Monitor {id}"),
            is_primary: primary,
            hdr_supported: supported,
            hdr_enabled: enabled,
        }
    }

    pub(crate) fn process(pid: u32, name: &str) -> ProcessIdentity {
        ProcessIdentity {
            pid,
            name: name.to_string(),
            exe_path: None,
        }
    }

    pub(crate) fn fullscreen_window(pid: u32, display: &str) -> RawWindow {
        let bounds = Rect {
            left: 0,
            top: 0,
            right: 2560,
            bottom: 1440,
        };
        RawWindow {
            pid,
            display_id: display.to_string(),
            bounds,
            monitor_bounds: bounds,
            has_chrome: false,
            foreground: false,
        }
    }

    fn engine_with(
        displays: &FakeDisplays,
        processes: &FakeProcesses,
        windows: &FakeWindows,
    ) -> ReconcileEngine<FakeDisplays, FakeProcesses, FakeWindows> {
        ReconcileEngine::new(displays.clone(), processes.clone(), windows.clone())
    }

    struct Maps {
        ignore: BTreeMap<String, bool>,
        overrides: BTreeMap<String, String>,
        auto: BTreeMap<String, bool>,
    }

    impl Maps {
        fn new() -> Self {
            Self {
                ignore: BTreeMap::new(),
                overrides: BTreeMap::new(),
                auto: BTreeMap::new(),
            }
        }

        fn config<'a>(
            &'a mut self,
            rules: &'a [WatchRule],
            settings: CycleSettings,
        ) -> CycleConfig<'a> {
            CycleConfig {
                rules,
                settings,
                ignore_map: &mut self.ignore,
                target_overrides: &self.overrides,
                auto_modes: &self.auto,
            }
        }
    }

    #[test]
    fn test_match_on_fullscreen_display_enables_hdr() {
        let displays = FakeDisplays::new(vec![
            display("\\\\.\\DISPLAY1", true, true, false),
            display("\\\\.\\DISPLAY2", false, true, false),
        ]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "eldenring.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY2",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![WatchRule::new("eldenring")];
        let mut maps = Maps::new();
        let mut config = maps.config(&rules, CycleSettings::default());

        let snapshot = engine.evaluate(&mut config).unwrap();

        assert_eq!(snapshot.matches.len(), 1);
        assert_eq!(snapshot.matches[0].pid, 100);
        assert_eq!(snapshot.matches[0].rule_index, 0);
        assert!(snapshot.matches[0].fullscreen_like);

        let d2 = &snapshot.displays[1];
        assert_eq!(d2.display_id, "\\\\.\\DISPLAY2");
        assert!(d2.desired_hdr);
        assert!(d2.hdr_enabled);
        assert_eq!(d2.last_action, "HDR enabled");

        let d1 = &snapshot.displays[0];
        assert!(!d1.desired_hdr);
        assert!(!d1.hdr_enabled);

        assert_eq!(
            displays.set_calls.lock().as_slice(),
            [("\\\\.\\DISPLAY2".to_string(), true)]
        );
    }

    #[test]
    fn test_idempotent_reconciliation() {
        let displays = FakeDisplays::new(vec![display("\\\\.\\DISPLAY1", true, true, false)]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY1",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![WatchRule::new("game")];
        let mut maps = Maps::new();

        let first = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();
        let second = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        assert!(first.same_state(&second));
        // One toggle total; the second cycle found no mismatch
        assert_eq!(displays.set_calls.lock().len(), 1);
    }

    #[test]
    fn test_first_match_wins() {
        let displays = FakeDisplays::new(vec![display("\\\\.\\DISPLAY1", true, true, false)]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![WatchRule::new("game"), WatchRule::new("game.exe")];
        let mut maps = Maps::new();
        let snapshot = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        assert_eq!(snapshot.matches.len(), 1);
        assert_eq!(snapshot.matches[0].rule_index, 0);
    }

    #[test]
    fn test_auto_mode_freeze() {
        let displays = FakeDisplays::new(vec![display("\\\\.\\DISPLAY1", true, true, false)]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY1",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![WatchRule::new("game")];
        let mut maps = Maps::new();
        maps.auto.insert("\\\\.\\DISPLAY1".to_string(), false);

        let snapshot = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        let d = &snapshot.displays[0];
        // Desired is pinned to the observed value; no toggle happens
        assert!(!d.desired_hdr);
        assert!(!d.auto_mode);
        assert_eq!(d.last_action, "Manual control");
        assert!(displays.set_calls.lock().is_empty());
    }

    #[test]
    fn test_switch_all_displays_together() {
        let displays = FakeDisplays::new(vec![
            display("\\\\.\\DISPLAY1", true, true, true),
            display("\\\\.\\DISPLAY2", false, true, false),
        ]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY1",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![WatchRule::new("game")];
        let settings = CycleSettings {
            switch_all_displays_together: true,
            ..CycleSettings::default()
        };
        let mut maps = Maps::new();
        let snapshot = engine.evaluate(&mut maps.config(&rules, settings)).unwrap();

        assert!(snapshot.displays.iter().all(|d| d.desired_hdr));
        // D1 was already on; only D2 receives a call
        assert_eq!(
            displays.set_calls.lock().as_slice(),
            [("\\\\.\\DISPLAY2".to_string(), true)]
        );
    }

    #[test]
    fn test_exiting_suspension() {
        let displays = FakeDisplays::new(vec![
            display("\\\\.\\DISPLAY1", true, true, false),
            display("\\\\.\\DISPLAY2", false, true, false),
        ]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY2",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![WatchRule::new("game")];
        let mut maps = Maps::new();

        let first = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();
        assert!(first.displays[1].desired_hdr);

        // The window disappears while the process stays alive: the match
        // must suspend, not fall back to the primary display
        windows.0.lock().clear();
        let second = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        assert_eq!(second.matches[0].resolution, DisplayResolution::Exiting);
        assert!(!second.displays[0].desired_hdr, "primary must not light up");
        assert!(!second.displays[1].desired_hdr);
        // HDR on D2 is reconciled back off
        assert!(!second.displays[1].hdr_enabled);
    }

    #[test]
    fn test_exiting_memory_pruned_when_pid_dies() {
        let displays = FakeDisplays::new(vec![display("\\\\.\\DISPLAY1", true, true, false)]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY1",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![WatchRule::new("game")];
        let mut maps = Maps::new();
        engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();
        assert!(engine.seen_window_pids.contains(&100));

        processes.0.lock().clear();
        windows.0.lock().clear();
        engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();
        assert!(engine.seen_window_pids.is_empty());
    }

    #[test]
    fn test_windowless_match_falls_back_to_primary() {
        let displays = FakeDisplays::new(vec![
            display("\\\\.\\DISPLAY1", true, true, false),
            display("\\\\.\\DISPLAY2", false, true, false),
        ]);
        // Never had a window: primary fallback, not exiting
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![WatchRule::new("game")];
        let mut maps = Maps::new();
        let snapshot = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        assert_eq!(
            snapshot.matches[0].resolution,
            DisplayResolution::PrimaryFallback("\\\\.\\DISPLAY1".to_string())
        );
        assert!(snapshot.displays[0].desired_hdr);
    }

    #[test]
    fn test_override_steers_target_but_not_matchedness() {
        let displays = FakeDisplays::new(vec![
            display("\\\\.\\DISPLAY1", true, true, false),
            display("\\\\.\\DISPLAY2", false, true, false),
        ]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY1",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let mut rule = WatchRule::new("game");
        rule.target_display = Some("\\\\.\\DISPLAY1".to_string());
        let rules = vec![rule];
        let mut maps = Maps::new();
        maps.overrides
            .insert("name:game".to_string(), "\\\\.\\DISPLAY2".to_string());

        let snapshot = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        // Still matched by rule 0; the override only moved the target
        assert_eq!(snapshot.matches[0].rule_index, 0);
        assert_eq!(
            snapshot.matches[0].resolution,
            DisplayResolution::Display("\\\\.\\DISPLAY2".to_string())
        );
        assert!(snapshot.displays[1].desired_hdr);
        assert!(!snapshot.displays[0].desired_hdr);
    }

    #[test]
    fn test_all_displays_sentinel_forces_all() {
        let displays = FakeDisplays::new(vec![
            display("\\\\.\\DISPLAY1", true, true, false),
            display("\\\\.\\DISPLAY2", false, true, false),
            display("\\\\.\\DISPLAY3", false, false, false),
        ]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let mut rule = WatchRule::new("game");
        rule.target_display = Some(ALL_DISPLAYS_TARGET.to_string());
        let rules = vec![rule];
        let mut maps = Maps::new();
        let snapshot = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        assert_eq!(snapshot.matches[0].resolution, DisplayResolution::AllDisplays);
        assert!(snapshot.displays[0].desired_hdr);
        assert!(snapshot.displays[1].desired_hdr);
        // Unsupported display stays excluded
        assert!(!snapshot.displays[2].desired_hdr);
        assert_eq!(snapshot.displays[2].last_action, "HDR unsupported");
    }

    #[test]
    fn test_missing_target_display_degrades() {
        let displays = FakeDisplays::new(vec![display("\\\\.\\DISPLAY1", true, true, false)]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY1",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let mut rule = WatchRule::new("game");
        rule.target_display = Some("\\\\.\\DISPLAY9".to_string());
        let rules = vec![rule];
        let mut maps = Maps::new();
        let snapshot = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        match &snapshot.matches[0].resolution {
            DisplayResolution::Degraded {
                requested,
                fallback,
            } => {
                assert_eq!(requested, "\\\\.\\DISPLAY9");
                assert_eq!(
                    **fallback,
                    DisplayResolution::Display("\\\\.\\DISPLAY1".to_string())
                );
            }
            other => panic!("expected degraded resolution, got {other:?}"),
        }
        assert!(snapshot.displays[0].desired_hdr);
    }

    #[test]
    fn test_fullscreen_contribution_respects_ignore() {
        let displays = FakeDisplays::new(vec![display("\\\\.\\DISPLAY1", true, true, false)]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![
            process(100, "randomgame.exe"),
            process(200, "chrome.exe"),
        ])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![
            fullscreen_window(100, "\\\\.\\DISPLAY1"),
            fullscreen_window(200, "\\\\.\\DISPLAY1"),
        ])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![];
        let settings = CycleSettings {
            monitor_all_fullscreen: true,
            ..CycleSettings::default()
        };
        let mut maps = Maps::new();
        let snapshot = engine.evaluate(&mut maps.config(&rules, settings)).unwrap();

        assert_eq!(snapshot.fullscreen.len(), 2);
        let chrome = snapshot
            .fullscreen
            .iter()
            .find(|f| f.name == "chrome.exe")
            .unwrap();
        assert!(chrome.ignored);
        assert!(!chrome.counted);
        let game = snapshot
            .fullscreen
            .iter()
            .find(|f| f.name == "randomgame.exe")
            .unwrap();
        assert!(!game.ignored);
        assert!(game.counted);

        // The default chrome ignore was synthesized and recorded back
        assert_eq!(maps.ignore.get("name:chrome"), Some(&true));
        assert!(snapshot.displays[0].desired_hdr);
    }

    #[test]
    fn test_fullscreen_not_counted_when_feature_off() {
        let displays = FakeDisplays::new(vec![display("\\\\.\\DISPLAY1", true, true, false)]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "randomgame.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY1",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![];
        let mut maps = Maps::new();
        let snapshot = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        // Reported, but not counted toward desired state
        assert_eq!(snapshot.fullscreen.len(), 1);
        assert!(!snapshot.fullscreen[0].counted);
        assert!(!snapshot.displays[0].desired_hdr);
        assert!(displays.set_calls.lock().is_empty());
    }

    #[test]
    fn test_set_failure_is_isolated_to_the_display() {
        let displays = FakeDisplays::new(vec![
            display("\\\\.\\DISPLAY1", true, true, false),
            display("\\\\.\\DISPLAY2", false, true, false),
        ]);
        *displays.fail_set.lock() = true;
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![process(100, "game.exe")])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![fullscreen_window(
            100,
            "\\\\.\\DISPLAY1",
        )])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let rules = vec![WatchRule::new("game")];
        let mut maps = Maps::new();
        let snapshot = engine
            .evaluate(&mut maps.config(&rules, CycleSettings::default()))
            .unwrap();

        let d1 = &snapshot.displays[0];
        assert!(d1.desired_hdr);
        assert!(!d1.hdr_enabled);
        assert!(d1.last_action.starts_with("HDR on failed"));
        // The other display was still processed
        assert_eq!(snapshot.displays.len(), 2);
    }

    #[test]
    fn test_manual_toggle_flips_auto_mode() {
        let displays = FakeDisplays::new(vec![display("\\\\.\\DISPLAY1", true, true, false)]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let mut auto_modes = BTreeMap::new();
        let action = engine
            .try_set_display_hdr("\\\\.\\DISPLAY1", true, &mut auto_modes)
            .unwrap();
        assert_eq!(action, "HDR enabled (manual)");
        assert_eq!(auto_modes.get("\\\\.\\DISPLAY1"), Some(&false));

        let err = engine
            .try_set_display_hdr("\\\\.\\DISPLAY9", true, &mut auto_modes)
            .unwrap_err();
        assert!(matches!(err, crate::error::HdrSyncError::UnknownDisplay(_)));
    }

    #[test]
    fn test_unsupported_display_rejects_manual_toggle() {
        let displays = FakeDisplays::new(vec![display("\\\\.\\DISPLAY1", true, false, false)]);
        let processes = FakeProcesses(Arc::new(Mutex::new(vec![])));
        let windows = FakeWindows(Arc::new(Mutex::new(vec![])));
        let mut engine = engine_with(&displays, &processes, &windows);

        let mut auto_modes = BTreeMap::new();
        let err = engine
            .try_set_display_hdr("\\\\.\\DISPLAY1", true, &mut auto_modes)
            .unwrap_err();
        assert!(matches!(err, crate::error::HdrSyncError::HdrNotSupported));
    }
}
