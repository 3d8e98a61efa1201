//! Cycle result data model
//!
//! The types in this module describe everything one reconciliation cycle
//! observed and decided. A [`MonitorSnapshot`] is produced fresh every cycle
//! and consumed read-only by any caller; nothing in it is retained by the
//! engine across cycles.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Identity of one live process, derived fresh every cycle
///
/// Process ids may be reused by the OS, so an identity is never trusted
/// across cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    /// Process id
    pub pid: u32,
    /// Executable file name as reported by the OS (e.g. "eldenring.exe")
    pub name: String,
    /// Full executable path, when the process could be opened for query
    pub exe_path: Option<PathBuf>,
}

impl ProcessIdentity {
    /// Lowercase file name without extension (e.g. "eldenring")
    pub fn bare_name(&self) -> String {
        strip_extension(&self.name).to_ascii_lowercase()
    }
}

/// Remove the trailing extension from an executable file name
pub(crate) fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

/// Which matching branch of a rule fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Case-insensitive regular expression
    Regex,
    /// Whole-string equality
    Exact,
    /// Substring containment
    Contains,
    /// Anchored `*` wildcard
    Wildcard,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Regex => "regex",
            Self::Exact => "exact",
            Self::Contains => "contains",
            Self::Wildcard => "wildcard",
        };
        f.write_str(s)
    }
}

/// Axis-aligned rectangle in virtual-screen coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    /// Left edge
    pub left: i32,
    /// Top edge
    pub top: i32,
    /// Right edge (exclusive)
    pub right: i32,
    /// Bottom edge (exclusive)
    pub bottom: i32,
}

impl Rect {
    /// Area in pixels; zero for empty or inverted rectangles
    pub fn area(&self) -> i64 {
        let w = i64::from(self.right) - i64::from(self.left);
        let h = i64::from(self.bottom) - i64::from(self.top);
        if w <= 0 || h <= 0 { 0 } else { w * h }
    }

    /// True when every edge of `self` is within `tolerance` pixels of `other`
    pub fn matches_within(&self, other: &Rect, tolerance: i32) -> bool {
        (self.left - other.left).abs() <= tolerance
            && (self.top - other.top).abs() <= tolerance
            && (self.right - other.right).abs() <= tolerance
            && (self.bottom - other.bottom).abs() <= tolerance
    }
}

/// The single best window chosen for a process id this cycle
///
/// Priority when a pid owns several windows: foreground beats fullscreen-like
/// beats larger area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWindow {
    /// Owning process id
    pub pid: u32,
    /// Stable identifier of the display the window is on
    pub display_id: String,
    /// Fullscreen-likeness heuristic result
    pub fullscreen_like: bool,
    /// Window area in pixels
    pub area: i64,
    /// Whether this is the foreground window
    pub foreground: bool,
}

/// How a matched process's target display was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayResolution {
    /// Resolved to a specific display
    Display(String),
    /// The all-displays sentinel was in effect
    AllDisplays,
    /// No window resolved; fell back to the primary display
    PrimaryFallback(String),
    /// The process previously had a window and lost it while still alive;
    /// its contribution is suspended until a window reappears
    Exiting,
    /// No window, no primary display known
    Unresolved,
    /// A named target display was not enumerable; fell back to default
    /// resolution
    Degraded {
        /// The display that was requested but not found
        requested: String,
        /// The default resolution used instead
        fallback: Box<DisplayResolution>,
    },
}

impl DisplayResolution {
    /// Display this resolution contributes to the desired set, if any
    ///
    /// `AllDisplays` contributes through the force-all flag instead, and
    /// `Exiting`/`Unresolved` contribute nothing.
    pub fn contributed_display(&self) -> Option<&str> {
        match self {
            Self::Display(id) | Self::PrimaryFallback(id) => Some(id),
            Self::Degraded { fallback, .. } => fallback.contributed_display(),
            Self::AllDisplays | Self::Exiting | Self::Unresolved => None,
        }
    }

    /// Human-readable label for grids and logs
    pub fn label(&self) -> String {
        match self {
            Self::Display(id) => id.clone(),
            Self::AllDisplays => crate::config::ALL_DISPLAYS_TARGET.to_string(),
            Self::PrimaryFallback(id) => format!("{id} (primary fallback)"),
            Self::Exiting => "(exiting)".to_string(),
            Self::Unresolved => "(unresolved)".to_string(),
            Self::Degraded {
                requested,
                fallback,
            } => format!("{} (target '{requested}' not found)", fallback.label()),
        }
    }
}

/// One rule hit for one process in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Matched process id
    pub pid: u32,
    /// Matched process name
    pub process_name: String,
    /// Index of the winning rule in the declared rule order
    pub rule_index: usize,
    /// The candidate string that hit
    pub matched_candidate: String,
    /// Which matching branch fired
    pub mode: MatchMode,
    /// Explicit target from an override or the rule itself, if any
    pub effective_target: Option<String>,
    /// How the target display was resolved
    pub resolution: DisplayResolution,
    /// Whether the process's resolved window is fullscreen-like
    pub fullscreen_like: bool,
}

/// Summary of one fullscreen-like process observed this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullscreenProcess {
    /// Process id
    pub pid: u32,
    /// Process name
    pub name: String,
    /// Display the fullscreen window is on
    pub display_id: String,
    /// Resolved ignore state
    pub ignored: bool,
    /// The ignore-map key that decided the state, if any
    pub ignore_key: Option<String>,
    /// Whether this process contributed to the desired set
    pub counted: bool,
}

/// Per-display observed and computed state after one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Stable per-output identifier (e.g. "\\\\.\\DISPLAY1")
    pub display_id: String,
    /// Monitor friendly name
    pub friendly_name: String,
    /// Whether this is the primary display
    pub is_primary: bool,
    /// Whether the display supports HDR
    pub hdr_supported: bool,
    /// Observed HDR state (after any toggle issued this cycle)
    pub hdr_enabled: bool,
    /// Computed desired HDR state
    pub desired_hdr: bool,
    /// Automatic control flag; false means the display is under manual control
    pub auto_mode: bool,
    /// Human-readable outcome/reason for this display
    pub last_action: String,
}

/// Immutable result of one reconciliation cycle
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    /// When the cycle ran
    pub taken_at: SystemTime,
    /// Total number of live processes observed
    pub process_count: usize,
    /// Rule matches, sorted by process name then pid
    pub matches: Vec<MatchResult>,
    /// Fullscreen-like processes, sorted by name then pid
    pub fullscreen: Vec<FullscreenProcess>,
    /// Displays, sorted by display id
    pub displays: Vec<DisplayInfo>,
}

impl MonitorSnapshot {
    /// True when the two snapshots describe the same state, ignoring the
    /// capture timestamp
    pub fn same_state(&self, other: &MonitorSnapshot) -> bool {
        self.process_count == other.process_count
            && self.matches == other.matches
            && self.fullscreen == other.fullscreen
            && self.displays == other.displays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_strips_extension_and_case() {
        let p = ProcessIdentity {
            pid: 100,
            name: "EldenRing.EXE".to_string(),
            exe_path: None,
        };
        assert_eq!(p.bare_name(), "eldenring");
    }

    #[test]
    fn test_bare_name_keeps_inner_dots() {
        let p = ProcessIdentity {
            pid: 100,
            name: "my.app.exe".to_string(),
            exe_path: None,
        };
        assert_eq!(p.bare_name(), "my.app");
    }

    #[test]
    fn test_bare_name_without_extension() {
        assert_eq!(strip_extension("process"), "process");
        // A leading dot is not an extension separator
        assert_eq!(strip_extension(".hidden"), ".hidden");
    }

    #[test]
    fn test_rect_area() {
        let r = Rect {
            left: 0,
            top: 0,
            right: 2560,
            bottom: 1440,
        };
        assert_eq!(r.area(), 2560 * 1440);

        let empty = Rect {
            left: 10,
            top: 10,
            right: 10,
            bottom: 10,
        };
        assert_eq!(empty.area(), 0);

        let inverted = Rect {
            left: 100,
            top: 100,
            right: 50,
            bottom: 50,
        };
        assert_eq!(inverted.area(), 0);
    }

    #[test]
    fn test_rect_matches_within_tolerance() {
        let monitor = Rect {
            left: 0,
            top: 0,
            right: 3840,
            bottom: 2160,
        };
        let window = Rect {
            left: -1,
            top: 0,
            right: 3841,
            bottom: 2160,
        };
        assert!(window.matches_within(&monitor, 1));
        assert!(!window.matches_within(&monitor, 0));
    }

    #[test]
    fn test_resolution_contribution() {
        let d = DisplayResolution::Display("\\\\.\\DISPLAY2".to_string());
        assert_eq!(d.contributed_display(), Some("\\\\.\\DISPLAY2"));

        assert_eq!(DisplayResolution::Exiting.contributed_display(), None);
        assert_eq!(DisplayResolution::AllDisplays.contributed_display(), None);

        let degraded = DisplayResolution::Degraded {
            requested: "\\\\.\\DISPLAY9".to_string(),
            fallback: Box::new(DisplayResolution::PrimaryFallback(
                "\\\\.\\DISPLAY1".to_string(),
            )),
        };
        assert_eq!(degraded.contributed_display(), Some("\\\\.\\DISPLAY1"));
        assert!(degraded.label().contains("\\\\.\\DISPLAY9"));
    }

    #[test]
    fn test_exiting_label() {
        assert_eq!(DisplayResolution::Exiting.label(), "(exiting)");
    }
}
