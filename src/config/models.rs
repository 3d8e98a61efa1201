//! Configuration data models
//!
//! This module defines the data structures used for application configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Sentinel target-display value meaning "every enumerable display".
///
/// A rule or override carrying this target forces the desired state on for
/// all HDR-capable displays instead of a single resolved one.
pub const ALL_DISPLAYS_TARGET: &str = "All displays";

/// A single watch rule evaluated against every running process each cycle
///
/// The three matching modes are mutually exclusive and checked in priority
/// order: `regex_mode` first, then `exact_match`, then substring/wildcard
/// containment. Rules are immutable once constructed; the engine only reads
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRule {
    /// Unique identifier for this rule entry
    pub id: Uuid,
    /// Pattern the rule matches candidate strings against
    pub pattern: String,
    /// Whole-string equality instead of containment
    #[serde(default)]
    pub exact_match: bool,
    /// Honor case in exact/containment modes (regex mode is always case-insensitive)
    #[serde(default)]
    pub case_sensitive: bool,
    /// Interpret the pattern as a regular expression
    #[serde(default)]
    pub regex_mode: bool,
    /// Disabled rules never match
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Target display for matches of this rule; absent means "Default"
    /// (the display the matched window is on), [`ALL_DISPLAYS_TARGET`] means
    /// every display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_display: Option<String>,
}

impl WatchRule {
    /// Create an enabled containment-mode rule with no target override
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern: pattern.into(),
            exact_match: false,
            case_sensitive: false,
            regex_mode: false,
            enabled: true,
            target_display: None,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Watch rules, evaluated in declared order (first match wins)
    #[serde(default)]
    pub rules: Vec<WatchRule>,
    /// Ignore entries keyed `path:`/`pathprefix:`/`name:`, value = ignored
    #[serde(default)]
    pub ignore_map: BTreeMap<String, bool>,
    /// Target-display overrides keyed `path:`/`name:`, value = display id or
    /// [`ALL_DISPLAYS_TARGET`]
    #[serde(default)]
    pub target_overrides: BTreeMap<String, String>,
    /// Per-display automatic-control flags; a display absent from the map is
    /// in automatic mode
    #[serde(default)]
    pub auto_modes: BTreeMap<String, bool>,
    /// User preferences
    #[serde(default)]
    pub preferences: UserPreferences,
}

impl AppConfig {
    /// Effective auto-mode flag for a display (defaults to automatic)
    pub fn auto_mode_for(&self, display_id: &str) -> bool {
        self.auto_modes.get(display_id).copied().unwrap_or(true)
    }
}

/// User preferences and settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Whether the periodic polling backstop is enabled
    pub poll_enabled: bool,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Treat any non-ignored fullscreen process as an HDR trigger, even
    /// without a matching rule
    pub monitor_all_fullscreen: bool,
    /// One match switches every HDR-capable display together
    pub switch_all_displays_together: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            poll_enabled: true,
            poll_interval_ms: 2000,
            monitor_all_fullscreen: false,
            switch_all_displays_together: false,
        }
    }
}

fn default_true() -> bool {
    true
}
