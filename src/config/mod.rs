//! Configuration management module
//!
//! This module handles loading, saving, and managing application configuration.
//! Configuration is stored in %APPDATA%\HdrSync\config.json with atomic writes
//! to prevent corruption.
//!
//! The configuration owns everything the reconciliation engine reads per cycle:
//! the watch rules, the ignore map, the target-display overrides, the per-display
//! auto-mode flags, and the global toggles. The engine treats all of it as a
//! read-only snapshot except for newly-synthesized default-ignore entries, which
//! are reported back here for persistence.

pub mod manager;
pub mod models;

pub use manager::ConfigManager;
pub use models::{ALL_DISPLAYS_TARGET, AppConfig, UserPreferences, WatchRule};
