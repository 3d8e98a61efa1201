//! HDR control module
//!
//! This module provides functionality to enumerate displays and control HDR
//! settings on Windows using the Display Configuration API.
//!
//! # Overview
//!
//! - **Display enumeration** via `QueryDisplayConfig`, yielding the GDI
//!   source name (e.g. `\\.\DISPLAY1`) as the stable per-output identifier
//!   plus the monitor friendly name
//! - **HDR capability and state detection** with version-specific APIs
//! - **HDR state control** (enable/disable) per display
//! - **Windows version detection** to select the appropriate APIs
//!
//! # Windows API Integration
//!
//! ## Windows 11 24H2+ (Build 26100+)
//!
//! - `DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO_2` for HDR detection
//! - `DISPLAYCONFIG_SET_HDR_STATE` for HDR control
//!
//! ## Windows 10/11 (Before 24H2)
//!
//! - `DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO` for HDR detection
//! - `DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE` for HDR control
//!
//! The reconciliation engine talks to this module through the
//! [`DisplayBackend`] trait and treats it as authoritative ground truth for
//! observed state each cycle; nothing is cached beyond one cycle.

pub mod controller;
pub mod version;
pub mod windows_api;

pub use controller::HdrController;
pub use version::WindowsVersion;

use crate::error::Result;

/// Observed state of one display, fresh each cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    /// Stable per-output identifier (GDI source name, e.g. "\\\\.\\DISPLAY1")
    pub display_id: String,
    /// Monitor friendly name (e.g. "LG OLED C2")
    pub friendly_name: String,
    /// Whether this is the primary display
    pub is_primary: bool,
    /// Whether the display supports HDR
    pub hdr_supported: bool,
    /// Whether HDR is currently enabled
    pub hdr_enabled: bool,
}

/// Native display enumerator and HDR toggle
///
/// Implemented by [`HdrController`] in production and by fixtures in tests.
pub trait DisplayBackend {
    /// Enumerate all active displays with their observed HDR state
    fn list_displays(&mut self) -> Result<Vec<DisplayState>>;

    /// Enable or disable HDR on one display
    fn set_hdr(&mut self, display_id: &str, enable: bool) -> Result<()>;
}
