//! `HdrSync` - Rule-driven automatic HDR management for Windows
//!
//! Keeps the HDR state of each physical display synchronized with a
//! continuously recomputed desired state derived from which processes are
//! running, which of their windows occupy which display, and user-configured
//! rules and overrides. At its core is a reconciliation loop: every cycle
//! pulls ground truth (processes, windows, displays), computes a desired
//! boolean per display, and toggles only the displays where desired and
//! observed state differ.
//!
//! Cycles are driven by OS process start/stop notifications (with a
//! two-tier trace/instance subscription and background recovery), by a
//! periodic polling backstop, and by explicit caller requests. The engine
//! guarantees at most one concurrent cycle; overlapping triggers coalesce.
//!
//! # Requirements
//!
//! - Windows 10 21H2+ (Build 19044+) or Windows 11
//! - HDR-capable display with updated drivers

// Module declarations
pub mod config;
pub mod engine;
pub mod error;
pub mod hdr;
pub mod monitor;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use error::{HdrSyncError, Result};
