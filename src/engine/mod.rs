//! Reconciliation engine module
//!
//! The per-cycle pipeline that turns "what is running where" into "which
//! displays want HDR":
//!
//! - [`matcher`] - rule matching (regex / exact / contains-or-wildcard) with
//!   a keyed regex compilation cache
//! - [`overrides`] - ignore-state and target-display override resolution
//!   over the `path:`/`pathprefix:`/`name:` key space
//! - [`reconciler`] - the cycle orchestrator: pulls processes and windows,
//!   annotates matches, aggregates per-display desired state, diffs against
//!   observed state, and drives the native toggle
//! - [`snapshot`] - the immutable per-cycle result types
//!
//! A process id contributes to at most one match per cycle: the first rule
//! in declared order that matches any candidate string wins, and matching
//! stops at the first hit.

pub mod matcher;
pub mod overrides;
pub mod reconciler;
pub mod snapshot;

pub use matcher::RuleMatcher;
pub use reconciler::{CycleConfig, CycleSettings, ReconcileEngine};
pub use snapshot::{
    DisplayInfo, DisplayResolution, FullscreenProcess, MatchMode, MatchResult, MonitorSnapshot,
    ProcessIdentity, Rect, ResolvedWindow,
};
