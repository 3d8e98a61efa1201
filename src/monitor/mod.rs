//! Monitoring module
//!
//! Everything that observes the outside world and decides when to
//! reconcile:
//!
//! - [`process_list`] - live process enumeration (Toolhelp32 on Windows)
//! - [`window_resolver`] - visible top-level window capture, window-to-display
//!   mapping, and the fullscreen-likeness heuristic
//! - [`event_watcher`] - OS process start/stop subscription with the
//!   two-tier trace/instance fallback state machine and background recovery
//! - [`wmi_stream`] - the WMI-backed notification streams (Windows only)
//! - [`service`] - the coalescing scheduler that owns the reconciliation
//!   engine and guarantees at most one concurrent cycle
//!
//! # Event flow
//!
//! ```text
//! WMI streams → ProcessEventWatcher → (relevance check) → MonitorService
//!                                                            │
//! poll timer ────────────────────────────────────────────────┤
//! manual request ────────────────────────────────────────────┘
//!                                                            ▼
//!                                               ReconcileEngine::evaluate
//! ```
//!
//! The event watcher only decides *when* a cycle runs; it never touches
//! display state itself.

pub mod event_watcher;
pub mod process_list;
pub mod service;
pub mod window_resolver;
#[cfg(windows)]
pub mod wmi_stream;

pub use event_watcher::{
    EventKind, EventStream, EventStreamFactory, ProcessEventWatcher, ProcessLifecycleEvent,
    RawProcessEvent, StreamMode, WatcherOptions, WatcherState,
};
pub use process_list::ProcessSource;
pub use service::MonitorService;
pub use window_resolver::{RawWindow, WindowSource};

#[cfg(windows)]
pub use process_list::ToolhelpProcessSource;
#[cfg(windows)]
pub use window_resolver::Win32WindowSource;
#[cfg(windows)]
pub use wmi_stream::WmiStreamFactory;
