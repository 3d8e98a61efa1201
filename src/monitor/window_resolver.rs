//! Window-to-display resolution
//!
//! Enumerates visible, non-minimized top-level windows each cycle and maps
//! each owning process id to the single best window by priority: foreground
//! beats fullscreen-like beats larger area. Zero-area windows are stale or
//! hidden placeholders and are discarded.
//!
//! The fullscreen-likeness heuristic: the window has no caption/border
//! chrome AND its bounds match the monitor bounds within a one-pixel
//! tolerance AND it has nonzero area. This intentionally does not cover
//! every rendering technique.

use crate::engine::snapshot::{Rect, ResolvedWindow};
use crate::error::Result;
use std::collections::HashMap;

/// One enumerated top-level window, before per-pid selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawWindow {
    /// Owning process id
    pub pid: u32,
    /// Identifier of the display the window is centered/contained in
    pub display_id: String,
    /// Window bounds in virtual-screen coordinates
    pub bounds: Rect,
    /// Bounds of the monitor the window is on
    pub monitor_bounds: Rect,
    /// Whether the window carries caption/border chrome
    pub has_chrome: bool,
    /// Whether this is the foreground window
    pub foreground: bool,
}

/// Source of visible top-level windows
///
/// Implemented by the Win32 enumerator in production and by fixed fixtures
/// in tests.
pub trait WindowSource {
    /// Enumerate all visible, non-minimized top-level windows
    fn enumerate_visible_windows(&mut self) -> Result<Vec<RawWindow>>;
}

/// Bounds tolerance for the fullscreen-likeness heuristic, in pixels
pub const FULLSCREEN_TOLERANCE_PX: i32 = 1;

/// Fullscreen-likeness heuristic for one window
pub fn fullscreen_like(window: &RawWindow) -> bool {
    !window.has_chrome
        && window.bounds.area() > 0
        && window
            .bounds
            .matches_within(&window.monitor_bounds, FULLSCREEN_TOLERANCE_PX)
}

/// Reduce raw windows to one winner per process id
pub fn resolve_windows(raw: Vec<RawWindow>) -> HashMap<u32, ResolvedWindow> {
    let mut best: HashMap<u32, ResolvedWindow> = HashMap::new();

    for window in raw {
        let area = window.bounds.area();
        if area == 0 {
            continue;
        }
        let resolved = ResolvedWindow {
            pid: window.pid,
            display_id: window.display_id.clone(),
            fullscreen_like: fullscreen_like(&window),
            area,
            foreground: window.foreground,
        };
        match best.get_mut(&window.pid) {
            Some(current) => {
                if beats(&resolved, current) {
                    *current = resolved;
                }
            }
            None => {
                best.insert(window.pid, resolved);
            }
        }
    }

    best
}

/// True when `a` outranks `b`: foreground > fullscreen-like > larger area
fn beats(a: &ResolvedWindow, b: &ResolvedWindow) -> bool {
    if a.foreground != b.foreground {
        return a.foreground;
    }
    if a.fullscreen_like != b.fullscreen_like {
        return a.fullscreen_like;
    }
    a.area > b.area
}

#[cfg(windows)]
pub use win32::Win32WindowSource;

#[cfg(windows)]
mod win32 {
    use super::{RawWindow, Rect, WindowSource};
    use crate::error::{HdrSyncError, Result};
    use tracing::trace;
    use windows::Win32::Foundation::{HWND, LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        GetMonitorInfoW, MONITOR_DEFAULTTONEAREST, MONITORINFO, MONITORINFOEXW,
        MonitorFromWindow,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GWL_STYLE, GetForegroundWindow, GetWindowLongW, GetWindowRect,
        GetWindowThreadProcessId, IsIconic, IsWindowVisible, WS_CAPTION, WS_THICKFRAME,
    };
    use windows::core::BOOL;

    /// Window source backed by `EnumWindows`
    #[derive(Debug, Default)]
    pub struct Win32WindowSource;

    impl Win32WindowSource {
        /// Create a new Win32 window source
        pub fn new() -> Self {
            Self
        }
    }

    impl WindowSource for Win32WindowSource {
        /// Enumerate visible, non-minimized top-level windows
        ///
        /// # Safety
        ///
        /// `EnumWindows` is called with a callback that only pushes window
        /// handles into the `Vec` passed through `LPARAM`; the pointer is
        /// valid for the duration of the call. All per-window queries use
        /// handles received from the callback in the same pass; a window
        /// destroyed mid-pass makes its queries fail, and that window is
        /// skipped.
        #[expect(
            unsafe_code,
            reason = "Windows FFI for top-level window enumeration and per-window queries"
        )]
        fn enumerate_visible_windows(&mut self) -> Result<Vec<RawWindow>> {
            let mut handles: Vec<HWND> = Vec::with_capacity(128);
            unsafe {
                EnumWindows(
                    Some(collect_windows),
                    LPARAM(std::ptr::from_mut(&mut handles) as isize),
                )
                .map_err(|e| HdrSyncError::WindowEnumFailed(Box::new(e)))?;
            }

            let foreground = unsafe { GetForegroundWindow() };
            let mut windows = Vec::with_capacity(handles.len());

            for hwnd in handles {
                if let Some(window) = unsafe { inspect_window(hwnd, foreground) } {
                    windows.push(window);
                }
            }

            trace!("Captured {} visible top-level windows", windows.len());
            Ok(windows)
        }
    }

    /// `EnumWindows` callback collecting every top-level window handle
    ///
    /// # Safety
    ///
    /// `lparam` is the address of the caller's `Vec<HWND>`, valid for the
    /// whole enumeration.
    #[expect(unsafe_code, reason = "Windows FFI callback for EnumWindows")]
    unsafe extern "system" fn collect_windows(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let handles = unsafe { &mut *(lparam.0 as *mut Vec<HWND>) };
        handles.push(hwnd);
        true.into()
    }

    /// Query one window; `None` when it is invisible, minimized, zero-area,
    /// unowned, or has been destroyed mid-pass
    ///
    /// # Safety
    ///
    /// `hwnd` came from `EnumWindows` in the current pass. Every query
    /// checks its return value before the data is used.
    #[expect(
        unsafe_code,
        reason = "Windows FFI for per-window visibility, bounds, style, and monitor queries"
    )]
    unsafe fn inspect_window(hwnd: HWND, foreground: HWND) -> Option<RawWindow> {
        unsafe {
            if !IsWindowVisible(hwnd).as_bool() || IsIconic(hwnd).as_bool() {
                return None;
            }

            let mut bounds = RECT::default();
            GetWindowRect(hwnd, &raw mut bounds).ok()?;
            let bounds = to_rect(&bounds);
            if bounds.area() == 0 {
                return None;
            }

            let mut pid = 0u32;
            GetWindowThreadProcessId(hwnd, Some(&raw mut pid));
            if pid == 0 {
                return None;
            }

            #[expect(
                clippy::cast_sign_loss,
                reason = "GetWindowLongW returns style bits that are a u32 bitmask"
            )]
            let style = GetWindowLongW(hwnd, GWL_STYLE) as u32;
            let has_chrome = style & (WS_CAPTION.0 | WS_THICKFRAME.0) != 0;

            let monitor = MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST);
            let mut info = MONITORINFOEXW::default();
            #[expect(
                clippy::cast_possible_truncation,
                reason = "size_of::<MONITORINFOEXW>() is a small compile-time constant"
            )]
            {
                info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;
            }
            if !GetMonitorInfoW(monitor, std::ptr::from_mut(&mut info).cast::<MONITORINFO>())
                .as_bool()
            {
                return None;
            }

            Some(RawWindow {
                pid,
                display_id: device_name(&info.szDevice),
                bounds,
                monitor_bounds: to_rect(&info.monitorInfo.rcMonitor),
                has_chrome,
                foreground: hwnd == foreground,
            })
        }
    }

    fn to_rect(rect: &RECT) -> Rect {
        Rect {
            left: rect.left,
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
        }
    }

    /// Convert a null-terminated wide device name (e.g. "\\\\.\\DISPLAY1")
    fn device_name(sz_device: &[u16; 32]) -> String {
        let len = sz_device
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(sz_device.len());
        String::from_utf16_lossy(&sz_device[..len])
    }
}
