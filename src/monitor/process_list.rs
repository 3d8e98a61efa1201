//! Live process enumeration
//!
//! Lists every running process with pid, executable name, and (when the
//! process can be opened for limited query) the full executable path. Uses
//! the Windows Toolhelp32 API for the walk and
//! `QueryFullProcessImageNameW` per process for the path.
//!
//! Identities are derived fresh every cycle; pid reuse means they must never
//! be trusted across cycles. A process that exits mid-inspection, or whose
//! module information is access-denied, simply yields `exe_path: None` -
//! per-process failures never abort the enumeration.

use crate::engine::snapshot::ProcessIdentity;
use crate::error::Result;

/// Source of the live process list
///
/// Implemented by the Toolhelp32 walker in production and by fixed fixtures
/// in tests.
pub trait ProcessSource {
    /// List all live processes
    fn list_processes(&mut self) -> Result<Vec<ProcessIdentity>>;
}

#[cfg(windows)]
pub use toolhelp::ToolhelpProcessSource;

#[cfg(windows)]
mod toolhelp {
    use super::{ProcessIdentity, ProcessSource};
    use crate::error::{HdrSyncError, Result};
    use std::path::PathBuf;
    use tracing::{debug, warn};
    use windows::Win32::Foundation::{CloseHandle, ERROR_NO_MORE_FILES, HANDLE};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
        QueryFullProcessImageNameW,
    };
    use windows::core::PWSTR;

    /// Process source backed by `CreateToolhelp32Snapshot`
    pub struct ToolhelpProcessSource {
        /// Estimated process count for capacity pre-allocation
        estimated_process_count: usize,
    }

    impl ToolhelpProcessSource {
        /// Create a new Toolhelp32-backed process source
        pub fn new() -> Self {
            // Typical Windows system has 150-250 processes
            const DEFAULT_PROCESS_COUNT: usize = 200;
            Self {
                estimated_process_count: DEFAULT_PROCESS_COUNT,
            }
        }
    }

    impl Default for ToolhelpProcessSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ProcessSource for ToolhelpProcessSource {
        /// Enumerate all running processes
        ///
        /// # Safety
        ///
        /// `CreateToolhelp32Snapshot` called with valid flags
        /// (`TH32CS_SNAPPROCESS`, PID 0); errors propagated via `map_err`.
        /// Handle wrapped in `HandleGuard` (RAII) for cleanup.
        /// `PROCESSENTRY32W` initialized with correct `dwSize` to prevent
        /// buffer overruns. `Process32FirstW`/`NextW` return codes checked
        /// before data access; `ERROR_NO_MORE_FILES` handled as iteration
        /// end. `&raw mut entry` valid (stack variable, correct size).
        #[expect(
            unsafe_code,
            reason = "Windows FFI for process enumeration via CreateToolhelp32Snapshot and Process32FirstW/NextW"
        )]
        fn list_processes(&mut self) -> Result<Vec<ProcessIdentity>> {
            let snapshot = unsafe {
                CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0).map_err(|e| {
                    warn!("CreateToolhelp32Snapshot failed: {e}");
                    HdrSyncError::ProcessEnumFailed(Box::new(e))
                })?
            };
            let _guard = HandleGuard(snapshot);

            let mut processes = Vec::with_capacity(self.estimated_process_count);

            #[expect(
                clippy::cast_possible_truncation,
                reason = "size_of::<PROCESSENTRY32W>() is a compile-time constant (592 bytes) that fits in u32"
            )]
            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            let mut has_process = unsafe { Process32FirstW(snapshot, &raw mut entry).is_ok() };

            while has_process {
                let pid = entry.th32ProcessID;
                if pid != 0 {
                    if let Some(name) = wide_to_string(&entry.szExeFile) {
                        processes.push(ProcessIdentity {
                            pid,
                            name,
                            exe_path: query_exe_path(pid),
                        });
                    }
                }

                has_process = unsafe {
                    match Process32NextW(snapshot, &raw mut entry) {
                        Ok(()) => true,
                        Err(e) => {
                            // ERROR_NO_MORE_FILES is expected at the end
                            if e.code() != ERROR_NO_MORE_FILES.to_hresult() {
                                warn!("Error iterating processes: {e}");
                            }
                            false
                        }
                    }
                };
            }

            debug!("Found {} running processes", processes.len());

            // Exponential moving average smooths the capacity hint
            self.estimated_process_count =
                (self.estimated_process_count * 3 + processes.len()) / 4;

            Ok(processes)
        }
    }

    /// Full executable path for a pid, or `None` when the process cannot be
    /// opened (exited mid-inspection, access denied, protected process)
    ///
    /// # Safety
    ///
    /// `OpenProcess` requests only `PROCESS_QUERY_LIMITED_INFORMATION`; the
    /// returned handle is owned by a `HandleGuard`. The path buffer length
    /// is passed in/out of `QueryFullProcessImageNameW`, which truncates the
    /// reported length to what it actually wrote.
    #[expect(
        unsafe_code,
        reason = "Windows FFI for OpenProcess and QueryFullProcessImageNameW"
    )]
    fn query_exe_path(pid: u32) -> Option<PathBuf> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
            let _guard = HandleGuard(handle);

            let mut buffer = [0u16; 1024];
            #[expect(
                clippy::cast_possible_truncation,
                reason = "buffer length 1024 fits in u32"
            )]
            let mut len = buffer.len() as u32;
            QueryFullProcessImageNameW(
                handle,
                PROCESS_NAME_WIN32,
                PWSTR(buffer.as_mut_ptr()),
                &raw mut len,
            )
            .ok()?;

            Some(PathBuf::from(String::from_utf16_lossy(
                &buffer[..len as usize],
            )))
        }
    }

    /// RAII guard for a Windows handle
    struct HandleGuard(HANDLE);

    impl Drop for HandleGuard {
        /// Closes the owned handle
        ///
        /// # Safety
        ///
        /// The guard owns the handle (closed once, not cloned/shared).
        /// `CloseHandle` result ignored; there is no destructor recovery.
        #[expect(unsafe_code, reason = "Windows FFI for CloseHandle")]
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    /// Convert a null-terminated wide string to a Rust `String`
    fn wide_to_string(wide: &[u16; 260]) -> Option<String> {
        let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
        if len == 0 {
            return None;
        }
        String::from_utf16(&wide[..len]).ok()
    }
}
