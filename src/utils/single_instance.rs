//! Single instance enforcement
//!
//! Ensures only one instance of the application runs at a time using a
//! Windows named mutex. Two instances fighting over display state would
//! toggle HDR against each other.

use crate::error::Result;

#[cfg(windows)]
use crate::error::{HdrSyncError, StringError};

#[cfg(windows)]
use windows::Win32::Foundation::{CloseHandle, HANDLE};
#[cfg(windows)]
use windows::Win32::System::Threading::{CreateMutexW, OpenMutexW, SYNCHRONIZATION_SYNCHRONIZE};

/// Single instance guard using a Windows named mutex (released on drop)
#[cfg(windows)]
pub struct SingleInstanceGuard {
    mutex_handle: HANDLE,
}

#[cfg(windows)]
impl SingleInstanceGuard {
    /// Create a new single instance guard, returning an error if another
    /// instance is running
    #[expect(unsafe_code, reason = "Windows FFI for named mutex")]
    pub fn new() -> Result<Self> {
        use tracing::{debug, error};
        use windows::core::HSTRING;

        let mutex_name = HSTRING::from("Global\\HdrSync_SingleInstance_Mutex");

        unsafe {
            // If the mutex can be opened, another instance already owns it
            if let Ok(existing_handle) = OpenMutexW(SYNCHRONIZATION_SYNCHRONIZE, false, &mutex_name)
            {
                error!("Another instance of HdrSync is already running");
                let _ = CloseHandle(existing_handle);
                Err(HdrSyncError::ConfigError(StringError::new(
                    "Another instance of HdrSync is already running",
                )))
            } else {
                let mutex_handle = CreateMutexW(None, true, &mutex_name)?;
                debug!("Single instance mutex created successfully");
                Ok(Self { mutex_handle })
            }
        }
    }
}

#[cfg(windows)]
impl Drop for SingleInstanceGuard {
    #[expect(unsafe_code, reason = "Windows FFI for mutex cleanup")]
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.mutex_handle);
        }
    }
}

/// Stub implementation for non-Windows platforms
#[cfg(not(windows))]
pub struct SingleInstanceGuard;

#[cfg(not(windows))]
impl SingleInstanceGuard {
    /// Create a new single instance guard (stub for non-Windows, always succeeds)
    pub fn new() -> Result<Self> {
        Ok(Self)
    }
}
