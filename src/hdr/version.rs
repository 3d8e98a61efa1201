//! Windows version detection
//!
//! Determines which Display Configuration structures to use for HDR control.
//! Windows 11 24H2 (build 26100) replaced the advanced-color state setter
//! with a dedicated HDR state setter.

/// Windows version enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsVersion {
    /// Windows 10
    Windows10,
    /// Windows 11 (before 24H2)
    Windows11,
    /// Windows 11 24H2 or later (build 26100+)
    Windows11_24H2,
}

impl WindowsVersion {
    /// Detect the current Windows version
    ///
    /// Uses `RtlGetVersion` from ntdll.dll, which reports the true build
    /// number regardless of compatibility shims.
    #[cfg(windows)]
    #[expect(unsafe_code, reason = "Windows FFI for RtlGetVersion")]
    pub fn detect() -> crate::error::Result<Self> {
        use windows::Win32::System::SystemInformation::OSVERSIONINFOW;

        #[link(name = "ntdll")]
        unsafe extern "system" {
            fn RtlGetVersion(version_information: *mut OSVERSIONINFOW) -> i32;
        }

        #[expect(
            clippy::cast_possible_truncation,
            reason = "size_of::<OSVERSIONINFOW>() is a small compile-time constant"
        )]
        let mut info = OSVERSIONINFOW {
            dwOSVersionInfoSize: std::mem::size_of::<OSVERSIONINFOW>() as u32,
            ..Default::default()
        };

        // STATUS_SUCCESS is 0; RtlGetVersion cannot fail with a valid struct
        let status = unsafe { RtlGetVersion(&raw mut info) };
        if status != 0 {
            tracing::warn!("RtlGetVersion returned status {status:#x}, assuming Windows 10");
            return Ok(Self::Windows10);
        }

        Ok(Self::from_build(info.dwBuildNumber))
    }

    /// Non-Windows stub used by cross-platform tests
    #[cfg(not(windows))]
    pub fn detect() -> crate::error::Result<Self> {
        Ok(Self::Windows11)
    }

    /// Classify a Windows build number
    pub fn from_build(build: u32) -> Self {
        if build >= 26100 {
            Self::Windows11_24H2
        } else if build >= 22000 {
            Self::Windows11
        } else {
            Self::Windows10
        }
    }

    /// Whether the dedicated 24H2 HDR state structures apply
    pub fn has_dedicated_hdr_api(self) -> bool {
        self == Self::Windows11_24H2
    }
}
