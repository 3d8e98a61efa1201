//! Windows API structures and definitions for HDR control
//!
//! This module contains Display Configuration API structure definitions and
//! constants needed for display enumeration and HDR control.
//!
//! Several of these structures (notably the Windows 11 24H2 additions) are
//! not exposed by the windows crate feature set this project uses, so they
//! are defined here with `#[repr(C)]` to match the Windows API layout, and
//! the four user32 entry points are declared manually.

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]

// Import LUID from windows-rs on Windows, or define a stub for non-Windows platforms
#[cfg(windows)]
pub use windows::Win32::Foundation::LUID;

// For non-Windows platforms (testing), define a stub LUID structure
#[cfg(not(windows))]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LUID {
    pub LowPart: u32,
    pub HighPart: i32,
}

/// DISPLAYCONFIG_DEVICE_INFO_TYPE enumeration values
///
/// Specifies the type of display device info to configure or obtain through
/// DisplayConfigSetDeviceInfo or DisplayConfigGetDeviceInfo.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DISPLAYCONFIG_DEVICE_INFO_TYPE {
    DISPLAYCONFIG_DEVICE_INFO_GET_SOURCE_NAME = 1,
    DISPLAYCONFIG_DEVICE_INFO_GET_TARGET_NAME = 2,
    DISPLAYCONFIG_DEVICE_INFO_GET_ADVANCED_COLOR_INFO = 9,
    DISPLAYCONFIG_DEVICE_INFO_SET_ADVANCED_COLOR_STATE = 10,
    DISPLAYCONFIG_DEVICE_INFO_GET_ADVANCED_COLOR_INFO_2 = 15,
    DISPLAYCONFIG_DEVICE_INFO_SET_HDR_STATE = 16,
}

/// DISPLAYCONFIG_DEVICE_INFO_HEADER structure
///
/// Contains display information about the device. This is the header for all
/// DisplayConfigGetDeviceInfo and DisplayConfigSetDeviceInfo operations.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DISPLAYCONFIG_DEVICE_INFO_HEADER {
    /// Type of device information to retrieve or set
    pub type_: DISPLAYCONFIG_DEVICE_INFO_TYPE,
    /// Size in bytes of the device information (including header)
    pub size: u32,
    /// Adapter LUID
    pub adapterId: LUID,
    /// Source or target identifier
    pub id: u32,
}

impl DISPLAYCONFIG_DEVICE_INFO_HEADER {
    /// Build a header for the given request against one adapter/id pair
    pub fn new(type_: DISPLAYCONFIG_DEVICE_INFO_TYPE, size: usize, adapter_id: LUID, id: u32) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "DISPLAYCONFIG request structs are a few hundred bytes at most"
        )]
        let size = size as u32;
        Self {
            type_,
            size,
            adapterId: adapter_id,
            id,
        }
    }
}

/// DISPLAYCONFIG_SOURCE_DEVICE_NAME structure
///
/// Returns the GDI device name of a source (e.g. "\\\\.\\DISPLAY1"), which
/// doubles as the stable per-output identifier throughout this application.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DISPLAYCONFIG_SOURCE_DEVICE_NAME {
    /// Header
    pub header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    /// Null-terminated GDI device name
    pub viewGdiDeviceName: [u16; 32],
}

impl DISPLAYCONFIG_SOURCE_DEVICE_NAME {
    /// Create a request for the given source
    pub fn new(adapter_id: LUID, source_id: u32) -> Self {
        Self {
            header: DISPLAYCONFIG_DEVICE_INFO_HEADER::new(
                DISPLAYCONFIG_DEVICE_INFO_TYPE::DISPLAYCONFIG_DEVICE_INFO_GET_SOURCE_NAME,
                std::mem::size_of::<Self>(),
                adapter_id,
                source_id,
            ),
            viewGdiDeviceName: [0; 32],
        }
    }
}

/// DISPLAYCONFIG_TARGET_DEVICE_NAME structure
///
/// Returns the monitor friendly name of a target.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DISPLAYCONFIG_TARGET_DEVICE_NAME {
    /// Header
    pub header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    /// DISPLAYCONFIG_TARGET_DEVICE_NAME_FLAGS bit field
    pub flags: u32,
    /// Output technology (DISPLAYCONFIG_VIDEO_OUTPUT_TECHNOLOGY)
    pub outputTechnology: u32,
    /// EDID manufacture id
    pub edidManufactureId: u16,
    /// EDID product code id
    pub edidProductCodeId: u16,
    /// Connector instance
    pub connectorInstance: u32,
    /// Null-terminated monitor friendly name
    pub monitorFriendlyDeviceName: [u16; 64],
    /// Null-terminated monitor device path
    pub monitorDevicePath: [u16; 128],
}

impl DISPLAYCONFIG_TARGET_DEVICE_NAME {
    /// Create a request for the given target
    pub fn new(adapter_id: LUID, target_id: u32) -> Self {
        Self {
            header: DISPLAYCONFIG_DEVICE_INFO_HEADER::new(
                DISPLAYCONFIG_DEVICE_INFO_TYPE::DISPLAYCONFIG_DEVICE_INFO_GET_TARGET_NAME,
                std::mem::size_of::<Self>(),
                adapter_id,
                target_id,
            ),
            flags: 0,
            outputTechnology: 0,
            edidManufactureId: 0,
            edidProductCodeId: 0,
            connectorInstance: 0,
            monitorFriendlyDeviceName: [0; 64],
            monitorDevicePath: [0; 128],
        }
    }
}

/// DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO structure (Windows 10/11)
///
/// Used to get advanced color information for a display target.
/// This is the legacy structure used on Windows 10 and Windows 11 before 24H2.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO {
    /// Header
    pub header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    /// Anonymous union containing bit fields
    pub value: u32,
    /// Color encoding (DISPLAYCONFIG_COLOR_ENCODING)
    pub colorEncoding: u32,
    /// Bits per color channel
    pub bitsPerColorChannel: u32,
}

impl DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO {
    /// Create a request for the given target
    pub fn new(adapter_id: LUID, target_id: u32) -> Self {
        Self {
            header: DISPLAYCONFIG_DEVICE_INFO_HEADER::new(
                DISPLAYCONFIG_DEVICE_INFO_TYPE::DISPLAYCONFIG_DEVICE_INFO_GET_ADVANCED_COLOR_INFO,
                std::mem::size_of::<Self>(),
                adapter_id,
                target_id,
            ),
            value: 0,
            colorEncoding: 0,
            bitsPerColorChannel: 0,
        }
    }

    /// Check if advanced color (HDR) is supported
    pub fn advancedColorSupported(&self) -> bool {
        (self.value & 0x1) != 0
    }

    /// Check if advanced color (HDR) is enabled
    pub fn advancedColorEnabled(&self) -> bool {
        (self.value & 0x2) != 0
    }

    /// Check if wide color gamut is enforced
    pub fn wideColorEnforced(&self) -> bool {
        (self.value & 0x4) != 0
    }

    /// Check if advanced color is force-disabled
    pub fn advancedColorForceDisabled(&self) -> bool {
        (self.value & 0x8) != 0
    }
}

/// DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE structure (Windows 10/11)
///
/// Used to set advanced color state for a display target.
/// This is the legacy structure used on Windows 10 and Windows 11 before 24H2.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE {
    /// Header
    pub header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    /// Anonymous union containing bit fields
    pub value: u32,
}

impl DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE {
    /// Create a new structure to enable or disable advanced color
    pub fn new(adapter_id: LUID, target_id: u32, enable: bool) -> Self {
        Self {
            header: DISPLAYCONFIG_DEVICE_INFO_HEADER::new(
                DISPLAYCONFIG_DEVICE_INFO_TYPE::DISPLAYCONFIG_DEVICE_INFO_SET_ADVANCED_COLOR_STATE,
                std::mem::size_of::<Self>(),
                adapter_id,
                target_id,
            ),
            value: u32::from(enable),
        }
    }
}

/// DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO_2 structure (Windows 11 24H2+)
///
/// Used to get advanced color information for a display target on Windows 11
/// 24H2+. Provides the active color mode in addition to the capability bits.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO_2 {
    /// Header
    pub header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    /// Color encoding (DISPLAYCONFIG_COLOR_ENCODING)
    pub colorEncoding: u32,
    /// Bits per color channel
    pub bitsPerColorChannel: u32,
    /// Active color mode (DISPLAYCONFIG_ADVANCED_COLOR_MODE)
    pub activeColorMode: u32,
    /// Anonymous union containing bit fields
    pub value: u32,
}

impl DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO_2 {
    /// Create a request for the given target
    pub fn new(adapter_id: LUID, target_id: u32) -> Self {
        Self {
            header: DISPLAYCONFIG_DEVICE_INFO_HEADER::new(
                DISPLAYCONFIG_DEVICE_INFO_TYPE::DISPLAYCONFIG_DEVICE_INFO_GET_ADVANCED_COLOR_INFO_2,
                std::mem::size_of::<Self>(),
                adapter_id,
                target_id,
            ),
            colorEncoding: 0,
            bitsPerColorChannel: 0,
            activeColorMode: 0,
            value: 0,
        }
    }

    /// Check if high dynamic range is supported
    pub fn highDynamicRangeSupported(&self) -> bool {
        (self.value & 0x1) != 0
    }

    /// Check if the display is currently in HDR mode
    pub fn highDynamicRangeActive(&self) -> bool {
        self.activeColorMode
            == DISPLAYCONFIG_ADVANCED_COLOR_MODE::DISPLAYCONFIG_ADVANCED_COLOR_MODE_HDR as u32
    }
}

/// DISPLAYCONFIG_ADVANCED_COLOR_MODE enumeration
///
/// Specifies the active color mode for a display.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DISPLAYCONFIG_ADVANCED_COLOR_MODE {
    DISPLAYCONFIG_ADVANCED_COLOR_MODE_SDR = 0,
    DISPLAYCONFIG_ADVANCED_COLOR_MODE_WCG = 1,
    DISPLAYCONFIG_ADVANCED_COLOR_MODE_HDR = 2,
}

/// DISPLAYCONFIG_SET_HDR_STATE structure (Windows 11 24H2+)
///
/// Used to set HDR state for a display target on Windows 11 24H2+.
/// This is the new structure that replaces DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DISPLAYCONFIG_SET_HDR_STATE {
    /// Header
    pub header: DISPLAYCONFIG_DEVICE_INFO_HEADER,
    /// Anonymous union containing bit fields
    pub value: u32,
}

impl DISPLAYCONFIG_SET_HDR_STATE {
    /// Create a new structure to enable or disable HDR
    pub fn new(adapter_id: LUID, target_id: u32, enable: bool) -> Self {
        Self {
            header: DISPLAYCONFIG_DEVICE_INFO_HEADER::new(
                DISPLAYCONFIG_DEVICE_INFO_TYPE::DISPLAYCONFIG_DEVICE_INFO_SET_HDR_STATE,
                std::mem::size_of::<Self>(),
                adapter_id,
                target_id,
            ),
            value: u32::from(enable),
        }
    }
}

// DISPLAYCONFIG path/mode structures for QueryDisplayConfig

/// QDC_ONLY_ACTIVE_PATHS flag for QueryDisplayConfig
pub const QDC_ONLY_ACTIVE_PATHS: u32 = 0x0000_0002;

/// ERROR_SUCCESS return value of the display configuration functions
pub const ERROR_SUCCESS: i32 = 0;

/// ERROR_INSUFFICIENT_BUFFER: the path/mode arrays were resized between the
/// size query and the config query; retry
pub const ERROR_INSUFFICIENT_BUFFER: i32 = 122;

/// POINTL structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct POINTL {
    pub x: i32,
    pub y: i32,
}

/// DISPLAYCONFIG_2DREGION structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DISPLAYCONFIG_2DREGION {
    pub cx: u32,
    pub cy: u32,
}

/// DISPLAYCONFIG_RATIONAL structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DISPLAYCONFIG_RATIONAL {
    pub Numerator: u32,
    pub Denominator: u32,
}

/// DISPLAYCONFIG_VIDEO_SIGNAL_INFO structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DISPLAYCONFIG_VIDEO_SIGNAL_INFO {
    pub pixelRate: u64,
    pub hSyncFreq: DISPLAYCONFIG_RATIONAL,
    pub vSyncFreq: DISPLAYCONFIG_RATIONAL,
    pub activeSize: DISPLAYCONFIG_2DREGION,
    pub totalSize: DISPLAYCONFIG_2DREGION,
    pub videoStandard: u32,
    pub scanLineOrdering: u32,
}

/// DISPLAYCONFIG_TARGET_MODE structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DISPLAYCONFIG_TARGET_MODE {
    pub targetVideoSignalInfo: DISPLAYCONFIG_VIDEO_SIGNAL_INFO,
}

/// DISPLAYCONFIG_SOURCE_MODE structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DISPLAYCONFIG_SOURCE_MODE {
    pub width: u32,
    pub height: u32,
    pub pixelFormat: u32,
    pub position: POINTL,
}

/// DISPLAYCONFIG_MODE_INFO_TYPE enumeration
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DISPLAYCONFIG_MODE_INFO_TYPE {
    DISPLAYCONFIG_MODE_INFO_TYPE_SOURCE = 1,
    DISPLAYCONFIG_MODE_INFO_TYPE_TARGET = 2,
}

/// DISPLAYCONFIG_MODE_INFO structure (union)
#[repr(C)]
#[derive(Clone, Copy)]
pub struct DISPLAYCONFIG_MODE_INFO {
    pub infoType: DISPLAYCONFIG_MODE_INFO_TYPE,
    pub id: u32,
    pub adapterId: LUID,
    pub modeInfo: DISPLAYCONFIG_MODE_INFO_UNION,
}

/// Union for DISPLAYCONFIG_MODE_INFO
#[repr(C)]
#[derive(Clone, Copy)]
pub union DISPLAYCONFIG_MODE_INFO_UNION {
    pub targetMode: DISPLAYCONFIG_TARGET_MODE,
    pub sourceMode: DISPLAYCONFIG_SOURCE_MODE,
}

impl Default for DISPLAYCONFIG_MODE_INFO {
    #[expect(
        unsafe_code,
        reason = "zeroed() is a valid bit pattern for this plain-data FFI union"
    )]
    fn default() -> Self {
        unsafe { std::mem::zeroed() }
    }
}

impl std::fmt::Debug for DISPLAYCONFIG_MODE_INFO {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DISPLAYCONFIG_MODE_INFO")
            .field("infoType", &self.infoType)
            .field("id", &self.id)
            .field("adapterId", &self.adapterId)
            .finish()
    }
}

/// DISPLAYCONFIG_PATH_SOURCE_INFO structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DISPLAYCONFIG_PATH_SOURCE_INFO {
    pub adapterId: LUID,
    pub id: u32,
    pub modeInfoIdx: u32,
    pub statusFlags: u32,
}

/// DISPLAYCONFIG_PATH_TARGET_INFO structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DISPLAYCONFIG_PATH_TARGET_INFO {
    pub adapterId: LUID,
    pub id: u32,
    pub modeInfoIdx: u32,
    pub outputTechnology: u32,
    pub rotation: u32,
    pub scaling: u32,
    pub refreshRate: DISPLAYCONFIG_RATIONAL,
    pub scanLineOrdering: u32,
    pub targetAvailable: u32,
    pub statusFlags: u32,
}

/// DISPLAYCONFIG_PATH_INFO structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct DISPLAYCONFIG_PATH_INFO {
    pub sourceInfo: DISPLAYCONFIG_PATH_SOURCE_INFO,
    pub targetInfo: DISPLAYCONFIG_PATH_TARGET_INFO,
    pub flags: u32,
}

// Windows API function declarations
// These entry points live in user32.dll and are declared manually because
// the structures they take are the manually-defined ones above.

#[cfg(windows)]
#[expect(
    unsafe_code,
    reason = "manual declarations of the user32 display configuration entry points"
)]
#[link(name = "user32")]
unsafe extern "system" {
    /// Gets the size of the buffers needed for QueryDisplayConfig
    pub fn GetDisplayConfigBufferSizes(
        flags: u32,
        numPathArrayElements: *mut u32,
        numModeInfoArrayElements: *mut u32,
    ) -> i32;

    /// Queries the display configuration
    pub fn QueryDisplayConfig(
        flags: u32,
        numPathArrayElements: *mut u32,
        pathArray: *mut DISPLAYCONFIG_PATH_INFO,
        numModeInfoArrayElements: *mut u32,
        modeInfoArray: *mut DISPLAYCONFIG_MODE_INFO,
        currentTopologyId: *mut u32,
    ) -> i32;

    /// Gets display device information
    pub fn DisplayConfigGetDeviceInfo(requestPacket: *mut DISPLAYCONFIG_DEVICE_INFO_HEADER) -> i32;

    /// Sets display device information
    pub fn DisplayConfigSetDeviceInfo(setPacket: *const DISPLAYCONFIG_DEVICE_INFO_HEADER) -> i32;
}

// Stub implementations for non-Windows platforms so the controller compiles
// (and enumerates nothing) everywhere

#[cfg(not(windows))]
/// Stub implementation for non-Windows platforms
///
/// # Safety
/// This is a stub function that always returns an error. It does not access any memory.
pub unsafe fn GetDisplayConfigBufferSizes(
    _flags: u32,
    _numPathArrayElements: *mut u32,
    _numModeInfoArrayElements: *mut u32,
) -> i32 {
    -1 // ERROR_NOT_SUPPORTED
}

#[cfg(not(windows))]
/// Stub implementation for non-Windows platforms
///
/// # Safety
/// This is a stub function that always returns an error. It does not access any memory.
pub unsafe fn QueryDisplayConfig(
    _flags: u32,
    _numPathArrayElements: *mut u32,
    _pathArray: *mut DISPLAYCONFIG_PATH_INFO,
    _numModeInfoArrayElements: *mut u32,
    _modeInfoArray: *mut DISPLAYCONFIG_MODE_INFO,
    _currentTopologyId: *mut u32,
) -> i32 {
    -1 // ERROR_NOT_SUPPORTED
}

#[cfg(not(windows))]
/// Stub implementation for non-Windows platforms
///
/// # Safety
/// This is a stub function that always returns an error. It does not access any memory.
pub unsafe fn DisplayConfigGetDeviceInfo(
    _requestPacket: *mut DISPLAYCONFIG_DEVICE_INFO_HEADER,
) -> i32 {
    -1 // ERROR_NOT_SUPPORTED
}

#[cfg(not(windows))]
/// Stub implementation for non-Windows platforms
///
/// # Safety
/// This is a stub function that always returns an error. It does not access any memory.
pub unsafe fn DisplayConfigSetDeviceInfo(
    _setPacket: *const DISPLAYCONFIG_DEVICE_INFO_HEADER,
) -> i32 {
    -1 // ERROR_NOT_SUPPORTED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_advanced_color_info_bit_fields() {
        let mut info = DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO::new(LUID::default(), 0);

        info.value = 0x1;
        assert!(info.advancedColorSupported());
        assert!(!info.advancedColorEnabled());
        assert!(!info.wideColorEnforced());

        info.value = 0x2;
        assert!(!info.advancedColorSupported());
        assert!(info.advancedColorEnabled());

        info.value = 0x4;
        assert!(info.wideColorEnforced());

        info.value = 0x3; // supported + enabled
        assert!(info.advancedColorSupported());
        assert!(info.advancedColorEnabled());
        assert!(!info.advancedColorForceDisabled());
    }

    #[test]
    fn test_get_advanced_color_info_2_hdr_active() {
        let mut info = DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO_2::new(LUID::default(), 0);

        info.value = 0x1;
        assert!(info.highDynamicRangeSupported());
        assert!(!info.highDynamicRangeActive());

        info.activeColorMode =
            DISPLAYCONFIG_ADVANCED_COLOR_MODE::DISPLAYCONFIG_ADVANCED_COLOR_MODE_HDR as u32;
        assert!(info.highDynamicRangeActive());

        info.activeColorMode =
            DISPLAYCONFIG_ADVANCED_COLOR_MODE::DISPLAYCONFIG_ADVANCED_COLOR_MODE_SDR as u32;
        assert!(!info.highDynamicRangeActive());
    }

    #[test]
    fn test_set_advanced_color_state_new() {
        let luid = LUID {
            LowPart: 0x1234,
            HighPart: 0x5678,
        };

        let state = DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE::new(luid, 42, true);
        assert_eq!(
            state.header.type_,
            DISPLAYCONFIG_DEVICE_INFO_TYPE::DISPLAYCONFIG_DEVICE_INFO_SET_ADVANCED_COLOR_STATE
        );
        assert_eq!(
            state.header.size as usize,
            std::mem::size_of::<DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE>()
        );
        assert_eq!(state.header.adapterId.LowPart, 0x1234);
        assert_eq!(state.header.id, 42);
        assert_eq!(state.value, 1);

        let state = DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE::new(luid, 42, false);
        assert_eq!(state.value, 0);
    }

    #[test]
    fn test_set_hdr_state_new() {
        let luid = LUID {
            LowPart: 0xABCD,
            HighPart: 0x7F01,
        };

        let state = DISPLAYCONFIG_SET_HDR_STATE::new(luid, 99, true);
        assert_eq!(
            state.header.type_,
            DISPLAYCONFIG_DEVICE_INFO_TYPE::DISPLAYCONFIG_DEVICE_INFO_SET_HDR_STATE
        );
        assert_eq!(state.header.id, 99);
        assert_eq!(state.value, 1);
    }

    #[test]
    fn test_device_name_request_sizes() {
        let source = DISPLAYCONFIG_SOURCE_DEVICE_NAME::new(LUID::default(), 1);
        assert_eq!(
            source.header.size as usize,
            std::mem::size_of::<DISPLAYCONFIG_SOURCE_DEVICE_NAME>()
        );

        let target = DISPLAYCONFIG_TARGET_DEVICE_NAME::new(LUID::default(), 2);
        assert_eq!(
            target.header.size as usize,
            std::mem::size_of::<DISPLAYCONFIG_TARGET_DEVICE_NAME>()
        );
    }

    #[test]
    fn test_structure_alignment() {
        // All request structures must be 4-byte multiples per the API contract
        assert!(std::mem::size_of::<DISPLAYCONFIG_DEVICE_INFO_HEADER>() % 4 == 0);
        assert!(std::mem::size_of::<DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO>() % 4 == 0);
        assert!(std::mem::size_of::<DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO_2>() % 4 == 0);
        assert!(std::mem::size_of::<DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE>() % 4 == 0);
        assert!(std::mem::size_of::<DISPLAYCONFIG_SET_HDR_STATE>() % 4 == 0);
        assert!(std::mem::size_of::<DISPLAYCONFIG_SOURCE_DEVICE_NAME>() % 4 == 0);
        assert!(std::mem::size_of::<DISPLAYCONFIG_TARGET_DEVICE_NAME>() % 4 == 0);
    }
}
