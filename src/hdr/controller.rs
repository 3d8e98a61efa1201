//! HDR controller implementation
//!
//! Enumerates active display paths via `QueryDisplayConfig` and reads/sets
//! per-target HDR state with the version-appropriate request structures.
//! The display list is re-enumerated on every `list_displays` call so the
//! engine always sees ground truth; nothing is cached across cycles.

use crate::error::{HdrSyncError, Result, StringError};
use crate::hdr::windows_api::{
    DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO, DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO_2,
    DISPLAYCONFIG_MODE_INFO, DISPLAYCONFIG_MODE_INFO_TYPE, DISPLAYCONFIG_PATH_INFO,
    DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE, DISPLAYCONFIG_SET_HDR_STATE,
    DISPLAYCONFIG_SOURCE_DEVICE_NAME, DISPLAYCONFIG_TARGET_DEVICE_NAME,
    DisplayConfigGetDeviceInfo, DisplayConfigSetDeviceInfo, ERROR_INSUFFICIENT_BUFFER,
    ERROR_SUCCESS, GetDisplayConfigBufferSizes, LUID, QDC_ONLY_ACTIVE_PATHS, QueryDisplayConfig,
};
use crate::hdr::{DisplayBackend, DisplayState, WindowsVersion};
use tracing::{debug, warn};

/// One active display path: the identifiers needed to query and set state
#[derive(Debug, Clone)]
pub struct DisplayTarget {
    /// Adapter LUID
    pub adapter_id: LUID,
    /// Target identifier on the adapter
    pub target_id: u32,
    /// Stable GDI source name (e.g. "\\\\.\\DISPLAY1")
    pub display_id: String,
    /// Monitor friendly name
    pub friendly_name: String,
    /// Whether the source sits at the virtual-desktop origin
    pub is_primary: bool,
}

/// HDR controller over the Display Configuration API
pub struct HdrController {
    windows_version: WindowsVersion,
}

impl HdrController {
    /// Create a new HDR controller, detecting the Windows version to select
    /// the appropriate request structures
    pub fn new() -> Result<Self> {
        let windows_version = WindowsVersion::detect()?;
        debug!("HDR controller using {windows_version:?} API selection");
        Ok(Self { windows_version })
    }

    /// Enumerate all active display paths
    ///
    /// # Safety
    ///
    /// Follows the documented two-call protocol: `GetDisplayConfigBufferSizes`
    /// sizes the arrays, `QueryDisplayConfig` fills them, and a concurrent
    /// topology change surfaces as `ERROR_INSUFFICIENT_BUFFER`, which retries
    /// the whole sequence. The path/mode vectors outlive both calls and the
    /// element counts written back never exceed the allocated capacity.
    #[expect(
        unsafe_code,
        reason = "Windows FFI for QueryDisplayConfig display enumeration"
    )]
    fn enumerate_targets() -> Result<Vec<DisplayTarget>> {
        let (paths, modes) = unsafe {
            loop {
                let mut path_count = 0u32;
                let mut mode_count = 0u32;
                let status = GetDisplayConfigBufferSizes(
                    QDC_ONLY_ACTIVE_PATHS,
                    &raw mut path_count,
                    &raw mut mode_count,
                );
                if status != ERROR_SUCCESS {
                    return Err(HdrSyncError::DisplayQueryFailed(StringError::new(format!(
                        "GetDisplayConfigBufferSizes returned {status}"
                    ))));
                }

                let mut paths =
                    vec![DISPLAYCONFIG_PATH_INFO::default(); path_count as usize];
                let mut modes =
                    vec![DISPLAYCONFIG_MODE_INFO::default(); mode_count as usize];
                let status = QueryDisplayConfig(
                    QDC_ONLY_ACTIVE_PATHS,
                    &raw mut path_count,
                    paths.as_mut_ptr(),
                    &raw mut mode_count,
                    modes.as_mut_ptr(),
                    std::ptr::null_mut(),
                );
                if status == ERROR_INSUFFICIENT_BUFFER {
                    // Topology changed between the two calls; go around again
                    continue;
                }
                if status != ERROR_SUCCESS {
                    return Err(HdrSyncError::DisplayQueryFailed(StringError::new(format!(
                        "QueryDisplayConfig returned {status}"
                    ))));
                }
                paths.truncate(path_count as usize);
                modes.truncate(mode_count as usize);
                break (paths, modes);
            }
        };

        let mut targets = Vec::with_capacity(paths.len());
        for path in &paths {
            let display_id = match Self::query_source_name(path) {
                Some(name) => name,
                None => {
                    warn!(
                        "Skipping display path without a resolvable source name (target {})",
                        path.targetInfo.id
                    );
                    continue;
                }
            };
            let friendly_name =
                Self::query_target_name(path).unwrap_or_else(|| display_id.clone());

            targets.push(DisplayTarget {
                adapter_id: path.targetInfo.adapterId,
                target_id: path.targetInfo.id,
                display_id,
                friendly_name,
                is_primary: Self::is_primary_source(path, &modes),
            });
        }

        debug!("Enumerated {} active display path(s)", targets.len());
        Ok(targets)
    }

    /// GDI source name for a path, used as the stable display id
    ///
    /// # Safety
    ///
    /// The request struct carries its own correct size; the returned wide
    /// string is read only up to its null terminator.
    #[expect(unsafe_code, reason = "Windows FFI for DisplayConfigGetDeviceInfo")]
    fn query_source_name(path: &DISPLAYCONFIG_PATH_INFO) -> Option<String> {
        let mut request =
            DISPLAYCONFIG_SOURCE_DEVICE_NAME::new(path.sourceInfo.adapterId, path.sourceInfo.id);
        let status = unsafe { DisplayConfigGetDeviceInfo(&raw mut request.header) };
        if status != ERROR_SUCCESS {
            return None;
        }
        let name = wide_to_string(&request.viewGdiDeviceName);
        if name.is_empty() { None } else { Some(name) }
    }

    /// Monitor friendly name for a path
    ///
    /// # Safety
    ///
    /// Same contract as `query_source_name`.
    #[expect(unsafe_code, reason = "Windows FFI for DisplayConfigGetDeviceInfo")]
    fn query_target_name(path: &DISPLAYCONFIG_PATH_INFO) -> Option<String> {
        let mut request =
            DISPLAYCONFIG_TARGET_DEVICE_NAME::new(path.targetInfo.adapterId, path.targetInfo.id);
        let status = unsafe { DisplayConfigGetDeviceInfo(&raw mut request.header) };
        if status != ERROR_SUCCESS {
            return None;
        }
        let name = wide_to_string(&request.monitorFriendlyDeviceName);
        if name.is_empty() { None } else { Some(name) }
    }

    /// A source whose desktop position is the origin is the primary display
    ///
    /// # Safety
    ///
    /// The union member read is selected by the mode's `infoType`
    /// discriminant, per the API contract.
    #[expect(
        unsafe_code,
        reason = "reading the discriminant-selected member of the DISPLAYCONFIG_MODE_INFO union"
    )]
    fn is_primary_source(path: &DISPLAYCONFIG_PATH_INFO, modes: &[DISPLAYCONFIG_MODE_INFO]) -> bool {
        let idx = path.sourceInfo.modeInfoIdx as usize;
        let Some(mode) = modes.get(idx) else {
            return false;
        };
        if mode.infoType != DISPLAYCONFIG_MODE_INFO_TYPE::DISPLAYCONFIG_MODE_INFO_TYPE_SOURCE {
            return false;
        }
        let position = unsafe { mode.modeInfo.sourceMode.position };
        position.x == 0 && position.y == 0
    }

    /// HDR capability and current state for one target
    ///
    /// # Safety
    ///
    /// The version-matched request struct carries its own correct size.
    #[expect(unsafe_code, reason = "Windows FFI for DisplayConfigGetDeviceInfo")]
    fn color_info(&self, target: &DisplayTarget) -> Result<(bool, bool)> {
        if self.windows_version.has_dedicated_hdr_api() {
            let mut request = DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO_2::new(
                target.adapter_id,
                target.target_id,
            );
            let status = unsafe { DisplayConfigGetDeviceInfo(&raw mut request.header) };
            if status != ERROR_SUCCESS {
                return Err(HdrSyncError::DisplayQueryFailed(StringError::new(format!(
                    "DisplayConfigGetDeviceInfo (color info 2) returned {status}"
                ))));
            }
            Ok((
                request.highDynamicRangeSupported(),
                request.highDynamicRangeActive(),
            ))
        } else {
            let mut request =
                DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO::new(target.adapter_id, target.target_id);
            let status = unsafe { DisplayConfigGetDeviceInfo(&raw mut request.header) };
            if status != ERROR_SUCCESS {
                return Err(HdrSyncError::DisplayQueryFailed(StringError::new(format!(
                    "DisplayConfigGetDeviceInfo (color info) returned {status}"
                ))));
            }
            let supported =
                request.advancedColorSupported() && !request.advancedColorForceDisabled();
            Ok((supported, request.advancedColorEnabled()))
        }
    }

    /// Set HDR state for one target with the version-appropriate structure
    ///
    /// # Safety
    ///
    /// The request struct carries its own correct size and is read-only to
    /// the API.
    #[expect(unsafe_code, reason = "Windows FFI for DisplayConfigSetDeviceInfo")]
    fn set_hdr_target(&self, target: &DisplayTarget, enable: bool) -> Result<()> {
        let status = if self.windows_version.has_dedicated_hdr_api() {
            let request =
                DISPLAYCONFIG_SET_HDR_STATE::new(target.adapter_id, target.target_id, enable);
            unsafe { DisplayConfigSetDeviceInfo(&raw const request.header) }
        } else {
            let request = DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE::new(
                target.adapter_id,
                target.target_id,
                enable,
            );
            unsafe { DisplayConfigSetDeviceInfo(&raw const request.header) }
        };

        if status != ERROR_SUCCESS {
            return Err(HdrSyncError::HdrControlFailed(StringError::new(format!(
                "DisplayConfigSetDeviceInfo returned {status} for {}",
                target.display_id
            ))));
        }
        Ok(())
    }
}

impl DisplayBackend for HdrController {
    /// Enumerate displays with fresh observed state
    ///
    /// A per-display color-info failure degrades that display to
    /// "unsupported" instead of failing the enumeration.
    fn list_displays(&mut self) -> Result<Vec<DisplayState>> {
        let targets = Self::enumerate_targets()?;
        let mut displays = Vec::with_capacity(targets.len());

        for target in &targets {
            let (hdr_supported, hdr_enabled) = match self.color_info(target) {
                Ok(info) => info,
                Err(e) => {
                    warn!(
                        "Color info query failed for {}, reporting unsupported: {e}",
                        target.display_id
                    );
                    (false, false)
                }
            };
            displays.push(DisplayState {
                display_id: target.display_id.clone(),
                friendly_name: target.friendly_name.clone(),
                is_primary: target.is_primary,
                hdr_supported,
                hdr_enabled,
            });
        }

        Ok(displays)
    }

    fn set_hdr(&mut self, display_id: &str, enable: bool) -> Result<()> {
        let targets = Self::enumerate_targets()?;
        let target = targets
            .iter()
            .find(|t| t.display_id == display_id)
            .ok_or_else(|| HdrSyncError::UnknownDisplay(display_id.to_string()))?;
        self.set_hdr_target(target, enable)
    }
}

/// Convert a null-terminated wide string to a Rust `String`
fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}
