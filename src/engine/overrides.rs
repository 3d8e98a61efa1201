//! Ignore and target-override resolution
//!
//! Both maps share a key space derived from process identity:
//!
//! - `path:<absolute path>` - exact executable path
//! - `pathprefix:<prefix>` - path prefix (ignore map only)
//! - `name:<process name>` - bare lowercase process name
//!
//! Ignore priority is exact path, then the longest matching path prefix, then
//! name, then the built-in ignored OS-directory prefix, then the built-in
//! ignored-name set. Default-ignore decisions are reported back so the caller
//! can record them into the ignore map, making them visible and editable
//! afterward. Override priority is exact path, then name; path prefixes do
//! not apply to overrides.

use std::collections::BTreeMap;
use std::path::Path;

/// Prefix of exact-path keys
pub const PATH_KEY: &str = "path:";
/// Prefix of path-prefix keys
pub const PATH_PREFIX_KEY: &str = "pathprefix:";
/// Prefix of process-name keys
pub const NAME_KEY: &str = "name:";

/// Shell helpers, window-manager surfaces, browsers, and background brokers
/// that routinely present fullscreen-like windows and must never drive HDR
const DEFAULT_IGNORED_NAMES: &[&str] = &[
    "applicationframehost",
    "brave",
    "chrome",
    "dwm",
    "explorer",
    "firefox",
    "gamebar",
    "lockapp",
    "msedge",
    "msedgewebview2",
    "opera",
    "runtimebroker",
    "searchhost",
    "shellexperiencehost",
    "startmenuexperiencehost",
    "steamwebhelper",
    "systemsettings",
    "taskmgr",
    "textinputhost",
    "vivaldi",
];

/// Result of resolving a process's ignore state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreResolution {
    /// The key that decided the state; `None` when nothing applied
    pub key: Option<String>,
    /// Whether the process is ignored
    pub ignored: bool,
    /// True when a built-in default decided the state and the entry should be
    /// recorded back into the ignore map
    pub default_applied: bool,
}

/// Build an exact-path key for the map
pub fn path_key(path: &Path) -> String {
    format!("{PATH_KEY}{}", normalize_path(path))
}

/// Build a path-prefix key for the map
pub fn path_prefix_key(prefix: &str) -> String {
    format!("{PATH_PREFIX_KEY}{}", prefix.to_ascii_lowercase())
}

/// Build a process-name key for the map
pub fn name_key(bare_name: &str) -> String {
    format!("{NAME_KEY}{}", bare_name.to_ascii_lowercase())
}

/// Resolve the effective ignore state for a process identity
///
/// `bare_name` is the lowercase executable name without extension.
pub fn resolve_ignore(
    bare_name: &str,
    exe_path: Option<&Path>,
    ignore_map: &BTreeMap<String, bool>,
) -> IgnoreResolution {
    let normalized_path = exe_path.map(normalize_path);

    if let Some(norm) = &normalized_path {
        if let Some(&ignored) = ignore_map.get(&format!("{PATH_KEY}{norm}")) {
            return IgnoreResolution {
                key: Some(format!("{PATH_KEY}{norm}")),
                ignored,
                default_applied: false,
            };
        }

        // Longest matching pathprefix entry wins
        let mut best: Option<(&str, bool)> = None;
        for (key, &ignored) in ignore_map {
            if let Some(prefix) = key.strip_prefix(PATH_PREFIX_KEY) {
                if norm.starts_with(&prefix.to_ascii_lowercase())
                    && best.is_none_or(|(b, _)| prefix.len() > b.len())
                {
                    best = Some((prefix, ignored));
                }
            }
        }
        if let Some((prefix, ignored)) = best {
            return IgnoreResolution {
                key: Some(format!("{PATH_PREFIX_KEY}{prefix}")),
                ignored,
                default_applied: false,
            };
        }
    }

    let name_entry = name_key(bare_name);
    if let Some(&ignored) = ignore_map.get(&name_entry) {
        return IgnoreResolution {
            key: Some(name_entry),
            ignored,
            default_applied: false,
        };
    }

    // Built-in default: anything under the OS install directory
    if let (Some(norm), Some(os_prefix)) = (&normalized_path, default_os_path_prefix()) {
        if norm.starts_with(&os_prefix) {
            return IgnoreResolution {
                key: Some(path_prefix_key(&os_prefix)),
                ignored: true,
                default_applied: true,
            };
        }
    }

    // Built-in default: well-known shell/browser/broker names
    if DEFAULT_IGNORED_NAMES
        .binary_search(&bare_name.to_ascii_lowercase().as_str())
        .is_ok()
    {
        return IgnoreResolution {
            key: Some(name_entry),
            ignored: true,
            default_applied: true,
        };
    }

    IgnoreResolution {
        key: None,
        ignored: false,
        default_applied: false,
    }
}

/// Resolve the effective target-display override for a process identity
///
/// Returns the deciding key and the target display; `None` means the rule's
/// own target (or Default) governs.
pub fn resolve_override(
    bare_name: &str,
    exe_path: Option<&Path>,
    overrides: &BTreeMap<String, String>,
) -> Option<(String, String)> {
    if let Some(path) = exe_path {
        let key = path_key(path);
        if let Some(target) = overrides.get(&key) {
            return Some((key, target.clone()));
        }
    }

    let key = name_key(bare_name);
    overrides.get(&key).map(|target| (key, target.clone()))
}

/// Lowercased, backslash-normalized path string used for key comparisons
fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('/', "\\").to_ascii_lowercase()
}

/// The OS install directory, lowercased, from the environment
fn default_os_path_prefix() -> Option<String> {
    std::env::var("SystemRoot")
        .or_else(|_| std::env::var("windir"))
        .ok()
        .map(|p| p.replace('/', "\\").to_ascii_lowercase())
}
