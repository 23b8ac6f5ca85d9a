//! Window enumeration.
//!
//! Provides the `WindowSource` seam the detection pipeline runs against,
//! plus the macOS implementation that enumerates visible windows through
//! the CoreGraphics window list. Every poll cycle takes a fresh snapshot;
//! handles are never held across cycles.

use crate::config::DetectionConfig;
use crate::types::WindowInfo;
use tracing::trace;

/// Source of window snapshots.
///
/// "No windows" is an empty vec, not an error. Implementations must be
/// cheap enough to call once per poll cycle.
pub trait WindowSource: Send + Sync {
    fn list_windows(&self) -> Vec<WindowInfo>;
}

/// Enumerates real OS windows.
pub struct SystemWindowSource;

impl SystemWindowSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemWindowSource {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowSource for SystemWindowSource {
    fn list_windows(&self) -> Vec<WindowInfo> {
        let windows = platform::get_windows();
        trace!("Enumerated {} windows", windows.len());
        windows
    }
}

/// Filter a snapshot down to presentation-window candidates.
///
/// A window qualifies when its owning application matches a configured
/// process signature OR its title carries a configured indicator; both
/// checks are case-insensitive.
pub fn presentation_candidates<'a>(
    windows: &'a [WindowInfo],
    config: &DetectionConfig,
) -> Vec<&'a WindowInfo> {
    windows
        .iter()
        .filter(|w| {
            let app = w.app_name.to_lowercase();
            let title = w.title.to_lowercase();
            config
                .process_signatures
                .iter()
                .any(|sig| app.contains(&sig.to_lowercase()))
                || config
                    .title_indicators
                    .iter()
                    .any(|ind| title.contains(&ind.to_lowercase()))
        })
        .collect()
}

#[cfg(target_os = "macos")]
mod platform {
    use crate::types::{WindowBounds, WindowInfo};
    use core_foundation::array::CFArray;
    use core_foundation::base::{CFType, TCFType};
    use core_foundation::boolean::CFBoolean;
    use core_foundation::dictionary::CFDictionary;
    use core_foundation::number::CFNumber;
    use core_foundation::string::CFString;
    use core_graphics::window::{
        kCGNullWindowID, kCGWindowListExcludeDesktopElements, kCGWindowListOptionOnScreenOnly,
        CGWindowListCopyWindowInfo,
    };

    /// Get all visible windows. The window list is ordered front-to-back,
    /// so the first normal on-screen window is the focused one.
    pub fn get_windows() -> Vec<WindowInfo> {
        let options = kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements;

        let window_list: CFArray<CFDictionary<CFString, CFType>> = unsafe {
            let list_ref = CGWindowListCopyWindowInfo(options, kCGNullWindowID);
            if list_ref.is_null() {
                return vec![];
            }
            CFArray::wrap_under_create_rule(list_ref)
        };

        let mut windows = Vec::new();
        let mut focus_assigned = false;

        for i in 0..window_list.len() {
            if let Some(dict) = window_list.get(i) {
                if let Some(mut window) = parse_window_dict(&dict) {
                    if !focus_assigned {
                        window.is_focused = true;
                        focus_assigned = true;
                    }
                    windows.push(window);
                }
            }
        }

        windows
    }

    fn parse_window_dict(dict: &CFDictionary<CFString, CFType>) -> Option<WindowInfo> {
        // Get window ID
        let window_id = get_dict_number(dict, "kCGWindowNumber")? as u64;

        // Get owner PID
        let pid = get_dict_number(dict, "kCGWindowOwnerPID")? as u32;

        // Get window layer (skip non-normal windows)
        let layer = get_dict_number(dict, "kCGWindowLayer").unwrap_or(0);
        if layer != 0 {
            return None; // Skip menu bars, docks, etc.
        }

        // Skip windows not on the current Space
        let is_on_screen = get_dict_bool(dict, "kCGWindowIsOnscreen").unwrap_or(false);
        if !is_on_screen {
            return None;
        }

        // Get window bounds
        let bounds = get_window_bounds(dict)?;

        // Skip tiny windows (tooltips, popups)
        if bounds.width < 100 || bounds.height < 100 {
            return None;
        }

        // Get window title
        let title = get_dict_string(dict, "kCGWindowName").unwrap_or_default();

        // Get owner name (app name)
        let app_name = get_dict_string(dict, "kCGWindowOwnerName").unwrap_or_default();

        Some(WindowInfo {
            id: window_id,
            title,
            app_name,
            bounds,
            pid,
            is_focused: false,
        })
    }

    fn get_dict_number(dict: &CFDictionary<CFString, CFType>, key: &str) -> Option<i64> {
        let cf_key = CFString::new(key);
        dict.find(&cf_key).and_then(|value| {
            if value.type_of() == CFNumber::type_id() {
                let num: CFNumber =
                    unsafe { CFNumber::wrap_under_get_rule(value.as_CFTypeRef() as *const _) };
                num.to_i64()
            } else {
                None
            }
        })
    }

    fn get_dict_bool(dict: &CFDictionary<CFString, CFType>, key: &str) -> Option<bool> {
        let cf_key = CFString::new(key);
        dict.find(&cf_key).and_then(|value| {
            // kCGWindowIsOnscreen is stored as CFNumber
            if value.type_of() == CFNumber::type_id() {
                let num: CFNumber =
                    unsafe { CFNumber::wrap_under_get_rule(value.as_CFTypeRef() as *const _) };
                return num.to_i32().map(|n| n != 0);
            }
            if value.type_of() == CFBoolean::type_id() {
                let b: CFBoolean =
                    unsafe { CFBoolean::wrap_under_get_rule(value.as_CFTypeRef() as *const _) };
                return Some(b.into());
            }
            None
        })
    }

    fn get_dict_string(dict: &CFDictionary<CFString, CFType>, key: &str) -> Option<String> {
        let cf_key = CFString::new(key);
        dict.find(&cf_key).and_then(|value| {
            if value.type_of() == CFString::type_id() {
                let s: CFString =
                    unsafe { CFString::wrap_under_get_rule(value.as_CFTypeRef() as *const _) };
                Some(s.to_string())
            } else {
                None
            }
        })
    }

    fn get_window_bounds(dict: &CFDictionary<CFString, CFType>) -> Option<WindowBounds> {
        let cf_key = CFString::new("kCGWindowBounds");
        let bounds_dict = dict.find(&cf_key)?;

        // Bounds is a CFDictionary with X, Y, Width, Height
        if bounds_dict.type_of() != CFDictionary::<CFString, CFType>::type_id() {
            return None;
        }

        let bounds: CFDictionary<CFString, CFType> = unsafe {
            CFDictionary::wrap_under_get_rule(bounds_dict.as_CFTypeRef() as *const _)
        };

        let x = get_dict_number_f64(&bounds, "X")? as i32;
        let y = get_dict_number_f64(&bounds, "Y")? as i32;
        let width = get_dict_number_f64(&bounds, "Width")? as u32;
        let height = get_dict_number_f64(&bounds, "Height")? as u32;

        Some(WindowBounds::new(x, y, width, height))
    }

    fn get_dict_number_f64(dict: &CFDictionary<CFString, CFType>, key: &str) -> Option<f64> {
        let cf_key = CFString::new(key);
        dict.find(&cf_key).and_then(|value| {
            if value.type_of() == CFNumber::type_id() {
                let num: CFNumber =
                    unsafe { CFNumber::wrap_under_get_rule(value.as_CFTypeRef() as *const _) };
                num.to_f64()
            } else {
                None
            }
        })
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use crate::types::WindowInfo;

    pub fn get_windows() -> Vec<WindowInfo> {
        vec![]
    }
}
