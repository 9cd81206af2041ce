//! Accessibility-based (11+) Notification Center operations.
//!
//! From macOS 11 the banners are subelements of a single Notification
//! Center window that System Events cannot see into, so we walk the AX
//! hierarchy instead: window → scroll area → banner element → group →
//! named button / menu button. Elements are re-resolved on every call;
//! banners appear and disappear outside our control and holding stale
//! references across calls is worse than the extra walk.

use std::{cell::RefCell, collections::HashMap, ffi::c_void, ptr, thread_local};

use core_foundation::{
    array::{CFArray, CFArrayGetCount, CFArrayGetValueAtIndex},
    base::{CFRelease, CFRetain, CFTypeRef, TCFType},
    string::{CFString, CFStringRef},
};
use objc2_app_kit::NSRunningApplication;
use objc2_foundation::NSString;
use tracing::trace;

use crate::error::{Error, Result};

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXUIElementCreateApplication(pid: i32) -> *mut c_void;
    fn AXUIElementCopyAttributeValue(
        element: *mut c_void,
        attr: CFStringRef,
        value: *mut CFTypeRef,
    ) -> i32;
    fn AXUIElementPerformAction(element: *mut c_void, action: CFStringRef) -> i32;
}

/// Bundle identifier of the Notification Center UI process.
const NC_BUNDLE_ID: &str = "com.apple.notificationcenterui";

/// Accessibility name of the close control on modern banners.
const CLOSE_NAME: &str = "Close";
/// Accessibility name of the options disclosure control on modern banners.
const OPTIONS_NAME: &str = "Options";

thread_local! {
    static ATTR_STRINGS: RefCell<HashMap<&'static str, CFString>> = RefCell::new(HashMap::new());
}

/// Return a stable CFStringRef for known attribute/action names. This
/// avoids relying on toll-free bridging of static strings, which can trip
/// pointer authentication on recent macOS versions.
fn cfstr(name: &'static str) -> CFStringRef {
    ATTR_STRINGS.with(|cell| {
        let mut map = cell.borrow_mut();
        let s = map.entry(name).or_insert_with(|| CFString::new(name));
        s.as_concrete_TypeRef()
    })
}

/// Owned AX element reference, released on drop.
struct AXElem(*mut c_void);

impl AXElem {
    /// Take ownership of a +1 reference from a Create/Copy call.
    fn from_create(ptr: *mut c_void) -> Option<Self> {
        if ptr.is_null() { None } else { Some(Self(ptr)) }
    }

    /// Retain a borrowed reference (e.g. out of a CFArray) so it survives
    /// the array's release.
    fn retain_from_borrowed(ptr: *mut c_void) -> Option<Self> {
        if ptr.is_null() {
            None
        } else {
            unsafe { CFRetain(ptr as CFTypeRef) };
            Some(Self(ptr))
        }
    }

    fn as_ptr(&self) -> *mut c_void {
        self.0
    }
}

impl Drop for AXElem {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as CFTypeRef) };
    }
}

/// Fail fast when Accessibility trust is missing; every call in this
/// module would otherwise return opaque AX errors.
fn ax_check() -> Result<()> {
    if permissions::accessibility_ok() {
        Ok(())
    } else {
        Err(Error::Permission)
    }
}

/// Pid of the running Notification Center UI process.
fn nc_pid() -> Result<i32> {
    let apps = unsafe {
        NSRunningApplication::runningApplicationsWithBundleIdentifier(&NSString::from_str(
            NC_BUNDLE_ID,
        ))
    };
    let pid = unsafe { apps.firstObject().map(|app| app.processIdentifier()) };
    pid.ok_or(Error::ServiceNotRunning)
}

/// Read a string attribute, if present.
fn ax_string(element: *mut c_void, attr: &'static str) -> Option<String> {
    let mut v: CFTypeRef = ptr::null_mut();
    let err = unsafe { AXUIElementCopyAttributeValue(element, cfstr(attr), &mut v) };
    if err != 0 || v.is_null() {
        return None;
    }
    let s = unsafe { CFString::wrap_under_create_rule(v as _) };
    Some(s.to_string())
}

/// Read an element-array attribute as owned elements. Missing attributes
/// read as an empty list; banners vary in structure across minor releases.
fn ax_children(element: *mut c_void, attr: &'static str) -> Vec<AXElem> {
    let mut v: CFTypeRef = ptr::null_mut();
    let err = unsafe { AXUIElementCopyAttributeValue(element, cfstr(attr), &mut v) };
    if err != 0 || v.is_null() {
        return Vec::new();
    }
    let arr = unsafe { CFArray::<*const c_void>::wrap_under_create_rule(v as _) };
    let mut out = Vec::new();
    for i in 0..unsafe { CFArrayGetCount(arr.as_concrete_TypeRef()) } {
        let child =
            unsafe { CFArrayGetValueAtIndex(arr.as_concrete_TypeRef(), i) } as *mut c_void;
        if let Some(elem) = AXElem::retain_from_borrowed(child) {
            out.push(elem);
        }
    }
    out
}

/// Perform AXPress on an element.
fn press(elem: &AXElem) -> Result<()> {
    let err = unsafe { AXUIElementPerformAction(elem.as_ptr(), cfstr("AXPress")) };
    if err != 0 {
        return Err(Error::AxCode(err));
    }
    Ok(())
}

/// Enumerate banner elements, front-to-back.
fn banner_elements() -> Result<Vec<AXElem>> {
    ax_check()?;
    let pid = nc_pid()?;
    let app = AXElem::from_create(unsafe { AXUIElementCreateApplication(pid) })
        .ok_or(Error::NotFound)?;
    let mut banners = Vec::new();
    for window in ax_children(app.as_ptr(), "AXWindows") {
        for child in ax_children(window.as_ptr(), "AXChildren") {
            if ax_string(child.as_ptr(), "AXRole").as_deref() == Some("AXScrollArea") {
                banners.extend(ax_children(child.as_ptr(), "AXChildren"));
            }
        }
    }
    trace!(count = banners.len(), "modern_banners");
    Ok(banners)
}

/// Resolve the 1-based `index`th banner.
fn nth_banner(index: usize) -> Result<AXElem> {
    let mut banners = banner_elements()?;
    if index == 0 || index > banners.len() {
        return Err(Error::NotFound);
    }
    Ok(banners.swap_remove(index - 1))
}

/// A pressable control found within a banner's control group.
struct Control {
    /// AX role (AXButton / AXMenuButton).
    role: String,
    /// AXDescription, falling back to AXTitle.
    name: Option<String>,
    /// The element itself.
    elem: AXElem,
}

impl Control {
    fn is_close(&self) -> bool {
        self.name.as_deref() == Some(CLOSE_NAME)
    }

    fn is_options(&self) -> bool {
        self.role == "AXMenuButton" || self.name.as_deref() == Some(OPTIONS_NAME)
    }
}

/// The element hosting a banner's controls: the first AXGroup child when
/// present, otherwise the banner itself.
fn control_host(banner: &AXElem) -> Option<AXElem> {
    for child in ax_children(banner.as_ptr(), "AXChildren") {
        if ax_string(child.as_ptr(), "AXRole").as_deref() == Some("AXGroup") {
            return Some(child);
        }
    }
    AXElem::retain_from_borrowed(banner.as_ptr())
}

/// Collect the pressable controls of a banner in hierarchy order.
fn banner_controls(banner: &AXElem) -> Vec<Control> {
    let Some(host) = control_host(banner) else {
        return Vec::new();
    };
    let mut controls = Vec::new();
    for child in ax_children(host.as_ptr(), "AXChildren") {
        let role = ax_string(child.as_ptr(), "AXRole").unwrap_or_default();
        if role == "AXButton" || role == "AXMenuButton" {
            let name = ax_string(child.as_ptr(), "AXDescription")
                .or_else(|| ax_string(child.as_ptr(), "AXTitle"));
            controls.push(Control {
                role,
                name,
                elem: child,
            });
        }
    }
    controls
}

/// Number of action buttons per displayed banner, front-to-back. The
/// close and options affordances do not count; they are not actions a
/// notification offers, they belong to the panel chrome.
pub fn button_counts() -> Result<Vec<usize>> {
    let banners = banner_elements()?;
    Ok(banners
        .iter()
        .map(|b| {
            banner_controls(b)
                .iter()
                .filter(|c| !c.is_close() && !c.is_options())
                .count()
        })
        .collect())
}

/// Press action button `button` (1-based) of banner `banner` (1-based).
pub fn press_button(banner: usize, button: usize) -> Result<()> {
    let elem = nth_banner(banner)?;
    let actions: Vec<Control> = banner_controls(&elem)
        .into_iter()
        .filter(|c| !c.is_close() && !c.is_options())
        .collect();
    let control = actions
        .get(button.checked_sub(1).ok_or(Error::NotFound)?)
        .ok_or(Error::NotFound)?;
    press(&control.elem)
}

/// Press the banner body itself (activates the owning application).
pub fn press_body(banner: usize) -> Result<()> {
    let elem = nth_banner(banner)?;
    press(&elem)
}

/// Press the close control of banner `banner` (1-based).
pub fn press_close(banner: usize) -> Result<()> {
    let elem = nth_banner(banner)?;
    let controls = banner_controls(&elem);
    let close = controls.iter().find(|c| c.is_close()).ok_or(Error::NotFound)?;
    press(&close.elem)
}

/// Activate the options disclosure control of banner `banner` (1-based).
pub fn press_options(banner: usize) -> Result<()> {
    let elem = nth_banner(banner)?;
    let controls = banner_controls(&elem);
    let options = controls
        .iter()
        .find(|c| c.is_options())
        .ok_or(Error::NotFound)?;
    press(&options.elem)
}
