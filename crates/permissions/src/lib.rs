//! Simple, macOS-only permission checks for NotiKeys.
//!
//! Two trust flags gate the whole application: Accessibility (needed to
//! intercept key events and to drive Notification Center through the AX
//! APIs) and Automation (Apple Events to System Events, consented
//! separately by the OS since 10.14). This crate exposes a minimal, stable
//! API to query both and to surface the OS consent prompts. Guiding the
//! user through setup is the host's job; the `open_*_settings` helpers
//! only launch the relevant pane.
//!
//! Notes
//! - `accessibility_ok()` / `automation_ok()` are queries; `automation_ok`
//!   issues a harmless Apple Event, which is the only way the OS exposes
//!   that flag (the first such call may trigger the consent prompt).
//! - `request_accessibility()` asks the OS to show the Accessibility
//!   consent prompt.

use std::process::Command;

use core_foundation::{
    base::TCFType,
    boolean::CFBoolean,
    dictionary::{CFDictionary, CFDictionaryRef},
    string::{CFString, CFStringRef},
};
use serde::Serialize;
use tracing::warn;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
    static kAXTrustedCheckOptionPrompt: CFStringRef;
}

/// OSStatus rendered by osascript when the Apple Events consent is missing.
const ERR_AE_EVENT_NOT_PERMITTED: &str = "-1743";

/// Harmless Apple Event used to probe the Automation flag.
const AUTOMATION_PROBE: &str = "tell application \"System Events\" to count processes";

/// Check if the application has the Accessibility permission (silent).
pub fn accessibility_ok() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// Ask the OS to show the Accessibility consent prompt.
///
/// Returns the current trust state; granting happens asynchronously in
/// System Settings, so callers should keep polling [`accessibility_ok`].
pub fn request_accessibility() -> bool {
    trusted_with_options(true)
}

/// Query Accessibility trust with an explicit prompt option.
fn trusted_with_options(prompt: bool) -> bool {
    let key = unsafe { CFString::wrap_under_get_rule(kAXTrustedCheckOptionPrompt) };
    let value = if prompt {
        CFBoolean::true_value()
    } else {
        CFBoolean::false_value()
    };
    let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);
    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) }
}

/// Check if the application may send Apple Events to System Events.
///
/// There is no silent query for this flag; we issue a harmless scripted
/// call and interpret a permission-denied error as "not granted". The
/// first call from an undetermined state makes the OS show its consent
/// prompt, which is exactly what the setup flow wants.
pub fn automation_ok() -> bool {
    let out = Command::new("osascript")
        .arg("-e")
        .arg(AUTOMATION_PROBE)
        .output();
    match out {
        Ok(o) if o.status.success() => true,
        Ok(o) => {
            let stderr = String::from_utf8_lossy(&o.stderr);
            if stderr.contains(ERR_AE_EVENT_NOT_PERMITTED) {
                warn!("automation_permission_missing");
            } else {
                warn!(stderr = %stderr.trim(), "automation_probe_failed");
            }
            false
        }
        Err(e) => {
            warn!(error = %e, "automation_probe_spawn_failed");
            false
        }
    }
}

/// Current permission status for the process.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PermissionsStatus {
    /// Accessibility (AX) permission; `true` if granted.
    pub accessibility_ok: bool,
    /// Automation (Apple Events) permission; `true` if granted.
    pub automation_ok: bool,
}

/// Query both Accessibility and Automation permissions.
pub fn check_permissions() -> PermissionsStatus {
    PermissionsStatus {
        accessibility_ok: accessibility_ok(),
        automation_ok: automation_ok(),
    }
}

/// Open macOS Accessibility settings in System Settings.
pub fn open_accessibility_settings() {
    if Command::new("open")
        .arg("x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility")
        .spawn()
        .is_err()
    {
        warn!("failed to open Accessibility settings");
    }
}

/// Open macOS Automation settings in System Settings.
pub fn open_automation_settings() {
    if Command::new("open")
        .arg("x-apple.systempreferences:com.apple.preference.security?Privacy_Automation")
        .spawn()
        .is_err()
    {
        warn!("failed to open Automation settings");
    }
}
