//! Trait seams over the OS-facing collaborators.
//!
//! The OS hotkey table, the panel automation bridges, the pointer, and the
//! trust flags are all process-global mutable state. Handing them to the
//! core as explicit capabilities keeps the engine logic drivable by test
//! doubles (see `test_support`).

use std::sync::Arc;

use mac_hotkey::KeyCombo;
use mac_noticenter::Point;

pub use permissions::PermissionsStatus;

// ---- Hotkey API abstraction ----

/// Minimal hotkey API used by the shortcut registry.
pub trait HotkeyApi: Send + Sync {
    /// Install a combo; returns the opaque registration handle.
    fn register(&self, combo: KeyCombo) -> mac_hotkey::Result<u32>;
    /// Release a registration handle.
    fn unregister(&self, id: u32) -> mac_hotkey::Result<()>;
    /// Master enable switch for the underlying tap.
    fn set_enabled(&self, enabled: bool) -> mac_hotkey::Result<()>;
}

/// Production hotkey API over [`mac_hotkey::Manager`].
pub struct RealHotkeyApi {
    /// The shared manager instance.
    inner: Arc<mac_hotkey::Manager>,
}

impl RealHotkeyApi {
    /// Wrap a shared manager.
    pub fn new(inner: Arc<mac_hotkey::Manager>) -> Self {
        Self { inner }
    }
}

impl HotkeyApi for RealHotkeyApi {
    fn register(&self, combo: KeyCombo) -> mac_hotkey::Result<u32> {
        self.inner.register(combo)
    }
    fn unregister(&self, id: u32) -> mac_hotkey::Result<()> {
        self.inner.unregister(id)
    }
    fn set_enabled(&self, enabled: bool) -> mac_hotkey::Result<()> {
        self.inner.set_enabled(enabled)
    }
}

// ---- Panel automation abstraction ----

/// Snapshot of one displayed panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSnapshot {
    /// 1-based window/banner index, front-to-back.
    pub index: usize,
    /// Number of action buttons the panel exposes.
    pub buttons: usize,
}

/// Panel automation used by the action engine. One implementation per UI
/// generation family; the engine picks per invocation.
pub trait PanelBridge: Send + Sync {
    /// Enumerate displayed panels front-to-back; empty = nothing on screen.
    fn panels(&self) -> mac_noticenter::Result<Vec<PanelSnapshot>>;
    /// Click/press action button `button` (1-based) of panel `panel`.
    fn click_button(&self, panel: usize, button: usize) -> mac_noticenter::Result<()>;
    /// Click/press the panel body itself.
    fn click_body(&self, panel: usize) -> mac_noticenter::Result<()>;
    /// Activate the panel's options disclosure control.
    fn activate_options(&self, panel: usize) -> mac_noticenter::Result<()>;
    /// Press the panel's close affordance, where the generation has one.
    fn close_panel(&self, panel: usize) -> mac_noticenter::Result<()>;
    /// Restart the notification service (dismiss fallback).
    fn relaunch_service(&self) -> mac_noticenter::Result<()>;
}

/// System Events scripting bridge for the legacy (10.x) panel.
pub struct LegacyBridge;

impl PanelBridge for LegacyBridge {
    fn panels(&self) -> mac_noticenter::Result<Vec<PanelSnapshot>> {
        Ok(mac_noticenter::legacy::button_counts()?
            .into_iter()
            .enumerate()
            .map(|(i, buttons)| PanelSnapshot {
                index: i + 1,
                buttons,
            })
            .collect())
    }
    fn click_button(&self, panel: usize, button: usize) -> mac_noticenter::Result<()> {
        mac_noticenter::legacy::click_button(panel, button)
    }
    fn click_body(&self, panel: usize) -> mac_noticenter::Result<()> {
        mac_noticenter::legacy::click_body(panel)
    }
    fn activate_options(&self, panel: usize) -> mac_noticenter::Result<()> {
        mac_noticenter::legacy::click_options(panel)
    }
    fn close_panel(&self, _panel: usize) -> mac_noticenter::Result<()> {
        // Legacy panels have no dedicated close affordance; dismissal goes
        // through button positions chosen by the engine.
        Err(mac_noticenter::Error::Unsupported)
    }
    fn relaunch_service(&self) -> mac_noticenter::Result<()> {
        mac_noticenter::service::relaunch()
    }
}

/// Accessibility traversal bridge for the modern (11+) panel.
pub struct ModernBridge;

impl PanelBridge for ModernBridge {
    fn panels(&self) -> mac_noticenter::Result<Vec<PanelSnapshot>> {
        Ok(mac_noticenter::modern::button_counts()?
            .into_iter()
            .enumerate()
            .map(|(i, buttons)| PanelSnapshot {
                index: i + 1,
                buttons,
            })
            .collect())
    }
    fn click_button(&self, panel: usize, button: usize) -> mac_noticenter::Result<()> {
        mac_noticenter::modern::press_button(panel, button)
    }
    fn click_body(&self, panel: usize) -> mac_noticenter::Result<()> {
        mac_noticenter::modern::press_body(panel)
    }
    fn activate_options(&self, panel: usize) -> mac_noticenter::Result<()> {
        mac_noticenter::modern::press_options(panel)
    }
    fn close_panel(&self, panel: usize) -> mac_noticenter::Result<()> {
        mac_noticenter::modern::press_close(panel)
    }
    fn relaunch_service(&self) -> mac_noticenter::Result<()> {
        mac_noticenter::service::relaunch()
    }
}

// ---- Pointer abstraction ----

/// Pointer primitives used by the coordinate strategies.
pub trait PointerOps: Send + Sync {
    /// Current pointer position.
    fn location(&self) -> mac_noticenter::Result<Point>;
    /// Warp the pointer without generating movement events.
    fn warp(&self, to: Point) -> mac_noticenter::Result<()>;
    /// Hide the cursor sprite until the user next moves the mouse.
    fn hide_until_move(&self);
    /// Post a synthetic left click at `at`.
    fn click(&self, at: Point) -> mac_noticenter::Result<()>;
    /// Fixed warp target near the panel button region.
    fn panel_target(&self) -> Point;
}

/// Production pointer ops over the CoreGraphics primitives.
pub struct SystemPointer;

impl PointerOps for SystemPointer {
    fn location(&self) -> mac_noticenter::Result<Point> {
        mac_noticenter::pointer::location()
    }
    fn warp(&self, to: Point) -> mac_noticenter::Result<()> {
        mac_noticenter::pointer::warp(to)
    }
    fn hide_until_move(&self) {
        mac_noticenter::pointer::hide_until_move();
    }
    fn click(&self, at: Point) -> mac_noticenter::Result<()> {
        mac_noticenter::pointer::click(at)
    }
    fn panel_target(&self) -> Point {
        mac_noticenter::pointer::panel_target()
    }
}

// ---- Permission probe abstraction ----

/// Which System Settings pane to open during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsPane {
    /// Privacy & Security → Accessibility.
    Accessibility,
    /// Privacy & Security → Automation.
    Automation,
}

/// Trust-flag queries + consent prompting, injectable for tests.
pub trait PermissionProbe: Send + Sync {
    /// Snapshot both trust flags.
    fn status(&self) -> PermissionsStatus;
    /// Open the System Settings pane for `pane`, prompting where the OS
    /// supports it.
    fn open_settings(&self, pane: SettingsPane);
}

/// Production probe over the permissions crate.
pub struct SystemProbe;

impl PermissionProbe for SystemProbe {
    fn status(&self) -> PermissionsStatus {
        permissions::check_permissions()
    }
    fn open_settings(&self, pane: SettingsPane) {
        match pane {
            SettingsPane::Accessibility => {
                // Ask the OS for its own prompt too; some users grant from
                // the dialog without ever visiting System Settings.
                let _ = permissions::request_accessibility();
                permissions::open_accessibility_settings();
            }
            SettingsPane::Automation => permissions::open_automation_settings(),
        }
    }
}
