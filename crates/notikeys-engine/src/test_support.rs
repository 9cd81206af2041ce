//! Mock collaborators for exercising the engine without the OS.
//!
//! Used by this crate's unit and integration tests; exported so downstream
//! crates can drive the engine in their own tests too.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use mac_hotkey::KeyCombo;
use mac_noticenter::{Error as BridgeError, Point};
use parking_lot::Mutex;
use permissions::PermissionsStatus;

use crate::deps::{HotkeyApi, PanelBridge, PanelSnapshot, PermissionProbe, PointerOps, SettingsPane};

/// Counting hotkey API with injectable failure.
#[derive(Default)]
pub struct MockHotkeyApi {
    /// Next handle to hand out.
    next: AtomicU32,
    /// Currently live handles.
    live: Mutex<Vec<u32>>,
    /// Total successful register calls.
    registered_total: AtomicUsize,
    /// When true, every register call is refused.
    fail_register: AtomicBool,
    /// Last set_enabled argument.
    enabled: AtomicBool,
}

impl MockHotkeyApi {
    /// Fresh mock with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent register calls fail.
    pub fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    /// Handles currently registered with the OS.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Total register calls that succeeded.
    pub fn registered_total(&self) -> usize {
        self.registered_total.load(Ordering::SeqCst)
    }

    /// Last enable state pushed down.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl HotkeyApi for MockHotkeyApi {
    fn register(&self, combo: KeyCombo) -> mac_hotkey::Result<u32> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(mac_hotkey::Error::InvalidCombo(combo.key_code));
        }
        let handle = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.live.lock().push(handle);
        self.registered_total.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn unregister(&self, id: u32) -> mac_hotkey::Result<()> {
        let mut live = self.live.lock();
        let Some(pos) = live.iter().position(|h| *h == id) else {
            return Err(mac_hotkey::Error::InvalidId);
        };
        live.remove(pos);
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) -> mac_hotkey::Result<()> {
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

/// Scriptable panel bridge: a list of button counts plus recorded clicks.
pub struct MockPanelBridge {
    /// Button count per displayed panel, front-to-back.
    panels: Mutex<Vec<usize>>,
    /// Recorded (panel, button) clicks.
    button_clicks: Mutex<Vec<(usize, usize)>>,
    /// Recorded body clicks.
    body_clicks: Mutex<Vec<usize>>,
    /// Recorded options activations.
    options: Mutex<Vec<usize>>,
    /// Recorded close presses.
    closes: Mutex<Vec<usize>>,
    /// Service relaunch count.
    relaunches: AtomicUsize,
    /// Whether panels expose a close affordance.
    close_supported: AtomicBool,
    /// Whether a successful close removes the panel from the snapshot.
    close_removes_panel: AtomicBool,
    /// When true, every action call fails with a script error.
    fail_actions: AtomicBool,
}

impl MockPanelBridge {
    /// Bridge displaying panels with the given button counts.
    pub fn with_panels(panels: Vec<usize>) -> Self {
        Self {
            panels: Mutex::new(panels),
            button_clicks: Mutex::new(Vec::new()),
            body_clicks: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
            relaunches: AtomicUsize::new(0),
            close_supported: AtomicBool::new(true),
            close_removes_panel: AtomicBool::new(true),
            fail_actions: AtomicBool::new(false),
        }
    }

    /// Replace the displayed panels.
    pub fn set_panels(&self, panels: Vec<usize>) {
        *self.panels.lock() = panels;
    }

    /// Toggle the close affordance.
    pub fn set_close_supported(&self, supported: bool) {
        self.close_supported.store(supported, Ordering::SeqCst);
    }

    /// Toggle whether close removes the panel (panel "survives" a close).
    pub fn set_close_removes_panel(&self, removes: bool) {
        self.close_removes_panel.store(removes, Ordering::SeqCst);
    }

    /// Make every action call fail.
    pub fn fail_actions(&self) {
        self.fail_actions.store(true, Ordering::SeqCst);
    }

    /// Recorded (panel, button) clicks.
    pub fn button_clicks(&self) -> Vec<(usize, usize)> {
        self.button_clicks.lock().clone()
    }

    /// Recorded body clicks.
    pub fn body_clicks(&self) -> Vec<usize> {
        self.body_clicks.lock().clone()
    }

    /// Recorded options activations.
    pub fn options_activations(&self) -> Vec<usize> {
        self.options.lock().clone()
    }

    /// Recorded close presses.
    pub fn closes(&self) -> Vec<usize> {
        self.closes.lock().clone()
    }

    /// Service relaunch count.
    pub fn relaunches(&self) -> usize {
        self.relaunches.load(Ordering::SeqCst)
    }

    /// Shared failure gate for action calls.
    fn gate(&self) -> mac_noticenter::Result<()> {
        if self.fail_actions.load(Ordering::SeqCst) {
            Err(BridgeError::Script("mock action failure".into()))
        } else {
            Ok(())
        }
    }
}

impl PanelBridge for MockPanelBridge {
    fn panels(&self) -> mac_noticenter::Result<Vec<PanelSnapshot>> {
        Ok(self
            .panels
            .lock()
            .iter()
            .enumerate()
            .map(|(i, buttons)| PanelSnapshot {
                index: i + 1,
                buttons: *buttons,
            })
            .collect())
    }

    fn click_button(&self, panel: usize, button: usize) -> mac_noticenter::Result<()> {
        self.gate()?;
        self.button_clicks.lock().push((panel, button));
        Ok(())
    }

    fn click_body(&self, panel: usize) -> mac_noticenter::Result<()> {
        self.gate()?;
        self.body_clicks.lock().push(panel);
        Ok(())
    }

    fn activate_options(&self, panel: usize) -> mac_noticenter::Result<()> {
        self.gate()?;
        self.options.lock().push(panel);
        Ok(())
    }

    fn close_panel(&self, panel: usize) -> mac_noticenter::Result<()> {
        self.gate()?;
        if !self.close_supported.load(Ordering::SeqCst) {
            return Err(BridgeError::Unsupported);
        }
        self.closes.lock().push(panel);
        if self.close_removes_panel.load(Ordering::SeqCst) {
            let mut panels = self.panels.lock();
            if panel >= 1 && panel <= panels.len() {
                panels.remove(panel - 1);
            }
        }
        Ok(())
    }

    fn relaunch_service(&self) -> mac_noticenter::Result<()> {
        self.gate()?;
        self.relaunches.fetch_add(1, Ordering::SeqCst);
        self.panels.lock().clear();
        Ok(())
    }
}

/// Pointer double tracking the simulated cursor position.
pub struct MockPointer {
    /// Simulated current position.
    current: Mutex<Point>,
    /// Recorded warp targets, in order.
    warps: Mutex<Vec<Point>>,
    /// Recorded synthetic clicks.
    clicks: Mutex<Vec<Point>>,
    /// Hide-until-move call count.
    hides: AtomicUsize,
}

impl MockPointer {
    /// Pointer starting at `at`.
    pub fn new(at: Point) -> Self {
        Self {
            current: Mutex::new(at),
            warps: Mutex::new(Vec::new()),
            clicks: Mutex::new(Vec::new()),
            hides: AtomicUsize::new(0),
        }
    }

    /// Simulated current position.
    pub fn current(&self) -> Point {
        *self.current.lock()
    }

    /// Recorded warp targets.
    pub fn warps(&self) -> Vec<Point> {
        self.warps.lock().clone()
    }

    /// Recorded synthetic clicks.
    pub fn clicks(&self) -> Vec<Point> {
        self.clicks.lock().clone()
    }

    /// Hide-until-move call count.
    pub fn hides(&self) -> usize {
        self.hides.load(Ordering::SeqCst)
    }
}

impl PointerOps for MockPointer {
    fn location(&self) -> mac_noticenter::Result<Point> {
        Ok(*self.current.lock())
    }

    fn warp(&self, to: Point) -> mac_noticenter::Result<()> {
        self.warps.lock().push(to);
        *self.current.lock() = to;
        Ok(())
    }

    fn hide_until_move(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }

    fn click(&self, at: Point) -> mac_noticenter::Result<()> {
        self.clicks.lock().push(at);
        Ok(())
    }

    fn panel_target(&self) -> Point {
        Point { x: 1370.0, y: 60.0 }
    }
}

/// Probe with mutable flags and recorded settings-pane opens.
pub struct MockProbe {
    /// Accessibility flag.
    accessibility: AtomicBool,
    /// Automation flag.
    automation: AtomicBool,
    /// Panes opened via the probe.
    opened: Mutex<Vec<SettingsPane>>,
}

impl MockProbe {
    /// Probe with initial flag values.
    pub fn new(accessibility: bool, automation: bool) -> Self {
        Self {
            accessibility: AtomicBool::new(accessibility),
            automation: AtomicBool::new(automation),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Flip the accessibility flag.
    pub fn set_accessibility(&self, granted: bool) {
        self.accessibility.store(granted, Ordering::SeqCst);
    }

    /// Flip the automation flag.
    pub fn set_automation(&self, granted: bool) {
        self.automation.store(granted, Ordering::SeqCst);
    }

    /// Panes opened so far.
    pub fn opened(&self) -> Vec<SettingsPane> {
        self.opened.lock().clone()
    }
}

impl PermissionProbe for MockProbe {
    fn status(&self) -> PermissionsStatus {
        PermissionsStatus {
            accessibility_ok: self.accessibility.load(Ordering::SeqCst),
            automation_ok: self.automation.load(Ordering::SeqCst),
        }
    }

    fn open_settings(&self, pane: SettingsPane) {
        self.opened.lock().push(pane);
    }
}
