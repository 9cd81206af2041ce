//! macOS event tap (CoreGraphics) integration for hotkey interception.
//!
//! The tap returns `CallbackResult::Drop` for matched combos; CoreGraphics
//! only suppresses delivery when the tap returns a NULL event at the C
//! boundary, which is exactly what `Drop` maps to in the `core-graphics`
//! wrapper. Anything else would let the keystroke through to the focused
//! app alongside our action.

use std::{
    ffi::c_void,
    sync::{
        Arc,
        atomic::{AtomicPtr, Ordering},
    },
};

use core_foundation::{
    base::TCFType,
    mach_port::CFMachPortRef,
    runloop::{CFRunLoop, kCFRunLoopCommonModes},
};
use core_graphics::event::{self as cge, CallbackResult};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{CallbackCtx, Event, KeyCombo, Modifiers};

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

/// CGEventField constant for the virtual key code of a keyboard event.
const FIELD_KEYBOARD_EVENT_KEYCODE: u32 = 9;

// Shared control handle to stop the run loop from other threads.
pub(crate) struct SysControl {
    /// Run loop of the tap thread, once started.
    rl: Mutex<Option<CFRunLoop>>,
}

impl SysControl {
    pub(crate) fn new() -> Self {
        Self {
            rl: Mutex::new(None),
        }
    }

    pub(crate) fn set_rl(&self, rl: CFRunLoop) {
        let mut guard = self.rl.lock();
        *guard = Some(rl);
    }

    pub(crate) fn stop(&self) {
        let mut guard = self.rl.lock();
        if let Some(rl) = guard.take() {
            rl.stop();
        }
    }
}

/// Run the event tap on the current thread until stopped.
///
/// Sends the startup outcome on `ready` exactly once before entering the
/// run loop, so the spawning thread can surface permission and tap-creation
/// failures synchronously.
pub(crate) fn run_event_loop(
    cb_ctx: CallbackCtx,
    ready: Sender<crate::Result<()>>,
    ctrl: Arc<SysControl>,
) -> crate::Result<()> {
    // The tap silently receives nothing without Accessibility trust, so
    // fail loudly up front instead.
    if !permissions::accessibility_ok() {
        warn!("accessibility_permission_missing");
        let _ = ready.send(Err(crate::Error::PermissionDenied("Accessibility")));
        return Err(crate::Error::PermissionDenied("Accessibility"));
    }

    // Capture for re-enabling the tap from inside the closure.
    let tap_port_ptr: Arc<AtomicPtr<c_void>> = Arc::new(AtomicPtr::new(std::ptr::null_mut()));

    debug!("creating_event_tap");
    let tap_port_ptr_cb = tap_port_ptr.clone();
    let tx: Sender<Event> = cb_ctx.tx.clone();
    let inner = cb_ctx.inner;
    let tap = match cge::CGEventTap::new(
        cge::CGEventTapLocation::HID,
        cge::CGEventTapPlacement::HeadInsertEventTap,
        cge::CGEventTapOptions::Default,
        vec![cge::CGEventType::KeyDown],
        move |_proxy, etype, event| match etype {
            cge::CGEventType::KeyDown => {
                let key_code = event.get_integer_value_field(FIELD_KEYBOARD_EVENT_KEYCODE) as u16;
                let mods = Modifiers::from_cg_flags(event.get_flags().bits());
                let (enabled, matched) = {
                    let guard = inner.lock();
                    (guard.enabled, crate::match_event(&guard, key_code, mods))
                };
                let decision = crate::policy::classify(enabled, matched);
                trace!(key_code, mods = ?mods, ?matched, enabled, "tap_event");
                if decision.emit
                    && let Some(id) = matched
                {
                    let _ = tx.send(Event {
                        id,
                        combo: KeyCombo {
                            key_code,
                            modifiers: mods,
                        },
                    });
                }
                if decision.intercept {
                    trace!("intercepting_event");
                    return CallbackResult::Drop;
                }
                CallbackResult::Keep
            }
            cge::CGEventType::TapDisabledByTimeout | cge::CGEventType::TapDisabledByUserInput => {
                let port = tap_port_ptr_cb.load(Ordering::SeqCst) as CFMachPortRef;
                if !port.is_null() {
                    warn!("tap_disabled_by_os_reenabling");
                    unsafe { CGEventTapEnable(port, true) };
                }
                CallbackResult::Keep
            }
            _ => CallbackResult::Keep,
        },
    ) {
        Ok(t) => t,
        Err(_) => {
            warn!("event_tap_create_failed");
            let _ = ready.send(Err(crate::Error::EventTapStart));
            return Err(crate::Error::EventTapStart);
        }
    };

    // Share the CFMachPort for re-enabling inside the callback.
    tap_port_ptr.store(
        tap.mach_port().as_concrete_TypeRef() as *mut c_void,
        Ordering::SeqCst,
    );

    let source = match tap.mach_port().create_runloop_source(0) {
        Ok(s) => s,
        Err(_) => {
            warn!("run_loop_source_create_failed");
            let _ = ready.send(Err(crate::Error::EventTapStart));
            return Err(crate::Error::EventTapStart);
        }
    };

    let rl = CFRunLoop::get_current();
    ctrl.set_rl(rl.clone());
    let mode = unsafe { kCFRunLoopCommonModes };
    rl.add_source(&source, mode);

    tap.enable();

    let _ = ready.send(Ok(()));
    debug!("event_tap_started_run_loop");

    CFRunLoop::run_current();

    debug!("event_tap_exited");
    Ok(())
}
