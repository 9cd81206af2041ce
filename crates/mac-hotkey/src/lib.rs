//! macOS-only global hotkey manager keyed by key code + modifier mask.
//!
//! A [`Manager`] owns a CoreGraphics event tap on a dedicated thread.
//! Registered combos are matched on KeyDown, swallowed so they never reach
//! the foreground app, and emitted as [`Event`]s on a crossbeam channel.
//!
//! The tap thread starts lazily: [`Manager::new`] is infallible so the
//! process can construct its wiring before the Accessibility permission
//! has been granted, and the tap is brought up by the first
//! [`Manager::set_enabled`]`(true)` once the host decides the permission
//! situation allows it.

mod error;
mod policy;
mod sys;

use std::{collections::HashMap, sync::Arc, thread};

use bitflags::bitflags;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use error::{Error, Result};

bitflags! {
    /// Modifier mask for a hotkey combo.
    ///
    /// The bit values are part of the on-disk shortcut contract and must
    /// not be renumbered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// Shift.
        const SHIFT = 1 << 0;
        /// Control.
        const CONTROL = 1 << 1;
        /// Option / Alt.
        const OPTION = 1 << 2;
        /// Command.
        const COMMAND = 1 << 3;
        /// Function (fn / globe).
        const FUNCTION = 1 << 4;
    }
}

// Persist the mask as its raw integer; unknown bits from a newer version
// are dropped rather than rejected.
impl Serialize for Modifiers {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for Modifiers {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Ok(Self::from_bits_truncate(bits))
    }
}

// CGEventFlags bits relevant to combo matching.
const FLAG_SHIFT: u64 = 1 << 17;
const FLAG_CONTROL: u64 = 1 << 18;
const FLAG_OPTION: u64 = 1 << 19;
const FLAG_COMMAND: u64 = 1 << 20;
const FLAG_FUNCTION: u64 = 1 << 23;

impl Modifiers {
    /// Translate CoreGraphics event flag bits into a modifier mask.
    pub fn from_cg_flags(flags: u64) -> Self {
        let mut mods = Self::empty();
        if flags & FLAG_SHIFT != 0 {
            mods |= Self::SHIFT;
        }
        if flags & FLAG_CONTROL != 0 {
            mods |= Self::CONTROL;
        }
        if flags & FLAG_OPTION != 0 {
            mods |= Self::OPTION;
        }
        if flags & FLAG_COMMAND != 0 {
            mods |= Self::COMMAND;
        }
        if flags & FLAG_FUNCTION != 0 {
            mods |= Self::FUNCTION;
        }
        mods
    }
}

/// A global hotkey combo: a hardware key code plus a modifier mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCombo {
    /// Hardware key code (virtual key code, 0..=0x7F).
    pub key_code: u16,
    /// Modifier mask held together with the key.
    pub modifiers: Modifiers,
}

/// Scancodes of the modifier keys themselves. A combo whose key code is one
/// of these is malformed; modifiers belong in the mask.
const MODIFIER_KEYCODES: [u16; 10] = [
    0x36, 0x37, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F,
];

/// Highest valid virtual key code.
const MAX_KEYCODE: u16 = 0x7F;

/// Event emitted when a registered combo fires. Key-down only; the tap does
/// not observe KeyUp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Registration id returned by [`Manager::register`].
    pub id: u32,
    /// The combo that fired.
    pub combo: KeyCombo,
}

/// Registration table shared with the tap callback.
pub(crate) struct Inner {
    /// Registration id → combo.
    regs: HashMap<u32, KeyCombo>,
    /// While false, the tap matches nothing and swallows nothing.
    enabled: bool,
    /// Next registration id to hand out.
    next_id: u32,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            regs: HashMap::new(),
            enabled: false,
            next_id: 1,
        }
    }
}

/// Shared state captured by the tap callback.
#[derive(Clone)]
pub(crate) struct CallbackCtx {
    /// Registration table + enabled flag.
    pub(crate) inner: Arc<Mutex<Inner>>,
    /// Channel the tap emits matched events on.
    pub(crate) tx: Sender<Event>,
}

/// Match a key-down against the registration table.
///
/// Lowest registration id wins when several registrations share a combo, so
/// duplicate registration is deterministic rather than map-order dependent.
pub(crate) fn match_event(inner: &Inner, key_code: u16, mods: Modifiers) -> Option<u32> {
    inner
        .regs
        .iter()
        .filter(|(_, c)| c.key_code == key_code && c.modifiers == mods)
        .map(|(id, _)| *id)
        .min()
}

/// Tap thread handle state.
enum TapThread {
    /// Not started yet, or stopped.
    Stopped,
    /// Running; holds the join handle.
    Running(thread::JoinHandle<()>),
}

/// Global hotkey manager.
pub struct Manager {
    /// State shared with the tap callback.
    ctx: CallbackCtx,
    /// Receive side of the event channel, cloned out via [`Manager::events`].
    rx: Receiver<Event>,
    /// Run loop control for stopping the tap thread.
    ctrl: Arc<sys::SysControl>,
    /// Tap thread handle.
    tap: Mutex<TapThread>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    /// Create a manager. No OS resources are touched until the tap starts.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            ctx: CallbackCtx {
                inner: Arc::new(Mutex::new(Inner::default())),
                tx,
            },
            rx,
            ctrl: Arc::new(sys::SysControl::new()),
            tap: Mutex::new(TapThread::Stopped),
        }
    }

    /// Receive side of the event channel. May be cloned freely; events are
    /// delivered to whichever clone receives first.
    pub fn events(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    /// Register a combo. Returns an opaque registration id.
    ///
    /// The combo is validated here (key code range, not a bare modifier);
    /// whether it collides with another application's shortcut is not our
    /// concern at this layer.
    pub fn register(&self, combo: KeyCombo) -> Result<u32> {
        if combo.key_code > MAX_KEYCODE || MODIFIER_KEYCODES.contains(&combo.key_code) {
            return Err(Error::InvalidCombo(combo.key_code));
        }
        let mut inner = self.ctx.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.regs.insert(id, combo);
        debug!(id, key_code = combo.key_code, mods = ?combo.modifiers, "hotkey_registered");
        Ok(id)
    }

    /// Release a registration. The combo stops matching immediately.
    pub fn unregister(&self, id: u32) -> Result<()> {
        let mut inner = self.ctx.inner.lock();
        if inner.regs.remove(&id).is_none() {
            return Err(Error::InvalidId);
        }
        debug!(id, "hotkey_unregistered");
        Ok(())
    }

    /// Enable or disable matching. Enabling starts the tap thread if it is
    /// not yet running, which requires the Accessibility permission.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.ctx.inner.lock().enabled = enabled;
        if enabled { self.start() } else { Ok(()) }
    }

    /// Start the tap thread if needed. Idempotent.
    pub fn start(&self) -> Result<()> {
        let mut tap = self.tap.lock();
        if matches!(*tap, TapThread::Running(_)) {
            return Ok(());
        }
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let ctx = self.ctx.clone();
        let ctrl = self.ctrl.clone();
        let handle = thread::Builder::new()
            .name("hotkey-tap".into())
            .spawn(move || {
                if let Err(e) = sys::run_event_loop(ctx, ready_tx, ctrl) {
                    warn!(error = %e, "event_tap_exited_with_error");
                }
            })
            .map_err(|_| Error::EventTapStart)?;
        match ready_rx.recv() {
            Ok(Ok(())) => {
                *tap = TapThread::Running(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::EventTapStart)
            }
        }
    }

    /// Stop the tap thread if running and wait for it to exit.
    pub fn stop(&self) {
        let mut tap = self.tap.lock();
        if let TapThread::Running(handle) = std::mem::replace(&mut *tap, TapThread::Stopped) {
            self.ctrl.stop();
            let _ = handle.join();
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo(key_code: u16, modifiers: Modifiers) -> KeyCombo {
        KeyCombo {
            key_code,
            modifiers,
        }
    }

    #[test]
    fn register_match_unregister() {
        let mgr = Manager::new();
        let id = mgr
            .register(combo(0x28, Modifiers::COMMAND | Modifiers::SHIFT))
            .expect("register");
        {
            let mut inner = mgr.ctx.inner.lock();
            inner.enabled = true;
            assert_eq!(
                match_event(&inner, 0x28, Modifiers::COMMAND | Modifiers::SHIFT),
                Some(id)
            );
            assert_eq!(match_event(&inner, 0x28, Modifiers::COMMAND), None);
        }
        mgr.unregister(id).expect("unregister");
        let inner = mgr.ctx.inner.lock();
        assert_eq!(
            match_event(&inner, 0x28, Modifiers::COMMAND | Modifiers::SHIFT),
            None
        );
    }

    #[test]
    fn unregister_unknown_id_is_an_error() {
        let mgr = Manager::new();
        assert_eq!(mgr.unregister(42), Err(Error::InvalidId));
    }

    #[test]
    fn modifier_keycodes_are_malformed() {
        let mgr = Manager::new();
        assert_eq!(
            mgr.register(combo(0x37, Modifiers::empty())),
            Err(Error::InvalidCombo(0x37))
        );
        assert_eq!(
            mgr.register(combo(0x90, Modifiers::COMMAND)),
            Err(Error::InvalidCombo(0x90))
        );
    }

    #[test]
    fn duplicate_combo_matches_lowest_id() {
        let mgr = Manager::new();
        let first = mgr.register(combo(0x26, Modifiers::CONTROL)).expect("a");
        let _second = mgr.register(combo(0x26, Modifiers::CONTROL)).expect("b");
        let inner = mgr.ctx.inner.lock();
        assert_eq!(match_event(&inner, 0x26, Modifiers::CONTROL), Some(first));
    }

    #[test]
    fn cg_flag_translation() {
        let flags = FLAG_SHIFT | FLAG_COMMAND;
        assert_eq!(
            Modifiers::from_cg_flags(flags),
            Modifiers::SHIFT | Modifiers::COMMAND
        );
        assert_eq!(Modifiers::from_cg_flags(0), Modifiers::empty());
    }
}
