//! NotiKeys Engine
//!
//! Coordinates everything between the OS hotkey facility and the
//! Notification Center automation bridges:
//! - [`ShortcutStore`]: persisted identifier → descriptor mapping with
//!   change notifications
//! - [`ShortcutRegistry`]: OS hotkey registrations with atomic rebind and
//!   an activation gate
//! - [`ActionDispatcher`]: fired hotkeys → async engine invocations
//! - [`ActionEngine`]: the per-invocation automation state machine
//! - [`SetupStateMachine`]: permission-gated readiness and onboarding
//!
//! This crate is macOS-only by design. The OS-facing collaborators are
//! injected through trait seams ([`HotkeyApi`], [`PanelBridge`],
//! [`PointerOps`], [`PermissionProbe`]); production implementations wrap
//! the `mac-hotkey`, `mac-noticenter`, and `permissions` crates, and
//! [`test_support`] provides doubles.

mod action;
mod deps;
mod dispatch;
mod error;
mod registry;
mod setup;
mod store;
pub mod test_support;
mod ticker;

pub use action::{ActionEngine, ActionKind, GenerationDetect};
pub use deps::{
    HotkeyApi, LegacyBridge, ModernBridge, PanelBridge, PanelSnapshot, PermissionProbe,
    PermissionsStatus, PointerOps, RealHotkeyApi, SettingsPane, SystemPointer, SystemProbe,
};
pub use dispatch::ActionDispatcher;
pub use error::{Error, Result};
pub use registry::{BindError, ConflictPredicate, ShortcutRegistry};
pub use setup::{SetupEvent, SetupPhase, SetupStateMachine, SetupStep};
pub use store::{ShortcutId, ShortcutSpec, ShortcutStore};
pub use ticker::Ticker;
