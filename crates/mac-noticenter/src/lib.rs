//! Automation bridges for the macOS Notification Center panel.
//!
//! NotiKeys drives a UI surface it does not own, through whichever side
//! door the OS release leaves open:
//!
//! - [`legacy`] — System Events scripting against 10.x banner windows
//! - [`modern`] — Accessibility traversal for 11+ banners
//! - [`pointer`] — pointer save/warp/click primitives for the coordinate
//!   strategies
//! - [`service`] — process-restart fallback when no close affordance is
//!   reachable
//! - [`Generation`] — which strategy family applies on the running OS
//!
//! All operations are stateless and re-resolve their targets per call; the
//! panel changes underneath us at any time and that is not an error here,
//! it surfaces as [`Error::NotFound`] for the caller to log.

mod error;
mod generation;
pub mod legacy;
pub mod modern;
pub mod pointer;
mod script;
pub mod service;

pub use error::{Error, Result};
pub use generation::{Generation, LegacyLayout, automation_consent_required, os_version};
pub use pointer::Point;
