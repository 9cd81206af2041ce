//! Error types and result alias for the mac-hotkey crate.
use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type used throughout this crate.
pub type Result<T> = StdResult<T, Error>;

/// Error variants produced by this crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Event tap could not be created or initialized.
    #[error("Event tap failed to start")]
    EventTapStart,
    /// Missing or denied system permission.
    #[error("Permission denied: {0}")]
    PermissionDenied(&'static str),
    /// No active registration exists for the provided id.
    #[error("Invalid registration id")]
    InvalidId,
    /// The combo cannot be registered (the key code is not bindable).
    #[error("Malformed combo: key code {0:#04x} is not bindable")]
    InvalidCombo(u16),
}
