//! Error types and result alias for the mac-noticenter crate.
use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Crate-local `Result` alias using the bridge error type.
pub type Result<T> = StdResult<T, Error>;

/// Errors produced by the automation bridges.
///
/// Every variant is recoverable from the caller's point of view; a miss
/// against Notification Center is logged and the action degrades to a
/// no-op.
#[derive(Error, Debug)]
pub enum Error {
    /// Spawning a helper process (osascript, killall) failed.
    #[error("failed to spawn helper process: {0}")]
    Spawn(#[from] io::Error),
    /// osascript ran but the script reported an error.
    #[error("AppleScript error: {0}")]
    Script(String),
    /// The script ran but produced output we cannot interpret.
    #[error("unexpected script output: {0}")]
    Parse(String),
    /// Accessibility permission is missing.
    #[error("Accessibility permission missing")]
    Permission,
    /// An AX call returned a non-zero error code.
    #[error("Accessibility call failed with code {0}")]
    AxCode(i32),
    /// The expected panel element was not found in the hierarchy.
    #[error("notification panel element not found")]
    NotFound,
    /// Failure creating a CoreGraphics event source.
    #[error("Failed to create CGEventSource")]
    EventSource,
    /// Failure creating a CoreGraphics event.
    #[error("Failed to create CGEvent")]
    EventCreate,
    /// A CoreGraphics call returned a non-zero error code.
    #[error("CoreGraphics call failed with code {0}")]
    CgCode(i32),
    /// The operation has no implementation on this UI generation.
    #[error("unsupported on this UI generation")]
    Unsupported,
    /// The Notification Center process could not be located.
    #[error("Notification Center process not running")]
    ServiceNotRunning,
}
