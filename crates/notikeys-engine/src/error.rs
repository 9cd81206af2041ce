//! Error types and result alias for the engine crate.
use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the NotiKeys engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Errors originating from the hotkey layer.
    #[error("Hotkey manager error: {0}")]
    Hotkey(#[from] mac_hotkey::Error),

    /// I/O failure while reading or writing the shortcuts file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The shortcuts file could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The user's home directory could not be resolved.
    #[error("Home directory not found")]
    NoHome,
}
