//! Thin osascript wrapper for the AppleScript bridge.

use std::process::Command;

use tracing::trace;

use crate::error::{Error, Result};

/// Run an AppleScript source through `osascript`, one `-e` per line.
///
/// Returns the script's result string (trimmed). A non-zero exit maps to
/// [`Error::Script`] carrying osascript's stderr, which is where System
/// Events reports missing elements and denied Apple Events.
pub(crate) fn run_script(source: &str) -> Result<String> {
    let mut cmd = Command::new("osascript");
    for line in source.lines() {
        cmd.arg("-e").arg(line);
    }
    let out = cmd.output()?;
    if out.status.success() {
        let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
        trace!(result = %stdout, "osascript_ok");
        Ok(stdout)
    } else {
        Err(Error::Script(
            String::from_utf8_lossy(&out.stderr).trim().to_string(),
        ))
    }
}
