//! Last-resort dismiss path: restart the Notification Center process.

use std::process::Command;

use tracing::{info, warn};

use crate::error::{Error, Result};

/// Terminate NotificationCenter and let launchd respawn it with an empty
/// panel. Used when no per-banner close affordance is reachable, or when a
/// close attempt left the panel on screen.
pub fn relaunch() -> Result<()> {
    let status = Command::new("killall").arg("NotificationCenter").status()?;
    if status.success() {
        info!("notification_center_relaunched");
        Ok(())
    } else {
        warn!(code = ?status.code(), "notification_center_relaunch_failed");
        Err(Error::ServiceNotRunning)
    }
}
