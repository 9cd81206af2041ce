//! Scriptable (10.x) Notification Center operations.
//!
//! On the legacy generation every banner is a top-level window of the
//! "Notification Center" process and System Events can enumerate and click
//! its buttons directly. Window index 1 is the frontmost (newest) banner.

use crate::{
    error::{Error, Result},
    script::run_script,
};

/// Number of action buttons per displayed banner, front-to-back.
/// An empty vector means no banner is displayed.
pub fn button_counts() -> Result<Vec<usize>> {
    let source = "\
tell application \"System Events\"
tell process \"Notification Center\"
set out to \"\"
repeat with w in windows
set out to out & (count of buttons of w) & \",\"
end repeat
end tell
end tell
return out";
    let raw = run_script(source)?;
    parse_counts(&raw)
}

/// Click button `button` (1-based) of banner window `window` (1-based).
pub fn click_button(window: usize, button: usize) -> Result<()> {
    let source = format!(
        "tell application \"System Events\" to tell process \"Notification Center\" \
to click button {button} of window {window}"
    );
    run_script(&source).map(|_| ())
}

/// Click the banner window body itself (activates the owning app).
pub fn click_body(window: usize) -> Result<()> {
    let source = format!(
        "tell application \"System Events\" to tell process \"Notification Center\" \
to click window {window}"
    );
    run_script(&source).map(|_| ())
}

/// Activate the options disclosure control of banner window `window`.
pub fn click_options(window: usize) -> Result<()> {
    let source = format!(
        "tell application \"System Events\" to tell process \"Notification Center\" \
to click menu button 1 of window {window}"
    );
    run_script(&source).map(|_| ())
}

/// Parse the `"2,1,"`-shaped accumulator the count script produces.
fn parse_counts(raw: &str) -> Result<Vec<usize>> {
    let mut counts = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let n = part
            .parse::<usize>()
            .map_err(|_| Error::Parse(raw.to_string()))?;
        counts.push(n);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_counts_typical() {
        assert_eq!(parse_counts("2,1,").expect("parse"), vec![2, 1]);
        assert_eq!(parse_counts("").expect("parse"), Vec::<usize>::new());
        assert_eq!(parse_counts("3").expect("parse"), vec![3]);
    }

    #[test]
    fn parse_counts_garbage_is_an_error() {
        assert!(parse_counts("2,x,").is_err());
    }
}
