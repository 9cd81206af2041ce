//! Pure decision logic for the event tap callback.

/// What the tap should do with a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Decision {
    /// Deliver an [`crate::Event`] to the client channel.
    pub emit: bool,
    /// Swallow the event so it never reaches the foreground app.
    pub intercept: bool,
}

/// Classify how the tap should handle a given key-down.
///
/// - While the manager is disabled, nothing is emitted or intercepted;
///   every event passes through untouched.
/// - An unmatched combo passes through untouched.
/// - A matched combo is always both emitted and swallowed: a global
///   shortcut must not also type into the focused app.
pub(crate) fn classify(enabled: bool, matched: Option<u32>) -> Decision {
    if !enabled || matched.is_none() {
        return Decision {
            emit: false,
            intercept: false,
        };
    }
    Decision {
        emit: true,
        intercept: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_ignores_everything() {
        let d = classify(false, Some(7));
        assert!(!d.emit);
        assert!(!d.intercept);
    }

    #[test]
    fn non_match_passes_through() {
        let d = classify(true, None);
        assert!(!d.emit);
        assert!(!d.intercept);
    }

    #[test]
    fn match_emits_and_swallows() {
        let d = classify(true, Some(7));
        assert!(d.emit);
        assert!(d.intercept);
    }
}
