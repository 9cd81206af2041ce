//! Notification Center UI generation detection.
//!
//! The automation surface of Notification Center has drifted across macOS
//! releases: through 10.15 every banner is a plain window whose buttons
//! System Events can click; from 11 the banners live inside a single
//! window and are reachable only through the Accessibility hierarchy.
//! Within the legacy range the button ordering changed in 10.15, which is
//! all [`LegacyLayout`] captures.

use objc2_foundation::NSProcessInfo;

/// Button-ordering variant of the legacy (scriptable) panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyLayout {
    /// 10.14 and earlier: the close control is the first button.
    Mojave,
    /// 10.15: the close control moved to the last button position.
    Catalina,
}

/// Detected Notification Center UI generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// 10.x: banners are scriptable windows; coordinate strategies apply.
    Legacy(LegacyLayout),
    /// 11+: banners are reached through the Accessibility hierarchy.
    Modern,
}

impl Generation {
    /// Detect the generation of the running OS.
    pub fn detect() -> Self {
        Self::from_version(os_version())
    }

    /// Pure mapping from an OS product version to a generation.
    pub fn from_version((major, minor): (i64, i64)) -> Self {
        if major >= 11 {
            Self::Modern
        } else if minor >= 15 {
            Self::Legacy(LegacyLayout::Catalina)
        } else {
            Self::Legacy(LegacyLayout::Mojave)
        }
    }

    /// Whether this generation uses the coordinate-based strategies.
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

/// Product version (major, minor) of the running OS.
pub fn os_version() -> (i64, i64) {
    let version = unsafe { NSProcessInfo::processInfo().operatingSystemVersion() };
    (version.majorVersion as i64, version.minorVersion as i64)
}

/// Whether the OS gates Apple Events behind a separate Automation consent.
/// True since 10.14; older systems run a three-step setup flow.
pub fn automation_consent_required() -> bool {
    let (major, minor) = os_version();
    major >= 11 || (major == 10 && minor >= 14)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mapping() {
        assert_eq!(
            Generation::from_version((10, 14)),
            Generation::Legacy(LegacyLayout::Mojave)
        );
        assert_eq!(
            Generation::from_version((10, 15)),
            Generation::Legacy(LegacyLayout::Catalina)
        );
        assert_eq!(Generation::from_version((11, 0)), Generation::Modern);
        assert_eq!(Generation::from_version((14, 3)), Generation::Modern);
    }

    #[test]
    fn legacy_predicate() {
        assert!(Generation::from_version((10, 13)).is_legacy());
        assert!(!Generation::from_version((12, 0)).is_legacy());
    }
}
