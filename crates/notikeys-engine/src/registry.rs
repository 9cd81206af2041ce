//! In-memory bridge between the shortcut store and the OS hotkey facility.
//!
//! The registry owns every OS registration handle. Two invariants hold at
//! all times: at most one live handle per identifier (rebind releases the
//! old handle before installing the new combo), and zero live handles
//! while deactivated (so no hotkey can fire while the system is disabled).

use std::{collections::HashMap, sync::Arc};

use mac_hotkey::KeyCombo;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    deps::HotkeyApi,
    store::{ShortcutId, ShortcutSpec},
};

/// Why a bind was refused. Never fatal; the shortcut is left unbound.
#[derive(Debug, Error)]
pub enum BindError {
    /// The pluggable conflict predicate reported the combo as taken.
    #[error("combo already in use")]
    Taken,
    /// The OS layer refused the registration.
    #[error("registration rejected: {0}")]
    Rejected(#[from] mac_hotkey::Error),
}

/// Pluggable "is this combo already used elsewhere" check.
///
/// The default never reports a conflict, which mirrors the historical
/// behavior; this hook exists so a future version can tighten it without
/// changing callers.
pub type ConflictPredicate = Arc<dyn Fn(&KeyCombo) -> bool + Send + Sync>;

/// Mutable registry state.
struct Inner {
    /// Descriptors the registry would install when active.
    bound: HashMap<ShortcutId, ShortcutSpec>,
    /// Live OS registration handles, one per identifier at most.
    live: HashMap<ShortcutId, u32>,
    /// Whether hotkeys are currently installed.
    active: bool,
}

/// Registry of shortcut bindings and their OS registrations.
pub struct ShortcutRegistry {
    /// OS hotkey facility.
    api: Arc<dyn HotkeyApi>,
    /// Conflict check applied before registering a combo.
    conflict: ConflictPredicate,
    /// Registration state.
    inner: Mutex<Inner>,
}

impl ShortcutRegistry {
    /// Create a registry with the permissive default conflict predicate.
    pub fn new(api: Arc<dyn HotkeyApi>) -> Self {
        Self::with_conflict_predicate(api, Arc::new(|_| false))
    }

    /// Create a registry with a custom conflict predicate.
    pub fn with_conflict_predicate(api: Arc<dyn HotkeyApi>, conflict: ConflictPredicate) -> Self {
        Self {
            api,
            conflict,
            inner: Mutex::new(Inner {
                bound: HashMap::new(),
                live: HashMap::new(),
                active: false,
            }),
        }
    }

    /// Install (or clear, when `spec` is `None`) the descriptor for `id`.
    ///
    /// Any existing OS registration for `id` is released first, even when
    /// the new descriptor is empty, so two handles for one identifier can
    /// never coexist.
    pub fn bind(&self, id: ShortcutId, spec: Option<ShortcutSpec>) -> Result<(), BindError> {
        let mut inner = self.inner.lock();
        if let Some(handle) = inner.live.remove(&id)
            && let Err(e) = self.api.unregister(handle)
        {
            warn!(id = %id, error = %e, "stale_hotkey_unregister_failed");
        }
        let Some(spec) = spec else {
            inner.bound.remove(&id);
            debug!(id = %id, "shortcut_unbound");
            return Ok(());
        };
        if (self.conflict)(&spec.combo) {
            inner.bound.remove(&id);
            return Err(BindError::Taken);
        }
        if inner.active {
            match self.api.register(spec.combo) {
                Ok(handle) => {
                    inner.live.insert(id, handle);
                }
                Err(e) => {
                    inner.bound.remove(&id);
                    return Err(BindError::Rejected(e));
                }
            }
        }
        inner.bound.insert(id, spec);
        debug!(id = %id, "shortcut_bound");
        Ok(())
    }

    /// Clear the descriptor for `id`. Infallible by construction.
    pub fn unbind(&self, id: ShortcutId) {
        let _ = self.bind(id, None);
    }

    /// Install OS hotkeys for every bound identifier, skipping unbound
    /// ones. Idempotent: a second call while active does nothing.
    pub fn activate_all(&self) {
        let mut inner = self.inner.lock();
        if inner.active {
            return;
        }
        inner.active = true;
        if let Err(e) = self.api.set_enabled(true) {
            warn!(error = %e, "hotkey_tap_enable_failed");
        }
        for id in ShortcutId::ALL {
            let Some(spec) = inner.bound.get(&id).cloned() else {
                continue;
            };
            match self.api.register(spec.combo) {
                Ok(handle) => {
                    inner.live.insert(id, handle);
                }
                Err(e) => warn!(id = %id, error = %e, "hotkey_register_failed"),
            }
        }
        debug!(count = inner.live.len(), "hotkeys_activated");
    }

    /// Release every live registration. Never errors; a revoked permission
    /// must always be able to quiesce the registry.
    pub fn deactivate_all(&self) {
        let mut inner = self.inner.lock();
        inner.active = false;
        if let Err(e) = self.api.set_enabled(false) {
            warn!(error = %e, "hotkey_tap_disable_failed");
        }
        for (id, handle) in inner.live.drain() {
            if let Err(e) = self.api.unregister(handle) {
                warn!(id = %id, error = %e, "hotkey_unregister_failed");
            }
        }
        debug!("hotkeys_deactivated");
    }

    /// Whether hotkeys are currently installed.
    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Map a live registration handle back to its identifier.
    pub fn resolve(&self, handle: u32) -> Option<ShortcutId> {
        self.inner
            .lock()
            .live
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(id, _)| *id)
    }

    /// Identifiers with live OS registrations, in display order.
    pub fn live_snapshot(&self) -> Vec<ShortcutId> {
        let inner = self.inner.lock();
        ShortcutId::ALL
            .into_iter()
            .filter(|id| inner.live.contains_key(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use mac_hotkey::Modifiers;

    use super::*;
    use crate::test_support::MockHotkeyApi;

    fn spec(key_code: u16) -> ShortcutSpec {
        ShortcutSpec {
            combo: KeyCombo {
                key_code,
                modifiers: Modifiers::COMMAND,
            },
            characters: None,
        }
    }

    fn active_registry() -> (Arc<MockHotkeyApi>, ShortcutRegistry) {
        let api = Arc::new(MockHotkeyApi::new());
        let registry = ShortcutRegistry::new(api.clone());
        registry.activate_all();
        (api, registry)
    }

    #[test]
    fn repeated_identical_bind_leaves_one_live_registration() {
        let (api, registry) = active_registry();
        registry.bind(ShortcutId::Reply, Some(spec(0x0F))).expect("bind");
        registry.bind(ShortcutId::Reply, Some(spec(0x0F))).expect("rebind");
        assert_eq!(api.live_count(), 1);
        // Both binds went through the OS: release, then install.
        assert_eq!(api.registered_total(), 2);
    }

    #[test]
    fn bind_empty_descriptor_releases_without_installing() {
        let (api, registry) = active_registry();
        registry.bind(ShortcutId::Open, Some(spec(0x1F))).expect("bind");
        assert_eq!(api.live_count(), 1);
        registry.bind(ShortcutId::Open, None).expect("unbind");
        assert_eq!(api.live_count(), 0);
        assert!(registry.live_snapshot().is_empty());
    }

    #[test]
    fn bind_while_inactive_installs_nothing() {
        let api = Arc::new(MockHotkeyApi::new());
        let registry = ShortcutRegistry::new(api.clone());
        registry.bind(ShortcutId::Reply, Some(spec(0x0F))).expect("bind");
        assert_eq!(api.live_count(), 0);
    }

    #[test]
    fn deactivate_then_activate_restores_the_same_set() {
        let (api, registry) = active_registry();
        registry.bind(ShortcutId::Reply, Some(spec(0x0F))).expect("bind");
        registry.bind(ShortcutId::Dismiss, Some(spec(0x10))).expect("bind");
        let before = registry.live_snapshot();

        registry.deactivate_all();
        assert_eq!(api.live_count(), 0);
        assert!(!api.is_enabled());

        registry.activate_all();
        assert_eq!(registry.live_snapshot(), before);
        assert_eq!(api.live_count(), 2);
        assert!(api.is_enabled());
    }

    #[test]
    fn activate_all_is_idempotent() {
        let (api, registry) = active_registry();
        registry.bind(ShortcutId::Reply, Some(spec(0x0F))).expect("bind");
        let total = api.registered_total();
        registry.activate_all();
        registry.activate_all();
        assert_eq!(api.registered_total(), total);
        assert_eq!(api.live_count(), 1);
    }

    #[test]
    fn deactivate_all_tolerates_nothing_registered() {
        let api = Arc::new(MockHotkeyApi::new());
        let registry = ShortcutRegistry::new(api);
        registry.deactivate_all();
        registry.deactivate_all();
        assert!(!registry.is_active());
    }

    #[test]
    fn conflict_predicate_rejects_with_taken() {
        let api = Arc::new(MockHotkeyApi::new());
        let registry =
            ShortcutRegistry::with_conflict_predicate(api.clone(), Arc::new(|_| true));
        registry.activate_all();
        let err = registry
            .bind(ShortcutId::Reply, Some(spec(0x0F)))
            .expect_err("taken");
        assert!(matches!(err, BindError::Taken));
        assert_eq!(api.live_count(), 0);
    }

    #[test]
    fn os_rejection_surfaces_and_leaves_identifier_unbound() {
        let (api, registry) = active_registry();
        api.set_fail_register(true);
        let err = registry
            .bind(ShortcutId::Reply, Some(spec(0x0F)))
            .expect_err("rejected");
        assert!(matches!(err, BindError::Rejected(_)));
        api.set_fail_register(false);
        // The failed bind left nothing behind to re-activate.
        registry.deactivate_all();
        registry.activate_all();
        assert_eq!(api.live_count(), 0);
    }

    #[test]
    fn resolve_maps_live_handles_to_identifiers() {
        let (_api, registry) = active_registry();
        registry.bind(ShortcutId::Options, Some(spec(0x2F))).expect("bind");
        let handle = {
            let inner = registry.inner.lock();
            *inner.live.get(&ShortcutId::Options).expect("live handle")
        };
        assert_eq!(registry.resolve(handle), Some(ShortcutId::Options));
        assert_eq!(registry.resolve(handle + 99), None);
    }

    #[test]
    fn unbound_identifiers_are_skipped_on_activation() {
        let api = Arc::new(MockHotkeyApi::new());
        let registry = ShortcutRegistry::new(api.clone());
        registry.bind(ShortcutId::Reply, Some(spec(0x0F))).expect("bind");
        // Only one of four identifiers is bound.
        registry.activate_all();
        assert_eq!(api.live_count(), 1);
        assert_eq!(registry.live_snapshot(), vec![ShortcutId::Reply]);
    }
}
