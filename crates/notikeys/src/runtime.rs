//! Composition root: build every component, wire the channels, run until
//! interrupted.
//!
//! There is no shared-instance access anywhere; each component is
//! constructed exactly once here and handed to its consumers explicitly.

use std::{sync::Arc, time::Duration};

use mac_noticenter::Generation;
use notikeys_engine::{
    ActionDispatcher, ActionEngine, LegacyBridge, ModernBridge, PermissionProbe,
    PermissionsStatus, RealHotkeyApi, SetupEvent, SetupStateMachine, ShortcutId, ShortcutRegistry,
    ShortcutStore, SystemPointer, SystemProbe, Ticker,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

/// Poll interval of the post-setup permission watch.
const REVOCATION_WATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Ticker id of the post-setup permission watch.
const REVOCATION_WATCH: &str = "revocation-watch";

/// Whether the given status satisfies the arming condition.
fn armed(status: &PermissionsStatus, requires_automation: bool) -> bool {
    status.accessibility_ok && (status.automation_ok || !requires_automation)
}

/// Run the app runtime until ctrl-c.
pub async fn run() -> notikeys_engine::Result<()> {
    let probe: Arc<dyn PermissionProbe> = Arc::new(SystemProbe);
    let requires_automation = mac_noticenter::automation_consent_required();

    let store = Arc::new(ShortcutStore::load(ShortcutStore::default_path()?)?);
    info!(path = %store.path().display(), "shortcut_store_loaded");

    let manager = Arc::new(mac_hotkey::Manager::new());
    let api = Arc::new(RealHotkeyApi::new(manager.clone()));
    let registry = Arc::new(ShortcutRegistry::new(api));
    for id in ShortcutId::ALL {
        if let Err(e) = registry.bind(id, store.get(id)) {
            warn!(id = %id, error = %e, "initial_bind_failed");
        }
    }

    let engine = ActionEngine::new(
        Arc::new(LegacyBridge),
        Arc::new(ModernBridge),
        Arc::new(SystemPointer),
        Arc::new(Generation::detect),
    );
    let dispatcher = ActionDispatcher::new(registry.clone(), engine);
    let _dispatch_thread =
        dispatcher.spawn(manager.events(), tokio::runtime::Handle::current())?;

    // Store changes rebind immediately; the store persists before it
    // notifies, so re-reading here always observes the new descriptor.
    {
        let store_rx = store.clone();
        let registry_rx = registry.clone();
        let mut changes = store.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(id) => {
                        if let Err(e) = registry_rx.bind(id, store_rx.get(id)) {
                            warn!(id = %id, error = %e, "rebind_failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    let (setup_tx, mut setup_rx) = mpsc::unbounded_channel();
    let setup = SetupStateMachine::new(probe.clone(), requires_automation, setup_tx);

    // Arm immediately when both flags are already granted; otherwise run
    // the onboarding flow. With no setup window to click Start in, the
    // runtime presses it: the relevant settings pane opens right away.
    if armed(&probe.status(), requires_automation) {
        registry.activate_all();
        info!("armed_at_startup");
    } else {
        setup.run();
        setup.start();
    }

    // Setup completion arms the registry.
    {
        let registry_arm = registry.clone();
        tokio::spawn(async move {
            while let Some(SetupEvent::Completed) = setup_rx.recv().await {
                registry_arm.activate_all();
                info!("hotkeys_armed");
            }
        });
    }

    // Post-setup revocation watch: a trust flag flipping false disarms
    // everything and replays the setup flow until re-granted.
    let watch = Ticker::new();
    {
        let registry_watch = registry.clone();
        let probe_watch = probe.clone();
        let setup_watch = setup.clone();
        watch.start(
            REVOCATION_WATCH.into(),
            REVOCATION_WATCH_INTERVAL,
            REVOCATION_WATCH_INTERVAL,
            move || {
                if !registry_watch.is_active() {
                    return;
                }
                if !armed(&probe_watch.status(), requires_automation) {
                    warn!("permission_revoked_disarming");
                    registry_watch.deactivate_all();
                    setup_watch.reset();
                    setup_watch.run();
                    setup_watch.start();
                }
            },
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting_down");
    watch.clear_async().await;
    setup.shutdown().await;
    registry.deactivate_all();
    manager.stop();
    Ok(())
}
