//! End-to-end engine flows against mock collaborators.

use std::{sync::Arc, time::Duration};

use mac_hotkey::{Event, KeyCombo, Modifiers};
use mac_noticenter::{Generation, Point};
use notikeys_engine::{
    ActionDispatcher, ActionEngine, SetupEvent, SetupStateMachine, ShortcutId, ShortcutRegistry,
    ShortcutSpec, ShortcutStore,
    test_support::{MockHotkeyApi, MockPanelBridge, MockPointer, MockProbe},
};
use tokio::sync::mpsc;

fn spec(key_code: u16) -> ShortcutSpec {
    ShortcutSpec {
        combo: KeyCombo {
            key_code,
            modifiers: Modifiers::COMMAND | Modifiers::OPTION,
        },
        characters: None,
    }
}

fn mock_engine(bridge: Arc<MockPanelBridge>, pointer: Arc<MockPointer>) -> ActionEngine {
    ActionEngine::new(
        bridge.clone(),
        bridge,
        pointer,
        Arc::new(|| Generation::Modern),
    )
}

/// Fresh store on disk → all four identifiers exist as unbound keys, and a
/// recorded shortcut round-trips through a bind into a live registration.
#[test]
fn store_to_registry_flow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ShortcutStore::load(dir.path().join("shortcuts.json")).expect("load");
    for id in ShortcutId::ALL {
        assert!(store.get(id).is_none());
    }

    let api = Arc::new(MockHotkeyApi::new());
    let registry = Arc::new(ShortcutRegistry::new(api.clone()));
    let mut changes = store.subscribe();

    store.set(ShortcutId::Reply, Some(spec(0x0F))).expect("set");

    // The runtime reacts to the change event by re-reading and rebinding.
    let changed = changes.try_recv().expect("change event");
    registry
        .bind(changed, store.get(changed))
        .expect("bind from store");

    registry.activate_all();
    assert_eq!(api.live_count(), 1);
    assert_eq!(registry.live_snapshot(), vec![ShortcutId::Reply]);
}

/// A fired hotkey travels: event channel → dispatcher thread → async
/// engine invocation → panel bridge.
#[tokio::test(flavor = "multi_thread")]
async fn hotkey_event_reaches_the_panel_bridge() {
    let api = Arc::new(MockHotkeyApi::new());
    let registry = Arc::new(ShortcutRegistry::new(api));
    registry.activate_all();
    registry
        .bind(ShortcutId::Reply, Some(spec(0x0F)))
        .expect("bind");
    let handle = {
        // The mock API hands out handles starting at 1.
        registry.resolve(1).expect("registered");
        1
    };

    let bridge = Arc::new(MockPanelBridge::with_panels(vec![2]));
    let pointer = Arc::new(MockPointer::new(Point { x: 0.0, y: 0.0 }));
    let engine = mock_engine(bridge.clone(), pointer);

    let (tx, rx) = crossbeam_channel::unbounded::<Event>();
    let dispatcher = ActionDispatcher::new(registry, engine);
    let join = dispatcher
        .spawn(rx, tokio::runtime::Handle::current())
        .expect("spawn dispatcher");

    tx.send(Event {
        id: handle,
        combo: spec(0x0F).combo,
    })
    .expect("send event");

    // Give the dispatcher thread and the spawned action a moment.
    for _ in 0..50 {
        if !bridge.button_clicks().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(bridge.button_clicks(), vec![(1, 2)]);

    drop(tx);
    join.join().expect("dispatcher thread");
}

/// Granting both permissions arms the registry through the setup event,
/// and revocation deactivates every hotkey (the runtime's watch calls
/// deactivate_all + reset).
#[tokio::test]
async fn arming_and_revocation_flow() {
    let api = Arc::new(MockHotkeyApi::new());
    let registry = Arc::new(ShortcutRegistry::new(api.clone()));
    registry
        .bind(ShortcutId::Dismiss, Some(spec(0x10)))
        .expect("bind");

    let probe = Arc::new(MockProbe::new(false, false));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let setup = SetupStateMachine::new(probe.clone(), true, tx);
    setup.run();

    setup.on_poll_tick();
    assert!(rx.try_recv().is_err());
    assert_eq!(api.live_count(), 0);

    probe.set_accessibility(true);
    probe.set_automation(true);
    setup.on_poll_tick();
    assert!(matches!(rx.try_recv(), Ok(SetupEvent::Completed)));

    registry.activate_all();
    assert_eq!(api.live_count(), 1);

    // Revocation: the permission watch notices and quiesces everything.
    probe.set_accessibility(false);
    registry.deactivate_all();
    setup.reset();
    assert_eq!(api.live_count(), 0);
    assert!(!registry.is_active());

    // Re-grant re-runs the flow and completion fires again.
    setup.run();
    probe.set_accessibility(true);
    setup.on_poll_tick();
    assert!(matches!(rx.try_recv(), Ok(SetupEvent::Completed)));
}
