//! Resolves fired hotkeys to actions and hands them off the tap path.

use std::{io, sync::Arc, thread};

use crossbeam_channel::Receiver;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::{
    action::{ActionEngine, ActionKind},
    registry::ShortcutRegistry,
};

/// Callback target for fired hotkeys.
///
/// The tap delivery path must never wait on automation: a blocked global
/// event tap stalls hotkey delivery system-wide, and an action can spend
/// hundreds of milliseconds polling the panel. The dispatcher thread only
/// resolves the registration handle to an identifier and spawns the action
/// onto the async runtime.
pub struct ActionDispatcher {
    /// Source of handle → identifier resolution.
    registry: Arc<ShortcutRegistry>,
    /// Engine invoked per fired hotkey.
    engine: ActionEngine,
}

impl ActionDispatcher {
    /// Create a dispatcher over the given registry and engine.
    pub fn new(registry: Arc<ShortcutRegistry>, engine: ActionEngine) -> Self {
        Self { registry, engine }
    }

    /// Consume `events` on a dedicated thread until the channel closes.
    pub fn spawn(
        self,
        events: Receiver<mac_hotkey::Event>,
        rt: Handle,
    ) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("action-dispatch".into())
            .spawn(move || {
                while let Ok(event) = events.recv() {
                    let Some(id) = self.registry.resolve(event.id) else {
                        // A combo fired between unregister and tap update;
                        // nothing to do with it anymore.
                        trace!(handle = event.id, "event_for_stale_registration");
                        continue;
                    };
                    debug!(id = %id, "hotkey_fired");
                    let engine = self.engine.clone();
                    rt.spawn(async move { engine.perform(ActionKind::from(id)).await });
                }
                debug!("dispatcher_channel_closed");
            })
    }
}
