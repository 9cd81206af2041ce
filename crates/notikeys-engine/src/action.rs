//! The automation action engine.
//!
//! Per invocation: probe panel presence, pick a strategy for the detected
//! UI generation, acquire the pointer (legacy coordinate strategies only),
//! execute the action, release the pointer, and post-check dismissals on
//! the modern generation. Everything is best-effort: the panel belongs to
//! the OS and may vanish or reshape at any point, so misses are logged and
//! swallowed, never propagated.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use mac_noticenter::{Error as BridgeError, Generation, LegacyLayout, Point};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    deps::{PanelBridge, PanelSnapshot, PointerOps},
    store::ShortcutId,
};

/// Settle delay between the pointer warp and the click, letting the panel
/// register the hover.
const WARP_SETTLE: Duration = Duration::from_millis(100);
/// Settle delay before re-probing panel presence after a dismiss.
const DISMISS_SETTLE: Duration = Duration::from_millis(400);

/// One notification manipulation the engine can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Activate the reply control: the second button when a panel shows
    /// two, the sole button when it shows one.
    Reply,
    /// Generic activate: same control selection as Reply, distinct intent.
    /// On single-button legacy panels this lands on the same control as
    /// Reply; that asymmetry is long-standing behavior, kept as-is.
    Activate,
    /// Close every displayed panel, newest first.
    Dismiss,
    /// Click the panel body, letting the OS activate the owning app.
    Open,
    /// Activate the options disclosure control.
    Options,
}

impl From<ShortcutId> for ActionKind {
    fn from(id: ShortcutId) -> Self {
        match id {
            ShortcutId::Reply => Self::Reply,
            ShortcutId::Open => Self::Open,
            ShortcutId::Dismiss => Self::Dismiss,
            ShortcutId::Options => Self::Options,
        }
    }
}

/// Strategy selector: a pure function of the detected generation.
pub type GenerationDetect = Arc<dyn Fn() -> Generation + Send + Sync>;

/// Executes notification manipulations against the panel.
#[derive(Clone)]
pub struct ActionEngine {
    /// Scripting bridge for the legacy generation.
    legacy: Arc<dyn PanelBridge>,
    /// Accessibility bridge for the modern generation.
    modern: Arc<dyn PanelBridge>,
    /// Pointer primitives for the coordinate strategies.
    pointer: Arc<dyn PointerOps>,
    /// Re-evaluated fresh on every invocation.
    detect: GenerationDetect,
    /// At most one invocation in flight; concurrent triggers are dropped
    /// rather than allowed to interleave with the save/restore cycle.
    in_flight: Arc<AtomicBool>,
    /// Pointer position saved during target acquisition.
    saved: Arc<Mutex<Option<Point>>>,
}

impl ActionEngine {
    /// Create an engine over the given bridges.
    pub fn new(
        legacy: Arc<dyn PanelBridge>,
        modern: Arc<dyn PanelBridge>,
        pointer: Arc<dyn PointerOps>,
        detect: GenerationDetect,
    ) -> Self {
        Self {
            legacy,
            modern,
            pointer,
            detect,
            in_flight: Arc::new(AtomicBool::new(false)),
            saved: Arc::new(Mutex::new(None)),
        }
    }

    /// Perform `action`, best-effort. Misses are logged, never returned.
    pub async fn perform(&self, action: ActionKind) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(?action, "action_dropped_already_running");
            return;
        }
        self.run(action).await;
        self.in_flight.store(false, Ordering::SeqCst);
    }

    /// The per-invocation state machine.
    async fn run(&self, action: ActionKind) {
        let generation = (self.detect)();
        let bridge: &Arc<dyn PanelBridge> = match generation {
            Generation::Legacy(_) => &self.legacy,
            Generation::Modern => &self.modern,
        };

        // Probe: no panel displayed is a silent no-op, not an error.
        let panels = match bridge.panels() {
            Ok(p) => p,
            Err(e) => {
                warn!(?action, error = %e, "automation_miss");
                return;
            }
        };
        if panels.is_empty() {
            debug!(?action, "no_panel_displayed");
            return;
        }

        let acquired = if generation.is_legacy() {
            self.acquire_pointer().await
        } else {
            false
        };

        if let Err(e) = self.execute(action, generation, &**bridge, &panels) {
            warn!(?action, error = %e, "automation_miss");
        }

        // Release is unconditional once acquisition succeeded, even after
        // a failed execute.
        if acquired {
            self.release_pointer();
        }

        if action == ActionKind::Dismiss && generation == Generation::Modern {
            self.post_check(&**bridge).await;
        }
    }

    /// Save the pointer, hide the sprite, warp to the panel button region.
    /// Returns whether a position was saved (and must be restored).
    async fn acquire_pointer(&self) -> bool {
        let pos = match self.pointer.location() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "pointer_save_failed");
                return false;
            }
        };
        *self.saved.lock() = Some(pos);
        self.pointer.hide_until_move();
        if let Err(e) = self.pointer.warp(self.pointer.panel_target()) {
            warn!(error = %e, "pointer_warp_failed");
        }
        tokio::time::sleep(WARP_SETTLE).await;
        true
    }

    /// Warp the pointer back to the saved position and clear the slot.
    fn release_pointer(&self) {
        if let Some(pos) = self.saved.lock().take()
            && let Err(e) = self.pointer.warp(pos)
        {
            warn!(error = %e, "pointer_restore_failed");
        }
    }

    /// Dispatch the action-specific automation.
    fn execute(
        &self,
        action: ActionKind,
        generation: Generation,
        bridge: &dyn PanelBridge,
        panels: &[PanelSnapshot],
    ) -> mac_noticenter::Result<()> {
        let front = panels[0];
        match action {
            ActionKind::Reply | ActionKind::Activate => match front.buttons {
                // A panel without buttons offers nothing to activate.
                0 => Ok(()),
                1 => bridge.click_button(front.index, 1),
                _ => bridge.click_button(front.index, 2),
            },
            ActionKind::Open => match generation {
                // The pointer already sits on the panel body after the
                // warp; a synthetic click there triggers the OS's own
                // open-owning-application behavior.
                Generation::Legacy(_) => self.pointer.click(self.pointer.panel_target()),
                Generation::Modern => bridge.click_body(front.index),
            },
            ActionKind::Options => bridge.activate_options(front.index),
            ActionKind::Dismiss => Self::dismiss(generation, bridge, panels),
        }
    }

    /// Close panels newest-first so earlier clicks cannot invalidate the
    /// window indexes of the ones still pending.
    fn dismiss(
        generation: Generation,
        bridge: &dyn PanelBridge,
        panels: &[PanelSnapshot],
    ) -> mac_noticenter::Result<()> {
        match generation {
            Generation::Legacy(layout) => {
                for panel in panels.iter().rev() {
                    let close = match layout {
                        // Pre-Catalina the close control is the first
                        // button, and single-button panels expose no close
                        // at all.
                        LegacyLayout::Mojave => (panel.buttons > 1).then_some(1),
                        // Catalina moved close to the last position.
                        LegacyLayout::Catalina => (panel.buttons > 0).then_some(panel.buttons),
                    };
                    let Some(button) = close else { continue };
                    bridge.click_button(panel.index, button)?;
                }
                Ok(())
            }
            Generation::Modern => {
                for panel in panels.iter().rev() {
                    match bridge.close_panel(panel.index) {
                        Ok(()) => {}
                        Err(BridgeError::NotFound) | Err(BridgeError::Unsupported) => {
                            // No close affordance: restart the service and
                            // let the OS respawn it without the panel.
                            return bridge.relaunch_service();
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
        }
    }

    /// Re-probe after a modern dismiss; escalate when the panel survived.
    async fn post_check(&self, bridge: &dyn PanelBridge) {
        tokio::time::sleep(DISMISS_SETTLE).await;
        match bridge.panels() {
            Ok(p) if !p.is_empty() => {
                warn!(remaining = p.len(), "dismiss_left_panels_escalating");
                if let Err(e) = bridge.relaunch_service() {
                    warn!(error = %e, "relaunch_failed");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "post_check_probe_failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use mac_noticenter::Point;

    use super::*;
    use crate::test_support::{MockPanelBridge, MockPointer};

    /// Engine with mock bridges pinned to `generation`.
    fn engine(
        generation: Generation,
        bridge: Arc<MockPanelBridge>,
        pointer: Arc<MockPointer>,
    ) -> ActionEngine {
        ActionEngine::new(
            bridge.clone(),
            bridge,
            pointer,
            Arc::new(move || generation),
        )
    }

    const CATALINA: Generation = Generation::Legacy(LegacyLayout::Catalina);
    const MOJAVE: Generation = Generation::Legacy(LegacyLayout::Mojave);

    #[tokio::test(start_paused = true)]
    async fn reply_tie_break_two_buttons_picks_second() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![2]));
        let pointer = Arc::new(MockPointer::new(Point { x: 5.0, y: 5.0 }));
        engine(CATALINA, bridge.clone(), pointer)
            .perform(ActionKind::Reply)
            .await;
        assert_eq!(bridge.button_clicks(), vec![(1, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_tie_break_single_button_picks_it() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![1]));
        let pointer = Arc::new(MockPointer::new(Point { x: 5.0, y: 5.0 }));
        engine(CATALINA, bridge.clone(), pointer)
            .perform(ActionKind::Activate)
            .await;
        assert_eq!(bridge.button_clicks(), vec![(1, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_zero_buttons_is_a_silent_noop() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![0]));
        let pointer = Arc::new(MockPointer::new(Point { x: 5.0, y: 5.0 }));
        engine(CATALINA, bridge.clone(), pointer)
            .perform(ActionKind::Reply)
            .await;
        assert!(bridge.button_clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_panel_is_a_silent_noop_without_pointer_motion() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![]));
        let pointer = Arc::new(MockPointer::new(Point { x: 5.0, y: 5.0 }));
        engine(CATALINA, bridge.clone(), pointer.clone())
            .perform(ActionKind::Reply)
            .await;
        assert!(bridge.button_clicks().is_empty());
        assert!(pointer.warps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pointer_restored_after_legacy_invocation() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![2]));
        let start = Point { x: 123.0, y: 456.0 };
        let pointer = Arc::new(MockPointer::new(start));
        let eng = engine(CATALINA, bridge, pointer.clone());
        eng.perform(ActionKind::Reply).await;
        eng.perform(ActionKind::Options).await;
        assert_eq!(pointer.current(), start);
        // Warp out, warp back — twice.
        assert_eq!(pointer.warps().len(), 4);
        assert!(pointer.hides() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pointer_restored_even_when_execute_fails() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![2]));
        bridge.fail_actions();
        let start = Point { x: 9.0, y: 9.0 };
        let pointer = Arc::new(MockPointer::new(start));
        engine(CATALINA, bridge, pointer.clone())
            .perform(ActionKind::Reply)
            .await;
        assert_eq!(pointer.current(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn modern_invocations_leave_the_pointer_alone() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![2]));
        let pointer = Arc::new(MockPointer::new(Point { x: 1.0, y: 2.0 }));
        engine(Generation::Modern, bridge.clone(), pointer.clone())
            .perform(ActionKind::Reply)
            .await;
        assert!(pointer.warps().is_empty());
        assert_eq!(bridge.button_clicks(), vec![(1, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_dismiss_runs_in_reverse_window_order() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![2, 3, 1]));
        let pointer = Arc::new(MockPointer::new(Point { x: 0.0, y: 0.0 }));
        engine(CATALINA, bridge.clone(), pointer)
            .perform(ActionKind::Dismiss)
            .await;
        // Catalina: close is the last button; newest (highest index) first.
        assert_eq!(bridge.button_clicks(), vec![(3, 1), (2, 3), (1, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn mojave_dismiss_clicks_first_button_and_skips_single_button_panels() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![2, 1]));
        let pointer = Arc::new(MockPointer::new(Point { x: 0.0, y: 0.0 }));
        engine(MOJAVE, bridge.clone(), pointer)
            .perform(ActionKind::Dismiss)
            .await;
        assert_eq!(bridge.button_clicks(), vec![(1, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn modern_dismiss_closes_banners_and_passes_post_check() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![1, 1]));
        let pointer = Arc::new(MockPointer::new(Point { x: 0.0, y: 0.0 }));
        engine(Generation::Modern, bridge.clone(), pointer)
            .perform(ActionKind::Dismiss)
            .await;
        assert_eq!(bridge.closes(), vec![2, 1]);
        assert_eq!(bridge.relaunches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn modern_dismiss_without_close_affordance_relaunches_service() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![1]));
        bridge.set_close_supported(false);
        let pointer = Arc::new(MockPointer::new(Point { x: 0.0, y: 0.0 }));
        engine(Generation::Modern, bridge.clone(), pointer)
            .perform(ActionKind::Dismiss)
            .await;
        assert_eq!(bridge.relaunches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn modern_dismiss_post_check_escalates_when_panel_survives() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![1]));
        bridge.set_close_removes_panel(false);
        let pointer = Arc::new(MockPointer::new(Point { x: 0.0, y: 0.0 }));
        engine(Generation::Modern, bridge.clone(), pointer)
            .perform(ActionKind::Dismiss)
            .await;
        assert_eq!(bridge.closes(), vec![1]);
        assert_eq!(bridge.relaunches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_on_legacy_clicks_at_the_panel_target() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![1]));
        let pointer = Arc::new(MockPointer::new(Point { x: 5.0, y: 5.0 }));
        engine(CATALINA, bridge.clone(), pointer.clone())
            .perform(ActionKind::Open)
            .await;
        assert_eq!(pointer.clicks().len(), 1);
        assert!(bridge.body_clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn open_on_modern_presses_the_banner_body() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![1]));
        let pointer = Arc::new(MockPointer::new(Point { x: 5.0, y: 5.0 }));
        engine(Generation::Modern, bridge.clone(), pointer.clone())
            .perform(ActionKind::Open)
            .await;
        assert_eq!(bridge.body_clicks(), vec![1]);
        assert!(pointer.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn bridge_errors_do_not_escape_perform() {
        let bridge = Arc::new(MockPanelBridge::with_panels(vec![2]));
        bridge.fail_actions();
        let pointer = Arc::new(MockPointer::new(Point { x: 0.0, y: 0.0 }));
        // Just verify this resolves without panicking for every action.
        let eng = engine(Generation::Modern, bridge, pointer);
        for action in [
            ActionKind::Reply,
            ActionKind::Activate,
            ActionKind::Dismiss,
            ActionKind::Open,
            ActionKind::Options,
        ] {
            eng.perform(action).await;
        }
    }
}
