//! Permission-gated readiness state machine.
//!
//! Drives the onboarding flow: a slow ticker cycles the highlighted step
//! for the user, a fast ticker polls the OS trust flags, and the instant
//! both required flags read true the machine cancels its tickers, flips to
//! `Armed`, and emits a single completion event. The flags change outside
//! the process (in System Settings), so polling is the only option.
//!
//! The tick handlers are public and synchronous; the tickers merely call
//! them, and tests drive them directly instead of sleeping.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use permissions::PermissionsStatus;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::{
    deps::{PermissionProbe, SettingsPane},
    ticker::Ticker,
};

/// Interval of the step auto-cycle ticker.
const STEP_INTERVAL: Duration = Duration::from_millis(2500);
/// Interval of the permission poll ticker.
const POLL_INTERVAL: Duration = Duration::from_millis(1000);
/// Ticker id for the step cycle.
const STEP_TICKER: &str = "setup-step";
/// Ticker id for the permission poll.
const POLL_TICKER: &str = "setup-poll";

/// Onboarding steps, in presentation order. The automation step only
/// participates on OS generations with a separate Automation consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Press the Start button.
    Start,
    /// Unlock System Settings for changes.
    UnlockSettings,
    /// Enable the app under Accessibility.
    GrantAccessibility,
    /// Allow the app to control System Events.
    GrantAutomation,
}

impl SetupStep {
    /// The following step, honoring the three-step variant.
    fn next(self, requires_automation: bool) -> Option<Self> {
        match self {
            Self::Start => Some(Self::UnlockSettings),
            Self::UnlockSettings => Some(Self::GrantAccessibility),
            Self::GrantAccessibility => requires_automation.then_some(Self::GrantAutomation),
            Self::GrantAutomation => None,
        }
    }
}

/// Observable phase of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    /// Tickers not running yet.
    NotStarted,
    /// Tickers cycling the highlighted step; the user has not pressed
    /// Start.
    Cycling(SetupStep),
    /// The user pressed Start; waiting for the grants to land.
    WaitingForGrant,
    /// Both required permissions granted.
    Armed,
}

/// Events emitted to dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupEvent {
    /// Both required permissions read true. Fired once per arming.
    Completed,
}

/// Mutable machine state.
struct Inner {
    /// Tickers currently running.
    running: bool,
    /// The user pressed Start.
    started: bool,
    /// Terminal condition reached; completion already emitted.
    armed: bool,
    /// Currently highlighted step.
    step: SetupStep,
    /// Most recent poll result, consulted by the step wrap policy.
    last_status: PermissionsStatus,
}

/// Drives onboarding step progression and arms the system when the OS
/// trust flags flip true.
#[derive(Clone)]
pub struct SetupStateMachine {
    /// Trust-flag source.
    probe: Arc<dyn PermissionProbe>,
    /// Whether the Automation consent participates on this OS.
    requires_automation: bool,
    /// Machine state.
    inner: Arc<Mutex<Inner>>,
    /// The two polling loops.
    ticker: Ticker,
    /// Completion notification channel.
    events: UnboundedSender<SetupEvent>,
}

impl SetupStateMachine {
    /// Create a machine. Construction has no side effects; call
    /// [`SetupStateMachine::run`] to launch the tickers.
    pub fn new(
        probe: Arc<dyn PermissionProbe>,
        requires_automation: bool,
        events: UnboundedSender<SetupEvent>,
    ) -> Self {
        Self {
            probe,
            requires_automation,
            inner: Arc::new(Mutex::new(Inner {
                running: false,
                started: false,
                armed: false,
                step: SetupStep::Start,
                last_status: PermissionsStatus {
                    accessibility_ok: false,
                    automation_ok: false,
                },
            })),
            ticker: Ticker::new(),
            events,
        }
    }

    /// Launch both tickers. No-op while running or already armed.
    pub fn run(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.running || inner.armed {
                return;
            }
            inner.running = true;
            inner.last_status = self.probe.status();
        }
        let step_self = self.clone();
        self.ticker
            .start(STEP_TICKER.into(), STEP_INTERVAL, STEP_INTERVAL, move || {
                step_self.on_step_tick();
            });
        let poll_self = self.clone();
        self.ticker
            .start(POLL_TICKER.into(), POLL_INTERVAL, POLL_INTERVAL, move || {
                poll_self.on_poll_tick();
            });
        debug!("setup_tickers_started");
    }

    /// Current phase.
    pub fn phase(&self) -> SetupPhase {
        let inner = self.inner.lock();
        if inner.armed {
            SetupPhase::Armed
        } else if inner.started {
            SetupPhase::WaitingForGrant
        } else if inner.running {
            SetupPhase::Cycling(inner.step)
        } else {
            SetupPhase::NotStarted
        }
    }

    /// Currently highlighted step.
    pub fn current_step(&self) -> SetupStep {
        self.inner.lock().step
    }

    /// User pressed Start: open the settings pane for the first missing
    /// permission and wait for the grant.
    pub fn start(&self) {
        let status = self.probe.status();
        let pane = if !status.accessibility_ok {
            SettingsPane::Accessibility
        } else {
            SettingsPane::Automation
        };
        self.probe.open_settings(pane);
        let mut inner = self.inner.lock();
        inner.started = true;
        inner.step = SetupStep::UnlockSettings;
        inner.last_status = status;
        debug!(?pane, "setup_started");
    }

    /// Manual step selection. Ignored once armed. Selecting the Start step
    /// after the flow began is ignored while accessibility is already
    /// granted, preventing a restart loop mid-flow.
    pub fn select_step(&self, step: SetupStep) {
        let mut inner = self.inner.lock();
        if inner.armed {
            return;
        }
        if step == SetupStep::Start && inner.started && inner.last_status.accessibility_ok {
            return;
        }
        inner.step = step;
    }

    /// Step ticker body: advance with the wrap policy.
    pub fn on_step_tick(&self) {
        let mut inner = self.inner.lock();
        if inner.armed {
            return;
        }
        let next = inner.step.next(self.requires_automation);
        inner.step = match next {
            // Once started, the flow does not advance past an ungranted
            // accessibility step; automation cannot be granted before it.
            Some(SetupStep::GrantAutomation)
                if inner.started && !inner.last_status.accessibility_ok =>
            {
                SetupStep::GrantAccessibility
            }
            Some(step) => step,
            None => wrap_step(inner.started, inner.last_status, self.requires_automation),
        };
    }

    /// Poll ticker body: refresh the flags; arm the instant both required
    /// flags read true. Later polls observe the armed state and change
    /// nothing.
    pub fn on_poll_tick(&self) {
        let status = self.probe.status();
        let granted =
            status.accessibility_ok && (status.automation_ok || !self.requires_automation);
        {
            let mut inner = self.inner.lock();
            inner.last_status = status;
            if inner.armed || !granted {
                return;
            }
            inner.armed = true;
            inner.running = false;
        }
        self.ticker.stop(STEP_TICKER);
        self.ticker.stop(POLL_TICKER);
        info!("setup_completed");
        let _ = self.events.send(SetupEvent::Completed);
    }

    /// Whether the terminal condition was reached.
    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed
    }

    /// Revocation path: forget the armed state so a later [`Self::run`]
    /// replays the flow. Completion fires again on the next arming.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.armed = false;
        inner.started = false;
        inner.running = false;
        inner.step = SetupStep::Start;
        debug!("setup_reset");
    }

    /// Stop the tickers without touching state (shutdown).
    pub async fn shutdown(&self) {
        self.ticker.clear_async().await;
    }
}

/// Wrap target when the step sequence runs off the end.
fn wrap_step(started: bool, status: PermissionsStatus, requires_automation: bool) -> SetupStep {
    if !started {
        SetupStep::Start
    } else if !status.accessibility_ok {
        SetupStep::GrantAccessibility
    } else if requires_automation && !status.automation_ok {
        SetupStep::GrantAutomation
    } else {
        SetupStep::GrantAccessibility
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::test_support::MockProbe;

    fn machine(
        probe: Arc<MockProbe>,
        requires_automation: bool,
    ) -> (SetupStateMachine, mpsc::UnboundedReceiver<SetupEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SetupStateMachine::new(probe, requires_automation, tx), rx)
    }

    #[tokio::test]
    async fn completion_fires_exactly_once_across_repeated_polls() {
        let probe = Arc::new(MockProbe::new(false, false));
        let (sm, mut rx) = machine(probe.clone(), true);
        sm.run();
        sm.on_poll_tick();
        assert!(!sm.is_armed());

        // Both flags flip between two polls.
        probe.set_accessibility(true);
        probe.set_automation(true);
        sm.on_poll_tick();
        assert!(sm.is_armed());
        assert!(matches!(rx.try_recv(), Ok(SetupEvent::Completed)));

        for _ in 0..5 {
            sm.on_poll_tick();
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(sm.phase(), SetupPhase::Armed);
    }

    #[tokio::test]
    async fn automation_not_required_arms_on_accessibility_alone() {
        let probe = Arc::new(MockProbe::new(true, false));
        let (sm, mut rx) = machine(probe, false);
        sm.run();
        sm.on_poll_tick();
        assert!(sm.is_armed());
        assert!(matches!(rx.try_recv(), Ok(SetupEvent::Completed)));
    }

    #[tokio::test]
    async fn missing_accessibility_pins_the_step_under_the_slow_ticker() {
        // Accessibility false, automation true: never arms, and the step
        // cycle settles on the accessibility-grant step forever.
        let probe = Arc::new(MockProbe::new(false, true));
        let (sm, mut rx) = machine(probe, true);
        sm.run();
        sm.start();
        for _ in 0..20 {
            sm.on_step_tick();
            sm.on_poll_tick();
        }
        assert_eq!(sm.current_step(), SetupStep::GrantAccessibility);
        assert!(!sm.is_armed());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn step_cycle_tours_all_steps_before_start() {
        let probe = Arc::new(MockProbe::new(false, false));
        let (sm, _rx) = machine(probe, true);
        sm.run();
        assert_eq!(sm.current_step(), SetupStep::Start);
        sm.on_step_tick();
        assert_eq!(sm.current_step(), SetupStep::UnlockSettings);
        sm.on_step_tick();
        assert_eq!(sm.current_step(), SetupStep::GrantAccessibility);
        sm.on_step_tick();
        assert_eq!(sm.current_step(), SetupStep::GrantAutomation);
        sm.on_step_tick();
        assert_eq!(sm.current_step(), SetupStep::Start);
    }

    #[tokio::test]
    async fn granted_accessibility_wraps_to_the_automation_step() {
        let probe = Arc::new(MockProbe::new(true, false));
        let (sm, _rx) = machine(probe, true);
        sm.run();
        sm.start();
        for _ in 0..6 {
            sm.on_step_tick();
        }
        assert_eq!(sm.current_step(), SetupStep::GrantAutomation);
    }

    #[tokio::test]
    async fn start_opens_the_first_missing_pane() {
        let probe = Arc::new(MockProbe::new(false, false));
        let (sm, _rx) = machine(probe.clone(), true);
        sm.run();
        sm.start();
        assert_eq!(probe.opened(), vec![SettingsPane::Accessibility]);
        assert_eq!(sm.phase(), SetupPhase::WaitingForGrant);

        let probe2 = Arc::new(MockProbe::new(true, false));
        let (sm2, _rx2) = machine(probe2.clone(), true);
        sm2.run();
        sm2.start();
        assert_eq!(probe2.opened(), vec![SettingsPane::Automation]);
    }

    #[tokio::test]
    async fn selecting_start_mid_flow_is_ignored_once_accessibility_granted() {
        let probe = Arc::new(MockProbe::new(true, false));
        let (sm, _rx) = machine(probe, true);
        sm.run();
        sm.start();
        sm.select_step(SetupStep::GrantAutomation);
        assert_eq!(sm.current_step(), SetupStep::GrantAutomation);
        sm.select_step(SetupStep::Start);
        assert_eq!(sm.current_step(), SetupStep::GrantAutomation);
    }

    #[tokio::test]
    async fn selecting_start_mid_flow_is_accepted_while_accessibility_missing() {
        let probe = Arc::new(MockProbe::new(false, false));
        let (sm, _rx) = machine(probe, true);
        sm.run();
        sm.start();
        sm.on_poll_tick();
        sm.select_step(SetupStep::Start);
        assert_eq!(sm.current_step(), SetupStep::Start);
    }

    #[tokio::test]
    async fn reset_allows_a_second_arming_to_fire_again() {
        let probe = Arc::new(MockProbe::new(true, true));
        let (sm, mut rx) = machine(probe.clone(), true);
        sm.run();
        sm.on_poll_tick();
        assert!(matches!(rx.try_recv(), Ok(SetupEvent::Completed)));

        // Revocation, then re-grant.
        probe.set_accessibility(false);
        sm.reset();
        sm.run();
        sm.on_poll_tick();
        assert!(rx.try_recv().is_err());
        probe.set_accessibility(true);
        sm.on_poll_tick();
        assert!(matches!(rx.try_recv(), Ok(SetupEvent::Completed)));
    }

    #[tokio::test(start_paused = true)]
    async fn tickers_drive_the_machine_to_armed_on_virtual_time() {
        let probe = Arc::new(MockProbe::new(true, true));
        let (sm, mut rx) = machine(probe, true);
        sm.run();
        assert!(sm.ticker.is_active("setup-poll"));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(sm.is_armed());
        assert_eq!(rx.recv().await, Some(SetupEvent::Completed));
        // Terminal condition cancels both tickers.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!sm.ticker.is_active("setup-poll"));
        assert!(!sm.ticker.is_active("setup-step"));
    }
}
