//! Synchronous simulated world.
//!
//! [`World`] wires the real [`App`] and [`Bridge`] to a [`SimRadio`] without
//! a runtime. Every radio command is answered immediately and every callback
//! is fed back until the system settles, so one [`Operation`] is one
//! deterministic step. Time is virtual and only moves through
//! [`World::elapse`].

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use blulok_app::{App, AppAction, AppEvent, Bridge, UserIntent};
use blulok_core::{
    BatteryReleaseState, HostLifecycle, PeripheralId, RadioCommand, RadioEvent, RadioState,
    SessionConfig,
};
use tracing::warn;

use crate::{
    invariants::SystemSnapshot,
    operation::{FaultKind, Operation},
    sim_lock::{SimLock, SimRadio},
};

/// Bound on callbacks processed for one operation.
const MAX_CASCADE: usize = 1_000;

/// App, Bridge and simulated radio in one deterministic loop.
pub struct World {
    app: App,
    bridge: Bridge<Instant>,
    radio: SimRadio,
    now: Instant,
    log: Vec<RadioCommand>,
}

impl World {
    /// World around the given radio.
    pub fn new(config: SessionConfig, radio: SimRadio) -> Self {
        let bridge = Bridge::new(config);
        let app = App::new(bridge.session().view());
        Self { app, bridge, radio, now: Instant::now(), log: Vec::new() }
    }

    /// Two locks and a stranger in range, radio powered on.
    pub fn standard(seed: u64) -> Self {
        let radio = SimRadio::new(seed)
            .with_lock(SimLock::new("LOCK-FRONT", "BluLok-Front", -52))
            .with_lock(SimLock::new("LOCK-SHED", "BluLok-Shed", -78))
            .with_lock(SimLock::new("SPEAKER", "Kitchen Speaker", -40));
        let mut world = Self::new(SessionConfig::default(), radio);
        world.set_radio_power(true);
        world
    }

    /// Apply one operation and let the system settle.
    pub fn apply(&mut self, operation: &Operation) {
        match *operation {
            Operation::Scan => self.intent(UserIntent::Scan),
            Operation::StopScan => self.intent(UserIntent::StopScan),
            Operation::Advertise => {
                let events = self.radio.advertise();
                self.deliver(events);
            },
            Operation::Select(index) => self.intent(UserIntent::Select(usize::from(index))),
            Operation::CancelConnecting => self.intent(UserIntent::CancelConnecting),
            Operation::Disconnect => self.intent(UserIntent::Disconnect),
            Operation::Reconnect => self.intent(UserIntent::Reconnect),
            Operation::Open => self.intent(UserIntent::Open),
            Operation::BatteryEject => self.intent(UserIntent::BatteryEject),
            Operation::ShowLock => self.intent(UserIntent::ShowLock),
            Operation::ShowBattery => self.intent(UserIntent::ShowBattery),
            Operation::Background => self.lifecycle(HostLifecycle::Background),
            Operation::Foreground => self.lifecycle(HostLifecycle::Foreground),
            Operation::DropLink(index) => {
                if let Some(id) = self.lock_id(index) {
                    let events = self.radio.drop_link(&id);
                    self.deliver(events);
                }
            },
            Operation::PullLatch(index) => {
                if let Some(id) = self.lock_id(index) {
                    let events = self.radio.pull_latch(&id);
                    self.deliver(events);
                }
            },
            Operation::BatteryNotReady(index) => {
                if let Some(id) = self.lock_id(index) {
                    let events = self.radio.set_battery_state(&id, BatteryReleaseState::NotReady);
                    self.deliver(events);
                }
            },
            Operation::RadioPower(on) => self.set_radio_power(on),
            Operation::Elapse(seconds) => self.elapse(Duration::from_secs(u64::from(seconds))),
            Operation::SetFault { lock, fault, enabled } => {
                let Some(id) = self.lock_id(lock) else {
                    return;
                };
                if let Some(lock) = self.radio.lock_mut(&id) {
                    let faults = &mut lock.faults;
                    match fault {
                        FaultKind::RefuseConnect => faults.refuse_connect = enabled,
                        FaultKind::Unresolvable => faults.unresolvable = enabled,
                        FaultKind::MissingService => faults.missing_service = enabled,
                        FaultKind::MissingReleaseChannel => faults.missing_release_channel = enabled,
                        FaultKind::SilentDiscovery => faults.silent_discovery = enabled,
                        FaultKind::WriteError => {
                            faults.write_error = enabled.then(|| "Write not permitted".to_owned());
                        },
                    }
                }
            },
        }
    }

    /// Feed a user intent.
    pub fn intent(&mut self, intent: UserIntent) {
        let actions = self.app.handle(AppEvent::Intent(intent));
        self.run_actions(actions);
    }

    /// Feed a host lifecycle transition.
    pub fn lifecycle(&mut self, lifecycle: HostLifecycle) {
        let actions = self.app.handle(AppEvent::Lifecycle(lifecycle));
        self.run_actions(actions);
    }

    /// Switch the radio on or off.
    pub fn set_radio_power(&mut self, on: bool) {
        let state = if on { RadioState::PoweredOn } else { RadioState::PoweredOff };
        let events = self.radio.set_state(state);
        self.deliver(events);
    }

    /// Advance virtual time and run housekeeping.
    pub fn elapse(&mut self, duration: Duration) {
        self.now += duration;
        let events = self.bridge.handle_tick(self.now);
        self.run_app_events(events);
    }

    /// Deliver radio callbacks and let the system settle.
    pub fn deliver(&mut self, events: Vec<RadioEvent>) {
        let mut queue: VecDeque<RadioEvent> = events.into();
        let mut processed = 0;
        while let Some(event) = queue.pop_front() {
            processed += 1;
            if processed > MAX_CASCADE {
                warn!(pending = queue.len(), "callback cascade did not settle");
                return;
            }
            let app_events = self.bridge.handle_radio(event, self.now);
            queue.extend(self.settle(app_events));
        }
    }

    fn run_actions(&mut self, actions: Vec<AppAction>) {
        let events = self.process_actions(actions);
        self.deliver(events);
    }

    fn run_app_events(&mut self, events: Vec<AppEvent>) {
        let callbacks = self.settle(events);
        self.deliver(callbacks);
    }

    /// Hand app events to the App, run the resulting actions, and answer
    /// every radio command. Returns the callbacks produced.
    fn settle(&mut self, events: Vec<AppEvent>) -> Vec<RadioEvent> {
        let mut actions = Vec::new();
        for event in events {
            actions.extend(self.app.handle(event));
        }
        let mut callbacks = self.answer_outgoing();
        callbacks.extend(self.process_actions(actions));
        callbacks
    }

    fn process_actions(&mut self, actions: Vec<AppAction>) -> Vec<RadioEvent> {
        let mut pending = actions;
        let mut callbacks = Vec::new();
        while !pending.is_empty() {
            for action in std::mem::take(&mut pending) {
                if !action.is_session_intent() {
                    continue;
                }
                for event in self.bridge.process_app_action(action, self.now) {
                    pending.extend(self.app.handle(event));
                }
                callbacks.extend(self.answer_outgoing());
            }
        }
        callbacks
    }

    fn answer_outgoing(&mut self) -> Vec<RadioEvent> {
        let mut callbacks = Vec::new();
        for command in self.bridge.take_outgoing() {
            self.log.push(command.clone());
            callbacks.extend(self.radio.apply(command));
        }
        callbacks
    }

    fn lock_id(&self, index: u8) -> Option<PeripheralId> {
        let ids = self.radio.lock_ids();
        if ids.is_empty() {
            return None;
        }
        ids.get(usize::from(index) % ids.len()).cloned()
    }

    /// The App.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// The Bridge and its session.
    pub fn bridge(&self) -> &Bridge<Instant> {
        &self.bridge
    }

    /// The simulated radio.
    pub fn radio(&self) -> &SimRadio {
        &self.radio
    }

    /// The simulated radio, for adding locks or flipping faults.
    pub fn radio_mut(&mut self) -> &mut SimRadio {
        &mut self.radio
    }

    /// Every radio command issued so far.
    pub fn command_log(&self) -> &[RadioCommand] {
        &self.log
    }

    /// Forget the command log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Observable state for invariant checks.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_session(self.app.session())
    }
}
