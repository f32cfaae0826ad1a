//! Application state machine.
//!
//! This module defines the [`App`] state machine, which owns the view model of
//! the lock client completely decoupled from the radio and the session
//! mechanics.
//!
//! This is a pure state machine: it consumes [`crate::AppEvent`] inputs and
//! produces [`crate::AppAction`] instructions for the runtime to execute.
//!
//! # Responsibilities
//!
//! - Mirrors the latest [`SessionView`] published by the bridge.
//! - Runs the battery eject flow and the lock/battery command view toggle.
//! - Filters the picker list by the search text.
//! - Decides which animated subjects are visible and their target frames.

use blulok_core::{
    BatteryEjectFlow, BatteryReleaseState, EjectEffect, EjectStep, LockState, Phase,
    PeripheralId, PeripheralRecord, SessionView, Subject, battery_target_frame,
    lock_target_frame,
};
use tracing::debug;

use crate::{
    AppAction, AppEvent, UserIntent,
    state::{AnimationView, CommandView, LoadingView, PeripheralRow, Scene, Snapshot},
};

/// Notice shown when a command needs a connected lock.
const NOT_CONNECTED_NOTICE: &str = "Not ready to send command";

/// Application state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies - fully testable in simulation.
#[derive(Debug, Clone)]
pub struct App {
    /// Latest session state.
    session: SessionView,
    /// Selected command view on the home scene.
    command_view: CommandView,
    /// Battery eject flow.
    eject: BatteryEjectFlow,
    /// Picker search filter.
    search: String,
    /// Transient notice. `None` if nothing to report.
    notice: Option<String>,
}

impl App {
    /// Create an App mirroring the given session state.
    pub fn new(session: SessionView) -> Self {
        Self {
            session,
            command_view: CommandView::Lock,
            eject: BatteryEjectFlow::new(),
            search: String::new(),
            notice: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Intent(intent) => self.handle_intent(intent),
            AppEvent::Lifecycle(lifecycle) => vec![AppAction::Lifecycle(lifecycle)],
            AppEvent::SessionUpdated(view) => {
                self.session = *view;
                vec![AppAction::Render]
            },
            AppEvent::LockStateReported(state) => {
                debug!(?state, "lock state reported");
                vec![AppAction::Render]
            },
            AppEvent::BatteryStateReported(state) => {
                let connected = self.is_connected();
                self.eject.on_battery_state(state, connected);
                if state == BatteryReleaseState::NotReady && connected {
                    self.command_view = CommandView::Lock;
                }
                vec![AppAction::Render]
            },
            AppEvent::LinkEstablished => {
                self.eject.on_reconnected();
                self.notice = None;
                vec![AppAction::Render]
            },
            AppEvent::LinkLost { user_initiated } => {
                debug!(user_initiated, eject = ?self.eject.step(), "link lost");
                self.eject.on_connection_lost();
                vec![AppAction::Render]
            },
            AppEvent::Error { message } => {
                self.notice = Some(message);
                vec![AppAction::Render]
            },
        }
    }

    fn handle_intent(&mut self, intent: UserIntent) -> Vec<AppAction> {
        match intent {
            UserIntent::Scan => {
                self.notice = None;
                vec![AppAction::StartScan]
            },
            UserIntent::StopScan => vec![AppAction::StopScan],
            UserIntent::Select(index) => self.select(index),
            UserIntent::CancelConnecting => self.cancel_connecting(),
            UserIntent::Disconnect => vec![AppAction::Disconnect { user_initiated: true }],
            UserIntent::Reconnect => {
                self.notice = None;
                vec![AppAction::Reconnect]
            },
            UserIntent::Open => self.open(),
            UserIntent::BatteryEject => self.battery_eject(),
            UserIntent::ShowLock => {
                self.command_view = CommandView::Lock;
                vec![AppAction::Render]
            },
            UserIntent::ShowBattery => {
                self.command_view = CommandView::Battery;
                vec![AppAction::Render]
            },
            UserIntent::Search(query) => {
                self.search = query;
                vec![AppAction::Render]
            },
            UserIntent::Quit => vec![AppAction::Quit],
        }
    }

    /// Connect to the n-th peripheral of the filtered list.
    pub fn select(&mut self, index: usize) -> Vec<AppAction> {
        let found = self.peripheral_at(index).cloned();
        match found {
            Some(peripheral) => {
                self.notice = None;
                vec![AppAction::Connect { peripheral }]
            },
            None => {
                self.notice = Some(format!("No device at position {index}"));
                vec![AppAction::Render]
            },
        }
    }

    /// Stop scanning and abandon a connection attempt.
    pub fn cancel_connecting(&mut self) -> Vec<AppAction> {
        let mut actions = Vec::new();
        if self.session.scanning {
            actions.push(AppAction::StopScan);
        }
        if self.session.phase == Phase::Connecting {
            actions.push(AppAction::Disconnect { user_initiated: true });
        }
        if actions.is_empty() {
            actions.push(AppAction::Render);
        }
        actions
    }

    /// Ask the lock to open.
    pub fn open(&mut self) -> Vec<AppAction> {
        self.command_view = CommandView::Lock;
        vec![AppAction::SendUnlock, AppAction::Render]
    }

    /// Battery eject button.
    pub fn battery_eject(&mut self) -> Vec<AppAction> {
        if !self.is_connected() {
            self.notice = Some(NOT_CONNECTED_NOTICE.to_owned());
            return vec![AppAction::Render];
        }
        self.command_view = CommandView::Battery;
        match self.eject.tap() {
            Some(EjectEffect::SendRelease) => vec![AppAction::SendBatteryRelease, AppAction::Render],
            None => vec![AppAction::Render],
        }
    }

    /// Directory records matching the search filter, strongest first.
    pub fn filtered(&self) -> impl Iterator<Item = &PeripheralRecord> {
        self.session.directory.iter().filter(|record| record.matches(&self.search))
    }

    /// Subjects visible on screen with their target frames.
    ///
    /// The incomplete-lock loop has no target and reports 0.
    pub fn visible_subjects(&self) -> Vec<(Subject, usize)> {
        if self.scene() != Scene::Home {
            return Vec::new();
        }
        let mut visible = Vec::with_capacity(2);
        match self.command_view {
            CommandView::Lock => {
                visible.push((Subject::Lock, lock_target_frame(self.session.lock_state)));
            },
            CommandView::Battery => {
                visible.push((Subject::Battery, battery_target_frame(self.eject.step())));
            },
        }
        if self.session.lock_state.is_none() {
            visible.push((Subject::IncompleteLock, 0));
        }
        visible
    }

    /// Build the published snapshot.
    pub fn snapshot(&self, animations: Vec<AnimationView>, loading: LoadingView) -> Snapshot {
        let peripherals = self
            .filtered()
            .map(|record| PeripheralRow {
                id: record.id.to_string(),
                name: record.display_name.clone(),
                rssi: record.rssi,
                signal: record.signal_quality(),
            })
            .collect();
        Snapshot {
            scene: self.scene(),
            command_view: self.command_view,
            session: self.session.clone(),
            eject_step: self.eject.step(),
            search: self.search.clone(),
            peripherals,
            notice: self.notice.clone(),
            animations,
            loading,
        }
    }

    /// Current scene.
    pub fn scene(&self) -> Scene {
        Scene::for_session(&self.session)
    }

    /// Selected command view.
    pub fn command_view(&self) -> CommandView {
        self.command_view
    }

    /// Battery eject step.
    pub fn eject_step(&self) -> EjectStep {
        self.eject.step()
    }

    /// Latest session state.
    pub fn session(&self) -> &SessionView {
        &self.session
    }

    /// Last reported lock state.
    pub fn lock_state(&self) -> Option<LockState> {
        self.session.lock_state
    }

    /// Picker search filter.
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Transient notice.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Peripheral the picker would connect to for `index`.
    pub fn peripheral_at(&self, index: usize) -> Option<&PeripheralId> {
        self.filtered().nth(index).map(|record| &record.id)
    }

    fn is_connected(&self) -> bool {
        self.session.phase == Phase::Connected
    }
}
