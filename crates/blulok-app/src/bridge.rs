//! Session-to-Application translation layer.
//!
//! The [`Bridge`] wraps the [`ConnectionSession`] and adapts it to the
//! application lifecycle.
//!
//! # Responsibilities
//!
//! - Converts [`crate::AppAction`] session intents into [`SessionEvent`]s.
//! - Accumulates outgoing [`RadioCommand`]s for the driver to execute in the
//!   next I/O cycle.
//! - Interprets session notices and converts them back into
//!   [`crate::AppEvent`]s, always leading with a fresh session view.
//! - Manages time generically to support both real time and paused tokio time
//!   in tests.

use std::{ops::Sub, time::Duration};

use blulok_core::{
    ConnectionSession, RadioCommand, RadioEvent, SessionAction, SessionCommand, SessionConfig,
    SessionError, SessionEvent, SessionNotice,
};
use tracing::{debug, warn};

use crate::{AppAction, AppEvent};

/// Bridge between App and the connection session.
///
/// Generic over the instant type so simulations can drive virtual time.
pub struct Bridge<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    session: ConnectionSession<I>,
    outgoing: Vec<RadioCommand>,
}

impl<I> Bridge<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a bridge around a fresh session.
    pub fn new(config: SessionConfig) -> Self {
        Self { session: ConnectionSession::new(config), outgoing: Vec::new() }
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(&mut self, action: AppAction, now: I) -> Vec<AppEvent> {
        let event = match action {
            AppAction::StartScan => SessionEvent::Command(SessionCommand::StartScan),
            AppAction::StopScan => SessionEvent::Command(SessionCommand::StopScan),
            AppAction::Connect { peripheral } => {
                SessionEvent::Command(SessionCommand::Connect(peripheral))
            },
            AppAction::Disconnect { user_initiated } => {
                SessionEvent::Command(SessionCommand::Disconnect { user_initiated })
            },
            AppAction::Reconnect => SessionEvent::Command(SessionCommand::Reconnect),
            AppAction::SendUnlock => SessionEvent::Command(SessionCommand::SendUnlock),
            AppAction::SendBatteryRelease => {
                SessionEvent::Command(SessionCommand::SendBatteryRelease)
            },
            AppAction::Lifecycle(lifecycle) => SessionEvent::Lifecycle(lifecycle),
            AppAction::Render | AppAction::Quit => return Vec::new(),
        };
        let result = self.session.handle(event, now);
        self.handle_session_result(result)
    }

    /// Handle a callback from the platform radio.
    pub fn handle_radio(&mut self, event: RadioEvent, now: I) -> Vec<AppEvent> {
        let result = self.session.handle(SessionEvent::Radio(event), now);
        self.handle_session_result(result)
    }

    /// Process a housekeeping tick.
    pub fn handle_tick(&mut self, now: I) -> Vec<AppEvent> {
        let result = self.session.handle(SessionEvent::Tick, now);
        self.handle_session_result(result)
    }

    /// Take pending outgoing radio commands.
    pub fn take_outgoing(&mut self) -> Vec<RadioCommand> {
        std::mem::take(&mut self.outgoing)
    }

    /// The wrapped session.
    pub fn session(&self) -> &ConnectionSession<I> {
        &self.session
    }

    fn handle_session_result(
        &mut self,
        result: Result<Vec<SessionAction>, SessionError>,
    ) -> Vec<AppEvent> {
        match result {
            Ok(actions) => self.process_session_actions(actions),
            Err(e) => {
                warn!(error = %e, "session rejected command");
                vec![
                    AppEvent::SessionUpdated(Box::new(self.session.view())),
                    AppEvent::Error { message: e.to_string() },
                ]
            },
        }
    }

    fn process_session_actions(&mut self, actions: Vec<SessionAction>) -> Vec<AppEvent> {
        let mut events = vec![AppEvent::SessionUpdated(Box::new(self.session.view()))];

        for action in actions {
            match action {
                SessionAction::Radio(command) => self.outgoing.push(command),
                SessionAction::Notice(notice) => match notice {
                    SessionNotice::Connected { peripheral } => {
                        debug!(%peripheral, "link established");
                        events.push(AppEvent::LinkEstablished);
                    },
                    SessionNotice::ConnectionLost { user_initiated, .. } => {
                        events.push(AppEvent::LinkLost { user_initiated });
                    },
                    SessionNotice::LockState(state) => {
                        events.push(AppEvent::LockStateReported(state));
                    },
                    SessionNotice::BatteryState(state) => {
                        events.push(AppEvent::BatteryStateReported(state));
                    },
                    SessionNotice::Error(e) => {
                        events.push(AppEvent::Error { message: e.to_string() });
                    },
                    // Carried by the session view
                    SessionNotice::PhaseChanged(_)
                    | SessionNotice::DirectoryChanged
                    | SessionNotice::ReconnectStarted { .. } => {},
                },
            }
        }

        events
    }
}
