//! Observable application state types.
//!
//! This module defines the data published to the presentation layer: the
//! [`Snapshot`] carried on the runtime's change-notification channel and the
//! small enums the [`crate::App`] uses to pick what is on screen.
//!
//! A snapshot is a plain value. It borrows nothing from the session, so a
//! subscriber can hold on to it for as long as it likes.

use std::fmt;

use blulok_core::{EjectStep, Phase, SessionView, SignalQuality, Subject};
use serde::Serialize;

/// Which screen is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Scene {
    /// Device list, shown while not connected.
    #[default]
    Picker,
    /// Lock controls, shown once connected and kept while the link to the
    /// same lock is down or coming back.
    Home,
}

impl Scene {
    /// Scene for a session state.
    ///
    /// Home stays up after an unrequested link loss so the last known lock
    /// and battery frames remain visible. A user disconnect returns to the
    /// picker, as does scanning or connecting to another peripheral.
    pub fn for_session(session: &SessionView) -> Self {
        if session.phase == Phase::Connected {
            return Self::Home;
        }
        let Some(last) = &session.last_connected else {
            return Self::Picker;
        };
        let linked_down = match session.phase {
            Phase::Disconnecting | Phase::Disconnected => true,
            Phase::Connecting => session.active_peripheral.as_ref() == Some(last),
            Phase::Idle | Phase::Scanning | Phase::Connected => false,
        };
        if linked_down && !session.user_initiated_disconnect { Self::Home } else { Self::Picker }
    }
}

/// Command view selected on the home scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CommandView {
    /// Lock animation and Open button.
    #[default]
    Lock,
    /// Battery animation and eject button.
    Battery,
}

/// One row of the picker list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeripheralRow {
    /// Platform identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Last signal strength in dBm.
    pub rssi: i16,
    /// Signal label.
    pub signal: SignalQuality,
}

/// State of one mounted animation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimationView {
    /// Animated subject.
    pub subject: Subject,
    /// Index of the displayed frame.
    pub frame: usize,
    /// Name of the displayed frame. `None` until frames are loaded.
    pub frame_name: Option<String>,
    /// Number of loaded frames.
    pub frame_count: usize,
    /// Whether the animation is stepping towards a target.
    pub playing: bool,
}

/// Asset loading indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadingView {
    /// A load is in flight.
    pub is_loading: bool,
    /// Progress of the current load in `[0, 1]`.
    pub progress: f64,
    /// Set when remote fetch and bundle both failed.
    pub error: Option<String>,
}

impl Default for LoadingView {
    fn default() -> Self {
        Self { is_loading: false, progress: 1.0, error: None }
    }
}

/// Everything the presentation layer needs for one frame of UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Current scene.
    pub scene: Scene,
    /// Selected command view.
    pub command_view: CommandView,
    /// Session state.
    pub session: SessionView,
    /// Battery eject step.
    pub eject_step: EjectStep,
    /// Picker search filter.
    pub search: String,
    /// Directory rows matching the filter, strongest first.
    pub peripherals: Vec<PeripheralRow>,
    /// Latest application-level notice, such as a rejected command.
    pub notice: Option<String>,
    /// Mounted animations.
    pub animations: Vec<AnimationView>,
    /// Asset loading indicator.
    pub loading: LoadingView,
}

impl Snapshot {
    /// Title of the main home button.
    pub fn lock_title(&self) -> &'static str {
        self.session.lock_state.map_or("Waiting", |state| state.title())
    }

    /// Short text rendering used by line-oriented front-ends.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = vec![format!("[{:?}] {}", self.session.phase, self.session.status_text)];
        if let Some(error) = &self.session.error_text {
            lines.push(format!("error: {error}"));
        }
        if let Some(notice) = &self.notice {
            lines.push(format!("notice: {notice}"));
        }
        match self.scene {
            Scene::Picker => {
                if let Some(name) = &self.session.last_connected_name {
                    lines.push(format!("last: {name}"));
                }
                for (index, row) in self.peripherals.iter().enumerate() {
                    lines.push(format!(
                        "{index}: {} ({} dBm, {})",
                        row.name,
                        row.rssi,
                        row.signal.label()
                    ));
                }
            },
            Scene::Home => {
                match (&self.session.connected_name, &self.session.last_connected_name) {
                    (Some(name), _) => lines.push(format!("connected: {name}")),
                    (None, Some(name)) => lines.push(format!("offline: {name}")),
                    (None, None) => {},
                }
                match self.command_view {
                    CommandView::Lock => {
                        let guidance = self
                            .session
                            .lock_state
                            .map_or("Waiting for lock…", |state| state.guidance());
                        lines.push(format!("lock: {} / {guidance}", self.lock_title()));
                    },
                    CommandView::Battery => lines.push(format!(
                        "battery: {} / {}",
                        self.eject_step.button_title(),
                        self.eject_step.guidance()
                    )),
                }
            },
        }
        for animation in &self.animations {
            lines.push(format!(
                "{}: frame {}/{}{}",
                animation.subject.asset_name(),
                animation.frame,
                animation.frame_count,
                if animation.playing { " (playing)" } else { "" }
            ));
        }
        if self.loading.is_loading {
            lines.push(format!("loading {:.0}%", self.loading.progress * 100.0));
        }
        if let Some(error) = &self.loading.error {
            lines.push(format!("assets: {error}"));
        }
        f.write_str(&lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use blulok_core::{ConnectionSession, PeripheralId};

    use super::*;

    fn session(phase: Phase, last: Option<&str>, active: Option<&str>) -> SessionView {
        let mut view = ConnectionSession::<std::time::Instant>::default().view();
        view.phase = phase;
        view.last_connected = last.map(PeripheralId::new);
        view.active_peripheral = active.map(PeripheralId::new);
        view
    }

    #[test]
    fn picker_until_first_connection() {
        for phase in [Phase::Idle, Phase::Scanning, Phase::Connecting, Phase::Disconnected] {
            assert_eq!(Scene::for_session(&session(phase, None, None)), Scene::Picker);
        }
        assert_eq!(Scene::for_session(&session(Phase::Connected, None, Some("A"))), Scene::Home);
    }

    #[test]
    fn home_survives_link_loss() {
        assert_eq!(Scene::for_session(&session(Phase::Disconnected, Some("A"), None)), Scene::Home);
        assert_eq!(Scene::for_session(&session(Phase::Disconnecting, Some("A"), Some("A"))), Scene::Home);
        assert_eq!(Scene::for_session(&session(Phase::Connecting, Some("A"), Some("A"))), Scene::Home);

        assert_eq!(Scene::for_session(&session(Phase::Connecting, Some("A"), Some("B"))), Scene::Picker);
        assert_eq!(Scene::for_session(&session(Phase::Scanning, Some("A"), None)), Scene::Picker);
    }

    #[test]
    fn user_disconnect_returns_to_picker() {
        let mut view = session(Phase::Disconnected, Some("A"), None);
        view.user_initiated_disconnect = true;
        assert_eq!(Scene::for_session(&view), Scene::Picker);
    }
}
