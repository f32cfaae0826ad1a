//! Connection session state machine.
//!
//! Owns the single peripheral link, its channel handles, the peripheral
//! directory and the reconnect policy. Uses the action pattern: every input is
//! a [`SessionEvent`] handed to [`ConnectionSession::handle`] together with
//! the current time, and the session answers with [`SessionAction`]s for the
//! driver to execute. No I/O happens here.
//!
//! # State Machine
//!
//! ```text
//!            scan                connect               both channels
//! ┌──────┐ ───────> ┌──────────┐ ───────> ┌────────────┐ ───────> ┌───────────┐
//! │ Idle │          │ Scanning │          │ Connecting │          │ Connected │
//! └──────┘ <─────── └──────────┘          └────────────┘          └───────────┘
//!    ^       stop                          │  ^     │ disconnect        │ disconnect
//!    │                      connect failed │  │     ↓                   ↓
//!    │  scan             ┌──────────────┐  │  │  ┌───────────────┐<─────┘
//!    └───────────────────│ Disconnected │<─┘  │  │ Disconnecting │
//!                        └──────────────┘<────┼──└───────────────┘
//!                                │  reconnect │      confirmed
//!                                └────────────┘
//! ```
//!
//! # Invariants
//!
//! - The active peripheral is set iff the phase is Connecting, Connected or
//!   Disconnecting.
//! - Channel handles are only handed out while Connected.
//! - Callbacks about a peripheral other than the active one, or for a stage
//!   the link has already left, are discarded.

use std::{
    collections::BTreeMap,
    ops::Sub,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::SessionConfig,
    device_state::{BatteryReleaseState, LockState, decode_battery_state, decode_lock_state},
    directory::PeripheralDirectory,
    error::SessionError,
    event::{
        HostLifecycle, RadioCommand, RadioEvent, RadioState, SessionAction, SessionCommand,
        SessionEvent, SessionNotice,
    },
    peripheral::{PeripheralId, PeripheralRecord},
    protocol::{CONTROL_SERVICE_UUID, Channel},
};

/// Status line shown before anything happened.
pub const INITIAL_STATUS: &str = "Tap Scan to find devices";

/// Error text recorded when a command arrives before its channel is ready.
pub const NOT_READY_TEXT: &str = "Not ready to send command";

/// Session phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Scanning with no link.
    Scanning,
    /// Resolving, connecting or discovering channels.
    Connecting,
    /// Both channels found.
    Connected,
    /// Disconnect requested, waiting for the platform.
    Disconnecting,
    /// Link closed.
    Disconnected,
}

impl Phase {
    /// Whether a peripheral is active in this phase.
    pub fn has_active_peripheral(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Disconnecting)
    }
}

/// Progress of the active link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LinkStage {
    /// Looking the last peripheral up by identifier.
    Resolving,
    /// Platform connect in flight.
    Connecting,
    /// Looking for the control service.
    DiscoveringServices,
    /// Looking for the unlock and release channels.
    DiscoveringChannels,
    /// Both channels found.
    Ready,
    /// Disconnect requested.
    Closing,
}

#[derive(Debug, Clone)]
struct Link<I> {
    peripheral: PeripheralId,
    display_name: String,
    stage: LinkStage,
    /// Start of the current stage.
    since: I,
    unlock: bool,
    release: bool,
}

impl<I> Link<I> {
    fn new(peripheral: PeripheralId, display_name: String, stage: LinkStage, now: I) -> Self {
        Self { peripheral, display_name, stage, since: now, unlock: false, release: false }
    }

    fn has(&self, channel: Channel) -> bool {
        match channel {
            Channel::Unlock => self.unlock,
            Channel::Release => self.release,
        }
    }

    fn mark(&mut self, channel: Channel) {
        match channel {
            Channel::Unlock => self.unlock = true,
            Channel::Release => self.release = true,
        }
    }
}

/// Write handle for one channel of the connected peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelHandle {
    /// Connected peripheral
    pub peripheral: PeripheralId,
    /// Channel
    pub channel: Channel,
}

/// Serializable copy of everything the session exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    /// Current phase
    pub phase: Phase,
    /// Stage of the active link, if any
    pub link_stage: Option<LinkStage>,
    /// Active peripheral
    pub active_peripheral: Option<PeripheralId>,
    /// Peripheral to reconnect to
    pub last_connected: Option<PeripheralId>,
    /// Name of the peripheral to reconnect to
    pub last_connected_name: Option<String>,
    /// Name of the linked peripheral
    pub connected_name: Option<String>,
    /// Whether the user asked for the last disconnect
    pub user_initiated_disconnect: bool,
    /// Whether a scan is running
    pub scanning: bool,
    /// Radio power state
    pub radio: RadioState,
    /// Status line
    pub status_text: String,
    /// Last error text
    pub error_text: Option<String>,
    /// Last decoded lock state
    pub lock_state: Option<LockState>,
    /// Last decoded battery state
    pub battery_state: Option<BatteryReleaseState>,
    /// Channels currently accepting writes
    pub channels: Vec<ChannelHandle>,
    /// Consecutive automatic reconnects since the last established link
    pub reconnect_attempts: u32,
    /// Directory, strongest first
    pub directory: Vec<PeripheralRecord>,
}

fn discarded(callback: &'static str, peripheral: &PeripheralId) -> Vec<SessionAction> {
    debug!(%peripheral, callback, "discarding stale callback");
    Vec::new()
}

fn radio(command: RadioCommand) -> SessionAction {
    SessionAction::Radio(command)
}

fn notice(notice: SessionNotice) -> SessionAction {
    SessionAction::Notice(notice)
}

/// Connection session.
///
/// Generic over `Instant` so tests can drive virtual time.
#[derive(Debug, Clone)]
pub struct ConnectionSession<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    config: SessionConfig,
    phase: Phase,
    radio: RadioState,
    scanning: bool,
    directory: PeripheralDirectory,
    link: Option<Link<I>>,
    /// Close confirmations still outstanding for links the session has
    /// already moved on from, counted per peripheral.
    pending_closes: BTreeMap<PeripheralId, u32>,
    last_connected: Option<PeripheralId>,
    last_connected_name: Option<String>,
    connected_name: Option<String>,
    user_initiated_disconnect: bool,
    lock_state: Option<LockState>,
    battery_state: Option<BatteryReleaseState>,
    status_text: String,
    error_text: Option<String>,
    reconnect_attempts: u32,
    /// Start of the backoff wait before the next automatic reconnect.
    reconnect_wait: Option<I>,
}

impl<I> ConnectionSession<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create an idle session.
    pub fn new(config: SessionConfig) -> Self {
        let directory = PeripheralDirectory::new(&config.name_tag, &config.placeholder_name);
        Self {
            config,
            phase: Phase::Idle,
            radio: RadioState::Unknown,
            scanning: false,
            directory,
            link: None,
            pending_closes: BTreeMap::new(),
            last_connected: None,
            last_connected_name: None,
            connected_name: None,
            user_initiated_disconnect: false,
            lock_state: None,
            battery_state: None,
            status_text: INITIAL_STATUS.to_owned(),
            error_text: None,
            reconnect_attempts: 0,
            reconnect_wait: None,
        }
    }

    /// Process one input.
    ///
    /// Only commands can fail. A rejected command leaves the session in its
    /// phase, at most updating the status or error text. Failures caused by
    /// platform callbacks are reported as [`SessionNotice::Error`] instead.
    ///
    /// # Errors
    ///
    /// - `SessionError::RadioUnavailable` when scanning with an unusable radio
    /// - `SessionError::InvalidState` for a command invalid in this phase
    /// - `SessionError::ChannelNotReady` for a write before channels are found
    pub fn handle(&mut self, event: SessionEvent, now: I) -> Result<Vec<SessionAction>, SessionError> {
        let before = self.phase;

        let mut actions = match event {
            SessionEvent::Command(command) => self.handle_command(command, now)?,
            SessionEvent::Radio(event) => self.handle_radio(event, now),
            SessionEvent::Lifecycle(lifecycle) => self.handle_lifecycle(lifecycle, now),
            SessionEvent::Tick => self.tick(now),
        };

        if self.phase != before {
            info!(from = ?before, to = ?self.phase, "session phase changed");
            actions.push(notice(SessionNotice::PhaseChanged(self.phase)));
        }

        debug_assert_eq!(self.link.is_some(), self.phase.has_active_peripheral());
        Ok(actions)
    }

    /// Shorthand for `handle(SessionEvent::Command(..))`.
    pub fn command(&mut self, command: SessionCommand, now: I) -> Result<Vec<SessionAction>, SessionError> {
        self.handle(SessionEvent::Command(command), now)
    }

    /// Shorthand for `handle(SessionEvent::Radio(..))`. Never fails.
    pub fn radio_event(&mut self, event: RadioEvent, now: I) -> Vec<SessionAction> {
        self.handle(SessionEvent::Radio(event), now).unwrap_or_default()
    }

    fn handle_command(
        &mut self,
        command: SessionCommand,
        now: I,
    ) -> Result<Vec<SessionAction>, SessionError> {
        match command {
            SessionCommand::StartScan => self.start_scan(),
            SessionCommand::StopScan => self.stop_scan(),
            SessionCommand::Connect(peripheral) => Ok(self.connect(peripheral, now)),
            SessionCommand::Disconnect { user_initiated } => self.disconnect(user_initiated),
            SessionCommand::Reconnect => self.reconnect(now, false),
            SessionCommand::SendUnlock => self.send(Channel::Unlock),
            SessionCommand::SendBatteryRelease => self.send(Channel::Release),
        }
    }

    fn start_scan(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if !self.radio.is_usable() {
            warn!(radio = ?self.radio, "scan requested with unusable radio");
            "Bluetooth is not enabled".clone_into(&mut self.status_text);
            return Err(SessionError::RadioUnavailable { state: self.radio });
        }

        self.error_text = None;
        self.reconnect_wait = None;
        self.directory.reset();
        self.scanning = true;
        "Scanning for devices…".clone_into(&mut self.status_text);
        if !self.phase.has_active_peripheral() {
            self.phase = Phase::Scanning;
        }

        Ok(vec![radio(RadioCommand::StartScan), notice(SessionNotice::DirectoryChanged)])
    }

    fn stop_scan(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if !self.scanning {
            return Err(SessionError::InvalidState { phase: self.phase, operation: "stop_scan" });
        }
        let mut actions = Vec::new();
        self.halt_scan(&mut actions);
        Ok(actions)
    }

    fn halt_scan(&mut self, actions: &mut Vec<SessionAction>) {
        if !self.scanning {
            return;
        }
        self.scanning = false;
        "Scan stopped".clone_into(&mut self.status_text);
        if self.phase == Phase::Scanning {
            self.phase = Phase::Idle;
        }
        actions.push(radio(RadioCommand::StopScan));
    }

    /// Drop the current link, cancelling it on the platform if one exists.
    fn release_link(&mut self, actions: &mut Vec<SessionAction>) {
        let Some(link) = self.link.take() else {
            return;
        };
        debug!(peripheral = %link.peripheral, stage = ?link.stage, "releasing link");
        self.connected_name = None;
        match link.stage {
            LinkStage::Resolving => {},
            LinkStage::Closing => self.expect_close(link.peripheral),
            _ => {
                actions.push(radio(RadioCommand::Disconnect { peripheral: link.peripheral.clone() }));
                self.expect_close(link.peripheral);
            },
        }
    }

    fn expect_close(&mut self, peripheral: PeripheralId) {
        *self.pending_closes.entry(peripheral).or_default() += 1;
    }

    /// Consume one outstanding close confirmation for `peripheral`.
    fn take_close(&mut self, peripheral: &PeripheralId) -> bool {
        let Some(count) = self.pending_closes.get_mut(peripheral) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.pending_closes.remove(peripheral);
        }
        true
    }

    fn connect(&mut self, peripheral: PeripheralId, now: I) -> Vec<SessionAction> {
        let display_name = self
            .directory
            .get(&peripheral)
            .map(|record| record.display_name.clone())
            .or_else(|| {
                (self.last_connected.as_ref() == Some(&peripheral))
                    .then(|| self.last_connected_name.clone())
                    .flatten()
            })
            .unwrap_or_else(|| peripheral.to_string());

        let mut actions = Vec::new();
        self.halt_scan(&mut actions);
        self.release_link(&mut actions);

        info!(%peripheral, %display_name, "connecting");
        self.error_text = None;
        self.reconnect_wait = None;
        self.reconnect_attempts = 0;
        self.status_text = format!("Connecting to {display_name}…");
        self.link = Some(Link::new(peripheral.clone(), display_name, LinkStage::Connecting, now));
        self.phase = Phase::Connecting;

        actions.push(radio(RadioCommand::Connect { peripheral }));
        actions
    }

    fn disconnect(&mut self, user_initiated: bool) -> Result<Vec<SessionAction>, SessionError> {
        let link = match self.link.as_mut() {
            Some(link) if matches!(self.phase, Phase::Connecting | Phase::Connected) => link,
            _ => {
                return Err(SessionError::InvalidState { phase: self.phase, operation: "disconnect" });
            },
        };

        info!(peripheral = %link.peripheral, user_initiated, "disconnecting");
        self.last_connected = Some(link.peripheral.clone());
        self.last_connected_name =
            Some(self.connected_name.clone().unwrap_or_else(|| link.display_name.clone()));
        if user_initiated {
            self.user_initiated_disconnect = true;
            self.reconnect_wait = None;
        }

        if link.stage == LinkStage::Resolving {
            // Nothing exists on the platform yet
            self.link = None;
            self.phase = Phase::Disconnected;
            "Disconnected".clone_into(&mut self.status_text);
            return Ok(Vec::new());
        }

        link.stage = LinkStage::Closing;
        self.phase = Phase::Disconnecting;
        Ok(vec![radio(RadioCommand::Disconnect { peripheral: link.peripheral.clone() })])
    }

    fn reconnect(&mut self, now: I, automatic: bool) -> Result<Vec<SessionAction>, SessionError> {
        self.user_initiated_disconnect = false;
        self.reconnect_wait = None;
        if !automatic {
            self.reconnect_attempts = 0;
        }

        let started = notice(SessionNotice::ReconnectStarted { automatic });
        let Some(peripheral) = self.last_connected.clone() else {
            debug!("nothing to reconnect to, scanning instead");
            let mut actions = self.start_scan()?;
            actions.insert(0, started);
            return Ok(actions);
        };

        let mut actions = vec![started];
        self.halt_scan(&mut actions);
        self.release_link(&mut actions);

        info!(%peripheral, automatic, attempt = self.reconnect_attempts, "reconnecting");
        self.error_text = None;
        let display_name = self.last_connected_name.clone().unwrap_or_else(|| "device".to_owned());
        self.link = Some(Link::new(peripheral.clone(), display_name, LinkStage::Resolving, now));
        self.phase = Phase::Connecting;

        actions.push(radio(RadioCommand::Resolve { peripheral }));
        Ok(actions)
    }

    fn send(&mut self, channel: Channel) -> Result<Vec<SessionAction>, SessionError> {
        let peripheral = match &self.link {
            Some(link)
                if self.phase == Phase::Connected
                    && link.stage == LinkStage::Ready
                    && link.has(channel) =>
            {
                link.peripheral.clone()
            },
            _ => {
                warn!(?channel, phase = ?self.phase, "command before channel ready");
                self.error_text = Some(NOT_READY_TEXT.to_owned());
                return Err(SessionError::ChannelNotReady { channel, phase: self.phase });
            },
        };

        debug!(%peripheral, ?channel, command = channel.command(), "writing command");
        "Command sent".clone_into(&mut self.status_text);
        Ok(vec![radio(RadioCommand::Write {
            peripheral,
            characteristic: channel.uuid(),
            value: vec![channel.command()],
            with_response: true,
        })])
    }

    fn matching<'a>(
        link: &'a mut Option<Link<I>>,
        peripheral: &PeripheralId,
        stages: &[LinkStage],
    ) -> Option<&'a mut Link<I>> {
        link.as_mut().filter(|link| &link.peripheral == peripheral && stages.contains(&link.stage))
    }

    fn handle_radio(&mut self, event: RadioEvent, now: I) -> Vec<SessionAction> {
        match event {
            RadioEvent::StateChanged(state) => {
                info!(?state, "radio state changed");
                self.radio = state;
                state.status_text().clone_into(&mut self.status_text);
                if !state.is_usable() && self.scanning {
                    self.scanning = false;
                    if self.phase == Phase::Scanning {
                        self.phase = Phase::Idle;
                    }
                }
                Vec::new()
            },

            RadioEvent::Advertisement(advertisement) => {
                if self.scanning && self.directory.observe(&advertisement) {
                    vec![notice(SessionNotice::DirectoryChanged)]
                } else {
                    Vec::new()
                }
            },

            RadioEvent::Resolved { peripheral, name } => {
                let Some(link) = Self::matching(&mut self.link, &peripheral, &[LinkStage::Resolving])
                else {
                    return discarded("resolved", &peripheral);
                };
                if let Some(name) = name {
                    link.display_name = name;
                }
                link.stage = LinkStage::Connecting;
                link.since = now;
                self.status_text = format!("Reconnecting to {}…", link.display_name);
                vec![radio(RadioCommand::Connect { peripheral })]
            },

            RadioEvent::ResolveFailed { peripheral } => {
                if Self::matching(&mut self.link, &peripheral, &[LinkStage::Resolving]).is_none() {
                    return discarded("resolve_failed", &peripheral);
                }
                warn!(%peripheral, "last peripheral not found, scanning");
                self.link = None;
                self.phase = Phase::Idle;
                match self.start_scan() {
                    Ok(actions) => {
                        "Device not found. Scanning…".clone_into(&mut self.status_text);
                        actions
                    },
                    Err(error) => vec![notice(SessionNotice::Error(error))],
                }
            },

            RadioEvent::Connected { peripheral, name } => {
                let Some(link) = Self::matching(&mut self.link, &peripheral, &[LinkStage::Connecting])
                else {
                    return discarded("connected", &peripheral);
                };
                if let Some(name) = name {
                    link.display_name = name;
                }
                link.stage = LinkStage::DiscoveringServices;
                link.since = now;
                info!(%peripheral, display_name = %link.display_name, "link established, discovering");

                self.connected_name = Some(link.display_name.clone());
                self.last_connected = Some(peripheral.clone());
                self.last_connected_name = Some(link.display_name.clone());
                self.user_initiated_disconnect = false;
                "Discovering services…".clone_into(&mut self.status_text);
                vec![radio(RadioCommand::DiscoverServices { peripheral, service: CONTROL_SERVICE_UUID })]
            },

            RadioEvent::ConnectFailed { peripheral, error } => {
                if Self::matching(&mut self.link, &peripheral, &[LinkStage::Connecting, LinkStage::Closing])
                    .is_none()
                {
                    return discarded("connect_failed", &peripheral);
                }
                let reason = error.unwrap_or_else(|| "Unknown error".to_owned());
                warn!(%peripheral, %reason, "connect failed");
                self.link = None;
                self.connected_name = None;
                self.phase = Phase::Disconnected;
                "Failed to connect".clone_into(&mut self.status_text);
                self.error_text = Some(reason.clone());
                vec![notice(SessionNotice::Error(SessionError::ConnectFailed { peripheral, reason }))]
            },

            RadioEvent::Disconnected { peripheral, error } => {
                self.on_disconnected(peripheral, error, now)
            },

            RadioEvent::ServicesDiscovered { peripheral, services } => {
                let Some(link) =
                    Self::matching(&mut self.link, &peripheral, &[LinkStage::DiscoveringServices])
                else {
                    return discarded("services_discovered", &peripheral);
                };
                if !services.contains(&CONTROL_SERVICE_UUID) {
                    warn!(%peripheral, ?services, "control service missing");
                    return Vec::new();
                }
                link.stage = LinkStage::DiscoveringChannels;
                "Discovering characteristics…".clone_into(&mut self.status_text);
                vec![radio(RadioCommand::DiscoverCharacteristics {
                    peripheral,
                    service: CONTROL_SERVICE_UUID,
                    characteristics: Channel::ALL.iter().map(|c| c.uuid()).collect(),
                })]
            },

            RadioEvent::CharacteristicsDiscovered { peripheral, service, characteristics } => {
                let Some(link) =
                    Self::matching(&mut self.link, &peripheral, &[LinkStage::DiscoveringChannels])
                else {
                    return discarded("characteristics_discovered", &peripheral);
                };
                if service != CONTROL_SERVICE_UUID {
                    return Vec::new();
                }

                let mut actions = Vec::new();
                for channel in Channel::ALL {
                    if characteristics.contains(&channel.uuid()) && !link.has(channel) {
                        link.mark(channel);
                        actions.push(radio(RadioCommand::SetNotify {
                            peripheral: peripheral.clone(),
                            characteristic: channel.uuid(),
                            enabled: true,
                        }));
                    }
                }

                if link.unlock && link.release {
                    link.stage = LinkStage::Ready;
                    info!(%peripheral, "channels ready");
                    self.phase = Phase::Connected;
                    self.reconnect_attempts = 0;
                    "Connected".clone_into(&mut self.status_text);
                    actions.push(notice(SessionNotice::Connected { peripheral }));
                } else {
                    warn!(%peripheral, unlock = link.unlock, release = link.release, "channels incomplete");
                }
                actions
            },

            RadioEvent::DiscoveryFailed { peripheral, error } => {
                if Self::matching(&mut self.link, &peripheral, &[
                    LinkStage::DiscoveringServices,
                    LinkStage::DiscoveringChannels,
                ])
                .is_none()
                {
                    return discarded("discovery_failed", &peripheral);
                }
                warn!(%peripheral, %error, "discovery failed");
                self.error_text = Some(error);
                Vec::new()
            },

            RadioEvent::Notification { peripheral, characteristic, value } => {
                if Self::matching(&mut self.link, &peripheral, &[
                    LinkStage::DiscoveringChannels,
                    LinkStage::Ready,
                ])
                .is_none()
                {
                    return discarded("notification", &peripheral);
                }
                match Channel::from_uuid(characteristic) {
                    Some(Channel::Unlock) => match decode_lock_state(&value) {
                        Some(state) => {
                            debug!(?state, code = state.code(), "lock state");
                            self.lock_state = Some(state);
                            vec![notice(SessionNotice::LockState(state))]
                        },
                        None => Vec::new(),
                    },
                    Some(Channel::Release) => match decode_battery_state(&value) {
                        Some(state) => {
                            debug!(?state, code = state.code(), "battery state");
                            self.battery_state = Some(state);
                            vec![notice(SessionNotice::BatteryState(state))]
                        },
                        None => Vec::new(),
                    },
                    None => Vec::new(),
                }
            },

            RadioEvent::WriteConfirmed { peripheral, characteristic, error } => {
                if Self::matching(&mut self.link, &peripheral, &[LinkStage::Ready]).is_none() {
                    return discarded("write_confirmed", &peripheral);
                }
                let Some(channel) = Channel::from_uuid(characteristic) else {
                    return Vec::new();
                };
                match error {
                    Some(reason) => {
                        warn!(%peripheral, ?channel, %reason, "write failed");
                        "Write failed".clone_into(&mut self.status_text);
                        self.error_text = Some(reason.clone());
                        vec![notice(SessionNotice::Error(SessionError::WriteFailed { channel, reason }))]
                    },
                    None => {
                        "Command sent ✓".clone_into(&mut self.status_text);
                        Vec::new()
                    },
                }
            },
        }
    }

    fn on_disconnected(
        &mut self,
        peripheral: PeripheralId,
        error: Option<String>,
        now: I,
    ) -> Vec<SessionAction> {
        if self.take_close(&peripheral) {
            debug!(%peripheral, "cancelled link closed");
            return Vec::new();
        }

        let Some(link) =
            self.link.take_if(|link| link.peripheral == peripheral && link.stage != LinkStage::Resolving)
        else {
            return discarded("disconnected", &peripheral);
        };

        let user_initiated = self.user_initiated_disconnect;
        let requested = link.stage == LinkStage::Closing;
        info!(%peripheral, requested, user_initiated, error = ?error, "link closed");

        self.phase = Phase::Disconnected;
        self.connected_name = None;
        self.last_connected = Some(peripheral.clone());
        self.last_connected_name = Some(link.display_name);
        "Disconnected".clone_into(&mut self.status_text);
        if let Some(error) = &error {
            self.error_text = Some(error.clone());
        }

        let mut actions = vec![notice(SessionNotice::ConnectionLost {
            peripheral: peripheral.clone(),
            user_initiated,
        })];
        if !requested {
            actions.push(notice(SessionNotice::Error(SessionError::UnsolicitedDisconnect {
                peripheral,
                reason: error,
            })));
        }
        if !user_initiated {
            actions.extend(self.schedule_reconnect(now));
        }
        actions
    }

    fn schedule_reconnect(&mut self, now: I) -> Vec<SessionAction> {
        let attempt = self.reconnect_attempts.saturating_add(1);
        if !self.config.reconnect.allows(attempt) {
            let error = SessionError::ReconnectExhausted { attempts: self.reconnect_attempts };
            warn!(attempts = self.reconnect_attempts, "auto-reconnect exhausted");
            self.error_text = Some(error.to_string());
            return vec![notice(SessionNotice::Error(error))];
        }
        self.reconnect_attempts = attempt;

        if self.config.reconnect.backoff.is_zero() {
            self.reconnect(now, true).unwrap_or_else(|error| vec![notice(SessionNotice::Error(error))])
        } else {
            debug!(attempt, backoff = ?self.config.reconnect.backoff, "reconnect deferred");
            self.reconnect_wait = Some(now);
            Vec::new()
        }
    }

    fn handle_lifecycle(&mut self, lifecycle: HostLifecycle, now: I) -> Vec<SessionAction> {
        let result = match lifecycle {
            HostLifecycle::Foreground => {
                let idle = matches!(
                    self.phase,
                    Phase::Idle | Phase::Scanning | Phase::Disconnecting | Phase::Disconnected
                );
                if idle && !self.user_initiated_disconnect && self.last_connected.is_some() {
                    self.reconnect(now, true)
                } else {
                    Ok(Vec::new())
                }
            },
            HostLifecycle::Background => {
                if self.phase == Phase::Connected {
                    self.disconnect(false)
                } else {
                    Ok(Vec::new())
                }
            },
        };
        result.unwrap_or_else(|error| vec![notice(SessionNotice::Error(error))])
    }

    fn tick(&mut self, now: I) -> Vec<SessionAction> {
        if let (Some(timeout), Some(link)) = (self.config.discovery_timeout, &self.link) {
            let discovering =
                matches!(link.stage, LinkStage::DiscoveringServices | LinkStage::DiscoveringChannels);
            let elapsed = now - link.since;
            if discovering && elapsed >= timeout {
                return self.abort_discovery(elapsed);
            }
        }

        if let Some(start) = self.reconnect_wait
            && self.phase == Phase::Disconnected
            && now - start >= self.config.reconnect.backoff
        {
            return self.reconnect(now, true).unwrap_or_else(|error| vec![notice(SessionNotice::Error(error))]);
        }

        Vec::new()
    }

    fn abort_discovery(&mut self, elapsed: Duration) -> Vec<SessionAction> {
        let Some(link) = self.link.take() else {
            return Vec::new();
        };
        let error = SessionError::DiscoveryTimeout { peripheral: link.peripheral.clone(), elapsed };
        warn!(peripheral = %link.peripheral, ?elapsed, "discovery timed out");

        self.expect_close(link.peripheral.clone());
        self.connected_name = None;
        self.phase = Phase::Disconnected;
        "Failed to connect".clone_into(&mut self.status_text);
        self.error_text = Some(error.to_string());

        vec![
            radio(RadioCommand::Disconnect { peripheral: link.peripheral }),
            notice(SessionNotice::Error(error)),
        ]
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Stage of the active link.
    pub fn link_stage(&self) -> Option<LinkStage> {
        self.link.as_ref().map(|link| link.stage)
    }

    /// Active peripheral. Set iff the phase has one.
    pub fn active_peripheral(&self) -> Option<&PeripheralId> {
        self.link.as_ref().map(|link| &link.peripheral)
    }

    /// Peripheral a reconnect would target.
    pub fn last_connected(&self) -> Option<&PeripheralId> {
        self.last_connected.as_ref()
    }

    /// Display name of the peripheral a reconnect would target.
    pub fn last_connected_name(&self) -> Option<&str> {
        self.last_connected_name.as_deref()
    }

    /// Display name of the linked peripheral.
    pub fn connected_name(&self) -> Option<&str> {
        self.connected_name.as_deref()
    }

    /// Whether the user asked for the last disconnect.
    pub fn user_initiated_disconnect(&self) -> bool {
        self.user_initiated_disconnect
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Whether a link is being established.
    pub fn is_connecting(&self) -> bool {
        self.phase == Phase::Connecting
    }

    /// Radio state.
    pub fn radio_state(&self) -> RadioState {
        self.radio
    }

    /// Write handle for a channel. `None` unless Connected.
    pub fn channel(&self, channel: Channel) -> Option<ChannelHandle> {
        let link = self.link.as_ref()?;
        (self.phase == Phase::Connected && link.stage == LinkStage::Ready && link.has(channel))
            .then(|| ChannelHandle { peripheral: link.peripheral.clone(), channel })
    }

    /// Last decoded lock state. Kept across disconnects.
    pub fn lock_state(&self) -> Option<LockState> {
        self.lock_state
    }

    /// Last decoded battery state. Kept across disconnects.
    pub fn battery_state(&self) -> Option<BatteryReleaseState> {
        self.battery_state
    }

    /// Status line.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Last error text.
    pub fn error_text(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    /// Consecutive automatic reconnects since the last established link.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Close confirmations still expected for `peripheral` from links the
    /// session already dropped.
    pub fn pending_closes(&self, peripheral: &PeripheralId) -> u32 {
        self.pending_closes.get(peripheral).copied().unwrap_or(0)
    }

    /// Peripheral directory.
    pub fn directory(&self) -> &PeripheralDirectory {
        &self.directory
    }

    /// Configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Copy of everything observable.
    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            link_stage: self.link_stage(),
            active_peripheral: self.active_peripheral().cloned(),
            last_connected: self.last_connected.clone(),
            last_connected_name: self.last_connected_name.clone(),
            connected_name: self.connected_name.clone(),
            user_initiated_disconnect: self.user_initiated_disconnect,
            scanning: self.scanning,
            radio: self.radio,
            status_text: self.status_text.clone(),
            error_text: self.error_text.clone(),
            lock_state: self.lock_state,
            battery_state: self.battery_state,
            channels: Channel::ALL.into_iter().filter_map(|c| self.channel(c)).collect(),
            reconnect_attempts: self.reconnect_attempts,
            directory: self.directory.ranked().to_vec(),
        }
    }
}

impl<I> Default for ConnectionSession<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
