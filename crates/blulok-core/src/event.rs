//! Session inputs and outputs.
//!
//! Every platform callback is folded into one [`RadioEvent`] enum and every
//! request to the platform is one [`RadioCommand`]. The session consumes
//! [`SessionEvent`]s and returns [`SessionAction`]s; nothing in this crate
//! touches a real radio.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    device_state::{BatteryReleaseState, LockState},
    error::SessionError,
    peripheral::{Advertisement, PeripheralId},
    session::Phase,
};

/// Power and authorisation state of the local radio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum RadioState {
    /// Not reported yet, or resetting.
    #[default]
    Unknown,
    /// Powered and authorised.
    PoweredOn,
    /// Switched off.
    PoweredOff,
    /// The user denied access.
    Unauthorized,
    /// No usable radio hardware.
    Unsupported,
}

impl RadioState {
    /// Whether scanning and connecting are possible.
    pub fn is_usable(self) -> bool {
        self == Self::PoweredOn
    }

    /// Status line reported when the radio changes state.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::PoweredOn => "Bluetooth ready",
            Self::PoweredOff => "Bluetooth is off",
            Self::Unauthorized => "Bluetooth permission denied",
            Self::Unknown | Self::Unsupported => "Bluetooth not available",
        }
    }
}

/// Callback delivered by the platform radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// Radio power or authorisation changed.
    StateChanged(RadioState),
    /// Advertisement received while scanning.
    Advertisement(Advertisement),
    /// Identifier lookup for a reconnect succeeded.
    Resolved {
        /// Peripheral looked up
        peripheral: PeripheralId,
        /// Name the platform currently knows, if any
        name: Option<String>,
    },
    /// Identifier lookup for a reconnect found nothing.
    ResolveFailed {
        /// Peripheral looked up
        peripheral: PeripheralId,
    },
    /// Link established.
    Connected {
        /// Connected peripheral
        peripheral: PeripheralId,
        /// Name reported by the platform, if any
        name: Option<String>,
    },
    /// Link could not be established.
    ConnectFailed {
        /// Peripheral that failed
        peripheral: PeripheralId,
        /// Platform error text
        error: Option<String>,
    },
    /// Link closed, requested or not.
    Disconnected {
        /// Peripheral that dropped
        peripheral: PeripheralId,
        /// Platform error text for an abnormal close
        error: Option<String>,
    },
    /// Service discovery finished.
    ServicesDiscovered {
        /// Peripheral discovered
        peripheral: PeripheralId,
        /// Services found
        services: Vec<Uuid>,
    },
    /// Characteristic discovery finished.
    CharacteristicsDiscovered {
        /// Peripheral discovered
        peripheral: PeripheralId,
        /// Service searched
        service: Uuid,
        /// Characteristics found
        characteristics: Vec<Uuid>,
    },
    /// Service or characteristic discovery reported an error.
    DiscoveryFailed {
        /// Peripheral discovered
        peripheral: PeripheralId,
        /// Platform error text
        error: String,
    },
    /// Characteristic value notification.
    Notification {
        /// Notifying peripheral
        peripheral: PeripheralId,
        /// Characteristic that changed
        characteristic: Uuid,
        /// Raw value
        value: Vec<u8>,
    },
    /// Write acknowledgement.
    WriteConfirmed {
        /// Written peripheral
        peripheral: PeripheralId,
        /// Characteristic written
        characteristic: Uuid,
        /// Platform error text, `None` on success
        error: Option<String>,
    },
}

impl RadioEvent {
    /// Peripheral the callback is about. `None` for radio-wide events.
    pub fn peripheral(&self) -> Option<&PeripheralId> {
        match self {
            Self::StateChanged(_) => None,
            Self::Advertisement(ad) => Some(&ad.id),
            Self::Resolved { peripheral, .. }
            | Self::ResolveFailed { peripheral }
            | Self::Connected { peripheral, .. }
            | Self::ConnectFailed { peripheral, .. }
            | Self::Disconnected { peripheral, .. }
            | Self::ServicesDiscovered { peripheral, .. }
            | Self::CharacteristicsDiscovered { peripheral, .. }
            | Self::DiscoveryFailed { peripheral, .. }
            | Self::Notification { peripheral, .. }
            | Self::WriteConfirmed { peripheral, .. } => Some(peripheral),
        }
    }
}

/// Request to the platform radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCommand {
    /// Start reporting advertisements (duplicates included).
    StartScan,
    /// Stop reporting advertisements.
    StopScan,
    /// Look a peripheral up by identifier without scanning.
    Resolve {
        /// Peripheral to look up
        peripheral: PeripheralId,
    },
    /// Open a link.
    Connect {
        /// Target peripheral
        peripheral: PeripheralId,
    },
    /// Close or cancel a link.
    Disconnect {
        /// Target peripheral
        peripheral: PeripheralId,
    },
    /// Discover one service.
    DiscoverServices {
        /// Target peripheral
        peripheral: PeripheralId,
        /// Service wanted
        service: Uuid,
    },
    /// Discover characteristics inside a service.
    DiscoverCharacteristics {
        /// Target peripheral
        peripheral: PeripheralId,
        /// Containing service
        service: Uuid,
        /// Characteristics wanted
        characteristics: Vec<Uuid>,
    },
    /// Enable or disable notifications.
    SetNotify {
        /// Target peripheral
        peripheral: PeripheralId,
        /// Characteristic to subscribe
        characteristic: Uuid,
        /// Subscribe or unsubscribe
        enabled: bool,
    },
    /// Write a value.
    Write {
        /// Target peripheral
        peripheral: PeripheralId,
        /// Characteristic to write
        characteristic: Uuid,
        /// Payload
        value: Vec<u8>,
        /// Request an acknowledgement
        with_response: bool,
    },
}

/// Request from the application to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Clear the directory and scan.
    StartScan,
    /// Stop scanning.
    StopScan,
    /// Connect to a discovered peripheral.
    Connect(PeripheralId),
    /// Tear the current link down.
    Disconnect {
        /// `true` suppresses auto-reconnect
        user_initiated: bool,
    },
    /// Reconnect to the last connected peripheral.
    Reconnect,
    /// Write the unlock command.
    SendUnlock,
    /// Write the battery release command.
    SendBatteryRelease,
}

/// Host application lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HostLifecycle {
    /// App became visible.
    Foreground,
    /// App was suspended.
    Background,
}

/// Everything the session consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Application request.
    Command(SessionCommand),
    /// Platform callback.
    Radio(RadioEvent),
    /// Host lifecycle signal.
    Lifecycle(HostLifecycle),
    /// Housekeeping tick for timeouts and reconnect backoff.
    Tick,
}

/// Something the application may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// Phase moved.
    PhaseChanged(Phase),
    /// Directory contents or ordering changed.
    DirectoryChanged,
    /// Both channels found, commands accepted.
    Connected {
        /// Linked peripheral
        peripheral: PeripheralId,
    },
    /// Link closed while established or being established.
    ConnectionLost {
        /// Peripheral that dropped
        peripheral: PeripheralId,
        /// Whether the user asked for it
        user_initiated: bool,
    },
    /// A reconnect attempt started.
    ReconnectStarted {
        /// Started by the session rather than by a request
        automatic: bool,
    },
    /// Lock notification decoded.
    LockState(LockState),
    /// Battery notification decoded.
    BatteryState(BatteryReleaseState),
    /// Recoverable failure.
    Error(SessionError),
}

/// Output of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Forward to the platform radio.
    Radio(RadioCommand),
    /// Report to the application.
    Notice(SessionNotice),
}
