//! Application input events.
//!
//! This module defines [`AppEvent`], the complete set of inputs that drive the
//! [`crate::App`] state machine.
//!
//! Events originate from two distinct sources:
//! - User intents ([`UserIntent`]) and host lifecycle signals.
//! - Session notices translated by the [`crate::Bridge`].

use blulok_core::{BatteryReleaseState, HostLifecycle, LockState, SessionView};

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    /// Start scanning.
    Scan,
    /// Stop scanning.
    StopScan,
    /// Connect to the n-th peripheral of the filtered, ranked list.
    Select(usize),
    /// Abort a connection attempt.
    CancelConnecting,
    /// Disconnect and stay disconnected.
    Disconnect,
    /// Reconnect to the last peripheral.
    Reconnect,
    /// Open the lock.
    Open,
    /// Battery eject button.
    BatteryEject,
    /// Show the lock animation.
    ShowLock,
    /// Show the battery animation.
    ShowBattery,
    /// Replace the picker search filter.
    Search(String),
    /// Leave the application.
    Quit,
}

/// Events processed by the App state machine.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// User input.
    Intent(UserIntent),

    /// Host lifecycle transition.
    Lifecycle(HostLifecycle),

    /// Fresh copy of the session state.
    SessionUpdated(Box<SessionView>),

    /// Lock notification decoded.
    LockStateReported(LockState),

    /// Battery notification decoded.
    BatteryStateReported(BatteryReleaseState),

    /// Both channels found.
    LinkEstablished,

    /// Link closed.
    LinkLost {
        /// Whether the user asked for it.
        user_initiated: bool,
    },

    /// Error occurred.
    Error {
        /// Error description.
        message: String,
    },
}
