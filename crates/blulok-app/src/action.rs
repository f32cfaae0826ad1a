//! Application side-effects and intents.
//!
//! This module defines the [`AppAction`] enum, which represents instructions
//! produced by the [`crate::App`] state machine for the runtime to execute.

use blulok_core::{HostLifecycle, PeripheralId};

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Clear the directory and scan.
    StartScan,

    /// Stop scanning.
    StopScan,

    /// Connect to a discovered peripheral.
    Connect {
        /// Target peripheral.
        peripheral: PeripheralId,
    },

    /// Tear the current link down.
    Disconnect {
        /// `true` when the user asked for it.
        user_initiated: bool,
    },

    /// Reconnect to the last connected peripheral.
    Reconnect,

    /// Write the unlock command.
    SendUnlock,

    /// Write the battery release command.
    SendBatteryRelease,

    /// Forward a host lifecycle transition to the session.
    Lifecycle(HostLifecycle),
}

impl AppAction {
    /// Whether the action goes through the session bridge.
    pub fn is_session_intent(&self) -> bool {
        !matches!(self, Self::Render | Self::Quit)
    }
}
