//! Error types for the BluLok client core.
//!
//! None of these are fatal. The session records the error as visible text and
//! stays in a well-defined phase; callers decide whether to surface it.

use std::time::Duration;

use thiserror::Error;

use crate::{event::RadioState, peripheral::PeripheralId, protocol::Channel, session::Phase};

/// Errors produced by the connection session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Radio is off, unauthorised or missing
    #[error("radio unavailable: {state:?}")]
    RadioUnavailable {
        /// Radio state at the time of the request
        state: RadioState,
    },

    /// Platform reported a failed connect
    #[error("failed to connect to {peripheral}: {reason}")]
    ConnectFailed {
        /// Peripheral that failed
        peripheral: PeripheralId,
        /// Platform error text
        reason: String,
    },

    /// Command attempted before the channel was discovered
    #[error("{channel:?} channel not ready in phase {phase:?}")]
    ChannelNotReady {
        /// Channel the command targets
        channel: Channel,
        /// Session phase at the time of the request
        phase: Phase,
    },

    /// Write acknowledgement reported an error
    #[error("write to {channel:?} failed: {reason}")]
    WriteFailed {
        /// Channel written
        channel: Channel,
        /// Platform error text
        reason: String,
    },

    /// Link dropped without the user asking
    #[error("{peripheral} disconnected unexpectedly")]
    UnsolicitedDisconnect {
        /// Peripheral that dropped
        peripheral: PeripheralId,
        /// Platform error text, if any
        reason: Option<String>,
    },

    /// Operation not valid in the current phase
    #[error("invalid state transition: cannot {operation} from {phase:?}")]
    InvalidState {
        /// Phase when the error occurred
        phase: Phase,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Services or channels were not found in time
    #[error("service discovery on {peripheral} timed out after {elapsed:?}")]
    DiscoveryTimeout {
        /// Peripheral being discovered
        peripheral: PeripheralId,
        /// How long we waited
        elapsed: Duration,
    },

    /// Auto-reconnect gave up
    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted {
        /// Attempts made
        attempts: u32,
    },
}

impl SessionError {
    /// Returns true if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::UnsolicitedDisconnect { .. }
                | Self::DiscoveryTimeout { .. }
                | Self::WriteFailed { .. }
        )
    }
}

/// Errors produced when building a sequencer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationError {
    /// Frame rate must be positive
    #[error("frame rate must be at least 1 frame per second")]
    ZeroFrameRate,
}
