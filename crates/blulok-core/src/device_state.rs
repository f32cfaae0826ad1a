//! Device state decoding.
//!
//! Notifications carry the state code in their first byte. Decoding never
//! fails: an empty payload simply means "no new state" and the caller keeps
//! whatever it had.

use serde::Serialize;

/// Lock hardware state reported on the unlock channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LockState {
    /// Unrecognised code.
    Unknown,
    /// Lock is awake and connected.
    Connected,
    /// Key engaged, waiting for the latch to be pulled.
    Armed,
    /// Armed and ready to open.
    Ready,
    /// Latch moving.
    OpenInProgress,
    /// Latch open.
    Open,
    /// Door closed, lock re-engaged.
    Close,
}

impl LockState {
    /// Every variant, in code order.
    pub const ALL: [LockState; 7] = [
        LockState::Unknown,
        LockState::Connected,
        LockState::Armed,
        LockState::Ready,
        LockState::OpenInProgress,
        LockState::Open,
        LockState::Close,
    ];

    /// Total mapping from a wire code. Out-of-range codes become `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Connected,
            2 => Self::Armed,
            3 => Self::Ready,
            4 => Self::OpenInProgress,
            5 => Self::Open,
            6 => Self::Close,
            _ => Self::Unknown,
        }
    }

    /// Wire code of this state.
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Connected => 1,
            Self::Armed => 2,
            Self::Ready => 3,
            Self::OpenInProgress => 4,
            Self::Open => 5,
            Self::Close => 6,
        }
    }

    /// Short title.
    pub fn title(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Connected => "Connected",
            Self::Armed => "Armed",
            Self::Ready => "Ready",
            Self::OpenInProgress => "Open in progress",
            Self::Open => "Open",
            Self::Close => "Close",
        }
    }

    /// Instruction shown under the lock animation.
    pub fn guidance(self) -> &'static str {
        match self {
            Self::Unknown => "Waiting for lock…",
            Self::Connected => "Lock is ready. Tap Open to arm.",
            Self::Armed | Self::Ready => "Key engaged. Pull the latch within ~30s.",
            Self::OpenInProgress => "Latch moving. Pull to open.",
            Self::Open => "Latch open. Close the door to relock.",
            Self::Close => "Key removed. Ready for next use.",
        }
    }
}

/// Battery release state reported on the release channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BatteryReleaseState {
    /// Battery is latched.
    NotReady,
    /// Battery can be pulled out.
    CanRemove,
}

impl BatteryReleaseState {
    /// Map a wire code. `None` for codes the accessory does not define.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NotReady),
            1 => Some(Self::CanRemove),
            _ => None,
        }
    }

    /// Wire code of this state.
    pub fn code(self) -> u8 {
        match self {
            Self::NotReady => 0,
            Self::CanRemove => 1,
        }
    }

    /// Short title.
    pub fn title(self) -> &'static str {
        match self {
            Self::NotReady => "Battery not ready",
            Self::CanRemove => "Battery ready",
        }
    }
}

/// Decode an unlock-channel notification. `None` for an empty payload.
pub fn decode_lock_state(payload: &[u8]) -> Option<LockState> {
    payload.first().copied().map(LockState::from_code)
}

/// Decode a release-channel notification.
///
/// `None` for an empty payload or an undefined code; the prior state stands.
pub fn decode_battery_state(payload: &[u8]) -> Option<BatteryReleaseState> {
    payload.first().copied().and_then(BatteryReleaseState::from_code)
}
