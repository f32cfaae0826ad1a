//! Lock accessory protocol contract.
//!
//! The accessory exposes one control service with two channels. Each channel
//! accepts a single command byte (written with acknowledgement) and notifies
//! a single state byte back.

use serde::Serialize;
use uuid::Uuid;

/// Control service exposed by the lock accessory.
pub const CONTROL_SERVICE_UUID: Uuid = Uuid::from_u128(0x374e0100_02a1_4be2_b1ce_4cae91cf080e);

/// Unlock channel: write requests open, notifications carry a lock state code.
pub const UNLOCK_CHANNEL_UUID: Uuid = Uuid::from_u128(0x374e0102_02a1_4be2_b1ce_4cae91cf080e);

/// Release channel: write requests battery release, notifications carry a
/// battery release code.
pub const RELEASE_CHANNEL_UUID: Uuid = Uuid::from_u128(0x374e0103_02a1_4be2_b1ce_4cae91cf080e);

/// Payload written to the unlock channel.
pub const UNLOCK_COMMAND: u8 = 0x01;

/// Payload written to the release channel.
pub const RELEASE_COMMAND: u8 = 0x00;

/// Substring every accessory advertisement name must contain.
pub const ACCESSORY_NAME_TAG: &str = "BluLok";

/// Name the platform reports for peripherals that advertise no name.
pub const PLACEHOLDER_NAME: &str = "Unknown Device";

/// One of the two channels inside the control service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Channel {
    /// Lock command and lock state notifications.
    Unlock,
    /// Battery release command and battery state notifications.
    Release,
}

impl Channel {
    /// Both channels, in discovery order.
    pub const ALL: [Channel; 2] = [Channel::Unlock, Channel::Release];

    /// Characteristic UUID of this channel.
    pub fn uuid(self) -> Uuid {
        match self {
            Self::Unlock => UNLOCK_CHANNEL_UUID,
            Self::Release => RELEASE_CHANNEL_UUID,
        }
    }

    /// Map a characteristic UUID back onto a channel. `None` for foreign UUIDs.
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid() == uuid)
    }

    /// Command byte this channel accepts.
    pub fn command(self) -> u8 {
        match self {
            Self::Unlock => UNLOCK_COMMAND,
            Self::Release => RELEASE_COMMAND,
        }
    }
}
