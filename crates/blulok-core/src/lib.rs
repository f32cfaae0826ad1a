//! Core state machines for the BluLok lock client
//!
//! Everything here is pure: no radio, no timers, no rendering. Callers feed
//! events in together with the current time and execute the returned actions,
//! which lets the same code run against a real radio or a simulated one.
//!
//! # Components
//!
//! - [`PeripheralDirectory`]: deduplicated, RSSI-ranked accessory registry
//! - [`ConnectionSession`]: link lifecycle, channel discovery and reconnects
//! - [`decode_lock_state`] / [`decode_battery_state`]: notification decoding
//! - [`FrameSequencer`] / [`LoopSequencer`]: frame animation engines
//! - [`BatteryEjectFlow`]: battery eject steps

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod animation;
pub mod config;
pub mod device_state;
pub mod directory;
pub mod eject;
pub mod error;
pub mod event;
pub mod peripheral;
pub mod protocol;
pub mod session;

pub use animation::{FrameSequencer, LoopSequencer, Subject, battery_target_frame, lock_target_frame};
pub use config::{AnimationConfig, ReconnectPolicy, SessionConfig, SubjectConfig};
pub use device_state::{BatteryReleaseState, LockState, decode_battery_state, decode_lock_state};
pub use directory::PeripheralDirectory;
pub use eject::{BatteryEjectFlow, EjectEffect, EjectStep};
pub use error::{AnimationError, SessionError};
pub use event::{
    HostLifecycle, RadioCommand, RadioEvent, RadioState, SessionAction, SessionCommand, SessionEvent,
    SessionNotice,
};
pub use peripheral::{Advertisement, PeripheralId, PeripheralRecord, SignalQuality};
pub use protocol::Channel;
pub use session::{ChannelHandle, ConnectionSession, LinkStage, Phase, SessionView};
