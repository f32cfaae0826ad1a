//! Fuzz target for the connection session
//!
//! Feeds arbitrary interleavings of commands, platform callbacks, lifecycle
//! signals and time into one `ConnectionSession`.
//!
//! # Strategy
//!
//! - Small identifier pool: callbacks often name the active peripheral, so
//!   stale and out-of-order callbacks are exercised
//! - Known and random UUIDs for services, channels and notifications
//! - Arbitrary payloads on both channels
//! - Time moves forward in arbitrary steps, so timeouts and backoff fire
//!
//! # Invariants
//!
//! - Active peripheral present iff the phase has one
//! - Channel handles exist only while connected, for the active peripheral
//! - Directory identifiers unique, ranked by non-increasing signal
//! - NEVER panic on any input

#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use blulok_core::{
    Advertisement, Channel, ConnectionSession, HostLifecycle, PeripheralId, RadioEvent, RadioState,
    ReconnectPolicy, SessionCommand, SessionConfig, SessionEvent, protocol::CONTROL_SERVICE_UUID,
};
use blulok_harness::{InvariantRegistry, SystemSnapshot, invariants::describe};
use libfuzzer_sys::fuzz_target;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Peer {
    A,
    B,
    C,
}

impl Peer {
    fn id(self) -> PeripheralId {
        PeripheralId::new(match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        })
    }
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Id {
    Control,
    Unlock,
    Release,
    Other(u128),
}

impl Id {
    fn uuid(self) -> Uuid {
        match self {
            Self::Control => CONTROL_SERVICE_UUID,
            Self::Unlock => Channel::Unlock.uuid(),
            Self::Release => Channel::Release.uuid(),
            Self::Other(raw) => Uuid::from_u128(raw),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum Input {
    Scan,
    StopScan,
    Connect(Peer),
    Disconnect { user_initiated: bool },
    Reconnect,
    Unlock,
    Release,
    Lifecycle(bool),
    Radio(bool),
    Advertise { peer: Peer, name: Option<String>, rssi: i16 },
    Resolved(Peer),
    ResolveFailed(Peer),
    Connected(Peer),
    ConnectFailed(Peer),
    Disconnected { peer: Peer, error: bool },
    Services { peer: Peer, services: Vec<Id> },
    Characteristics { peer: Peer, service: Id, characteristics: Vec<Id> },
    DiscoveryFailed(Peer),
    Notify { peer: Peer, characteristic: Id, value: Vec<u8> },
    WriteConfirmed { peer: Peer, characteristic: Id, failed: bool },
    Elapse(u16),
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    discovery_timeout: Option<u8>,
    max_attempts: Option<u8>,
    backoff_secs: u8,
    inputs: Vec<Input>,
}

fn event(input: Input) -> Option<SessionEvent> {
    let radio = |event| Some(SessionEvent::Radio(event));
    match input {
        Input::Scan => Some(SessionEvent::Command(SessionCommand::StartScan)),
        Input::StopScan => Some(SessionEvent::Command(SessionCommand::StopScan)),
        Input::Connect(peer) => Some(SessionEvent::Command(SessionCommand::Connect(peer.id()))),
        Input::Disconnect { user_initiated } => {
            Some(SessionEvent::Command(SessionCommand::Disconnect { user_initiated }))
        },
        Input::Reconnect => Some(SessionEvent::Command(SessionCommand::Reconnect)),
        Input::Unlock => Some(SessionEvent::Command(SessionCommand::SendUnlock)),
        Input::Release => Some(SessionEvent::Command(SessionCommand::SendBatteryRelease)),
        Input::Lifecycle(foreground) => Some(SessionEvent::Lifecycle(if foreground {
            HostLifecycle::Foreground
        } else {
            HostLifecycle::Background
        })),
        Input::Radio(on) => {
            radio(RadioEvent::StateChanged(if on { RadioState::PoweredOn } else { RadioState::PoweredOff }))
        },
        Input::Advertise { peer, name, rssi } => {
            radio(RadioEvent::Advertisement(Advertisement { id: peer.id(), name, rssi }))
        },
        Input::Resolved(peer) => radio(RadioEvent::Resolved { peripheral: peer.id(), name: None }),
        Input::ResolveFailed(peer) => radio(RadioEvent::ResolveFailed { peripheral: peer.id() }),
        Input::Connected(peer) => {
            radio(RadioEvent::Connected { peripheral: peer.id(), name: Some("BluLok-Fuzz".into()) })
        },
        Input::ConnectFailed(peer) => radio(RadioEvent::ConnectFailed { peripheral: peer.id(), error: None }),
        Input::Disconnected { peer, error } => radio(RadioEvent::Disconnected {
            peripheral: peer.id(),
            error: error.then(|| "link lost".to_owned()),
        }),
        Input::Services { peer, services } => radio(RadioEvent::ServicesDiscovered {
            peripheral: peer.id(),
            services: services.into_iter().map(Id::uuid).collect(),
        }),
        Input::Characteristics { peer, service, characteristics } => {
            radio(RadioEvent::CharacteristicsDiscovered {
                peripheral: peer.id(),
                service: service.uuid(),
                characteristics: characteristics.into_iter().map(Id::uuid).collect(),
            })
        },
        Input::DiscoveryFailed(peer) => {
            radio(RadioEvent::DiscoveryFailed { peripheral: peer.id(), error: "gatt error".into() })
        },
        Input::Notify { peer, characteristic, value } => radio(RadioEvent::Notification {
            peripheral: peer.id(),
            characteristic: characteristic.uuid(),
            value,
        }),
        Input::WriteConfirmed { peer, characteristic, failed } => radio(RadioEvent::WriteConfirmed {
            peripheral: peer.id(),
            characteristic: characteristic.uuid(),
            error: failed.then(|| "write failed".to_owned()),
        }),
        Input::Elapse(_) => None,
    }
}

fuzz_target!(|scenario: Scenario| {
    let config = SessionConfig {
        discovery_timeout: scenario.discovery_timeout.map(|secs| Duration::from_secs(u64::from(secs))),
        reconnect: ReconnectPolicy {
            max_attempts: scenario.max_attempts.map(u32::from),
            backoff: Duration::from_secs(u64::from(scenario.backoff_secs)),
        },
        ..SessionConfig::default()
    };
    let mut session = ConnectionSession::new(config);
    let registry = InvariantRegistry::standard();
    let mut now = Instant::now();

    for input in scenario.inputs {
        if let Input::Elapse(millis) = input {
            now += Duration::from_millis(u64::from(millis));
            let _ = session.handle(SessionEvent::Tick, now);
        } else if let Some(event) = event(input) {
            // Rejected commands are expected; only the resulting state matters
            let _ = session.handle(event, now);
        }

        if let Err(violations) = registry.check_all(&SystemSnapshot::from_session(&session.view())) {
            panic!("invariant violated: {}", describe(&violations));
        }
    }
});
