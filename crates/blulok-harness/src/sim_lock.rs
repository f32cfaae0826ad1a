//! Simulated lock accessories and the radio that reaches them.
//!
//! [`SimRadio`] answers every [`RadioCommand`] with the callbacks a real BLE
//! central would deliver, synchronously and deterministically. Faults are
//! switched on per lock through [`Faults`]. Advertisement signal strength
//! jitters with a seeded RNG, so a seed reproduces a run exactly.

use std::collections::{BTreeMap, BTreeSet};

use blulok_core::{
    Advertisement, BatteryReleaseState, Channel, LockState, PeripheralId, RadioCommand,
    RadioEvent, RadioState,
    protocol::{CONTROL_SERVICE_UUID, RELEASE_COMMAND, UNLOCK_COMMAND},
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};
use uuid::Uuid;

/// Error text reported for refused connections.
pub const REFUSED_TEXT: &str = "Peer refused connection";

/// Error text reported for an unexpected link loss.
pub const LINK_LOST_TEXT: &str = "The connection has timed out unexpectedly.";

/// Misbehaviour switches for one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Faults {
    /// Connection attempts fail.
    pub refuse_connect: bool,
    /// Identifier lookups find nothing.
    pub unresolvable: bool,
    /// The control service is absent.
    pub missing_service: bool,
    /// The release channel is absent.
    pub missing_release_channel: bool,
    /// Discovery requests are never answered.
    pub silent_discovery: bool,
    /// Writes are acknowledged with this error.
    pub write_error: Option<String>,
}

/// One simulated lock.
#[derive(Debug, Clone)]
pub struct SimLock {
    id: PeripheralId,
    name: Option<String>,
    rssi: i16,
    lock_state: LockState,
    battery: BatteryReleaseState,
    connected: bool,
    notifying: BTreeSet<Channel>,
    /// Active fault switches.
    pub faults: Faults,
}

impl SimLock {
    /// A healthy lock.
    pub fn new(id: impl Into<PeripheralId>, name: impl Into<String>, rssi: i16) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            rssi,
            lock_state: LockState::Connected,
            battery: BatteryReleaseState::NotReady,
            connected: false,
            notifying: BTreeSet::new(),
            faults: Faults::default(),
        }
    }

    /// A lock that advertises without a name.
    #[must_use]
    pub fn nameless(mut self) -> Self {
        self.name = None;
        self
    }

    /// A lock with the given faults.
    #[must_use]
    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    /// Identifier.
    pub fn id(&self) -> &PeripheralId {
        &self.id
    }

    /// Whether a link is up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Current lock state.
    pub fn lock_state(&self) -> LockState {
        self.lock_state
    }

    /// Current battery release state.
    pub fn battery_state(&self) -> BatteryReleaseState {
        self.battery
    }

    fn notify(&self, channel: Channel) -> Option<RadioEvent> {
        if !self.connected || !self.notifying.contains(&channel) {
            return None;
        }
        let code = match channel {
            Channel::Unlock => self.lock_state.code(),
            Channel::Release => self.battery.code(),
        };
        Some(RadioEvent::Notification {
            peripheral: self.id.clone(),
            characteristic: channel.uuid(),
            value: vec![code],
        })
    }

    fn channels(&self) -> Vec<Uuid> {
        Channel::ALL
            .iter()
            .filter(|&&channel| !(channel == Channel::Release && self.faults.missing_release_channel))
            .map(|channel| channel.uuid())
            .collect()
    }
}

/// Simulated radio with any number of locks in range.
#[derive(Debug, Clone)]
pub struct SimRadio {
    state: RadioState,
    scanning: bool,
    locks: BTreeMap<PeripheralId, SimLock>,
    rng: ChaCha8Rng,
}

impl SimRadio {
    /// A powered-off radio with nothing in range.
    pub fn new(seed: u64) -> Self {
        Self {
            state: RadioState::Unknown,
            scanning: false,
            locks: BTreeMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Put a lock in range.
    #[must_use]
    pub fn with_lock(mut self, lock: SimLock) -> Self {
        self.add_lock(lock);
        self
    }

    /// Put a lock in range.
    pub fn add_lock(&mut self, lock: SimLock) {
        self.locks.insert(lock.id.clone(), lock);
    }

    /// Lock by identifier.
    pub fn lock(&self, id: &PeripheralId) -> Option<&SimLock> {
        self.locks.get(id)
    }

    /// Mutable lock by identifier, for flipping faults.
    pub fn lock_mut(&mut self, id: &PeripheralId) -> Option<&mut SimLock> {
        self.locks.get_mut(id)
    }

    /// Identifiers of every lock in range.
    pub fn lock_ids(&self) -> Vec<PeripheralId> {
        self.locks.keys().cloned().collect()
    }

    /// Whether the radio is reporting advertisements.
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Radio state.
    pub fn state(&self) -> RadioState {
        self.state
    }

    /// Change power or authorisation state.
    ///
    /// Losing power drops every link.
    pub fn set_state(&mut self, state: RadioState) -> Vec<RadioEvent> {
        self.state = state;
        let mut events = vec![RadioEvent::StateChanged(state)];
        if !state.is_usable() {
            self.scanning = false;
            for lock in self.locks.values_mut().filter(|lock| lock.connected) {
                lock.connected = false;
                lock.notifying.clear();
                events.push(RadioEvent::Disconnected {
                    peripheral: lock.id.clone(),
                    error: Some(LINK_LOST_TEXT.to_owned()),
                });
            }
        }
        events
    }

    /// One round of advertisements from every lock, if scanning.
    pub fn advertise(&mut self) -> Vec<RadioEvent> {
        if !self.scanning {
            return Vec::new();
        }
        let mut events = Vec::with_capacity(self.locks.len());
        for lock in self.locks.values() {
            let jitter: i16 = self.rng.gen_range(-3..=3);
            let rssi = lock.rssi.saturating_add(jitter).min(-1);
            events.push(RadioEvent::Advertisement(Advertisement {
                id: lock.id.clone(),
                name: lock.name.clone(),
                rssi,
            }));
        }
        events
    }

    /// Drop a link without anyone asking.
    pub fn drop_link(&mut self, id: &PeripheralId) -> Vec<RadioEvent> {
        let Some(lock) = self.locks.get_mut(id).filter(|lock| lock.connected) else {
            return Vec::new();
        };
        debug!(peripheral = %id, "simulated link loss");
        lock.connected = false;
        lock.notifying.clear();
        vec![RadioEvent::Disconnected {
            peripheral: id.clone(),
            error: Some(LINK_LOST_TEXT.to_owned()),
        }]
    }

    /// Move the lock to a new state, notifying if subscribed.
    pub fn set_lock_state(&mut self, id: &PeripheralId, state: LockState) -> Vec<RadioEvent> {
        let Some(lock) = self.locks.get_mut(id) else {
            return Vec::new();
        };
        lock.lock_state = state;
        lock.notify(Channel::Unlock).into_iter().collect()
    }

    /// Move the battery to a new release state, notifying if subscribed.
    pub fn set_battery_state(&mut self, id: &PeripheralId, state: BatteryReleaseState) -> Vec<RadioEvent> {
        let Some(lock) = self.locks.get_mut(id) else {
            return Vec::new();
        };
        lock.battery = state;
        lock.notify(Channel::Release).into_iter().collect()
    }

    /// The user pulls the latch of an armed lock.
    pub fn pull_latch(&mut self, id: &PeripheralId) -> Vec<RadioEvent> {
        let armed = self
            .locks
            .get(id)
            .is_some_and(|lock| matches!(lock.lock_state, LockState::Armed | LockState::Ready));
        if !armed {
            return Vec::new();
        }
        let mut events = self.set_lock_state(id, LockState::OpenInProgress);
        events.extend(self.set_lock_state(id, LockState::Open));
        events
    }

    /// Answer a command.
    pub fn apply(&mut self, command: RadioCommand) -> Vec<RadioEvent> {
        trace!(?command, "sim radio");
        if !self.state.is_usable() {
            return Vec::new();
        }
        match command {
            RadioCommand::StartScan => {
                self.scanning = true;
                self.advertise()
            },
            RadioCommand::StopScan => {
                self.scanning = false;
                Vec::new()
            },
            RadioCommand::Resolve { peripheral } => match self.locks.get(&peripheral) {
                Some(lock) if !lock.faults.unresolvable => {
                    vec![RadioEvent::Resolved { peripheral, name: lock.name.clone() }]
                },
                _ => vec![RadioEvent::ResolveFailed { peripheral }],
            },
            RadioCommand::Connect { peripheral } => match self.locks.get_mut(&peripheral) {
                Some(lock) if !lock.faults.refuse_connect => {
                    lock.connected = true;
                    vec![RadioEvent::Connected { peripheral, name: lock.name.clone() }]
                },
                _ => vec![RadioEvent::ConnectFailed {
                    peripheral,
                    error: Some(REFUSED_TEXT.to_owned()),
                }],
            },
            RadioCommand::Disconnect { peripheral } => match self.locks.get_mut(&peripheral) {
                Some(lock) => {
                    lock.connected = false;
                    lock.notifying.clear();
                    vec![RadioEvent::Disconnected { peripheral, error: None }]
                },
                None => Vec::new(),
            },
            RadioCommand::DiscoverServices { peripheral, .. } => match self.locks.get(&peripheral) {
                Some(lock) if lock.connected && !lock.faults.silent_discovery => {
                    let services =
                        if lock.faults.missing_service { Vec::new() } else { vec![CONTROL_SERVICE_UUID] };
                    vec![RadioEvent::ServicesDiscovered { peripheral, services }]
                },
                _ => Vec::new(),
            },
            RadioCommand::DiscoverCharacteristics { peripheral, service, .. } => {
                match self.locks.get(&peripheral) {
                    Some(lock) if lock.connected && !lock.faults.silent_discovery => {
                        vec![RadioEvent::CharacteristicsDiscovered {
                            peripheral,
                            service,
                            characteristics: lock.channels(),
                        }]
                    },
                    _ => Vec::new(),
                }
            },
            RadioCommand::SetNotify { peripheral, characteristic, enabled } => {
                let (Some(lock), Some(channel)) =
                    (self.locks.get_mut(&peripheral), Channel::from_uuid(characteristic))
                else {
                    return Vec::new();
                };
                if !lock.connected {
                    return Vec::new();
                }
                if enabled {
                    lock.notifying.insert(channel);
                    // Subscribing reports the current value
                    lock.notify(channel).into_iter().collect()
                } else {
                    lock.notifying.remove(&channel);
                    Vec::new()
                }
            },
            RadioCommand::Write { peripheral, characteristic, value, with_response } => {
                self.write(peripheral, characteristic, &value, with_response)
            },
        }
    }

    fn write(
        &mut self,
        peripheral: PeripheralId,
        characteristic: Uuid,
        value: &[u8],
        with_response: bool,
    ) -> Vec<RadioEvent> {
        let Some(lock) = self.locks.get_mut(&peripheral) else {
            return Vec::new();
        };
        let error = if lock.connected { lock.faults.write_error.clone() } else { Some("Not connected".to_owned()) };

        let mut events = Vec::new();
        if error.is_none() {
            match (Channel::from_uuid(characteristic), value) {
                (Some(Channel::Unlock), [UNLOCK_COMMAND]) => {
                    lock.lock_state = LockState::Armed;
                    events.extend(lock.notify(Channel::Unlock));
                },
                (Some(Channel::Release), [RELEASE_COMMAND]) => {
                    lock.battery = BatteryReleaseState::CanRemove;
                    events.extend(lock.notify(Channel::Release));
                },
                _ => debug!(%peripheral, ?value, "ignored write"),
            }
        }
        if with_response {
            events.insert(0, RadioEvent::WriteConfirmed { peripheral, characteristic, error });
        }
        events
    }
}
