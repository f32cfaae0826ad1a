//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use blulok_core::Phase;

use super::{Invariant, InvariantKind, InvariantResult, SystemSnapshot, Violation};

/// Active peripheral must be set exactly in the linked phases.
///
/// Connecting, Connected and Disconnecting have one; every other phase has
/// none. A mismatch means a callback mutated the link without moving the
/// phase, or the other way round.
pub struct ActivePeripheralMatchesPhase;

impl Invariant for ActivePeripheralMatchesPhase {
    fn kind(&self) -> InvariantKind {
        InvariantKind::ActivePeripheralMatchesPhase
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if state.active_peripheral.is_some() != state.phase.has_active_peripheral() {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "phase {:?} with active peripheral {:?}",
                    state.phase, state.active_peripheral
                ),
            });
        }
        Ok(())
    }
}

/// Channel handles are only handed out while connected, and only for the
/// active peripheral.
pub struct ChannelsOnlyWhenConnected;

impl Invariant for ChannelsOnlyWhenConnected {
    fn kind(&self) -> InvariantKind {
        InvariantKind::ChannelsOnlyWhenConnected
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if state.channels.is_empty() {
            return Ok(());
        }
        if state.phase != Phase::Connected {
            return Err(Violation {
                invariant: self.kind(),
                message: format!("{} channel handles in phase {:?}", state.channels.len(), state.phase),
            });
        }
        if let Some(stray) = state
            .channels
            .iter()
            .find(|handle| Some(&handle.peripheral) != state.active_peripheral.as_ref())
        {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "{:?} handle for {} while {:?} is active",
                    stray.channel, stray.peripheral, state.active_peripheral
                ),
            });
        }
        Ok(())
    }
}

/// Directory identifiers are unique and signal strength never increases
/// down the list.
pub struct DirectoryRankedAndUnique;

impl Invariant for DirectoryRankedAndUnique {
    fn kind(&self) -> InvariantKind {
        InvariantKind::DirectoryRankedAndUnique
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for record in &state.directory {
            if !seen.insert(&record.id) {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("duplicate peripheral {}", record.id),
                });
            }
        }
        for window in state.directory.windows(2) {
            if window[1].rssi > window[0].rssi {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!(
                        "{} ({} dBm) ranked above {} ({} dBm)",
                        window[0].id, window[0].rssi, window[1].id, window[1].rssi
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Every displayed frame index exists in its frame set, and an empty set
/// shows frame 0.
pub struct FrameWithinBounds;

impl Invariant for FrameWithinBounds {
    fn kind(&self) -> InvariantKind {
        InvariantKind::FrameWithinBounds
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for animation in &state.animations {
            let in_bounds = if animation.frame_count == 0 {
                animation.frame == 0 && !animation.playing
            } else {
                animation.frame < animation.frame_count
            };
            if !in_bounds {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!(
                        "{:?} shows frame {} of {}",
                        animation.subject, animation.frame, animation.frame_count
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use blulok_app::AnimationView;
    use blulok_core::{Channel, ChannelHandle, Phase, PeripheralId, PeripheralRecord, Subject};

    use super::*;

    fn record(id: &str, rssi: i16) -> PeripheralRecord {
        PeripheralRecord { id: PeripheralId::new(id), display_name: format!("BluLok-{id}"), rssi }
    }

    #[test]
    fn active_peripheral_without_link_phase() {
        let mut state = SystemSnapshot::empty();
        state.active_peripheral = Some(PeripheralId::new("A"));
        assert!(ActivePeripheralMatchesPhase.check(&state).is_err());
        state.phase = Phase::Disconnecting;
        assert!(ActivePeripheralMatchesPhase.check(&state).is_ok());
    }

    #[test]
    fn channels_outside_connected() {
        let mut state = SystemSnapshot::empty();
        state.phase = Phase::Connecting;
        state.active_peripheral = Some(PeripheralId::new("A"));
        state.channels =
            vec![ChannelHandle { peripheral: PeripheralId::new("A"), channel: Channel::Unlock }];
        assert!(ChannelsOnlyWhenConnected.check(&state).is_err());

        state.phase = Phase::Connected;
        assert!(ChannelsOnlyWhenConnected.check(&state).is_ok());

        state.channels[0].peripheral = PeripheralId::new("B");
        assert!(ChannelsOnlyWhenConnected.check(&state).is_err());
    }

    #[test]
    fn directory_order_and_uniqueness() {
        let mut state = SystemSnapshot::empty();
        state.directory = vec![record("A", -50), record("B", -60), record("C", -60)];
        assert!(DirectoryRankedAndUnique.check(&state).is_ok());

        state.directory = vec![record("A", -70), record("B", -60)];
        assert!(DirectoryRankedAndUnique.check(&state).is_err());

        state.directory = vec![record("A", -50), record("A", -60)];
        assert!(DirectoryRankedAndUnique.check(&state).is_err());
    }

    #[test]
    fn frames_in_bounds() {
        let mut state = SystemSnapshot::empty();
        state.animations = vec![AnimationView {
            subject: Subject::Lock,
            frame: 113,
            frame_name: None,
            frame_count: 114,
            playing: false,
        }];
        assert!(FrameWithinBounds.check(&state).is_ok());
        state.animations[0].frame = 114;
        assert!(FrameWithinBounds.check(&state).is_err());
    }
}
