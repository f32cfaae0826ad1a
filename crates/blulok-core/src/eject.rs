//! Battery eject flow.
//!
//! ```text
//! ┌──────┐ tap ┌─────────────┐ tap (send release) ┌───────┐ CanRemove ┌──────┐ link lost ┌─────────┐
//! │ Idle │────>│ Instruction │───────────────────>│ Armed │──────────>│ Sent │──────────>│ Ejected │
//! └──────┘     └─────────────┘                    └───────┘           └──────┘           └─────────┘
//! ```
//!
//! `NotReady` while connected and any reconnection return the flow to `Idle`.
//! The flow never talks to the radio itself; a tap that should send the
//! release command returns [`EjectEffect::SendRelease`] and the caller issues
//! it.

use serde::Serialize;

use crate::device_state::BatteryReleaseState;

/// Step of the battery eject flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum EjectStep {
    /// No flow started.
    #[default]
    Idle,
    /// Instructions shown, waiting for the user to arm.
    Instruction,
    /// Release command sent, waiting for the accessory to report `CanRemove`.
    Armed,
    /// Accessory reported the battery can be removed.
    Sent,
    /// Link dropped after the release, the battery is out.
    Ejected,
}

impl EjectStep {
    /// Label of the eject button.
    pub fn button_title(self) -> &'static str {
        match self {
            Self::Idle => "Battery Eject",
            Self::Instruction | Self::Armed => "Arm Eject",
            Self::Sent => "Ejecting…",
            Self::Ejected => "Ejected",
        }
    }

    /// Instruction shown under the battery animation.
    pub fn guidance(self) -> &'static str {
        match self {
            Self::Idle => "Tap Battery Eject to start.",
            Self::Instruction | Self::Armed => "Firmly depress battery, then press Arm Eject button.",
            Self::Sent => "Quickly release battery to eject.",
            Self::Ejected => "Battery ejected.",
        }
    }

    /// Whether the eject button accepts taps.
    pub fn accepts_tap(self) -> bool {
        matches!(self, Self::Idle | Self::Instruction | Self::Armed)
    }
}

/// Side effect requested by the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EjectEffect {
    /// Write the release command.
    SendRelease,
}

/// Battery eject flow state machine.
#[derive(Debug, Clone, Default)]
pub struct BatteryEjectFlow {
    step: EjectStep,
}

impl BatteryEjectFlow {
    /// Flow in `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current step.
    pub fn step(&self) -> EjectStep {
        self.step
    }

    /// User tapped the eject button.
    pub fn tap(&mut self) -> Option<EjectEffect> {
        match self.step {
            EjectStep::Idle => {
                self.step = EjectStep::Instruction;
                None
            },
            EjectStep::Instruction | EjectStep::Armed => {
                self.step = EjectStep::Armed;
                Some(EjectEffect::SendRelease)
            },
            EjectStep::Sent | EjectStep::Ejected => None,
        }
    }

    /// Accessory reported a battery release state.
    pub fn on_battery_state(&mut self, state: BatteryReleaseState, connected: bool) {
        match state {
            BatteryReleaseState::CanRemove => {
                if matches!(self.step, EjectStep::Instruction | EjectStep::Armed) {
                    self.step = EjectStep::Sent;
                }
            },
            BatteryReleaseState::NotReady => {
                if connected {
                    self.step = EjectStep::Idle;
                }
            },
        }
    }

    /// Link to the accessory dropped.
    pub fn on_connection_lost(&mut self) {
        if self.step == EjectStep::Sent {
            self.step = EjectStep::Ejected;
        }
    }

    /// Link to the accessory was re-established.
    pub fn on_reconnected(&mut self) {
        self.step = EjectStep::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_eject_sequence() {
        let mut flow = BatteryEjectFlow::new();
        flow.on_battery_state(BatteryReleaseState::NotReady, true);
        assert_eq!(flow.step(), EjectStep::Idle);

        assert_eq!(flow.tap(), None);
        assert_eq!(flow.step(), EjectStep::Instruction);

        assert_eq!(flow.tap(), Some(EjectEffect::SendRelease));
        flow.on_battery_state(BatteryReleaseState::CanRemove, true);
        assert_eq!(flow.step(), EjectStep::Sent);

        // Sent ignores taps
        assert_eq!(flow.tap(), None);

        flow.on_connection_lost();
        assert_eq!(flow.step(), EjectStep::Ejected);

        flow.on_reconnected();
        assert_eq!(flow.step(), EjectStep::Idle);
    }

    #[test]
    fn arming_again_resends() {
        let mut flow = BatteryEjectFlow::new();
        flow.tap();
        assert_eq!(flow.tap(), Some(EjectEffect::SendRelease));
        assert_eq!(flow.tap(), Some(EjectEffect::SendRelease));
        assert_eq!(flow.step(), EjectStep::Armed);
    }

    #[test]
    fn not_ready_resets_only_while_connected() {
        let mut flow = BatteryEjectFlow::new();
        flow.tap();
        flow.on_battery_state(BatteryReleaseState::NotReady, false);
        assert_eq!(flow.step(), EjectStep::Instruction);
        flow.on_battery_state(BatteryReleaseState::NotReady, true);
        assert_eq!(flow.step(), EjectStep::Idle);
    }

    #[test]
    fn can_remove_before_instruction_is_ignored() {
        let mut flow = BatteryEjectFlow::new();
        flow.on_battery_state(BatteryReleaseState::CanRemove, true);
        assert_eq!(flow.step(), EjectStep::Idle);
    }

    #[test]
    fn connection_loss_outside_sent_keeps_step() {
        let mut flow = BatteryEjectFlow::new();
        flow.tap();
        flow.on_connection_lost();
        assert_eq!(flow.step(), EjectStep::Instruction);
    }
}
