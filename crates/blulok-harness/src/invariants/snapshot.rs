//! Observable state extracted for invariant checks.

use blulok_app::{AnimationView, Snapshot};
use blulok_core::{ChannelHandle, Phase, PeripheralId, PeripheralRecord, SessionView};
use serde::Serialize;

/// The slice of system state the invariants look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemSnapshot {
    /// Session phase.
    pub phase: Phase,
    /// Active peripheral.
    pub active_peripheral: Option<PeripheralId>,
    /// Channel handles handed out.
    pub channels: Vec<ChannelHandle>,
    /// Directory in exposed order.
    pub directory: Vec<PeripheralRecord>,
    /// Mounted animations.
    pub animations: Vec<AnimationView>,
}

impl SystemSnapshot {
    /// Idle system with nothing discovered.
    pub fn empty() -> Self {
        Self {
            phase: Phase::Idle,
            active_peripheral: None,
            channels: Vec::new(),
            directory: Vec::new(),
            animations: Vec::new(),
        }
    }

    /// Extract from a session view. No animations.
    pub fn from_session(view: &SessionView) -> Self {
        Self {
            phase: view.phase,
            active_peripheral: view.active_peripheral.clone(),
            channels: view.channels.clone(),
            directory: view.directory.clone(),
            animations: Vec::new(),
        }
    }

    /// Extract from a published app snapshot.
    pub fn from_app(snapshot: &Snapshot) -> Self {
        Self { animations: snapshot.animations.clone(), ..Self::from_session(&snapshot.session) }
    }
}
