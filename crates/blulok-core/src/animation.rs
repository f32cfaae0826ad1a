//! Frame sequencers.
//!
//! Two engines drive the animated subjects:
//!
//! - [`FrameSequencer`] seeks a target frame derived from device state. It
//!   steps forward one frame per tick and never animates backwards: a target
//!   at or below the current frame snaps immediately.
//! - [`LoopSequencer`] cycles through every frame forever with no target.
//!
//! Neither owns a timer. The caller asks for [`FrameSequencer::tick_interval`]
//! and calls `tick` on its own schedule, which keeps both engines
//! deterministic under test.
//!
//! # Invariants
//!
//! - `current <= frames.len() - 1` whenever frames are present, and `current ==
//!   0` when they are not.
//! - `tick` never decreases `current`.
//! - `playing` implies `current < target`.

use std::{num::NonZeroU32, time::Duration};

use serde::Serialize;

use crate::{device_state::LockState, eject::EjectStep, error::AnimationError};

/// Number of frames in the lock asset set.
pub const LOCK_FRAME_COUNT: usize = 114;

/// Number of frames in the incomplete-lock asset set.
pub const INCOMPLETE_LOCK_FRAME_COUNT: usize = 30;

/// Lock frame shown before any state has been reported.
pub const LOCK_REST_FRAME: usize = 30;

/// Animated subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Subject {
    /// Lock body, driven by [`LockState`].
    Lock,
    /// Battery compartment, driven by [`EjectStep`].
    Battery,
    /// Free-running loop shown while the lock has not reported yet.
    IncompleteLock,
}

impl Subject {
    /// All subjects.
    pub const ALL: [Subject; 3] = [Subject::Lock, Subject::Battery, Subject::IncompleteLock];

    /// Asset set name.
    pub fn asset_name(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Battery => "battery",
            Self::IncompleteLock => "incomplete-lock",
        }
    }
}

/// Lock target frame. `None` means no state has been reported yet.
pub fn lock_target_frame(state: Option<LockState>) -> usize {
    match state {
        Some(LockState::Armed | LockState::Ready) => 45,
        Some(LockState::OpenInProgress) => 65,
        Some(LockState::Open) => 75,
        Some(LockState::Close) => 113,
        Some(LockState::Unknown | LockState::Connected) | None => LOCK_REST_FRAME,
    }
}

/// Battery target frame for an eject flow step.
pub fn battery_target_frame(step: EjectStep) -> usize {
    match step {
        EjectStep::Idle => 0,
        EjectStep::Instruction | EjectStep::Armed => 77,
        EjectStep::Sent => 122,
        EjectStep::Ejected => 162,
    }
}

fn interval_for(frame_rate: NonZeroU32) -> Duration {
    Duration::from_secs(1) / frame_rate.get()
}

/// Target-seeking frame sequencer.
#[derive(Debug, Clone)]
pub struct FrameSequencer<F> {
    frames: Vec<F>,
    current: usize,
    target: usize,
    playing: bool,
    frame_rate: NonZeroU32,
}

impl<F> FrameSequencer<F> {
    /// Create a sequencer resting on `initial_frame` (clamped).
    ///
    /// # Errors
    ///
    /// - `AnimationError::ZeroFrameRate` if `frame_rate` is zero
    pub fn new(frames: Vec<F>, initial_frame: usize, frame_rate: u32) -> Result<Self, AnimationError> {
        let frame_rate = NonZeroU32::new(frame_rate).ok_or(AnimationError::ZeroFrameRate)?;
        let mut sequencer = Self { frames, current: 0, target: 0, playing: false, frame_rate };
        let initial = sequencer.clamp(initial_frame);
        sequencer.current = initial;
        sequencer.target = initial;
        Ok(sequencer)
    }

    fn clamp(&self, frame: usize) -> usize {
        frame.min(self.frames.len().saturating_sub(1))
    }

    /// Seek toward a new target.
    ///
    /// Targets above the current frame start playback. Anything else snaps
    /// the current frame to the target and stops.
    pub fn retarget(&mut self, raw_target: usize) {
        let target = self.clamp(raw_target);
        self.target = target;
        if target > self.current {
            self.playing = true;
        } else {
            self.current = target;
            self.playing = false;
        }
    }

    /// Advance by one frame. Returns `true` if the displayed frame changed.
    pub fn tick(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        let advanced = self.current < self.target;
        if advanced {
            self.current += 1;
        }
        if self.current >= self.target {
            self.playing = false;
        }
        advanced
    }

    /// Index of the displayed frame.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Clamped target index.
    pub fn target_index(&self) -> usize {
        self.target
    }

    /// Whether ticks still advance the frame.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Displayed frame. `None` for an empty frame set.
    pub fn current_frame(&self) -> Option<&F> {
        self.frames.get(self.current)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the frame set is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time between ticks.
    pub fn tick_interval(&self) -> Duration {
        interval_for(self.frame_rate)
    }
}

/// Free-running loop sequencer.
#[derive(Debug, Clone)]
pub struct LoopSequencer<F> {
    frames: Vec<F>,
    current: usize,
    frame_rate: NonZeroU32,
}

impl<F> LoopSequencer<F> {
    /// Create a loop starting at frame 0.
    ///
    /// # Errors
    ///
    /// - `AnimationError::ZeroFrameRate` if `frame_rate` is zero
    pub fn new(frames: Vec<F>, frame_rate: u32) -> Result<Self, AnimationError> {
        let frame_rate = NonZeroU32::new(frame_rate).ok_or(AnimationError::ZeroFrameRate)?;
        Ok(Self { frames, current: 0, frame_rate })
    }

    /// Advance by one frame, wrapping after the last. Returns `true` if the
    /// displayed frame changed.
    pub fn tick(&mut self) -> bool {
        if self.frames.len() < 2 {
            return false;
        }
        self.current = (self.current + 1) % self.frames.len();
        true
    }

    /// Index of the displayed frame.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Displayed frame. `None` for an empty frame set.
    pub fn current_frame(&self) -> Option<&F> {
        self.frames.get(self.current)
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the frame set is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time between ticks.
    pub fn tick_interval(&self) -> Duration {
        interval_for(self.frame_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn zero_frame_rate_is_rejected() {
        assert_eq!(FrameSequencer::new(frames(3), 0, 0).err(), Some(AnimationError::ZeroFrameRate));
        assert!(LoopSequencer::new(frames(3), 0).is_err());
    }

    #[test]
    fn close_on_empty_frames_clamps_to_zero() {
        let mut seq = FrameSequencer::<usize>::new(Vec::new(), LOCK_REST_FRAME, 50).unwrap();
        seq.retarget(lock_target_frame(Some(LockState::Close)));
        assert_eq!(seq.current_index(), 0);
        assert_eq!(seq.target_index(), 0);
        assert!(!seq.is_playing());
        assert!(!seq.tick());
        assert!(seq.current_frame().is_none());
    }

    #[test]
    fn steps_one_frame_per_tick_to_target() {
        let mut seq = FrameSequencer::new(frames(LOCK_FRAME_COUNT), LOCK_REST_FRAME, 50).unwrap();
        seq.retarget(lock_target_frame(Some(LockState::Armed)));
        assert!(seq.is_playing());

        let mut ticks = 0;
        while seq.tick() {
            ticks += 1;
        }
        assert_eq!(ticks, 15);
        assert_eq!(seq.current_index(), 45);
        assert!(!seq.is_playing());
    }

    #[test]
    fn lower_target_snaps_without_animating() {
        let mut seq = FrameSequencer::new(frames(LOCK_FRAME_COUNT), 75, 50).unwrap();
        seq.retarget(45);
        assert_eq!(seq.current_index(), 45);
        assert!(!seq.is_playing());
    }

    #[test]
    fn target_past_end_stops_on_last_frame() {
        let mut seq = FrameSequencer::new(frames(113), 100, 40).unwrap();
        seq.retarget(battery_target_frame(EjectStep::Ejected));
        assert_eq!(seq.target_index(), 112);
        while seq.tick() {}
        assert_eq!(seq.current_index(), 112);
    }

    #[test]
    fn retarget_mid_animation_keeps_progress() {
        let mut seq = FrameSequencer::new(frames(LOCK_FRAME_COUNT), 30, 50).unwrap();
        seq.retarget(75);
        for _ in 0..10 {
            seq.tick();
        }
        assert_eq!(seq.current_index(), 40);
        seq.retarget(65);
        assert!(seq.is_playing());
        assert_eq!(seq.current_index(), 40);
    }

    #[test]
    fn loop_shows_last_frame_then_wraps() {
        let mut seq = LoopSequencer::new(frames(INCOMPLETE_LOCK_FRAME_COUNT), 25).unwrap();
        for _ in 0..29 {
            seq.tick();
        }
        assert_eq!(seq.current_index(), 29);
        seq.tick();
        assert_eq!(seq.current_index(), 0);
    }

    #[test]
    fn tick_interval_follows_rate() {
        let seq = FrameSequencer::new(frames(1), 0, 50).unwrap();
        assert_eq!(seq.tick_interval(), Duration::from_millis(20));
        let seq = LoopSequencer::new(frames(1), 25).unwrap();
        assert_eq!(seq.tick_interval(), Duration::from_millis(40));
    }

    #[test]
    fn lock_table() {
        assert_eq!(lock_target_frame(None), 30);
        assert_eq!(lock_target_frame(Some(LockState::Connected)), 30);
        assert_eq!(lock_target_frame(Some(LockState::Ready)), 45);
        assert_eq!(lock_target_frame(Some(LockState::OpenInProgress)), 65);
        assert_eq!(lock_target_frame(Some(LockState::Open)), 75);
        assert_eq!(lock_target_frame(Some(LockState::Close)), 113);
    }
}
