//! Mounted animations and their tick sources.
//!
//! An [`Animator`] pairs one sequencer with the [`Interval`] that paces it.
//! Mounting a subject creates the animator; unmounting drops it, and the
//! interval goes with it, so no tick can outlive the subject it drives.
//!
//! [`Animators`] is polled from the runtime's `select!` loop alongside the
//! mailbox, which keeps frame ticks on the same task as every other state
//! change.

use std::{collections::BTreeMap, future::poll_fn, task::Poll};

use blulok_core::{AnimationConfig, AnimationError, FrameSequencer, LoopSequencer, Subject};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::{FrameHandle, FrameLoader, state::AnimationView};

#[derive(Debug)]
enum Engine {
    Seek(FrameSequencer<FrameHandle>),
    Loop(LoopSequencer<FrameHandle>),
}

/// One mounted animation.
#[derive(Debug)]
pub struct Animator {
    subject: Subject,
    engine: Engine,
    interval: Interval,
}

impl Animator {
    /// Mount a subject and seek towards `target`.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `AnimationError::ZeroFrameRate` if the subject's frame rate is zero
    pub fn mount(
        subject: Subject,
        frames: Vec<FrameHandle>,
        config: &AnimationConfig,
        target: usize,
    ) -> Result<Self, AnimationError> {
        let settings = config.for_subject(subject);
        let engine = match subject {
            Subject::Lock | Subject::Battery => {
                let mut sequencer = FrameSequencer::new(frames, settings.initial_frame, settings.frame_rate)?;
                sequencer.retarget(target);
                Engine::Seek(sequencer)
            },
            Subject::IncompleteLock => Engine::Loop(LoopSequencer::new(frames, settings.frame_rate)?),
        };
        let period = match &engine {
            Engine::Seek(sequencer) => sequencer.tick_interval(),
            Engine::Loop(sequencer) => sequencer.tick_interval(),
        };
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(subject = subject.asset_name(), target, ?period, "animation mounted");
        Ok(Self { subject, engine, interval })
    }

    /// Seek towards a new target.
    ///
    /// Loops have no target and ignore this. Returns `true` if the displayed
    /// frame or the playing flag changed.
    pub fn retarget(&mut self, target: usize) -> bool {
        let Engine::Seek(sequencer) = &mut self.engine else {
            return false;
        };
        let before = (sequencer.current_index(), sequencer.is_playing());
        sequencer.retarget(target);
        let after = (sequencer.current_index(), sequencer.is_playing());
        if !before.1 && after.1 {
            // Playback starts one full period from now
            self.interval.reset();
        }
        trace!(subject = self.subject.asset_name(), target, ?before, ?after, "retarget");
        before != after
    }

    /// Whether the interval should be polled.
    pub fn is_active(&self) -> bool {
        match &self.engine {
            Engine::Seek(sequencer) => sequencer.is_playing(),
            Engine::Loop(sequencer) => sequencer.len() > 1,
        }
    }

    /// Advance one frame. Returns `true` if the displayed frame changed.
    pub fn advance(&mut self) -> bool {
        match &mut self.engine {
            Engine::Seek(sequencer) => sequencer.tick(),
            Engine::Loop(sequencer) => sequencer.tick(),
        }
    }

    /// Animated subject.
    pub fn subject(&self) -> Subject {
        self.subject
    }

    /// Index of the displayed frame.
    pub fn current_index(&self) -> usize {
        match &self.engine {
            Engine::Seek(sequencer) => sequencer.current_index(),
            Engine::Loop(sequencer) => sequencer.current_index(),
        }
    }

    /// State for the snapshot.
    pub fn view(&self) -> AnimationView {
        let (frame, frame_name, frame_count, playing) = match &self.engine {
            Engine::Seek(sequencer) => (
                sequencer.current_index(),
                sequencer.current_frame(),
                sequencer.len(),
                sequencer.is_playing(),
            ),
            Engine::Loop(sequencer) => (
                sequencer.current_index(),
                sequencer.current_frame(),
                sequencer.len(),
                sequencer.len() > 1,
            ),
        };
        AnimationView {
            subject: self.subject,
            frame,
            frame_name: frame_name.map(|handle| handle.name().to_owned()),
            frame_count,
            playing,
        }
    }
}

/// Every mounted animation.
#[derive(Debug, Default)]
pub struct Animators {
    mounted: BTreeMap<Subject, Animator>,
}

impl Animators {
    /// Nothing mounted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount, retarget and unmount so that exactly the visible subjects with
    /// loaded frames are animating.
    ///
    /// Returns `true` if anything on screen changed.
    ///
    /// # Errors
    ///
    /// - `AnimationError::ZeroFrameRate` if a subject's frame rate is zero
    pub fn reconcile(
        &mut self,
        visible: &[(Subject, usize)],
        loader: &FrameLoader,
        config: &AnimationConfig,
    ) -> Result<bool, AnimationError> {
        let before = self.mounted.len();
        self.mounted.retain(|subject, _| visible.iter().any(|(shown, _)| shown == subject));
        let mut changed = self.mounted.len() != before;
        if changed {
            debug!(remaining = self.mounted.len(), "animations unmounted");
        }

        for &(subject, target) in visible {
            if let Some(animator) = self.mounted.get_mut(&subject) {
                changed |= animator.retarget(target);
                continue;
            }
            let Some(frames) = loader.frames(subject) else {
                continue;
            };
            let animator = Animator::mount(subject, frames.to_vec(), config, target)?;
            self.mounted.insert(subject, animator);
            changed = true;
        }
        Ok(changed)
    }

    /// Wait for the next due frame, advance it and return its subject.
    ///
    /// Never resolves while nothing is playing. Cancel safe.
    pub async fn tick(&mut self) -> Subject {
        poll_fn(|cx| {
            for (subject, animator) in &mut self.mounted {
                if animator.is_active() && animator.interval.poll_tick(cx).is_ready() {
                    animator.advance();
                    return Poll::Ready(*subject);
                }
            }
            Poll::Pending
        })
        .await
    }

    /// Mounted animator for a subject.
    pub fn get(&self, subject: Subject) -> Option<&Animator> {
        self.mounted.get(&subject)
    }

    /// Whether a subject is mounted.
    pub fn is_mounted(&self, subject: Subject) -> bool {
        self.mounted.contains_key(&subject)
    }

    /// Number of mounted animations.
    pub fn len(&self) -> usize {
        self.mounted.len()
    }

    /// Check if nothing is mounted.
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }

    /// Drop every animation.
    pub fn clear(&mut self) {
        self.mounted.clear();
    }

    /// State of every mounted animation, in subject order.
    pub fn views(&self) -> Vec<AnimationView> {
        self.mounted.values().map(Animator::view).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{AssetSource, AssetUpdate};

    use super::*;

    fn loader_with(subjects: &[(Subject, usize)]) -> FrameLoader {
        let mut loader = FrameLoader::new();
        for &(subject, count) in subjects {
            loader.request(subject);
            loader.apply(AssetUpdate::Loaded {
                subject,
                source: AssetSource::Bundle,
                frames: (0..count).map(|i| FrameHandle::new(format!("{i:04}"))).collect(),
            });
        }
        loader
    }

    #[tokio::test(start_paused = true)]
    async fn lock_plays_to_target_then_idles() {
        let loader = loader_with(&[(Subject::Lock, 114)]);
        let config = AnimationConfig::default();
        let mut animators = Animators::new();

        assert!(animators.reconcile(&[(Subject::Lock, 45)], &loader, &config).unwrap());
        let start = Instant::now();
        for _ in 0..15 {
            assert_eq!(animators.tick().await, Subject::Lock);
        }
        // 50 fps
        assert_eq!(start.elapsed(), Duration::from_millis(300));

        let view = animators.get(Subject::Lock).unwrap().view();
        assert_eq!(view.frame, 45);
        assert!(!view.playing);
        assert_eq!(view.frame_name.as_deref(), Some("0045"));

        let idle = time::timeout(Duration::from_secs(5), animators.tick()).await;
        assert!(idle.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn lower_target_snaps_without_ticking() {
        let loader = loader_with(&[(Subject::Lock, 114)]);
        let config = AnimationConfig::default();
        let mut animators = Animators::new();
        animators.reconcile(&[(Subject::Lock, 113)], &loader, &config).unwrap();
        animators.tick().await;

        assert!(animators.reconcile(&[(Subject::Lock, 30)], &loader, &config).unwrap());
        let view = animators.get(Subject::Lock).unwrap().view();
        assert_eq!(view.frame, 30);
        assert!(!view.playing);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_wraps_forever() {
        let loader = loader_with(&[(Subject::IncompleteLock, 3)]);
        let config = AnimationConfig::default();
        let mut animators = Animators::new();
        animators.reconcile(&[(Subject::IncompleteLock, 0)], &loader, &config).unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            animators.tick().await;
            seen.push(animators.get(Subject::IncompleteLock).unwrap().current_index());
        }
        assert_eq!(seen, vec![1, 2, 0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_drops_tick_source() {
        let loader = loader_with(&[(Subject::Lock, 114), (Subject::IncompleteLock, 30)]);
        let config = AnimationConfig::default();
        let mut animators = Animators::new();
        animators
            .reconcile(&[(Subject::Lock, 113), (Subject::IncompleteLock, 0)], &loader, &config)
            .unwrap();
        assert_eq!(animators.len(), 2);

        assert!(animators.reconcile(&[], &loader, &config).unwrap());
        assert!(animators.is_empty());
        let idle = time::timeout(Duration::from_secs(5), animators.tick()).await;
        assert!(idle.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn visible_without_frames_waits_for_loader() {
        let loader = FrameLoader::new();
        let config = AnimationConfig::default();
        let mut animators = Animators::new();
        assert!(!animators.reconcile(&[(Subject::Battery, 77)], &loader, &config).unwrap());
        assert!(!animators.is_mounted(Subject::Battery));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_frame_rate_is_rejected() {
        let loader = loader_with(&[(Subject::Battery, 163)]);
        let mut config = AnimationConfig::default();
        config.battery.frame_rate = 0;
        let mut animators = Animators::new();
        let result = animators.reconcile(&[(Subject::Battery, 77)], &loader, &config);
        assert_eq!(result, Err(AnimationError::ZeroFrameRate));
    }
}
