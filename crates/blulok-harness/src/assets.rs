//! In-memory frame source.

use std::{collections::BTreeSet, time::Duration};

use blulok_app::{AssetError, AssetProvider, FrameHandle, bundle_frame_names};
use blulok_core::Subject;

/// How the remote frame source behaves.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteBehavior {
    /// Delivers the bundled frame names after `steps` progress reports
    /// spaced `step_delay` apart.
    Available {
        /// Progress reports before completion
        steps: u32,
        /// Delay between reports
        step_delay: Duration,
    },
    /// Fails with `reason`.
    Unavailable {
        /// Failure text
        reason: String,
    },
    /// Succeeds with no frames.
    Empty,
}

/// [`AssetProvider`] serving frame names from memory.
#[derive(Debug, Clone)]
pub struct MemoryAssets {
    remote: RemoteBehavior,
    bundled: BTreeSet<Subject>,
}

impl MemoryAssets {
    /// Remote reachable with instant delivery, every subject bundled.
    pub fn new() -> Self {
        Self {
            remote: RemoteBehavior::Available { steps: 1, step_delay: Duration::ZERO },
            bundled: Subject::ALL.into_iter().collect(),
        }
    }

    /// Only the bundle works.
    pub fn offline() -> Self {
        Self::new().with_remote(RemoteBehavior::Unavailable { reason: "offline".to_owned() })
    }

    /// Replace the remote behavior.
    pub fn with_remote(mut self, remote: RemoteBehavior) -> Self {
        self.remote = remote;
        self
    }

    /// Remove `subject` from the bundle.
    pub fn without_bundle(mut self, subject: Subject) -> Self {
        self.bundled.remove(&subject);
        self
    }
}

impl Default for MemoryAssets {
    fn default() -> Self {
        Self::new()
    }
}

fn handles(subject: Subject) -> Vec<FrameHandle> {
    bundle_frame_names(subject).into_iter().map(FrameHandle::new).collect()
}

impl AssetProvider for MemoryAssets {
    async fn fetch_remote(
        &self,
        subject: Subject,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Vec<FrameHandle>, AssetError> {
        match &self.remote {
            RemoteBehavior::Available { steps, step_delay } => {
                let steps = (*steps).max(1);
                for step in 1..=steps {
                    if !step_delay.is_zero() {
                        tokio::time::sleep(*step_delay).await;
                    }
                    progress(f64::from(step) / f64::from(steps));
                }
                Ok(handles(subject))
            },
            RemoteBehavior::Unavailable { reason } => {
                Err(AssetError::Remote { subject: subject.asset_name(), reason: reason.clone() })
            },
            RemoteBehavior::Empty => Ok(Vec::new()),
        }
    }

    fn load_bundle(&self, subject: Subject) -> Result<Vec<FrameHandle>, AssetError> {
        if self.bundled.contains(&subject) {
            Ok(handles(subject))
        } else {
            Err(AssetError::MissingBundle { subject: subject.asset_name() })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use blulok_app::{AssetSource, load_frames};

    use super::*;

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    #[test]
    fn offline_falls_back_to_bundle() {
        let assets = MemoryAssets::offline();
        let (source, frames) = block_on(load_frames(&assets, Subject::Lock, &|_| {})).unwrap();
        assert_eq!(source, AssetSource::Bundle);
        assert_eq!(frames.len(), 114);
    }

    #[test]
    fn remote_reports_progress() {
        let assets = MemoryAssets::new()
            .with_remote(RemoteBehavior::Available { steps: 4, step_delay: Duration::ZERO });
        let seen = std::sync::Mutex::new(Vec::new());
        let record = |fraction: f64| seen.lock().unwrap().push(fraction);
        let (source, frames) = block_on(load_frames(&assets, Subject::Battery, &record)).unwrap();
        assert_eq!(source, AssetSource::Remote);
        assert_eq!(frames.len(), 163);
        assert_eq!(*seen.lock().unwrap(), vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn nothing_available_fails() {
        let assets = MemoryAssets::offline().without_bundle(Subject::IncompleteLock);
        let err = block_on(load_frames(&assets, Subject::IncompleteLock, &|_| {})).unwrap_err();
        assert!(matches!(err, AssetError::Remote { .. }));
    }
}
