//! Animation frame assets.
//!
//! Frames come from an [`AssetProvider`]: first a best-effort remote fetch
//! that reports progress, then the local bundle when the fetch fails or comes
//! back empty. [`FrameLoader`] is the pure bookkeeping the runtime keeps about
//! those loads; the loads themselves run as tasks that post
//! [`AssetUpdate`]s back into the mailbox.

use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use blulok_core::Subject;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::state::LoadingView;

/// Opaque handle to one decoded frame.
///
/// The application only needs a stable name per frame; what the name points
/// at is up to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameHandle(Arc<str>);

impl FrameHandle {
    /// Create a handle.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Frame name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Names of the bundled frames of a subject, in playback order.
///
/// Lock frames are `0000..=0113`, incomplete-lock frames `0000..=0029`, and
/// the battery set starts with `113-1` followed by `0114..=0275`.
pub fn bundle_frame_names(subject: Subject) -> Vec<String> {
    match subject {
        Subject::Lock => (0..114).map(|index| format!("{index:04}")).collect(),
        Subject::IncompleteLock => (0..30).map(|index| format!("{index:04}")).collect(),
        Subject::Battery => std::iter::once("113-1".to_owned())
            .chain((114..=275).map(|index| format!("{index:04}")))
            .collect(),
    }
}

/// Where a set of frames came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
    /// Remote fetch.
    Remote,
    /// Local bundle fallback.
    Bundle,
}

/// Errors produced while loading frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// Remote fetch failed or is not configured.
    #[error("could not fetch {subject} frames: {reason}")]
    Remote {
        /// Asset set name
        subject: &'static str,
        /// Provider error text
        reason: String,
    },

    /// Bundle does not contain the set.
    #[error("no bundled {subject} frames")]
    MissingBundle {
        /// Asset set name
        subject: &'static str,
    },
}

/// Source of animation frames.
pub trait AssetProvider: Send + Sync + 'static {
    /// Fetch a frame set remotely, reporting progress in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::Remote`] when the fetch is unavailable.
    fn fetch_remote(
        &self,
        subject: Subject,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> impl Future<Output = Result<Vec<FrameHandle>, AssetError>> + Send;

    /// Load a frame set from the local bundle.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::MissingBundle`] when the bundle lacks the set.
    fn load_bundle(&self, subject: Subject) -> Result<Vec<FrameHandle>, AssetError>;
}

/// Load a frame set, falling back to the bundle.
///
/// # Errors
///
/// Fails only if both sources fail. The remote error is reported when there
/// is one, since it is usually the more useful of the two.
pub async fn load_frames<P: AssetProvider>(
    provider: &P,
    subject: Subject,
    progress: &(dyn Fn(f64) + Send + Sync),
) -> Result<(AssetSource, Vec<FrameHandle>), AssetError> {
    let remote_error = match provider.fetch_remote(subject, progress).await {
        Ok(frames) if !frames.is_empty() => return Ok((AssetSource::Remote, frames)),
        Ok(_) => None,
        Err(e) => Some(e),
    };
    debug!(subject = subject.asset_name(), error = ?remote_error, "remote fetch unusable, trying bundle");

    match provider.load_bundle(subject) {
        Ok(frames) if !frames.is_empty() => Ok((AssetSource::Bundle, frames)),
        Ok(_) => Err(remote_error.unwrap_or(AssetError::MissingBundle { subject: subject.asset_name() })),
        Err(e) => Err(remote_error.unwrap_or(e)),
    }
}

/// Result of a load task, posted back to the runtime.
#[derive(Debug, Clone)]
pub enum AssetUpdate {
    /// Remote fetch progress.
    Progress {
        /// Set being loaded
        subject: Subject,
        /// Fraction in `[0, 1]`
        fraction: f64,
    },
    /// Frames available.
    Loaded {
        /// Set loaded
        subject: Subject,
        /// Where they came from
        source: AssetSource,
        /// Frames in playback order
        frames: Vec<FrameHandle>,
    },
    /// Both sources failed.
    Failed {
        /// Set that failed
        subject: Subject,
        /// Error text
        message: String,
    },
}

#[derive(Debug, Clone)]
enum Slot {
    Loading,
    Ready(Arc<[FrameHandle]>),
    Failed,
}

/// Loading state of every frame set.
///
/// Progress and the error message are shared across sets: the indicator
/// describes whichever load started last.
#[derive(Debug, Clone)]
pub struct FrameLoader {
    slots: HashMap<Subject, Slot>,
    progress: f64,
    error: Option<String>,
}

impl Default for FrameLoader {
    fn default() -> Self {
        Self { slots: HashMap::new(), progress: 1.0, error: None }
    }
}

impl FrameLoader {
    /// Loader with nothing requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start loading a set.
    ///
    /// Returns `false` when the set is already present or loading. A failed
    /// set may be requested again.
    pub fn request(&mut self, subject: Subject) -> bool {
        if matches!(self.slots.get(&subject), Some(Slot::Loading | Slot::Ready(_))) {
            return false;
        }
        debug!(subject = subject.asset_name(), "requesting frames");
        self.slots.insert(subject, Slot::Loading);
        self.error = None;
        self.progress = 0.0;
        true
    }

    /// Apply an update from a load task.
    pub fn apply(&mut self, update: AssetUpdate) {
        match update {
            AssetUpdate::Progress { subject, fraction } => {
                if matches!(self.slots.get(&subject), Some(Slot::Loading)) {
                    self.progress = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
                }
            },
            AssetUpdate::Loaded { subject, source, frames } => {
                info!(subject = subject.asset_name(), ?source, count = frames.len(), "frames loaded");
                self.slots.insert(subject, Slot::Ready(frames.into()));
                self.progress = 1.0;
            },
            AssetUpdate::Failed { subject, message } => {
                warn!(subject = subject.asset_name(), %message, "frames unavailable");
                self.slots.insert(subject, Slot::Failed);
                self.progress = 1.0;
                self.error = Some(message);
            },
        }
    }

    /// Loaded frames of a set.
    pub fn frames(&self, subject: Subject) -> Option<Arc<[FrameHandle]>> {
        match self.slots.get(&subject) {
            Some(Slot::Ready(frames)) => Some(Arc::clone(frames)),
            _ => None,
        }
    }

    /// Whether any load is in flight.
    pub fn is_loading(&self) -> bool {
        self.slots.values().any(|slot| matches!(slot, Slot::Loading))
    }

    /// Progress of the latest load in `[0, 1]`.
    pub fn loading_progress(&self) -> f64 {
        self.progress
    }

    /// Error of the latest failed load.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Indicator for the snapshot.
    pub fn view(&self) -> LoadingView {
        LoadingView {
            is_loading: self.is_loading(),
            progress: self.progress,
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Fixed {
        remote: Result<Vec<FrameHandle>, AssetError>,
        bundle: Result<Vec<FrameHandle>, AssetError>,
    }

    impl AssetProvider for Fixed {
        async fn fetch_remote(
            &self,
            _subject: Subject,
            progress: &(dyn Fn(f64) + Send + Sync),
        ) -> Result<Vec<FrameHandle>, AssetError> {
            progress(0.5);
            progress(1.0);
            self.remote.clone()
        }

        fn load_bundle(&self, _subject: Subject) -> Result<Vec<FrameHandle>, AssetError> {
            self.bundle.clone()
        }
    }

    fn frames(n: usize) -> Vec<FrameHandle> {
        (0..n).map(|i| FrameHandle::new(format!("{i:04}"))).collect()
    }

    fn remote_down() -> AssetError {
        AssetError::Remote { subject: "lock", reason: "offline".into() }
    }

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn bundle_names_match_asset_sets() {
        assert_eq!(bundle_frame_names(Subject::Lock).len(), 114);
        assert_eq!(bundle_frame_names(Subject::IncompleteLock).len(), 30);
        let battery = bundle_frame_names(Subject::Battery);
        assert_eq!(battery.len(), 163);
        assert_eq!(battery[0], "113-1");
        assert_eq!(battery[1], "0114");
        assert_eq!(battery[162], "0275");
    }

    #[test]
    fn remote_wins_and_reports_progress() {
        let provider = Fixed { remote: Ok(frames(3)), bundle: Ok(frames(1)) };
        let seen = Mutex::new(Vec::new());
        let record = |fraction: f64| seen.lock().unwrap().push(fraction);
        let (source, loaded) = block_on(load_frames(&provider, Subject::Lock, &record)).unwrap();
        assert_eq!(source, AssetSource::Remote);
        assert_eq!(loaded.len(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0.5, 1.0]);
    }

    #[test]
    fn bundle_fallback_when_remote_fails() {
        let provider = Fixed { remote: Err(remote_down()), bundle: Ok(frames(2)) };
        let (source, loaded) = block_on(load_frames(&provider, Subject::Lock, &|_| {})).unwrap();
        assert_eq!(source, AssetSource::Bundle);
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn total_failure_reports_remote_error() {
        let provider = Fixed {
            remote: Err(remote_down()),
            bundle: Err(AssetError::MissingBundle { subject: "lock" }),
        };
        let error = block_on(load_frames(&provider, Subject::Lock, &|_| {})).unwrap_err();
        assert_eq!(error, remote_down());
    }

    #[test]
    fn empty_everywhere_is_missing_bundle() {
        let provider = Fixed { remote: Ok(Vec::new()), bundle: Ok(Vec::new()) };
        let error = block_on(load_frames(&provider, Subject::Battery, &|_| {})).unwrap_err();
        assert_eq!(error, AssetError::MissingBundle { subject: "battery" });
    }

    #[test]
    fn loader_requests_once_until_failure() {
        let mut loader = FrameLoader::new();
        assert!(!loader.is_loading());
        assert_eq!(loader.loading_progress(), 1.0);

        assert!(loader.request(Subject::Lock));
        assert!(!loader.request(Subject::Lock));
        assert!(loader.is_loading());
        assert_eq!(loader.loading_progress(), 0.0);

        loader.apply(AssetUpdate::Progress { subject: Subject::Lock, fraction: f64::NAN });
        assert_eq!(loader.loading_progress(), 0.0);
        loader.apply(AssetUpdate::Progress { subject: Subject::Lock, fraction: 1.7 });
        assert_eq!(loader.loading_progress(), 1.0);

        loader.apply(AssetUpdate::Failed { subject: Subject::Lock, message: "offline".into() });
        assert!(!loader.is_loading());
        assert_eq!(loader.error_message(), Some("offline"));

        assert!(loader.request(Subject::Lock));
        assert_eq!(loader.error_message(), None);
        loader.apply(AssetUpdate::Loaded {
            subject: Subject::Lock,
            source: AssetSource::Bundle,
            frames: frames(114),
        });
        assert_eq!(loader.frames(Subject::Lock).map(|f| f.len()), Some(114));
        assert!(!loader.request(Subject::Lock));
    }

    #[test]
    fn progress_for_idle_set_is_ignored() {
        let mut loader = FrameLoader::new();
        loader.apply(AssetUpdate::Progress { subject: Subject::Battery, fraction: 0.3 });
        assert_eq!(loader.loading_progress(), 1.0);
    }
}
