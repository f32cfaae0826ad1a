//! Session and animation configuration.

use std::time::Duration;

use crate::{
    animation::{LOCK_REST_FRAME, Subject},
    error::AnimationError,
    protocol::{ACCESSORY_NAME_TAG, PLACEHOLDER_NAME},
};

/// Time allowed between a platform connect and both channels being found.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(20);

/// Auto-reconnect policy for unsolicited disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconnectPolicy {
    /// Consecutive unsolicited reconnects allowed before giving up. `None`
    /// means unbounded. The count resets once a link reaches Connected.
    pub max_attempts: Option<u32>,
    /// Delay before each automatic attempt. Zero reconnects immediately.
    pub backoff: Duration,
}

impl ReconnectPolicy {
    /// Whether attempt number `attempt` (1-based) is allowed.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

/// Connection session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Substring accessory names must contain.
    pub name_tag: String,
    /// Name the platform reports for nameless peripherals.
    pub placeholder_name: String,
    /// Bound on service and channel discovery. `None` waits forever.
    pub discovery_timeout: Option<Duration>,
    /// Auto-reconnect policy.
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name_tag: ACCESSORY_NAME_TAG.to_owned(),
            placeholder_name: PLACEHOLDER_NAME.to_owned(),
            discovery_timeout: Some(DEFAULT_DISCOVERY_TIMEOUT),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Playback settings for one animated subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectConfig {
    /// Frames per second. Zero is rejected when the sequencer is built.
    pub frame_rate: u32,
    /// Frame shown when the subject mounts.
    pub initial_frame: usize,
}

/// Playback settings for every subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationConfig {
    /// Lock body.
    pub lock: SubjectConfig,
    /// Battery compartment.
    pub battery: SubjectConfig,
    /// Incomplete-lock loop.
    pub incomplete_lock: SubjectConfig,
}

impl AnimationConfig {
    /// Settings for one subject.
    pub fn for_subject(&self, subject: Subject) -> SubjectConfig {
        match subject {
            Subject::Lock => self.lock,
            Subject::Battery => self.battery,
            Subject::IncompleteLock => self.incomplete_lock,
        }
    }

    /// Reject settings a sequencer could not be built from.
    ///
    /// # Errors
    ///
    /// - `AnimationError::ZeroFrameRate` if any subject has a zero frame rate
    pub fn validate(&self) -> Result<(), AnimationError> {
        if Subject::ALL.iter().any(|&subject| self.for_subject(subject).frame_rate == 0) {
            return Err(AnimationError::ZeroFrameRate);
        }
        Ok(())
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            lock: SubjectConfig { frame_rate: 50, initial_frame: LOCK_REST_FRAME },
            battery: SubjectConfig { frame_rate: 40, initial_frame: 0 },
            incomplete_lock: SubjectConfig { frame_rate: 25, initial_frame: 0 },
        }
    }
}
