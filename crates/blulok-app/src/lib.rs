//! Application layer for the BluLok lock client
//!
//! Pure state machines plus a generic runtime for UI and session
//! orchestration, so deterministic simulations exercise the same code the
//! terminal front-end runs.
//!
//! # Components
//!
//! - [`App`]: view-model state machine (scene, eject flow, search, intents)
//! - [`Bridge`]: session bridge (translates App actions to session events)
//! - [`Driver`]: trait for platform radio and presentation
//! - [`Runtime`]: mailbox loop serialising every input onto one task
//! - [`Animators`]: mounted frame sequencers and their tick sources
//! - [`FrameLoader`]: asset loading state with remote and bundle sources

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod animator;
mod app;
mod assets;
mod bridge;
mod driver;
mod event;
mod runtime;
mod state;

pub use action::AppAction;
pub use animator::{Animator, Animators};
pub use app::App;
pub use assets::{
    AssetError, AssetProvider, AssetSource, AssetUpdate, FrameHandle, FrameLoader,
    bundle_frame_names, load_frames,
};
pub use bridge::Bridge;
pub use driver::Driver;
pub use event::{AppEvent, UserIntent};
pub use runtime::{
    DEFAULT_HOUSEKEEPING, DEFAULT_MAILBOX_CAPACITY, Input, Runtime, RuntimeConfig, RuntimeError,
    RuntimeHandle,
};
pub use state::{AnimationView, CommandView, LoadingView, PeripheralRow, Scene, Snapshot};
