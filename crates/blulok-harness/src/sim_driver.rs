//! Runtime driver backed by a [`SimRadio`].
//!
//! [`SimDriver`] answers radio commands from the runtime the way a platform
//! central would: asynchronously, through the runtime mailbox. Callbacks are
//! queued in order and forwarded by a background task after an optional
//! latency, so with paused tokio time a whole session plays out
//! deterministically. Tests hold a [`SimHandle`] to poke the radio and to
//! inspect what the runtime did.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use blulok_app::{Driver, Input, Snapshot};
use blulok_core::{RadioCommand, RadioEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{
    invariants::{InvariantRegistry, SystemSnapshot, describe},
    sim_lock::SimRadio,
};

/// Errors reported by [`SimDriver`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimDriverError {
    /// The callback forwarder stopped.
    #[error("simulated radio is gone")]
    RadioGone,

    /// A published snapshot broke an invariant.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

#[derive(Debug, Default)]
struct Captured {
    commands: Vec<RadioCommand>,
    renders: usize,
    last_render: Option<Snapshot>,
    stopped: bool,
}

/// Shared view of a running [`SimDriver`].
#[derive(Clone)]
pub struct SimHandle {
    radio: Arc<Mutex<SimRadio>>,
    captured: Arc<Mutex<Captured>>,
    outbox: mpsc::UnboundedSender<RadioEvent>,
}

impl SimHandle {
    /// Inspect or reconfigure the radio without generating callbacks.
    pub fn with_radio<R>(&self, f: impl FnOnce(&mut SimRadio) -> R) -> R {
        let mut radio = self.radio.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut radio)
    }

    /// Change the radio environment and deliver the resulting callbacks.
    ///
    /// Returns the number of callbacks queued.
    pub fn stimulate(&self, f: impl FnOnce(&mut SimRadio) -> Vec<RadioEvent>) -> usize {
        let events = self.with_radio(f);
        let count = events.len();
        for event in events {
            if self.outbox.send(event).is_err() {
                debug!("callback dropped, forwarder stopped");
            }
        }
        count
    }

    /// Every radio command the runtime issued so far.
    pub fn commands(&self) -> Vec<RadioCommand> {
        self.captured().commands.clone()
    }

    /// Number of snapshots rendered.
    pub fn render_count(&self) -> usize {
        self.captured().renders
    }

    /// Latest rendered snapshot.
    pub fn last_render(&self) -> Option<Snapshot> {
        self.captured().last_render.clone()
    }

    /// Whether the runtime stopped the driver.
    pub fn stopped(&self) -> bool {
        self.captured().stopped
    }

    fn captured(&self) -> std::sync::MutexGuard<'_, Captured> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`Driver`] that talks to a [`SimRadio`].
pub struct SimDriver {
    handle: SimHandle,
    invariants: Option<InvariantRegistry>,
}

impl SimDriver {
    /// Wrap `radio` and start forwarding its callbacks to `inputs`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(radio: SimRadio, inputs: mpsc::Sender<Input>, latency: Duration) -> Self {
        let (outbox, mut queue) = mpsc::unbounded_channel::<RadioEvent>();
        tokio::spawn(async move {
            while let Some(event) = queue.recv().await {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                trace!(?event, "radio callback");
                if inputs.send(Input::Radio(event)).await.is_err() {
                    debug!("runtime gone, forwarder stopping");
                    break;
                }
            }
        });

        let handle = SimHandle {
            radio: Arc::new(Mutex::new(radio)),
            captured: Arc::new(Mutex::new(Captured::default())),
            outbox,
        };
        Self { handle, invariants: None }
    }

    /// Check every rendered snapshot against `registry`. A violation fails
    /// the render and stops the runtime.
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Handle for tests.
    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    async fn execute(&mut self, command: RadioCommand) -> Result<(), Self::Error> {
        self.handle.captured().commands.push(command.clone());
        let events = self.handle.with_radio(|radio| radio.apply(command));
        for event in events {
            self.handle.outbox.send(event).map_err(|_| SimDriverError::RadioGone)?;
        }
        Ok(())
    }

    fn render(&mut self, snapshot: &Snapshot) -> Result<(), Self::Error> {
        {
            let mut captured = self.handle.captured();
            captured.renders += 1;
            captured.last_render = Some(snapshot.clone());
        }
        if let Some(registry) = &self.invariants {
            registry
                .check_all(&SystemSnapshot::from_app(snapshot))
                .map_err(|violations| SimDriverError::Invariant(describe(&violations)))?;
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.handle.captured().stopped = true;
    }
}
