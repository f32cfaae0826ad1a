//! Driver trait for abstracting platform I/O.
//!
//! The [`Driver`] trait decouples the application runtime from a specific
//! radio stack and presentation layer. Each front-end implements the trait,
//! while the generic [`crate::Runtime`] handles all orchestration.
//!
//! Radio callbacks do not flow through the driver's methods. A driver posts
//! them into the runtime mailbox as [`crate::Input::Radio`], which keeps every
//! state mutation on the runtime task.

use std::future::Future;

use blulok_core::RadioCommand;

use crate::Snapshot;

/// Abstracts radio and presentation for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the terminal front-end and in
/// simulation.
///
/// # Implementations
///
/// - **Simulation**: an in-process simulated lock answering every command
/// - **Platform**: a BLE central stack posting its callbacks to the mailbox
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Hand a command to the radio.
    ///
    /// The outcome arrives later as a radio callback, never as the return
    /// value.
    ///
    /// # Errors
    ///
    /// Returns an error if the radio stack is gone.
    fn execute(&mut self, command: RadioCommand) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Present a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), Self::Error>;

    /// Release platform resources.
    fn stop(&mut self);
}
