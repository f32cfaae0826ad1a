//! Terminal front-end for the BluLok client.
//!
//! A thin shell over [`blulok_app::Runtime`]: lines typed on stdin become
//! user intents, lifecycle signals or stimuli for the simulated lock, and
//! every published snapshot is printed as text. The radio is always the
//! in-process simulation from [`blulok_harness`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod shell;
pub mod terminal;

pub use command::{Command, ParseError, Stimulus};
pub use shell::run_shell;
pub use terminal::{TerminalDriver, TerminalError};
