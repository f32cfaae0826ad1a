//! Text driver for the terminal front-end.
//!
//! Implements [`Driver`] by handing radio commands to a [`SimDriver`] and
//! printing snapshots as plain text. Animation frames change on every tick,
//! so frames still playing are left out and a snapshot is only printed when
//! the rest of it changed.

use std::io::{self, Write};

use blulok_app::{Driver, Snapshot};
use blulok_core::RadioCommand;
use blulok_harness::{SimDriver, SimDriverError, SimHandle};
use thiserror::Error;
use tracing::debug;

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error writing output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The simulated radio failed.
    #[error("radio error: {0}")]
    Radio(#[from] SimDriverError),
}

/// Driver that prints snapshots to `W`.
pub struct TerminalDriver<W> {
    sim: SimDriver,
    out: W,
    last: Option<String>,
}

impl<W: Write + Send> TerminalDriver<W> {
    /// Print to `out`, with radio commands answered by `sim`.
    pub fn new(sim: SimDriver, out: W) -> Self {
        Self { sim, out, last: None }
    }

    /// Handle to the simulated radio.
    pub fn sim(&self) -> SimHandle {
        self.sim.handle()
    }
}

/// Snapshot text without the frames still moving.
fn settled_text(snapshot: &Snapshot) -> String {
    let mut settled = snapshot.clone();
    settled.animations.retain(|view| !view.playing);
    settled.to_string()
}

impl<W: Write + Send> Driver for TerminalDriver<W> {
    type Error = TerminalError;

    async fn execute(&mut self, command: RadioCommand) -> Result<(), Self::Error> {
        self.sim.execute(command).await?;
        Ok(())
    }

    fn render(&mut self, snapshot: &Snapshot) -> Result<(), Self::Error> {
        self.sim.render(snapshot)?;

        let text = settled_text(snapshot);
        if self.last.as_deref() == Some(text.as_str()) {
            return Ok(());
        }
        writeln!(self.out, "{text}\n")?;
        self.out.flush()?;
        self.last = Some(text);
        Ok(())
    }

    fn stop(&mut self) {
        self.sim.stop();
        if let Err(e) = writeln!(self.out, "bye").and_then(|()| self.out.flush()) {
            debug!(error = %e, "could not write farewell");
        }
    }
}
