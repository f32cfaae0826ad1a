//! Input loop.

use std::io::{self, Write};

use blulok_app::{AppEvent, RuntimeHandle, UserIntent};
use blulok_core::{BatteryReleaseState, PeripheralId, RadioState};
use blulok_harness::{SimHandle, SimLock, SimRadio};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::command::{Command, HELP, ParseError, Stimulus};

/// Signal strength of the nearest simulated lock.
const NEAREST_RSSI: i16 = -45;

/// Signal lost per position further away.
const RSSI_STEP: i16 = 12;

/// A powered-off radio with `locks` BluLok accessories and one unrelated
/// device in range.
pub fn demo_radio(locks: usize, seed: u64) -> SimRadio {
    let mut radio = SimRadio::new(seed).with_lock(SimLock::new("SPEAKER", "Kitchen Speaker", -40));
    let mut rssi = NEAREST_RSSI;
    for n in 1..=locks {
        radio.add_lock(SimLock::new(format!("LOCK-{n}"), format!("BluLok-{n}"), rssi));
        rssi = rssi.saturating_sub(RSSI_STEP).max(-100);
    }
    radio
}

/// Read commands from `input` until `quit` or end of input.
///
/// End of input asks the runtime to quit.
///
/// # Errors
///
/// Returns an error if reading input or writing to `out` fails.
pub async fn run_shell<R, W>(input: R, mut out: W, handle: &RuntimeHandle, sim: &SimHandle) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let delivered = match Command::parse(&line) {
            Ok(Command::Intent(UserIntent::Quit)) => break,
            Ok(Command::Intent(intent)) => handle.send_app(AppEvent::Intent(intent)).await,
            Ok(Command::Lifecycle(lifecycle)) => handle.send_app(AppEvent::Lifecycle(lifecycle)).await,
            Ok(Command::Sim(stimulus)) => {
                let callbacks = stimulate(sim, handle, stimulus);
                debug!(?stimulus, callbacks, "stimulus");
                true
            },
            Ok(Command::Wait(duration)) => {
                tokio::time::sleep(duration).await;
                true
            },
            Ok(Command::Help) => {
                writeln!(out, "{HELP}")?;
                true
            },
            Err(ParseError::Empty) => true,
            Err(e) => {
                writeln!(out, "{e}")?;
                true
            },
        };
        if !delivered {
            debug!("runtime stopped, leaving shell");
            return Ok(());
        }
    }

    handle.send_app(AppEvent::Intent(UserIntent::Quit)).await;
    Ok(())
}

fn stimulate(sim: &SimHandle, handle: &RuntimeHandle, stimulus: Stimulus) -> usize {
    let active: Option<PeripheralId> = handle.snapshot().session.active_peripheral;
    match stimulus {
        Stimulus::Advertise => sim.stimulate(SimRadio::advertise),
        Stimulus::Power(on) => {
            let state = if on { RadioState::PoweredOn } else { RadioState::PoweredOff };
            sim.stimulate(|radio| radio.set_state(state))
        },
        Stimulus::DropLink => active.map_or(0, |id| sim.stimulate(|radio| radio.drop_link(&id))),
        Stimulus::PullLatch => active.map_or(0, |id| sim.stimulate(|radio| radio.pull_latch(&id))),
        Stimulus::BatteryNotReady => active.map_or(0, |id| {
            sim.stimulate(|radio| radio.set_battery_state(&id, BatteryReleaseState::NotReady))
        }),
    }
}
