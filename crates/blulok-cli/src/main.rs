//! BluLok terminal client entry point.
//!
//! # Usage
//!
//! ```bash
//! # Two simulated locks, default timings
//! blulok
//!
//! # Slow lock animation, capped reconnects, verbose logs
//! blulok --lock-fps 10 --reconnect-max 3 --reconnect-backoff-ms 2000 --log-level debug
//!
//! # Scripted run
//! printf 'scan\nwait 200\nc 0\nwait 500\nopen\nwait 500\nquit\n' | blulok --seed 7
//! ```

use std::{io, time::Duration};

use blulok_app::{Runtime, RuntimeConfig};
use blulok_cli::{TerminalDriver, run_shell, shell::demo_radio};
use blulok_core::{AnimationConfig, RadioState, ReconnectPolicy, SessionConfig};
use blulok_harness::{MemoryAssets, SimDriver};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// BluLok smart-lock client
#[derive(Parser, Debug)]
#[command(name = "blulok")]
#[command(about = "Terminal client for BluLok smart locks (simulated radio)")]
#[command(version)]
struct Args {
    /// Number of simulated locks in range
    #[arg(long, default_value = "2")]
    locks: usize,

    /// Seed for the simulated radio. Random if omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Delay before each simulated radio callback, in milliseconds
    #[arg(long, default_value = "20")]
    latency_ms: u64,

    /// Serve animation frames from the bundle only
    #[arg(long)]
    offline: bool,

    /// Lock animation frame rate
    #[arg(long, default_value = "50")]
    lock_fps: u32,

    /// Battery animation frame rate
    #[arg(long, default_value = "40")]
    battery_fps: u32,

    /// Incomplete-lock loop frame rate
    #[arg(long, default_value = "25")]
    incomplete_fps: u32,

    /// Seconds allowed for service discovery after connecting
    #[arg(long, default_value = "20")]
    discovery_timeout: u64,

    /// Wait for service discovery forever
    #[arg(long)]
    no_discovery_timeout: bool,

    /// Consecutive automatic reconnects before giving up. Unbounded if
    /// omitted.
    #[arg(long)]
    reconnect_max: Option<u32>,

    /// Delay before each automatic reconnect, in milliseconds
    #[arg(long, default_value = "0")]
    reconnect_backoff_ms: u64,

    /// Housekeeping tick period, in milliseconds
    #[arg(long, default_value = "1000")]
    housekeeping_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn runtime_config(&self) -> RuntimeConfig {
        let mut animation = AnimationConfig::default();
        animation.lock.frame_rate = self.lock_fps;
        animation.battery.frame_rate = self.battery_fps;
        animation.incomplete_lock.frame_rate = self.incomplete_fps;

        let session = SessionConfig {
            discovery_timeout: (!self.no_discovery_timeout)
                .then(|| Duration::from_secs(self.discovery_timeout)),
            reconnect: ReconnectPolicy {
                max_attempts: self.reconnect_max,
                backoff: Duration::from_millis(self.reconnect_backoff_ms),
            },
            ..SessionConfig::default()
        };

        RuntimeConfig {
            session,
            animation,
            housekeeping: Duration::from_millis(self.housekeeping_ms),
            ..RuntimeConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(seed, locks = args.locks, "starting simulated radio");

    let radio = demo_radio(args.locks, seed);
    let assets = if args.offline { MemoryAssets::offline() } else { MemoryAssets::new() };
    let latency = Duration::from_millis(args.latency_ms);

    let mut sim = None;
    let (runtime, handle) = Runtime::new(args.runtime_config(), assets, |inputs| {
        let driver = TerminalDriver::new(SimDriver::spawn(radio, inputs, latency), io::stdout());
        sim = Some(driver.sim());
        driver
    })?;
    let sim = sim.ok_or("driver was not built")?;
    let task = tokio::spawn(runtime.run());

    sim.stimulate(|radio| radio.set_state(RadioState::PoweredOn));
    run_shell(BufReader::new(tokio::io::stdin()), io::stdout(), &handle, &sim).await?;

    task.await??;
    Ok(())
}
