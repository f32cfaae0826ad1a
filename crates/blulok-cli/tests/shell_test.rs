//! Scripted shell sessions against the simulated radio.

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
    time::Duration,
};

use blulok_app::{Runtime, RuntimeConfig};
use blulok_cli::{TerminalDriver, run_shell, shell::demo_radio};
use blulok_harness::{MemoryAssets, SimDriver};

/// Output buffer shared between the driver and the test.
#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Vec<u8>>>);

impl Shared {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Shared {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `script` and return (rendered output, shell output).
async fn session(script: &str) -> (String, String) {
    let rendered = Shared::default();
    let mut sim = None;
    let (runtime, handle) = Runtime::new(RuntimeConfig::default(), MemoryAssets::new(), |inputs| {
        let sim_driver = SimDriver::spawn(demo_radio(2, 3), inputs, Duration::from_millis(10));
        let driver = TerminalDriver::new(sim_driver, rendered.clone());
        sim = Some(driver.sim());
        driver
    })
    .unwrap();
    let sim = sim.unwrap();
    let task = tokio::spawn(runtime.run());

    let mut replies = Vec::new();
    run_shell(script.as_bytes(), &mut replies, &handle, &sim).await.unwrap();
    task.await.unwrap().unwrap();
    assert!(sim.stopped());

    (rendered.text(), String::from_utf8(replies).unwrap())
}

#[tokio::test(start_paused = true)]
async fn scan_connect_open() {
    let (rendered, replies) = session(
        "power on\nwait 50\nscan\nwait 100\nc 0\nwait 500\nopen\nwait 1000\nlatch\nwait 1000\nquit\n",
    )
    .await;

    assert!(replies.is_empty(), "{replies}");
    assert!(rendered.contains("[Scanning] Scanning for devices…"));
    assert!(rendered.contains("0: BluLok-1"));
    assert!(rendered.contains("connected: BluLok-1"));
    assert!(rendered.contains("lock: Armed / Key engaged. Pull the latch within ~30s."));
    assert!(rendered.contains("lock: Open / "));
    assert!(rendered.contains("lock: frame 75/114"));
    assert!(!rendered.contains("Kitchen Speaker"));
    assert!(rendered.ends_with("bye\n"));
}

#[tokio::test(start_paused = true)]
async fn mistakes_are_explained() {
    let (rendered, replies) = session("power on\nfly\nconnect\nc 4\nwait 50\nhelp\n").await;

    assert!(replies.contains("unknown command `fly`, try `help`"));
    assert!(replies.contains("`connect` needs a list position"));
    assert!(replies.contains("commands:"));
    assert!(rendered.contains("notice: No device at position 4"));
}

#[tokio::test(start_paused = true)]
async fn end_of_input_quits() {
    let (rendered, _) = session("").await;
    assert!(rendered.starts_with("[Idle] Tap Scan to find devices"));
}
