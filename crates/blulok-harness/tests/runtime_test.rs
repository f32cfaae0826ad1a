//! Runtime tests under paused tokio time.
//!
//! The real [`Runtime`] runs against a [`SimDriver`] and [`MemoryAssets`].
//! Every published snapshot is checked against the invariant registry by the
//! driver, so a violation stops the runtime and fails the test.

use std::time::Duration;

use blulok_app::{
    AppEvent, Input, Runtime, RuntimeConfig, RuntimeError, RuntimeHandle, Scene, Snapshot,
    UserIntent,
};
use blulok_core::{PeripheralId, Phase, RadioCommand, RadioState, Subject};
use blulok_harness::{
    Faults, InvariantRegistry, MemoryAssets, RemoteBehavior, SimDriver, SimDriverError, SimHandle,
    SimLock, SimRadio,
};
use tokio::{task::JoinHandle, time::timeout};

const LATENCY: Duration = Duration::from_millis(5);
const PATIENCE: Duration = Duration::from_secs(60);

struct Running {
    sim: SimHandle,
    handle: RuntimeHandle,
    task: JoinHandle<Result<(), RuntimeError<SimDriverError>>>,
}

fn radio() -> SimRadio {
    SimRadio::new(42)
        .with_lock(SimLock::new("LOCK-FRONT", "BluLok-Front", -50))
        .with_lock(SimLock::new("SPEAKER", "Kitchen Speaker", -40))
}

fn start(radio: SimRadio, assets: MemoryAssets) -> Running {
    let mut sim = None;
    let (runtime, handle) = Runtime::new(RuntimeConfig::default(), assets, |inputs| {
        let driver = SimDriver::spawn(radio, inputs, LATENCY).with_invariants(InvariantRegistry::standard());
        sim = Some(driver.handle());
        driver
    })
    .expect("valid config");
    let task = tokio::spawn(runtime.run());
    Running { sim: sim.expect("driver built"), handle, task }
}

async fn wait_until(handle: &RuntimeHandle, what: &str, predicate: impl Fn(&Snapshot) -> bool) -> Snapshot {
    let mut snapshots = handle.subscribe();
    match timeout(PATIENCE, snapshots.wait_for(|snapshot| predicate(snapshot))).await {
        Ok(Ok(snapshot)) => snapshot.clone(),
        Ok(Err(_)) => panic!("runtime stopped while waiting for {what}"),
        Err(_) => panic!("timed out waiting for {what}: {}", handle.snapshot()),
    }
}

async fn intent(handle: &RuntimeHandle, intent: UserIntent) {
    assert!(handle.send_app(AppEvent::Intent(intent)).await);
}

async fn power_on(running: &Running) {
    running.sim.stimulate(|radio| radio.set_state(RadioState::PoweredOn));
    wait_until(&running.handle, "radio", |s| s.session.radio == RadioState::PoweredOn).await;
}

async fn connect(running: &Running) {
    power_on(running).await;
    intent(&running.handle, UserIntent::Scan).await;
    wait_until(&running.handle, "directory", |s| s.peripherals.len() == 1).await;
    intent(&running.handle, UserIntent::Select(0)).await;
    wait_until(&running.handle, "home", |s| {
        s.scene == Scene::Home && s.session.lock_state.is_some() && s.session.battery_state.is_some()
    })
    .await;
}

fn animation(snapshot: &Snapshot, subject: Subject) -> Option<&blulok_app::AnimationView> {
    snapshot.animations.iter().find(|view| view.subject == subject)
}

async fn quit(running: Running) -> SimHandle {
    intent(&running.handle, UserIntent::Quit).await;
    let result = running.task.await.expect("runtime task");
    assert!(result.is_ok(), "{result:?}");
    running.sim
}

#[tokio::test(start_paused = true)]
async fn connects_and_shows_home() {
    let running = start(radio(), MemoryAssets::new());
    connect(&running).await;

    let snapshot = running.handle.snapshot();
    assert_eq!(snapshot.session.connected_name.as_deref(), Some("BluLok-Front"));
    assert_eq!(snapshot.peripherals[0].name, "BluLok-Front");

    let sim = quit(running).await;
    assert!(sim.commands().contains(&RadioCommand::Connect { peripheral: PeripheralId::new("LOCK-FRONT") }));
    assert!(sim.render_count() > 0);
    assert!(sim.stopped());
}

#[tokio::test(start_paused = true)]
async fn unlock_animation_seeks_to_armed_frame() {
    let running = start(radio(), MemoryAssets::new());
    connect(&running).await;

    let mounted = wait_until(&running.handle, "lock frames", |s| animation(s, Subject::Lock).is_some()).await;
    let lock = animation(&mounted, Subject::Lock).expect("mounted");
    assert_eq!(lock.frame, 30);
    assert_eq!(lock.frame_count, 114);
    assert!(!lock.playing);

    intent(&running.handle, UserIntent::Open).await;
    let armed = wait_until(&running.handle, "armed frame", |s| {
        animation(s, Subject::Lock).is_some_and(|view| view.frame == 45 && !view.playing)
    })
    .await;
    assert_eq!(animation(&armed, Subject::Lock).and_then(|view| view.frame_name.as_deref()), Some("0045"));
    assert!(animation(&armed, Subject::IncompleteLock).is_none());

    quit(running).await;
}

#[tokio::test(start_paused = true)]
async fn battery_view_swaps_animations() {
    let running = start(radio(), MemoryAssets::new());
    connect(&running).await;

    intent(&running.handle, UserIntent::BatteryEject).await;
    let snapshot = wait_until(&running.handle, "battery frames", |s| {
        animation(s, Subject::Battery).is_some_and(|view| view.frame == 77)
    })
    .await;
    assert!(animation(&snapshot, Subject::Lock).is_none());
    assert_eq!(animation(&snapshot, Subject::Battery).map(|view| view.frame_count), Some(163));

    quit(running).await;
}

#[tokio::test(start_paused = true)]
async fn remote_progress_is_published() {
    let assets = MemoryAssets::new()
        .with_remote(RemoteBehavior::Available { steps: 4, step_delay: Duration::from_millis(250) });
    let running = start(radio(), assets);
    connect(&running).await;

    let loading = wait_until(&running.handle, "loading", |s| s.loading.is_loading).await;
    assert!(loading.loading.progress < 1.0);

    let done = wait_until(&running.handle, "loaded", |s| {
        !s.loading.is_loading && animation(s, Subject::Lock).is_some()
    })
    .await;
    assert!(done.loading.error.is_none());

    quit(running).await;
}

#[tokio::test(start_paused = true)]
async fn missing_frames_are_reported() {
    let running = start(radio(), MemoryAssets::offline().without_bundle(Subject::Lock));
    connect(&running).await;

    let snapshot = wait_until(&running.handle, "asset error", |s| s.loading.error.is_some()).await;
    assert!(snapshot.loading.error.as_deref().is_some_and(|error| error.contains("offline")));
    assert!(animation(&snapshot, Subject::Lock).is_none());
    assert!(snapshot.summary().contains("assets: "));

    quit(running).await;
}

#[tokio::test(start_paused = true)]
async fn link_loss_reconnects_through_the_mailbox() {
    let running = start(radio(), MemoryAssets::new());
    connect(&running).await;

    let id = PeripheralId::new("LOCK-FRONT");
    assert_eq!(running.sim.stimulate(|radio| radio.drop_link(&id)), 1);
    let down = wait_until(&running.handle, "link down", |s| s.session.phase != Phase::Connected).await;
    assert_eq!(down.scene, Scene::Home);
    wait_until(&running.handle, "connected again", |s| s.session.phase == Phase::Connected).await;

    let sim = quit(running).await;
    let resolves = sim
        .commands()
        .iter()
        .filter(|command| matches!(command, RadioCommand::Resolve { .. }))
        .count();
    assert_eq!(resolves, 1);
}

#[tokio::test(start_paused = true)]
async fn silent_discovery_times_out_on_housekeeping() {
    let radio = SimRadio::new(1).with_lock(
        SimLock::new("LOCK-FRONT", "BluLok-Front", -50)
            .with_faults(Faults { silent_discovery: true, ..Faults::default() }),
    );
    let running = start(radio, MemoryAssets::new());
    power_on(&running).await;
    intent(&running.handle, UserIntent::Scan).await;
    wait_until(&running.handle, "directory", |s| s.peripherals.len() == 1).await;
    let started = tokio::time::Instant::now();
    intent(&running.handle, UserIntent::Select(0)).await;

    let failed = wait_until(&running.handle, "timeout", |s| {
        s.session.error_text.as_deref().is_some_and(|text| text.contains("timed out"))
    })
    .await;
    assert_eq!(failed.session.status_text, "Failed to connect");
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert!(started.elapsed() < Duration::from_secs(22));

    quit(running).await;
}

#[tokio::test(start_paused = true)]
async fn background_and_foreground_round_trip() {
    let running = start(radio(), MemoryAssets::new());
    connect(&running).await;

    assert!(running.handle.send(Input::App(AppEvent::Lifecycle(blulok_core::HostLifecycle::Background))).await);
    assert!(running.handle.send(Input::App(AppEvent::Lifecycle(blulok_core::HostLifecycle::Foreground))).await);
    tokio::time::sleep(Duration::from_secs(2)).await;

    let snapshot = running.handle.snapshot();
    assert_eq!(snapshot.scene, Scene::Home);
    assert!(!snapshot.session.user_initiated_disconnect);

    let sim = quit(running).await;
    assert!(sim.commands().contains(&RadioCommand::Disconnect { peripheral: PeripheralId::new("LOCK-FRONT") }));
}
