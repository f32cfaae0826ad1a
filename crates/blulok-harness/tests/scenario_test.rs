//! End-to-end scenarios against simulated locks.
//!
//! Each test drives the real App and session through a [`World`] and checks
//! what the user would see and what reached the radio.

use std::time::Duration;

use blulok_app::{CommandView, LoadingView, Scene, UserIntent};
use blulok_core::{EjectStep, LockState, Phase, PeripheralId, RadioCommand};
use blulok_harness::{FaultKind, Faults, Operation, SimLock, SimRadio, World};

const FRONT: u8 = 0;

fn front() -> PeripheralId {
    PeripheralId::new("LOCK-FRONT")
}

fn connected(seed: u64) -> World {
    let mut world = World::standard(seed);
    world.apply(&Operation::Scan);
    world.apply(&Operation::Select(0));
    assert_eq!(world.app().session().phase, Phase::Connected);
    world.clear_log();
    world
}

fn count(world: &World, wanted: impl Fn(&RadioCommand) -> bool) -> usize {
    world.command_log().iter().filter(|command| wanted(command)).count()
}

fn resolves(world: &World) -> usize {
    count(world, |command| matches!(command, RadioCommand::Resolve { .. }))
}

#[test]
fn scan_lists_only_locks_strongest_first() {
    let mut world = World::standard(1);
    world.apply(&Operation::Scan);
    world.apply(&Operation::Advertise);

    let names: Vec<_> = world.app().filtered().map(|record| record.display_name.clone()).collect();
    assert_eq!(names, ["BluLok-Front", "BluLok-Shed"]);
    assert_eq!(world.app().scene(), Scene::Picker);
}

#[test]
fn search_narrows_the_picker() {
    let mut world = World::standard(2);
    world.apply(&Operation::Scan);
    world.intent(UserIntent::Search("shed".to_owned()));
    world.apply(&Operation::Select(0));

    let session = world.app().session();
    assert_eq!(session.phase, Phase::Connected);
    assert_eq!(session.connected_name.as_deref(), Some("BluLok-Shed"));
}

#[test]
fn open_then_pull_latch() {
    let mut world = connected(3);
    assert_eq!(world.app().scene(), Scene::Home);
    assert_eq!(world.app().lock_state(), Some(LockState::Connected));

    world.apply(&Operation::Open);
    assert_eq!(world.app().lock_state(), Some(LockState::Armed));
    assert_eq!(world.app().session().status_text, "Command sent ✓");

    let snapshot = world.app().snapshot(Vec::new(), LoadingView::default());
    insta::assert_snapshot!(snapshot.summary(), @r"
    [Connected] Command sent ✓
    connected: BluLok-Front
    lock: Armed / Key engaged. Pull the latch within ~30s.
    ");

    world.apply(&Operation::PullLatch(FRONT));
    assert_eq!(world.app().lock_state(), Some(LockState::Open));
    assert_eq!(world.radio().lock(&front()).map(SimLock::lock_state), Some(LockState::Open));
}

#[test]
fn battery_eject_until_the_lock_goes_dark() {
    let mut world = connected(4);
    let mut steps = vec![world.app().eject_step()];

    world.apply(&Operation::BatteryEject);
    steps.push(world.app().eject_step());
    assert_eq!(world.app().command_view(), CommandView::Battery);
    assert!(world.command_log().is_empty());

    world.apply(&Operation::BatteryEject);
    steps.push(world.app().eject_step());
    assert_eq!(count(&world, |command| matches!(command, RadioCommand::Write { value, .. } if value == &[0x00])), 1);

    // Without power the lock can no longer be found
    world.apply(&Operation::SetFault { lock: FRONT, fault: FaultKind::Unresolvable, enabled: true });
    world.apply(&Operation::DropLink(FRONT));
    steps.push(world.app().eject_step());

    insta::assert_json_snapshot!(steps, @r#"
    [
      "Idle",
      "Instruction",
      "Sent",
      "Ejected"
    ]
    "#);
    assert_eq!(world.app().session().phase, Phase::Scanning);
    assert_eq!(world.app().session().status_text, "Device not found. Scanning…");
}

#[test]
fn link_loss_reconnects_exactly_once() {
    let mut world = connected(5);

    world.apply(&Operation::DropLink(FRONT));

    assert_eq!(resolves(&world), 1);
    assert_eq!(world.app().session().phase, Phase::Connected);
    assert_eq!(world.app().eject_step(), EjectStep::Idle);
}

#[test]
fn user_disconnect_stays_down() {
    let mut world = connected(6);

    world.apply(&Operation::Disconnect);
    world.apply(&Operation::Foreground);
    world.apply(&Operation::Elapse(30));

    assert_eq!(resolves(&world), 0);
    let session = world.app().session();
    assert_eq!(session.phase, Phase::Disconnected);
    assert!(session.user_initiated_disconnect);
    assert_eq!(session.last_connected_name.as_deref(), Some("BluLok-Front"));
    assert_eq!(world.app().scene(), Scene::Picker);

    world.apply(&Operation::Reconnect);
    assert_eq!(resolves(&world), 1);
    assert_eq!(world.app().session().phase, Phase::Connected);
}

#[test]
fn background_drops_link_and_it_comes_back_once() {
    let mut world = connected(7);

    world.apply(&Operation::Background);
    assert_eq!(count(&world, |command| matches!(command, RadioCommand::Disconnect { .. })), 1);
    assert_eq!(resolves(&world), 1);
    assert_eq!(world.app().session().phase, Phase::Connected);

    // Already linked again, nothing left to do
    world.apply(&Operation::Foreground);
    assert_eq!(resolves(&world), 1);
}

#[test]
fn silent_lock_times_out_during_discovery() {
    let radio = SimRadio::new(8).with_lock(
        SimLock::new("LOCK-FRONT", "BluLok-Front", -50)
            .with_faults(Faults { silent_discovery: true, ..Faults::default() }),
    );
    let mut world = World::new(blulok_core::SessionConfig::default(), radio);
    world.set_radio_power(true);
    world.apply(&Operation::Scan);
    world.apply(&Operation::Select(0));
    assert_eq!(world.app().session().phase, Phase::Connecting);

    world.elapse(Duration::from_secs(19));
    assert_eq!(world.app().session().phase, Phase::Connecting);

    world.elapse(Duration::from_secs(1));
    let session = world.app().session();
    assert_eq!(session.phase, Phase::Disconnected);
    assert_eq!(session.status_text, "Failed to connect");
    assert!(session.error_text.as_deref().is_some_and(|text| text.contains("timed out")));
    assert_eq!(resolves(&world), 0);
    assert!(!world.radio().lock(&front()).is_some_and(SimLock::is_connected));
}

#[test]
fn refused_connection_reports_failure() {
    let mut world = World::standard(9);
    world.apply(&Operation::SetFault { lock: FRONT, fault: FaultKind::RefuseConnect, enabled: true });
    world.apply(&Operation::Scan);
    world.apply(&Operation::Select(0));

    let session = world.app().session();
    assert_eq!(session.phase, Phase::Disconnected);
    assert_eq!(session.status_text, "Failed to connect");
    assert_eq!(session.error_text.as_deref(), Some(blulok_harness::REFUSED_TEXT));
    assert!(world.app().notice().is_some());
}

#[test]
fn write_error_is_surfaced() {
    let mut world = connected(10);
    world.apply(&Operation::SetFault { lock: FRONT, fault: FaultKind::WriteError, enabled: true });

    world.apply(&Operation::Open);

    let session = world.app().session();
    assert_eq!(session.status_text, "Write failed");
    assert_eq!(session.error_text.as_deref(), Some("Write not permitted"));
    assert_eq!(session.phase, Phase::Connected);
}

#[test]
fn lock_without_release_channel_never_connects() {
    let mut world = World::standard(11);
    world.apply(&Operation::SetFault { lock: FRONT, fault: FaultKind::MissingReleaseChannel, enabled: true });
    world.apply(&Operation::Scan);
    world.apply(&Operation::Select(0));

    assert_eq!(world.app().session().phase, Phase::Connecting);
    world.apply(&Operation::Open);
    assert!(world.app().notice().is_some_and(|notice| notice.contains("not ready")));
    assert_eq!(world.app().session().error_text.as_deref(), Some("Not ready to send command"));
    assert_eq!(count(&world, |command| matches!(command, RadioCommand::Write { .. })), 0);
}
