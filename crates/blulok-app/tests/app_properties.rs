//! Property-based tests for the App state machine.
//!
//! Tests verify that view-model invariants hold under arbitrary event
//! sequences, with the session either idle or connected.

use std::time::Instant;

use blulok_app::{App, AppAction, AppEvent, CommandView, Scene, UserIntent};
use blulok_core::{
    BatteryReleaseState, ConnectionSession, EjectStep, HostLifecycle, LockState, Phase, SessionView,
    Subject, battery_target_frame, lock_target_frame,
};
use proptest::prelude::*;

fn intent_strategy() -> impl Strategy<Value = UserIntent> {
    prop_oneof![
        1 => Just(UserIntent::Scan),
        1 => Just(UserIntent::StopScan),
        1 => (0usize..4).prop_map(UserIntent::Select),
        1 => Just(UserIntent::CancelConnecting),
        1 => Just(UserIntent::Disconnect),
        1 => Just(UserIntent::Reconnect),
        3 => Just(UserIntent::Open),
        3 => Just(UserIntent::BatteryEject),
        1 => Just(UserIntent::ShowLock),
        1 => Just(UserIntent::ShowBattery),
        1 => "[a-z]{0,4}".prop_map(UserIntent::Search),
    ]
}

fn lock_state_strategy() -> impl Strategy<Value = LockState> {
    prop::sample::select(LockState::ALL.to_vec())
}

fn battery_state_strategy() -> impl Strategy<Value = BatteryReleaseState> {
    prop_oneof![Just(BatteryReleaseState::NotReady), Just(BatteryReleaseState::CanRemove)]
}

fn event_strategy() -> impl Strategy<Value = AppEvent> {
    prop_oneof![
        6 => intent_strategy().prop_map(AppEvent::Intent),
        1 => prop_oneof![Just(HostLifecycle::Background), Just(HostLifecycle::Foreground)]
            .prop_map(AppEvent::Lifecycle),
        1 => lock_state_strategy().prop_map(AppEvent::LockStateReported),
        2 => battery_state_strategy().prop_map(AppEvent::BatteryStateReported),
        1 => Just(AppEvent::LinkEstablished),
        1 => any::<bool>().prop_map(|user_initiated| AppEvent::LinkLost { user_initiated }),
        1 => "[a-z ]{1,12}".prop_map(|message| AppEvent::Error { message }),
    ]
}

fn idle_view() -> SessionView {
    ConnectionSession::<Instant>::default().view()
}

fn connected_view(lock_state: Option<LockState>) -> SessionView {
    let mut view = idle_view();
    view.phase = Phase::Connected;
    view.lock_state = lock_state;
    view
}

fn check_visible(app: &App) -> Result<(), TestCaseError> {
    let visible = app.visible_subjects();
    if app.scene() != Scene::Home {
        prop_assert!(visible.is_empty());
        return Ok(());
    }

    let (subject, target) = visible[0];
    match app.command_view() {
        CommandView::Lock => {
            prop_assert_eq!(subject, Subject::Lock);
            prop_assert_eq!(target, lock_target_frame(app.lock_state()));
        },
        CommandView::Battery => {
            prop_assert_eq!(subject, Subject::Battery);
            prop_assert_eq!(target, battery_target_frame(app.eject_step()));
        },
    }
    let incomplete = visible.iter().any(|&(subject, _)| subject == Subject::IncompleteLock);
    prop_assert_eq!(incomplete, app.lock_state().is_none());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Nothing reaches the radio path from the picker except scanning,
    /// connecting and lifecycle.
    #[test]
    fn idle_app_never_sends_commands(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut app = App::new(idle_view());

        for event in events {
            let actions = app.handle(event);
            prop_assert!(!actions.contains(&AppAction::SendBatteryRelease));
            let connects = actions.iter().any(|action| matches!(action, AppAction::Connect { .. }));
            prop_assert!(!connects);
            prop_assert_eq!(app.scene(), Scene::Picker);
            prop_assert_ne!(app.eject_step(), EjectStep::Sent);
            check_visible(&app)?;
        }
    }

    /// On the home scene the visible subjects follow the command view, lock
    /// state and eject step.
    #[test]
    fn home_subjects_follow_state(
        initial in prop::option::of(lock_state_strategy()),
        events in prop::collection::vec(event_strategy(), 0..60)
    ) {
        let mut app = App::new(connected_view(initial));
        prop_assert_eq!(app.scene(), Scene::Home);

        for event in events {
            let step = app.eject_step();
            let tap = matches!(event, AppEvent::Intent(UserIntent::BatteryEject));
            let actions = app.handle(event);

            let released = actions.contains(&AppAction::SendBatteryRelease);
            let armable = matches!(step, EjectStep::Instruction | EjectStep::Armed);
            prop_assert_eq!(released, tap && armable);
            if tap {
                prop_assert_eq!(app.command_view(), CommandView::Battery);
            }
            check_visible(&app)?;
        }
    }
}
