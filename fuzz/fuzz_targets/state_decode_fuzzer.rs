//! Fuzz target for device state decoding
//!
//! # Invariants
//!
//! - Empty payloads decode to no state on both channels
//! - Only the first byte matters
//! - A decoded state re-encodes to its byte, except `Unknown`
//! - Unrecognised battery bytes decode to no state
//! - NEVER panic on any payload

#![no_main]

use blulok_core::{BatteryReleaseState, LockState, decode_battery_state, decode_lock_state};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|payload: &[u8]| {
    let lock = decode_lock_state(payload);
    let battery = decode_battery_state(payload);

    let Some(&first) = payload.first() else {
        assert_eq!(lock, None);
        assert_eq!(battery, None);
        return;
    };

    assert_eq!(lock, decode_lock_state(&[first]));
    assert_eq!(battery, decode_battery_state(&[first]));

    match lock {
        Some(LockState::Unknown) | None => {},
        Some(state) => assert_eq!(state.code(), first),
    }
    assert_eq!(battery, BatteryReleaseState::from_code(first));
    if let Some(state) = battery {
        assert_eq!(state.code(), first);
    }
});
