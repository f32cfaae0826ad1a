//! Fuzz target for the animation sequencers
//!
//! # Invariants
//!
//! - The current frame is always inside the frame set (or 0 when empty)
//! - Ticks never decrease the current frame of a target-seeking sequencer
//! - Playback stops exactly at the clamped target
//! - The loop sequencer visits frames in order and wraps to 0
//! - NEVER panic on any input

#![no_main]

use arbitrary::Arbitrary;
use blulok_core::{FrameSequencer, LoopSequencer};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Step {
    Retarget(u16),
    Tick,
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    frames: u8,
    initial: u16,
    frame_rate: u8,
    steps: Vec<Step>,
}

fuzz_target!(|scenario: Scenario| {
    let frames: Vec<u8> = (0..scenario.frames).collect();
    let last = frames.len().saturating_sub(1);
    let rate = u32::from(scenario.frame_rate);

    let Ok(mut seek) = FrameSequencer::new(frames.clone(), usize::from(scenario.initial), rate) else {
        assert_eq!(rate, 0);
        return;
    };
    let Ok(mut looping) = LoopSequencer::new(frames, rate) else {
        unreachable!("rate already accepted");
    };
    assert_eq!(seek.current_index(), usize::from(scenario.initial).min(last));

    for step in scenario.steps {
        match step {
            Step::Retarget(target) => {
                seek.retarget(usize::from(target));
                assert_eq!(seek.target_index(), usize::from(target).min(last));
                assert_eq!(seek.is_playing(), seek.current_index() < seek.target_index());
            },
            Step::Tick => {
                let before = seek.current_index();
                seek.tick();
                assert!(seek.current_index() >= before);
                assert!(seek.current_index() <= seek.target_index());

                let previous = looping.current_index();
                looping.tick();
                if looping.len() > 1 {
                    assert_eq!(looping.current_index(), (previous + 1) % looping.len());
                } else {
                    assert_eq!(looping.current_index(), 0);
                }
            },
        }
        assert!(seek.current_index() <= last);
        if !seek.is_playing() {
            assert_eq!(seek.current_index(), seek.target_index());
        }
    }
});
