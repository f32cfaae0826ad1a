//! Fuzz target for the whole client against simulated locks
//!
//! Applies arbitrary operation sequences to a `World`: user intents, host
//! lifecycle, radio power, link loss, latch pulls, faults and time.
//!
//! # Invariants
//!
//! - Every invariant in the standard registry holds after every step
//! - The same seed and operations reproduce the same command log
//! - NEVER panic on any sequence

#![no_main]

use arbitrary::Arbitrary;
use blulok_harness::{InvariantRegistry, Operation, World, invariants::describe};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Run {
    seed: u64,
    operations: Vec<Operation>,
}

fuzz_target!(|run: Run| {
    let registry = InvariantRegistry::standard();
    let mut world = World::standard(run.seed);
    let mut replay = World::standard(run.seed);

    for (step, operation) in run.operations.iter().enumerate() {
        world.apply(operation);
        replay.apply(operation);
        if let Err(violations) = registry.check_all(&world.snapshot()) {
            panic!("step {step} {operation:?}: {}", describe(&violations));
        }
    }

    assert_eq!(world.command_log(), replay.command_log(), "runs diverged");
});
