//! Fuzz target for concurrent group edits
//!
//! Drives a model world of four devices with an arbitrary operation
//! sequence. Devices only sync when told to, so most edits are submitted
//! from a stale view and go through conflict resolution.
//!
//! # Invariants
//!
//! - Every standard invariant holds after every operation
//! - After a full sync every device holds the server's state

#![no_main]

use libfuzzer_sys::fuzz_target;
use roster_harness::{InvariantRegistry, ModelWorld, Operation};

const DEVICES: usize = 4;

fuzz_target!(|input: (u64, Vec<Operation>)| {
    let (seed, ops) = input;
    let mut world = ModelWorld::with_seed(DEVICES, seed);
    let invariants = InvariantRegistry::standard();

    for (step, op) in ops.iter().take(64).enumerate() {
        let _ = world.apply(op);
        invariants.assert_all(&world.snapshot(), &format!("after step {step} ({op:?})"));
    }

    world.sync_all();
    let snapshot = world.snapshot();
    for device in &snapshot.devices {
        assert_eq!(device.state, snapshot.server, "device {} did not converge", device.id);
    }
});
