//! Fuzz target for group record decryption
//!
//! Arbitrary bytes are decoded as a wire group record and decrypted with a
//! fixed key. Whatever decrypts must survive a re-encryption round trip.
//!
//! The fuzzer should NEVER panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use prost::Message;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use roster_core::{EngineConfig, GroupOperations};
use roster_crypto::GroupMasterKey;
use roster_proto::wire;

fuzz_target!(|data: &[u8]| {
    let Ok(record) = wire::Group::decode(data) else {
        return;
    };
    let ops = GroupOperations::new(&GroupMasterKey::new([7; 32]), EngineConfig::default());
    let Ok(snapshot) = ops.decrypt_group(&record) else {
        return;
    };

    let mut rng = ChaCha20Rng::seed_from_u64(data.len() as u64);
    let reencrypted = ops.encrypt_group(&snapshot, &mut rng);
    let decrypted = ops.decrypt_group(&reencrypted).expect("re-encrypted record decrypts");
    assert_eq!(decrypted, snapshot);
});
