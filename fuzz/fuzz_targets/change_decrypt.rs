//! Fuzz target for change decoding and decryption
//!
//! Feeds raw bytes as the serialized actions of a server change, both
//! directly and wrapped in a `GroupChange` with every known epoch.
//!
//! The fuzzer should NEVER panic. Undecodable or undecryptable input is
//! reported as `None` or an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use prost::Message;
use roster_core::{EngineConfig, GroupOperations, resolve_conflict};
use roster_crypto::GroupMasterKey;
use roster_proto::{GroupSnapshot, wire};

fuzz_target!(|data: &[u8]| {
    let ops = GroupOperations::new(&GroupMasterKey::new([7; 32]), EngineConfig::default());

    if let Ok(actions) = wire::GroupChangeActions::decode(data)
        && let Ok(change) = ops.decrypt_change_actions(&actions)
    {
        let empty = GroupSnapshot::default();
        let once = resolve_conflict(&empty, &change);
        assert_eq!(resolve_conflict(&empty, &once), once);
    }

    for change_epoch in 0..=ops.config().highest_known_epoch + 1 {
        let change = wire::GroupChange {
            actions: data.to_vec(),
            server_signature: Vec::new(),
            change_epoch,
        };
        let decrypted = ops.decrypt_change(&change);
        if change_epoch > ops.config().highest_known_epoch {
            assert!(decrypted.is_none(), "change from unknown epoch {change_epoch} was decrypted");
        }
    }
});
