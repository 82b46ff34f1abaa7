//! Model-based property tests.
//!
//! These tests generate random operation sequences against a world of one
//! server and several devices, all running the real engine over encrypted
//! records, and check the group-state invariants after every step.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelDevice   ModelServer   InvariantRegistry
//!      (propose,     (sequence,    (after every
//!       resolve,      apply)        operation)
//!       patch)
//! ```

use arbitrary::{Arbitrary, Unstructured};
use insta::assert_snapshot;
use proptest::prelude::*;
use roster_harness::{
    ACCOUNT_POOL, BAN_CAPACITY, DeviceId, InvariantRegistry, ModelWorld, Operation, OperationError,
    OperationResult,
};

fn operation_strategy(num_devices: usize) -> impl Strategy<Value = Operation> {
    let device = 0..num_devices as DeviceId;
    let account = 0..ACCOUNT_POOL;

    prop_oneof![
        // Weight towards membership churn, where conflicts are interesting
        2 => (device.clone(), any::<u8>())
            .prop_map(|(device, title)| Operation::SetTitle { device, title }),
        1 => (device.clone(), any::<u8>())
            .prop_map(|(device, preset)| Operation::SetTimer { device, preset }),
        1 => (device.clone(), account.clone(), any::<bool>())
            .prop_map(|(device, account, admin)| Operation::ChangeRole { device, account, admin }),
        3 => (device.clone(), account.clone(), any::<bool>()).prop_map(
            |(device, account, with_profile_key)| Operation::AddMember {
                device,
                account,
                with_profile_key,
            }
        ),
        2 => (device.clone(), account.clone(), any::<bool>())
            .prop_map(|(device, account, ban)| Operation::RemoveMember { device, account, ban }),
        2 => (device.clone(), account.clone())
            .prop_map(|(device, account)| Operation::Ban { device, account }),
        1 => (device.clone(), account.clone())
            .prop_map(|(device, account)| Operation::Unban { device, account }),
        2 => (device.clone(), account.clone())
            .prop_map(|(device, account)| Operation::ApproveRequest { device, account }),
        1 => (device.clone(), account.clone(), any::<bool>())
            .prop_map(|(device, account, ban)| Operation::RefuseRequest { device, account, ban }),
        1 => (device.clone(), any::<u8>())
            .prop_map(|(device, seed)| Operation::RotateInviteLink { device, seed }),
        2 => account.clone().prop_map(|account| Operation::RequestToJoin { account }),
        2 => account.prop_map(|account| Operation::AcceptInvite { account }),
        2 => device.prop_map(|device| Operation::Sync { device }),
    ]
}

/// Errors the server may legitimately return for a well-formed edit.
fn is_expected_rejection(result: &OperationResult) -> bool {
    match result {
        OperationResult::Error(error) => {
            matches!(error, OperationError::Banned | OperationError::BanListFull { .. })
        },
        OperationResult::Accepted { .. } | OperationResult::Unchanged => true,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: Invariants hold after every operation
    ///
    /// Unique entries, disjoint lists, ban capacity, monotonic revisions and
    /// convergence of up-to-date devices must hold at every step, no matter
    /// how stale the editing devices are.
    #[test]
    fn prop_invariants_hold_after_every_operation(
        seed in any::<u64>(),
        num_devices in 1..5usize,
        ops in prop::collection::vec(operation_strategy(4), 0..60)
    ) {
        let registry = InvariantRegistry::standard();
        let mut world = ModelWorld::with_seed(num_devices, seed);

        for (step, op) in ops.into_iter().enumerate() {
            let op = clamp_device(op, num_devices);
            let result = world.apply(&op);

            prop_assert!(
                is_expected_rejection(&result),
                "step {step}: {op:?} failed with {result:?}"
            );
            registry.assert_all(&world.snapshot(), &format!("after step {step}: {op:?}"));
        }
    }

    /// Property: Every device converges after a full sync
    #[test]
    fn prop_devices_converge_after_sync(
        seed in any::<u64>(),
        num_devices in 2..5usize,
        ops in prop::collection::vec(operation_strategy(4), 0..60)
    ) {
        let mut world = ModelWorld::with_seed(num_devices, seed);
        for op in ops {
            let _ = world.apply(&clamp_device(op, num_devices));
        }

        world.sync_all();

        for id in 0..num_devices as DeviceId {
            let device = world.device(id).unwrap();
            prop_assert_eq!(device.state(), world.server().state(), "device {} diverged", id);
        }
    }

    /// Property: Accepted changes take exactly the next revision
    #[test]
    fn prop_accepted_revisions_are_consecutive(
        num_devices in 1..5usize,
        ops in prop::collection::vec(operation_strategy(4), 0..60)
    ) {
        let mut world = ModelWorld::new(num_devices);

        for op in ops {
            let before = world.server().revision();
            let result = world.apply(&clamp_device(op, num_devices));

            match result.accepted_revision() {
                Some(revision) => prop_assert_eq!(revision, before + 1),
                None => prop_assert_eq!(world.server().revision(), before),
            }
        }
    }

    /// Property: Concurrent title edits keep the last submitted title
    ///
    /// The second device edits without syncing first. Its proposal conflicts,
    /// is resolved against the newer state, and either lands on top or turns
    /// out to be redundant.
    #[test]
    fn prop_concurrent_title_edits_keep_the_last_title(
        first in any::<u8>(),
        second in any::<u8>(),
    ) {
        let mut world = ModelWorld::new(2);

        let a = world.apply(&Operation::SetTitle { device: 0, title: first });
        let b = world.apply(&Operation::SetTitle { device: 1, title: second });

        prop_assert_eq!(a, OperationResult::Accepted { revision: 1, attempts: 1 });
        if first % 4 == second % 4 {
            prop_assert_eq!(b, OperationResult::Unchanged);
        } else {
            prop_assert_eq!(b, OperationResult::Accepted { revision: 2, attempts: 2 });
        }
        let expected = format!("title {}", second % 4);
        prop_assert_eq!(&world.server().state().title, &expected);
        prop_assert_eq!(&world.device(1).unwrap().state().title, &expected);
    }

    /// Property: Operations decoded from raw bytes keep the invariants
    ///
    /// Mirrors the fuzz target so that failures reproduce without libFuzzer.
    #[test]
    fn prop_arbitrary_operations_keep_invariants(
        bytes in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let registry = InvariantRegistry::standard();
        let mut world = ModelWorld::new(3);
        let mut input = Unstructured::new(&bytes);

        while let Ok(op) = Operation::arbitrary(&mut input) {
            let _ = world.apply(&clamp_device(op, 3));
            registry.assert_all(&world.snapshot(), "after decoded operation");
            if input.is_empty() {
                break;
            }
        }
    }
}

/// Clamp device ids to the valid range for the given number of devices.
fn clamp_device(op: Operation, num_devices: usize) -> Operation {
    let clamp = |id: DeviceId| id % num_devices as u8;
    match op {
        Operation::SetTitle { device, title } => {
            Operation::SetTitle { device: clamp(device), title }
        },
        Operation::SetTimer { device, preset } => {
            Operation::SetTimer { device: clamp(device), preset }
        },
        Operation::ChangeRole { device, account, admin } => {
            Operation::ChangeRole { device: clamp(device), account, admin }
        },
        Operation::AddMember { device, account, with_profile_key } => {
            Operation::AddMember { device: clamp(device), account, with_profile_key }
        },
        Operation::RemoveMember { device, account, ban } => {
            Operation::RemoveMember { device: clamp(device), account, ban }
        },
        Operation::Ban { device, account } => Operation::Ban { device: clamp(device), account },
        Operation::Unban { device, account } => Operation::Unban { device: clamp(device), account },
        Operation::ApproveRequest { device, account } => {
            Operation::ApproveRequest { device: clamp(device), account }
        },
        Operation::RefuseRequest { device, account, ban } => {
            Operation::RefuseRequest { device: clamp(device), account, ban }
        },
        Operation::RotateInviteLink { device, seed } => {
            Operation::RotateInviteLink { device: clamp(device), seed }
        },
        Operation::Sync { device } => Operation::Sync { device: clamp(device) },
        other => other,
    }
}

#[cfg(test)]
mod smoke_tests {
    use roster_harness::model::account_aci;

    use super::*;

    fn summary(world: &ModelWorld) -> String {
        let state = world.server().state();
        format!(
            "revision={} members={} pending={} requesting={} banned={}",
            state.revision,
            state.members.len(),
            state.pending_members.len(),
            state.requesting_members.len(),
            state.banned_members.len()
        )
    }

    /// Stale devices resolve their edits against newer state.
    #[test]
    fn stale_devices_resolve_membership_edits() {
        let mut world = ModelWorld::new(3);

        // Device 0 invites account 5
        let result =
            world.apply(&Operation::AddMember { device: 0, account: 5, with_profile_key: false });
        assert_eq!(result, OperationResult::Accepted { revision: 1, attempts: 1 });

        // Device 1 has not seen the invite; its direct add becomes a promotion
        let result =
            world.apply(&Operation::AddMember { device: 1, account: 5, with_profile_key: true });
        assert_eq!(result, OperationResult::Accepted { revision: 2, attempts: 2 });
        assert!(world.server().state().is_member(account_aci(5)));
        assert!(world.server().state().pending_members.is_empty());

        // Account 6 asks to join
        let result = world.apply(&Operation::RequestToJoin { account: 6 });
        assert_eq!(result.accepted_revision(), Some(3));

        // Device 2 has not seen the request, but the ban still lands and the
        // refusal is picked up on retry
        let result = world.apply(&Operation::RefuseRequest { device: 2, account: 6, ban: true });
        assert_eq!(result, OperationResult::Accepted { revision: 4, attempts: 2 });

        assert_snapshot!(summary(&world), @"revision=4 members=4 pending=0 requesting=0 banned=1");
    }

    /// A full ban list evicts its oldest entry.
    #[test]
    fn full_ban_list_evicts_oldest() {
        let mut world = ModelWorld::new(1);

        for account in 4..4 + BAN_CAPACITY as u8 + 1 {
            let result = world.apply(&Operation::Ban { device: 0, account });
            assert!(result.accepted_revision().is_some(), "ban of {account} failed: {result:?}");
        }

        let banned: Vec<_> =
            world.server().state().banned_members.iter().map(|b| b.service_id).collect();
        assert_eq!(banned.len(), BAN_CAPACITY);
        assert!(!banned.contains(&account_aci(4).into()));
        assert!(banned.contains(&account_aci(7).into()));
        assert_snapshot!(summary(&world), @"revision=4 members=1 pending=0 requesting=0 banned=3");
    }

    /// Two devices adding the same account: only one change lands.
    #[test]
    fn duplicate_additions_collapse() {
        let mut world = ModelWorld::new(2);

        let first =
            world.apply(&Operation::AddMember { device: 0, account: 6, with_profile_key: true });
        let second =
            world.apply(&Operation::AddMember { device: 1, account: 6, with_profile_key: true });

        assert_eq!(first.accepted_revision(), Some(1));
        assert_eq!(second, OperationResult::Unchanged);
        assert_eq!(world.device(1).unwrap().state(), world.server().state());
    }

    /// Removing a member that someone else already removed is a no-op.
    #[test]
    fn removal_of_removed_member_is_a_no_op() {
        let mut world = ModelWorld::new(3);

        world.apply(&Operation::RemoveMember { device: 0, account: 2, ban: false });
        let result = world.apply(&Operation::RemoveMember { device: 1, account: 2, ban: false });

        assert_eq!(result, OperationResult::Unchanged);
        assert_eq!(world.server().revision(), 1);
    }

    /// Stale role change for a member who has since left is dropped.
    #[test]
    fn role_change_for_departed_member_is_dropped() {
        let mut world = ModelWorld::new(3);

        world.apply(&Operation::RemoveMember { device: 0, account: 2, ban: false });
        let result = world.apply(&Operation::ChangeRole { device: 1, account: 2, admin: true });

        assert_eq!(result, OperationResult::Unchanged);
        InvariantRegistry::standard().assert_all(&world.snapshot(), "after dropped role change");
    }

    /// Syncing twice changes nothing the second time.
    #[test]
    fn sync_is_idempotent() {
        let mut world = ModelWorld::new(2);
        world.apply(&Operation::SetTitle { device: 0, title: 1 });
        world.apply(&Operation::SetTimer { device: 0, preset: 2 });

        world.apply(&Operation::Sync { device: 1 });
        let once = world.device(1).unwrap().state().clone();
        world.apply(&Operation::Sync { device: 1 });

        assert_eq!(world.device(1).unwrap().state(), &once);
        assert_eq!(world.device(1).unwrap().revision_history(), &[0, 2]);
    }

    /// Recorded operation logs keep a readable JSON form.
    #[test]
    fn operation_log_is_readable_json() {
        let log = vec![
            Operation::SetTitle { device: 0, title: 3 },
            Operation::RefuseRequest { device: 2, account: 6, ban: true },
        ];

        insta::assert_json_snapshot!(log, @r#"
        [
          {
            "SetTitle": {
              "device": 0,
              "title": 3
            }
          },
          {
            "RefuseRequest": {
              "device": 2,
              "account": 6,
              "ban": true
            }
          }
        ]
        "#);
    }
}
