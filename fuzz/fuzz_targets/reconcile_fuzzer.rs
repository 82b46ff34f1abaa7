//! Fuzz target for the reconciliation functions
//!
//! Builds a snapshot and a change over a small identifier pool, so that
//! overlaps between lists are common, and checks the algebra between
//! `apply`, `reconstruct` and `resolve_conflict`.
//!
//! # Invariants
//!
//! - `resolve_conflict` is idempotent and never adds entries
//! - A resolved change applies to the snapshot it was resolved against
//! - Reconstructing a snapshot against itself yields an empty change

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roster_core::{apply, is_empty, reconstruct, resolve_conflict};
use roster_proto::{
    Aci, BannedMember, GroupChangeSet, GroupSnapshot, Member, PendingMember, RequestingMember, Role,
    ServiceId,
};

#[derive(Debug, Arbitrary)]
struct Input {
    snapshot: FuzzSnapshot,
    change: FuzzChange,
}

#[derive(Debug, Arbitrary)]
struct FuzzSnapshot {
    members: Vec<(u8, bool)>,
    pending: Vec<u8>,
    requesting: Vec<u8>,
    banned: Vec<(u8, u8)>,
    title: u8,
}

#[derive(Debug, Arbitrary)]
struct FuzzChange {
    new_members: Vec<u8>,
    delete_members: Vec<u8>,
    new_pending: Vec<u8>,
    new_requesting: Vec<u8>,
    delete_requesting: Vec<u8>,
    new_bans: Vec<u8>,
    delete_bans: Vec<u8>,
    title: Option<u8>,
}

fn aci(n: u8) -> Aci {
    Aci::from_u128(u128::from(n % 6) + 1)
}

fn unique<T>(items: impl Iterator<Item = T>, key: impl Fn(&T, &T) -> bool) -> Vec<T> {
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.iter().any(|seen| key(seen, &item)) {
            out.push(item);
        }
    }
    out
}

impl FuzzSnapshot {
    fn build(&self) -> GroupSnapshot {
        let members = unique(
            self.members.iter().map(|(n, admin)| {
                let role = if *admin { Role::Administrator } else { Role::Default };
                Member::new(aci(*n)).with_role(role)
            }),
            |a, b| a.aci == b.aci,
        );
        let is_member = |n: &u8| members.iter().any(|m| m.aci == aci(*n));
        let pending = unique(
            self.pending
                .iter()
                .filter(|n| !is_member(n))
                .map(|n| PendingMember::new(aci(*n), aci(0))),
            |a, b| a.service_id == b.service_id,
        );
        let requesting = unique(
            self.requesting
                .iter()
                .filter(|n| !is_member(n))
                .map(|n| RequestingMember::new(aci(*n))),
            |a, b| a.aci == b.aci,
        );
        let banned = unique(
            self.banned.iter().map(|(n, t)| BannedMember::new(aci(*n), u64::from(*t))),
            |a, b| a.service_id == b.service_id,
        );

        GroupSnapshot {
            revision: 4,
            title: format!("title {}", self.title % 3),
            members,
            pending_members: pending,
            requesting_members: requesting,
            banned_members: banned,
            ..Default::default()
        }
    }
}

impl FuzzChange {
    fn build(&self, revision: u32) -> GroupChangeSet {
        GroupChangeSet {
            revision,
            new_members: self.new_members.iter().map(|n| Member::new(aci(*n))).collect(),
            delete_members: self.delete_members.iter().map(|n| aci(*n)).collect(),
            new_pending_members: self
                .new_pending
                .iter()
                .map(|n| PendingMember::new(aci(*n), aci(0)))
                .collect(),
            new_requesting_members: self
                .new_requesting
                .iter()
                .map(|n| RequestingMember::new(aci(*n)))
                .collect(),
            delete_requesting_members: self.delete_requesting.iter().map(|n| aci(*n)).collect(),
            new_banned_members: self.new_bans
                .iter()
                .map(|n| BannedMember::new(aci(*n), 9))
                .collect(),
            delete_banned_members: self.delete_bans
                .iter()
                .map(|n| ServiceId::Aci(aci(*n)))
                .collect(),
            new_title: self.title.map(|t| format!("title {}", t % 3)),
            ..Default::default()
        }
    }
}

fn entries(change: &GroupChangeSet) -> usize {
    change.new_members.len()
        + change.delete_members.len()
        + change.new_pending_members.len()
        + change.promote_pending_members.len()
        + change.new_requesting_members.len()
        + change.delete_requesting_members.len()
        + change.new_banned_members.len()
        + change.delete_banned_members.len()
        + usize::from(change.new_title.is_some())
}

fuzz_target!(|input: Input| {
    let snapshot = input.snapshot.build();
    let change = input.change.build(snapshot.revision + 1);

    let once = resolve_conflict(&snapshot, &change);
    assert_eq!(resolve_conflict(&snapshot, &once), once, "resolve is not idempotent");
    assert!(entries(&once) <= entries(&change), "resolve added entries");
    assert_eq!(once.revision, change.revision);

    let next = apply(&snapshot, &once).expect("resolved change applies");
    assert_eq!(next.revision, change.revision);
    assert!(is_empty(&reconstruct(&next, &next)));

    assert!(is_empty(&reconstruct(&snapshot, &snapshot)));
});
