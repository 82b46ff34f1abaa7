//! Change reconstruction from two snapshots.
//!
//! [`reconstruct`] explains the difference between two snapshots as a change
//! that [`apply`](super::apply::apply) can replay. It is used when the
//! authoritative end state is known (a server snapshot, or a locally edited
//! copy) but the change that led there is not.
//!
//! Lists are compared by identifier. Additions follow the order of `to`,
//! removals the order of `from`.
//!
//! # Invariants
//!
//! - `apply(from, reconstruct(from, to))` equals `to` on every field, up to
//!   list order, whenever `to` is reachable from `from` through legal edits
//! - A new member whose ACI (or PNI) was invited in `from` is a promotion,
//!   never a bare addition
//! - The result never names an editor

use std::collections::{HashMap, HashSet};

use roster_proto::{
    AccessControl, Aci, ApproveMember, GroupChangeSet, GroupSnapshot, Member, ModifyMemberRole,
    PendingMemberRemoval, RequestingMember, Role, ServiceId,
};

/// Smallest change that turns `from` into `to`.
pub fn reconstruct(from: &GroupSnapshot, to: &GroupSnapshot) -> GroupChangeSet {
    let GroupSnapshot {
        revision,
        title,
        description,
        avatar,
        disappearing_messages_timer,
        access_control,
        members: _,
        pending_members: _,
        requesting_members: _,
        banned_members: _,
        invite_link_password,
        is_announcement_group,
    } = to;
    let AccessControl { attributes, members: member_access, add_from_invite_link } = access_control;

    let mut change = GroupChangeSet::at_revision(*revision);

    change.new_title = differs(&from.title, title);
    change.new_description = differs(&from.description, description);
    change.new_avatar = differs(&from.avatar, avatar);
    change.new_timer = differs(&from.disappearing_messages_timer, disappearing_messages_timer);
    change.new_attribute_access = differs(&from.access_control.attributes, attributes);
    change.new_member_access = differs(&from.access_control.members, member_access);
    change.new_invite_link_access = differs(
        &from.access_control.add_from_invite_link,
        add_from_invite_link,
    );
    change.new_invite_link_password = differs(&from.invite_link_password, invite_link_password);
    change.new_is_announcement_group = differs(&from.is_announcement_group, is_announcement_group);

    reconstruct_members(from, to, &mut change);
    reconstruct_pending_members(from, to, &mut change);
    reconstruct_requesting_members(from, to, &mut change);
    reconstruct_banned_members(from, to, &mut change);

    change
}

fn differs<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| new.clone())
}

fn reconstruct_members(from: &GroupSnapshot, to: &GroupSnapshot, change: &mut GroupChangeSet) {
    let old_members: HashMap<Aci, &Member> = from.members.iter().map(|m| (m.aci, m)).collect();
    let new_members: HashSet<Aci> = to.members.iter().map(|m| m.aci).collect();

    for member in &to.members {
        if let Some(old) = old_members.get(&member.aci) {
            if old.role != member.role {
                change.modify_member_roles.push(ModifyMemberRole {
                    aci: member.aci,
                    role: member.role,
                });
            }
            if old.profile_key != member.profile_key {
                change.modified_profile_keys.push(member.clone());
            }
        } else if from.is_pending(ServiceId::Aci(member.aci)) {
            change.promote_pending_members.push(member.clone());
        } else if member.pni.is_some_and(|pni| from.is_pending(ServiceId::Pni(pni))) {
            change.promote_pending_pni_aci_members.push(member.clone());
        } else if let Some(request) = from
            .find_requesting_member(member.aci)
            .filter(|r| approval_reproduces(r, member, to.revision))
        {
            change.promote_requesting_members.push(ApproveMember {
                aci: request.aci,
                role: member.role,
            });
        } else {
            change.new_members.push(member.clone());
        }
    }

    change.delete_members =
        from.members.iter().map(|m| m.aci).filter(|aci| !new_members.contains(aci)).collect();
}

/// Approving `request` at `revision` yields exactly `member`.
///
/// Otherwise the member is re-added in full so that its fields survive the
/// round trip.
fn approval_reproduces(request: &RequestingMember, member: &Member, revision: u32) -> bool {
    member.role != Role::Unknown
        && member.pni.is_none()
        && member.profile_key == request.profile_key
        && member.joined_at_revision == revision as i32
}

fn reconstruct_pending_members(
    from: &GroupSnapshot,
    to: &GroupSnapshot,
    change: &mut GroupChangeSet,
) {
    let old_pending: HashSet<ServiceId> =
        from.pending_members.iter().map(|p| p.service_id).collect();
    let new_pending: HashSet<ServiceId> = to.pending_members.iter().map(|p| p.service_id).collect();
    let promoted: HashSet<ServiceId> = change
        .promote_pending_members
        .iter()
        .map(|m| ServiceId::Aci(m.aci))
        .chain(
            change.promote_pending_pni_aci_members.iter().filter_map(|m| m.pni.map(ServiceId::Pni)),
        )
        .collect();

    change.new_pending_members = to
        .pending_members
        .iter()
        .filter(|p| !old_pending.contains(&p.service_id))
        .cloned()
        .collect();
    change.delete_pending_members = from
        .pending_members
        .iter()
        .filter(|p| !new_pending.contains(&p.service_id) && !promoted.contains(&p.service_id))
        .map(|p| PendingMemberRemoval {
            service_id: p.service_id,
            service_id_ciphertext: p.service_id_ciphertext.clone(),
        })
        .collect();
}

fn reconstruct_requesting_members(
    from: &GroupSnapshot,
    to: &GroupSnapshot,
    change: &mut GroupChangeSet,
) {
    change.new_requesting_members =
        to.requesting_members.iter().filter(|r| !from.is_requesting(r.aci)).cloned().collect();

    // Requests that turned into membership are cleared by the apply itself.
    change.delete_requesting_members = from
        .requesting_members
        .iter()
        .map(|r| r.aci)
        .filter(|aci| !to.is_requesting(*aci) && !to.is_member(*aci))
        .collect();
}

fn reconstruct_banned_members(
    from: &GroupSnapshot,
    to: &GroupSnapshot,
    change: &mut GroupChangeSet,
) {
    change.new_banned_members =
        to.banned_members.iter().filter(|b| !from.is_banned(b.service_id)).cloned().collect();
    change.delete_banned_members =
        from.banned_members.iter().map(|b| b.service_id).filter(|id| !to.is_banned(*id)).collect();
}

#[cfg(test)]
mod tests {
    use roster_proto::{AccessRequired, BannedMember, EnabledState, PendingMember, Pni};

    use super::*;
    use crate::reconcile::{apply::apply, empty::is_empty};

    fn aci(n: u128) -> Aci {
        Aci::from_u128(n)
    }

    fn member(n: u128) -> Member {
        Member::new(aci(n)).with_profile_key(vec![n as u8; 4])
    }

    fn base() -> GroupSnapshot {
        GroupSnapshot {
            revision: 5,
            title: "old".into(),
            members: vec![member(1), member(2)],
            pending_members: vec![PendingMember::new(aci(3), aci(1))],
            requesting_members: vec![
                RequestingMember { aci: aci(4), profile_key: vec![4; 4], timestamp: 1 },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn identical_snapshots_produce_empty_change() {
        let change = reconstruct(&base(), &base());

        assert!(is_empty(&change));
        assert_eq!(change.revision, 5);
        assert_eq!(change.editor, None);
    }

    #[test]
    fn scalar_differences() {
        let mut to = base();
        to.revision = 6;
        to.title = "new".into();
        to.disappearing_messages_timer = 60;
        to.access_control.members = AccessRequired::Administrator;
        to.is_announcement_group = EnabledState::Enabled;

        let change = reconstruct(&base(), &to);

        assert_eq!(change.new_title.as_deref(), Some("new"));
        assert_eq!(change.new_timer, Some(60));
        assert_eq!(change.new_member_access, Some(AccessRequired::Administrator));
        assert_eq!(change.new_attribute_access, None);
        assert_eq!(change.new_is_announcement_group, Some(EnabledState::Enabled));
        assert_eq!(change.new_description, None);
    }

    #[test]
    fn member_in_both_can_change_role_and_key() {
        let mut to = base();
        to.members[0] = member(1).with_role(Role::Administrator).with_profile_key(vec![0xaa; 4]);

        let change = reconstruct(&base(), &to);

        assert_eq!(
            change.modify_member_roles,
            vec![ModifyMemberRole { aci: aci(1), role: Role::Administrator }]
        );
        assert_eq!(change.modified_profile_keys, vec![to.members[0].clone()]);
        assert!(change.new_members.is_empty());
    }

    #[test]
    fn invited_member_joining_is_a_promotion() {
        let mut to = base();
        to.pending_members.clear();
        to.members.push(member(3));

        let change = reconstruct(&base(), &to);

        assert_eq!(change.promote_pending_members, vec![member(3)]);
        assert!(change.new_members.is_empty());
        assert!(change.delete_pending_members.is_empty());
        assert_eq!(apply(&base(), &change).unwrap(), to);
    }

    #[test]
    fn pni_invite_accepted_with_aci() {
        let pni = Pni::from_u128(30);
        let mut from = base();
        from.pending_members.push(PendingMember::new(pni, aci(1)));
        let mut to = from.clone();
        to.pending_members.retain(|p| p.service_id != ServiceId::Pni(pni));
        to.members.push(member(31).with_pni(pni));

        let change = reconstruct(&from, &to);

        assert_eq!(change.promote_pending_pni_aci_members, vec![member(31).with_pni(pni)]);
        assert!(change.delete_pending_members.is_empty());
        assert_eq!(apply(&from, &change).unwrap(), to);
    }

    #[test]
    fn approved_request_is_a_promotion() {
        let mut to = base();
        to.revision = 6;
        to.requesting_members.clear();
        to.members.push(Member::new(aci(4)).with_profile_key(vec![4; 4]).with_joined_at(6));

        let change = reconstruct(&base(), &to);

        assert_eq!(
            change.promote_requesting_members,
            vec![ApproveMember { aci: aci(4), role: Role::Default }]
        );
        assert!(change.delete_requesting_members.is_empty());
        assert_eq!(apply(&base(), &change).unwrap(), to);
    }

    #[test]
    fn request_superseded_by_a_different_member_record_is_an_addition() {
        let mut to = base();
        to.revision = 6;
        to.requesting_members.clear();
        to.members.push(Member::new(aci(4)).with_profile_key(vec![9; 4]).with_joined_at(6));

        let change = reconstruct(&base(), &to);

        assert!(change.promote_requesting_members.is_empty());
        assert_eq!(change.new_members.len(), 1);
        assert_eq!(apply(&base(), &change).unwrap(), to);
    }

    #[test]
    fn removals_follow_from_order() {
        let mut to = base();
        to.members.clear();
        to.pending_members.clear();
        to.requesting_members.clear();

        let change = reconstruct(&base(), &to);

        assert_eq!(change.delete_members, vec![aci(1), aci(2)]);
        assert_eq!(change.delete_pending_members, vec![PendingMemberRemoval::new(aci(3))]);
        assert_eq!(change.delete_requesting_members, vec![aci(4)]);
        assert_eq!(apply(&base(), &change).unwrap(), to);
    }

    #[test]
    fn ban_and_unban() {
        let mut from = base();
        from.banned_members.push(BannedMember::new(aci(8), 1));
        let mut to = from.clone();
        to.banned_members = vec![BannedMember::new(aci(9), 2)];

        let change = reconstruct(&from, &to);

        assert_eq!(change.new_banned_members, vec![BannedMember::new(aci(9), 2)]);
        assert_eq!(change.delete_banned_members, vec![ServiceId::Aci(aci(8))]);
        assert_eq!(apply(&from, &change).unwrap(), to);
    }

    #[test]
    fn pending_removal_carries_ciphertext() {
        let mut from = base();
        from.pending_members[0].service_id_ciphertext = vec![7; 56];
        let mut to = from.clone();
        to.pending_members.clear();

        let change = reconstruct(&from, &to);

        assert_eq!(change.delete_pending_members[0].service_id_ciphertext, vec![7; 56]);
    }
}
