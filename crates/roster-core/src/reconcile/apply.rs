//! Decrypted-change applicator.
//!
//! [`apply`] turns a snapshot and a change-set into the next snapshot. It is
//! pure and atomic: work happens on a copy, and the copy is returned only if
//! every field applied.
//!
//! # Invariants
//!
//! - The result's revision is the change's revision (overwrite, not add)
//! - Additions are idempotent unions; deletions of absent entries are no-ops
//! - Role changes, profile key changes and join approvals that reference a
//!   missing entry (or carry no role) fail the whole change
//! - No identifier is both a full member and an ACI invite or join request
//!   afterwards

use roster_proto::{
    ApproveMember, BannedMember, GroupChangeSet, GroupSnapshot, Member, ModifyMemberRole,
    PendingMember, PendingMemberRemoval, RequestingMember, Role, ServiceId,
};
use tracing::warn;

use crate::error::NotAbleToApplyError;

/// Apply `change` to `snapshot`.
pub fn apply(
    snapshot: &GroupSnapshot,
    change: &GroupChangeSet,
) -> Result<GroupSnapshot, NotAbleToApplyError> {
    let GroupChangeSet {
        editor: _,
        revision,
        new_members,
        delete_members,
        modify_member_roles,
        modified_profile_keys,
        new_pending_members,
        delete_pending_members,
        promote_pending_members,
        new_title,
        new_avatar,
        new_timer,
        new_attribute_access,
        new_member_access,
        new_invite_link_access,
        new_requesting_members,
        delete_requesting_members,
        promote_requesting_members,
        new_invite_link_password,
        new_description,
        new_is_announcement_group,
        new_banned_members,
        delete_banned_members,
        promote_pending_pni_aci_members,
    } = change;

    let mut next = snapshot.clone();
    next.revision = *revision;

    for member in new_members {
        upsert_member(&mut next.members, member);
    }

    apply_delete_members(&mut next, delete_members);
    apply_modify_member_roles(&mut next, modify_member_roles)?;
    apply_modified_profile_keys(&mut next, modified_profile_keys)?;
    apply_new_pending_members(&mut next, new_pending_members);
    apply_delete_pending_members(&mut next, delete_pending_members);
    apply_promote_pending_members(&mut next, promote_pending_members);

    if let Some(title) = new_title {
        next.title.clone_from(title);
    }
    if let Some(avatar) = new_avatar {
        next.avatar.clone_from(avatar);
    }
    if let Some(timer) = new_timer {
        next.disappearing_messages_timer = *timer;
    }
    if let Some(access) = new_attribute_access {
        next.access_control.attributes = *access;
    }
    if let Some(access) = new_member_access {
        next.access_control.members = *access;
    }
    if let Some(access) = new_invite_link_access {
        next.access_control.add_from_invite_link = *access;
    }

    apply_new_requesting_members(&mut next, new_requesting_members);
    apply_delete_requesting_members(&mut next, delete_requesting_members);
    apply_promote_requesting_members(&mut next, promote_requesting_members, *revision)?;

    if let Some(password) = new_invite_link_password {
        next.invite_link_password.clone_from(password);
    }
    if let Some(description) = new_description {
        next.description.clone_from(description);
    }
    if let Some(state) = new_is_announcement_group {
        next.is_announcement_group = *state;
    }

    apply_new_banned_members(&mut next, new_banned_members);
    apply_delete_banned_members(&mut next, delete_banned_members);
    apply_promote_pending_pni_aci_members(&mut next, promote_pending_pni_aci_members);

    remove_pending_and_requesting_members_now_in_group(&mut next);

    Ok(next)
}

/// Apply `change` only if it directly follows `snapshot`.
///
/// Use this when consuming the server's change log in order; [`apply`] is for
/// merging where the revision is already known to be authoritative.
pub fn apply_sequential(
    snapshot: &GroupSnapshot,
    change: &GroupChangeSet,
) -> Result<GroupSnapshot, NotAbleToApplyError> {
    if snapshot.revision.checked_add(1) != Some(change.revision) {
        return Err(NotAbleToApplyError::RevisionGap {
            current: snapshot.revision,
            change: change.revision,
        });
    }
    apply(snapshot, change)
}

/// Replace the member with the same ACI in place, or append.
fn upsert_member(members: &mut Vec<Member>, member: &Member) {
    match members.iter_mut().find(|m| m.aci == member.aci) {
        Some(existing) => existing.clone_from(member),
        None => members.push(member.clone()),
    }
}

fn apply_delete_members(next: &mut GroupSnapshot, deleted: &[roster_proto::Aci]) {
    for aci in deleted {
        match next.members.iter().position(|m| m.aci == *aci) {
            Some(index) => {
                next.members.remove(index);
            },
            None => warn!(%aci, "deleted member not found in group"),
        }
    }
}

fn apply_modify_member_roles(
    next: &mut GroupSnapshot,
    modifications: &[ModifyMemberRole],
) -> Result<(), NotAbleToApplyError> {
    for modification in modifications {
        let aci = modification.aci;
        let member = next
            .members
            .iter_mut()
            .find(|m| m.aci == aci)
            .ok_or(NotAbleToApplyError::RoleChangeForNonMember { aci })?;
        if modification.role == Role::Unknown {
            return Err(NotAbleToApplyError::RoleChangeWithoutRole { aci });
        }
        member.role = modification.role;
    }
    Ok(())
}

fn apply_modified_profile_keys(
    next: &mut GroupSnapshot,
    modified: &[Member],
) -> Result<(), NotAbleToApplyError> {
    for update in modified {
        let aci = update.aci;
        let member = next
            .members
            .iter_mut()
            .find(|m| m.aci == aci)
            .ok_or(NotAbleToApplyError::ProfileKeyForNonMember { aci })?;
        member.profile_key.clone_from(&update.profile_key);
    }
    Ok(())
}

fn apply_new_pending_members(next: &mut GroupSnapshot, added: &[PendingMember]) {
    for pending in added {
        if !next.is_pending(pending.service_id) {
            next.pending_members.push(pending.clone());
        }
    }
}

fn apply_delete_pending_members(next: &mut GroupSnapshot, removals: &[PendingMemberRemoval]) {
    for removal in removals {
        let index = next.pending_members.iter().position(|p| {
            p.service_id == removal.service_id
                || (!removal.service_id_ciphertext.is_empty()
                    && p.service_id_ciphertext == removal.service_id_ciphertext)
        });
        match index {
            Some(index) => {
                next.pending_members.remove(index);
            },
            None => {
                warn!(service_id = %removal.service_id, "deleted pending member not found in group")
            },
        }
    }
}

fn apply_promote_pending_members(next: &mut GroupSnapshot, promoted: &[Member]) {
    for member in promoted {
        let service_id = ServiceId::Aci(member.aci);
        match next.pending_members.iter().position(|p| p.service_id == service_id) {
            Some(index) => {
                next.pending_members.remove(index);
            },
            None => warn!(aci = %member.aci, "promoted pending member not found in group"),
        }
        upsert_member(&mut next.members, member);
    }
}

fn apply_new_requesting_members(next: &mut GroupSnapshot, added: &[RequestingMember]) {
    for requesting in added {
        if !next.is_requesting(requesting.aci) {
            next.requesting_members.push(requesting.clone());
        }
    }
}

fn apply_delete_requesting_members(next: &mut GroupSnapshot, deleted: &[roster_proto::Aci]) {
    next.requesting_members.retain(|r| !deleted.contains(&r.aci));
}

fn apply_promote_requesting_members(
    next: &mut GroupSnapshot,
    approvals: &[ApproveMember],
    revision: u32,
) -> Result<(), NotAbleToApplyError> {
    for approval in approvals {
        let aci = approval.aci;
        let index = next
            .requesting_members
            .iter()
            .position(|r| r.aci == aci)
            .ok_or(NotAbleToApplyError::ApprovalForNonRequesting { aci })?;
        if approval.role == Role::Unknown {
            return Err(NotAbleToApplyError::ApprovalWithoutRole { aci });
        }

        let request = next.requesting_members.remove(index);
        let member = Member {
            aci,
            pni: None,
            role: approval.role,
            profile_key: request.profile_key,
            joined_at_revision: revision as i32,
        };
        upsert_member(&mut next.members, &member);
    }
    Ok(())
}

fn apply_new_banned_members(next: &mut GroupSnapshot, added: &[BannedMember]) {
    for banned in added {
        if !next.is_banned(banned.service_id) {
            next.banned_members.push(banned.clone());
        }
    }
}

fn apply_delete_banned_members(next: &mut GroupSnapshot, deleted: &[ServiceId]) {
    next.banned_members.retain(|b| !deleted.contains(&b.service_id));
}

fn apply_promote_pending_pni_aci_members(next: &mut GroupSnapshot, promoted: &[Member]) {
    for member in promoted {
        let index = member.pni.and_then(|pni| {
            let service_id = ServiceId::Pni(pni);
            next.pending_members.iter().position(|p| p.service_id == service_id)
        });
        match index {
            Some(index) => {
                next.pending_members.remove(index);
            },
            None => warn!(aci = %member.aci, "promoted pending PNI not found in group"),
        }
        upsert_member(&mut next.members, member);
    }
}

/// Full membership supersedes an outstanding invite or join request.
fn remove_pending_and_requesting_members_now_in_group(next: &mut GroupSnapshot) {
    let GroupSnapshot { members, pending_members, requesting_members, .. } = next;

    pending_members.retain(|p| {
        !members.iter().any(|m| {
            p.service_id == ServiceId::Aci(m.aci)
                || m.pni.is_some_and(|pni| p.service_id == ServiceId::Pni(pni))
        })
    });
    requesting_members.retain(|r| !members.iter().any(|m| m.aci == r.aci));
}
