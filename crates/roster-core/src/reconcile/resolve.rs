//! Conflict resolution against the latest known snapshot.
//!
//! A locally built change may have been prepared against a stale view of the
//! group. Before submission every entry is re-validated against the current
//! snapshot and classified once, producing a [`ConflictPlan`]. The same plan is
//! then applied to the decrypted change and, position by position, to the
//! encrypted wire actions, so the two representations cannot drift apart.
//!
//! # Invariants
//!
//! - Resolution is idempotent: resolving a resolved change changes nothing
//! - The invite link password is never dropped
//! - `new_members` and `new_requesting_members` entries whose ACI is already
//!   invited become `promote_pending_members` entries, appended after the kept
//!   promotions in their original order, once per ACI
//! - Membership and invites the same change removes do not make its other
//!   entries stale

use std::collections::{BTreeMap, HashMap, HashSet};

use roster_proto::{
    Aci, ChangeField, GroupChangeSet, GroupSnapshot, Member, Pni, Role, ServiceId,
    wire::{self, GroupChangeActions},
};
use tracing::debug;

use crate::error::ResolveError;

/// Decision for one entry of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Entry still has an effect.
    Keep,
    /// Entry is a no-op or impossible against the current snapshot.
    Drop,
    /// Entry targets an invited ACI and is resubmitted as a promotion.
    PromotePending,
}

/// Per-entry verdicts for one change against one snapshot.
///
/// Verdicts are indexed by field and by position within the field. Scalar
/// fields have zero or one verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictPlan {
    verdicts: BTreeMap<ChangeField, Vec<Verdict>>,
}

impl ConflictPlan {
    /// Classify every entry of `change` against `snapshot`.
    pub fn new(snapshot: &GroupSnapshot, change: &GroupChangeSet) -> Self {
        let index = SnapshotIndex::new(snapshot);
        let verdicts: BTreeMap<_, _> =
            ChangeField::ALL.iter().map(|&field| (field, index.judge(field, change))).collect();

        for (field, field_verdicts) in &verdicts {
            let dropped = field_verdicts.iter().filter(|v| **v == Verdict::Drop).count();
            let promoted = field_verdicts.iter().filter(|v| **v == Verdict::PromotePending).count();
            if dropped + promoted > 0 {
                debug!(field = field.number(), dropped, promoted, "resolved stale entries");
            }
        }

        Self { verdicts }
    }

    /// Verdicts for one field, in entry order.
    pub fn verdicts(&self, field: ChangeField) -> &[Verdict] {
        self.verdicts.get(&field).map_or(&[], Vec::as_slice)
    }

    /// True when nothing survives resolution.
    pub fn drops_everything(&self) -> bool {
        self.verdicts.values().flatten().all(|v| *v == Verdict::Drop)
    }

    /// Apply the plan to the change it was built from.
    ///
    /// Entries beyond the length the plan was built for are dropped.
    pub fn resolve_change(&self, change: &GroupChangeSet) -> GroupChangeSet {
        let GroupChangeSet {
            editor,
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

        let mut promotions =
            kept(self.verdicts(ChangeField::PromotePendingMembers), promote_pending_members);
        let added = promoted(self.verdicts(ChangeField::NewMembers), new_members).cloned();
        let approved =
            promoted(self.verdicts(ChangeField::NewRequestingMembers), new_requesting_members)
                .map(|request| Member {
                    aci: request.aci,
                    pni: None,
                    role: Role::Default,
                    profile_key: request.profile_key.clone(),
                    joined_at_revision: *revision as i32,
                });
        merge_promotions(&mut promotions, added.chain(approved), |m| m.aci);

        GroupChangeSet {
            editor: *editor,
            revision: *revision,
            new_members: kept(self.verdicts(ChangeField::NewMembers), new_members),
            delete_members: kept(self.verdicts(ChangeField::DeleteMembers), delete_members),
            modify_member_roles: kept(
                self.verdicts(ChangeField::ModifyMemberRoles),
                modify_member_roles,
            ),
            modified_profile_keys: kept(
                self.verdicts(ChangeField::ModifiedProfileKeys),
                modified_profile_keys,
            ),
            new_pending_members: kept(
                self.verdicts(ChangeField::NewPendingMembers),
                new_pending_members,
            ),
            delete_pending_members: kept(
                self.verdicts(ChangeField::DeletePendingMembers),
                delete_pending_members,
            ),
            promote_pending_members: promotions,
            new_title: kept_scalar(self.verdicts(ChangeField::NewTitle), new_title.as_ref()),
            new_avatar: kept_scalar(self.verdicts(ChangeField::NewAvatar), new_avatar.as_ref()),
            new_timer: kept_scalar(self.verdicts(ChangeField::NewTimer), new_timer.as_ref()),
            new_attribute_access: kept_scalar(
                self.verdicts(ChangeField::NewAttributeAccess),
                new_attribute_access.as_ref(),
            ),
            new_member_access: kept_scalar(
                self.verdicts(ChangeField::NewMemberAccess),
                new_member_access.as_ref(),
            ),
            new_invite_link_access: kept_scalar(
                self.verdicts(ChangeField::NewInviteLinkAccess),
                new_invite_link_access.as_ref(),
            ),
            new_requesting_members: kept(
                self.verdicts(ChangeField::NewRequestingMembers),
                new_requesting_members,
            ),
            delete_requesting_members: kept(
                self.verdicts(ChangeField::DeleteRequestingMembers),
                delete_requesting_members,
            ),
            promote_requesting_members: kept(
                self.verdicts(ChangeField::PromoteRequestingMembers),
                promote_requesting_members,
            ),
            new_invite_link_password: kept_scalar(
                self.verdicts(ChangeField::NewInviteLinkPassword),
                new_invite_link_password.as_ref(),
            ),
            new_description: kept_scalar(
                self.verdicts(ChangeField::NewDescription),
                new_description.as_ref(),
            ),
            new_is_announcement_group: kept_scalar(
                self.verdicts(ChangeField::NewIsAnnouncementGroup),
                new_is_announcement_group.as_ref(),
            ),
            new_banned_members: kept(
                self.verdicts(ChangeField::NewBannedMembers),
                new_banned_members,
            ),
            delete_banned_members: kept(
                self.verdicts(ChangeField::DeleteBannedMembers),
                delete_banned_members,
            ),
            promote_pending_pni_aci_members: kept(
                self.verdicts(ChangeField::PromotePendingPniAciMembers),
                promote_pending_pni_aci_members,
            ),
        }
    }

    /// Apply the plan to the wire actions encrypted from the planned change.
    ///
    /// Fails without producing anything if any field holds a different number
    /// of actions than the plan has verdicts for.
    pub fn resolve_actions(
        &self,
        actions: &GroupChangeActions,
    ) -> Result<GroupChangeActions, ResolveError> {
        for (field, encrypted) in action_lengths(actions) {
            let decrypted = self.verdicts(field).len();
            if decrypted != encrypted {
                return Err(ResolveError::PositionMismatch { field, decrypted, encrypted });
            }
        }

        let GroupChangeActions {
            source_service_id,
            revision,
            add_members,
            delete_members,
            modify_member_roles,
            modify_member_profile_keys,
            add_pending_members,
            delete_pending_members,
            promote_pending_members,
            modify_title,
            modify_avatar,
            modify_disappearing_messages_timer,
            modify_attributes_access,
            modify_member_access,
            modify_add_from_invite_link_access,
            add_requesting_members,
            delete_requesting_members,
            promote_requesting_members,
            modify_invite_link_password,
            modify_description,
            modify_announcements_only,
            add_banned_members,
            delete_banned_members,
            promote_pending_pni_aci_members,
        } = actions;

        let mut promotions =
            kept(self.verdicts(ChangeField::PromotePendingMembers), promote_pending_members);
        let added = promoted(self.verdicts(ChangeField::NewMembers), add_members)
            .map(|action| promotion_of(action.added.as_ref()));
        let approved =
            promoted(self.verdicts(ChangeField::NewRequestingMembers), add_requesting_members)
                .map(|action| promotion_of(action.added.as_ref()));
        merge_promotions(&mut promotions, added.chain(approved), |p| p.user_id.clone());

        Ok(GroupChangeActions {
            source_service_id: source_service_id.clone(),
            revision: *revision,
            add_members: kept(self.verdicts(ChangeField::NewMembers), add_members),
            delete_members: kept(self.verdicts(ChangeField::DeleteMembers), delete_members),
            modify_member_roles: kept(
                self.verdicts(ChangeField::ModifyMemberRoles),
                modify_member_roles,
            ),
            modify_member_profile_keys: kept(
                self.verdicts(ChangeField::ModifiedProfileKeys),
                modify_member_profile_keys,
            ),
            add_pending_members: kept(
                self.verdicts(ChangeField::NewPendingMembers),
                add_pending_members,
            ),
            delete_pending_members: kept(
                self.verdicts(ChangeField::DeletePendingMembers),
                delete_pending_members,
            ),
            promote_pending_members: promotions,
            modify_title: kept_scalar(self.verdicts(ChangeField::NewTitle), modify_title.as_ref()),
            modify_avatar: kept_scalar(
                self.verdicts(ChangeField::NewAvatar),
                modify_avatar.as_ref(),
            ),
            modify_disappearing_messages_timer: kept_scalar(
                self.verdicts(ChangeField::NewTimer),
                modify_disappearing_messages_timer.as_ref(),
            ),
            modify_attributes_access: kept_scalar(
                self.verdicts(ChangeField::NewAttributeAccess),
                modify_attributes_access.as_ref(),
            ),
            modify_member_access: kept_scalar(
                self.verdicts(ChangeField::NewMemberAccess),
                modify_member_access.as_ref(),
            ),
            modify_add_from_invite_link_access: kept_scalar(
                self.verdicts(ChangeField::NewInviteLinkAccess),
                modify_add_from_invite_link_access.as_ref(),
            ),
            add_requesting_members: kept(
                self.verdicts(ChangeField::NewRequestingMembers),
                add_requesting_members,
            ),
            delete_requesting_members: kept(
                self.verdicts(ChangeField::DeleteRequestingMembers),
                delete_requesting_members,
            ),
            promote_requesting_members: kept(
                self.verdicts(ChangeField::PromoteRequestingMembers),
                promote_requesting_members,
            ),
            modify_invite_link_password: kept_scalar(
                self.verdicts(ChangeField::NewInviteLinkPassword),
                modify_invite_link_password.as_ref(),
            ),
            modify_description: kept_scalar(
                self.verdicts(ChangeField::NewDescription),
                modify_description.as_ref(),
            ),
            modify_announcements_only: kept_scalar(
                self.verdicts(ChangeField::NewIsAnnouncementGroup),
                modify_announcements_only.as_ref(),
            ),
            add_banned_members: kept(
                self.verdicts(ChangeField::NewBannedMembers),
                add_banned_members,
            ),
            delete_banned_members: kept(
                self.verdicts(ChangeField::DeleteBannedMembers),
                delete_banned_members,
            ),
            promote_pending_pni_aci_members: kept(
                self.verdicts(ChangeField::PromotePendingPniAciMembers),
                promote_pending_pni_aci_members,
            ),
        })
    }
}

/// Drop the entries of `change` that are stale against `snapshot`.
pub fn resolve_conflict(snapshot: &GroupSnapshot, change: &GroupChangeSet) -> GroupChangeSet {
    ConflictPlan::new(snapshot, change).resolve_change(change)
}

/// Resolve a decrypted change together with the wire actions encrypted from it.
///
/// `actions` must be positionally aligned with `change`: entry `i` of every
/// list field encrypts entry `i` of the matching decrypted field.
pub fn resolve_conflict_with_actions(
    snapshot: &GroupSnapshot,
    change: &GroupChangeSet,
    actions: &GroupChangeActions,
) -> Result<(GroupChangeSet, GroupChangeActions), ResolveError> {
    let plan = ConflictPlan::new(snapshot, change);
    let resolved_actions = plan.resolve_actions(actions)?;
    Ok((plan.resolve_change(change), resolved_actions))
}

/// Lookup tables over the current snapshot.
struct SnapshotIndex<'a> {
    snapshot: &'a GroupSnapshot,
    members: HashMap<Aci, &'a Member>,
    member_pnis: HashMap<Pni, Aci>,
    pending: HashSet<ServiceId>,
    pending_ciphertexts: HashSet<&'a [u8]>,
    requesting: HashSet<Aci>,
    banned: HashSet<ServiceId>,
}

impl<'a> SnapshotIndex<'a> {
    fn new(snapshot: &'a GroupSnapshot) -> Self {
        Self {
            snapshot,
            members: snapshot.members.iter().map(|m| (m.aci, m)).collect(),
            member_pnis: snapshot
                .members
                .iter()
                .filter_map(|m| m.pni.map(|pni| (pni, m.aci)))
                .collect(),
            pending: snapshot.pending_members.iter().map(|p| p.service_id).collect(),
            pending_ciphertexts: snapshot
                .pending_members
                .iter()
                .map(|p| p.service_id_ciphertext.as_slice())
                .filter(|ct| !ct.is_empty())
                .collect(),
            requesting: snapshot.requesting_members.iter().map(|r| r.aci).collect(),
            banned: snapshot.banned_members.iter().map(|b| b.service_id).collect(),
        }
    }

    fn is_member(&self, aci: Aci) -> bool {
        self.members.contains_key(&aci)
    }

    fn is_invited(&self, aci: Aci) -> bool {
        self.pending.contains(&ServiceId::Aci(aci))
    }

    /// A full member the change does not also remove.
    fn stays_member(&self, aci: Aci, change: &GroupChangeSet) -> bool {
        self.is_member(aci) && !change.delete_members.contains(&aci)
    }

    /// An ACI invite the change does not also revoke.
    fn stays_invited(&self, aci: Aci, change: &GroupChangeSet) -> bool {
        let service_id = ServiceId::Aci(aci);
        self.pending.contains(&service_id)
            && !change.delete_pending_members.iter().any(|r| r.service_id == service_id)
    }

    /// The identifier belongs to a remaining full member, by ACI or by PNI.
    fn belongs_to_member(&self, service_id: ServiceId, change: &GroupChangeSet) -> bool {
        match service_id {
            ServiceId::Aci(aci) => self.stays_member(aci, change),
            ServiceId::Pni(pni) => {
                self.member_pnis.get(&pni).is_some_and(|aci| self.stays_member(*aci, change))
            },
        }
    }

    fn judge(&self, field: ChangeField, change: &GroupChangeSet) -> Vec<Verdict> {
        let snapshot = self.snapshot;
        let access = &snapshot.access_control;

        match field {
            ChangeField::NewMembers => change
                .new_members
                .iter()
                .map(|m| {
                    if self.is_member(m.aci) {
                        Verdict::Drop
                    } else if self.stays_invited(m.aci, change) {
                        Verdict::PromotePending
                    } else {
                        Verdict::Keep
                    }
                })
                .collect(),
            ChangeField::DeleteMembers => each(&change.delete_members, |aci| self.is_member(*aci)),
            ChangeField::ModifyMemberRoles => each(&change.modify_member_roles, |modification| {
                self.members.get(&modification.aci).is_some_and(|m| m.role != modification.role)
            }),
            ChangeField::ModifiedProfileKeys => each(&change.modified_profile_keys, |update| {
                self.members.get(&update.aci).is_some_and(|m| m.profile_key != update.profile_key)
            }),
            ChangeField::NewPendingMembers => each(&change.new_pending_members, |pending| {
                !self.pending.contains(&pending.service_id)
                    && !self.belongs_to_member(pending.service_id, change)
            }),
            ChangeField::DeletePendingMembers => each(&change.delete_pending_members, |removal| {
                self.pending.contains(&removal.service_id)
                    || (!removal.service_id_ciphertext.is_empty()
                        && self.pending_ciphertexts.contains(
                            removal.service_id_ciphertext.as_slice(),
                        ))
            }),
            ChangeField::PromotePendingMembers => {
                each(&change.promote_pending_members, |m| self.is_invited(m.aci))
            },
            ChangeField::NewTitle => changed(change.new_title.as_ref(), &snapshot.title),
            ChangeField::NewAvatar => changed(change.new_avatar.as_ref(), &snapshot.avatar),
            ChangeField::NewTimer => {
                changed(change.new_timer.as_ref(), &snapshot.disappearing_messages_timer)
            },
            ChangeField::NewAttributeAccess => {
                changed(change.new_attribute_access.as_ref(), &access.attributes)
            },
            ChangeField::NewMemberAccess => {
                changed(change.new_member_access.as_ref(), &access.members)
            },
            ChangeField::NewInviteLinkAccess => {
                changed(change.new_invite_link_access.as_ref(), &access.add_from_invite_link)
            },
            ChangeField::NewRequestingMembers => change
                .new_requesting_members
                .iter()
                .map(|r| {
                    if self.stays_member(r.aci, change) {
                        Verdict::Drop
                    } else if self.stays_invited(r.aci, change) {
                        Verdict::PromotePending
                    } else if self.requesting.contains(&r.aci) {
                        Verdict::Drop
                    } else {
                        Verdict::Keep
                    }
                })
                .collect(),
            ChangeField::DeleteRequestingMembers => {
                each(&change.delete_requesting_members, |aci| self.requesting.contains(aci))
            },
            ChangeField::PromoteRequestingMembers => {
                each(&change.promote_requesting_members, |approval| {
                    self.requesting.contains(&approval.aci)
                })
            },
            ChangeField::NewInviteLinkPassword => {
                change.new_invite_link_password.iter().map(|_| Verdict::Keep).collect()
            },
            ChangeField::NewDescription => {
                changed(change.new_description.as_ref(), &snapshot.description)
            },
            ChangeField::NewIsAnnouncementGroup => {
                changed(change.new_is_announcement_group.as_ref(), &snapshot.is_announcement_group)
            },
            ChangeField::NewBannedMembers => {
                each(&change.new_banned_members, |banned| !self.banned.contains(&banned.service_id))
            },
            ChangeField::DeleteBannedMembers => {
                each(&change.delete_banned_members, |id| self.banned.contains(id))
            },
            ChangeField::PromotePendingPniAciMembers => {
                each(&change.promote_pending_pni_aci_members, |m| {
                    !self.is_member(m.aci)
                        && m.pni.is_some_and(|pni| self.pending.contains(&ServiceId::Pni(pni)))
                })
            },
        }
    }
}

fn each<T>(items: &[T], keep: impl Fn(&T) -> bool) -> Vec<Verdict> {
    items.iter().map(|item| if keep(item) { Verdict::Keep } else { Verdict::Drop }).collect()
}

fn changed<T: PartialEq>(value: Option<&T>, current: &T) -> Vec<Verdict> {
    value.map(|v| if v == current { Verdict::Drop } else { Verdict::Keep }).into_iter().collect()
}

fn kept<T: Clone>(verdicts: &[Verdict], items: &[T]) -> Vec<T> {
    items
        .iter()
        .zip(verdicts)
        .filter(|(_, v)| **v == Verdict::Keep)
        .map(|(item, _)| item.clone())
        .collect()
}

fn promoted<'a, T>(verdicts: &'a [Verdict], items: &'a [T]) -> impl Iterator<Item = &'a T> {
    items.iter().zip(verdicts).filter(|(_, v)| **v == Verdict::PromotePending).map(|(item, _)| item)
}

/// Wire promotion carrying the same credentials as an add action.
fn promotion_of<'a, T>(added: Option<&'a T>) -> wire::PromotePendingMemberAction
where
    wire::PromotePendingMemberAction: From<&'a T>,
{
    added.map(wire::PromotePendingMemberAction::from).unwrap_or_default()
}

/// Append converted promotions for identities not already promoted.
fn merge_promotions<T, K: PartialEq>(
    promotions: &mut Vec<T>,
    converted: impl Iterator<Item = T>,
    key: impl Fn(&T) -> K,
) {
    for promotion in converted {
        let identity = key(&promotion);
        if !promotions.iter().any(|p| key(p) == identity) {
            promotions.push(promotion);
        }
    }
}

fn kept_scalar<T: Clone>(verdicts: &[Verdict], value: Option<&T>) -> Option<T> {
    value.filter(|_| verdicts.first() == Some(&Verdict::Keep)).cloned()
}

/// Number of wire actions per field; optional actions count as 0 or 1.
fn action_lengths(actions: &GroupChangeActions) -> [(ChangeField, usize); 22] {
    let GroupChangeActions {
        source_service_id: _,
        revision: _,
        add_members,
        delete_members,
        modify_member_roles,
        modify_member_profile_keys,
        add_pending_members,
        delete_pending_members,
        promote_pending_members,
        modify_title,
        modify_avatar,
        modify_disappearing_messages_timer,
        modify_attributes_access,
        modify_member_access,
        modify_add_from_invite_link_access,
        add_requesting_members,
        delete_requesting_members,
        promote_requesting_members,
        modify_invite_link_password,
        modify_description,
        modify_announcements_only,
        add_banned_members,
        delete_banned_members,
        promote_pending_pni_aci_members,
    } = actions;

    [
        (ChangeField::NewMembers, add_members.len()),
        (ChangeField::DeleteMembers, delete_members.len()),
        (ChangeField::ModifyMemberRoles, modify_member_roles.len()),
        (ChangeField::ModifiedProfileKeys, modify_member_profile_keys.len()),
        (ChangeField::NewPendingMembers, add_pending_members.len()),
        (ChangeField::DeletePendingMembers, delete_pending_members.len()),
        (ChangeField::PromotePendingMembers, promote_pending_members.len()),
        (ChangeField::NewTitle, usize::from(modify_title.is_some())),
        (ChangeField::NewAvatar, usize::from(modify_avatar.is_some())),
        (ChangeField::NewTimer, usize::from(modify_disappearing_messages_timer.is_some())),
        (ChangeField::NewAttributeAccess, usize::from(modify_attributes_access.is_some())),
        (ChangeField::NewMemberAccess, usize::from(modify_member_access.is_some())),
        (
            ChangeField::NewInviteLinkAccess,
            usize::from(modify_add_from_invite_link_access.is_some()),
        ),
        (ChangeField::NewRequestingMembers, add_requesting_members.len()),
        (ChangeField::DeleteRequestingMembers, delete_requesting_members.len()),
        (ChangeField::PromoteRequestingMembers, promote_requesting_members.len()),
        (ChangeField::NewInviteLinkPassword, usize::from(modify_invite_link_password.is_some())),
        (ChangeField::NewDescription, usize::from(modify_description.is_some())),
        (ChangeField::NewIsAnnouncementGroup, usize::from(modify_announcements_only.is_some())),
        (ChangeField::NewBannedMembers, add_banned_members.len()),
        (ChangeField::DeleteBannedMembers, delete_banned_members.len()),
        (ChangeField::PromotePendingPniAciMembers, promote_pending_pni_aci_members.len()),
    ]
}

#[cfg(test)]
mod tests {
    use roster_proto::{
        AccessRequired, BannedMember, ModifyMemberRole, PendingMember, PendingMemberRemoval,
        RequestingMember,
        wire::{
            AddMemberAction, AddRequestingMemberAction, DeleteMemberAction, ModifyTitleAction,
            PromotePendingMemberAction,
        },
    };

    use super::*;
    use crate::reconcile::empty::is_empty;

    fn aci(n: u128) -> Aci {
        Aci::from_u128(n)
    }

    fn pni(n: u128) -> Pni {
        Pni::from_u128(n)
    }

    fn member(n: u128) -> Member {
        Member::new(aci(n)).with_profile_key(vec![n as u8; 4])
    }

    fn group() -> GroupSnapshot {
        GroupSnapshot {
            revision: 10,
            title: "team".into(),
            members: vec![member(1), member(2).with_role(Role::Administrator)],
            pending_members: vec![
                PendingMember::new(aci(3), aci(1)),
                PendingMember::new(pni(4), aci(1)),
            ],
            requesting_members: vec![RequestingMember::new(aci(5))],
            banned_members: vec![BannedMember::new(aci(6), 100)],
            ..Default::default()
        }
    }

    #[test]
    fn adding_an_invited_member_becomes_a_promotion() {
        let change = GroupChangeSet { new_members: vec![member(3)], ..Default::default() };

        let resolved = resolve_conflict(&group(), &change);

        assert!(resolved.new_members.is_empty());
        assert_eq!(resolved.promote_pending_members, vec![member(3)]);
    }

    #[test]
    fn requesting_an_invited_member_becomes_a_promotion() {
        let request = RequestingMember { aci: aci(3), profile_key: vec![9; 4], timestamp: 7 };
        let change = GroupChangeSet {
            revision: 11,
            new_requesting_members: vec![request],
            ..Default::default()
        };

        let resolved = resolve_conflict(&group(), &change);

        assert!(resolved.new_requesting_members.is_empty());
        assert_eq!(
            resolved.promote_pending_members,
            vec![Member::new(aci(3)).with_profile_key(vec![9; 4]).with_joined_at(11)]
        );
    }

    #[test]
    fn conversions_follow_kept_promotions() {
        let mut snapshot = group();
        snapshot.pending_members.push(PendingMember::new(aci(7), aci(1)));
        let change = GroupChangeSet {
            new_members: vec![member(7)],
            promote_pending_members: vec![member(3)],
            ..Default::default()
        };

        let resolved = resolve_conflict(&snapshot, &change);

        assert_eq!(resolved.promote_pending_members, vec![member(3), member(7)]);
    }

    #[test]
    fn explicit_promotion_absorbs_a_matching_add() {
        let change = GroupChangeSet {
            new_members: vec![member(3)],
            promote_pending_members: vec![member(3)],
            ..Default::default()
        };

        let resolved = resolve_conflict(&group(), &change);

        assert!(resolved.new_members.is_empty());
        assert_eq!(resolved.promote_pending_members, vec![member(3)]);
        assert_eq!(resolve_conflict(&group(), &resolved), resolved);
    }

    #[test]
    fn stale_member_entries_are_dropped() {
        let change = GroupChangeSet {
            new_members: vec![member(1), member(9)],
            delete_members: vec![aci(2), aci(9)],
            modify_member_roles: vec![
                ModifyMemberRole { aci: aci(1), role: Role::Default },
                ModifyMemberRole { aci: aci(2), role: Role::Default },
                ModifyMemberRole { aci: aci(9), role: Role::Administrator },
            ],
            modified_profile_keys: vec![
                member(1),
                Member::new(aci(2)).with_profile_key(vec![0xee; 4]),
            ],
            ..Default::default()
        };

        let resolved = resolve_conflict(&group(), &change);

        assert_eq!(resolved.new_members, vec![member(9)]);
        assert_eq!(resolved.delete_members, vec![aci(2)]);
        assert_eq!(
            resolved.modify_member_roles,
            vec![ModifyMemberRole { aci: aci(2), role: Role::Default }],
        );
        assert_eq!(resolved.modified_profile_keys.len(), 1);
        assert_eq!(resolved.modified_profile_keys[0].aci, aci(2));
    }

    #[test]
    fn invites_for_members_and_existing_invites_are_dropped() {
        let change = GroupChangeSet {
            new_pending_members: vec![
                PendingMember::new(aci(1), aci(2)),
                PendingMember::new(aci(3), aci(2)),
                PendingMember::new(aci(8), aci(2)),
            ],
            delete_pending_members: vec![
                PendingMemberRemoval::new(pni(4)),
                PendingMemberRemoval::new(aci(9)),
            ],
            ..Default::default()
        };

        let resolved = resolve_conflict(&group(), &change);

        assert_eq!(resolved.new_pending_members, vec![PendingMember::new(aci(8), aci(2))]);
        assert_eq!(resolved.delete_pending_members, vec![PendingMemberRemoval::new(pni(4))]);
    }

    #[test]
    fn pending_removal_matches_by_ciphertext() {
        let mut snapshot = group();
        snapshot.pending_members[0].service_id_ciphertext = vec![0xab; 8];
        let removal = PendingMemberRemoval {
            service_id: ServiceId::Aci(Aci::UNKNOWN),
            service_id_ciphertext: vec![0xab; 8],
        };
        let change = GroupChangeSet { delete_pending_members: vec![removal], ..Default::default() };

        assert_eq!(resolve_conflict(&snapshot, &change).delete_pending_members.len(), 1);
    }

    #[test]
    fn unchanged_scalars_are_dropped() {
        let change = GroupChangeSet {
            new_title: Some("team".into()),
            new_description: Some("new".into()),
            new_timer: Some(0),
            new_member_access: Some(AccessRequired::Unknown),
            new_attribute_access: Some(AccessRequired::Administrator),
            ..Default::default()
        };

        let resolved = resolve_conflict(&group(), &change);

        assert_eq!(resolved.new_title, None);
        assert_eq!(resolved.new_description.as_deref(), Some("new"));
        assert_eq!(resolved.new_timer, None);
        assert_eq!(resolved.new_member_access, None);
        assert_eq!(resolved.new_attribute_access, Some(AccessRequired::Administrator));
    }

    #[test]
    fn password_rotation_is_never_dropped() {
        let mut snapshot = group();
        snapshot.invite_link_password = vec![1, 2, 3];
        let change =
            GroupChangeSet { new_invite_link_password: Some(vec![1, 2, 3]), ..Default::default() };

        assert_eq!(
            resolve_conflict(&snapshot, &change).new_invite_link_password,
            Some(vec![1, 2, 3]),
        );
    }

    #[test]
    fn pni_promotion_requires_pending_pni_and_non_member() {
        let change = GroupChangeSet {
            promote_pending_pni_aci_members: vec![
                member(1).with_pni(pni(4)),
                member(8).with_pni(pni(4)),
                member(9).with_pni(pni(99)),
                member(10),
            ],
            ..Default::default()
        };

        let resolved = resolve_conflict(&group(), &change);

        assert_eq!(resolved.promote_pending_pni_aci_members, vec![member(8).with_pni(pni(4))]);
    }

    #[test]
    fn bans_and_requests_are_checked() {
        let change = GroupChangeSet {
            new_banned_members: vec![BannedMember::new(aci(6), 1), BannedMember::new(aci(7), 1)],
            delete_banned_members: vec![ServiceId::Aci(aci(6)), ServiceId::Aci(aci(7))],
            new_requesting_members: vec![
                RequestingMember::new(aci(1)),
                RequestingMember::new(aci(5)),
            ],
            delete_requesting_members: vec![aci(5), aci(6)],
            ..Default::default()
        };

        let resolved = resolve_conflict(&group(), &change);

        assert_eq!(resolved.new_banned_members, vec![BannedMember::new(aci(7), 1)]);
        assert_eq!(resolved.delete_banned_members, vec![ServiceId::Aci(aci(6))]);
        assert!(resolved.new_requesting_members.is_empty());
        assert_eq!(resolved.delete_requesting_members, vec![aci(5)]);
    }

    #[test]
    fn fully_stale_change_resolves_to_empty() {
        let change = GroupChangeSet {
            editor: Some(ServiceId::Aci(aci(1))),
            revision: 11,
            new_members: vec![member(1)],
            delete_members: vec![aci(42)],
            new_title: Some("team".into()),
            ..Default::default()
        };

        let plan = ConflictPlan::new(&group(), &change);
        let resolved = plan.resolve_change(&change);

        assert!(plan.drops_everything());
        assert!(is_empty(&resolved));
        assert_eq!(resolved.editor, change.editor);
        assert_eq!(resolved.revision, 11);
    }

    #[test]
    fn wire_actions_mirror_the_decisions() {
        let change = GroupChangeSet {
            new_members: vec![member(1), member(3), member(9)],
            new_title: Some("team".into()),
            ..Default::default()
        };
        let add = |n: u8| AddMemberAction {
            added: Some(wire::Member {
                user_id: vec![n],
                profile_key: vec![n, n],
                ..Default::default()
            }),
            join_from_invite_link: false,
        };
        let actions = GroupChangeActions {
            revision: 11,
            add_members: vec![add(1), add(3), add(9)],
            modify_title: Some(ModifyTitleAction { title: vec![0xcc] }),
            ..Default::default()
        };

        let (resolved, resolved_actions) =
            resolve_conflict_with_actions(&group(), &change, &actions).unwrap();

        assert_eq!(resolved.new_members, vec![member(9)]);
        assert_eq!(resolved_actions.add_members, vec![add(9)]);
        assert_eq!(
            resolved_actions.promote_pending_members,
            vec![wire::PromotePendingMemberAction {
                presentation: vec![],
                user_id: vec![3],
                profile_key: vec![3, 3],
            }]
        );
        assert_eq!(resolved_actions.modify_title, None);
        assert_eq!(resolved_actions.revision, 11);
    }

    #[test]
    fn wire_requests_for_invited_members_become_promotions() {
        let request = RequestingMember { aci: aci(3), profile_key: vec![9; 4], timestamp: 7 };
        let change = GroupChangeSet {
            revision: 11,
            new_requesting_members: vec![request],
            ..Default::default()
        };
        let actions = GroupChangeActions {
            revision: 11,
            add_requesting_members: vec![AddRequestingMemberAction {
                added: Some(wire::RequestingMember {
                    user_id: vec![3],
                    profile_key: vec![9, 9],
                    presentation: vec![0xaa],
                    timestamp: 7,
                }),
            }],
            ..Default::default()
        };

        let (resolved, resolved_actions) =
            resolve_conflict_with_actions(&group(), &change, &actions).unwrap();

        assert!(resolved.new_requesting_members.is_empty());
        assert_eq!(
            resolved.promote_pending_members,
            vec![Member::new(aci(3)).with_profile_key(vec![9; 4]).with_joined_at(11)]
        );
        assert!(resolved_actions.add_requesting_members.is_empty());
        assert_eq!(
            resolved_actions.promote_pending_members,
            vec![PromotePendingMemberAction {
                presentation: vec![0xaa],
                user_id: vec![3],
                profile_key: vec![9, 9],
            }]
        );
    }

    #[test]
    fn wire_promotions_are_not_duplicated() {
        let change = GroupChangeSet {
            new_members: vec![member(3)],
            promote_pending_members: vec![member(3)],
            ..Default::default()
        };
        let promotion = PromotePendingMemberAction {
            presentation: vec![],
            user_id: vec![3],
            profile_key: vec![3],
        };
        let actions = GroupChangeActions {
            add_members: vec![AddMemberAction {
                added: Some(wire::Member {
                    user_id: vec![3],
                    profile_key: vec![3],
                    ..Default::default()
                }),
                join_from_invite_link: false,
            }],
            promote_pending_members: vec![promotion.clone()],
            ..Default::default()
        };

        let (resolved, resolved_actions) =
            resolve_conflict_with_actions(&group(), &change, &actions).unwrap();

        assert_eq!(resolved.promote_pending_members, vec![member(3)]);
        assert!(resolved_actions.add_members.is_empty());
        assert_eq!(resolved_actions.promote_pending_members, vec![promotion]);
    }

    #[test]
    fn misaligned_actions_are_rejected() {
        let change = GroupChangeSet { delete_members: vec![aci(1), aci(2)], ..Default::default() };
        let actions = GroupChangeActions {
            delete_members: vec![DeleteMemberAction { deleted_user_id: vec![1] }],
            ..Default::default()
        };

        let result = resolve_conflict_with_actions(&group(), &change, &actions);

        assert_eq!(
            result,
            Err(ResolveError::PositionMismatch {
                field: ChangeField::DeleteMembers,
                decrypted: 2,
                encrypted: 1,
            })
        );
    }

    #[test]
    fn resolving_twice_changes_nothing() {
        let change = GroupChangeSet {
            new_members: vec![member(1), member(3), member(9)],
            new_requesting_members: vec![RequestingMember::new(aci(3))],
            delete_requesting_members: vec![aci(5)],
            ..Default::default()
        };

        let once = resolve_conflict(&group(), &change);
        let twice = resolve_conflict(&group(), &once);

        assert_eq!(once, twice);
    }
}
