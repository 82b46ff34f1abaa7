//! Builders for the changes a member can propose.
//!
//! Each builder returns the decrypted intent. Pass it to
//! [`GroupOperations::propose`] to obtain the wire actions, and resolve the
//! result against the latest snapshot before submitting.

use roster_proto::{
    AccessRequired, Aci, ApproveMember, BannedMember, EnabledState, GroupChangeSet, Member,
    ModifyMemberRole, PendingMember, PendingMemberRemoval, Pni, RequestingMember, Role, ServiceId,
};

use super::GroupOperations;
use crate::bans::plan_bans;

/// Someone to add to a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCandidate {
    /// Who to add.
    pub service_id: ServiceId,
    /// Known profile key. Candidates without one (or addressed by PNI) are
    /// invited rather than added.
    pub profile_key: Option<Vec<u8>>,
}

impl GroupCandidate {
    /// Candidate with a known profile key.
    pub fn with_profile_key(aci: Aci, profile_key: impl Into<Vec<u8>>) -> Self {
        Self { service_id: ServiceId::Aci(aci), profile_key: Some(profile_key.into()) }
    }

    /// Candidate that can only be invited.
    pub fn invitee(service_id: impl Into<ServiceId>) -> Self {
        Self { service_id: service_id.into(), profile_key: None }
    }
}

impl GroupOperations {
    /// Rename the group.
    pub fn change_title(&self, title: impl Into<String>) -> GroupChangeSet {
        GroupChangeSet { new_title: Some(title.into()), ..Default::default() }
    }

    /// Replace the group description.
    pub fn change_description(&self, description: impl Into<String>) -> GroupChangeSet {
        GroupChangeSet { new_description: Some(description.into()), ..Default::default() }
    }

    /// Point the group at a new avatar upload.
    pub fn change_avatar(&self, avatar: impl Into<String>) -> GroupChangeSet {
        GroupChangeSet { new_avatar: Some(avatar.into()), ..Default::default() }
    }

    /// Set the disappearing messages timer, in seconds. Zero disables it.
    pub fn change_timer(&self, seconds: u32) -> GroupChangeSet {
        GroupChangeSet { new_timer: Some(seconds), ..Default::default() }
    }

    /// Change one member's role.
    pub fn change_member_role(&self, aci: Aci, role: Role) -> GroupChangeSet {
        GroupChangeSet {
            modify_member_roles: vec![ModifyMemberRole { aci, role }],
            ..Default::default()
        }
    }

    /// Publish the editor's current profile key.
    pub fn update_profile_key(&self, aci: Aci, profile_key: impl Into<Vec<u8>>) -> GroupChangeSet {
        GroupChangeSet {
            modified_profile_keys: vec![Member::new(aci).with_profile_key(profile_key)],
            ..Default::default()
        }
    }

    /// Add or invite `candidates`, lifting any ban on them first.
    ///
    /// Candidates with a profile key and an ACI join directly; everyone else
    /// is invited by `inviter`.
    pub fn add_members(
        &self,
        candidates: &[GroupCandidate],
        banned: &[BannedMember],
        inviter: Aci,
        timestamp: u64,
    ) -> GroupChangeSet {
        let mut change = GroupChangeSet::default();

        for candidate in candidates {
            if banned.iter().any(|b| b.service_id == candidate.service_id) {
                change.delete_banned_members.push(candidate.service_id);
            }

            match (candidate.service_id, &candidate.profile_key) {
                (ServiceId::Aci(aci), Some(profile_key)) => {
                    change.new_members.push(Member::new(aci).with_profile_key(profile_key.clone()));
                },
                (service_id, _) => {
                    let mut invite = PendingMember::new(service_id, inviter);
                    invite.timestamp = timestamp;
                    change.new_pending_members.push(invite);
                },
            }
        }

        change
    }

    /// Ask to join through the invite link.
    pub fn join_request(
        &self,
        aci: Aci,
        profile_key: impl Into<Vec<u8>>,
        timestamp: u64,
    ) -> GroupChangeSet {
        GroupChangeSet {
            new_requesting_members: vec![
                RequestingMember { aci, profile_key: profile_key.into(), timestamp },
            ],
            ..Default::default()
        }
    }

    /// Join through an invite link that needs no approval.
    pub fn join_direct(&self, aci: Aci, profile_key: impl Into<Vec<u8>>) -> GroupChangeSet {
        GroupChangeSet {
            new_members: vec![Member::new(aci).with_profile_key(profile_key)],
            ..Default::default()
        }
    }

    /// Approve join requests as regular members.
    pub fn approve_join_requests(&self, requests: &[Aci]) -> GroupChangeSet {
        GroupChangeSet {
            promote_requesting_members: requests
                .iter()
                .map(|aci| ApproveMember { aci: *aci, role: Role::Default })
                .collect(),
            ..Default::default()
        }
    }

    /// Refuse join requests, optionally banning the requesters.
    pub fn refuse_join_requests(
        &self,
        requests: &[ServiceId],
        also_ban: bool,
        banned: &[BannedMember],
        timestamp: u64,
    ) -> GroupChangeSet {
        let mut change = if also_ban {
            self.ban(requests, false, banned, timestamp)
        } else {
            GroupChangeSet::default()
        };
        change.delete_requesting_members.extend(requests.iter().filter_map(|id| id.aci()));
        change
    }

    /// Remove members, optionally banning them.
    pub fn remove_members(
        &self,
        members: &[Aci],
        also_ban: bool,
        banned: &[BannedMember],
        timestamp: u64,
    ) -> GroupChangeSet {
        let mut change = if also_ban {
            let ids: Vec<ServiceId> = members.iter().map(|aci| ServiceId::Aci(*aci)).collect();
            self.ban(&ids, false, banned, timestamp)
        } else {
            GroupChangeSet::default()
        };
        change.delete_members.extend_from_slice(members);
        change
    }

    /// Leave the group, handing administration to `new_admins`.
    pub fn leave_and_promote_to_admin(&self, leaver: Aci, new_admins: &[Aci]) -> GroupChangeSet {
        GroupChangeSet {
            delete_members: vec![leaver],
            modify_member_roles: new_admins
                .iter()
                .map(|aci| ModifyMemberRole { aci: *aci, role: Role::Administrator })
                .collect(),
            ..Default::default()
        }
    }

    /// Accept an invite addressed to the editor's ACI.
    pub fn accept_invite(&self, aci: Aci, profile_key: impl Into<Vec<u8>>) -> GroupChangeSet {
        GroupChangeSet {
            promote_pending_members: vec![Member::new(aci).with_profile_key(profile_key)],
            ..Default::default()
        }
    }

    /// Accept an invite addressed to the editor's PNI, revealing their ACI.
    pub fn accept_pni_invite(
        &self,
        aci: Aci,
        pni: Pni,
        profile_key: impl Into<Vec<u8>>,
    ) -> GroupChangeSet {
        GroupChangeSet {
            editor: Some(ServiceId::Aci(aci)),
            promote_pending_pni_aci_members: vec![
                Member::new(aci).with_pni(pni).with_profile_key(profile_key),
            ],
            ..Default::default()
        }
    }

    /// Revoke outstanding invites, or decline one's own.
    pub fn revoke_invites(&self, invites: &[PendingMember]) -> GroupChangeSet {
        GroupChangeSet {
            delete_pending_members: invites
                .iter()
                .map(|invite| PendingMemberRemoval {
                    service_id: invite.service_id,
                    service_id_ciphertext: invite.service_id_ciphertext.clone(),
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Rotate the invite link password.
    pub fn rotate_invite_link_password(&self, password: impl Into<Vec<u8>>) -> GroupChangeSet {
        GroupChangeSet { new_invite_link_password: Some(password.into()), ..Default::default() }
    }

    /// Rotate the invite link password and set who may join through it.
    pub fn rotate_invite_link_password_and_access(
        &self,
        password: impl Into<Vec<u8>>,
        access: AccessRequired,
    ) -> GroupChangeSet {
        GroupChangeSet {
            new_invite_link_password: Some(password.into()),
            new_invite_link_access: Some(access),
            ..Default::default()
        }
    }

    /// Set who may join through the invite link.
    pub fn change_invite_link_access(&self, access: AccessRequired) -> GroupChangeSet {
        GroupChangeSet { new_invite_link_access: Some(access), ..Default::default() }
    }

    /// Set who may add members.
    pub fn change_member_access(&self, access: AccessRequired) -> GroupChangeSet {
        GroupChangeSet { new_member_access: Some(access), ..Default::default() }
    }

    /// Set who may edit title, avatar, description and timer.
    pub fn change_attribute_access(&self, access: AccessRequired) -> GroupChangeSet {
        GroupChangeSet { new_attribute_access: Some(access), ..Default::default() }
    }

    /// Restrict sending to administrators, or lift the restriction.
    pub fn set_announcement_only(&self, enabled: bool) -> GroupChangeSet {
        GroupChangeSet {
            new_is_announcement_group: Some(EnabledState::from_flag(enabled)),
            ..Default::default()
        }
    }

    /// Ban `service_ids`, evicting the oldest bans when the list is full.
    ///
    /// With `reject_join_request`, pending join requests from the banned ACIs
    /// are refused in the same change.
    pub fn ban(
        &self,
        service_ids: &[ServiceId],
        reject_join_request: bool,
        banned: &[BannedMember],
        timestamp: u64,
    ) -> GroupChangeSet {
        let plan = plan_bans(banned, service_ids, timestamp, self.config.max_banned_members);

        let mut change = GroupChangeSet::default();
        if reject_join_request {
            change.delete_requesting_members.extend(service_ids.iter().filter_map(|id| id.aci()));
        }
        change.delete_banned_members = plan.evict;
        change.new_banned_members = plan.add;
        change
    }

    /// Lift bans on `service_ids`.
    pub fn unban(&self, service_ids: &[ServiceId]) -> GroupChangeSet {
        GroupChangeSet { delete_banned_members: service_ids.to_vec(), ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use roster_crypto::GroupMasterKey;

    use super::*;
    use crate::config::EngineConfig;

    fn aci(n: u128) -> Aci {
        Aci::from_u128(n)
    }

    fn ops(max_banned_members: usize) -> GroupOperations {
        GroupOperations::new(
            &GroupMasterKey::new([3; 32]),
            EngineConfig { max_banned_members, ..EngineConfig::default() },
        )
    }

    #[test]
    fn candidates_split_into_members_and_invites() {
        let pni = Pni::from_u128(20);
        let candidates = [
            GroupCandidate::with_profile_key(aci(1), vec![1; 4]),
            GroupCandidate::invitee(aci(2)),
            GroupCandidate::invitee(pni),
        ];

        let change = ops(10).add_members(&candidates, &[], aci(9), 77);

        assert_eq!(change.new_members, vec![Member::new(aci(1)).with_profile_key(vec![1; 4])]);
        assert_eq!(change.new_pending_members.len(), 2);
        assert_eq!(change.new_pending_members[1].service_id, ServiceId::Pni(pni));
        assert_eq!(change.new_pending_members[1].added_by, aci(9));
        assert_eq!(change.new_pending_members[1].timestamp, 77);
        assert!(change.delete_banned_members.is_empty());
    }

    #[test]
    fn adding_a_banned_candidate_unbans_it() {
        let banned = [BannedMember::new(aci(1), 5)];

        let change = ops(10).add_members(&[GroupCandidate::invitee(aci(1))], &banned, aci(9), 6);

        assert_eq!(change.delete_banned_members, vec![ServiceId::Aci(aci(1))]);
    }

    #[test]
    fn banning_into_a_full_list_pairs_evictions() {
        let banned: Vec<BannedMember> =
            (0..10).map(|n| BannedMember::new(aci(100 + n), (n as u64 * 7) % 10)).collect();

        let change = ops(10).ban(&[ServiceId::Aci(aci(1))], false, &banned, 50);

        assert_eq!(change.new_banned_members.len(), 1);
        assert_eq!(change.delete_banned_members, vec![ServiceId::Aci(aci(100))]);
    }

    #[test]
    fn refusal_with_ban_removes_request_and_bans() {
        let change = ops(10).refuse_join_requests(&[ServiceId::Aci(aci(4))], true, &[], 8);

        assert_eq!(change.delete_requesting_members, vec![aci(4)]);
        assert_eq!(change.new_banned_members, vec![BannedMember::new(aci(4), 8)]);
    }

    #[test]
    fn plain_refusal_only_removes_request() {
        let change = ops(10).refuse_join_requests(&[ServiceId::Aci(aci(4))], false, &[], 8);

        assert_eq!(change.delete_requesting_members, vec![aci(4)]);
        assert!(change.new_banned_members.is_empty());
    }

    #[test]
    fn removal_with_ban() {
        let change = ops(10).remove_members(&[aci(1), aci(2)], true, &[], 3);

        assert_eq!(change.delete_members, vec![aci(1), aci(2)]);
        assert_eq!(change.new_banned_members.len(), 2);
    }

    #[test]
    fn ban_with_rejection_refuses_pending_request() {
        let change =
            ops(10).ban(&[ServiceId::Aci(aci(4)), ServiceId::Pni(Pni::from_u128(5))], true, &[], 1);

        assert_eq!(change.delete_requesting_members, vec![aci(4)]);
        assert_eq!(change.new_banned_members.len(), 2);
    }

    #[test]
    fn proposals_stay_aligned() {
        let ops = ops(10);
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let proposed =
            ops.propose(ops.leave_and_promote_to_admin(aci(1), &[aci(2), aci(3)]), &mut rng);

        assert_eq!(proposed.actions.delete_members.len(), 1);
        assert_eq!(proposed.actions.modify_member_roles.len(), 2);
        assert_eq!(proposed.actions.modify_member_roles[0].role, Role::Administrator as i32);
    }
}
