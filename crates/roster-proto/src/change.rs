//! Decrypted change-sets.
//!
//! A [`GroupChangeSet`] is a sparse diff between two revisions with one
//! optional sub-field per mutable aspect of a snapshot. Sub-fields are numbered
//! 3..=24 after the wire action they decrypt from; [`ChangeField`] names them.
//!
//! # Exhaustiveness
//!
//! Every consumer of a change-set (apply, emptiness checks, reconstruction,
//! conflict resolution, the wire codec) either destructures the struct without
//! `..` or matches [`ChangeField`] without a wildcard arm. Adding a sub-field
//! therefore fails to compile until every consumer handles it.

use serde::{Deserialize, Serialize};

use crate::{
    identifier::{Aci, ServiceId},
    model::{
        ApproveMember, BannedMember, Member, ModifyMemberRole, PendingMember,
        PendingMemberRemoval, RequestingMember,
    },
    wire::{AccessRequired, EnabledState},
};

/// Sparse diff between two revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupChangeSet {
    /// Who made the change. `None` for reconstructed changes.
    pub editor: Option<ServiceId>,
    /// Revision the change produces.
    pub revision: u32,
    /// Field 3.
    pub new_members: Vec<Member>,
    /// Field 4.
    pub delete_members: Vec<Aci>,
    /// Field 5.
    pub modify_member_roles: Vec<ModifyMemberRole>,
    /// Field 6. Only `aci` and `profile_key` are significant.
    pub modified_profile_keys: Vec<Member>,
    /// Field 7.
    pub new_pending_members: Vec<PendingMember>,
    /// Field 8.
    pub delete_pending_members: Vec<PendingMemberRemoval>,
    /// Field 9.
    pub promote_pending_members: Vec<Member>,
    /// Field 10.
    pub new_title: Option<String>,
    /// Field 11.
    pub new_avatar: Option<String>,
    /// Field 12, in seconds.
    pub new_timer: Option<u32>,
    /// Field 13.
    pub new_attribute_access: Option<AccessRequired>,
    /// Field 14.
    pub new_member_access: Option<AccessRequired>,
    /// Field 15.
    pub new_invite_link_access: Option<AccessRequired>,
    /// Field 16.
    pub new_requesting_members: Vec<RequestingMember>,
    /// Field 17.
    pub delete_requesting_members: Vec<Aci>,
    /// Field 18.
    pub promote_requesting_members: Vec<ApproveMember>,
    /// Field 19.
    pub new_invite_link_password: Option<Vec<u8>>,
    /// Field 20.
    pub new_description: Option<String>,
    /// Field 21.
    pub new_is_announcement_group: Option<EnabledState>,
    /// Field 22.
    pub new_banned_members: Vec<BannedMember>,
    /// Field 23.
    pub delete_banned_members: Vec<ServiceId>,
    /// Field 24. Entries carry both the revealed ACI and the invited PNI.
    pub promote_pending_pni_aci_members: Vec<Member>,
}

/// Mutable sub-fields of a change-set, by wire field number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u32)]
pub enum ChangeField {
    /// `new_members`
    NewMembers = 3,
    /// `delete_members`
    DeleteMembers = 4,
    /// `modify_member_roles`
    ModifyMemberRoles = 5,
    /// `modified_profile_keys`
    ModifiedProfileKeys = 6,
    /// `new_pending_members`
    NewPendingMembers = 7,
    /// `delete_pending_members`
    DeletePendingMembers = 8,
    /// `promote_pending_members`
    PromotePendingMembers = 9,
    /// `new_title`
    NewTitle = 10,
    /// `new_avatar`
    NewAvatar = 11,
    /// `new_timer`
    NewTimer = 12,
    /// `new_attribute_access`
    NewAttributeAccess = 13,
    /// `new_member_access`
    NewMemberAccess = 14,
    /// `new_invite_link_access`
    NewInviteLinkAccess = 15,
    /// `new_requesting_members`
    NewRequestingMembers = 16,
    /// `delete_requesting_members`
    DeleteRequestingMembers = 17,
    /// `promote_requesting_members`
    PromoteRequestingMembers = 18,
    /// `new_invite_link_password`
    NewInviteLinkPassword = 19,
    /// `new_description`
    NewDescription = 20,
    /// `new_is_announcement_group`
    NewIsAnnouncementGroup = 21,
    /// `new_banned_members`
    NewBannedMembers = 22,
    /// `delete_banned_members`
    DeleteBannedMembers = 23,
    /// `promote_pending_pni_aci_members`
    PromotePendingPniAciMembers = 24,
}

impl ChangeField {
    /// Every field, in wire order.
    pub const ALL: [Self; 22] = [
        Self::NewMembers,
        Self::DeleteMembers,
        Self::ModifyMemberRoles,
        Self::ModifiedProfileKeys,
        Self::NewPendingMembers,
        Self::DeletePendingMembers,
        Self::PromotePendingMembers,
        Self::NewTitle,
        Self::NewAvatar,
        Self::NewTimer,
        Self::NewAttributeAccess,
        Self::NewMemberAccess,
        Self::NewInviteLinkAccess,
        Self::NewRequestingMembers,
        Self::DeleteRequestingMembers,
        Self::PromoteRequestingMembers,
        Self::NewInviteLinkPassword,
        Self::NewDescription,
        Self::NewIsAnnouncementGroup,
        Self::NewBannedMembers,
        Self::DeleteBannedMembers,
        Self::PromotePendingPniAciMembers,
    ];

    /// Wire field number.
    pub const fn number(self) -> u32 {
        self as u32
    }

    /// Whether the field is a single optional value rather than a list.
    pub const fn is_scalar(self) -> bool {
        match self {
            Self::NewTitle
            | Self::NewAvatar
            | Self::NewTimer
            | Self::NewAttributeAccess
            | Self::NewMemberAccess
            | Self::NewInviteLinkAccess
            | Self::NewInviteLinkPassword
            | Self::NewDescription
            | Self::NewIsAnnouncementGroup => true,
            Self::NewMembers
            | Self::DeleteMembers
            | Self::ModifyMemberRoles
            | Self::ModifiedProfileKeys
            | Self::NewPendingMembers
            | Self::DeletePendingMembers
            | Self::PromotePendingMembers
            | Self::NewRequestingMembers
            | Self::DeleteRequestingMembers
            | Self::PromoteRequestingMembers
            | Self::NewBannedMembers
            | Self::DeleteBannedMembers
            | Self::PromotePendingPniAciMembers => false,
        }
    }
}

impl GroupChangeSet {
    /// Empty change producing `revision`.
    pub fn at_revision(revision: u32) -> Self {
        Self { revision, ..Default::default() }
    }

    /// Number of entries in each field; scalars count as 0 or 1.
    pub fn field_lengths(&self) -> [(ChangeField, usize); 22] {
        let Self {
            editor: _,
            revision: _,
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
        } = self;

        [
            (ChangeField::NewMembers, new_members.len()),
            (ChangeField::DeleteMembers, delete_members.len()),
            (ChangeField::ModifyMemberRoles, modify_member_roles.len()),
            (ChangeField::ModifiedProfileKeys, modified_profile_keys.len()),
            (ChangeField::NewPendingMembers, new_pending_members.len()),
            (ChangeField::DeletePendingMembers, delete_pending_members.len()),
            (ChangeField::PromotePendingMembers, promote_pending_members.len()),
            (ChangeField::NewTitle, usize::from(new_title.is_some())),
            (ChangeField::NewAvatar, usize::from(new_avatar.is_some())),
            (ChangeField::NewTimer, usize::from(new_timer.is_some())),
            (ChangeField::NewAttributeAccess, usize::from(new_attribute_access.is_some())),
            (ChangeField::NewMemberAccess, usize::from(new_member_access.is_some())),
            (ChangeField::NewInviteLinkAccess, usize::from(new_invite_link_access.is_some())),
            (ChangeField::NewRequestingMembers, new_requesting_members.len()),
            (ChangeField::DeleteRequestingMembers, delete_requesting_members.len()),
            (ChangeField::PromoteRequestingMembers, promote_requesting_members.len()),
            (ChangeField::NewInviteLinkPassword, usize::from(new_invite_link_password.is_some())),
            (ChangeField::NewDescription, usize::from(new_description.is_some())),
            (ChangeField::NewIsAnnouncementGroup, usize::from(new_is_announcement_group.is_some())),
            (ChangeField::NewBannedMembers, new_banned_members.len()),
            (ChangeField::DeleteBannedMembers, delete_banned_members.len()),
            (ChangeField::PromotePendingPniAciMembers, promote_pending_pni_aci_members.len()),
        ]
    }

    /// Number of entries in one field.
    pub fn field_len(&self, field: ChangeField) -> usize {
        self.field_lengths().iter().find(|(f, _)| *f == field).map_or(0, |(_, len)| *len)
    }

    /// Fields that carry at least one entry, in wire order.
    pub fn populated_fields(&self) -> Vec<ChangeField> {
        self.field_lengths().iter().filter(|(_, len)| *len > 0).map(|(f, _)| *f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_cover_three_to_twenty_four() {
        let numbers: Vec<u32> = ChangeField::ALL.iter().map(|f| f.number()).collect();
        let expected: Vec<u32> = (3..=24).collect();

        assert_eq!(numbers, expected);
    }

    #[test]
    fn field_lengths_follow_all_order() {
        let change = GroupChangeSet::default();
        let order: Vec<ChangeField> = change.field_lengths().iter().map(|(f, _)| *f).collect();

        assert_eq!(order, ChangeField::ALL.to_vec());
    }

    #[test]
    fn populated_fields_reports_scalars_and_lists() {
        let change = GroupChangeSet {
            revision: 2,
            editor: Some(ServiceId::Aci(Aci::from_u128(1))),
            new_title: Some(String::new()),
            delete_members: vec![Aci::from_u128(2), Aci::from_u128(3)],
            ..Default::default()
        };

        assert_eq!(
            change.populated_fields(),
            vec![ChangeField::DeleteMembers, ChangeField::NewTitle]
        );
        assert_eq!(change.field_len(ChangeField::DeleteMembers), 2);
        assert_eq!(change.field_len(ChangeField::NewTitle), 1);
    }

    #[test]
    fn scalar_fields_are_exactly_the_options() {
        let scalars = ChangeField::ALL.iter().filter(|f| f.is_scalar()).count();
        assert_eq!(scalars, 9);
    }
}
