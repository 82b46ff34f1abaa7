//! Decrypted state to wire records.

use roster_proto::{
    AccessControl, GroupChangeSet, GroupSnapshot, Member, PendingMember, RequestingMember,
    ServiceId,
    wire::{self, GroupAttributeBlob, GroupChangeActions, group_attribute_blob::Content},
};

use super::GroupOperations;
use crate::env::Entropy;

impl GroupOperations {
    /// Encrypt a change into wire actions.
    ///
    /// Lists stay positionally aligned with the change. Blob nonces are drawn
    /// from `entropy` in field order.
    pub fn encrypt_change(
        &self,
        change: &GroupChangeSet,
        entropy: &mut impl Entropy,
    ) -> GroupChangeActions {
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

        GroupChangeActions {
            source_service_id: editor
                .map(|editor| self.encrypt_service_id(editor))
                .unwrap_or_default(),
            revision: *revision,
            add_members: new_members
                .iter()
                .map(|m| wire::AddMemberAction {
                    added: Some(self.encrypt_member(m)),
                    join_from_invite_link: false,
                })
                .collect(),
            delete_members: delete_members
                .iter()
                .map(|aci| wire::DeleteMemberAction {
                    deleted_user_id: self.encrypt_service_id(ServiceId::Aci(*aci)),
                })
                .collect(),
            modify_member_roles: modify_member_roles
                .iter()
                .map(|m| wire::ModifyMemberRoleAction {
                    user_id: self.encrypt_service_id(ServiceId::Aci(m.aci)),
                    role: m.role as i32,
                })
                .collect(),
            modify_member_profile_keys: modified_profile_keys
                .iter()
                .map(|m| wire::ModifyMemberProfileKeyAction {
                    presentation: Vec::new(),
                    user_id: self.encrypt_service_id(ServiceId::Aci(m.aci)),
                    profile_key: self.encrypt_profile_key(&m.profile_key, m.aci),
                })
                .collect(),
            add_pending_members: new_pending_members
                .iter()
                .map(|p| wire::AddPendingMemberAction {
                    added: Some(self.encrypt_pending_member(p)),
                })
                .collect(),
            delete_pending_members: delete_pending_members
                .iter()
                .map(|removal| wire::DeletePendingMemberAction {
                    deleted_user_id: self.pending_ciphertext(
                        removal.service_id,
                        &removal.service_id_ciphertext,
                    ),
                })
                .collect(),
            promote_pending_members: promote_pending_members
                .iter()
                .map(|m| wire::PromotePendingMemberAction {
                    presentation: Vec::new(),
                    user_id: self.encrypt_service_id(ServiceId::Aci(m.aci)),
                    profile_key: self.encrypt_profile_key(&m.profile_key, m.aci),
                })
                .collect(),
            modify_title: new_title
                .as_ref()
                .map(|title| wire::ModifyTitleAction { title: self.encrypt_title(title, entropy) }),
            modify_avatar: new_avatar.as_ref().map(|avatar| wire::ModifyAvatarAction {
                avatar: avatar.clone(),
            }),
            modify_disappearing_messages_timer: new_timer
                .map(|timer| wire::ModifyDisappearingMessagesTimerAction {
                    timer: self.encrypt_timer(timer, entropy),
                }),
            modify_attributes_access: new_attribute_access
                .map(|access| wire::ModifyAttributesAccessControlAction {
                    attributes_access: access as i32,
                }),
            modify_member_access: new_member_access
                .map(|access| wire::ModifyMembersAccessControlAction {
                    members_access: access as i32,
                }),
            modify_add_from_invite_link_access: new_invite_link_access.map(|access| {
                wire::ModifyAddFromInviteLinkAccessControlAction {
                    add_from_invite_link_access: access as i32,
                }
            }),
            add_requesting_members: new_requesting_members
                .iter()
                .map(|r| wire::AddRequestingMemberAction {
                    added: Some(self.encrypt_requesting_member(r)),
                })
                .collect(),
            delete_requesting_members: delete_requesting_members
                .iter()
                .map(|aci| wire::DeleteRequestingMemberAction {
                    deleted_user_id: self.encrypt_service_id(ServiceId::Aci(*aci)),
                })
                .collect(),
            promote_requesting_members: promote_requesting_members
                .iter()
                .map(|approval| wire::PromoteRequestingMemberAction {
                    user_id: self.encrypt_service_id(ServiceId::Aci(approval.aci)),
                    role: approval.role as i32,
                })
                .collect(),
            modify_invite_link_password: new_invite_link_password
                .as_ref()
                .map(|password| wire::ModifyInviteLinkPasswordAction {
                    invite_link_password: password.clone(),
                }),
            modify_description: new_description.as_ref().map(|description| {
                wire::ModifyDescriptionAction {
                    description: self.encrypt_description(description, entropy),
                }
            }),
            modify_announcements_only: new_is_announcement_group
                .map(|state| wire::ModifyAnnouncementsOnlyAction {
                    announcements_only: state.as_flag(),
                }),
            add_banned_members: new_banned_members
                .iter()
                .map(|b| wire::AddBannedMemberAction {
                    added: Some(wire::BannedMember {
                        user_id: self.encrypt_service_id(b.service_id),
                        timestamp: b.timestamp,
                    }),
                })
                .collect(),
            delete_banned_members: delete_banned_members
                .iter()
                .map(|id| wire::DeleteBannedMemberAction {
                    deleted_user_id: self.encrypt_service_id(*id),
                })
                .collect(),
            promote_pending_pni_aci_members: promote_pending_pni_aci_members
                .iter()
                .map(|m| wire::PromotePendingPniAciMemberProfileKeyAction {
                    presentation: Vec::new(),
                    user_id: self.encrypt_service_id(ServiceId::Aci(m.aci)),
                    pni: m
                        .pni
                        .map(|pni| self.encrypt_service_id(ServiceId::Pni(pni)))
                        .unwrap_or_default(),
                    profile_key: self.encrypt_profile_key(&m.profile_key, m.aci),
                })
                .collect(),
        }
    }

    /// Encrypt a full snapshot, as the server would store it.
    pub fn encrypt_group(
        &self,
        snapshot: &GroupSnapshot,
        entropy: &mut impl Entropy,
    ) -> wire::Group {
        let GroupSnapshot {
            revision,
            title,
            description,
            avatar,
            disappearing_messages_timer,
            access_control,
            members,
            pending_members,
            requesting_members,
            banned_members,
            invite_link_password,
            is_announcement_group,
        } = snapshot;
        let AccessControl { attributes, members: member_access, add_from_invite_link } =
            access_control;

        wire::Group {
            public_key: self.group_identifier().to_vec(),
            title: self.encrypt_title(title, entropy),
            avatar: avatar.clone(),
            disappearing_messages_timer: self.encrypt_timer(*disappearing_messages_timer, entropy),
            access_control: Some(wire::AccessControl {
                attributes: *attributes as i32,
                members: *member_access as i32,
                add_from_invite_link: *add_from_invite_link as i32,
            }),
            revision: *revision,
            members: members.iter().map(|m| self.encrypt_member(m)).collect(),
            pending_members: pending_members
                .iter()
                .map(|p| self.encrypt_pending_member(p))
                .collect(),
            requesting_members: requesting_members
                .iter()
                .map(|r| self.encrypt_requesting_member(r))
                .collect(),
            invite_link_password: invite_link_password.clone(),
            description: self.encrypt_description(description, entropy),
            announcements_only: is_announcement_group.as_flag(),
            banned_members: banned_members
                .iter()
                .map(|b| wire::BannedMember {
                    user_id: self.encrypt_service_id(b.service_id),
                    timestamp: b.timestamp,
                })
                .collect(),
        }
    }

    fn encrypt_member(&self, member: &Member) -> wire::Member {
        wire::Member {
            user_id: self.encrypt_service_id(ServiceId::Aci(member.aci)),
            role: member.role as i32,
            profile_key: self.encrypt_profile_key(&member.profile_key, member.aci),
            presentation: Vec::new(),
            joined_at_revision: u32::try_from(member.joined_at_revision).unwrap_or_default(),
        }
    }

    fn encrypt_pending_member(&self, pending: &PendingMember) -> wire::PendingMember {
        wire::PendingMember {
            member: Some(wire::Member {
                user_id: self.pending_ciphertext(
                    pending.service_id,
                    &pending.service_id_ciphertext,
                ),
                role: pending.role as i32,
                ..Default::default()
            }),
            added_by_user_id: self.encrypt_service_id(ServiceId::Aci(pending.added_by)),
            timestamp: pending.timestamp,
        }
    }

    fn encrypt_requesting_member(&self, requesting: &RequestingMember) -> wire::RequestingMember {
        wire::RequestingMember {
            user_id: self.encrypt_service_id(ServiceId::Aci(requesting.aci)),
            profile_key: self.encrypt_profile_key(&requesting.profile_key, requesting.aci),
            presentation: Vec::new(),
            timestamp: requesting.timestamp,
        }
    }

    /// Invites decrypted as unknown are addressed by their stored ciphertext.
    fn pending_ciphertext(&self, service_id: ServiceId, stored: &[u8]) -> Vec<u8> {
        if stored.is_empty() { self.encrypt_service_id(service_id) } else { stored.to_vec() }
    }

    fn encrypt_title(&self, title: &str, entropy: &mut impl Entropy) -> Vec<u8> {
        self.encrypt_blob(
            &GroupAttributeBlob { content: Some(Content::Title(title.to_owned())) },
            entropy,
        )
    }

    fn encrypt_description(&self, description: &str, entropy: &mut impl Entropy) -> Vec<u8> {
        let blob =
            GroupAttributeBlob { content: Some(Content::DescriptionText(description.to_owned())) };
        self.encrypt_blob(&blob, entropy)
    }

    fn encrypt_timer(&self, seconds: u32, entropy: &mut impl Entropy) -> Vec<u8> {
        let blob =
            GroupAttributeBlob { content: Some(Content::DisappearingMessagesDuration(seconds)) };
        self.encrypt_blob(&blob, entropy)
    }
}
