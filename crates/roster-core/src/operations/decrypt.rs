//! Wire records to decrypted state.

use prost::Message;
use roster_proto::{
    AccessControl, AccessRequired, Aci, ApproveMember, BannedMember, EnabledState, GroupChangeSet,
    GroupSnapshot, Member, ModifyMemberRole, PendingMember, PendingMemberRemoval, RequestingMember,
    Role, ServiceId,
    wire::{self, GroupChange, GroupChangeActions, group_attribute_blob::Content},
};
use tracing::{debug, warn};

use super::GroupOperations;
use crate::error::GroupDecryptError;

impl GroupOperations {
    /// Decrypt a full group record.
    pub fn decrypt_group(&self, group: &wire::Group) -> Result<GroupSnapshot, GroupDecryptError> {
        let wire::Group {
            public_key: _,
            title,
            avatar,
            disappearing_messages_timer,
            access_control,
            revision,
            members,
            pending_members,
            requesting_members,
            invite_link_password,
            description,
            announcements_only,
            banned_members,
        } = group;

        Ok(GroupSnapshot {
            revision: *revision,
            title: self.decrypt_title(title)?,
            description: self.decrypt_description(description)?,
            avatar: avatar.clone(),
            disappearing_messages_timer: self.decrypt_timer(disappearing_messages_timer)?,
            access_control: access_control.map(decode_access_control).unwrap_or_default(),
            members: members
                .iter()
                .map(|m| self.decrypt_member(m, "members"))
                .collect::<Result<_, _>>()?,
            pending_members: pending_members
                .iter()
                .map(|p| self.decrypt_pending_member(p, "pending_members"))
                .collect::<Result<_, _>>()?,
            requesting_members: requesting_members
                .iter()
                .map(|r| self.decrypt_requesting_member(r, "requesting_members"))
                .collect::<Result<_, _>>()?,
            banned_members: banned_members
                .iter()
                .map(|b| self.decrypt_banned_member(b, "banned_members"))
                .collect::<Result<_, _>>()?,
            invite_link_password: invite_link_password.clone(),
            is_announcement_group: EnabledState::from_flag(*announcements_only),
        })
    }

    /// Decrypt a signed change from the server's log.
    ///
    /// Returns `None` for changes from a newer epoch than this build knows, and
    /// for changes that fail to decode or decrypt. Neither is an error for the
    /// caller: the change is simply not available, and the next full snapshot
    /// fills the gap.
    pub fn decrypt_change(&self, change: &GroupChange) -> Option<GroupChangeSet> {
        if change.change_epoch > self.config.highest_known_epoch {
            warn!(
                epoch = change.change_epoch,
                highest_known = self.config.highest_known_epoch,
                "ignoring change from unknown epoch"
            );
            return None;
        }

        let decrypted = GroupChangeActions::decode(change.actions.as_slice())
            .map_err(|e| GroupDecryptError::Decode(e.to_string()))
            .and_then(|actions| self.decrypt_change_actions(&actions));

        match decrypted {
            Ok(change) => Some(change),
            Err(error) => {
                warn!(%error, "dropping undecryptable group change");
                None
            },
        }
    }

    /// Decrypt change actions field by field.
    ///
    /// Members added or promoted by the change join at its revision. An editor
    /// that cannot be decrypted is reported as [`Aci::UNKNOWN`]; so is an
    /// invited identifier, whose ciphertext is kept for later removal.
    pub fn decrypt_change_actions(
        &self,
        actions: &GroupChangeActions,
    ) -> Result<GroupChangeSet, GroupDecryptError> {
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
        let joined_at = *revision as i32;

        let mut change = GroupChangeSet::at_revision(*revision);
        change.editor = self.decrypt_editor(source_service_id);

        for action in add_members {
            let added = action
                .added
                .as_ref()
                .ok_or(GroupDecryptError::MissingRecord { field: "add_members" })?;
            let mut member = self.decrypt_member(added, "add_members")?;
            member.joined_at_revision = joined_at;
            change.new_members.push(member);
        }

        for action in delete_members {
            change.delete_members.push(
                self.decrypt_aci(&action.deleted_user_id, "delete_members")?,
            );
        }

        for action in modify_member_roles {
            change.modify_member_roles.push(ModifyMemberRole {
                aci: self.decrypt_aci(&action.user_id, "modify_member_roles")?,
                role: decode_role(action.role),
            });
        }

        for action in modify_member_profile_keys {
            let aci = self.decrypt_aci(&action.user_id, "modify_member_profile_keys")?;
            let profile_key =
                self.decrypt_profile_key(&action.profile_key, aci, "modify_member_profile_keys")?;
            change.modified_profile_keys.push(Member {
                aci,
                pni: None,
                role: Role::Unknown,
                profile_key,
                joined_at_revision: -1,
            });
        }

        for action in add_pending_members {
            let added = action
                .added
                .as_ref()
                .ok_or(GroupDecryptError::MissingRecord { field: "add_pending_members" })?;
            change.new_pending_members.push(
                self.decrypt_pending_member(added, "add_pending_members")?,
            );
        }

        for action in delete_pending_members {
            change.delete_pending_members.push(PendingMemberRemoval {
                service_id: self.decrypt_service_id_or_unknown(&action.deleted_user_id),
                service_id_ciphertext: action.deleted_user_id.clone(),
            });
        }

        for action in promote_pending_members {
            let aci = self.decrypt_aci(&action.user_id, "promote_pending_members")?;
            change.promote_pending_members.push(Member {
                aci,
                pni: None,
                role: Role::Default,
                profile_key: self.decrypt_profile_key(
                    &action.profile_key,
                    aci,
                    "promote_pending_members",
                )?,
                joined_at_revision: joined_at,
            });
        }

        if let Some(action) = modify_title {
            change.new_title = Some(self.decrypt_title(&action.title)?);
        }
        if let Some(action) = modify_avatar {
            change.new_avatar = Some(action.avatar.clone());
        }
        if let Some(action) = modify_disappearing_messages_timer {
            change.new_timer = Some(self.decrypt_timer(&action.timer)?);
        }
        if let Some(action) = modify_attributes_access {
            change.new_attribute_access = Some(decode_access(action.attributes_access));
        }
        if let Some(action) = modify_member_access {
            change.new_member_access = Some(decode_access(action.members_access));
        }
        if let Some(action) = modify_add_from_invite_link_access {
            change.new_invite_link_access = Some(decode_access(action.add_from_invite_link_access));
        }

        for action in add_requesting_members {
            let added = action
                .added
                .as_ref()
                .ok_or(GroupDecryptError::MissingRecord { field: "add_requesting_members" })?;
            change.new_requesting_members.push(
                self.decrypt_requesting_member(added, "add_requesting_members")?,
            );
        }

        for action in delete_requesting_members {
            let aci = self.decrypt_aci(&action.deleted_user_id, "delete_requesting_members")?;
            change.delete_requesting_members.push(aci);
        }

        for action in promote_requesting_members {
            change.promote_requesting_members.push(ApproveMember {
                aci: self.decrypt_aci(&action.user_id, "promote_requesting_members")?,
                role: decode_role(action.role),
            });
        }

        if let Some(action) = modify_invite_link_password {
            change.new_invite_link_password = Some(action.invite_link_password.clone());
        }
        if let Some(action) = modify_description {
            change.new_description = Some(self.decrypt_description(&action.description)?);
        }
        if let Some(action) = modify_announcements_only {
            change.new_is_announcement_group = Some(
                EnabledState::from_flag(action.announcements_only),
            );
        }

        for action in add_banned_members {
            let added = action
                .added
                .as_ref()
                .ok_or(GroupDecryptError::MissingRecord { field: "add_banned_members" })?;
            change.new_banned_members.push(
                self.decrypt_banned_member(added, "add_banned_members")?,
            );
        }

        for action in delete_banned_members {
            let service_id =
                self.decrypt_service_id(&action.deleted_user_id, "delete_banned_members")?;
            change.delete_banned_members.push(service_id);
        }

        for action in promote_pending_pni_aci_members {
            let field = "promote_pending_pni_aci_members";
            let aci = self.decrypt_aci(&action.user_id, field)?;
            let pni = self
                .decrypt_service_id(&action.pni, field)?
                .pni()
                .ok_or(GroupDecryptError::WrongIdentifierKind { field })?;

            // The invitee accepts with their ACI, so they are the editor.
            change.editor = Some(ServiceId::Aci(aci));
            change.promote_pending_pni_aci_members.push(Member {
                aci,
                pni: Some(pni),
                role: Role::Default,
                profile_key: self.decrypt_profile_key(&action.profile_key, aci, field)?,
                joined_at_revision: joined_at,
            });
        }

        if matches!(change.editor, Some(ServiceId::Pni(_))) {
            replace_pni_editor(&mut change, actions);
        }

        Ok(change)
    }

    fn decrypt_editor(&self, ciphertext: &[u8]) -> Option<ServiceId> {
        if ciphertext.is_empty() {
            return None;
        }
        match self.decrypt_service_id(ciphertext, "source_service_id") {
            Ok(editor) => Some(editor),
            Err(error) => {
                warn!(%error, "editor not decryptable, reporting unknown");
                Some(ServiceId::Aci(Aci::UNKNOWN))
            },
        }
    }

    fn decrypt_service_id_or_unknown(&self, ciphertext: &[u8]) -> ServiceId {
        self.decrypt_service_id(ciphertext, "pending_member").unwrap_or(
            ServiceId::Aci(Aci::UNKNOWN),
        )
    }

    fn decrypt_member(
        &self,
        member: &wire::Member,
        field: &'static str,
    ) -> Result<Member, GroupDecryptError> {
        let aci = self.decrypt_aci(&member.user_id, field)?;
        Ok(Member {
            aci,
            pni: None,
            role: decode_role(member.role),
            profile_key: self.decrypt_profile_key(&member.profile_key, aci, field)?,
            joined_at_revision: member.joined_at_revision as i32,
        })
    }

    fn decrypt_pending_member(
        &self,
        pending: &wire::PendingMember,
        field: &'static str,
    ) -> Result<PendingMember, GroupDecryptError> {
        let member = pending.member.as_ref().ok_or(GroupDecryptError::MissingRecord { field })?;
        Ok(PendingMember {
            service_id: self.decrypt_service_id_or_unknown(&member.user_id),
            service_id_ciphertext: member.user_id.clone(),
            added_by: self.decrypt_aci(&pending.added_by_user_id, field)?,
            role: decode_role(member.role),
            timestamp: pending.timestamp,
        })
    }

    fn decrypt_requesting_member(
        &self,
        requesting: &wire::RequestingMember,
        field: &'static str,
    ) -> Result<RequestingMember, GroupDecryptError> {
        let aci = self.decrypt_aci(&requesting.user_id, field)?;
        Ok(RequestingMember {
            aci,
            profile_key: self.decrypt_profile_key(&requesting.profile_key, aci, field)?,
            timestamp: requesting.timestamp,
        })
    }

    fn decrypt_banned_member(
        &self,
        banned: &wire::BannedMember,
        field: &'static str,
    ) -> Result<BannedMember, GroupDecryptError> {
        Ok(BannedMember {
            service_id: self.decrypt_service_id(&banned.user_id, field)?,
            timestamp: banned.timestamp,
        })
    }

    fn decrypt_title(&self, ciphertext: &[u8]) -> Result<String, GroupDecryptError> {
        let field = "title";
        match self.decrypt_blob(ciphertext, field)?.content {
            Some(Content::Title(title)) => Ok(title),
            None => Ok(String::new()),
            Some(_) => Err(GroupDecryptError::MalformedBlob { field }),
        }
    }

    fn decrypt_description(&self, ciphertext: &[u8]) -> Result<String, GroupDecryptError> {
        let field = "description";
        match self.decrypt_blob(ciphertext, field)?.content {
            Some(Content::DescriptionText(description)) => Ok(description),
            None => Ok(String::new()),
            Some(_) => Err(GroupDecryptError::MalformedBlob { field }),
        }
    }

    fn decrypt_timer(&self, ciphertext: &[u8]) -> Result<u32, GroupDecryptError> {
        let field = "disappearing_messages_timer";
        match self.decrypt_blob(ciphertext, field)?.content {
            Some(Content::DisappearingMessagesDuration(seconds)) => Ok(seconds),
            None => Ok(0),
            Some(_) => Err(GroupDecryptError::MalformedBlob { field }),
        }
    }
}

/// A PNI may only edit on its own behalf: accepting or declining its invite.
///
/// A lone invite-link join reports the PNI by mistake and is attributed to
/// the joining ACI. Any other change gets no editor.
fn replace_pni_editor(change: &mut GroupChangeSet, actions: &GroupChangeActions) {
    if let ([action], [member]) = (actions.add_members.as_slice(), change.new_members.as_slice()) {
        if action.join_from_invite_link {
            debug!("attributing invite link join to the joining ACI");
            change.editor = Some(ServiceId::Aci(member.aci));
        } else {
            warn!("PNI editor on member addition, clearing editor");
            change.editor = None;
        }
    } else if actions.delete_pending_members.is_empty()
        && actions.promote_pending_pni_aci_members.is_empty()
    {
        warn!("PNI editor on a change it cannot make, clearing editor");
        change.editor = None;
    }
}

fn decode_role(role: i32) -> Role {
    Role::try_from(role).unwrap_or(Role::Unknown)
}

fn decode_access(access: i32) -> AccessRequired {
    AccessRequired::try_from(access).unwrap_or(AccessRequired::Unknown)
}

fn decode_access_control(access: wire::AccessControl) -> AccessControl {
    AccessControl {
        attributes: decode_access(access.attributes),
        members: decode_access(access.members),
        add_from_invite_link: decode_access(access.add_from_invite_link),
    }
}
