//! Emptiness predicates for change-sets and wire actions.
//!
//! A change is empty when none of fields 3..=24 carries an entry. The editor
//! and revision never count. An empty resolved change means "nothing to
//! submit".

use roster_proto::{ChangeField, GroupChangeSet, wire::GroupChangeActions};

/// How a field is treated by the relaxed predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldClass {
    ProfileKey,
    Ban,
    Other,
}

fn classify(field: ChangeField) -> FieldClass {
    match field {
        ChangeField::ModifiedProfileKeys => FieldClass::ProfileKey,
        ChangeField::NewBannedMembers | ChangeField::DeleteBannedMembers => FieldClass::Ban,
        ChangeField::NewMembers
        | ChangeField::DeleteMembers
        | ChangeField::ModifyMemberRoles
        | ChangeField::NewPendingMembers
        | ChangeField::DeletePendingMembers
        | ChangeField::PromotePendingMembers
        | ChangeField::NewTitle
        | ChangeField::NewAvatar
        | ChangeField::NewTimer
        | ChangeField::NewAttributeAccess
        | ChangeField::NewMemberAccess
        | ChangeField::NewInviteLinkAccess
        | ChangeField::NewRequestingMembers
        | ChangeField::DeleteRequestingMembers
        | ChangeField::PromoteRequestingMembers
        | ChangeField::NewInviteLinkPassword
        | ChangeField::NewDescription
        | ChangeField::NewIsAnnouncementGroup
        | ChangeField::PromotePendingPniAciMembers => FieldClass::Other,
    }
}

/// No field carries an entry.
pub fn is_empty(change: &GroupChangeSet) -> bool {
    change.populated_fields().is_empty()
}

/// Only profile keys change, or nothing does.
pub fn is_empty_except_for_profile_key_changes(change: &GroupChangeSet) -> bool {
    change.populated_fields().into_iter().all(|f| classify(f) == FieldClass::ProfileKey)
}

/// At least one ban changes, and nothing else besides profile keys.
pub fn is_empty_except_for_ban_changes_and_optional_profile_key_changes(
    change: &GroupChangeSet,
) -> bool {
    let fields = change.populated_fields();

    fields.iter().any(|f| classify(*f) == FieldClass::Ban)
        && fields
            .into_iter()
            .all(|f| matches!(classify(f), FieldClass::ProfileKey | FieldClass::Ban))
}

/// The change is not worth announcing in the conversation.
///
/// Profile key refreshes and ban list maintenance are silent.
pub fn is_silent(change: &GroupChangeSet) -> bool {
    is_empty_except_for_profile_key_changes(change)
        || is_empty_except_for_ban_changes_and_optional_profile_key_changes(change)
}

/// No wire action is present. Source and revision never count.
pub fn actions_are_empty(actions: &GroupChangeActions) -> bool {
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

    add_members.is_empty()
        && delete_members.is_empty()
        && modify_member_roles.is_empty()
        && modify_member_profile_keys.is_empty()
        && add_pending_members.is_empty()
        && delete_pending_members.is_empty()
        && promote_pending_members.is_empty()
        && modify_title.is_none()
        && modify_avatar.is_none()
        && modify_disappearing_messages_timer.is_none()
        && modify_attributes_access.is_none()
        && modify_member_access.is_none()
        && modify_add_from_invite_link_access.is_none()
        && add_requesting_members.is_empty()
        && delete_requesting_members.is_empty()
        && promote_requesting_members.is_empty()
        && modify_invite_link_password.is_none()
        && modify_description.is_none()
        && modify_announcements_only.is_none()
        && add_banned_members.is_empty()
        && delete_banned_members.is_empty()
        && promote_pending_pni_aci_members.is_empty()
}
