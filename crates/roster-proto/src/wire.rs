//! Field-numbered wire records exchanged with the group server.
//!
//! These messages mirror the server's protobuf schema. Field numbers are part
//! of the external contract: `Group` uses 1..=13, `GroupChangeActions` uses
//! 1..=24, and every action sub-message keeps its historical numbering. Never
//! renumber a field; add new ones at the end.
//!
//! Identifier, profile key and attribute fields carry ciphertext produced by
//! the operations codec. The server cannot read them.

// Derived getters and enum helpers are generated without docs.
#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

/// Member role.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration, Serialize,
    Deserialize,
)]
#[repr(i32)]
pub enum Role {
    /// Unset or unrecognized.
    Unknown = 0,
    /// Regular member.
    Default = 1,
    /// Administrator.
    Administrator = 2,
}

/// Access level required for a class of operations.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration, Serialize,
    Deserialize,
)]
#[repr(i32)]
pub enum AccessRequired {
    /// Unset or unrecognized.
    Unknown = 0,
    /// Anyone with the invite link.
    Any = 1,
    /// Any full member.
    Member = 2,
    /// Administrators only.
    Administrator = 3,
    /// Nobody.
    Unsatisfiable = 4,
}

/// Tri-state flag used for the announcement-only setting.
///
/// On the wire the flag is a plain `bool`; `Unknown` only exists in decrypted
/// state that predates the setting.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration, Serialize,
    Deserialize,
)]
#[repr(i32)]
pub enum EnabledState {
    /// Never set.
    Unknown = 0,
    /// Enabled.
    Enabled = 1,
    /// Disabled.
    Disabled = 2,
}

impl EnabledState {
    /// Decode the wire `bool`.
    pub fn from_flag(flag: bool) -> Self {
        if flag { Self::Enabled } else { Self::Disabled }
    }

    /// Encode as the wire `bool`.
    pub fn as_flag(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Full member record.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Member {
    /// Encrypted ACI.
    #[prost(bytes = "vec", tag = "1")]
    pub user_id: Vec<u8>,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
    /// Encrypted profile key.
    #[prost(bytes = "vec", tag = "3")]
    pub profile_key: Vec<u8>,
    /// Credential presentation; opaque to this crate.
    #[prost(bytes = "vec", tag = "4")]
    pub presentation: Vec<u8>,
    #[prost(uint32, tag = "5")]
    pub joined_at_revision: u32,
}

/// Invited member.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct PendingMember {
    #[prost(message, optional, tag = "1")]
    pub member: Option<Member>,
    /// Encrypted ACI of the inviter.
    #[prost(bytes = "vec", tag = "2")]
    pub added_by_user_id: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub timestamp: u64,
}

/// Join request awaiting approval.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct RequestingMember {
    #[prost(bytes = "vec", tag = "1")]
    pub user_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub profile_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub presentation: Vec<u8>,
    #[prost(uint64, tag = "4")]
    pub timestamp: u64,
}

/// Banned identifier.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct BannedMember {
    #[prost(bytes = "vec", tag = "1")]
    pub user_id: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub timestamp: u64,
}

/// Access control settings.
#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct AccessControl {
    #[prost(enumeration = "AccessRequired", tag = "1")]
    pub attributes: i32,
    #[prost(enumeration = "AccessRequired", tag = "2")]
    pub members: i32,
    #[prost(enumeration = "AccessRequired", tag = "3")]
    pub add_from_invite_link: i32,
}

/// Encrypted group state as stored by the server.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Group {
    #[prost(bytes = "vec", tag = "1")]
    pub public_key: Vec<u8>,
    /// Encrypted [`GroupAttributeBlob`] holding the title.
    #[prost(bytes = "vec", tag = "2")]
    pub title: Vec<u8>,
    /// CDN key; stored in the clear.
    #[prost(string, tag = "3")]
    pub avatar: String,
    /// Encrypted [`GroupAttributeBlob`] holding the timer.
    #[prost(bytes = "vec", tag = "4")]
    pub disappearing_messages_timer: Vec<u8>,
    #[prost(message, optional, tag = "5")]
    pub access_control: Option<AccessControl>,
    #[prost(uint32, tag = "6")]
    pub revision: u32,
    #[prost(message, repeated, tag = "7")]
    pub members: Vec<Member>,
    #[prost(message, repeated, tag = "8")]
    pub pending_members: Vec<PendingMember>,
    #[prost(message, repeated, tag = "9")]
    pub requesting_members: Vec<RequestingMember>,
    #[prost(bytes = "vec", tag = "10")]
    pub invite_link_password: Vec<u8>,
    /// Encrypted [`GroupAttributeBlob`] holding the description.
    #[prost(bytes = "vec", tag = "11")]
    pub description: Vec<u8>,
    #[prost(bool, tag = "12")]
    pub announcements_only: bool,
    #[prost(message, repeated, tag = "13")]
    pub banned_members: Vec<BannedMember>,
}

/// Signed change envelope.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct GroupChange {
    /// Serialized [`GroupChangeActions`].
    #[prost(bytes = "vec", tag = "1")]
    pub actions: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub server_signature: Vec<u8>,
    /// Schema epoch of `actions`. Clients ignore epochs they do not know.
    #[prost(uint32, tag = "3")]
    pub change_epoch: u32,
}

/// The action list of one change, as submitted to and returned by the server.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct GroupChangeActions {
    /// Encrypted service id of the editor.
    #[prost(bytes = "vec", tag = "1")]
    pub source_service_id: Vec<u8>,
    #[prost(uint32, tag = "2")]
    pub revision: u32,
    #[prost(message, repeated, tag = "3")]
    pub add_members: Vec<AddMemberAction>,
    #[prost(message, repeated, tag = "4")]
    pub delete_members: Vec<DeleteMemberAction>,
    #[prost(message, repeated, tag = "5")]
    pub modify_member_roles: Vec<ModifyMemberRoleAction>,
    #[prost(message, repeated, tag = "6")]
    pub modify_member_profile_keys: Vec<ModifyMemberProfileKeyAction>,
    #[prost(message, repeated, tag = "7")]
    pub add_pending_members: Vec<AddPendingMemberAction>,
    #[prost(message, repeated, tag = "8")]
    pub delete_pending_members: Vec<DeletePendingMemberAction>,
    #[prost(message, repeated, tag = "9")]
    pub promote_pending_members: Vec<PromotePendingMemberAction>,
    #[prost(message, optional, tag = "10")]
    pub modify_title: Option<ModifyTitleAction>,
    #[prost(message, optional, tag = "11")]
    pub modify_avatar: Option<ModifyAvatarAction>,
    #[prost(message, optional, tag = "12")]
    pub modify_disappearing_messages_timer: Option<ModifyDisappearingMessagesTimerAction>,
    #[prost(message, optional, tag = "13")]
    pub modify_attributes_access: Option<ModifyAttributesAccessControlAction>,
    #[prost(message, optional, tag = "14")]
    pub modify_member_access: Option<ModifyMembersAccessControlAction>,
    #[prost(message, optional, tag = "15")]
    pub modify_add_from_invite_link_access: Option<ModifyAddFromInviteLinkAccessControlAction>,
    #[prost(message, repeated, tag = "16")]
    pub add_requesting_members: Vec<AddRequestingMemberAction>,
    #[prost(message, repeated, tag = "17")]
    pub delete_requesting_members: Vec<DeleteRequestingMemberAction>,
    #[prost(message, repeated, tag = "18")]
    pub promote_requesting_members: Vec<PromoteRequestingMemberAction>,
    #[prost(message, optional, tag = "19")]
    pub modify_invite_link_password: Option<ModifyInviteLinkPasswordAction>,
    #[prost(message, optional, tag = "20")]
    pub modify_description: Option<ModifyDescriptionAction>,
    #[prost(message, optional, tag = "21")]
    pub modify_announcements_only: Option<ModifyAnnouncementsOnlyAction>,
    #[prost(message, repeated, tag = "22")]
    pub add_banned_members: Vec<AddBannedMemberAction>,
    #[prost(message, repeated, tag = "23")]
    pub delete_banned_members: Vec<DeleteBannedMemberAction>,
    #[prost(message, repeated, tag = "24")]
    pub promote_pending_pni_aci_members: Vec<PromotePendingPniAciMemberProfileKeyAction>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct AddMemberAction {
    #[prost(message, optional, tag = "1")]
    pub added: Option<Member>,
    #[prost(bool, tag = "2")]
    pub join_from_invite_link: bool,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct DeleteMemberAction {
    #[prost(bytes = "vec", tag = "1")]
    pub deleted_user_id: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ModifyMemberRoleAction {
    #[prost(bytes = "vec", tag = "1")]
    pub user_id: Vec<u8>,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ModifyMemberProfileKeyAction {
    #[prost(bytes = "vec", tag = "1")]
    pub presentation: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub user_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub profile_key: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct AddPendingMemberAction {
    #[prost(message, optional, tag = "1")]
    pub added: Option<PendingMember>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct DeletePendingMemberAction {
    #[prost(bytes = "vec", tag = "1")]
    pub deleted_user_id: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct PromotePendingMemberAction {
    #[prost(bytes = "vec", tag = "1")]
    pub presentation: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub user_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub profile_key: Vec<u8>,
}

impl From<&Member> for PromotePendingMemberAction {
    fn from(added: &Member) -> Self {
        Self {
            presentation: added.presentation.clone(),
            user_id: added.user_id.clone(),
            profile_key: added.profile_key.clone(),
        }
    }
}

impl From<&RequestingMember> for PromotePendingMemberAction {
    fn from(requested: &RequestingMember) -> Self {
        Self {
            presentation: requested.presentation.clone(),
            user_id: requested.user_id.clone(),
            profile_key: requested.profile_key.clone(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct PromotePendingPniAciMemberProfileKeyAction {
    #[prost(bytes = "vec", tag = "1")]
    pub presentation: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub user_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub pni: Vec<u8>,
    #[prost(bytes = "vec", tag = "4")]
    pub profile_key: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ModifyTitleAction {
    #[prost(bytes = "vec", tag = "1")]
    pub title: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ModifyAvatarAction {
    #[prost(string, tag = "1")]
    pub avatar: String,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ModifyDisappearingMessagesTimerAction {
    #[prost(bytes = "vec", tag = "1")]
    pub timer: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct ModifyAttributesAccessControlAction {
    #[prost(enumeration = "AccessRequired", tag = "1")]
    pub attributes_access: i32,
}

#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct ModifyMembersAccessControlAction {
    #[prost(enumeration = "AccessRequired", tag = "1")]
    pub members_access: i32,
}

#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct ModifyAddFromInviteLinkAccessControlAction {
    #[prost(enumeration = "AccessRequired", tag = "1")]
    pub add_from_invite_link_access: i32,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct AddRequestingMemberAction {
    #[prost(message, optional, tag = "1")]
    pub added: Option<RequestingMember>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct DeleteRequestingMemberAction {
    #[prost(bytes = "vec", tag = "1")]
    pub deleted_user_id: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct PromoteRequestingMemberAction {
    #[prost(bytes = "vec", tag = "1")]
    pub user_id: Vec<u8>,
    #[prost(enumeration = "Role", tag = "2")]
    pub role: i32,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ModifyInviteLinkPasswordAction {
    #[prost(bytes = "vec", tag = "1")]
    pub invite_link_password: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ModifyDescriptionAction {
    #[prost(bytes = "vec", tag = "1")]
    pub description: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct ModifyAnnouncementsOnlyAction {
    #[prost(bool, tag = "1")]
    pub announcements_only: bool,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct AddBannedMemberAction {
    #[prost(message, optional, tag = "1")]
    pub added: Option<BannedMember>,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct DeleteBannedMemberAction {
    #[prost(bytes = "vec", tag = "1")]
    pub deleted_user_id: Vec<u8>,
}

/// Plaintext of an encrypted group attribute.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct GroupAttributeBlob {
    #[prost(oneof = "group_attribute_blob::Content", tags = "1, 2, 3, 4")]
    pub content: Option<group_attribute_blob::Content>,
}

/// Nested types of [`GroupAttributeBlob`].
pub mod group_attribute_blob {
    /// Which attribute the blob holds.
    #[derive(Clone, PartialEq, Eq, prost::Oneof)]
    pub enum Content {
        #[prost(string, tag = "1")]
        Title(String),
        #[prost(bytes = "vec", tag = "2")]
        Avatar(Vec<u8>),
        #[prost(uint32, tag = "3")]
        DisappearingMessagesDuration(u32),
        #[prost(string, tag = "4")]
        DescriptionText(String),
    }
}
