//! Decrypted group state.
//!
//! A [`GroupSnapshot`] is the full state of a group at one revision. Snapshots
//! are plain values: they are produced by decrypting a wire [`Group`] or by
//! applying a change-set to an earlier snapshot, and are replaced wholesale
//! when the revision advances.
//!
//! # Invariants
//!
//! - No two entries of `members` share an ACI
//! - No two entries of `pending_members`, `requesting_members` or
//!   `banned_members` share an identifier
//! - List order is insertion order and is exposed to callers
//!
//! [`Group`]: crate::wire::Group

use serde::{Deserialize, Serialize};

use crate::{
    identifier::{Aci, Pni, ServiceId},
    wire::{AccessRequired, EnabledState, Role},
};

/// Full member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Stable identifier.
    pub aci: Aci,
    /// Phone-number identifier, present only while a PNI invite is being
    /// promoted.
    #[serde(default)]
    pub pni: Option<Pni>,
    /// Role in the group.
    pub role: Role,
    /// Profile key. Empty when unknown.
    #[serde(default)]
    pub profile_key: Vec<u8>,
    /// Revision at which the member joined.
    #[serde(default)]
    pub joined_at_revision: i32,
}

impl Member {
    /// Member with the default role and no profile key.
    pub fn new(aci: Aci) -> Self {
        Self { aci, pni: None, role: Role::Default, profile_key: Vec::new(), joined_at_revision: 0 }
    }

    /// Builder-style role override.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Builder-style profile key override.
    #[must_use]
    pub fn with_profile_key(mut self, profile_key: impl Into<Vec<u8>>) -> Self {
        self.profile_key = profile_key.into();
        self
    }

    /// Builder-style joined-at override.
    #[must_use]
    pub fn with_joined_at(mut self, revision: i32) -> Self {
        self.joined_at_revision = revision;
        self
    }

    /// Builder-style PNI.
    #[must_use]
    pub fn with_pni(mut self, pni: Pni) -> Self {
        self.pni = Some(pni);
        self
    }
}

/// Invited member who has not accepted yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingMember {
    /// Invited identifier, either kind.
    pub service_id: ServiceId,
    /// Ciphertext of `service_id` as the server stores it.
    ///
    /// Removal actions must quote this exact ciphertext, and it is the only
    /// handle on an invite whose identifier could not be decrypted.
    #[serde(default)]
    pub service_id_ciphertext: Vec<u8>,
    /// Who sent the invite.
    pub added_by: Aci,
    /// Role the member receives on acceptance.
    pub role: Role,
    /// Invite time, milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: u64,
}

impl PendingMember {
    /// Invite with the default role and no ciphertext.
    pub fn new(service_id: impl Into<ServiceId>, added_by: Aci) -> Self {
        Self {
            service_id: service_id.into(),
            service_id_ciphertext: Vec::new(),
            added_by,
            role: Role::Default,
            timestamp: 0,
        }
    }
}

/// Removal of an invite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingMemberRemoval {
    /// Identifier being uninvited. [`Aci::UNKNOWN`] when the ciphertext could
    /// not be decrypted.
    pub service_id: ServiceId,
    /// Ciphertext quoted to the server.
    #[serde(default)]
    pub service_id_ciphertext: Vec<u8>,
}

impl PendingMemberRemoval {
    /// Removal carrying only the plaintext identifier.
    pub fn new(service_id: impl Into<ServiceId>) -> Self {
        Self { service_id: service_id.into(), service_id_ciphertext: Vec::new() }
    }
}

/// Join request made through the invite link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestingMember {
    /// Requesting account.
    pub aci: Aci,
    /// Profile key supplied with the request.
    #[serde(default)]
    pub profile_key: Vec<u8>,
    /// Request time, milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: u64,
}

impl RequestingMember {
    /// Request with no profile key.
    pub fn new(aci: Aci) -> Self {
        Self { aci, profile_key: Vec::new(), timestamp: 0 }
    }
}

/// Banned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BannedMember {
    /// Banned identifier, either kind.
    pub service_id: ServiceId,
    /// Ban time, milliseconds since the epoch. Oldest bans are evicted first.
    #[serde(default)]
    pub timestamp: u64,
}

impl BannedMember {
    /// Ban entry.
    pub fn new(service_id: impl Into<ServiceId>, timestamp: u64) -> Self {
        Self { service_id: service_id.into(), timestamp }
    }
}

/// Role change for a full member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModifyMemberRole {
    /// Member whose role changes.
    pub aci: Aci,
    /// New role. [`Role::Unknown`] means the role is missing.
    pub role: Role,
}

/// Approval of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApproveMember {
    /// Requesting account being approved.
    pub aci: Aci,
    /// Role granted. [`Role::Unknown`] means the role is missing.
    pub role: Role,
}

/// Access levels for the three classes of operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessControl {
    /// Who may edit title, avatar, description and timer.
    pub attributes: AccessRequired,
    /// Who may add members.
    pub members: AccessRequired,
    /// Who may join through the invite link.
    pub add_from_invite_link: AccessRequired,
}

/// Full group state at one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSnapshot {
    /// Server-assigned revision.
    pub revision: u32,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Opaque CDN key of the avatar.
    pub avatar: String,
    /// Disappearing messages timer in seconds; zero when off.
    pub disappearing_messages_timer: u32,
    /// Access levels.
    pub access_control: AccessControl,
    /// Full members.
    pub members: Vec<Member>,
    /// Outstanding invites.
    pub pending_members: Vec<PendingMember>,
    /// Outstanding join requests.
    pub requesting_members: Vec<RequestingMember>,
    /// Bans, bounded by the configured capacity.
    pub banned_members: Vec<BannedMember>,
    /// Invite link password.
    pub invite_link_password: Vec<u8>,
    /// Whether only administrators may post.
    pub is_announcement_group: EnabledState,
}

impl GroupSnapshot {
    /// Full member with the given ACI.
    pub fn find_member(&self, aci: Aci) -> Option<&Member> {
        self.members.iter().find(|m| m.aci == aci)
    }

    /// Whether `aci` is a full member.
    pub fn is_member(&self, aci: Aci) -> bool {
        self.find_member(aci).is_some()
    }

    /// Invite for the given identifier.
    pub fn find_pending_member(&self, service_id: ServiceId) -> Option<&PendingMember> {
        self.pending_members.iter().find(|p| p.service_id == service_id)
    }

    /// Invite whose server ciphertext matches exactly.
    pub fn find_pending_by_ciphertext(&self, ciphertext: &[u8]) -> Option<&PendingMember> {
        self.pending_members.iter().find(|p| p.service_id_ciphertext == ciphertext)
    }

    /// Whether `service_id` has an outstanding invite.
    pub fn is_pending(&self, service_id: ServiceId) -> bool {
        self.find_pending_member(service_id).is_some()
    }

    /// Join request from `aci`.
    pub fn find_requesting_member(&self, aci: Aci) -> Option<&RequestingMember> {
        self.requesting_members.iter().find(|r| r.aci == aci)
    }

    /// Whether `aci` has an outstanding join request.
    pub fn is_requesting(&self, aci: Aci) -> bool {
        self.find_requesting_member(aci).is_some()
    }

    /// Whether `aci` is invited or asking to join.
    pub fn is_pending_or_requesting(&self, aci: Aci) -> bool {
        self.is_pending(ServiceId::Aci(aci)) || self.is_requesting(aci)
    }

    /// Whether `service_id` is banned.
    pub fn is_banned(&self, service_id: ServiceId) -> bool {
        self.banned_members.iter().any(|b| b.service_id == service_id)
    }

    /// Copy of this snapshot without the given full member.
    ///
    /// Returns `None` when `aci` is not a member.
    #[must_use]
    pub fn without_member(&self, aci: Aci) -> Option<Self> {
        let index = self.members.iter().position(|m| m.aci == aci)?;
        let mut next = self.clone();
        next.members.remove(index);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aci(n: u128) -> Aci {
        Aci::from_u128(n)
    }

    #[test]
    fn test_is_member() {
        let snapshot = GroupSnapshot { members: vec![Member::new(aci(1))], ..Default::default() };

        assert!(snapshot.is_member(aci(1)));
        assert!(!snapshot.is_member(aci(2)));
    }

    #[test]
    fn pending_lookup_distinguishes_identifier_kinds() {
        let pni = Pni::from_uuid(aci(1).uuid());
        let snapshot = GroupSnapshot {
            pending_members: vec![PendingMember::new(pni, aci(9))],
            ..Default::default()
        };

        assert!(snapshot.is_pending(ServiceId::Pni(pni)));
        assert!(!snapshot.is_pending(ServiceId::Aci(aci(1))));
    }

    #[test]
    fn ciphertext_lookup_is_exact() {
        let mut invite = PendingMember::new(aci(1), aci(9));
        invite.service_id_ciphertext = vec![1, 2, 3];
        let snapshot = GroupSnapshot { pending_members: vec![invite], ..Default::default() };

        assert!(snapshot.find_pending_by_ciphertext(&[1, 2, 3]).is_some());
        assert!(snapshot.find_pending_by_ciphertext(&[1, 2]).is_none());
    }

    #[test]
    fn without_member_keeps_order() {
        let snapshot = GroupSnapshot {
            members: vec![Member::new(aci(1)), Member::new(aci(2)), Member::new(aci(3))],
            ..Default::default()
        };

        let next = snapshot.without_member(aci(2)).unwrap();
        assert_eq!(next.members, vec![Member::new(aci(1)), Member::new(aci(3))]);
        assert!(snapshot.without_member(aci(4)).is_none());
    }

    #[test]
    fn cbor_roundtrip() {
        let snapshot = GroupSnapshot {
            revision: 3,
            title: "team".to_owned(),
            members: vec![Member::new(aci(1)).with_role(Role::Administrator)],
            banned_members: vec![BannedMember::new(aci(2), 100)],
            is_announcement_group: EnabledState::Enabled,
            ..Default::default()
        };

        let mut bytes = Vec::new();
        ciborium::into_writer(&snapshot, &mut bytes).unwrap();
        let decoded: GroupSnapshot = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(decoded, snapshot);
    }
}
