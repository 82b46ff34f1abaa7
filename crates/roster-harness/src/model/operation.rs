//! Operations for model-based testing.
//!
//! Operations represent every action a device or an outside account can take
//! against the group. They are generated randomly by proptest (or decoded
//! from fuzz input via `Arbitrary`) and applied to a [`super::ModelWorld`].

use arbitrary::Arbitrary;
use roster_proto::Aci;
use serde::Serialize;

/// Device identifier (0-indexed). Device `n` belongs to account `n`.
pub type DeviceId = u8;

/// Account identifier. Reduced modulo [`ACCOUNT_POOL`] so that random input
/// keeps hitting the same few people.
pub type AccountId = u8;

/// Number of distinct accounts operations can target.
pub const ACCOUNT_POOL: u8 = 8;

/// ACI of an account.
pub fn account_aci(account: AccountId) -> Aci {
    Aci::from_u128(u128::from(account % ACCOUNT_POOL) + 1)
}

/// Profile key an account presents.
pub fn account_profile_key(account: AccountId) -> Vec<u8> {
    vec![account % ACCOUNT_POOL + 1; 32]
}

/// Operations that can be applied to the world.
#[derive(Debug, Clone, Arbitrary, Serialize)]
pub enum Operation {
    /// Device renames the group.
    SetTitle {
        /// Device making the edit.
        device: DeviceId,
        /// Title seed, rendered as `"title {seed % 4}"`.
        title: u8,
    },

    /// Device changes the disappearing message timer.
    SetTimer {
        /// Device making the edit.
        device: DeviceId,
        /// Index into a small set of timer presets.
        preset: u8,
    },

    /// Device promotes or demotes a member.
    ChangeRole {
        /// Device making the edit.
        device: DeviceId,
        /// Member whose role changes.
        account: AccountId,
        /// Target role is administrator, otherwise default.
        admin: bool,
    },

    /// Device adds an account directly, or invites it when no profile key is
    /// known.
    AddMember {
        /// Device making the edit.
        device: DeviceId,
        /// Account being added.
        account: AccountId,
        /// Whether the profile key is known (direct add) or not (invite).
        with_profile_key: bool,
    },

    /// Device removes a member, optionally banning them.
    RemoveMember {
        /// Device making the edit.
        device: DeviceId,
        /// Member being removed.
        account: AccountId,
        /// Also ban the account.
        ban: bool,
    },

    /// Device bans an account and rejects its join request.
    Ban {
        /// Device making the edit.
        device: DeviceId,
        /// Account being banned.
        account: AccountId,
    },

    /// Device lifts a ban.
    Unban {
        /// Device making the edit.
        device: DeviceId,
        /// Account being unbanned.
        account: AccountId,
    },

    /// Device approves a join request.
    ApproveRequest {
        /// Device making the edit.
        device: DeviceId,
        /// Requesting account.
        account: AccountId,
    },

    /// Device refuses a join request, optionally banning the requester.
    RefuseRequest {
        /// Device making the edit.
        device: DeviceId,
        /// Requesting account.
        account: AccountId,
        /// Also ban the account.
        ban: bool,
    },

    /// Device rotates the invite link password.
    RotateInviteLink {
        /// Device making the edit.
        device: DeviceId,
        /// Password seed.
        seed: u8,
    },

    /// Outside account asks to join through the invite link.
    RequestToJoin {
        /// Account asking.
        account: AccountId,
    },

    /// Invited account accepts its invite.
    AcceptInvite {
        /// Account accepting.
        account: AccountId,
    },

    /// Device catches up with the server's history.
    Sync {
        /// Device syncing.
        device: DeviceId,
    },
}

impl Operation {
    /// Device performing the operation, if a device performs it.
    pub fn device(&self) -> Option<DeviceId> {
        match self {
            Self::SetTitle { device, .. }
            | Self::SetTimer { device, .. }
            | Self::ChangeRole { device, .. }
            | Self::AddMember { device, .. }
            | Self::RemoveMember { device, .. }
            | Self::Ban { device, .. }
            | Self::Unban { device, .. }
            | Self::ApproveRequest { device, .. }
            | Self::RefuseRequest { device, .. }
            | Self::RotateInviteLink { device, .. }
            | Self::Sync { device } => Some(*device),
            Self::RequestToJoin { .. } | Self::AcceptInvite { .. } => None,
        }
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// A change was accepted at this revision.
    Accepted {
        /// Revision the server assigned.
        revision: u32,
        /// Submissions needed, including conflict retries.
        attempts: u8,
    },

    /// Operation completed without submitting anything (sync, or an edit
    /// that was already reflected).
    Unchanged,

    /// Operation failed.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Device index out of range.
    InvalidDevice,

    /// Submission was not based on the server's latest revision.
    Conflict {
        /// Server revision at the time of submission.
        current: u32,
    },

    /// Server could not decrypt the submitted change.
    Undecryptable,

    /// Change does not apply to the server's state.
    NotApplicable(String),

    /// A banned account asked to join.
    Banned,

    /// Change would grow the ban list past its capacity.
    BanListFull {
        /// Entries after the change.
        len: usize,
        /// Configured capacity.
        capacity: usize,
    },

    /// Conflict retries kept failing.
    RetriesExhausted,
}

impl OperationResult {
    /// Check if operation succeeded (including no-ops).
    pub fn is_ok(&self) -> bool {
        !self.is_err()
    }

    /// Check if operation failed.
    pub fn is_err(&self) -> bool {
        matches!(self, OperationResult::Error(_))
    }

    /// Revision assigned by the server, if a change was accepted.
    pub fn accepted_revision(&self) -> Option<u32> {
        match self {
            OperationResult::Accepted { revision, .. } => Some(*revision),
            OperationResult::Unchanged | OperationResult::Error(_) => None,
        }
    }
}
