//! Roster group-state data model and wire records.
//!
//! Two representations of the same group live here:
//!
//! - Decrypted values the reconciliation engine reasons about:
//!   [`GroupSnapshot`] (state at one revision) and [`GroupChangeSet`] (sparse
//!   diff between revisions)
//! - Encrypted, field-numbered [`wire`] records exchanged with the group server
//!
//! ```text
//! wire::Group ──decrypt──► GroupSnapshot ──apply(GroupChangeSet)──► GroupSnapshot
//! wire::GroupChange ──decrypt──► GroupChangeSet
//! ```
//!
//! Encryption and the engine itself live in `roster-crypto` and `roster-core`.
//! This crate only defines the shapes and their invariants.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod change;
pub mod identifier;
pub mod model;
pub mod wire;

pub use change::{ChangeField, GroupChangeSet};
pub use identifier::{Aci, IdentifierError, Pni, ServiceId};
pub use model::{
    AccessControl, ApproveMember, BannedMember, GroupSnapshot, Member, ModifyMemberRole,
    PendingMember, PendingMemberRemoval, RequestingMember,
};
pub use wire::{AccessRequired, EnabledState, Role};
