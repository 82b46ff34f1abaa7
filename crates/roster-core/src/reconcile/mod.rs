//! Reconciliation of decrypted group state.
//!
//! Four pure functions over immutable values:
//!
//! - [`apply`]: snapshot + change -> next snapshot
//! - [`reconstruct`]: two snapshots -> the change between them
//! - [`resolve_conflict`] / [`resolve_conflict_with_actions`]: strip entries
//!   of a locally built change that are stale against the current snapshot
//! - [`is_empty`] and friends: classify what a change touches
//!
//! Each one handles every change-set field explicitly, either by
//! destructuring [`GroupChangeSet`](roster_proto::GroupChangeSet) without
//! `..` or by matching [`ChangeField`](roster_proto::ChangeField) without a
//! wildcard arm.

pub mod apply;
pub mod empty;
pub mod reconstruct;
pub mod resolve;

pub use apply::{apply, apply_sequential};
pub use empty::{
    actions_are_empty, is_empty, is_empty_except_for_ban_changes_and_optional_profile_key_changes,
    is_empty_except_for_profile_key_changes, is_silent,
};
pub use reconstruct::reconstruct;
pub use resolve::{ConflictPlan, Verdict, resolve_conflict, resolve_conflict_with_actions};
