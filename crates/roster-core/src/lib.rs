//! Roster group-state reconciliation engine.
//!
//! Clients of an end-to-end encrypted group each keep their own copy of the
//! group's state. This crate keeps those copies consistent with the server's
//! authoritative history without ever seeing plaintext on the server side.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  wire records ─►│ operations (decrypt/encrypt) │─► wire records
//!                 └──────────────┬───────────────┘
//!                                │ GroupSnapshot / GroupChangeSet
//!                 ┌──────────────▼───────────────┐
//!                 │ reconcile                    │
//!                 │  apply · reconstruct ·       │
//!                 │  resolve_conflict · is_empty │
//!                 └──────────────┬───────────────┘
//!                                │
//!                 ┌──────────────▼───────────────┐
//!                 │ patcher (server history)     │
//!                 └──────────────────────────────┘
//! ```
//!
//! Everything in [`reconcile`] and [`patcher`] is a pure function over
//! immutable values. Randomness is only needed to encrypt outgoing attribute
//! blobs and is injected through [`Entropy`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bans;
pub mod config;
pub mod env;
pub mod error;
pub mod operations;
pub mod patcher;
pub mod reconcile;

pub use bans::{BanPlan, plan_bans};
pub use config::EngineConfig;
pub use env::Entropy;
pub use error::{GroupDecryptError, NotAbleToApplyError, ResolveError};
pub use operations::{GroupCandidate, GroupOperations, ProposedChange};
pub use patcher::{AppliedEntry, LATEST, PatchOutcome, ServerHistoryEntry, patch};
pub use reconcile::{
    apply, apply_sequential, is_empty,
    is_empty_except_for_ban_changes_and_optional_profile_key_changes,
    is_empty_except_for_profile_key_changes, is_silent, reconstruct, resolve_conflict,
    resolve_conflict_with_actions,
};
