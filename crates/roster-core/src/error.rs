//! Error types for the reconciliation engine.
//!
//! Most "not found" situations are silent no-ops so that replays and
//! out-of-order delivery stay safe. The errors here are the exceptions: they
//! mean a change is internally inconsistent with the state it claims to
//! follow, and the whole change must be rejected.

use roster_crypto::CryptoError;
use roster_proto::{Aci, ChangeField, IdentifierError};
use thiserror::Error;

/// A decrypted change cannot be applied to the given snapshot.
///
/// Applying is all-or-nothing: when this is returned, no part of the change
/// took effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotAbleToApplyError {
    /// Role change targets someone who is not a full member.
    #[error("cannot change role of non-member {aci}")]
    RoleChangeForNonMember {
        /// Targeted account
        aci: Aci,
    },

    /// Role change carries no role.
    #[error("role change for {aci} has no role")]
    RoleChangeWithoutRole {
        /// Targeted account
        aci: Aci,
    },

    /// Profile key change targets someone who is not a full member.
    #[error("cannot change profile key of non-member {aci}")]
    ProfileKeyForNonMember {
        /// Targeted account
        aci: Aci,
    },

    /// Approval of a join request that does not exist.
    #[error("cannot approve {aci}: no join request")]
    ApprovalForNonRequesting {
        /// Targeted account
        aci: Aci,
    },

    /// Approval carries no role.
    #[error("approval of {aci} has no role")]
    ApprovalWithoutRole {
        /// Targeted account
        aci: Aci,
    },

    /// Change does not directly follow the snapshot's revision.
    #[error("revision gap: snapshot is at {current}, change is for {change}")]
    RevisionGap {
        /// Snapshot revision
        current: u32,
        /// Change revision
        change: u32,
    },
}

/// A wire record could not be turned into decrypted state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupDecryptError {
    /// Ciphertext rejected by the group keys.
    #[error("{field}: {source}")]
    Crypto {
        /// Record field being decrypted
        field: &'static str,
        /// Underlying failure
        source: CryptoError,
    },

    /// Plaintext is not a valid service id.
    #[error("{field}: {source}")]
    Identifier {
        /// Record field being decrypted
        field: &'static str,
        /// Underlying failure
        source: IdentifierError,
    },

    /// A PNI appeared where only an ACI is allowed, or the reverse.
    #[error("{field}: wrong identifier kind")]
    WrongIdentifierKind {
        /// Record field being decrypted
        field: &'static str,
    },

    /// A required nested record is absent.
    #[error("{field}: missing record")]
    MissingRecord {
        /// Record field being decrypted
        field: &'static str,
    },

    /// Attribute blob did not decode, or holds a different attribute.
    #[error("{field}: malformed attribute blob")]
    MalformedBlob {
        /// Record field being decrypted
        field: &'static str,
    },

    /// Serialized actions did not decode.
    #[error("actions do not decode: {0}")]
    Decode(String),
}

/// The decrypted change and the wire actions are not positionally aligned.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// A field has a different number of entries in each representation.
    #[error(
        "field {} has {decrypted} decrypted entries but {encrypted} wire actions",
        .field.number()
    )]
    PositionMismatch {
        /// Misaligned field
        field: ChangeField,
        /// Entries in the decrypted change
        decrypted: usize,
        /// Entries in the wire actions
        encrypted: usize,
    },
}
