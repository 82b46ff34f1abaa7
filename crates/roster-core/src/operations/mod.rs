//! Group operations: the codec between decrypted state and wire records.
//!
//! [`GroupOperations`] is bound to one group's secret parameters. It decrypts
//! server records into [`GroupSnapshot`]s and [`GroupChangeSet`]s, encrypts
//! local change-sets into wire actions, and offers builders for the changes a
//! member can propose.
//!
//! ```text
//! wire::Group ─────────► decrypt_group ──────────► GroupSnapshot
//! wire::GroupChange ───► decrypt_change ─────────► GroupChangeSet
//! GroupChangeSet ──────► propose / encrypt_change ► ProposedChange
//! ```
//!
//! A [`ProposedChange`] keeps the decrypted change and its wire actions side
//! by side, positionally aligned, so that conflict resolution can trim both
//! with one decision.

mod builders;
mod decrypt;
mod encrypt;

use std::fmt;

use prost::Message;
use roster_crypto::{GroupMasterKey, GroupSecretParams, KEY_SIZE};
use roster_proto::{
    Aci, GroupChangeSet, GroupSnapshot, ServiceId,
    wire::{GroupAttributeBlob, GroupChangeActions},
};

pub use builders::GroupCandidate;

use crate::{
    config::EngineConfig, env::Entropy,
    error::{GroupDecryptError, ResolveError},
    reconcile::{empty::is_empty, resolve::resolve_conflict_with_actions},
};

/// Codec for one group.
#[derive(Clone)]
pub struct GroupOperations {
    params: GroupSecretParams,
    config: EngineConfig,
}

impl fmt::Debug for GroupOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupOperations").field("config", &self.config).finish_non_exhaustive()
    }
}

impl GroupOperations {
    /// Operations for the group identified by `master_key`.
    pub fn new(master_key: &GroupMasterKey, config: EngineConfig) -> Self {
        Self { params: GroupSecretParams::derive(master_key), config }
    }

    /// Limits this codec enforces.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Public identifier of the group, as published to the server.
    pub fn group_identifier(&self) -> [u8; KEY_SIZE] {
        self.params.group_identifier()
    }

    /// Deterministic ciphertext of a service id within this group.
    pub fn encrypt_service_id(&self, service_id: ServiceId) -> Vec<u8> {
        self.params.encrypt_service_id(&service_id.to_bytes())
    }

    /// Encrypt `change` and keep both representations together.
    pub fn propose(&self, change: GroupChangeSet, entropy: &mut impl Entropy) -> ProposedChange {
        let actions = self.encrypt_change(&change, entropy);
        ProposedChange { change, actions }
    }

    fn decrypt_service_id(
        &self,
        ciphertext: &[u8],
        field: &'static str,
    ) -> Result<ServiceId, GroupDecryptError> {
        let bytes = self
            .params
            .decrypt_service_id(ciphertext)
            .map_err(|source| GroupDecryptError::Crypto { field, source })?;
        ServiceId::from_bytes(&bytes).map_err(|source| GroupDecryptError::Identifier {
            field,
            source,
        })
    }

    fn decrypt_aci(
        &self,
        ciphertext: &[u8],
        field: &'static str,
    ) -> Result<Aci, GroupDecryptError> {
        self.decrypt_service_id(ciphertext, field)?
            .aci()
            .ok_or(GroupDecryptError::WrongIdentifierKind { field })
    }

    fn encrypt_profile_key(&self, profile_key: &[u8], owner: Aci) -> Vec<u8> {
        self.params.encrypt_profile_key(profile_key, &owner.to_bytes())
    }

    fn decrypt_profile_key(
        &self,
        ciphertext: &[u8],
        owner: Aci,
        field: &'static str,
    ) -> Result<Vec<u8>, GroupDecryptError> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        self.params
            .decrypt_profile_key(ciphertext, &owner.to_bytes())
            .map_err(|source| GroupDecryptError::Crypto { field, source })
    }

    fn encrypt_blob(&self, blob: &GroupAttributeBlob, entropy: &mut impl Entropy) -> Vec<u8> {
        self.params.encrypt_blob(&blob.encode_to_vec(), entropy.blob_nonce())
    }

    fn decrypt_blob(
        &self,
        ciphertext: &[u8],
        field: &'static str,
    ) -> Result<GroupAttributeBlob, GroupDecryptError> {
        if ciphertext.is_empty() {
            return Ok(GroupAttributeBlob::default());
        }
        let plaintext = self
            .params
            .decrypt_blob(ciphertext)
            .map_err(|source| GroupDecryptError::Crypto { field, source })?;
        GroupAttributeBlob::decode(plaintext.as_slice())
            .map_err(|_| GroupDecryptError::MalformedBlob { field })
    }
}

/// A local change in both representations.
///
/// Entry `i` of every list in `actions` encrypts entry `i` of the matching
/// list in `change`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedChange {
    /// Decrypted intent.
    pub change: GroupChangeSet,
    /// Wire actions to submit.
    pub actions: GroupChangeActions,
}

impl ProposedChange {
    /// Target `revision` in both representations.
    #[must_use]
    pub fn at_revision(mut self, revision: u32) -> Self {
        self.change.revision = revision;
        self.actions.revision = revision;
        self
    }

    /// Drop everything stale against `snapshot` from both representations.
    pub fn resolve(&self, snapshot: &GroupSnapshot) -> Result<Self, ResolveError> {
        let (change, actions) =
            resolve_conflict_with_actions(snapshot, &self.change, &self.actions)?;
        Ok(Self { change, actions })
    }

    /// Nothing left to submit.
    pub fn is_empty(&self) -> bool {
        is_empty(&self.change)
    }

    /// Serialized actions, as carried in a `GroupChange`.
    pub fn encode_actions(&self) -> Vec<u8> {
        self.actions.encode_to_vec()
    }
}
