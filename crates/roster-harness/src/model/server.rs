//! Reference model of the group server.
//!
//! The server keeps the authoritative group state and a log of every accepted
//! change together with the encrypted group record at that revision. It only
//! accepts a change that targets exactly the next revision; anything else is a
//! conflict the submitting device has to resolve and resubmit.
//!
//! # Invariants
//!
//! - Log revisions are consecutive, starting at the genesis revision
//! - The ban list never exceeds the configured capacity
//! - A rejected submission leaves state and log untouched

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use roster_core::{GroupOperations, apply_sequential};
use roster_proto::{
    GroupSnapshot, ServiceId,
    wire::{Group, GroupChange},
};
use tracing::{debug, warn};

use super::OperationError;

/// One accepted revision as devices download it.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Revision this entry produces.
    pub revision: u32,
    /// Signed change record. `None` for the genesis revision.
    pub change: Option<GroupChange>,
    /// Encrypted group record after the change.
    pub group: Group,
}

/// Authoritative server model.
#[derive(Debug)]
pub struct ModelServer {
    ops: GroupOperations,
    state: GroupSnapshot,
    log: Vec<LogEntry>,
    rng: ChaCha20Rng,
}

impl ModelServer {
    /// Start a group at `genesis`.
    pub fn new(ops: GroupOperations, genesis: GroupSnapshot, seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let group = ops.encrypt_group(&genesis, &mut rng);
        let log = vec![LogEntry { revision: genesis.revision, change: None, group }];
        Self { ops, state: genesis, log, rng }
    }

    /// Latest revision.
    pub fn revision(&self) -> u32 {
        self.state.revision
    }

    /// Latest state, in the clear.
    pub fn state(&self) -> &GroupSnapshot {
        &self.state
    }

    /// Latest encrypted group record.
    pub fn group_record(&self) -> &Group {
        // The log always holds at least the genesis entry.
        &self.log[self.log.len() - 1].group
    }

    /// Every revision in order.
    pub fn revisions(&self) -> Vec<u32> {
        self.log.iter().map(|entry| entry.revision).collect()
    }

    /// Entries after `revision`, oldest first.
    pub fn history_since(&self, revision: u32) -> &[LogEntry] {
        let start = self.log.partition_point(|entry| entry.revision <= revision);
        &self.log[start..]
    }

    /// Validate and apply a submitted change.
    ///
    /// Returns the revision the change produced.
    pub fn submit(&mut self, actions: Vec<u8>) -> Result<u32, OperationError> {
        let record = GroupChange { actions, server_signature: Vec::new(), change_epoch: 0 };
        let change = self.ops.decrypt_change(&record).ok_or(OperationError::Undecryptable)?;

        let expected = self.state.revision + 1;
        if change.revision != expected {
            debug!(submitted = change.revision, expected, "stale submission");
            return Err(OperationError::Conflict { current: self.state.revision });
        }

        if let Some(requester) = change
            .new_requesting_members
            .iter()
            .find(|r| self.state.is_banned(ServiceId::Aci(r.aci)))
        {
            warn!(aci = %requester.aci, "banned account asked to join");
            return Err(OperationError::Banned);
        }

        let next = apply_sequential(&self.state, &change)
            .map_err(|e| OperationError::NotApplicable(e.to_string()))?;

        let capacity = self.ops.config().max_banned_members;
        if next.banned_members.len() > capacity {
            return Err(OperationError::BanListFull { len: next.banned_members.len(), capacity });
        }

        let group = self.ops.encrypt_group(&next, &mut self.rng);
        self.log.push(LogEntry { revision: next.revision, change: Some(record), group });
        self.state = next;

        debug!(revision = self.state.revision, "change accepted");
        Ok(self.state.revision)
    }
}
