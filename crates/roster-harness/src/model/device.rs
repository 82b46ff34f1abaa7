//! Reference model of one device's view of the group.
//!
//! A device keeps its own snapshot and catches up by feeding the server's
//! history through [`roster_core::patch`]. Edits are proposed against the
//! local snapshot and submitted at the next revision. When the server reports
//! a conflict the device fetches the latest group record, resolves the
//! proposal against it and resubmits, or gives up once nothing is left.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use roster_core::{GroupOperations, LATEST, ServerHistoryEntry, patch, reconstruct};
use roster_proto::{Aci, GroupChangeSet, GroupSnapshot, ServiceId};
use tracing::{debug, trace, warn};

use super::{DeviceId, ModelServer, OperationError, OperationResult};

/// Submissions per edit before giving up.
pub const MAX_ATTEMPTS: u8 = 4;

/// One device with its local group state.
#[derive(Debug)]
pub struct ModelDevice {
    id: DeviceId,
    aci: Aci,
    ops: GroupOperations,
    state: GroupSnapshot,
    revision_history: Vec<u32>,
    rng: ChaCha20Rng,
}

impl ModelDevice {
    /// Device that has just downloaded `state`.
    pub fn new(
        id: DeviceId,
        aci: Aci,
        ops: GroupOperations,
        state: GroupSnapshot,
        seed: u64,
    ) -> Self {
        let revision_history = vec![state.revision];
        Self { id, aci, ops, state, revision_history, rng: ChaCha20Rng::seed_from_u64(seed) }
    }

    /// Device that downloads the server's latest record.
    ///
    /// Returns `None` if the record does not decrypt with this device's keys.
    pub fn joining(
        id: DeviceId,
        aci: Aci,
        ops: GroupOperations,
        server: &ModelServer,
        seed: u64,
    ) -> Option<Self> {
        let state = match ops.decrypt_group(server.group_record()) {
            Ok(state) => state,
            Err(error) => {
                warn!(%error, "group record does not decrypt");
                return None;
            },
        };
        Some(Self::new(id, aci, ops, state, seed))
    }

    /// Device index.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Account the device belongs to.
    pub fn aci(&self) -> Aci {
        self.aci
    }

    /// Local snapshot.
    pub fn state(&self) -> &GroupSnapshot {
        &self.state
    }

    /// Every revision the device has held, in order.
    pub fn revision_history(&self) -> &[u32] {
        &self.revision_history
    }

    /// Group operations bound to this device's keys.
    pub fn ops(&self) -> &GroupOperations {
        &self.ops
    }

    /// Catch up with everything the server has after the local revision.
    pub fn sync(&mut self, server: &ModelServer) {
        let history: Vec<ServerHistoryEntry> = server
            .history_since(self.state.revision)
            .iter()
            .map(|entry| ServerHistoryEntry {
                group: self.ops.decrypt_group(&entry.group).ok(),
                change: entry.change.as_ref().and_then(|change| self.ops.decrypt_change(change)),
            })
            .collect();

        let outcome = patch(Some(&self.state), &history, LATEST);
        trace!(device = self.id, processed = outcome.processed.len(), "synced");
        if let Some(updated) = outcome.updated
            && updated != self.state
        {
            self.set_state(updated);
        }
    }

    /// Edit by describing the desired end state.
    ///
    /// The change is whatever turns the local snapshot into the edited copy.
    pub fn edit_state(
        &mut self,
        server: &mut ModelServer,
        edit: impl FnOnce(&mut GroupSnapshot),
    ) -> OperationResult {
        let mut desired = self.state.clone();
        edit(&mut desired);
        let change = reconstruct(&self.state, &desired);
        self.submit(server, change)
    }

    /// Propose `change` as this device and push it to the server.
    ///
    /// The editor and target revision are filled in here.
    pub fn submit(&mut self, server: &mut ModelServer, change: GroupChangeSet) -> OperationResult {
        let change = GroupChangeSet {
            editor: Some(ServiceId::Aci(self.aci)),
            revision: self.state.revision + 1,
            ..change
        };

        // Retries resolve the original proposal, not the locally resolved one.
        let original = self.ops.propose(change, &mut self.rng);
        let mut proposal = match original.resolve(&self.state) {
            Ok(proposal) => proposal,
            Err(error) => return not_applicable(&error),
        };
        if proposal.is_empty() {
            trace!(device = self.id, "edit already reflected locally");
            return OperationResult::Unchanged;
        }

        for attempt in 1..=MAX_ATTEMPTS {
            match server.submit(proposal.encode_actions()) {
                Ok(revision) => {
                    self.sync(server);
                    return OperationResult::Accepted { revision, attempts: attempt };
                },
                Err(OperationError::Conflict { current }) => {
                    debug!(
                        device = self.id,
                        local = self.state.revision,
                        current,
                        "conflict, resolving"
                    );
                    let latest = match self.ops.decrypt_group(server.group_record()) {
                        Ok(latest) => latest,
                        Err(error) => return not_applicable(&error),
                    };
                    proposal = match original.resolve(&latest) {
                        Ok(resolved) => resolved.at_revision(latest.revision + 1),
                        Err(error) => return not_applicable(&error),
                    };
                    if proposal.is_empty() {
                        debug!(device = self.id, "proposal superseded by concurrent edits");
                        self.sync(server);
                        return OperationResult::Unchanged;
                    }
                },
                Err(error) => return OperationResult::Error(error),
            }
        }

        OperationResult::Error(OperationError::RetriesExhausted)
    }

    fn set_state(&mut self, state: GroupSnapshot) {
        self.revision_history.push(state.revision);
        self.state = state;
    }
}

fn not_applicable(error: &impl ToString) -> OperationResult {
    OperationResult::Error(OperationError::NotApplicable(error.to_string()))
}

#[cfg(test)]
mod tests {
    use roster_core::EngineConfig;
    use roster_crypto::GroupMasterKey;
    use roster_proto::{EnabledState, Member};

    use super::*;

    fn ops() -> GroupOperations {
        GroupOperations::new(&GroupMasterKey::new([5; 32]), EngineConfig::default())
    }

    fn genesis() -> GroupSnapshot {
        GroupSnapshot {
            title: "start".to_owned(),
            members: vec![Member::new(Aci::from_u128(1)), Member::new(Aci::from_u128(2))],
            is_announcement_group: EnabledState::Disabled,
            ..Default::default()
        }
    }

    fn setup() -> (ModelServer, ModelDevice, ModelDevice) {
        let server = ModelServer::new(ops(), genesis(), 1);
        let first = ModelDevice::joining(0, Aci::from_u128(1), ops(), &server, 10).unwrap();
        let second = ModelDevice::joining(1, Aci::from_u128(2), ops(), &server, 11).unwrap();
        (server, first, second)
    }

    #[test]
    fn accepted_edit_lands_locally() {
        let (mut server, mut device, _) = setup();

        let result = device.edit_state(&mut server, |s| s.title = "renamed".to_owned());

        assert_eq!(result, OperationResult::Accepted { revision: 1, attempts: 1 });
        assert_eq!(device.state(), server.state());
        assert_eq!(device.revision_history(), &[0, 1]);
    }

    #[test]
    fn no_op_edit_is_not_submitted() {
        let (mut server, mut device, _) = setup();

        let result = device.edit_state(&mut server, |s| s.title = "start".to_owned());

        assert_eq!(result, OperationResult::Unchanged);
        assert_eq!(server.revision(), 0);
    }

    #[test]
    fn stale_device_retries_after_conflict() {
        let (mut server, mut first, mut second) = setup();
        first.edit_state(&mut server, |s| s.title = "first".to_owned());

        let result = second.edit_state(&mut server, |s| s.disappearing_messages_timer = 60);

        assert_eq!(result, OperationResult::Accepted { revision: 2, attempts: 2 });
        assert_eq!(server.state().title, "first");
        assert_eq!(second.state(), server.state());
    }

    #[test]
    fn stale_refusal_reaches_the_server() {
        let (mut server, mut first, mut second) = setup();
        let requester = Aci::from_u128(9);
        let request = first.ops().join_request(requester, vec![9; 32], 5);
        first.submit(&mut server, request);

        let refusal =
            second.ops().refuse_join_requests(&[ServiceId::Aci(requester)], true, &[], 6);
        let result = second.submit(&mut server, refusal);

        assert_eq!(result, OperationResult::Accepted { revision: 2, attempts: 2 });
        assert!(server.state().requesting_members.is_empty());
        assert!(server.state().is_banned(ServiceId::Aci(requester)));
        assert_eq!(second.state(), server.state());
    }

    #[test]
    fn superseded_edit_is_abandoned() {
        let (mut server, mut first, mut second) = setup();
        first.edit_state(&mut server, |s| s.title = "same".to_owned());

        let result = second.edit_state(&mut server, |s| s.title = "same".to_owned());

        assert_eq!(result, OperationResult::Unchanged);
        assert_eq!(server.revision(), 1);
        assert_eq!(second.state(), server.state());
    }

    #[test]
    fn sync_catches_up_across_revisions() {
        let (mut server, mut first, mut second) = setup();
        first.edit_state(&mut server, |s| s.title = "a".to_owned());
        first.edit_state(&mut server, |s| s.title = "b".to_owned());

        second.sync(&server);

        assert_eq!(second.state(), server.state());
        assert_eq!(second.revision_history(), &[0, 2]);
    }
}
