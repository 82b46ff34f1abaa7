//! Local history replay over a fetched server log.
//!
//! The server hands back a window of its history: per revision an
//! authoritative snapshot, a decrypted change, or both. [`patch`] walks that
//! window from the local snapshot and produces the sequence of local states a
//! client should record, together with the change that explains each step.
//!
//! When the server carries a snapshot that disagrees with what applying its
//! change locally produced, the server snapshot wins. The applied state is
//! still recorded first, followed by a repair entry whose change is
//! reconstructed between the two and has no editor.
//!
//! # Invariants
//!
//! - `processed` is in revision order and every entry's group is a state the
//!   client can persist as-is
//! - `updated` is the last processed group, or the local snapshot when
//!   nothing was processed
//! - Entries above `max_revision` are returned untouched in `remaining`

use roster_proto::{GroupChangeSet, GroupSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::reconcile::{apply, is_empty, reconstruct, resolve_conflict};

/// Ask [`patch`] to apply every entry the server returned.
pub const LATEST: u32 = u32::MAX;

/// One revision of server history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHistoryEntry {
    /// Authoritative snapshot at this revision, when the server sent one.
    pub group: Option<GroupSnapshot>,
    /// Change that produced this revision, when it could be decrypted.
    pub change: Option<GroupChangeSet>,
}

impl ServerHistoryEntry {
    /// Entry carrying both a snapshot and the change that produced it.
    pub fn new(group: GroupSnapshot, change: GroupChangeSet) -> Self {
        Self { group: Some(group), change: Some(change) }
    }

    /// Entry carrying only a snapshot.
    pub fn snapshot_only(group: GroupSnapshot) -> Self {
        Self { group: Some(group), change: None }
    }

    /// Entry carrying only a change.
    pub fn change_only(change: GroupChangeSet) -> Self {
        Self { group: None, change: Some(change) }
    }

    /// Revision this entry describes. `None` for an entry with neither half.
    pub fn revision(&self) -> Option<u32> {
        self.group
            .as_ref()
            .map(|group| group.revision)
            .or_else(|| self.change.as_ref().map(|change| change.revision))
    }
}

/// A local state together with the change that led to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEntry {
    /// State after the change.
    pub group: GroupSnapshot,
    /// Change that explains the step. `None` only for the very first state
    /// of a group learned without a change.
    pub change: Option<GroupChangeSet>,
}

impl AppliedEntry {
    fn new(group: GroupSnapshot, change: Option<GroupChangeSet>) -> Self {
        Self { group, change }
    }
}

/// Result of [`patch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOutcome {
    /// Latest local state, `None` when the group is still unknown.
    pub updated: Option<GroupSnapshot>,
    /// States to record, oldest first.
    pub processed: Vec<AppliedEntry>,
    /// Entries past `max_revision`, in server order.
    pub remaining: Vec<ServerHistoryEntry>,
}

/// Replay `history` on top of `local`, stopping after `max_revision`.
///
/// Entries older than the local revision are skipped, as is an entry at the
/// local revision whose snapshot matches the local one. Changes are resolved
/// against the current state before they are applied, so a change the client
/// already reflects contributes only its editor.
pub fn patch(
    local: Option<&GroupSnapshot>,
    history: &[ServerHistoryEntry],
    max_revision: u32,
) -> PatchOutcome {
    let mut current = local.cloned();
    let mut processed = Vec::new();
    let mut remaining = Vec::new();

    for (index, entry) in history.iter().enumerate() {
        let Some(revision) = entry.revision() else {
            warn!(index, "server history entry has neither group nor change, skipping");
            continue;
        };

        if revision > max_revision {
            remaining.extend_from_slice(&history[index..]);
            break;
        }

        if let Some(state) = &current
            && (revision < state.revision
                || (revision == state.revision && entry.group.as_ref() == Some(state)))
        {
            debug!(revision, local = state.revision, "already at or past revision, skipping");
            continue;
        }

        debug!(
            revision,
            has_group = entry.group.is_some(),
            has_change = entry.change.is_some(),
            "processing"
        );
        current = step(current, entry, &mut processed);
    }

    PatchOutcome { updated: current, processed, remaining }
}

fn step(
    current: Option<GroupSnapshot>,
    entry: &ServerHistoryEntry,
    processed: &mut Vec<AppliedEntry>,
) -> Option<GroupSnapshot> {
    match (current, &entry.group, &entry.change) {
        (None, Some(group), change) => {
            processed.push(AppliedEntry::new(group.clone(), change.clone()));
            Some(group.clone())
        },
        (None, None, Some(change)) => {
            warn!(
                revision = change.revision,
                "change for an unknown group cannot be applied, skipping"
            );
            None
        },
        (Some(state), group, Some(change)) => {
            let resolved = resolve_conflict(&state, change);
            match apply(&state, &resolved) {
                Ok(applied) => {
                    processed.push(AppliedEntry::new(applied.clone(), Some(resolved)));
                    match group {
                        Some(server) if *server != applied => {
                            info!(
                                revision = server.revision,
                                "local apply disagrees with server state, repairing"
                            );
                            push_reconstructed(&applied, server, processed);
                            Some(server.clone())
                        },
                        _ => Some(applied),
                    }
                },
                Err(err) => match group {
                    Some(server) => {
                        warn!(
                            revision = change.revision,
                            %err,
                            "change does not apply, taking server state"
                        );
                        push_reconstructed(&state, server, processed);
                        Some(server.clone())
                    },
                    None => {
                        warn!(
                            revision = change.revision,
                            %err,
                            "change does not apply and no server state, skipping"
                        );
                        Some(state)
                    },
                },
            }
        },
        (Some(state), Some(server), None) => {
            push_reconstructed(&state, server, processed);
            Some(server.clone())
        },
        (current, None, None) => current,
    }
}

fn push_reconstructed(from: &GroupSnapshot, to: &GroupSnapshot, processed: &mut Vec<AppliedEntry>) {
    let change = reconstruct(from, to);
    if is_empty(&change) && from.revision == to.revision {
        return;
    }
    processed.push(AppliedEntry::new(to.clone(), Some(change)));
}
