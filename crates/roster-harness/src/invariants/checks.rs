//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::{collections::HashSet, hash::Hash};

use roster_proto::{GroupSnapshot, ServiceId};

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// No identifier appears twice in the same list.
///
/// Members, invites, join requests and bans are sets keyed by identifier.
/// A duplicate means an addition was applied without its membership check.
pub struct UniqueEntries;

impl Invariant for UniqueEntries {
    fn name(&self) -> &'static str {
        "unique_entries"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (label, group) in state.states() {
            let duplicate = first_duplicate(group.members.iter().map(|m| ServiceId::Aci(m.aci)))
                .map(|id| ("members", id))
                .or_else(|| {
                    first_duplicate(group.pending_members.iter().map(|p| p.service_id))
                        .map(|id| ("pending", id))
                })
                .or_else(|| {
                    first_duplicate(group.requesting_members.iter().map(|r| ServiceId::Aci(r.aci)))
                        .map(|id| ("requesting", id))
                })
                .or_else(|| {
                    first_duplicate(group.banned_members.iter().map(|b| b.service_id))
                        .map(|id| ("banned", id))
                });

            if let Some((list, id)) = duplicate {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{label} revision {}: {id} appears twice in {list}",
                        group.revision
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Full members are neither invited nor asking to join.
///
/// Membership supersedes an outstanding invite or join request, by ACI or by
/// the member's PNI.
pub struct DisjointLists;

impl Invariant for DisjointLists {
    fn name(&self) -> &'static str {
        "disjoint_lists"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (label, group) in state.states() {
            if let Some(id) = member_also_listed(group) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{label} revision {}: member {id} is still invited or requesting",
                        group.revision
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The ban list never grows past its capacity.
pub struct BanCapacity;

impl Invariant for BanCapacity {
    fn name(&self) -> &'static str {
        "ban_capacity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (label, group) in state.states() {
            if group.banned_members.len() > state.ban_capacity {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{label} revision {}: {} bans, capacity {}",
                        group.revision,
                        group.banned_members.len(),
                        state.ban_capacity
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Revisions only move forward.
///
/// The server's log is consecutive. A device may skip revisions while
/// catching up, but never goes back.
pub struct RevisionMonotonicity;

impl Invariant for RevisionMonotonicity {
    fn name(&self) -> &'static str {
        "revision_monotonicity"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for window in state.server_revisions.windows(2) {
            if window[1] != window[0] + 1 {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("server log jumps from {} to {}", window[0], window[1]),
                });
            }
        }

        if let Some(&last) = state.server_revisions.last()
            && last != state.server.revision
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "server state at {} but log ends at {last}",
                    state.server.revision
                ),
            });
        }

        for device in &state.devices {
            for window in device.revision_history.windows(2) {
                if window[1] < window[0] {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "device {}: revision decreased {} → {}",
                            device.id,
                            window[0],
                            window[1]
                        ),
                    });
                }
            }
            if device.revision_history.last() != Some(&device.state.revision) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "device {}: history does not end at {}",
                        device.id,
                        device.state.revision
                    ),
                });
            }
            if device.state.revision > state.server.revision {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "device {}: revision {} is ahead of server {}",
                        device.id, device.state.revision, state.server.revision
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A device at the server's revision holds the server's state.
///
/// Devices behind the server are not compared; they converge on their next
/// sync.
pub struct Convergence;

impl Invariant for Convergence {
    fn name(&self) -> &'static str {
        "convergence"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for device in &state.devices {
            if device.state.revision == state.server.revision && device.state != state.server {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "device {} diverged at revision {}:\n  device: {:?}\n  server: {:?}",
                        device.id, device.state.revision, device.state, state.server
                    ),
                });
            }
        }
        Ok(())
    }
}

fn first_duplicate<T: Eq + Hash + Copy>(ids: impl Iterator<Item = T>) -> Option<T> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

fn member_also_listed(group: &GroupSnapshot) -> Option<ServiceId> {
    group.members.iter().find_map(|member| {
        let aci = ServiceId::Aci(member.aci);
        if group.is_pending(aci) || group.is_requesting(member.aci) {
            return Some(aci);
        }
        member.pni.map(ServiceId::Pni).filter(|pni| group.is_pending(*pni))
    })
}
