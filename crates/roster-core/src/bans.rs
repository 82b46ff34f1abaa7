//! Ban list capacity policy.
//!
//! The ban list holds at most `max_banned_members` entries. Banning more
//! evicts the oldest existing entries first, so a ban change carries a
//! delete for every slot it needs to free.
//!
//! # Invariants
//!
//! - `current.len() + incoming.len() - evict.len() <= capacity`, unless the
//!   incoming bans alone exceed capacity
//! - Eviction order is ascending timestamp; equal timestamps keep list order

use roster_proto::{BannedMember, ServiceId};
use tracing::debug;

/// Ban list edits needed to add `incoming` within capacity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BanPlan {
    /// Existing entries to remove, oldest first.
    pub evict: Vec<ServiceId>,
    /// New entries to add, in request order.
    pub add: Vec<BannedMember>,
}

/// Plan the ban list edits for banning `incoming` at `timestamp`.
pub fn plan_bans(
    current: &[BannedMember],
    incoming: &[ServiceId],
    timestamp: u64,
    capacity: usize,
) -> BanPlan {
    let spaces_to_free = (current.len() + incoming.len()).saturating_sub(capacity);

    let mut oldest: Vec<&BannedMember> = current.iter().collect();
    oldest.sort_by_key(|banned| banned.timestamp);
    let evict: Vec<ServiceId> =
        oldest.into_iter().take(spaces_to_free).map(|banned| banned.service_id).collect();

    if !evict.is_empty() {
        debug!(evicted = evict.len(), capacity, "ban list full, evicting oldest entries");
    }

    BanPlan { evict, add: incoming.iter().map(|id| BannedMember::new(*id, timestamp)).collect() }
}
