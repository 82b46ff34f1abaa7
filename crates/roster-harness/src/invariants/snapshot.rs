//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use roster_proto::GroupSnapshot;

/// Snapshot of the server and every device.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Authoritative group state.
    pub server: GroupSnapshot,
    /// Revisions in the server's log, oldest first.
    pub server_revisions: Vec<u32>,
    /// Per-device state snapshots.
    pub devices: Vec<DeviceSnapshot>,
    /// Configured ban list capacity.
    pub ban_capacity: usize,
}

impl SystemSnapshot {
    /// Empty group at revision zero, no devices.
    pub fn empty() -> Self {
        Self { server_revisions: vec![0], ban_capacity: usize::MAX, ..Default::default() }
    }

    /// Add a device snapshot.
    #[must_use]
    pub fn with_device(mut self, device: DeviceSnapshot) -> Self {
        self.devices.push(device);
        self
    }

    /// Every group state in the snapshot, labelled for reporting.
    pub fn states(&self) -> impl Iterator<Item = (String, &GroupSnapshot)> {
        std::iter::once(("server".to_owned(), &self.server))
            .chain(self.devices.iter().map(|d| (format!("device {}", d.id), &d.state)))
    }
}

/// Snapshot of a single device.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    /// Device identifier.
    pub id: u8,
    /// Local group state.
    pub state: GroupSnapshot,
    /// Every revision the device has held, in order.
    pub revision_history: Vec<u32>,
}

impl DeviceSnapshot {
    /// Device holding `state` since the start.
    pub fn new(id: u8, state: GroupSnapshot) -> Self {
        let revision_history = vec![state.revision];
        Self { id, state, revision_history }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let snapshot = SystemSnapshot::empty();
        assert!(snapshot.devices.is_empty());
        assert_eq!(snapshot.states().count(), 1);
    }

    #[test]
    fn states_are_labelled() {
        let snapshot = SystemSnapshot::empty()
            .with_device(DeviceSnapshot::new(3, GroupSnapshot::default()))
            .with_device(DeviceSnapshot::new(5, GroupSnapshot::default()));

        let labels: Vec<String> = snapshot.states().map(|(label, _)| label).collect();

        assert_eq!(labels, vec!["server", "device 3", "device 5"]);
    }
}
