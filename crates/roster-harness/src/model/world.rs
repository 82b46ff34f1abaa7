//! World that drives the server and devices with [`Operation`]s.
//!
//! Device `n` belongs to account `n`. At genesis every device's account is a
//! member and device 0 is the administrator. Accounts past the device count
//! act only through [`Operation::RequestToJoin`] and
//! [`Operation::AcceptInvite`], which download the latest record and submit
//! straight away.

use roster_core::{EngineConfig, GroupCandidate, GroupOperations};
use roster_crypto::GroupMasterKey;
use roster_proto::{EnabledState, GroupChangeSet, GroupSnapshot, Member, Role, ServiceId};
use tracing::debug;

use super::{
    AccountId, DeviceId, ModelDevice, ModelServer, Operation, OperationError, OperationResult,
    account_aci, account_profile_key,
};
use crate::invariants::{DeviceSnapshot, SystemSnapshot};

/// Ban list capacity the world runs with. Small so eviction actually happens.
pub const BAN_CAPACITY: usize = 3;

/// Disappearing message timer values devices pick from.
pub const TIMER_PRESETS: [u32; 4] = [0, 60, 3_600, 86_400];

const MASTER_KEY: [u8; 32] = [0x42; 32];
const START_TIME: u64 = 1_700_000_000_000;

/// Reference world: one server, several devices.
#[derive(Debug)]
pub struct ModelWorld {
    server: ModelServer,
    devices: Vec<ModelDevice>,
    clock: u64,
    seed: u64,
}

impl ModelWorld {
    /// World with `num_devices` devices and the default seed.
    pub fn new(num_devices: usize) -> Self {
        Self::with_seed(num_devices, 0)
    }

    /// World with `num_devices` devices, capped at the account pool.
    pub fn with_seed(num_devices: usize, seed: u64) -> Self {
        let count = num_devices.min(usize::from(super::ACCOUNT_POOL)) as u8;
        let genesis = GroupSnapshot {
            title: "genesis".to_owned(),
            members: (0..count)
                .map(|account| {
                    let role = if account == 0 { Role::Administrator } else { Role::Default };
                    Member::new(account_aci(account)).with_role(role).with_profile_key(
                        account_profile_key(account),
                    )
                })
                .collect(),
            is_announcement_group: EnabledState::Disabled,
            ..Default::default()
        };

        let server = ModelServer::new(Self::operations(), genesis.clone(), seed);
        let devices = (0..count)
            .map(|id| {
                ModelDevice::new(
                    id,
                    account_aci(id),
                    Self::operations(),
                    genesis.clone(),
                    seed ^ u64::from(id + 1),
                )
            })
            .collect();

        Self { server, devices, clock: START_TIME, seed }
    }

    fn operations() -> GroupOperations {
        GroupOperations::new(
            &GroupMasterKey::new(MASTER_KEY),
            EngineConfig { max_banned_members: BAN_CAPACITY, ..EngineConfig::default() },
        )
    }

    /// The server.
    pub fn server(&self) -> &ModelServer {
        &self.server
    }

    /// Device by index.
    pub fn device(&self, id: DeviceId) -> Option<&ModelDevice> {
        self.devices.get(usize::from(id))
    }

    /// Number of devices.
    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    /// Bring every device up to date.
    pub fn sync_all(&mut self) {
        for device in &mut self.devices {
            device.sync(&self.server);
        }
    }

    /// Apply an operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        self.clock += 1_000;
        let now = self.clock;
        debug!(?op, "applying");

        match op {
            Operation::RequestToJoin { account } => {
                let Some(mut outsider) = self.outsider(*account) else {
                    return OperationResult::Error(OperationError::Undecryptable);
                };
                let change =
                    outsider.ops().join_request(outsider.aci(), account_profile_key(*account), now);
                outsider.submit(&mut self.server, change)
            },
            Operation::AcceptInvite { account } => {
                let Some(mut outsider) = self.outsider(*account) else {
                    return OperationResult::Error(OperationError::Undecryptable);
                };
                let change =
                    outsider.ops().accept_invite(outsider.aci(), account_profile_key(*account));
                outsider.submit(&mut self.server, change)
            },
            Operation::Sync { device } => match self.devices.get_mut(usize::from(*device)) {
                Some(device) => {
                    device.sync(&self.server);
                    OperationResult::Unchanged
                },
                None => OperationResult::Error(OperationError::InvalidDevice),
            },
            Operation::SetTitle { device, title } => {
                let title = format!("title {}", title % 4);
                self.edit_state(*device, move |s| s.title = title)
            },
            Operation::SetTimer { device, preset } => {
                let timer = TIMER_PRESETS[usize::from(*preset) % TIMER_PRESETS.len()];
                self.edit_state(*device, move |s| s.disappearing_messages_timer = timer)
            },
            Operation::ChangeRole { device, account, admin } => {
                let aci = account_aci(*account);
                let role = if *admin { Role::Administrator } else { Role::Default };
                self.edit_state(*device, move |s| {
                    if let Some(member) = s.members.iter_mut().find(|m| m.aci == aci) {
                        member.role = role;
                    }
                })
            },
            Operation::AddMember { device, account, with_profile_key } => {
                let aci = account_aci(*account);
                let candidate = if *with_profile_key {
                    GroupCandidate::with_profile_key(aci, account_profile_key(*account))
                } else {
                    GroupCandidate::invitee(aci)
                };
                self.edit(
                    *device,
                    |d| d.ops().add_members(&[candidate], &d.state().banned_members, d.aci(), now),
                )
            },
            Operation::RemoveMember { device, account, ban } => {
                let aci = account_aci(*account);
                self.edit(
                    *device,
                    |d| d.ops().remove_members(&[aci], *ban, &d.state().banned_members, now),
                )
            },
            Operation::Ban { device, account } => {
                let id = ServiceId::Aci(account_aci(*account));
                self.edit(*device, |d| d.ops().ban(&[id], true, &d.state().banned_members, now))
            },
            Operation::Unban { device, account } => {
                let id = ServiceId::Aci(account_aci(*account));
                self.edit(*device, |d| d.ops().unban(&[id]))
            },
            Operation::ApproveRequest { device, account } => {
                let aci = account_aci(*account);
                self.edit(*device, |d| d.ops().approve_join_requests(&[aci]))
            },
            Operation::RefuseRequest { device, account, ban } => {
                let id = ServiceId::Aci(account_aci(*account));
                self.edit(
                    *device,
                    |d| d.ops().refuse_join_requests(&[id], *ban, &d.state().banned_members, now),
                )
            },
            Operation::RotateInviteLink { device, seed } => {
                let password = vec![*seed; 16];
                self.edit(*device, |d| d.ops().rotate_invite_link_password(password))
            },
        }
    }

    /// Observable state for invariant checks.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            server: self.server.state().clone(),
            server_revisions: self.server.revisions(),
            devices: self
                .devices
                .iter()
                .map(|device| DeviceSnapshot {
                    id: device.id(),
                    state: device.state().clone(),
                    revision_history: device.revision_history().to_vec(),
                })
                .collect(),
            ban_capacity: BAN_CAPACITY,
        }
    }

    fn edit(
        &mut self,
        device: DeviceId,
        build: impl FnOnce(&ModelDevice) -> GroupChangeSet,
    ) -> OperationResult {
        let Some(device) = self.devices.get_mut(usize::from(device)) else {
            return OperationResult::Error(OperationError::InvalidDevice);
        };
        let change = build(device);
        device.submit(&mut self.server, change)
    }

    fn edit_state(
        &mut self,
        device: DeviceId,
        edit: impl FnOnce(&mut GroupSnapshot),
    ) -> OperationResult {
        let Some(device) = self.devices.get_mut(usize::from(device)) else {
            return OperationResult::Error(OperationError::InvalidDevice);
        };
        device.edit_state(&mut self.server, edit)
    }

    /// Short-lived device for an account acting from outside the group.
    fn outsider(&self, account: AccountId) -> Option<ModelDevice> {
        let id = account % super::ACCOUNT_POOL;
        let seed = self.seed ^ self.clock;
        ModelDevice::joining(id, account_aci(account), Self::operations(), &self.server, seed)
    }
}
