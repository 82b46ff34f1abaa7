//! Reference model of a group server and the devices editing it.
//!
//! The model runs the real engine end to end: devices encrypt their proposals,
//! the server decrypts and sequences them, and devices catch up by patching
//! the server's history. Randomly generated [`Operation`] sequences exercise
//! concurrent edits, conflicts and stale devices.

mod device;
mod operation;
mod server;
mod world;

pub use device::{MAX_ATTEMPTS, ModelDevice};
pub use operation::{
    ACCOUNT_POOL, AccountId, DeviceId, Operation, OperationError, OperationResult, account_aci,
    account_profile_key,
};
pub use server::{LogEntry, ModelServer};
pub use world::{BAN_CAPACITY, ModelWorld, TIMER_PRESETS};
