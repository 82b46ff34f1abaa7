//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default ban list capacity.
pub const DEFAULT_MAX_BANNED_MEMBERS: usize = 1000;

/// Highest change epoch this build understands.
pub const HIGHEST_KNOWN_EPOCH: u32 = 5;

/// Deployment-specific limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of entries in a group's ban list.
    pub max_banned_members: usize,
    /// Changes from a later epoch are ignored instead of decrypted.
    pub highest_known_epoch: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_banned_members: DEFAULT_MAX_BANNED_MEMBERS,
            highest_known_epoch: HIGHEST_KNOWN_EPOCH,
        }
    }
}
