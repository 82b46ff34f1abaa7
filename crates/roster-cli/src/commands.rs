//! Command-line surface and command dispatch.
//!
//! Every command reads its inputs from files, runs one engine operation and
//! writes a single JSON document. Nothing is encrypted or decrypted here; the
//! inputs are already-decrypted snapshots and changes.

use std::{io::Write, path::PathBuf};

use clap::{Parser, Subcommand};
use roster_core::{
    EngineConfig, LATEST, ServerHistoryEntry, apply, apply_sequential, is_empty,
    is_empty_except_for_ban_changes_and_optional_profile_key_changes,
    is_empty_except_for_profile_key_changes, is_silent, patch, plan_bans, reconstruct,
    resolve_conflict,
};
use roster_proto::{GroupChangeSet, GroupSnapshot, ServiceId};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::CliError,
    input::{self, Format},
};

/// Group-state reconciliation tool
#[derive(Parser, Debug)]
#[command(name = "roster")]
#[command(about = "Apply, diff and reconcile decrypted group state")]
#[command(version)]
pub struct Cli {
    /// Encoding of input files
    #[arg(long, global = true, value_enum, default_value_t = Format::Json)]
    pub format: Format,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ban list capacity, overriding the configuration file
    #[arg(long, global = true)]
    pub max_banned_members: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Engine operations exposed on the command line.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a change to a snapshot and print the new snapshot
    Apply {
        /// Snapshot to apply to
        snapshot: PathBuf,
        /// Change to apply
        change: PathBuf,
        /// Require the change to be for the next revision
        #[arg(long)]
        sequential: bool,
    },

    /// Print the change that turns one snapshot into another
    Diff {
        /// Starting snapshot
        from: PathBuf,
        /// Target snapshot
        to: PathBuf,
    },

    /// Drop the parts of a change that a snapshot already reflects
    Resolve {
        /// Snapshot the change is resolved against
        snapshot: PathBuf,
        /// Change to resolve
        change: PathBuf,
    },

    /// Replay server history on top of a local snapshot
    Patch {
        /// Server history, oldest entry first
        history: PathBuf,
        /// Local snapshot; omitted when the group is not known yet
        #[arg(long)]
        local: Option<PathBuf>,
        /// Stop after this revision
        #[arg(long, default_value_t = LATEST)]
        max_revision: u32,
    },

    /// Report which emptiness checks a change passes
    Classify {
        /// Change to classify
        change: PathBuf,
    },

    /// Build the change that bans service ids, evicting the oldest bans when full
    Ban {
        /// Snapshot holding the current ban list
        snapshot: PathBuf,
        /// Service ids to ban: a UUID for an ACI, `PNI:<uuid>` for a PNI
        #[arg(required = true)]
        ids: Vec<ServiceId>,
        /// Ban timestamp in milliseconds
        #[arg(long)]
        timestamp: u64,
        /// Also refuse pending join requests from the banned accounts
        #[arg(long)]
        reject_join_request: bool,
    },
}

/// Which emptiness checks a change passes.
#[allow(clippy::struct_excessive_bools, reason = "One flag per predicate")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Nothing besides editor and revision.
    pub empty: bool,
    /// At most profile key updates.
    pub profile_keys_only: bool,
    /// At most ban edits and profile key updates.
    pub bans_and_profile_keys_only: bool,
    /// Does not warrant a visible update.
    pub silent: bool,
}

impl Classification {
    /// Run every emptiness check on `change`.
    pub fn of(change: &GroupChangeSet) -> Self {
        Self {
            empty: is_empty(change),
            profile_keys_only: is_empty_except_for_profile_key_changes(change),
            bans_and_profile_keys_only:
                is_empty_except_for_ban_changes_and_optional_profile_key_changes(change),
            silent: is_silent(change),
        }
    }
}

impl Cli {
    /// Configuration file merged with command-line overrides.
    pub fn engine_config(&self) -> Result<EngineConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => input::read(path, Format::Json)?,
            None => EngineConfig::default(),
        };
        if let Some(max) = self.max_banned_members {
            config.max_banned_members = max;
        }
        Ok(config)
    }
}

/// Run the parsed command, writing its result to `out`.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<(), CliError> {
    let config = cli.engine_config()?;
    debug!(?config, format = ?cli.format, "running command");

    match &cli.command {
        Command::Apply { snapshot, change, sequential } => {
            let snapshot: GroupSnapshot = input::read(snapshot, cli.format)?;
            let change: GroupChangeSet = input::read(change, cli.format)?;
            let next = if *sequential {
                apply_sequential(&snapshot, &change)?
            } else {
                apply(&snapshot, &change)?
            };
            info!(from = snapshot.revision, to = next.revision, "applied change");
            input::write_json(out, &next)
        },
        Command::Diff { from, to } => {
            let from: GroupSnapshot = input::read(from, cli.format)?;
            let to: GroupSnapshot = input::read(to, cli.format)?;
            input::write_json(out, &reconstruct(&from, &to))
        },
        Command::Resolve { snapshot, change } => {
            let snapshot: GroupSnapshot = input::read(snapshot, cli.format)?;
            let change: GroupChangeSet = input::read(change, cli.format)?;
            let resolved = resolve_conflict(&snapshot, &change);
            if is_empty(&resolved) {
                info!(revision = snapshot.revision, "change already reflected");
            }
            input::write_json(out, &resolved)
        },
        Command::Patch { history, local, max_revision } => {
            let history: Vec<ServerHistoryEntry> = input::read(history, cli.format)?;
            let local: Option<GroupSnapshot> =
                local.as_deref().map(|path| input::read(path, cli.format)).transpose()?;
            let outcome = patch(local.as_ref(), &history, *max_revision);
            info!(
                processed = outcome.processed.len(),
                remaining = outcome.remaining.len(),
                "patched history"
            );
            input::write_json(out, &outcome)
        },
        Command::Classify { change } => {
            let change: GroupChangeSet = input::read(change, cli.format)?;
            input::write_json(out, &Classification::of(&change))
        },
        Command::Ban { snapshot, ids, timestamp, reject_join_request } => {
            let snapshot: GroupSnapshot = input::read(snapshot, cli.format)?;
            let change = ban_change(&snapshot, ids, *timestamp, *reject_join_request, &config);
            input::write_json(out, &resolve_conflict(&snapshot, &change))
        },
    }
}

fn ban_change(
    snapshot: &GroupSnapshot,
    ids: &[ServiceId],
    timestamp: u64,
    reject_join_request: bool,
    config: &EngineConfig,
) -> GroupChangeSet {
    let fresh: Vec<ServiceId> = ids.iter().copied().filter(|id| !snapshot.is_banned(*id)).collect();
    let plan = plan_bans(&snapshot.banned_members, &fresh, timestamp, config.max_banned_members);
    let delete_requesting_members = if reject_join_request {
        ids.iter().filter_map(|id| id.aci()).collect()
    } else {
        Vec::new()
    };
    GroupChangeSet {
        revision: snapshot.revision + 1,
        delete_requesting_members,
        delete_banned_members: plan.evict,
        new_banned_members: plan.add,
        ..Default::default()
    }
}
