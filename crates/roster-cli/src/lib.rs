//! Command-line front end for the roster reconciliation engine.
//!
//! Exposes the engine's pure operations over files so that snapshots and
//! changes captured from a client can be replayed and inspected offline.
//!
//! # Usage
//!
//! ```bash
//! # Apply a change and print the resulting snapshot
//! roster apply group.json change.json --sequential
//!
//! # Replay server history captured as CBOR
//! roster --format cbor patch history.cbor --local group.cbor
//!
//! # Ban two identifiers against a small ban list
//! roster --max-banned-members 10 ban group.json <uuid> PNI:<uuid> --timestamp 1700000000000
//! ```

#![forbid(unsafe_code)]

pub mod commands;
pub mod error;
pub mod input;

pub use commands::{Classification, Cli, Command, run};
pub use error::CliError;
pub use input::Format;
