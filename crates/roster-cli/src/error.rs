//! CLI error types.

use std::path::PathBuf;

use roster_core::NotAbleToApplyError;
use thiserror::Error;

use crate::input::Format;

/// Errors that end a command.
#[derive(Error, Debug)]
pub enum CliError {
    /// Input file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying failure
        source: std::io::Error,
    },

    /// Input file is not a valid encoding of the expected value.
    #[error("{} is not valid {format:?}: {message}", path.display())]
    Decode {
        /// File being decoded
        path: PathBuf,
        /// Encoding the file was read as
        format: Format,
        /// Decoder message
        message: String,
    },

    /// Writing the result failed.
    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),

    /// Result could not be encoded as JSON.
    #[error("cannot encode output: {0}")]
    Encode(#[from] serde_json::Error),

    /// Change is inconsistent with the snapshot.
    #[error(transparent)]
    Apply(#[from] NotAbleToApplyError),
}
