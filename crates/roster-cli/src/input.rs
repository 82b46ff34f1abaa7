//! Reading engine values from files and writing results.
//!
//! Inputs are JSON unless `--format cbor` is given. Output is always
//! pretty-printed JSON, one document per command.

use std::{fs, io::Write, path::Path};

use clap::ValueEnum;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::CliError;

/// Encoding of input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// JSON text
    #[default]
    Json,
    /// CBOR binary
    Cbor,
}

impl Format {
    /// Decode a value from `bytes`.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, String> {
        match self {
            Self::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            Self::Cbor => ciborium::from_reader(bytes).map_err(|e| e.to_string()),
        }
    }
}

/// Read and decode the file at `path`.
pub fn read<T: DeserializeOwned>(path: &Path, format: Format) -> Result<T, CliError> {
    let bytes =
        fs::read(path).map_err(|source| CliError::Io { path: path.to_owned(), source })?;
    format.decode(&bytes).map_err(|message| CliError::Decode {
        path: path.to_owned(),
        format,
        message,
    })
}

/// Write `value` as pretty JSON followed by a newline.
pub fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use roster_proto::GroupSnapshot;

    use super::*;

    #[test]
    fn cbor_and_json_decode_the_same_snapshot() {
        let snapshot = GroupSnapshot { title: "t".to_owned(), revision: 3, ..Default::default() };
        let mut cbor = Vec::new();
        ciborium::into_writer(&snapshot, &mut cbor).unwrap();
        let json = serde_json::to_vec(&snapshot).unwrap();

        assert_eq!(Format::Cbor.decode::<GroupSnapshot>(&cbor), Ok(snapshot.clone()));
        assert_eq!(Format::Json.decode::<GroupSnapshot>(&json), Ok(snapshot));
    }

    #[test]
    fn missing_file_names_the_path() {
        let error = read::<GroupSnapshot>(Path::new("/nonexistent/group.json"), Format::Json)
            .unwrap_err();

        assert!(error.to_string().starts_with("cannot read /nonexistent/group.json"));
    }
}
