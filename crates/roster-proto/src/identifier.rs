//! Service identifiers.
//!
//! An account is addressed either by its ACI, which never changes, or by its
//! PNI, which is tied to a phone number and may be replaced. Pending invites
//! can be keyed by either kind. Full members, join requests and the editor of
//! a promotion are always ACIs.
//!
//! # Binary form
//!
//! ```text
//! ACI: [uuid: 16 bytes]
//! PNI: [0x01][uuid: 16 bytes]
//! ```
//!
//! The binary form is what the operations codec encrypts, so it must stay
//! stable across releases.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind prefix of the binary PNI form.
pub const PNI_PREFIX: u8 = 0x01;

/// Length of the binary ACI form.
pub const ACI_LEN: usize = 16;

/// Length of the binary PNI form.
pub const PNI_LEN: usize = 17;

/// Errors from parsing identifier bytes.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierError {
    /// Byte string is neither 16 nor 17 bytes long.
    #[error("invalid service id length: {0} bytes")]
    InvalidLength(usize),

    /// 17-byte form with a prefix other than the PNI prefix.
    #[error("unknown service id kind prefix: {0:#04x}")]
    UnknownKind(u8),

    /// Text form is not a UUID, optionally prefixed with `PNI:`.
    #[error("malformed service id text")]
    MalformedText,
}

/// Account identifier (stable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aci(Uuid);

impl Aci {
    /// Placeholder for an editor or inviter that could not be decrypted.
    pub const UNKNOWN: Self = Self(Uuid::nil());

    /// Wrap a UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Build from a raw 128-bit value. Mostly useful in tests and tooling.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Underlying UUID.
    pub const fn uuid(self) -> Uuid {
        self.0
    }

    /// Whether this is the [`Aci::UNKNOWN`] placeholder.
    pub fn is_unknown(self) -> bool {
        self.0.is_nil()
    }

    /// Binary form (16 bytes).
    pub fn to_bytes(self) -> [u8; ACI_LEN] {
        *self.0.as_bytes()
    }

    /// Parse the 16-byte binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        let raw: [u8; ACI_LEN] =
            bytes.try_into().map_err(|_| IdentifierError::InvalidLength(bytes.len()))?;
        Ok(Self(Uuid::from_bytes(raw)))
    }
}

impl fmt::Display for Aci {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Phone-number identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pni(Uuid);

impl Pni {
    /// Wrap a UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Build from a raw 128-bit value.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Underlying UUID.
    pub const fn uuid(self) -> Uuid {
        self.0
    }

    /// Binary form (prefix + 16 bytes).
    pub fn to_bytes(self) -> [u8; PNI_LEN] {
        let mut out = [0u8; PNI_LEN];
        out[0] = PNI_PREFIX;
        out[1..].copy_from_slice(self.0.as_bytes());
        out
    }
}

impl fmt::Display for Pni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PNI:{}", self.0.hyphenated())
    }
}

/// Either kind of identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceId {
    /// Stable account identifier.
    Aci(Aci),
    /// Phone-number identifier.
    Pni(Pni),
}

impl ServiceId {
    /// Binary form: 16 bytes for an ACI, 17 for a PNI.
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            Self::Aci(aci) => aci.to_bytes().to_vec(),
            Self::Pni(pni) => pni.to_bytes().to_vec(),
        }
    }

    /// Parse either binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentifierError> {
        match bytes.len() {
            ACI_LEN => Aci::from_bytes(bytes).map(Self::Aci),
            PNI_LEN => {
                if bytes[0] != PNI_PREFIX {
                    return Err(IdentifierError::UnknownKind(bytes[0]));
                }
                let raw: [u8; ACI_LEN] = bytes[1..]
                    .try_into()
                    .map_err(|_| IdentifierError::InvalidLength(bytes.len()))?;
                Ok(Self::Pni(Pni(Uuid::from_bytes(raw))))
            },
            len => Err(IdentifierError::InvalidLength(len)),
        }
    }

    /// The ACI, if this is one.
    pub fn aci(self) -> Option<Aci> {
        match self {
            Self::Aci(aci) => Some(aci),
            Self::Pni(_) => None,
        }
    }

    /// The PNI, if this is one.
    pub fn pni(self) -> Option<Pni> {
        match self {
            Self::Aci(_) => None,
            Self::Pni(pni) => Some(pni),
        }
    }
}

impl From<Aci> for ServiceId {
    fn from(aci: Aci) -> Self {
        Self::Aci(aci)
    }
}

impl From<Pni> for ServiceId {
    fn from(pni: Pni) -> Self {
        Self::Pni(pni)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aci(aci) => aci.fmt(f),
            Self::Pni(pni) => pni.fmt(f),
        }
    }
}

/// Parses the [`fmt::Display`] form: a bare UUID is an ACI, `PNI:<uuid>` a PNI.
impl FromStr for ServiceId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (text, pni) = match s.strip_prefix("PNI:") {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let uuid = Uuid::parse_str(text).map_err(|_| IdentifierError::MalformedText)?;
        Ok(if pni { Self::Pni(Pni(uuid)) } else { Self::Aci(Aci(uuid)) })
    }
}
