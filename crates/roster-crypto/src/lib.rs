//! Roster Cryptographic Primitives
//!
//! Per-field encryption for group state. The group server stores and compares
//! ciphertext only; members share a [`GroupMasterKey`] and derive
//! [`GroupSecretParams`] from it.
//!
//! ```text
//! GroupMasterKey
//!        │
//!        ▼
//! HKDF → GroupSecretParams
//!        │
//!        ├─► service ids   (deterministic, matchable by the server)
//!        ├─► profile keys  (deterministic, bound to the owner's ACI)
//!        └─► title / description / timer blobs (randomized)
//! ```
//!
//! Pure functions with deterministic outputs. Callers provide random bytes
//! for deterministic testing.
//!
//! # Security
//!
//! - XChaCha20-Poly1305 authenticates every field; a failed tag rejects the
//!   field
//! - Deterministic encryption leaks equality of identifiers within one group,
//!   which the server needs to apply removals, and nothing else
//! - Key material is zeroized on drop

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod error;
pub mod keys;

pub use cipher::{BLOB_NONCE_SIZE, MIN_CIPHERTEXT_LEN};
pub use error::CryptoError;
pub use keys::{GroupMasterKey, GroupSecretParams, KEY_SIZE};
