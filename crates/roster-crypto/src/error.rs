//! Crypto error types.

use thiserror::Error;

/// Errors from decrypting group fields.
///
/// Encryption never fails; every variant here describes untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Ciphertext cannot hold a nonce and a tag.
    #[error("ciphertext too short: {len} bytes, need at least {min}")]
    CiphertextTooShort {
        /// Actual length.
        len: usize,
        /// Minimum length.
        min: usize,
    },

    /// Tag or synthetic nonce did not verify. Wrong key or tampered input.
    #[error("authentication failed")]
    AuthenticationFailed,
}
