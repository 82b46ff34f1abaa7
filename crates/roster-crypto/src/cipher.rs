//! `XChaCha20-Poly1305` constructions for group fields.
//!
//! Two layouts share the same framing:
//!
//! ```text
//! [nonce: 24 bytes][ciphertext][tag: 16 bytes]
//! ```
//!
//! - Deterministic: the nonce is HMAC-SHA256(mac key, aad || plaintext),
//!   truncated. Opening recomputes it and rejects a mismatch, so equal inputs
//!   always produce equal ciphertext and nothing else verifies.
//! - Randomized: the nonce is supplied by the caller.
//!
//! All functions are pure. Random bytes must be provided by the caller.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Nonce size for every construction.
pub const BLOB_NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
const POLY1305_TAG_SIZE: usize = 16;

/// Smallest well-formed ciphertext.
pub const MIN_CIPHERTEXT_LEN: usize = BLOB_NONCE_SIZE + POLY1305_TAG_SIZE;

pub(crate) fn seal_deterministic(
    mac_key: &[u8; 32],
    enc_key: &[u8; 32],
    plaintext: &[u8],
    aad: &[u8],
) -> Vec<u8> {
    let nonce = synthetic_nonce(mac_key, plaintext, aad);
    seal(enc_key, nonce, plaintext, aad)
}

pub(crate) fn open_deterministic(
    mac_key: &[u8; 32],
    enc_key: &[u8; 32],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let (nonce, plaintext) = open(enc_key, ciphertext, aad)?;
    if synthetic_nonce(mac_key, &plaintext, aad) != nonce {
        return Err(CryptoError::AuthenticationFailed);
    }
    Ok(plaintext)
}

pub(crate) fn seal_randomized(
    key: &[u8; 32],
    plaintext: &[u8],
    nonce: [u8; BLOB_NONCE_SIZE],
) -> Vec<u8> {
    seal(key, nonce, plaintext, &[])
}

pub(crate) fn open_randomized(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    open(key, ciphertext, &[]).map(|(_, plaintext)| plaintext)
}

fn seal(key: &[u8; 32], nonce: [u8; BLOB_NONCE_SIZE], plaintext: &[u8], aad: &[u8]) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let payload = Payload { msg: plaintext, aad };
    let Ok(sealed) = cipher.encrypt(XNonce::from_slice(&nonce), payload) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut out = Vec::with_capacity(BLOB_NONCE_SIZE + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    out
}

fn open(
    key: &[u8; 32],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<([u8; BLOB_NONCE_SIZE], Vec<u8>), CryptoError> {
    if ciphertext.len() < MIN_CIPHERTEXT_LEN {
        return Err(CryptoError::CiphertextTooShort {
            len: ciphertext.len(),
            min: MIN_CIPHERTEXT_LEN,
        });
    }

    let (nonce_bytes, sealed) = ciphertext.split_at(BLOB_NONCE_SIZE);
    let mut nonce = [0u8; BLOB_NONCE_SIZE];
    nonce.copy_from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new(key.into());
    let plaintext = cipher
        .decrypt(XNonce::from_slice(&nonce), Payload { msg: sealed, aad })
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    Ok((nonce, plaintext))
}

/// Nonce structure:
/// - HMAC input: `aad_len (u32 BE) || aad || plaintext`
/// - nonce: first 24 bytes of the MAC
fn synthetic_nonce(mac_key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> [u8; BLOB_NONCE_SIZE] {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(mac_key) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(&(aad.len() as u32).to_be_bytes());
    mac.update(aad);
    mac.update(plaintext);
    let digest = mac.finalize().into_bytes();

    let mut nonce = [0u8; BLOB_NONCE_SIZE];
    nonce.copy_from_slice(&digest[..BLOB_NONCE_SIZE]);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: [u8; 32] = [1; 32];
    const ENC: [u8; 32] = [2; 32];

    #[test]
    fn ciphertext_layout() {
        let sealed = seal_deterministic(&MAC, &ENC, b"abc", &[]);
        assert_eq!(sealed.len(), BLOB_NONCE_SIZE + 3 + POLY1305_TAG_SIZE);
        assert_eq!(&sealed[..BLOB_NONCE_SIZE], &synthetic_nonce(&MAC, b"abc", &[]));
    }

    #[test]
    fn too_short_is_reported() {
        let result = open_randomized(&ENC, &[0u8; 10]);
        assert_eq!(
            result,
            Err(CryptoError::CiphertextTooShort { len: 10, min: MIN_CIPHERTEXT_LEN })
        );
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut sealed = seal_randomized(&ENC, b"payload", [9; BLOB_NONCE_SIZE]);
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert_eq!(open_randomized(&ENC, &sealed), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn deterministic_rejects_foreign_nonce() {
        // Valid AEAD output under the right key, but not the synthetic nonce.
        let forged = seal(&ENC, [0; BLOB_NONCE_SIZE], b"abc", &[]);
        assert_eq!(
            open_deterministic(&MAC, &ENC, &forged, &[]),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn aad_length_prefix_separates_inputs() {
        assert_ne!(synthetic_nonce(&MAC, b"bc", b"a"), synthetic_nonce(&MAC, b"c", b"ab"));
    }
}
