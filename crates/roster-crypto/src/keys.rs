//! Group key hierarchy.
//!
//! ```text
//! GroupMasterKey (32 bytes, shared by members out of band)
//!        │
//!        ▼
//! HKDF-SHA256 ──► group identifier   (public, names the group to the server)
//!             ──► service id key     (mac + enc)
//!             ──► profile key key    (mac + enc)
//!             ──► blob key           (enc)
//! ```
//!
//! Every subkey has its own label so compromising one purpose does not reveal
//! another. All key material is zeroized on drop.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::cipher::{self, BLOB_NONCE_SIZE};
use crate::error::CryptoError;

/// Size of the master key and every derived key.
pub const KEY_SIZE: usize = 32;

const GROUP_IDENTIFIER_LABEL: &[u8] = b"rosterGroupIdentifierV1";
const SERVICE_ID_MAC_LABEL: &[u8] = b"rosterServiceIdMacV1";
const SERVICE_ID_ENC_LABEL: &[u8] = b"rosterServiceIdEncV1";
const PROFILE_KEY_MAC_LABEL: &[u8] = b"rosterProfileKeyMacV1";
const PROFILE_KEY_ENC_LABEL: &[u8] = b"rosterProfileKeyEncV1";
const BLOB_LABEL: &[u8] = b"rosterBlobV1";

/// Root secret of one group.
#[derive(Clone)]
pub struct GroupMasterKey([u8; KEY_SIZE]);

impl GroupMasterKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl Drop for GroupMasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for GroupMasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GroupMasterKey(..)")
    }
}

/// Keys for one deterministic purpose.
#[derive(Clone)]
struct SivKey {
    mac: [u8; KEY_SIZE],
    enc: [u8; KEY_SIZE],
}

impl Drop for SivKey {
    fn drop(&mut self) {
        self.mac.zeroize();
        self.enc.zeroize();
    }
}

/// Secret parameters derived from a [`GroupMasterKey`].
///
/// # Security
///
/// - Service id and profile key encryption are deterministic per (plaintext,
///   group). Equal identifiers encrypt to equal ciphertext, which lets the
///   server match removals against stored entries without seeing plaintext.
/// - Profile keys are bound to their owner's ACI as associated data.
/// - Blob encryption is randomized; the caller supplies the nonce.
#[derive(Clone)]
pub struct GroupSecretParams {
    group_identifier: [u8; KEY_SIZE],
    service_id: SivKey,
    profile_key: SivKey,
    blob: [u8; KEY_SIZE],
}

impl GroupSecretParams {
    /// Derive all subkeys from the master key.
    pub fn derive(master_key: &GroupMasterKey) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, master_key.as_bytes());

        Self {
            group_identifier: expand(&hkdf, GROUP_IDENTIFIER_LABEL),
            service_id: SivKey {
                mac: expand(&hkdf, SERVICE_ID_MAC_LABEL),
                enc: expand(&hkdf, SERVICE_ID_ENC_LABEL),
            },
            profile_key: SivKey {
                mac: expand(&hkdf, PROFILE_KEY_MAC_LABEL),
                enc: expand(&hkdf, PROFILE_KEY_ENC_LABEL),
            },
            blob: expand(&hkdf, BLOB_LABEL),
        }
    }

    /// Public identifier of the group.
    pub fn group_identifier(&self) -> [u8; KEY_SIZE] {
        self.group_identifier
    }

    /// Encrypt a binary service id. Deterministic.
    pub fn encrypt_service_id(&self, service_id: &[u8]) -> Vec<u8> {
        cipher::seal_deterministic(&self.service_id.mac, &self.service_id.enc, service_id, &[])
    }

    /// Decrypt a service id ciphertext back to its binary form.
    pub fn decrypt_service_id(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        cipher::open_deterministic(&self.service_id.mac, &self.service_id.enc, ciphertext, &[])
    }

    /// Encrypt a profile key for the member identified by `owner`.
    pub fn encrypt_profile_key(&self, profile_key: &[u8], owner: &[u8]) -> Vec<u8> {
        cipher::seal_deterministic(&self.profile_key.mac, &self.profile_key.enc, profile_key, owner)
    }

    /// Decrypt a profile key. Fails if `owner` differs from the one used to
    /// encrypt.
    pub fn decrypt_profile_key(
        &self,
        ciphertext: &[u8],
        owner: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        cipher::open_deterministic(&self.profile_key.mac, &self.profile_key.enc, ciphertext, owner)
    }

    /// Encrypt an attribute blob with a caller-provided random nonce.
    pub fn encrypt_blob(&self, plaintext: &[u8], nonce: [u8; BLOB_NONCE_SIZE]) -> Vec<u8> {
        cipher::seal_randomized(&self.blob, plaintext, nonce)
    }

    /// Decrypt an attribute blob.
    pub fn decrypt_blob(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        cipher::open_randomized(&self.blob, ciphertext)
    }
}

impl Drop for GroupSecretParams {
    fn drop(&mut self) {
        self.blob.zeroize();
    }
}

impl std::fmt::Debug for GroupSecretParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupSecretParams")
            .field("group_identifier", &self.group_identifier)
            .finish_non_exhaustive()
    }
}

fn expand(hkdf: &Hkdf<Sha256>, label: &[u8]) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    let Ok(()) = hkdf.expand(label, &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: u8) -> GroupSecretParams {
        GroupSecretParams::derive(&GroupMasterKey::new([seed; KEY_SIZE]))
    }

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(params(1).group_identifier(), params(1).group_identifier());
        assert_ne!(params(1).group_identifier(), params(2).group_identifier());
    }

    #[test]
    fn group_identifier_matches_hkdf_vector() {
        let mut bytes = [0u8; KEY_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let params = GroupSecretParams::derive(&GroupMasterKey::new(bytes));

        assert_eq!(
            hex::encode(params.group_identifier()),
            "bc794b470c7fefda7eeb0250f8b3d4cd7e51010cfa56149d34e43c86b3ee2e27"
        );
    }

    #[test]
    fn subkeys_are_distinct() {
        let p = params(3);
        assert_ne!(p.service_id.enc, p.profile_key.enc);
        assert_ne!(p.service_id.mac, p.service_id.enc);
        assert_ne!(p.blob, p.group_identifier);
    }

    #[test]
    fn service_id_encryption_is_deterministic_per_group() {
        let id = [7u8; 16];

        assert_eq!(params(1).encrypt_service_id(&id), params(1).encrypt_service_id(&id));
        assert_ne!(params(1).encrypt_service_id(&id), params(2).encrypt_service_id(&id));
        assert_ne!(params(1).encrypt_service_id(&id), params(1).encrypt_service_id(&[8u8; 16]));
    }

    #[test]
    fn service_id_roundtrip_and_cross_group_rejection() {
        let ciphertext = params(1).encrypt_service_id(&[9u8; 17]);

        assert_eq!(params(1).decrypt_service_id(&ciphertext).unwrap(), vec![9u8; 17]);
        assert_eq!(
            params(2).decrypt_service_id(&ciphertext),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn profile_key_is_bound_to_owner() {
        let p = params(4);
        let ciphertext = p.encrypt_profile_key(&[1u8; 32], &[2u8; 16]);

        assert_eq!(p.decrypt_profile_key(&ciphertext, &[2u8; 16]).unwrap(), vec![1u8; 32]);
        assert_eq!(
            p.decrypt_profile_key(&ciphertext, &[3u8; 16]),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn blob_uses_caller_nonce() {
        let p = params(5);
        let a = p.encrypt_blob(b"title", [1u8; BLOB_NONCE_SIZE]);
        let b = p.encrypt_blob(b"title", [2u8; BLOB_NONCE_SIZE]);

        assert_ne!(a, b);
        assert_eq!(p.decrypt_blob(&a).unwrap(), b"title");
        assert_eq!(p.decrypt_blob(&b).unwrap(), b"title");
    }

    #[test]
    fn debug_does_not_print_secrets() {
        let rendered = format!("{:?}", GroupMasterKey::new([0xab; KEY_SIZE]));
        assert!(!rendered.contains("171"));
    }
}
