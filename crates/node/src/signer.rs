//! Ed25519 signing service.

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey, Verifier, VerifyingKey};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use std::collections::HashMap;
use tessera_consensus::{Signer, SignerError};
use tessera_types::Hash;

/// In-process keystore keyed by well-known key names.
///
/// Keys are created lazily on [`Signer::get_or_upsert_key`]. The seeded
/// constructor derives per-name keys deterministically, which is what test
/// fixtures use.
pub struct KeystoreSigner {
    keys: Mutex<HashMap<String, SigningKey>>,
    seed: Option<[u8; 32]>,
}

impl KeystoreSigner {
    /// Keystore generating random keys.
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            seed: None,
        }
    }

    /// Keystore deriving every key deterministically from `seed`.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            seed: Some(seed),
        }
    }

    fn make_key(&self, name: &str) -> SigningKey {
        match self.seed {
            Some(seed) => {
                let mut material = seed.to_vec();
                material.extend_from_slice(name.as_bytes());
                SigningKey::from_bytes(Hash::digest(&material).as_bytes())
            }
            None => SigningKey::generate(&mut OsRng),
        }
    }
}

impl Default for KeystoreSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Signer for KeystoreSigner {
    async fn get_or_upsert_key(&self, name: &str) -> Result<(), SignerError> {
        let mut keys = self.keys.lock();
        if !keys.contains_key(name) {
            let key = self.make_key(name);
            keys.insert(name.to_string(), key);
        }
        Ok(())
    }

    async fn sign(&self, name: &str, digest: Hash) -> Result<Vec<u8>, SignerError> {
        let keys = self.keys.lock();
        let key = keys
            .get(name)
            .ok_or_else(|| SignerError::UnknownKey(name.to_string()))?;
        Ok(key.sign(digest.as_bytes()).to_bytes().to_vec())
    }

    async fn public_key(&self, name: &str) -> Result<Vec<u8>, SignerError> {
        let keys = self.keys.lock();
        let key = keys
            .get(name)
            .ok_or_else(|| SignerError::UnknownKey(name.to_string()))?;
        Ok(key.verifying_key().to_bytes().to_vec())
    }
}

/// Verify an ed25519 signature over a message.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &signature).is_ok()
}
