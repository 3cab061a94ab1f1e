//! AES-256-GCM encryption for wallet signing keys
//!
//! The key-encryption key is derived with Argon2id, either from an operator
//! passphrase or from a machine fingerprint.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use rand::RngCore;
use swapcycle_core::{Error, Result};

/// Encrypted signing key with the IV needed to open it
#[derive(Debug, Clone)]
pub struct EncryptedKey {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; 12],
}

impl EncryptedKey {
    /// Rebuild from stored columns, rejecting a malformed IV
    pub fn from_parts(ciphertext: Vec<u8>, iv: &[u8]) -> Result<Self> {
        let iv: [u8; 12] = iv
            .try_into()
            .map_err(|_| Error::DatabaseError("Invalid IV length".to_string()))?;
        Ok(Self { ciphertext, iv })
    }
}

/// Seals and opens signing keys at rest
pub struct KeyEncryptor {
    cipher: Aes256Gcm,
}

impl KeyEncryptor {
    /// Create a new encryptor from a 32-byte key
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(Error::EncryptionError(format!(
                "Key must be 32 bytes, got {}",
                key.len()
            )));
        }

        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|e| Error::EncryptionError(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// Create encryptor from a passphrase (derives the key via Argon2id)
    pub fn from_password(password: &str) -> Result<Self> {
        let key = derive_key_from_password(password, b"swapcycle-salt-v1")?;
        Self::new(&key)
    }

    /// Create encryptor bound to this machine
    pub fn for_machine() -> Result<Self> {
        let key = derive_machine_key()?;
        Self::new(&key)
    }

    /// Encrypt a secret with a fresh random IV
    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedKey> {
        let mut iv = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::EncryptionError(e.to_string()))?;

        Ok(EncryptedKey { ciphertext, iv })
    }

    pub fn decrypt(&self, encrypted: &EncryptedKey) -> Result<String> {
        let nonce = Nonce::from_slice(&encrypted.iv);

        let plaintext = self
            .cipher
            .decrypt(nonce, encrypted.ciphertext.as_ref())
            .map_err(|e| Error::EncryptionError(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| Error::EncryptionError(e.to_string()))
    }
}

fn derive_key_from_password(password: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| Error::EncryptionError(format!("Argon2 key derivation failed: {}", e)))?;
    Ok(key)
}

/// Machine-unique fingerprint: machine-uid plus hostname
pub fn get_machine_fingerprint() -> String {
    let machine_id =
        machine_uid::get().unwrap_or_else(|_| "fallback-no-machine-id".to_string());

    let hostname = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string());

    format!("swapcycle-{}-{}", machine_id, hostname)
}

/// Derive a 32-byte key that is stable on this machine and differs on others
pub fn derive_machine_key() -> Result<[u8; 32]> {
    let fingerprint = get_machine_fingerprint();
    derive_key_from_password(&fingerprint, b"swapcycle-daemon-v1-machine-salt")
}
