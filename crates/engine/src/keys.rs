//! Signing key access. Key material never leaves this module as text.

use alloy::hex;
use alloy::primitives::B256;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::sync::Arc;
use swapcycle_core::{Error, Result};
use swapcycle_persistence::{sqlite, Database, KeyEncryptor};

/// Resolves a wallet's signer on demand
#[async_trait]
pub trait SigningKeyProvider: Send + Sync {
    async fn signer(&self, wallet_id: i64) -> Result<PrivateKeySigner>;
}

/// Keys sealed with AES-GCM in the wallets table
pub struct EncryptedKeyProvider {
    db: Arc<Database>,
    encryptor: Arc<KeyEncryptor>,
}

impl EncryptedKeyProvider {
    pub fn new(db: Arc<Database>, encryptor: Arc<KeyEncryptor>) -> Self {
        Self { db, encryptor }
    }
}

#[async_trait]
impl SigningKeyProvider for EncryptedKeyProvider {
    async fn signer(&self, wallet_id: i64) -> Result<PrivateKeySigner> {
        let sealed = sqlite::get_wallet_key(self.db.pool(), wallet_id)
            .await?
            .ok_or_else(|| Error::WalletNotFound(wallet_id.to_string()))?;

        let key = self.encryptor.decrypt(&sealed).map_err(|_| {
            Error::InvalidSigningKey(format!("key for wallet {} could not be decrypted", wallet_id))
        })?;

        parse_signing_key(&key)
    }
}

/// Parse a 32-byte hex private key, with or without the 0x prefix
pub fn parse_signing_key(key: &str) -> Result<PrivateKeySigner> {
    let trimmed = key.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if digits.len() != 64 {
        return Err(Error::InvalidSigningKey(format!(
            "expected 64 hex digits, got {}",
            digits.len()
        )));
    }

    let bytes = hex::decode(digits)
        .map_err(|_| Error::InvalidSigningKey("key is not valid hex".to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::InvalidSigningKey("key must be 32 bytes".to_string()))?;

    PrivateKeySigner::from_bytes(&B256::from(bytes))
        .map_err(|_| Error::InvalidSigningKey("key is not a valid secp256k1 scalar".to_string()))
}

/// `0x`-prefixed hex form of a signer's key, for sealing
pub fn encode_signing_key(signer: &PrivateKeySigner) -> String {
    format!("0x{}", hex::encode(signer.to_bytes()))
}
