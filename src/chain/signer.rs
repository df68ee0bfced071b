use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use blake2::{digest::consts::U32, Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey};

use crate::{
    config::Config,
    error::{AppError, Result},
};

type Blake2b256 = Blake2b<U32>;

const ED25519_FLAG: u8 = 0x00;
/// Intent prefix for a transaction signed on Sui: scope, version, app id.
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Backend signing credential. Only the backend holds it; players never see it.
pub struct BackendSigner {
    key: SigningKey,
    address: String,
}

impl BackendSigner {
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_secret(&config.backend_private_key)
    }

    /// Accepts a 32-byte ed25519 secret as hex, or as base64 with or without
    /// the leading scheme flag byte.
    pub fn from_secret(raw: &str) -> Result<Self> {
        let secret = parse_secret(raw)?;
        let key = SigningKey::from_bytes(&secret);
        let address = address_of(&key);
        Ok(Self { key, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Signs raw transaction bytes and returns the serialized signature
    /// (`flag || signature || public key`, base64).
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        let mut hasher = Blake2b256::new();
        hasher.update(TRANSACTION_INTENT);
        hasher.update(tx_bytes);
        let digest = hasher.finalize();

        let signature = self.key.sign(&digest);
        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(self.key.verifying_key().as_bytes());
        BASE64.encode(serialized)
    }
}

fn parse_secret(raw: &str) -> Result<[u8; 32]> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Config("Backend private key is empty".to_string()));
    }

    let hex_digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = if hex_digits.len() == 64 && hex_digits.chars().all(|c| c.is_ascii_hexdigit()) {
        hex::decode(hex_digits)
            .map_err(|e| AppError::Config(format!("Invalid hex private key: {}", e)))?
    } else {
        let decoded = BASE64
            .decode(trimmed)
            .map_err(|e| AppError::Config(format!("Invalid base64 private key: {}", e)))?;
        match decoded.len() {
            33 if decoded[0] == ED25519_FLAG => decoded[1..].to_vec(),
            33 => {
                return Err(AppError::Config(
                    "Only ed25519 backend keys are supported".to_string(),
                ))
            }
            _ => decoded,
        }
    };

    bytes
        .try_into()
        .map_err(|_| AppError::Config("Backend private key must be 32 bytes".to_string()))
}

fn address_of(key: &SigningKey) -> String {
    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(key.verifying_key().as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}
