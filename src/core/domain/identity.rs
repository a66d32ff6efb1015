//! Device identity.
//!
//! The public half of a device: what other devices need to address
//! envelopes to it and to verify its signatures. Private halves live only
//! in the secret store under [`signing_key_name`] / [`encryption_key_name`].

use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use x25519_dalek::PublicKey as X25519PublicKey;

use crate::core::cipher;
use crate::core::types::{DeviceId, PublicKeyB64};
use crate::error::Result;

/// Current identity record version.
pub const IDENTITY_VERSION: u32 = 1;

/// Public identity of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: DeviceId,
    pub name: String,
    pub platform: String,
    /// Ed25519 verifying key (base64)
    pub signing_public_key: PublicKeyB64,
    /// X25519 public key (base64)
    pub encryption_public_key: PublicKeyB64,
    pub created_at: DateTime<Utc>,
    pub version: u32,
}

impl DeviceIdentity {
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        cipher::parse_ed25519_public("signing_public_key", &self.signing_public_key)
    }

    pub fn encryption_key(&self) -> Result<X25519PublicKey> {
        cipher::parse_x25519_public("encryption_public_key", &self.encryption_public_key)
    }

    /// SHA-256 thumbprint of the signing key, used as `sender_kid`.
    pub fn thumbprint(&self) -> Result<String> {
        Ok(cipher::thumbprint(&self.verifying_key()?))
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.device_id)
    }
}

/// Secret-store name of a device's Ed25519 private key.
pub fn signing_key_name(device_id: &str) -> String {
    format!("device:{}:signingKey", device_id)
}

/// Secret-store name of a device's X25519 private key.
pub fn encryption_key_name(device_id: &str) -> String {
    format!("device:{}:encryptionKey", device_id)
}
