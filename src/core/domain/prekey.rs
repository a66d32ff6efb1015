//! Signed and one-time prekeys.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::PublicKey as X25519PublicKey;
use zeroize::Zeroizing;

use crate::core::cipher;
use crate::core::encoding;
use crate::core::types::{PrekeyId, PublicKeyB64};
use crate::error::{CipherError, Result};

/// Medium-term X25519 key signed by the owning device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPrekey {
    pub id: PrekeyId,
    pub public_key: PublicKeyB64,
    /// Ed25519 signature over the raw public key bytes (base64)
    pub signature: String,
    pub created_at: DateTime<Utc>,
    /// RFC 3339 expiry. Kept as text: an unparsable value means "never expires".
    pub expires_at: String,
    #[serde(default)]
    pub revoked: bool,
}

impl SignedPrekey {
    /// Parsed expiry, `None` when the stored value is unparsable.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry().map(|expiry| now >= expiry).unwrap_or(false)
    }

    pub fn public_key(&self) -> Result<X25519PublicKey> {
        cipher::parse_x25519_public("public_key", &self.public_key)
    }

    /// Check the prekey signature against the owning device's signing key.
    pub fn verify(&self, signer: &VerifyingKey) -> Result<()> {
        let public_key = encoding::decode("public_key", &self.public_key)?;
        let sig: [u8; 64] = encoding::decode_array("signature", &self.signature)?;
        signer
            .verify(&public_key, &Signature::from_bytes(&sig))
            .map_err(|_| CipherError::BadSignature.into())
    }
}

/// Single-use X25519 key.
///
/// The private half is present only on the device that generated it and
/// only until the prekey is consumed and scrubbed. It is never serialized.
#[derive(Clone, Serialize, Deserialize)]
pub struct OneTimePrekey {
    pub id: PrekeyId,
    pub public_key: PublicKeyB64,
    #[serde(skip)]
    pub private_key: Option<Zeroizing<[u8; 32]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl OneTimePrekey {
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }
}

impl std::fmt::Debug for OneTimePrekey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneTimePrekey")
            .field("id", &self.id)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("consumed_at", &self.consumed_at)
            .finish()
    }
}

/// What a sender fetches to reach an offline device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrekeyBundle {
    pub identity: crate::core::domain::DeviceIdentity,
    pub signed_prekey: SignedPrekey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_time_prekey: Option<OneTimePrekey>,
}

/// Secret-store name of a prekey's private half.
pub fn prekey_key_name(prekey_id: &str) -> String {
    format!("prekey:{}", prekey_id)
}
