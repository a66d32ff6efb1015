//! Environment-key recipients.
//!
//! A [`Recipient`] is someone authorized to hold an environment key: a
//! device or a deployment token, with the X25519 public key envelopes are
//! addressed to. An [`EnvelopeRecipient`] is that recipient's entry inside a
//! published key envelope, carrying its wrapped DEK.

use serde::{Deserialize, Serialize};
use x25519_dalek::PublicKey as X25519PublicKey;

use crate::core::cipher;
use crate::core::domain::EncryptedEnvelope;
use crate::core::encoding;
use crate::core::types::PublicKeyB64;
use crate::error::{Result, ValidationError};

/// Kind of environment-key recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientKind {
    Device,
    Deployment,
}

impl std::fmt::Display for RecipientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device => write!(f, "device"),
            Self::Deployment => write!(f, "deployment"),
        }
    }
}

/// An authorized recipient of an environment key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "type")]
    pub kind: RecipientKind,
    pub id: String,
    pub public_key: PublicKeyB64,
}

impl Recipient {
    /// Create a recipient, validating the public key.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the id is empty or the key is not a
    /// base64 32-byte X25519 public key.
    pub fn new(kind: RecipientKind, id: impl Into<String>, public_key: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let public_key = public_key.into();
        if id.is_empty() {
            return Err(ValidationError::Empty("recipient id").into());
        }
        cipher::parse_x25519_public("recipient public key", &public_key)?;
        Ok(Self {
            kind,
            id,
            public_key,
        })
    }

    pub fn public_key(&self) -> Result<X25519PublicKey> {
        cipher::parse_x25519_public("recipient public key", &self.public_key)
    }
}

/// One recipient's entry in a key envelope.
///
/// `edek_b64` is the base64 of an [`EncryptedEnvelope`] JSON document whose
/// plaintext is the DEK for this publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeRecipient {
    #[serde(rename = "type")]
    pub kind: RecipientKind,
    pub id: String,
    pub edek_b64: String,
}

impl EnvelopeRecipient {
    pub fn wrap(kind: RecipientKind, id: impl Into<String>, envelope: &EncryptedEnvelope) -> Result<Self> {
        Ok(Self {
            kind,
            id: id.into(),
            edek_b64: encoding::encode(envelope.to_json()?.as_bytes()),
        })
    }

    /// Decode the wrapped-DEK envelope.
    pub fn envelope(&self) -> Result<EncryptedEnvelope> {
        let bytes = encoding::decode("edek_b64", &self.edek_b64)?;
        let json = String::from_utf8(bytes).map_err(|e| ValidationError::InvalidEncoding {
            field: "edek_b64",
            reason: e.to_string(),
        })?;
        EncryptedEnvelope::from_json(&json)
    }
}
