//! Environment key (KEK) records.
//!
//! The KEK is wrapped twice. It is sealed once as an AEAD block under a
//! fresh DEK, and that DEK is wrapped per recipient as an envelope.

use serde::{Deserialize, Serialize};

use crate::core::domain::{EnvelopeRecipient, RecipientKind};
use crate::core::types::Fingerprint;

/// Wire shape of a published key envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEnvelope {
    pub ciphertext_b64: String,
    pub nonce_b64: String,
    pub alg: String,
    pub recipients: Vec<EnvelopeRecipient>,
}

impl KeyEnvelope {
    /// Entry addressed to a specific recipient.
    pub fn recipient(&self, kind: RecipientKind, id: &str) -> Option<&EnvelopeRecipient> {
        self.recipients
            .iter()
            .find(|r| r.kind == kind && r.id == id)
    }
}

/// Authoritative environment key record held by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentKeyRecord {
    pub project_id: String,
    pub env_name: String,
    pub version: u32,
    pub fingerprint: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<KeyEnvelope>,
}

/// First publication of a key version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateKeyRequest {
    pub version: u32,
    pub fingerprint: Fingerprint,
    pub envelope: KeyEnvelope,
}

/// Re-share of an existing key version to the current recipient set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEnvelopeRequest {
    pub version: u32,
    pub fingerprint: Fingerprint,
    pub envelope: KeyEnvelope,
}

/// Associated data bound to the KEK ciphertext block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAad {
    pub project: String,
    pub env: String,
    pub fingerprint: Fingerprint,
}

impl KeyAad {
    pub fn to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Metadata of a resolved environment key, without the key itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVersion {
    pub version: u32,
    pub fingerprint: Fingerprint,
}
