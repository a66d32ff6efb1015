//! Encrypted envelope wire format.
//!
//! One JSON shape carries every envelope version; [`EnvelopeVersion::detect`]
//! decides which decoder applies and rejects anything it does not know.
//!
//! ```json
//! {
//!   "id": "…", "version": 2, "alg": "x25519-ephemeral+hkdf-sha256+xchacha20poly1305",
//!   "to_device_public_key": "…", "from_ephemeral_public_key": "…",
//!   "nonce_b64": "…", "ciphertext_b64": "…", "created_at": "…",
//!   "meta": {"k": "v"}, "sender_kid": "…", "signature_b64": "…"
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::constants::ENVELOPE_SIG_CONTEXT;
use crate::core::encoding;
use crate::error::{CipherError, Result};

/// Authenticated, unencrypted envelope metadata.
pub type EnvelopeMeta = BTreeMap<String, String>;

/// Envelope protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeVersion {
    /// Shared secret from the sender's *static* device key. Decode-only
    /// compatibility mode; `from_ephemeral_public_key` holds the sender's
    /// static X25519 key and associated data travels as raw `aad_b64`.
    StaticV1,
    /// Shared secret from a per-message ephemeral key. Associated data is
    /// the serialized `meta`.
    EphemeralV2,
}

impl EnvelopeVersion {
    pub const fn number(self) -> u32 {
        match self {
            Self::StaticV1 => 1,
            Self::EphemeralV2 => 2,
        }
    }

    pub const fn alg(self) -> &'static str {
        match self {
            Self::StaticV1 => "x25519-static+hkdf-sha256+xchacha20poly1305",
            Self::EphemeralV2 => "x25519-ephemeral+hkdf-sha256+xchacha20poly1305",
        }
    }

    /// Pick the decoder for an envelope, rejecting unknown versions and
    /// version/algorithm mismatches.
    pub fn detect(envelope: &EncryptedEnvelope) -> Result<Self> {
        let version = match envelope.version {
            1 => Self::StaticV1,
            2 => Self::EphemeralV2,
            other => {
                return Err(
                    CipherError::UnsupportedEnvelope(format!("version {}", other)).into(),
                )
            }
        };
        if envelope.alg != version.alg() {
            return Err(CipherError::UnsupportedEnvelope(format!(
                "algorithm '{}' for version {}",
                envelope.alg, envelope.version
            ))
            .into());
        }
        Ok(version)
    }
}

/// An envelope addressed to exactly one recipient public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub id: String,
    pub version: u32,
    pub alg: String,
    pub to_device_public_key: String,
    pub from_ephemeral_public_key: String,
    pub nonce_b64: String,
    pub ciphertext_b64: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EnvelopeMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_b64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_b64: Option<String>,
}

impl EncryptedEnvelope {
    /// Parse and version-check an envelope.
    pub fn from_json(json: &str) -> Result<Self> {
        let envelope: Self = serde_json::from_str(json)?;
        EnvelopeVersion::detect(&envelope)?;
        Ok(envelope)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn protocol(&self) -> Result<EnvelopeVersion> {
        EnvelopeVersion::detect(self)
    }

    /// Serialized meta, empty when absent. Deterministic: keys are sorted.
    pub fn meta_bytes(&self) -> Result<Vec<u8>> {
        match &self.meta {
            Some(meta) => Ok(serde_json::to_vec(meta)?),
            None => Ok(Vec::new()),
        }
    }

    /// Associated data bound into the AEAD for this envelope's version.
    pub fn aad(&self) -> Result<Vec<u8>> {
        match self.protocol()? {
            EnvelopeVersion::EphemeralV2 => self.meta_bytes(),
            EnvelopeVersion::StaticV1 => match &self.aad_b64 {
                Some(aad) => encoding::decode("aad_b64", aad),
                None => Ok(Vec::new()),
            },
        }
    }

    /// Canonical byte string covered by the sender signature.
    ///
    /// Fields are length-prefixed (u32 big-endian) so no two distinct
    /// envelopes share a transcript.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        let meta = self.meta_bytes()?;
        let version = self.version.to_string();
        let aad = self.aad_b64.as_deref().unwrap_or("");

        let fields: [&[u8]; 9] = [
            self.id.as_bytes(),
            version.as_bytes(),
            self.to_device_public_key.as_bytes(),
            self.from_ephemeral_public_key.as_bytes(),
            self.nonce_b64.as_bytes(),
            self.ciphertext_b64.as_bytes(),
            self.created_at.as_bytes(),
            &meta,
            aad.as_bytes(),
        ];

        let mut out = Vec::with_capacity(
            ENVELOPE_SIG_CONTEXT.len() + fields.iter().map(|f| f.len() + 4).sum::<usize>(),
        );
        out.extend_from_slice(ENVELOPE_SIG_CONTEXT);
        for field in fields {
            out.extend_from_slice(&(field.len() as u32).to_be_bytes());
            out.extend_from_slice(field);
        }
        Ok(out)
    }
}
