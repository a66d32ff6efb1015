//! Secret ciphertext records and pull results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::core::types::{DeviceId, Fingerprint, SecretName};

/// Logical location a secret ciphertext is bound to.
///
/// Serialized and used verbatim as AEAD associated data, so field order
/// matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretAad {
    pub org: String,
    pub project: String,
    pub env: String,
    pub name: SecretName,
}

impl SecretAad {
    pub fn new(org: &str, project: &str, env: &str, name: &str) -> Self {
        Self {
            org: org.to_string(),
            project: project.to_string(),
            env: env.to_string(),
            name: name.to_string(),
        }
    }

    /// `org/project/env`, the scope sub-keys are derived for.
    pub fn scope(&self) -> String {
        format!("{}/{}/{}", self.org, self.project, self.env)
    }
}

/// Integrity claims attached alongside the AEAD tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretClaims {
    /// HMAC-SHA256 of the plaintext under the scope HMAC key (base64)
    pub hmac: String,
}

/// Encrypted value and its bindings, shared by upload requests and stored
/// records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPayload {
    pub name: SecretName,
    pub env: String,
    pub ciphertext: String,
    pub nonce: String,
    pub alg: String,
    pub aad: SecretAad,
    pub claims: SecretClaims,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_kek_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_kek_fingerprint: Option<Fingerprint>,
}

/// Signed upload request for one secret value.
///
/// `client_sig` covers the JSON serialization of this request with
/// `client_sig` unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretUploadRequest {
    #[serde(flatten)]
    pub payload: SecretPayload,
    /// Expected current version, for optimistic concurrency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_sig: Option<String>,
}

impl SecretUploadRequest {
    /// Bytes covered by `client_sig`.
    pub fn signing_bytes(&self) -> crate::error::Result<Vec<u8>> {
        let unsigned = Self {
            client_sig: None,
            ..self.clone()
        };
        Ok(serde_json::to_vec(&unsigned)?)
    }
}

/// A stored secret version as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretCiphertext {
    #[serde(flatten)]
    pub payload: SecretPayload,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
}

impl SecretCiphertext {
    pub fn name(&self) -> &str {
        &self.payload.name
    }
}

/// Why a record was dropped from a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Tampered, corrupted or encrypted under a key we do not hold
    Integrity,
    /// Key material exists but was not shared with us
    Access,
    /// Record is malformed (bad encoding, wrong location)
    Invalid,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integrity => write!(f, "integrity"),
            Self::Access => write!(f, "access"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// A dropped record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFailure {
    pub name: SecretName,
    pub kind: FailureKind,
    pub reason: String,
}

/// Result of decrypting one record.
pub enum SecretOutcome {
    Decrypted {
        name: SecretName,
        value: Zeroizing<String>,
    },
    Failed(SecretFailure),
}

/// Aggregated result of decrypting a bundle. One bad record never aborts
/// its siblings.
#[derive(Default)]
pub struct PullReport {
    pub values: BTreeMap<SecretName, Zeroizing<String>>,
    pub failures: Vec<SecretFailure>,
}

impl PullReport {
    pub fn push(&mut self, outcome: SecretOutcome) {
        match outcome {
            SecretOutcome::Decrypted { name, value } => {
                self.values.insert(name, value);
            }
            SecretOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }
}

impl FromIterator<SecretOutcome> for PullReport {
    fn from_iter<I: IntoIterator<Item = SecretOutcome>>(iter: I) -> Self {
        let mut report = Self::default();
        for outcome in iter {
            report.push(outcome);
        }
        report
    }
}

/// Result of re-encrypting an environment under its current key. Records
/// that fail to decrypt are skipped and reported; the rest are rewritten.
#[derive(Debug, Default)]
pub struct ReencryptReport {
    pub rewritten: usize,
    pub failures: Vec<SecretFailure>,
}

impl ReencryptReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Debug for PullReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullReport")
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .field("failures", &self.failures)
            .finish()
    }
}
