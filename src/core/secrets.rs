//! Secret payload codec.
//!
//! Turns one plaintext value into a tamper-evident, attributable upload
//! request, and back.
//!
//! From the environment key, two sub-keys are derived per `org/project/env`
//! scope: one for XChaCha20-Poly1305, one for an HMAC-SHA256 claim over the
//! plaintext. The AEAD associated data is the record's logical location
//! `{org, project, env, name}`, so a ciphertext moved to another name or
//! environment fails to open. The AEAD tag is authoritative; the HMAC claim
//! is an independent corroborating check.

use std::collections::BTreeMap;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::core::cipher::{aead, SymmetricKey};
use crate::core::constants::SECRET_ALG;
use crate::core::domain::{
    FailureKind, PullReport, Scope, SecretAad, SecretCiphertext, SecretClaims, SecretFailure,
    SecretOutcome, SecretPayload, SecretUploadRequest,
};
use crate::core::keys::CachedKey;
use crate::core::{encoding, kdf, validation};
use crate::error::{AccessError, CipherError, Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Per-scope encryption and integrity sub-keys.
pub struct ScopeKeys {
    pub enc: SymmetricKey,
    pub hmac: SymmetricKey,
}

/// `HKDF(kek, "v1:secret:<org/project/env>:enc" | ":hmac")`
pub fn derive_scope_keys(kek: &SymmetricKey, aad: &SecretAad) -> Result<ScopeKeys> {
    let scope = aad.scope();
    Ok(ScopeKeys {
        enc: kdf::derive_key(kek.as_bytes(), &kdf::context("secret", &scope, "enc"))?,
        hmac: kdf::derive_key(kek.as_bytes(), &kdf::context("secret", &scope, "hmac"))?,
    })
}

fn new_mac(key: &SymmetricKey) -> Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| CipherError::KeyDerivation(e.to_string()).into())
}

/// Base64 HMAC-SHA256 of `plaintext`.
pub fn hmac_claim(hmac_key: &SymmetricKey, plaintext: &[u8]) -> Result<String> {
    let mut mac = new_mac(hmac_key)?;
    mac.update(plaintext);
    Ok(encoding::encode(&mac.finalize().into_bytes()))
}

fn aad_bytes(aad: &SecretAad) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(aad)?)
}

/// Encrypt and sign one value.
///
/// `if_version` is the version the caller expects to replace (optimistic
/// concurrency); `None` writes unconditionally.
///
/// # Errors
///
/// Returns `ValidationError` for an invalid name or empty value.
pub fn build_secret_payload(
    scope: &Scope,
    name: &str,
    plaintext: &str,
    key: &CachedKey,
    signing_key: &SigningKey,
    if_version: Option<u64>,
) -> Result<SecretUploadRequest> {
    validation::validate_name(name)?;
    validation::validate_value(name, plaintext)?;

    let aad = SecretAad::new(&scope.org, &scope.project, &scope.env, name);
    let keys = derive_scope_keys(&key.key, &aad)?;
    let sealed = aead::seal(&keys.enc, plaintext.as_bytes(), &aad_bytes(&aad)?)?;

    let mut request = SecretUploadRequest {
        payload: SecretPayload {
            name: name.to_string(),
            env: scope.env.clone(),
            ciphertext: encoding::encode(&sealed.ciphertext),
            nonce: encoding::encode(&sealed.nonce),
            alg: SECRET_ALG.to_string(),
            claims: SecretClaims {
                hmac: hmac_claim(&keys.hmac, plaintext.as_bytes())?,
            },
            aad,
            env_kek_version: Some(key.version),
            env_kek_fingerprint: Some(key.fingerprint.clone()),
        },
        if_version,
        client_sig: None,
    };

    let signature = signing_key.sign(&request.signing_bytes()?);
    request.client_sig = Some(encoding::encode(&signature.to_bytes()));
    debug!(name = %name, scope = %scope, kek_version = key.version, "built secret payload");
    Ok(request)
}

/// Check `client_sig` against the uploading device's key.
///
/// # Errors
///
/// Returns `CipherError::BadSignature` when the signature is missing,
/// malformed or does not verify.
pub fn verify_upload_signature(request: &SecretUploadRequest, signer: &VerifyingKey) -> Result<()> {
    let sig = request
        .client_sig
        .as_deref()
        .ok_or(CipherError::BadSignature)?;
    let bytes: [u8; 64] =
        encoding::decode_array("client_sig", sig).map_err(|_| CipherError::BadSignature)?;
    signer
        .verify(&request.signing_bytes()?, &Signature::from_bytes(&bytes))
        .map_err(|_| CipherError::BadSignature.into())
}

/// Keys a scope's records may be encrypted under, current first.
pub struct Keyring {
    scope: String,
    keys: Vec<CachedKey>,
}

impl Keyring {
    pub fn new(scope: &Scope, keys: Vec<CachedKey>) -> Self {
        Self {
            scope: scope.to_string(),
            keys,
        }
    }

    pub fn single(scope: &Scope, key: CachedKey) -> Self {
        Self::new(scope, vec![key])
    }

    pub fn current(&self) -> Option<&CachedKey> {
        self.keys.first()
    }

    /// Key for a record that declares `fingerprint` (or the current key
    /// when it declares none).
    ///
    /// # Errors
    ///
    /// - `CipherError::FingerprintMismatch` if no held key matches
    /// - `AccessError::NoEnvironmentKey` if the ring is empty
    pub fn select(&self, fingerprint: Option<&str>) -> Result<&CachedKey> {
        let current = self
            .current()
            .ok_or_else(|| AccessError::NoEnvironmentKey(self.scope.clone()))?;
        match fingerprint {
            None => Ok(current),
            Some(declared) => self
                .keys
                .iter()
                .find(|k| k.fingerprint == declared)
                .ok_or_else(|| {
                    CipherError::FingerprintMismatch {
                        expected: declared.to_string(),
                        actual: current.fingerprint.clone(),
                    }
                    .into()
                }),
        }
    }
}

/// Decrypt one record stored in `scope`.
///
/// The AAD is rebuilt from `scope` and the record name, never taken from
/// the record, so a relocated ciphertext fails authentication.
pub fn decrypt_secret(
    record: &SecretCiphertext,
    scope: &Scope,
    keyring: &Keyring,
) -> Result<Zeroizing<String>> {
    let payload = &record.payload;
    if payload.alg != SECRET_ALG {
        return Err(CipherError::UnsupportedEnvelope(format!("secret algorithm '{}'", payload.alg)).into());
    }

    let key = keyring.select(payload.env_kek_fingerprint.as_deref())?;
    let aad = SecretAad::new(&scope.org, &scope.project, &scope.env, &payload.name);
    let keys = derive_scope_keys(&key.key, &aad)?;

    let nonce = encoding::decode("nonce", &payload.nonce)?;
    let ciphertext = encoding::decode("ciphertext", &payload.ciphertext)?;
    let plaintext = aead::open(&keys.enc, &nonce, &ciphertext, &aad_bytes(&aad)?)?;

    let claim = encoding::decode("claims.hmac", &payload.claims.hmac)
        .map_err(|_| CipherError::HmacMismatch(payload.name.clone()))?;
    let mut mac = new_mac(&keys.hmac)?;
    mac.update(&plaintext);
    mac.verify_slice(&claim)
        .map_err(|_| CipherError::HmacMismatch(payload.name.clone()))?;

    let value = String::from_utf8(plaintext.to_vec())
        .map_err(|_| CipherError::DecryptionFailed(format!("{} is not valid UTF-8", payload.name)))?;
    Ok(Zeroizing::new(value))
}

fn classify(error: &Error) -> FailureKind {
    if error.is_access() {
        FailureKind::Access
    } else if error.is_integrity() {
        FailureKind::Integrity
    } else {
        FailureKind::Invalid
    }
}

/// Report `error` against the record `name`.
pub fn failure(name: &str, error: &Error) -> SecretFailure {
    SecretFailure {
        name: name.to_string(),
        kind: classify(error),
        reason: error.to_string(),
    }
}

/// Decrypt one record into an outcome, never an early exit.
pub fn decrypt_outcome(record: &SecretCiphertext, scope: &Scope, keyring: &Keyring) -> SecretOutcome {
    match decrypt_secret(record, scope, keyring) {
        Ok(value) => SecretOutcome::Decrypted {
            name: record.name().to_string(),
            value,
        },
        Err(e) => {
            warn!(name = %record.name(), version = record.version, "dropping secret: {}", e);
            SecretOutcome::Failed(failure(record.name(), &e))
        }
    }
}

/// Latest version of each name.
pub fn latest(records: &[SecretCiphertext]) -> Vec<&SecretCiphertext> {
    let mut by_name: BTreeMap<&str, &SecretCiphertext> = BTreeMap::new();
    for record in records {
        by_name
            .entry(record.name())
            .and_modify(|r| {
                if record.version > r.version {
                    *r = record;
                }
            })
            .or_insert(record);
    }
    by_name.into_values().collect()
}

/// Decrypt the latest version of every secret. One bad record never
/// aborts its siblings.
pub fn decrypt_bundle(records: &[SecretCiphertext], scope: &Scope, keyring: &Keyring) -> PullReport {
    let report: PullReport = latest(records)
        .into_iter()
        .map(|record| decrypt_outcome(record, scope, keyring))
        .collect();
    debug!(
        scope = %scope,
        decrypted = report.values.len(),
        failed = report.failures.len(),
        "decrypted bundle"
    );
    report
}

/// Re-encrypt one record under `new_key`. The write path of a rotation;
/// never done implicitly.
pub fn reencrypt(
    record: &SecretCiphertext,
    scope: &Scope,
    old: &Keyring,
    new_key: &CachedKey,
    signing_key: &SigningKey,
) -> Result<SecretUploadRequest> {
    let value = decrypt_secret(record, scope, old)?;
    build_secret_payload(
        scope,
        record.name(),
        &value,
        new_key,
        signing_key,
        Some(record.version),
    )
}
