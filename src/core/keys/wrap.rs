//! Two-layer environment-key wrapping.
//!
//! ```text
//! KEK ──AEAD(DEK, aad={project,env,fingerprint})──> ciphertext_b64/nonce_b64
//! DEK ──envelope(recipient public key)──────────> recipients[i].edek_b64
//! ```
//!
//! One DEK per publication, shared by every recipient entry.

use std::collections::BTreeMap;

use ed25519_dalek::SigningKey;
use tracing::debug;
use x25519_dalek::StaticSecret;

use crate::core::cipher::envelope::{self, OpenOptions};
use crate::core::cipher::{aead, SymmetricKey};
use crate::core::constants::KEK_ALG;
use crate::core::domain::{
    DeviceIdentity, EnvelopeRecipient, KeyAad, KeyEnvelope, Recipient, Scope,
};
use crate::core::encoding;
use crate::error::{CipherError, Result};

fn key_aad(scope: &Scope, fingerprint: &str) -> Result<Vec<u8>> {
    KeyAad {
        project: scope.project.clone(),
        env: scope.env.clone(),
        fingerprint: fingerprint.to_string(),
    }
    .to_bytes()
}

/// Seal `key` for every recipient.
pub fn seal_key_envelope(
    sender: &DeviceIdentity,
    signing_key: &SigningKey,
    scope: &Scope,
    key: &SymmetricKey,
    recipients: &[Recipient],
) -> Result<KeyEnvelope> {
    let dek = SymmetricKey::generate();
    let sealed = aead::seal(&dek, key.as_bytes(), &key_aad(scope, &key.fingerprint())?)?;

    let entries = recipients
        .iter()
        .map(|recipient| {
            let meta = BTreeMap::from([
                ("env".to_string(), scope.env.clone()),
                ("project".to_string(), scope.project.clone()),
                ("recipient".to_string(), format!("{}:{}", recipient.kind, recipient.id)),
            ]);
            let wrapped = envelope::encrypt_for_device(
                sender,
                signing_key,
                &recipient.public_key()?,
                dek.as_bytes(),
                Some(meta),
            )?;
            EnvelopeRecipient::wrap(recipient.kind, recipient.id.clone(), &wrapped)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(scope = %scope, recipients = entries.len(), "sealed key envelope");
    Ok(KeyEnvelope {
        ciphertext_b64: encoding::encode(&sealed.ciphertext),
        nonce_b64: encoding::encode(&sealed.nonce),
        alg: KEK_ALG.to_string(),
        recipients: entries,
    })
}

/// Recover the environment key from one recipient entry.
///
/// # Errors
///
/// Returns `CipherError` if either layer fails to open, the algorithm is
/// unknown, or the recovered key does not hash to `fingerprint`.
pub fn open_key_envelope(
    key_envelope: &KeyEnvelope,
    entry: &EnvelopeRecipient,
    secret: &StaticSecret,
    scope: &Scope,
    fingerprint: &str,
) -> Result<SymmetricKey> {
    if key_envelope.alg != KEK_ALG {
        return Err(CipherError::UnsupportedEnvelope(format!(
            "key envelope algorithm '{}'",
            key_envelope.alg
        ))
        .into());
    }

    let wrapped = entry.envelope()?;
    let opened = envelope::open_with_secret(&wrapped, secret, OpenOptions::default())?;
    let dek = SymmetricKey::from_slice(&opened.plaintext)?;

    let nonce = encoding::decode("nonce_b64", &key_envelope.nonce_b64)?;
    let ciphertext = encoding::decode("ciphertext_b64", &key_envelope.ciphertext_b64)?;
    let plaintext = aead::open(&dek, &nonce, &ciphertext, &key_aad(scope, fingerprint)?)?;
    let key = SymmetricKey::from_slice(&plaintext)?;

    let actual = key.fingerprint();
    if actual != fingerprint {
        return Err(CipherError::FingerprintMismatch {
            expected: fingerprint.to_string(),
            actual,
        }
        .into());
    }
    Ok(key)
}
