//! Envelope encryption between devices.
//!
//! X25519 agreement, HKDF-SHA256 under [`ENVELOPE_KDF_INFO`], then
//! XChaCha20-Poly1305. The sender signs the canonical envelope bytes with
//! its Ed25519 device key.
//!
//! [`encrypt_for_device`] always produces version 2 (per-message ephemeral
//! sender key). Version 1 envelopes, keyed from the sender's *static*
//! device key, are only opened when [`OpenOptions::allow_static_sender`]
//! is set.

use chrono::{SecondsFormat, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use tracing::{debug, trace};
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroizing;

use super::{aead, thumbprint, SymmetricKey};
use crate::core::constants::ENVELOPE_KDF_INFO;
use crate::core::domain::{DeviceIdentity, EncryptedEnvelope, EnvelopeMeta, EnvelopeVersion};
use crate::core::{encoding, kdf};
use crate::error::{CipherError, Result};

/// Decoder switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// Accept version 1 (static sender key) envelopes.
    pub allow_static_sender: bool,
}

impl OpenOptions {
    pub fn compat() -> Self {
        Self {
            allow_static_sender: true,
        }
    }
}

/// Decrypted envelope contents.
pub struct Opened {
    pub plaintext: Zeroizing<Vec<u8>>,
    pub meta: Option<EnvelopeMeta>,
    pub version: EnvelopeVersion,
}

impl std::fmt::Debug for Opened {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opened")
            .field("plaintext", &format_args!("[{} bytes]", self.plaintext.len()))
            .field("meta", &self.meta)
            .field("version", &self.version)
            .finish()
    }
}

/// Envelope key from an X25519 shared secret.
fn envelope_key(shared: &SharedSecret) -> Result<SymmetricKey> {
    if !shared.was_contributory() {
        return Err(CipherError::KeyDerivation("non-contributory key agreement".to_string()).into());
    }
    kdf::derive_key(shared.as_bytes(), ENVELOPE_KDF_INFO)
}

fn check_sender(sender: &DeviceIdentity, signing_key: &SigningKey) -> Result<()> {
    if sender.verifying_key()? != signing_key.verifying_key() {
        return Err(CipherError::EncryptionFailed(format!(
            "signing key does not belong to device {}",
            sender.device_id
        ))
        .into());
    }
    Ok(())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    version: EnvelopeVersion,
    key: &SymmetricKey,
    signing_key: &SigningKey,
    recipient: &X25519PublicKey,
    from: &X25519PublicKey,
    plaintext: &[u8],
    meta: Option<EnvelopeMeta>,
    aad_b64: Option<String>,
) -> Result<EncryptedEnvelope> {
    let mut envelope = EncryptedEnvelope {
        id: uuid::Uuid::new_v4().to_string(),
        version: version.number(),
        alg: version.alg().to_string(),
        to_device_public_key: encoding::encode(recipient.as_bytes()),
        from_ephemeral_public_key: encoding::encode(from.as_bytes()),
        nonce_b64: String::new(),
        ciphertext_b64: String::new(),
        created_at: timestamp(),
        meta,
        aad_b64,
        sender_kid: Some(thumbprint(&signing_key.verifying_key())),
        signature_b64: None,
    };

    let sealed = aead::seal(key, plaintext, &envelope.aad()?)?;
    envelope.nonce_b64 = encoding::encode(&sealed.nonce);
    envelope.ciphertext_b64 = encoding::encode(&sealed.ciphertext);

    let signature = signing_key.sign(&envelope.signing_bytes()?);
    envelope.signature_b64 = Some(encoding::encode(&signature.to_bytes()));
    Ok(envelope)
}

/// Encrypt `plaintext` for one recipient's X25519 public key.
///
/// A fresh ephemeral keypair is generated per call and dropped before
/// returning. `meta` stays readable in the envelope but is authenticated.
///
/// # Errors
///
/// Returns `CipherError` if `signing_key` is not `sender`'s key or if the
/// recipient key is a low-order point.
pub fn encrypt_for_device(
    sender: &DeviceIdentity,
    signing_key: &SigningKey,
    recipient: &X25519PublicKey,
    plaintext: &[u8],
    meta: Option<EnvelopeMeta>,
) -> Result<EncryptedEnvelope> {
    check_sender(sender, signing_key)?;

    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral);
    let key = envelope_key(&ephemeral.diffie_hellman(recipient))?;

    let envelope = assemble(
        EnvelopeVersion::EphemeralV2,
        &key,
        signing_key,
        recipient,
        &ephemeral_public,
        plaintext,
        meta,
        None,
    )?;
    debug!(
        envelope_id = %envelope.id,
        sender = %sender.device_id,
        len = plaintext.len(),
        "sealed envelope"
    );
    Ok(envelope)
}

/// Produce a version 1 envelope keyed from the sender's static X25519 key.
///
/// Exists to interoperate with peers still emitting the static-sender
/// format; new envelopes should use [`encrypt_for_device`].
pub fn seal_static(
    sender: &DeviceIdentity,
    signing_key: &SigningKey,
    sender_secret: &StaticSecret,
    recipient: &X25519PublicKey,
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> Result<EncryptedEnvelope> {
    check_sender(sender, signing_key)?;

    let sender_public = X25519PublicKey::from(sender_secret);
    let key = envelope_key(&sender_secret.diffie_hellman(recipient))?;

    assemble(
        EnvelopeVersion::StaticV1,
        &key,
        signing_key,
        recipient,
        &sender_public,
        plaintext,
        None,
        aad.map(encoding::encode),
    )
}

/// Open an envelope with the recipient's X25519 private key.
///
/// # Errors
///
/// - `CipherError::UnsupportedEnvelope` for unknown versions/algorithms
/// - `CipherError::CompatibilityModeRequired` for version 1 without opt-in
/// - `CipherError::DecryptionFailed` if the envelope is not addressed to
///   this key or fails authentication
pub fn open_with_secret(
    envelope: &EncryptedEnvelope,
    recipient_secret: &StaticSecret,
    options: OpenOptions,
) -> Result<Opened> {
    let version = envelope.protocol()?;
    if version == EnvelopeVersion::StaticV1 && !options.allow_static_sender {
        return Err(CipherError::CompatibilityModeRequired.into());
    }

    let ours = X25519PublicKey::from(recipient_secret);
    let addressed: [u8; 32] =
        encoding::decode_array("to_device_public_key", &envelope.to_device_public_key)?;
    if addressed != *ours.as_bytes() {
        return Err(
            CipherError::DecryptionFailed("envelope is not addressed to this key".to_string())
                .into(),
        );
    }

    let from = super::parse_x25519_public(
        "from_ephemeral_public_key",
        &envelope.from_ephemeral_public_key,
    )?;
    let key = envelope_key(&recipient_secret.diffie_hellman(&from))?;

    let nonce = encoding::decode("nonce_b64", &envelope.nonce_b64)?;
    let ciphertext = encoding::decode("ciphertext_b64", &envelope.ciphertext_b64)?;
    let plaintext = aead::open(&key, &nonce, &ciphertext, &envelope.aad()?)?;

    trace!(envelope_id = %envelope.id, version = version.number(), "opened envelope");
    Ok(Opened {
        plaintext,
        meta: envelope.meta.clone(),
        version,
    })
}

/// Verify the sender signature. `false` when absent or malformed.
pub fn verify_envelope_signature(envelope: &EncryptedEnvelope, sender: &VerifyingKey) -> bool {
    let Some(signature_b64) = envelope.signature_b64.as_deref() else {
        return false;
    };
    let Ok(bytes) = encoding::decode_array::<64>("signature_b64", signature_b64) else {
        return false;
    };
    let Ok(message) = envelope.signing_bytes() else {
        return false;
    };
    sender
        .verify(&message, &Signature::from_bytes(&bytes))
        .is_ok()
}
