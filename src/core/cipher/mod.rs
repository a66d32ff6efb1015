//! Cryptographic primitives.
//!
//! - [`aead`]: XChaCha20-Poly1305 seal/open with random nonces
//! - [`envelope`]: per-recipient envelope encryption (X25519 + HKDF + AEAD + Ed25519)
//! - [`SymmetricKey`]: zeroizing 32-byte key
//!
//! Key parsing helpers live here so every module decodes public keys the
//! same way.

pub mod aead;
pub mod envelope;
mod key;

pub use key::SymmetricKey;

use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};
use x25519_dalek::PublicKey as X25519PublicKey;

use crate::core::encoding;
use crate::core::types::Fingerprint;
use crate::error::{Result, ValidationError};

/// Lowercase hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    hex::encode(Sha256::digest(bytes))
}

/// Key id of a signer: hex SHA-256 of its Ed25519 public key.
pub fn thumbprint(key: &VerifyingKey) -> String {
    fingerprint(key.as_bytes())
}

/// Parse a base64 X25519 public key.
pub fn parse_x25519_public(field: &'static str, value: &str) -> Result<X25519PublicKey> {
    let bytes: [u8; 32] = encoding::decode_array(field, value)?;
    Ok(X25519PublicKey::from(bytes))
}

/// Parse a base64 Ed25519 public key.
pub fn parse_ed25519_public(field: &'static str, value: &str) -> Result<VerifyingKey> {
    let bytes: [u8; 32] = encoding::decode_array(field, value)?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| {
        ValidationError::InvalidEncoding {
            field,
            reason: e.to_string(),
        }
        .into()
    })
}
