//! XChaCha20-Poly1305 sealing.
//!
//! Every call to [`seal`] draws a fresh 24-byte random nonce; the nonce is
//! large enough that random generation has no practical collision risk.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::trace;
use zeroize::Zeroizing;

use super::SymmetricKey;
use crate::core::constants::NONCE_LEN;
use crate::error::{CipherError, Result};

/// Output of [`seal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Random 24-byte nonce.
pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key`, authenticating `aad`.
pub fn seal(key: &SymmetricKey, plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    let nonce = random_nonce();
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "sealed"
    );
    Ok(Sealed { nonce, ciphertext })
}

/// Decrypt and authenticate.
///
/// # Errors
///
/// Returns `CipherError::DecryptionFailed` on a malformed nonce, a wrong
/// key, or any modification of the ciphertext or `aad`.
pub fn open(
    key: &SymmetricKey,
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_LEN {
        return Err(CipherError::DecryptionFailed(format!(
            "nonce must be {} bytes, got {}",
            NONCE_LEN,
            nonce.len()
        ))
        .into());
    }

    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| CipherError::DecryptionFailed(e.to_string()))?;

    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CipherError::DecryptionFailed("authentication failed".to_string()))?;

    trace!(plaintext_len = plaintext.len(), "opened");
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = SymmetricKey::generate();
        let sealed = seal(&key, b"hello", b"aad").unwrap();
        let opened = open(&key, &sealed.nonce, &sealed.ciphertext, b"aad").unwrap();
        assert_eq!(opened.as_slice(), b"hello");
    }

    #[test]
    fn test_open_wrong_aad_fails() {
        let key = SymmetricKey::generate();
        let sealed = seal(&key, b"hello", b"aad").unwrap();
        assert!(open(&key, &sealed.nonce, &sealed.ciphertext, b"other").is_err());
    }

    #[test]
    fn test_open_wrong_key_fails() {
        let sealed = seal(&SymmetricKey::generate(), b"hello", b"").unwrap();
        let result = open(&SymmetricKey::generate(), &sealed.nonce, &sealed.ciphertext, b"");
        assert!(result.is_err());
    }

    #[test]
    fn test_open_short_nonce_fails() {
        let key = SymmetricKey::generate();
        let sealed = seal(&key, b"hello", b"").unwrap();
        assert!(open(&key, &sealed.nonce[..12], &sealed.ciphertext, b"").is_err());
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = SymmetricKey::generate();
        let a = seal(&key, b"same", b"").unwrap();
        let b = seal(&key, b"same", b"").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
